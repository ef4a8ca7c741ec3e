//! Inbound payment notifications.
//!
//! The gateway reports payment results by POSTing a signed document to the
//! merchant's `notify_url`. The payload is untrusted until its signature
//! checks out:
//!
//! ```text
//! Received -> Decoded -> SignatureChecked -> Accepted | Rejected
//! ```
//!
//! Whatever the outcome, the merchant replies with an [`Acknowledgment`].

use std::sync::Arc;

#[cfg(feature = "telemetry")]
use tracing::instrument;

use crate::config::MerchantConfig;
use crate::error::{Error, Result};
use crate::field::FieldMap;
use crate::response::{FAIL, SUCCESS};
use crate::schema::OptionBag;
use crate::sign::{self, SignOptions};
use crate::wire::{self, WireError};

/// Content type of acknowledgment replies.
pub const CONTENT_TYPE: &str = "application/xml";

/// Options accepted when verifying a notification: `merchant_key` and
/// `sign_type`.
pub type NotifyOptions = SignOptions;

/// Verifies inbound notifications against the merchant key.
#[derive(Debug, Clone, Default)]
pub struct NotifyHandler {
    config: Arc<MerchantConfig>,
}

impl NotifyHandler {
    /// Creates a handler falling back to the key in `config`.
    #[must_use]
    pub const fn new(config: Arc<MerchantConfig>) -> Self {
        Self { config }
    }

    /// Verifies a decoded notification.
    ///
    /// Returns the payload without its `sign` field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingParameter`] if no merchant key is available
    /// and [`Error::InvalidSignature`] if the signature is absent or does
    /// not match.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "wxpay.notify.handle", skip_all, err)
    )]
    pub fn handle(&self, mut data: FieldMap, options: NotifyOptions) -> Result<FieldMap> {
        let resolved = options.resolve(&self.config)?;
        let signature = data.take_signature();

        if !sign::verify(&signature, &data, &resolved.merchant_key, resolved.sign_type) {
            #[cfg(feature = "telemetry")]
            tracing::warn!(
                out_trade_no = data.get("out_trade_no"),
                "notification signature mismatch"
            );
            return Err(Error::InvalidSignature);
        }

        Ok(data)
    }

    /// Decodes and verifies a raw notification body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedRequest`] if the body is not a flat XML
    /// document, otherwise as [`NotifyHandler::handle`].
    pub fn handle_bytes(&self, body: &[u8], options: NotifyOptions) -> Result<FieldMap> {
        let data = wire::decode(body).map_err(Error::MalformedRequest)?;
        self.handle(data, options)
    }

    /// Decodes and verifies a raw notification body with untyped options.
    ///
    /// # Errors
    ///
    /// As [`NotifyHandler::handle_bytes`], plus [`Error::InvalidParameter`]
    /// for undefined or mistyped options.
    pub fn handle_bytes_with_bag(&self, body: &[u8], bag: &OptionBag) -> Result<FieldMap> {
        self.handle_bytes(body, NotifyOptions::from_bag(bag)?)
    }
}

/// Reply sent back to the gateway after handling a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgment {
    success: bool,
    message: Option<String>,
}

impl Acknowledgment {
    /// Tells the gateway the notification was processed.
    #[must_use]
    pub const fn success() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    /// Tells the gateway to retry the notification later.
    #[must_use]
    pub const fn fail() -> Self {
        Self {
            success: false,
            message: None,
        }
    }

    /// Attaches a `return_msg`.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Returns `true` for a success acknowledgment.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.success
    }

    /// Returns the attached message.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns the reply fields. An absent message is omitted.
    #[must_use]
    pub fn to_fields(&self) -> FieldMap {
        let mut fields = FieldMap::new();
        fields
            .insert("return_code", if self.success { SUCCESS } else { FAIL })
            .insert_opt("return_msg", self.message.as_deref());
        fields
    }

    /// Encodes the reply document.
    ///
    /// # Errors
    ///
    /// Returns [`WireError`] if encoding fails.
    pub fn to_xml(&self) -> Result<Vec<u8>, WireError> {
        wire::encode_document(&self.to_fields())
    }
}
