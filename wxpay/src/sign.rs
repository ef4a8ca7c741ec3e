//! Canonical request signing.
//!
//! Every request body and every inbound notification carries a `sign`
//! field computed over the remaining fields:
//!
//! 1. drop `sign` and any empty value,
//! 2. join `key=value` pairs with `&` in ascending key order, values verbatim,
//! 3. append `&key=<merchant_key>`,
//! 4. hash with MD5, or HMAC-SHA256 keyed by the merchant key,
//! 5. render as uppercase hex.
//!
//! Values are never percent-encoded; doing so changes the signature.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use hmac::{Hmac, Mac};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::config::MerchantConfig;
use crate::error::{InvalidParameterError, Result};
use crate::field::{FieldMap, SIGN_FIELD};
use crate::schema::{self, OptionBag};

type HmacSha256 = Hmac<Sha256>;

/// Hash algorithm used for a signature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SignType {
    /// `MD5` over the signing string (the gateway default).
    #[default]
    Md5,
    /// `HMAC-SHA256` over the signing string, keyed by the merchant key.
    HmacSha256,
}

impl SignType {
    /// Every accepted wire value.
    pub const ALLOWED: &'static [&'static str] = &["MD5", "HMAC-SHA256"];

    /// Returns the wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::HmacSha256 => "HMAC-SHA256",
        }
    }
}

impl fmt::Display for SignType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignType {
    type Err = InvalidParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MD5" => Ok(Self::Md5),
            "HMAC-SHA256" => Ok(Self::HmacSha256),
            other => Err(schema::not_allowed("sign_type", Self::ALLOWED, other)),
        }
    }
}

impl Serialize for SignType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SignType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Builds the canonical signing string for `fields`.
#[must_use]
pub fn signing_string(fields: &FieldMap, merchant_key: &str) -> String {
    let mut out = String::new();
    for (name, value) in fields.iter() {
        if name == SIGN_FIELD || value.is_empty() {
            continue;
        }
        out.push_str(name);
        out.push('=');
        out.push_str(value);
        out.push('&');
    }
    out.push_str("key=");
    out.push_str(merchant_key);
    out
}

/// Computes the uppercase hex signature of `fields`.
#[must_use]
pub fn generate(fields: &FieldMap, merchant_key: &str, sign_type: SignType) -> String {
    let payload = signing_string(fields, merchant_key);
    match sign_type {
        SignType::Md5 => hex::encode_upper(md5::compute(payload.as_bytes()).0),
        SignType::HmacSha256 => {
            let mut mac = HmacSha256::new_from_slice(merchant_key.as_bytes())
                .expect("HMAC can take key of any size");
            mac.update(payload.as_bytes());
            hex::encode_upper(mac.finalize().into_bytes())
        }
    }
}

/// Recomputes the signature of `fields` and compares it with `signature`
/// in constant time.
#[must_use]
pub fn verify(signature: &str, fields: &FieldMap, merchant_key: &str, sign_type: SignType) -> bool {
    let expected = generate(fields, merchant_key, sign_type);
    expected.as_bytes().ct_eq(signature.as_bytes()).into()
}

/// Caller-supplied signing options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignOptions {
    /// Merchant API key; falls back to the configured key.
    pub merchant_key: Option<String>,
    /// Hash algorithm; defaults to [`SignType::Md5`].
    pub sign_type: Option<SignType>,
}

impl SignOptions {
    /// Option names accepted by [`SignOptions::from_bag`].
    pub const DEFINED_OPTIONS: &'static [&'static str] = &["merchant_key", "sign_type"];

    /// Sets the merchant key.
    #[must_use]
    pub fn with_merchant_key(mut self, key: impl Into<String>) -> Self {
        self.merchant_key = Some(key.into());
        self
    }

    /// Sets the hash algorithm.
    #[must_use]
    pub const fn with_sign_type(mut self, sign_type: SignType) -> Self {
        self.sign_type = Some(sign_type);
        self
    }

    /// Reads signing options from an untyped option bag.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidParameter`] for undefined options or
    /// values of the wrong type.
    pub fn from_bag(bag: &OptionBag) -> Result<Self> {
        schema::reject_undefined(bag, Self::DEFINED_OPTIONS)?;
        Ok(Self {
            merchant_key: schema::string(bag, "merchant_key")?,
            sign_type: schema::choice(bag, "sign_type")?,
        })
    }

    /// Resolves the options against `config`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MissingParameter`] if no merchant key is
    /// available.
    pub fn resolve(self, config: &MerchantConfig) -> Result<ResolvedSignOptions> {
        Ok(ResolvedSignOptions {
            merchant_key: schema::required(
                "merchant_key",
                schema::present(self.merchant_key).or_else(|| config.merchant_key.clone()),
            )?,
            sign_type: self.sign_type.unwrap_or_default(),
        })
    }
}

/// Signing options after defaulting.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedSignOptions {
    /// Merchant API key.
    pub merchant_key: String,
    /// Hash algorithm.
    pub sign_type: SignType,
}

impl fmt::Debug for ResolvedSignOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedSignOptions")
            .field("merchant_key", &"<redacted>")
            .field("sign_type", &self.sign_type)
            .finish()
    }
}

/// Signs and checks field maps with keys drawn from a merchant configuration.
#[derive(Debug, Clone, Default)]
pub struct Signer {
    config: Arc<MerchantConfig>,
}

impl Signer {
    /// Creates a signer backed by `config`.
    #[must_use]
    pub const fn new(config: Arc<MerchantConfig>) -> Self {
        Self { config }
    }

    /// Signs `fields`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MissingParameter`] naming `merchant_key` if
    /// neither the options nor the configuration carry a key.
    pub fn sign(&self, fields: &FieldMap, options: SignOptions) -> Result<String> {
        let resolved = options.resolve(&self.config)?;
        Ok(generate(fields, &resolved.merchant_key, resolved.sign_type))
    }

    /// Checks `signature` against `fields`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MissingParameter`] if no merchant key is
    /// available.
    pub fn check(&self, signature: &str, fields: &FieldMap, options: SignOptions) -> Result<bool> {
        let resolved = options.resolve(&self.config)?;
        Ok(verify(signature, fields, &resolved.merchant_key, resolved.sign_type))
    }
}
