//! Error types for the Wxpay client.
//!
//! Every fallible operation in this crate returns [`Error`]. The variants
//! separate caller mistakes (missing or invalid options) from wire decode
//! failures and from failures reported by the gateway itself, so callers
//! can decide how to react without inspecting messages.

use std::fmt;

use crate::wire::WireError;

/// Base error type for Wxpay operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A required option was not supplied by the caller or configuration.
    #[error("{0}")]
    MissingParameter(#[from] MissingParameterError),

    /// An option was supplied with a wrong type or a disallowed value.
    #[error("{0}")]
    InvalidParameter(#[from] InvalidParameterError),

    /// An outbound request body could not be encoded.
    #[error("Failed to encode request: {0}")]
    Encode(#[source] WireError),

    /// The gateway response body could not be decoded.
    #[error("Malformed response: {0}")]
    MalformedResponse(#[source] WireError),

    /// An inbound notification body could not be decoded.
    #[error("Malformed request: {0}")]
    MalformedRequest(#[source] WireError),

    /// A notification signature did not match the recomputed one.
    #[error("Invalid signature.")]
    InvalidSignature,

    /// The gateway rejected the call at protocol level (`return_code=FAIL`).
    #[error("Gateway returned FAIL: {0}")]
    GatewayTransport(GatewayFailure),

    /// The gateway accepted the call but the operation failed (`result_code=FAIL`).
    #[error("Gateway result FAIL: {0}")]
    GatewayBusiness(GatewayFailure),
}

impl Error {
    /// Returns `true` for errors raised before any wire or crypto work,
    /// i.e. errors the caller fixes by changing its options.
    #[must_use]
    pub const fn is_parameter_error(&self) -> bool {
        matches!(self, Self::MissingParameter(_) | Self::InvalidParameter(_))
    }

    /// Returns the gateway failure details, if the gateway reported one.
    #[must_use]
    pub const fn gateway_failure(&self) -> Option<&GatewayFailure> {
        match self {
            Self::GatewayTransport(failure) | Self::GatewayBusiness(failure) => Some(failure),
            _ => None,
        }
    }
}

/// A required option is missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingParameterError {
    /// Name of the missing option (or options, for either-of rules).
    pub name: String,
    /// The sibling condition that made the option required, if any.
    pub condition: Option<String>,
}

impl MissingParameterError {
    /// Creates a new missing-parameter error.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            condition: None,
        }
    }

    /// Records the condition under which the option is required.
    #[must_use]
    pub fn when(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }
}

impl fmt::Display for MissingParameterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "The required option \"{}\" is missing", self.name)?;
        if let Some(condition) = &self.condition {
            write!(f, " (when {condition})")?;
        }
        Ok(())
    }
}

impl std::error::Error for MissingParameterError {}

/// An option has a value outside its allowed type or value set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidParameterError {
    /// Name of the offending option.
    pub name: String,
    /// Human-readable description of what is accepted.
    pub expected: String,
    /// The value that was supplied, rendered for display.
    pub actual: String,
}

impl InvalidParameterError {
    /// Creates a new invalid-parameter error.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

impl fmt::Display for InvalidParameterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "The option \"{}\" with value {} is invalid, expected {}",
            self.name, self.actual, self.expected
        )
    }
}

impl std::error::Error for InvalidParameterError {}

/// Details of a failure reported by the gateway in a response body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewayFailure {
    /// The gateway's human-readable message (`return_msg` or `err_code_des`).
    pub message: String,
    /// The gateway's machine-readable code (`err_code`), business failures only.
    pub code: Option<String>,
}

impl GatewayFailure {
    /// Creates a failure carrying the gateway message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    /// Sets the gateway error code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl fmt::Display for GatewayFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{code}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Convenience alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
