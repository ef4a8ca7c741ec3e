//! Error types for the HTTP transport layer.

use std::path::PathBuf;

use http::StatusCode;

/// Errors that can occur while executing a gateway request.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ClientError {
    /// Building the request or classifying the response failed.
    #[error(transparent)]
    Wxpay(#[from] wxpay::Error),

    /// URL parse error.
    #[cfg(feature = "client")]
    #[error("URL parse error: {context}: {source}")]
    UrlParse {
        /// Human-readable context.
        context: &'static str,
        /// The underlying parse error.
        #[source]
        source: url::ParseError,
    },

    /// HTTP transport error.
    #[cfg(feature = "client")]
    #[error("HTTP error: {context}: {source}")]
    Http {
        /// Human-readable context.
        context: &'static str,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// Unexpected HTTP status code.
    #[error("Unexpected HTTP status {status}: {context}: {body}")]
    HttpStatus {
        /// Human-readable context.
        context: &'static str,
        /// The HTTP status code.
        status: StatusCode,
        /// The response body.
        body: String,
    },

    /// Failed to read response body.
    #[cfg(feature = "client")]
    #[error("Failed to read response body: {context}: {source}")]
    ResponseBodyRead {
        /// Human-readable context.
        context: &'static str,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// A client certificate or key file could not be read.
    #[error("Failed to read client certificate {path}: {source}")]
    CertificateRead {
        /// Path of the unreadable file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The client certificate pair is not a valid PEM identity.
    #[cfg(feature = "client")]
    #[error("Invalid client certificate: {0}")]
    Identity(#[source] reqwest::Error),
}

impl ClientError {
    /// Returns the core error, if the failure came from request building or
    /// response classification.
    #[must_use]
    pub const fn as_wxpay(&self) -> Option<&wxpay::Error> {
        match self {
            Self::Wxpay(err) => Some(err),
            _ => None,
        }
    }

    /// Returns `true` if the gateway itself reported a failure.
    #[must_use]
    pub const fn is_gateway_failure(&self) -> bool {
        matches!(
            self,
            Self::Wxpay(wxpay::Error::GatewayTransport(_) | wxpay::Error::GatewayBusiness(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wxpay::GatewayFailure;

    #[test]
    fn test_gateway_failure_classification() {
        let err: ClientError =
            wxpay::Error::GatewayBusiness(GatewayFailure::new("no such order")).into();
        assert!(err.is_gateway_failure());
        assert_eq!(err.to_string(), "Gateway result FAIL: no such order");

        let err = ClientError::HttpStatus {
            context: "POST /pay/orderquery",
            status: StatusCode::BAD_GATEWAY,
            body: String::new(),
        };
        assert!(!err.is_gateway_failure());
        assert!(err.as_wxpay().is_none());
    }
}
