//! HTTP-specific constants for the Wxpay gateway.

use std::time::Duration;

/// Content type of notification acknowledgments.
pub const XML_CONTENT_TYPE: &str = "application/xml";

/// Content type sent with outbound request bodies.
pub const REQUEST_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

/// Default request timeout applied by the `client` executor.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
