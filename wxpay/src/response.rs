//! Gateway response classification.

use crate::error::{Error, GatewayFailure, Result};
use crate::field::FieldMap;
use crate::wire;

/// Value of `return_code` / `result_code` signalling failure.
pub const FAIL: &str = "FAIL";

/// Value of `return_code` / `result_code` signalling success.
pub const SUCCESS: &str = "SUCCESS";

/// Decodes a gateway response and classifies failures.
///
/// `return_code=FAIL` is a transport failure carrying `return_msg`;
/// otherwise `result_code=FAIL` is a business failure carrying
/// `err_code_des` and `err_code`. Anything else is returned unchanged.
///
/// # Errors
///
/// Returns [`Error::MalformedResponse`] if the body does not decode,
/// [`Error::GatewayTransport`] or [`Error::GatewayBusiness`] for reported
/// failures.
pub fn parse(body: &[u8]) -> Result<FieldMap> {
    let fields = wire::decode(body).map_err(Error::MalformedResponse)?;
    classify(fields)
}

/// Classifies an already decoded response.
///
/// # Errors
///
/// See [`parse`].
pub fn classify(fields: FieldMap) -> Result<FieldMap> {
    if fields.get("return_code") == Some(FAIL) {
        let message = fields.get("return_msg").unwrap_or_default();
        return Err(Error::GatewayTransport(GatewayFailure::new(message)));
    }

    if fields.get("result_code") == Some(FAIL) {
        let message = fields.get("err_code_des").unwrap_or_default();
        let mut failure = GatewayFailure::new(message);
        if let Some(code) = fields.get("err_code") {
            failure = failure.with_code(code);
        }
        return Err(Error::GatewayBusiness(failure));
    }

    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::WireError;

    #[test]
    fn test_return_code_fail() {
        let body = b"<xml><return_code>FAIL</return_code><return_msg>invalid mch_id</return_msg></xml>";
        match parse(body).unwrap_err() {
            Error::GatewayTransport(failure) => {
                assert_eq!(failure.message, "invalid mch_id");
                assert!(failure.code.is_none());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_return_code_fail_without_message() {
        let body = b"<xml><return_code>FAIL</return_code><result_code>FAIL</result_code></xml>";
        match parse(body).unwrap_err() {
            Error::GatewayTransport(failure) => assert_eq!(failure.message, ""),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_result_code_fail() {
        let body = b"<xml><return_code>SUCCESS</return_code><result_code>FAIL</result_code>\
<err_code>ORDERNOTEXIST</err_code><err_code_des>order does not exist</err_code_des></xml>";
        match parse(body).unwrap_err() {
            Error::GatewayBusiness(failure) => {
                assert_eq!(failure.message, "order does not exist");
                assert_eq!(failure.code.as_deref(), Some("ORDERNOTEXIST"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_success_is_returned_unchanged() {
        let body = b"<xml><return_code><![CDATA[SUCCESS]]></return_code><return_msg><![CDATA[OK]]></return_msg>\
<result_code>SUCCESS</result_code><prepay_id>wx2117</prepay_id><sign>ABC</sign></xml>";
        let fields = parse(body).unwrap();
        assert_eq!(fields.get("prepay_id"), Some("wx2117"));
        assert_eq!(fields.get("sign"), Some("ABC"));
        assert_eq!(fields.len(), 5);
    }

    #[test]
    fn test_missing_codes_pass_through() {
        let fields = parse(b"<xml><foo>bar</foo></xml>").unwrap();
        assert_eq!(fields.get("foo"), Some("bar"));
    }

    #[test]
    fn test_malformed_response() {
        assert!(matches!(parse(b"<html>"), Err(Error::MalformedResponse(_))));
        assert!(matches!(parse(b"{\"json\": true}"), Err(Error::MalformedResponse(_))));
    }

    #[test]
    fn test_html_error_page_is_malformed() {
        let body = b"<html><title>502 Bad Gateway</title></html>";
        assert!(matches!(
            parse(body),
            Err(Error::MalformedResponse(WireError::UnexpectedRoot(name))) if name == "html"
        ));
    }
}
