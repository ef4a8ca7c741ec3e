//! Notification endpoint integration.
//!
//! The gateway expects every notification POST to be answered with an XML
//! acknowledgment. [`handle_notification`] verifies the raw body and picks
//! the matching reply; [`XmlAcknowledgment`] turns that reply into an HTTP
//! response for any `axum`-compatible handler.
//!
//! ```ignore
//! async fn notify(State(handler): State<NotifyHandler>, body: Bytes) -> XmlAcknowledgment {
//!     let (result, ack) = handle_notification(&handler, &body, NotifyOptions::default());
//!     if let Ok(payment) = result {
//!         // record the payment
//!     }
//!     ack
//! }
//! ```

use axum_core::body::Body;
use axum_core::response::{IntoResponse, Response};
use http::StatusCode;
use http::header::CONTENT_TYPE;
use wxpay::{Acknowledgment, Error, FieldMap, NotifyHandler, NotifyOptions};

use crate::constants::XML_CONTENT_TYPE;

/// An [`Acknowledgment`] rendered as an `application/xml` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAcknowledgment(pub Acknowledgment);

impl From<Acknowledgment> for XmlAcknowledgment {
    fn from(ack: Acknowledgment) -> Self {
        Self(ack)
    }
}

impl IntoResponse for XmlAcknowledgment {
    fn into_response(self) -> Response {
        match self.0.to_xml() {
            Ok(bytes) => Response::builder()
                .status(StatusCode::OK)
                .header(CONTENT_TYPE, XML_CONTENT_TYPE)
                .body(Body::from(bytes))
                .expect("valid acknowledgment response"),
            Err(err) => {
                #[cfg(feature = "telemetry")]
                tracing::error!(error = %err, "failed to encode acknowledgment");
                #[cfg(not(feature = "telemetry"))]
                let _ = err;
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

/// Verifies a raw notification body and chooses the reply.
///
/// A verified payload is acknowledged with `SUCCESS`. Any failure is
/// answered with `FAIL` and a short fixed message, which makes the gateway
/// retry the notification later. The full error stays in the returned
/// result.
pub fn handle_notification(
    handler: &NotifyHandler,
    body: &[u8],
    options: NotifyOptions,
) -> (wxpay::Result<FieldMap>, XmlAcknowledgment) {
    let result = handler.handle_bytes(body, options);
    let ack = match &result {
        Ok(_) => Acknowledgment::success(),
        Err(err) => Acknowledgment::fail().with_message(failure_message(err)),
    };
    (result, XmlAcknowledgment(ack))
}

fn failure_message(err: &Error) -> &'static str {
    match err {
        Error::InvalidSignature => "Invalid signature.",
        Error::MalformedRequest(_) => "Malformed request.",
        _ => "Notification rejected.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use wxpay::sign::{self, SignType};
    use wxpay::MerchantConfig;

    fn handler() -> NotifyHandler {
        NotifyHandler::new(Arc::new(
            MerchantConfig::default().with_merchant_key("test_mchkey"),
        ))
    }

    fn notification(key: &str) -> Vec<u8> {
        let mut data = FieldMap::from([
            ("out_trade_no", "T100"),
            ("result_code", "SUCCESS"),
            ("return_code", "SUCCESS"),
            ("total_fee", "1"),
        ]);
        let signature = sign::generate(&data, key, SignType::Md5);
        data.insert("sign", signature);
        wxpay::wire::encode(&data).unwrap()
    }

    async fn body_of(response: Response) -> String {
        let bytes = axum_core::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_success_response() {
        let response = XmlAcknowledgment(Acknowledgment::success()).into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            XML_CONTENT_TYPE
        );
        assert_eq!(
            body_of(response).await,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><xml><return_code>SUCCESS</return_code></xml>"
        );
    }

    #[test]
    fn test_verified_notification() {
        let (result, ack) =
            handle_notification(&handler(), &notification("test_mchkey"), NotifyOptions::default());
        assert_eq!(result.unwrap().get("out_trade_no"), Some("T100"));
        assert!(ack.0.is_success());
    }

    #[tokio::test]
    async fn test_rejected_notification() {
        let (result, ack) =
            handle_notification(&handler(), &notification("wrong_key"), NotifyOptions::default());
        assert!(matches!(result, Err(Error::InvalidSignature)));
        assert!(!ack.0.is_success());
        assert_eq!(ack.0.message(), Some("Invalid signature."));

        let body = body_of(ack.into_response()).await;
        assert!(body.contains("<return_code>FAIL</return_code>"));
        assert!(body.contains("<return_msg>Invalid signature.</return_msg>"));
    }

    #[test]
    fn test_malformed_notification() {
        let (result, ack) = handle_notification(&handler(), b"not xml", NotifyOptions::default());
        assert!(matches!(result, Err(Error::MalformedRequest(_))));
        assert!(!ack.0.is_success());
        assert_eq!(ack.0.message(), Some("Malformed request."));
    }

    #[test]
    fn test_internal_errors_are_not_echoed() {
        let (result, ack) = handle_notification(
            &NotifyHandler::default(),
            &notification("test_mchkey"),
            NotifyOptions::default(),
        );
        assert!(matches!(result, Err(Error::MissingParameter(_))));
        assert_eq!(ack.0.message(), Some("Notification rejected."));
    }
}
