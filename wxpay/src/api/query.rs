//! Order status lookup.

use std::sync::Arc;

#[cfg(feature = "telemetry")]
use tracing::instrument;

use crate::config::MerchantConfig;
use crate::env::Environment;
use crate::error::Result;
use crate::field::FieldMap;
use crate::request::{
    OperationOptions, RequestContext, RequestDescriptor, WxpayRequest, build_signed_xml_request,
    select_url,
};
use crate::schema::{self, OptionBag};
use crate::sign::{SignOptions, SignType};

/// Primary order query endpoint.
pub const URL: &str = "https://api.mch.weixin.qq.com/pay/orderquery";

/// Secondary order query endpoint.
pub const SECONDARY_URL: &str = "https://api2.mch.weixin.qq.com/pay/orderquery";

/// Options for [`Query`].
///
/// One of `transaction_id` and `out_trade_no` must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Application id; falls back to the configuration.
    pub app_id: Option<String>,
    /// Merchant id; falls back to the configuration.
    pub merchant_id: Option<String>,
    /// Merchant key; falls back to the configuration.
    pub merchant_key: Option<String>,
    /// Signature algorithm, MD5 by default.
    pub sign_type: Option<SignType>,
    /// Request nonce; generated when absent.
    pub nonce_str: Option<String>,
    /// Send to the secondary endpoint.
    pub use_secondary_url: bool,
    /// Gateway transaction id.
    pub transaction_id: Option<String>,
    /// Merchant order number.
    pub out_trade_no: Option<String>,
}

impl QueryOptions {
    /// Looks the order up by gateway transaction id.
    #[must_use]
    pub fn by_transaction_id(transaction_id: impl Into<String>) -> Self {
        Self {
            transaction_id: Some(transaction_id.into()),
            ..Self::default()
        }
    }

    /// Looks the order up by merchant order number.
    #[must_use]
    pub fn by_out_trade_no(out_trade_no: impl Into<String>) -> Self {
        Self {
            out_trade_no: Some(out_trade_no.into()),
            ..Self::default()
        }
    }

    /// Sets the signature algorithm.
    #[must_use]
    pub const fn with_sign_type(mut self, sign_type: SignType) -> Self {
        self.sign_type = Some(sign_type);
        self
    }

    /// Sets the request nonce.
    #[must_use]
    pub fn with_nonce_str(mut self, nonce_str: impl Into<String>) -> Self {
        self.nonce_str = Some(nonce_str.into());
        self
    }

    /// Routes the request to the secondary endpoint.
    #[must_use]
    pub const fn with_secondary_url(mut self) -> Self {
        self.use_secondary_url = true;
        self
    }
}

impl OperationOptions for QueryOptions {
    const DEFINED_OPTIONS: &'static [&'static str] = &[
        "app_id",
        "merchant_id",
        "merchant_key",
        "sign_type",
        "nonce_str",
        "use_secondary_url",
        "transaction_id",
        "out_trade_no",
    ];

    fn from_bag(bag: &OptionBag) -> Result<Self> {
        schema::reject_undefined(bag, Self::DEFINED_OPTIONS)?;
        Ok(Self {
            app_id: schema::string(bag, "app_id")?,
            merchant_id: schema::string(bag, "merchant_id")?,
            merchant_key: schema::string(bag, "merchant_key")?,
            sign_type: schema::choice(bag, "sign_type")?,
            nonce_str: schema::string(bag, "nonce_str")?,
            use_secondary_url: schema::flag(bag, "use_secondary_url")?.unwrap_or_default(),
            transaction_id: schema::string(bag, "transaction_id")?,
            out_trade_no: schema::string(bag, "out_trade_no")?,
        })
    }
}

/// Order query operation.
#[derive(Debug, Clone, Default)]
pub struct Query {
    context: RequestContext,
}

impl Query {
    /// Creates the operation with merchant defaults from `config`.
    #[must_use]
    pub fn new(config: Arc<MerchantConfig>) -> Self {
        Self::with_context(RequestContext::new(config))
    }

    /// Creates the operation from a shared context.
    #[must_use]
    pub const fn with_context(context: RequestContext) -> Self {
        Self { context }
    }

    /// Replaces the environment provider.
    #[must_use]
    pub fn with_environment(mut self, environment: Arc<dyn Environment>) -> Self {
        self.context = self.context.with_environment(environment);
        self
    }
}

impl WxpayRequest for Query {
    type Options = QueryOptions;

    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "wxpay.query.build", skip_all, err)
    )]
    fn build(&self, options: QueryOptions) -> Result<RequestDescriptor> {
        let ctx = &self.context;
        let app_id = ctx.app_id(options.app_id)?;
        let merchant_id = ctx.merchant_id(options.merchant_id)?;
        let signing = ctx.signing(SignOptions {
            merchant_key: options.merchant_key,
            sign_type: options.sign_type,
        })?;
        super::require_order_reference(
            options.transaction_id.as_ref(),
            options.out_trade_no.as_ref(),
        )?;

        let mut fields = FieldMap::new();
        fields
            .insert("appid", app_id)
            .insert("mch_id", merchant_id)
            .insert_opt("transaction_id", options.transaction_id)
            .insert_opt("out_trade_no", options.out_trade_no)
            .insert("nonce_str", ctx.nonce_str(options.nonce_str))
            .insert("sign_type", signing.sign_type.as_str());

        let url = select_url(URL, SECONDARY_URL, options.use_secondary_url);
        build_signed_xml_request(url, fields, &signing, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::env::FixedEnvironment;
    use crate::sign;
    use crate::timestamp::UnixTimestamp;
    use serde_json::json;

    fn query() -> Query {
        let config = MerchantConfig::default()
            .with_app_id("foo")
            .with_merchant_id("bar")
            .with_merchant_key("test_mchkey");
        Query::new(Arc::new(config)).with_environment(Arc::new(FixedEnvironment::new(
            "test_noncestr",
            UnixTimestamp::from_secs(0),
            "127.0.0.1",
        )))
    }

    #[test]
    fn test_build_defaults() {
        let request = query()
            .build(QueryOptions::by_transaction_id("test_transaction_id"))
            .unwrap();
        assert_eq!(request.method, http::Method::POST);
        assert_eq!(request.url, URL);
        assert!(request.client_cert.is_none());

        let mut body = request.fields().unwrap();
        let signature = body.take_signature();
        assert!(sign::verify(&signature, &body, "test_mchkey", SignType::Md5));
        assert_eq!(
            body,
            FieldMap::from([
                ("appid", "foo"),
                ("mch_id", "bar"),
                ("transaction_id", "test_transaction_id"),
                ("nonce_str", "test_noncestr"),
                ("sign_type", "MD5"),
            ])
        );
    }

    #[test]
    fn test_build_secondary_url_and_hmac() {
        let options = QueryOptions {
            out_trade_no: Some("test_out_trade_no".into()),
            ..QueryOptions::by_transaction_id("test_transaction_id")
        }
        .with_sign_type(SignType::HmacSha256)
        .with_secondary_url();
        let request = query().build(options).unwrap();
        assert_eq!(request.url, SECONDARY_URL);

        let mut body = request.fields().unwrap();
        let signature = body.take_signature();
        assert_eq!(signature.len(), 64);
        assert!(sign::verify(&signature, &body, "test_mchkey", SignType::HmacSha256));
        assert_eq!(body.get("out_trade_no"), Some("test_out_trade_no"));
        assert_eq!(body.get("sign_type"), Some("HMAC-SHA256"));
    }

    #[test]
    fn test_requires_order_reference() {
        let err = query().build(QueryOptions::default()).unwrap_err();
        assert!(matches!(err, Error::MissingParameter(e) if e.name == "out_trade_no"));
    }

    #[test]
    fn test_requires_credentials() {
        let err = Query::default()
            .build(QueryOptions::by_out_trade_no("x"))
            .unwrap_err();
        assert!(matches!(err, Error::MissingParameter(e) if e.name == "app_id"));

        let config = MerchantConfig::default().with_app_id("foo").with_merchant_id("bar");
        let err = Query::new(Arc::new(config))
            .build(QueryOptions::by_out_trade_no("x"))
            .unwrap_err();
        assert!(matches!(err, Error::MissingParameter(e) if e.name == "merchant_key"));
    }

    #[test]
    fn test_build_from_bag() {
        let bag = json!({
            "app_id": "override",
            "out_trade_no": "T1",
            "use_secondary_url": true,
            "sign_type": "HMAC-SHA256",
        });
        let request = query().build_from_bag(bag.as_object().unwrap()).unwrap();
        assert_eq!(request.url, SECONDARY_URL);
        assert_eq!(request.fields().unwrap().get("appid"), Some("override"));

        let bag = json!({ "out_trade_no": "T1", "sign_type": "SHA1" });
        let err = query().build_from_bag(bag.as_object().unwrap()).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(e) if e.name == "sign_type"));

        let bag = json!({ "out_trade_no": "T1", "mchkey": "legacy" });
        let err = query().build_from_bag(bag.as_object().unwrap()).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(e) if e.name == "mchkey"));

        let bag = json!({ "out_trade_no": "T1", "use_secondary_url": "yes" });
        assert!(query().build_from_bag(bag.as_object().unwrap()).is_err());
    }

    #[test]
    fn test_empty_order_reference_is_missing() {
        let options = QueryOptions::by_transaction_id("");
        let err = query().build(options).unwrap_err();
        assert!(matches!(err, Error::MissingParameter(e) if e.name == "out_trade_no"));

        let bag = json!({ "transaction_id": "", "out_trade_no": "" });
        let err = query().build_from_bag(bag.as_object().unwrap()).unwrap_err();
        assert!(matches!(err, Error::MissingParameter(e) if e.name == "out_trade_no"));
    }
}
