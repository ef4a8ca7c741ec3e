//! Client-side payment parameters.
//!
//! After a unified order returns a `prepay_id`, the merchant server hands
//! the payer's client a signed parameter set that the gateway's JSAPI
//! bridge or mobile SDK uses to open the payment sheet.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::MerchantConfig;
use crate::env::Environment;
use crate::error::Result;
use crate::field::FieldMap;
use crate::request::{OperationOptions, RequestContext};
use crate::schema::{self, OptionBag};
use crate::sign::{self, SignOptions, SignType};
use crate::timestamp::UnixTimestamp;

/// Options for [`ParameterBuilder`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterOptions {
    /// Application id; falls back to the configuration.
    pub app_id: Option<String>,
    /// Merchant id; falls back to the configuration. Used by APP parameters.
    pub merchant_id: Option<String>,
    /// Merchant key; falls back to the configuration.
    pub merchant_key: Option<String>,
    /// Signature algorithm, MD5 by default.
    pub sign_type: Option<SignType>,
    /// Signing time; the current time when absent.
    pub timestamp: Option<UnixTimestamp>,
    /// Nonce; generated when absent.
    pub nonce_str: Option<String>,
    /// Prepay id returned by the unified order. Required.
    pub prepay_id: Option<String>,
}

impl ParameterOptions {
    /// Creates options for `prepay_id`.
    #[must_use]
    pub fn new(prepay_id: impl Into<String>) -> Self {
        Self {
            prepay_id: Some(prepay_id.into()),
            ..Self::default()
        }
    }

    /// Sets the signature algorithm.
    #[must_use]
    pub const fn with_sign_type(mut self, sign_type: SignType) -> Self {
        self.sign_type = Some(sign_type);
        self
    }
}

impl OperationOptions for ParameterOptions {
    const DEFINED_OPTIONS: &'static [&'static str] = &[
        "app_id",
        "merchant_id",
        "merchant_key",
        "sign_type",
        "timestamp",
        "nonce_str",
        "prepay_id",
    ];

    fn from_bag(bag: &OptionBag) -> Result<Self> {
        schema::reject_undefined(bag, Self::DEFINED_OPTIONS)?;
        let timestamp = match schema::string(bag, "timestamp")? {
            Some(raw) => Some(raw.parse().map_err(|_| {
                crate::error::InvalidParameterError::new(
                    "timestamp",
                    "a decimal Unix timestamp",
                    serde_json::Value::from(raw).to_string(),
                )
            })?),
            None => None,
        };
        Ok(Self {
            app_id: schema::string(bag, "app_id")?,
            merchant_id: schema::string(bag, "merchant_id")?,
            merchant_key: schema::string(bag, "merchant_key")?,
            sign_type: schema::choice(bag, "sign_type")?,
            timestamp,
            nonce_str: schema::string(bag, "nonce_str")?,
            prepay_id: schema::string(bag, "prepay_id")?,
        })
    }
}

/// Parameters for the JSAPI bridge (`WeixinJSBridge.invoke("getBrandWCPayRequest", ...)`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsapiParameters {
    /// Application id.
    #[serde(rename = "appId")]
    pub app_id: String,
    /// Signing time.
    #[serde(rename = "timeStamp")]
    pub timestamp: UnixTimestamp,
    /// Nonce.
    #[serde(rename = "nonceStr")]
    pub nonce_str: String,
    /// `prepay_id=<id>`.
    pub package: String,
    /// Signature algorithm.
    #[serde(rename = "signType")]
    pub sign_type: SignType,
    /// Signature over the other fields.
    #[serde(rename = "paySign")]
    pub pay_sign: String,
}

/// Parameters for the mobile app SDK.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppParameters {
    /// Application id.
    pub appid: String,
    /// Merchant id.
    #[serde(rename = "partnerid")]
    pub partner_id: String,
    /// Prepay id.
    #[serde(rename = "prepayid")]
    pub prepay_id: String,
    /// Always `Sign=WXPay`.
    pub package: String,
    /// Nonce.
    #[serde(rename = "noncestr")]
    pub nonce_str: String,
    /// Signing time.
    pub timestamp: UnixTimestamp,
    /// Signature over the other fields.
    pub sign: String,
}

/// Value of the APP `package` parameter.
pub const APP_PACKAGE: &str = "Sign=WXPay";

/// Builds signed client-side payment parameters.
#[derive(Debug, Clone, Default)]
pub struct ParameterBuilder {
    context: RequestContext,
}

impl ParameterBuilder {
    /// Creates a builder with merchant defaults from `config`.
    #[must_use]
    pub fn new(config: Arc<MerchantConfig>) -> Self {
        Self::with_context(RequestContext::new(config))
    }

    /// Creates a builder from a shared context.
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

    /// Builds JSAPI parameters.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MissingParameter`] if `app_id`,
    /// `merchant_key` or `prepay_id` cannot be resolved.
    pub fn jsapi(&self, options: ParameterOptions) -> Result<JsapiParameters> {
        let ctx = &self.context;
        let app_id = ctx.app_id(options.app_id)?;
        let signing = ctx.signing(SignOptions {
            merchant_key: options.merchant_key,
            sign_type: options.sign_type,
        })?;
        let prepay_id = schema::required("prepay_id", options.prepay_id)?;
        let timestamp = ctx.timestamp(options.timestamp);
        let nonce_str = ctx.nonce_str(options.nonce_str);
        let package = format!("prepay_id={prepay_id}");

        let mut fields = FieldMap::new();
        fields
            .insert("appId", app_id.as_str())
            .insert("timeStamp", timestamp.to_string())
            .insert("nonceStr", nonce_str.as_str())
            .insert("package", package.as_str())
            .insert("signType", signing.sign_type.as_str());
        let pay_sign = sign::generate(&fields, &signing.merchant_key, signing.sign_type);

        Ok(JsapiParameters {
            app_id,
            timestamp,
            nonce_str,
            package,
            sign_type: signing.sign_type,
            pay_sign,
        })
    }

    /// Builds JSAPI parameters from untyped options.
    ///
    /// # Errors
    ///
    /// As [`ParameterBuilder::jsapi`], plus [`crate::Error::InvalidParameter`]
    /// for undefined or mistyped options.
    pub fn jsapi_from_bag(&self, bag: &OptionBag) -> Result<JsapiParameters> {
        self.jsapi(ParameterOptions::from_bag(bag)?)
    }

    /// Builds APP parameters.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MissingParameter`] if `app_id`,
    /// `merchant_id`, `merchant_key` or `prepay_id` cannot be resolved.
    pub fn app(&self, options: ParameterOptions) -> Result<AppParameters> {
        let ctx = &self.context;
        let app_id = ctx.app_id(options.app_id)?;
        let partner_id = ctx.merchant_id(options.merchant_id)?;
        let signing = ctx.signing(SignOptions {
            merchant_key: options.merchant_key,
            sign_type: options.sign_type,
        })?;
        let prepay_id = schema::required("prepay_id", options.prepay_id)?;
        let timestamp = ctx.timestamp(options.timestamp);
        let nonce_str = ctx.nonce_str(options.nonce_str);

        let mut fields = FieldMap::new();
        fields
            .insert("appid", app_id.as_str())
            .insert("partnerid", partner_id.as_str())
            .insert("prepayid", prepay_id.as_str())
            .insert("package", APP_PACKAGE)
            .insert("noncestr", nonce_str.as_str())
            .insert("timestamp", timestamp.to_string());
        let sign = sign::generate(&fields, &signing.merchant_key, signing.sign_type);

        Ok(AppParameters {
            appid: app_id,
            partner_id,
            prepay_id,
            package: APP_PACKAGE.to_owned(),
            nonce_str,
            timestamp,
            sign,
        })
    }

    /// Builds APP parameters from untyped options.
    ///
    /// # Errors
    ///
    /// As [`ParameterBuilder::app`], plus [`crate::Error::InvalidParameter`]
    /// for undefined or mistyped options.
    pub fn app_from_bag(&self, bag: &OptionBag) -> Result<AppParameters> {
        self.app(ParameterOptions::from_bag(bag)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::env::FixedEnvironment;
    use serde_json::json;

    fn builder() -> ParameterBuilder {
        let config = MerchantConfig::default()
            .with_app_id("test_appid")
            .with_merchant_id("test_mchid")
            .with_merchant_key("test_mchkey");
        ParameterBuilder::new(Arc::new(config)).with_environment(Arc::new(FixedEnvironment::new(
            "test_noncestr",
            UnixTimestamp::from_secs(1_700_000_000),
            "0.0.0.0",
        )))
    }

    #[test]
    fn test_jsapi() {
        let params = builder().jsapi(ParameterOptions::new("test_prepay_id")).unwrap();
        assert_eq!(params.package, "prepay_id=test_prepay_id");
        assert_eq!(params.sign_type, SignType::Md5);

        let fields = FieldMap::from([
            ("appId", "test_appid"),
            ("timeStamp", "1700000000"),
            ("nonceStr", "test_noncestr"),
            ("package", "prepay_id=test_prepay_id"),
            ("signType", "MD5"),
        ]);
        assert!(sign::verify(&params.pay_sign, &fields, "test_mchkey", SignType::Md5));

        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["appId"], "test_appid");
        assert_eq!(json["timeStamp"], "1700000000");
        assert_eq!(json["signType"], "MD5");
        assert_eq!(json["paySign"], params.pay_sign.as_str());
    }

    #[test]
    fn test_jsapi_hmac() {
        let params = builder()
            .jsapi(ParameterOptions::new("p").with_sign_type(SignType::HmacSha256))
            .unwrap();
        assert_eq!(params.pay_sign.len(), 64);
        let fields = FieldMap::from([
            ("appId", "test_appid"),
            ("timeStamp", "1700000000"),
            ("nonceStr", "test_noncestr"),
            ("package", "prepay_id=p"),
            ("signType", "HMAC-SHA256"),
        ]);
        assert!(sign::verify(&params.pay_sign, &fields, "test_mchkey", SignType::HmacSha256));
    }

    #[test]
    fn test_app() {
        let params = builder().app(ParameterOptions::new("test_prepay_id")).unwrap();
        assert_eq!(params.package, "Sign=WXPay");
        assert_eq!(params.partner_id, "test_mchid");

        let fields = FieldMap::from([
            ("appid", "test_appid"),
            ("partnerid", "test_mchid"),
            ("prepayid", "test_prepay_id"),
            ("package", "Sign=WXPay"),
            ("noncestr", "test_noncestr"),
            ("timestamp", "1700000000"),
        ]);
        assert!(sign::verify(&params.sign, &fields, "test_mchkey", SignType::Md5));

        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["partnerid"], "test_mchid");
        assert_eq!(json["prepayid"], "test_prepay_id");
        assert_eq!(json["noncestr"], "test_noncestr");
    }

    #[test]
    fn test_prepay_id_required() {
        let err = builder().jsapi(ParameterOptions::default()).unwrap_err();
        assert!(matches!(err, Error::MissingParameter(e) if e.name == "prepay_id"));
        let err = builder().app(ParameterOptions::default()).unwrap_err();
        assert!(matches!(err, Error::MissingParameter(e) if e.name == "prepay_id"));
    }

    #[test]
    fn test_from_bag() {
        let bag = json!({ "prepay_id": "p", "timestamp": "42", "nonce_str": "n" });
        let params = builder().app_from_bag(bag.as_object().unwrap()).unwrap();
        assert_eq!(params.timestamp, UnixTimestamp::from_secs(42));
        assert_eq!(params.nonce_str, "n");

        let bag = json!({ "prepay_id": "p", "timestamp": "soon" });
        let err = builder().jsapi_from_bag(bag.as_object().unwrap()).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(e) if e.name == "timestamp"));

        let bag = json!({ "prepay_id": "p", "package": "x" });
        assert!(builder().jsapi_from_bag(bag.as_object().unwrap()).is_err());
    }

    #[test]
    fn test_shared_context_resolution() {
        let config = MerchantConfig::default()
            .with_app_id("ctx_appid")
            .with_merchant_id("ctx_mchid")
            .with_merchant_key("ctx_key");
        let context = RequestContext::new(Arc::new(config)).with_environment(Arc::new(
            FixedEnvironment::new("ctx_nonce", UnixTimestamp::from_secs(7), "127.0.0.1"),
        ));
        let options = ParameterOptions {
            app_id: Some(String::new()),
            nonce_str: Some(String::new()),
            ..ParameterOptions::new("p")
        };
        let params = ParameterBuilder::with_context(context).app(options).unwrap();
        assert_eq!(params.appid, "ctx_appid");
        assert_eq!(params.partner_id, "ctx_mchid");
        assert_eq!(params.nonce_str, "ctx_nonce");
        assert_eq!(params.timestamp, UnixTimestamp::from_secs(7));

        let err = builder().jsapi(ParameterOptions::new("")).unwrap_err();
        assert!(matches!(err, Error::MissingParameter(e) if e.name == "prepay_id"));
    }
}
