//! Prepay order creation.
//!
//! A successful response carries the `prepay_id` that the client-side
//! payment parameters in [`crate::parameter`] are built from.

use std::sync::Arc;

use chrono::NaiveDateTime;
#[cfg(feature = "telemetry")]
use tracing::instrument;

use super::{FeeType, wire_enum};
use crate::config::MerchantConfig;
use crate::env::Environment;
use crate::error::{MissingParameterError, Result};
use crate::field::FieldMap;
use crate::request::{
    OperationOptions, RequestContext, RequestDescriptor, WxpayRequest, build_signed_xml_request,
    select_url,
};
use crate::schema::{self, DATETIME_FORMAT, OptionBag};
use crate::sign::{SignOptions, SignType};

/// Primary unified order endpoint.
pub const URL: &str = "https://api.mch.weixin.qq.com/pay/unifiedorder";

/// Secondary unified order endpoint.
pub const SECONDARY_URL: &str = "https://api2.mch.weixin.qq.com/pay/unifiedorder";

wire_enum! {
    /// Payment channel the prepay order is created for.
    TradeType, "trade_type" {
        /// In-app browser / official account payment; requires `openid`.
        Jsapi => "JSAPI",
        /// QR code payment; requires `product_id`.
        Native => "NATIVE",
        /// Native mobile app payment.
        App => "APP",
        /// Mobile web payment.
        Mweb => "MWEB",
    }
}

wire_enum! {
    /// Restriction on payment instruments.
    LimitPay, "limit_pay" {
        /// Disallow credit cards.
        NoCredit => "no_credit",
    }
}

wire_enum! {
    /// Electronic receipt flag.
    Receipt, "receipt" {
        /// Issue an electronic receipt.
        Yes => "Y",
    }
}

wire_enum! {
    /// Profit sharing flag.
    ProfitSharing, "profit_sharing" {
        /// The order takes part in profit sharing.
        Yes => "Y",
        /// The order does not take part in profit sharing.
        No => "N",
    }
}

/// Options for [`UnifiedOrder`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnifiedOrderOptions {
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
    /// Payer IP (`spbill_create_ip`); taken from the environment when absent.
    pub client_ip: Option<String>,
    /// Send to the secondary endpoint.
    pub use_secondary_url: bool,
    /// Terminal device id.
    pub device_info: Option<String>,
    /// Product description. Required.
    pub body: Option<String>,
    /// Product detail.
    pub detail: Option<String>,
    /// Merchant data echoed back in the notification.
    pub attach: Option<String>,
    /// Merchant order number. Required.
    pub out_trade_no: Option<String>,
    /// Currency.
    pub fee_type: Option<FeeType>,
    /// Amount in the smallest currency unit. Required.
    pub total_fee: Option<u64>,
    /// Order creation time.
    pub time_start: Option<NaiveDateTime>,
    /// Order expiry time.
    pub time_expire: Option<NaiveDateTime>,
    /// Coupon tag.
    pub goods_tag: Option<String>,
    /// Payment notification callback URL. Required.
    pub notify_url: Option<String>,
    /// Payment channel. Required.
    pub trade_type: Option<TradeType>,
    /// Product id, required for [`TradeType::Native`].
    pub product_id: Option<String>,
    /// Payment instrument restriction.
    pub limit_pay: Option<LimitPay>,
    /// Payer open id, required for [`TradeType::Jsapi`].
    pub openid: Option<String>,
    /// Electronic receipt flag.
    pub receipt: Option<Receipt>,
    /// Profit sharing flag.
    pub profit_sharing: Option<ProfitSharing>,
    /// Scene information (JSON string).
    pub scene_info: Option<String>,
}

impl UnifiedOrderOptions {
    /// Creates options with every gateway-required field.
    #[must_use]
    pub fn new(
        body: impl Into<String>,
        out_trade_no: impl Into<String>,
        total_fee: u64,
        notify_url: impl Into<String>,
        trade_type: TradeType,
    ) -> Self {
        Self {
            body: Some(body.into()),
            out_trade_no: Some(out_trade_no.into()),
            total_fee: Some(total_fee),
            notify_url: Some(notify_url.into()),
            trade_type: Some(trade_type),
            ..Self::default()
        }
    }

    /// Sets the payer open id.
    #[must_use]
    pub fn with_openid(mut self, openid: impl Into<String>) -> Self {
        self.openid = Some(openid.into());
        self
    }

    /// Sets the product id.
    #[must_use]
    pub fn with_product_id(mut self, product_id: impl Into<String>) -> Self {
        self.product_id = Some(product_id.into());
        self
    }

    /// Sets the order validity window.
    #[must_use]
    pub const fn with_time_window(mut self, start: NaiveDateTime, expire: NaiveDateTime) -> Self {
        self.time_start = Some(start);
        self.time_expire = Some(expire);
        self
    }

    /// Sets the signature algorithm.
    #[must_use]
    pub const fn with_sign_type(mut self, sign_type: SignType) -> Self {
        self.sign_type = Some(sign_type);
        self
    }

    /// Routes the request to the secondary endpoint.
    #[must_use]
    pub const fn with_secondary_url(mut self) -> Self {
        self.use_secondary_url = true;
        self
    }
}

impl OperationOptions for UnifiedOrderOptions {
    const DEFINED_OPTIONS: &'static [&'static str] = &[
        "app_id",
        "merchant_id",
        "merchant_key",
        "sign_type",
        "nonce_str",
        "client_ip",
        "use_secondary_url",
        "device_info",
        "body",
        "detail",
        "attach",
        "out_trade_no",
        "fee_type",
        "total_fee",
        "time_start",
        "time_expire",
        "goods_tag",
        "notify_url",
        "trade_type",
        "product_id",
        "limit_pay",
        "openid",
        "receipt",
        "profit_sharing",
        "scene_info",
    ];

    fn from_bag(bag: &OptionBag) -> Result<Self> {
        schema::reject_undefined(bag, Self::DEFINED_OPTIONS)?;
        Ok(Self {
            app_id: schema::string(bag, "app_id")?,
            merchant_id: schema::string(bag, "merchant_id")?,
            merchant_key: schema::string(bag, "merchant_key")?,
            sign_type: schema::choice(bag, "sign_type")?,
            nonce_str: schema::string(bag, "nonce_str")?,
            client_ip: schema::string(bag, "client_ip")?,
            use_secondary_url: schema::flag(bag, "use_secondary_url")?.unwrap_or_default(),
            device_info: schema::string(bag, "device_info")?,
            body: schema::string(bag, "body")?,
            detail: schema::string(bag, "detail")?,
            attach: schema::string(bag, "attach")?,
            out_trade_no: schema::string(bag, "out_trade_no")?,
            fee_type: schema::choice(bag, "fee_type")?,
            total_fee: schema::int(bag, "total_fee")?,
            time_start: schema::datetime(bag, "time_start")?,
            time_expire: schema::datetime(bag, "time_expire")?,
            goods_tag: schema::string(bag, "goods_tag")?,
            notify_url: schema::string(bag, "notify_url")?,
            trade_type: schema::choice(bag, "trade_type")?,
            product_id: schema::string(bag, "product_id")?,
            limit_pay: schema::choice(bag, "limit_pay")?,
            openid: schema::string(bag, "openid")?,
            receipt: schema::choice(bag, "receipt")?,
            profit_sharing: schema::choice(bag, "profit_sharing")?,
            scene_info: schema::string(bag, "scene_info")?,
        })
    }
}

/// Unified order operation.
#[derive(Debug, Clone, Default)]
pub struct UnifiedOrder {
    context: RequestContext,
}

impl UnifiedOrder {
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

impl WxpayRequest for UnifiedOrder {
    type Options = UnifiedOrderOptions;

    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "wxpay.unifiedorder.build", skip_all, err)
    )]
    fn build(&self, options: UnifiedOrderOptions) -> Result<RequestDescriptor> {
        let ctx = &self.context;
        let app_id = ctx.app_id(options.app_id)?;
        let merchant_id = ctx.merchant_id(options.merchant_id)?;
        let signing = ctx.signing(SignOptions {
            merchant_key: options.merchant_key,
            sign_type: options.sign_type,
        })?;
        let body = schema::required("body", options.body)?;
        let out_trade_no = schema::required("out_trade_no", options.out_trade_no)?;
        let total_fee = schema::required("total_fee", options.total_fee)?;
        let notify_url = schema::required("notify_url", options.notify_url)?;
        let trade_type = schema::required("trade_type", options.trade_type)?;
        if trade_type == TradeType::Native
            && schema::present(options.product_id.as_ref()).is_none()
        {
            return Err(MissingParameterError::new("product_id")
                .when("\"trade_type\" is \"NATIVE\"")
                .into());
        }
        if trade_type == TradeType::Jsapi
            && schema::present(options.openid.as_ref()).is_none()
        {
            return Err(MissingParameterError::new("openid")
                .when("\"trade_type\" is \"JSAPI\"")
                .into());
        }

        let mut fields = FieldMap::new();
        fields
            .insert("appid", app_id)
            .insert("mch_id", merchant_id)
            .insert_opt("device_info", options.device_info)
            .insert("nonce_str", ctx.nonce_str(options.nonce_str))
            .insert("sign_type", signing.sign_type.as_str())
            .insert("body", body)
            .insert_opt("detail", options.detail)
            .insert_opt("attach", options.attach)
            .insert("out_trade_no", out_trade_no)
            .insert_opt("fee_type", options.fee_type)
            .insert("total_fee", total_fee.to_string())
            .insert("spbill_create_ip", ctx.client_ip(options.client_ip))
            .insert_opt(
                "time_start",
                options.time_start.map(|t| t.format(DATETIME_FORMAT)),
            )
            .insert_opt(
                "time_expire",
                options.time_expire.map(|t| t.format(DATETIME_FORMAT)),
            )
            .insert_opt("goods_tag", options.goods_tag)
            .insert("notify_url", notify_url)
            .insert("trade_type", trade_type.as_str())
            .insert_opt("product_id", options.product_id)
            .insert_opt("limit_pay", options.limit_pay)
            .insert_opt("openid", options.openid)
            .insert_opt("receipt", options.receipt)
            .insert_opt("profit_sharing", options.profit_sharing)
            .insert_opt("scene_info", options.scene_info);

        let url = select_url(URL, SECONDARY_URL, options.use_secondary_url);
        build_signed_xml_request(url, fields, &signing, None)
    }
}
