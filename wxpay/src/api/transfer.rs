//! Payouts to a user's wallet balance.
//!
//! Like refunds, transfers go to a secured endpoint and carry the client
//! certificate. The wire names differ from the other operations
//! (`mch_appid`, `mchid`) and `sign_type` is used for signing only: the
//! endpoint does not accept it as a field.

use std::path::PathBuf;
use std::sync::Arc;

#[cfg(feature = "telemetry")]
use tracing::instrument;

use super::wire_enum;
use crate::config::MerchantConfig;
use crate::env::Environment;
use crate::error::{MissingParameterError, Result};
use crate::field::FieldMap;
use crate::request::{
    OperationOptions, RequestContext, RequestDescriptor, WxpayRequest, build_signed_xml_request,
};
use crate::schema::{self, OptionBag};
use crate::sign::{SignOptions, SignType};

/// Transfer endpoint.
pub const URL: &str = "https://api.mch.weixin.qq.com/mmpaymkttransfers/promotion/transfers";

wire_enum! {
    /// Payee real-name check mode.
    #[derive(Default)]
    CheckName, "check_name" {
        /// Do not check the payee's name.
        #[default]
        NoCheck => "NO_CHECK",
        /// Require `re_user_name` to match the payee's verified name.
        ForceCheck => "FORCE_CHECK",
    }
}

/// Options for [`Transfer`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferOptions {
    /// Application id; falls back to the configuration.
    pub app_id: Option<String>,
    /// Merchant id; falls back to the configuration.
    pub merchant_id: Option<String>,
    /// Merchant key; falls back to the configuration.
    pub merchant_key: Option<String>,
    /// Client certificate path; falls back to the configuration.
    pub client_cert_path: Option<PathBuf>,
    /// Client key path; falls back to the configuration.
    pub client_key_path: Option<PathBuf>,
    /// Signature algorithm, MD5 by default.
    pub sign_type: Option<SignType>,
    /// Request nonce; generated when absent.
    pub nonce_str: Option<String>,
    /// Requesting IP (`spbill_create_ip`); taken from the environment when absent.
    pub client_ip: Option<String>,
    /// Terminal device id.
    pub device_info: Option<String>,
    /// Merchant transfer number. Required.
    pub partner_trade_no: Option<String>,
    /// Payee open id. Required.
    pub openid: Option<String>,
    /// Name check mode, `NO_CHECK` by default.
    pub check_name: Option<CheckName>,
    /// Payee real name, required with [`CheckName::ForceCheck`].
    pub re_user_name: Option<String>,
    /// Amount in the smallest currency unit. Required.
    pub amount: Option<u64>,
    /// Transfer note. Required.
    pub desc: Option<String>,
    /// Payout scene.
    pub scene: Option<String>,
    /// Brand id.
    pub brand_id: Option<u64>,
    /// Template id for the payee notification.
    pub finder_template_id: Option<String>,
}

impl TransferOptions {
    /// Creates options paying `amount` to `openid`.
    #[must_use]
    pub fn new(
        partner_trade_no: impl Into<String>,
        openid: impl Into<String>,
        amount: u64,
        desc: impl Into<String>,
    ) -> Self {
        Self {
            partner_trade_no: Some(partner_trade_no.into()),
            openid: Some(openid.into()),
            amount: Some(amount),
            desc: Some(desc.into()),
            ..Self::default()
        }
    }

    /// Requires the payee's real name to match `name`.
    #[must_use]
    pub fn with_forced_name_check(mut self, name: impl Into<String>) -> Self {
        self.check_name = Some(CheckName::ForceCheck);
        self.re_user_name = Some(name.into());
        self
    }

    /// Sets the signature algorithm.
    #[must_use]
    pub const fn with_sign_type(mut self, sign_type: SignType) -> Self {
        self.sign_type = Some(sign_type);
        self
    }
}

impl OperationOptions for TransferOptions {
    const DEFINED_OPTIONS: &'static [&'static str] = &[
        "app_id",
        "merchant_id",
        "merchant_key",
        "client_cert_path",
        "client_key_path",
        "sign_type",
        "nonce_str",
        "client_ip",
        "device_info",
        "partner_trade_no",
        "openid",
        "check_name",
        "re_user_name",
        "amount",
        "desc",
        "scene",
        "brand_id",
        "finder_template_id",
    ];

    fn from_bag(bag: &OptionBag) -> Result<Self> {
        schema::reject_undefined(bag, Self::DEFINED_OPTIONS)?;
        Ok(Self {
            app_id: schema::string(bag, "app_id")?,
            merchant_id: schema::string(bag, "merchant_id")?,
            merchant_key: schema::string(bag, "merchant_key")?,
            client_cert_path: schema::path(bag, "client_cert_path")?,
            client_key_path: schema::path(bag, "client_key_path")?,
            sign_type: schema::choice(bag, "sign_type")?,
            nonce_str: schema::string(bag, "nonce_str")?,
            client_ip: schema::string(bag, "client_ip")?,
            device_info: schema::string(bag, "device_info")?,
            partner_trade_no: schema::string(bag, "partner_trade_no")?,
            openid: schema::string(bag, "openid")?,
            check_name: schema::choice(bag, "check_name")?,
            re_user_name: schema::string(bag, "re_user_name")?,
            amount: schema::int(bag, "amount")?,
            desc: schema::string(bag, "desc")?,
            scene: schema::string(bag, "scene")?,
            brand_id: schema::int(bag, "brand_id")?,
            finder_template_id: schema::string(bag, "finder_template_id")?,
        })
    }
}

/// Transfer operation.
#[derive(Debug, Clone, Default)]
pub struct Transfer {
    context: RequestContext,
}

impl Transfer {
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

impl WxpayRequest for Transfer {
    type Options = TransferOptions;

    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "wxpay.transfer.build", skip_all, err)
    )]
    fn build(&self, options: TransferOptions) -> Result<RequestDescriptor> {
        let ctx = &self.context;
        let app_id = ctx.app_id(options.app_id)?;
        let merchant_id = ctx.merchant_id(options.merchant_id)?;
        let signing = ctx.signing(SignOptions {
            merchant_key: options.merchant_key,
            sign_type: options.sign_type,
        })?;
        let client_cert = ctx.client_certificate(options.client_cert_path, options.client_key_path)?;
        let partner_trade_no = schema::required("partner_trade_no", options.partner_trade_no)?;
        let openid = schema::required("openid", options.openid)?;
        let amount = schema::required("amount", options.amount)?;
        let desc = schema::required("desc", options.desc)?;
        let check_name = options.check_name.unwrap_or_default();
        if check_name == CheckName::ForceCheck
            && schema::present(options.re_user_name.as_ref()).is_none()
        {
            return Err(MissingParameterError::new("re_user_name")
                .when("\"check_name\" is \"FORCE_CHECK\"")
                .into());
        }

        let mut fields = FieldMap::new();
        fields
            .insert("mch_appid", app_id)
            .insert("mchid", merchant_id)
            .insert_opt("device_info", options.device_info)
            .insert("nonce_str", ctx.nonce_str(options.nonce_str))
            .insert("partner_trade_no", partner_trade_no)
            .insert("openid", openid)
            .insert("check_name", check_name.as_str())
            .insert_opt("re_user_name", options.re_user_name)
            .insert("amount", amount.to_string())
            .insert("desc", desc)
            .insert("spbill_create_ip", ctx.client_ip(options.client_ip))
            .insert_opt("scene", options.scene)
            .insert_opt("brand_id", options.brand_id)
            .insert_opt("finder_template_id", options.finder_template_id);

        build_signed_xml_request(URL, fields, &signing, Some(client_cert))
    }
}
