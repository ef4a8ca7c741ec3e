//! Refunds of paid orders.
//!
//! The refund endpoint is secured: the request must be sent with the
//! merchant's client certificate, which is carried on the returned
//! [`RequestDescriptor`].

use std::path::PathBuf;
use std::sync::Arc;

#[cfg(feature = "telemetry")]
use tracing::instrument;

use super::{FeeType, wire_enum};
use crate::config::MerchantConfig;
use crate::env::Environment;
use crate::error::Result;
use crate::field::FieldMap;
use crate::request::{
    OperationOptions, RequestContext, RequestDescriptor, WxpayRequest, build_signed_xml_request,
};
use crate::schema::{self, OptionBag};
use crate::sign::{SignOptions, SignType};

/// Refund endpoint.
pub const URL: &str = "https://api.mch.weixin.qq.com/secapi/pay/refund";

wire_enum! {
    /// Funding source of a refund.
    RefundAccount, "refund_account" {
        /// Refund from unsettled funds.
        UnsettledFunds => "REFUND_SOURCE_UNSETTLED_FUNDS",
        /// Refund from the merchant's recharged balance.
        RechargeFunds => "REFUND_SOURCE_RECHARGE_FUNDS",
    }
}

/// Options for [`Refund`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefundOptions {
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
    /// Gateway transaction id of the paid order.
    pub transaction_id: Option<String>,
    /// Merchant order number of the paid order.
    pub out_trade_no: Option<String>,
    /// Merchant refund number. Required.
    pub out_refund_no: Option<String>,
    /// Order total in the smallest currency unit. Required.
    pub total_fee: Option<u64>,
    /// Refunded amount in the smallest currency unit. Required.
    pub refund_fee: Option<u64>,
    /// Refund currency.
    pub refund_fee_type: Option<FeeType>,
    /// Reason shown to the payer.
    pub refund_desc: Option<String>,
    /// Funding source.
    pub refund_account: Option<RefundAccount>,
    /// Refund result callback URL.
    pub notify_url: Option<String>,
}

impl RefundOptions {
    /// Creates options refunding `refund_fee` of an order totalling
    /// `total_fee`, identified by merchant order number.
    #[must_use]
    pub fn new(
        out_trade_no: impl Into<String>,
        out_refund_no: impl Into<String>,
        total_fee: u64,
        refund_fee: u64,
    ) -> Self {
        Self {
            out_trade_no: Some(out_trade_no.into()),
            out_refund_no: Some(out_refund_no.into()),
            total_fee: Some(total_fee),
            refund_fee: Some(refund_fee),
            ..Self::default()
        }
    }

    /// Sets the refund reason.
    #[must_use]
    pub fn with_refund_desc(mut self, desc: impl Into<String>) -> Self {
        self.refund_desc = Some(desc.into());
        self
    }

    /// Sets the funding source.
    #[must_use]
    pub const fn with_refund_account(mut self, account: RefundAccount) -> Self {
        self.refund_account = Some(account);
        self
    }

    /// Sets the refund result callback URL.
    #[must_use]
    pub fn with_notify_url(mut self, url: impl Into<String>) -> Self {
        self.notify_url = Some(url.into());
        self
    }
}

impl OperationOptions for RefundOptions {
    const DEFINED_OPTIONS: &'static [&'static str] = &[
        "app_id",
        "merchant_id",
        "merchant_key",
        "client_cert_path",
        "client_key_path",
        "sign_type",
        "nonce_str",
        "transaction_id",
        "out_trade_no",
        "out_refund_no",
        "total_fee",
        "refund_fee",
        "refund_fee_type",
        "refund_desc",
        "refund_account",
        "notify_url",
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
            transaction_id: schema::string(bag, "transaction_id")?,
            out_trade_no: schema::string(bag, "out_trade_no")?,
            out_refund_no: schema::string(bag, "out_refund_no")?,
            total_fee: schema::int(bag, "total_fee")?,
            refund_fee: schema::int(bag, "refund_fee")?,
            refund_fee_type: schema::choice(bag, "refund_fee_type")?,
            refund_desc: schema::string(bag, "refund_desc")?,
            refund_account: schema::choice(bag, "refund_account")?,
            notify_url: schema::string(bag, "notify_url")?,
        })
    }
}

/// Refund operation.
#[derive(Debug, Clone, Default)]
pub struct Refund {
    context: RequestContext,
}

impl Refund {
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

impl WxpayRequest for Refund {
    type Options = RefundOptions;

    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "wxpay.refund.build", skip_all, err)
    )]
    fn build(&self, options: RefundOptions) -> Result<RequestDescriptor> {
        let ctx = &self.context;
        let app_id = ctx.app_id(options.app_id)?;
        let merchant_id = ctx.merchant_id(options.merchant_id)?;
        let signing = ctx.signing(SignOptions {
            merchant_key: options.merchant_key,
            sign_type: options.sign_type,
        })?;
        let client_cert = ctx.client_certificate(options.client_cert_path, options.client_key_path)?;
        let out_refund_no = schema::required("out_refund_no", options.out_refund_no)?;
        let total_fee = schema::required("total_fee", options.total_fee)?;
        let refund_fee = schema::required("refund_fee", options.refund_fee)?;
        super::require_order_reference(
            options.transaction_id.as_ref(),
            options.out_trade_no.as_ref(),
        )?;

        let mut fields = FieldMap::new();
        fields
            .insert("appid", app_id)
            .insert("mch_id", merchant_id)
            .insert("sign_type", signing.sign_type.as_str())
            .insert("nonce_str", ctx.nonce_str(options.nonce_str))
            .insert_opt("transaction_id", options.transaction_id)
            .insert_opt("out_trade_no", options.out_trade_no)
            .insert("out_refund_no", out_refund_no)
            .insert("total_fee", total_fee.to_string())
            .insert("refund_fee", refund_fee.to_string())
            .insert_opt("refund_fee_type", options.refund_fee_type)
            .insert_opt("refund_desc", options.refund_desc)
            .insert_opt("refund_account", options.refund_account)
            .insert_opt("notify_url", options.notify_url);

        build_signed_xml_request(URL, fields, &signing, Some(client_cert))
    }
}
