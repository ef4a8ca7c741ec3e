#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for the Wxpay signed XML payment API.
//!
//! This crate builds correctly signed gateway requests, classifies gateway
//! responses and authenticates asynchronous payment notifications. It
//! performs no network I/O: operations produce a [`RequestDescriptor`]
//! that any HTTP transport can send (see the `wxpay-http` crate).
//!
//! # Overview
//!
//! Every document exchanged with the gateway is a flat `<xml>` map of
//! string fields carrying a `sign` field. The signature is an uppercase hex
//! MD5 or HMAC-SHA256 digest over the remaining fields in ascending key
//! order, keyed by the merchant key.
//!
//! ```
//! use std::sync::Arc;
//! use wxpay::api::{Query, QueryOptions};
//! use wxpay::{MerchantConfig, WxpayRequest};
//!
//! let config = MerchantConfig::default()
//!     .with_app_id("wx85bbb9f0e9460321")
//!     .with_merchant_id("1619665394")
//!     .with_merchant_key("c2dd2e64a672e5e1b82c019be848c2df");
//! let request = Query::new(Arc::new(config))
//!     .build(QueryOptions::by_out_trade_no("T100"))
//!     .unwrap();
//! assert_eq!(request.url, wxpay::api::query::URL);
//! ```
//!
//! # Modules
//!
//! - [`api`] - Gateway operations: query, refund, transfer, unified order
//! - [`config`] - Merchant credentials and configuration file loading
//! - [`env`] - Injected nonce, timestamp and client IP providers
//! - [`notify`] - Payment notification verification and acknowledgment
//! - [`parameter`] - Client-side JSAPI / APP payment parameters
//! - [`sign`] - Canonical signature generation and verification
//! - [`wire`] - Flat XML codec
//!
//! # Feature Flags
//!
//! - `telemetry` - Enables tracing instrumentation for request building and
//!   notification handling

pub mod api;
pub mod config;
pub mod env;
pub mod error;
pub mod field;
pub mod notify;
pub mod parameter;
pub mod request;
pub mod response;
pub mod schema;
pub mod sign;
pub mod timestamp;
pub mod wire;

pub use config::{ConfigError, MerchantConfig};
pub use env::{Environment, FixedEnvironment, SystemEnvironment};
pub use error::{Error, GatewayFailure, InvalidParameterError, MissingParameterError, Result};
pub use field::FieldMap;
pub use notify::{Acknowledgment, NotifyHandler, NotifyOptions};
pub use parameter::{AppParameters, JsapiParameters, ParameterBuilder, ParameterOptions};
pub use request::{
    ClientCertificate, OperationOptions, RequestContext, RequestDescriptor, WxpayRequest,
};
pub use schema::OptionBag;
pub use sign::{SignOptions, SignType, Signer};
pub use timestamp::UnixTimestamp;
