#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! HTTP transport layer for the Wxpay signed XML payment API.
//!
//! The core `wxpay` crate turns options into signed
//! [`RequestDescriptor`](wxpay::RequestDescriptor)s and parses responses
//! without doing any I/O. This crate sends them and serves notification
//! acknowledgments.
//!
//! # Modules
//!
//! - [`constants`] - Content types and the default timeout
//! - [`error`] - HTTP transport error types
//! - [`client`] - Async `reqwest` executor with client certificates (feature: `client`)
//! - [`notify`] - Acknowledgment responses for notification handlers (feature: `server`)
//!
//! # Feature Flags
//!
//! - `client` - Enables the async `WxpayClient` executor
//! - `server` - Enables `axum` integration for notification endpoints
//! - `telemetry` - Enables tracing instrumentation

pub mod constants;
pub mod error;

#[cfg(feature = "client")]
pub mod client;

#[cfg(feature = "server")]
pub mod notify;

pub use error::ClientError;

#[cfg(feature = "client")]
pub use client::WxpayClient;

#[cfg(feature = "server")]
pub use notify::{XmlAcknowledgment, handle_notification};
