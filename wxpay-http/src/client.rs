//! Async executor for gateway requests.
//!
//! [`WxpayClient`] sends [`RequestDescriptor`]s built by the `wxpay` crate
//! and classifies the responses.
//!
//! ## Features
//!
//! - Uses `reqwest` for async HTTP requests
//! - Presents the merchant client certificate on secured endpoints, with one
//!   cached `reqwest::Client` per certificate pair
//! - Supports an optional timeout and base URL override (proxies, tests)
//! - Integrates with `tracing` if the `telemetry` feature is enabled
//!
//! ## Error Handling
//!
//! [`ClientError`] separates transport failures (connection, non-200
//! status, unreadable body, bad certificate) from failures reported by the
//! gateway in the response body, which surface as [`ClientError::Wxpay`].

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use http::header::CONTENT_TYPE;
use reqwest::{Client, Identity};
use tokio::sync::RwLock;
use url::Url;
use wxpay::{ClientCertificate, FieldMap, OptionBag, RequestDescriptor, WxpayRequest};

#[cfg(feature = "telemetry")]
use tracing::{Span, instrument};

use crate::constants::{DEFAULT_TIMEOUT, REQUEST_CONTENT_TYPE};
use crate::error::ClientError;

/// Cache of certificate-bearing clients keyed by certificate pair.
type IdentityCache = RwLock<HashMap<ClientCertificate, Client>>;

/// A client for executing signed gateway requests.
#[derive(Clone, Debug)]
pub struct WxpayClient {
    /// Shared client for endpoints without a certificate
    client: Client,
    /// Optional replacement for the scheme, host and port of every request
    base_url: Option<Url>,
    /// Optional request timeout
    timeout: Option<Duration>,
    /// Clients with a client certificate attached, shared across clones
    identities: Arc<IdentityCache>,
}

impl Default for WxpayClient {
    fn default() -> Self {
        Self::new()
    }
}

impl WxpayClient {
    /// Creates a client with the default timeout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: None,
            timeout: Some(DEFAULT_TIMEOUT),
            identities: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Uses `client` for requests without a client certificate.
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Sets a timeout for all future requests.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Disables the request timeout.
    #[must_use]
    pub const fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    /// Sends every request to `base_url`, keeping only the endpoint path.
    #[must_use]
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Returns the configured timeout, if any.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Returns the base URL override, if any.
    #[must_use]
    pub const fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Builds, sends and parses one operation.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Wxpay`] if the options do not resolve or the
    /// gateway reports a failure, and a transport variant if the exchange
    /// itself fails.
    pub async fn execute<R>(&self, request: &R, options: R::Options) -> Result<FieldMap, ClientError>
    where
        R: WxpayRequest + Sync,
        R::Options: Send,
    {
        let descriptor = request.build(options)?;
        let body = self.send(&descriptor).await?;
        Ok(request.parse_response(&body)?)
    }

    /// Builds, sends and parses one operation from an untyped option bag.
    ///
    /// # Errors
    ///
    /// As [`WxpayClient::execute`], plus [`wxpay::Error::InvalidParameter`]
    /// for undefined or mistyped options.
    pub async fn execute_bag<R>(&self, request: &R, bag: &OptionBag) -> Result<FieldMap, ClientError>
    where
        R: WxpayRequest + Sync,
    {
        let descriptor = request.build_from_bag(bag)?;
        let body = self.send(&descriptor).await?;
        Ok(request.parse_response(&body)?)
    }

    /// Sends a descriptor and returns the raw response body.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the URL is invalid, the certificate cannot
    /// be loaded, the request fails or the status is not `200 OK`.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "wxpay.client.send", skip_all, err, fields(url = %descriptor.url))
    )]
    pub async fn send(&self, descriptor: &RequestDescriptor) -> Result<Vec<u8>, ClientError> {
        let context = "POST gateway";
        let url = self.resolve_url(&descriptor.url)?;
        let client = self.client_for(descriptor.client_cert.as_ref()).await?;

        let mut req = client
            .request(descriptor.method.clone(), url)
            .header(CONTENT_TYPE, REQUEST_CONTENT_TYPE)
            .body(descriptor.body.clone());
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        let http_response = req
            .send()
            .await
            .map_err(|e| ClientError::Http { context, source: e })?;

        let status = http_response.status();
        let result = if status == StatusCode::OK {
            http_response
                .bytes()
                .await
                .map(|bytes| bytes.to_vec())
                .map_err(|e| ClientError::ResponseBodyRead { context, source: e })
        } else {
            let body = http_response
                .text()
                .await
                .map_err(|e| ClientError::ResponseBodyRead { context, source: e })?;
            Err(ClientError::HttpStatus {
                context,
                status,
                body,
            })
        };

        record_result_on_span(&result);

        result
    }

    fn resolve_url(&self, url: &str) -> Result<Url, ClientError> {
        let url = Url::parse(url).map_err(|e| ClientError::UrlParse {
            context: "Failed to parse endpoint URL",
            source: e,
        })?;
        let Some(base) = &self.base_url else {
            return Ok(url);
        };
        let mut target = base.clone();
        target.set_path(url.path());
        target.set_query(url.query());
        Ok(target)
    }

    async fn client_for(&self, cert: Option<&ClientCertificate>) -> Result<Client, ClientError> {
        let Some(cert) = cert else {
            return Ok(self.client.clone());
        };

        if let Some(client) = self.identities.read().await.get(cert) {
            return Ok(client.clone());
        }

        #[cfg(feature = "telemetry")]
        tracing::info!(cert = %cert.cert.display(), "wxpay.client.identity_cache_miss");

        let identity = load_identity(cert).await?;
        let client = Client::builder()
            .identity(identity)
            .build()
            .map_err(ClientError::Identity)?;
        self.identities
            .write()
            .await
            .insert(cert.clone(), client.clone());
        Ok(client)
    }
}

/// Reads the PEM key and certificate into a single `reqwest` identity.
async fn load_identity(cert: &ClientCertificate) -> Result<Identity, ClientError> {
    let mut pem = read_pem(&cert.key).await?;
    pem.push(b'\n');
    pem.extend(read_pem(&cert.cert).await?);
    Identity::from_pem(&pem).map_err(ClientError::Identity)
}

async fn read_pem(path: &std::path::Path) -> Result<Vec<u8>, ClientError> {
    tokio::fs::read(path)
        .await
        .map_err(|source| ClientError::CertificateRead {
            path: path.to_path_buf(),
            source,
        })
}

/// Records the outcome of a request on a tracing span, including status and errors.
#[cfg(feature = "telemetry")]
fn record_result_on_span<R, E: Display>(result: &Result<R, E>) {
    let span = Span::current();
    match result {
        Ok(_) => {
            span.record("otel.status_code", "OK");
        }
        Err(err) => {
            span.record("otel.status_code", "ERROR");
            span.record("error.message", tracing::field::display(err));
            tracing::event!(tracing::Level::ERROR, error = %err, "Request to gateway failed");
        }
    }
}

/// Records the outcome of a request on a tracing span, including status and errors.
/// Noop if telemetry feature is off.
#[cfg(not(feature = "telemetry"))]
fn record_result_on_span<R, E: Display>(_result: &Result<R, E>) {}
