//! Signed request assembly shared by every operation.
//!
//! Each operation resolves its options into a wire [`FieldMap`] and hands it
//! to [`build_signed_xml_request`], which signs the map, encodes it and
//! wraps the result in a transport-neutral [`RequestDescriptor`].

use std::path::PathBuf;
use std::sync::Arc;

use http::Method;
#[cfg(feature = "telemetry")]
use tracing::instrument;

use crate::config::MerchantConfig;
use crate::env::{Environment, SystemEnvironment};
use crate::error::{Error, MissingParameterError, Result};
use crate::field::{FieldMap, SIGN_FIELD};
use crate::response;
use crate::schema::{self, OptionBag};
use crate::sign::{self, ResolvedSignOptions, SignOptions};
use crate::timestamp::UnixTimestamp;
use crate::wire;

/// Client TLS certificate pair required by secured endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientCertificate {
    /// PEM certificate file.
    pub cert: PathBuf,
    /// PEM private key file.
    pub key: PathBuf,
}

/// Everything a transport needs to send one gateway request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    /// HTTP method, always `POST` for this gateway.
    pub method: Method,
    /// Absolute endpoint URL.
    pub url: String,
    /// Encoded XML body.
    pub body: Vec<u8>,
    /// Client certificate to present, for secured endpoints.
    pub client_cert: Option<ClientCertificate>,
}

impl RequestDescriptor {
    /// Decodes the body back into its wire fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedRequest`] if the body is not a flat XML
    /// document.
    pub fn fields(&self) -> Result<FieldMap> {
        wire::decode(&self.body).map_err(Error::MalformedRequest)
    }
}

/// Typed options of one operation, constructible from an option bag.
pub trait OperationOptions: Sized {
    /// Option names accepted in a bag, in declaration order.
    const DEFINED_OPTIONS: &'static [&'static str];

    /// Reads and type-checks options from an untyped bag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for undefined options or values
    /// of the wrong type.
    fn from_bag(bag: &OptionBag) -> Result<Self>;
}

/// A gateway operation: builds signed requests and parses their responses.
pub trait WxpayRequest {
    /// Caller-facing options.
    type Options: OperationOptions;

    /// Builds a signed request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingParameter`] or [`Error::InvalidParameter`]
    /// if the options do not resolve.
    fn build(&self, options: Self::Options) -> Result<RequestDescriptor>;

    /// Builds a signed request from an untyped option bag.
    ///
    /// # Errors
    ///
    /// As [`WxpayRequest::build`], plus [`Error::InvalidParameter`] for
    /// undefined options.
    fn build_from_bag(&self, bag: &OptionBag) -> Result<RequestDescriptor> {
        self.build(Self::Options::from_bag(bag)?)
    }

    /// Classifies a gateway response body.
    ///
    /// # Errors
    ///
    /// See [`response::parse`].
    fn parse_response(&self, body: &[u8]) -> Result<FieldMap> {
        response::parse(body)
    }
}

/// Merchant configuration and environment shared by the operations.
#[derive(Debug, Clone)]
pub struct RequestContext {
    config: Arc<MerchantConfig>,
    environment: Arc<dyn Environment>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new(Arc::new(MerchantConfig::default()))
    }
}

impl RequestContext {
    /// Creates a context backed by the system environment.
    #[must_use]
    pub fn new(config: Arc<MerchantConfig>) -> Self {
        Self {
            config,
            environment: Arc::new(SystemEnvironment::new()),
        }
    }

    /// Replaces the environment provider.
    #[must_use]
    pub fn with_environment(mut self, environment: Arc<dyn Environment>) -> Self {
        self.environment = environment;
        self
    }

    /// Returns the merchant configuration.
    #[must_use]
    pub fn config(&self) -> &MerchantConfig {
        &self.config
    }

    /// Returns the environment provider.
    #[must_use]
    pub fn environment(&self) -> &dyn Environment {
        self.environment.as_ref()
    }

    pub(crate) fn app_id(&self, explicit: Option<String>) -> Result<String, MissingParameterError> {
        schema::required(
            "app_id",
            schema::present(explicit).or_else(|| self.config.app_id.clone()),
        )
    }

    pub(crate) fn merchant_id(
        &self,
        explicit: Option<String>,
    ) -> Result<String, MissingParameterError> {
        schema::required(
            "merchant_id",
            schema::present(explicit).or_else(|| self.config.merchant_id.clone()),
        )
    }

    pub(crate) fn signing(&self, options: SignOptions) -> Result<ResolvedSignOptions> {
        options.resolve(&self.config)
    }

    pub(crate) fn nonce_str(&self, explicit: Option<String>) -> String {
        schema::present(explicit).unwrap_or_else(|| self.environment.nonce_str())
    }

    pub(crate) fn timestamp(&self, explicit: Option<UnixTimestamp>) -> UnixTimestamp {
        explicit.unwrap_or_else(|| self.environment.timestamp())
    }

    pub(crate) fn client_ip(&self, explicit: Option<String>) -> String {
        schema::present(explicit).unwrap_or_else(|| self.environment.client_ip())
    }

    pub(crate) fn client_certificate(
        &self,
        cert: Option<PathBuf>,
        key: Option<PathBuf>,
    ) -> Result<ClientCertificate> {
        let cert = schema::required(
            "client_cert_path",
            schema::present(cert).or_else(|| self.config.client_cert_path.clone()),
        )?;
        let key = schema::required(
            "client_key_path",
            schema::present(key).or_else(|| self.config.client_key_path.clone()),
        )?;
        schema::existing_file("client_cert_path", &cert)?;
        schema::existing_file("client_key_path", &key)?;
        Ok(ClientCertificate { cert, key })
    }
}

/// Returns `secondary` when requested, `primary` otherwise.
#[must_use]
pub const fn select_url(
    primary: &'static str,
    secondary: &'static str,
    use_secondary: bool,
) -> &'static str {
    if use_secondary { secondary } else { primary }
}

/// Signs `fields`, encodes them and wraps them in a `POST` descriptor.
///
/// Any `sign` entry already present in `fields` is replaced.
///
/// # Errors
///
/// Returns [`Error::Encode`] if the body cannot be encoded.
#[cfg_attr(
    feature = "telemetry",
    instrument(name = "wxpay.request.build", skip_all, err, fields(url = url, sign_type = %signing.sign_type))
)]
pub fn build_signed_xml_request(
    url: &str,
    mut fields: FieldMap,
    signing: &ResolvedSignOptions,
    client_cert: Option<ClientCertificate>,
) -> Result<RequestDescriptor> {
    fields.remove(SIGN_FIELD);
    let signature = sign::generate(&fields, &signing.merchant_key, signing.sign_type);
    fields.insert(SIGN_FIELD, signature);
    let body = wire::encode(&fields).map_err(Error::Encode)?;
    Ok(RequestDescriptor {
        method: Method::POST,
        url: url.to_owned(),
        body,
        client_cert,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sign::SignType;

    fn signing(key: &str, sign_type: SignType) -> ResolvedSignOptions {
        ResolvedSignOptions {
            merchant_key: key.to_owned(),
            sign_type,
        }
    }

    #[test]
    fn test_build_signed_xml_request() {
        let fields = FieldMap::from([("foo", "hello"), ("sign", "STALE")]);
        let request = build_signed_xml_request(
            "https://example.test/pay",
            fields,
            &signing("foo_key", SignType::Md5),
            None,
        )
        .unwrap();

        assert_eq!(request.method, Method::POST);
        assert_eq!(request.url, "https://example.test/pay");
        assert!(request.client_cert.is_none());
        assert_eq!(
            String::from_utf8(request.body.clone()).unwrap(),
            "<xml><foo>hello</foo><sign>BC5C27603A4F305796AC0D42737C3AF4</sign></xml>"
        );

        let mut decoded = request.fields().unwrap();
        let signature = decoded.take_signature();
        assert!(sign::verify(&signature, &decoded, "foo_key", SignType::Md5));
    }

    #[test]
    fn test_select_url() {
        assert_eq!(select_url("a", "b", false), "a");
        assert_eq!(select_url("a", "b", true), "b");
    }

    #[test]
    fn test_context_resolves_credentials() {
        let config = MerchantConfig::default()
            .with_app_id("wx_config")
            .with_merchant_id("1000");
        let context = RequestContext::new(Arc::new(config));
        assert_eq!(context.app_id(None).unwrap(), "wx_config");
        assert_eq!(context.app_id(Some("wx_explicit".into())).unwrap(), "wx_explicit");
        assert_eq!(context.merchant_id(None).unwrap(), "1000");

        let empty = RequestContext::default();
        assert_eq!(empty.app_id(None).unwrap_err().name, "app_id");
        assert_eq!(empty.app_id(Some(String::new())).unwrap_err().name, "app_id");
        assert_eq!(context.merchant_id(Some(String::new())).unwrap(), "1000");
        assert!(!context.nonce_str(Some(String::new())).is_empty());
    }

    #[test]
    fn test_client_certificate_resolution() {
        let cert = tempfile::NamedTempFile::new().unwrap();
        let key = tempfile::NamedTempFile::new().unwrap();
        let config = MerchantConfig::default()
            .with_client_cert_path(cert.path())
            .with_client_key_path(key.path());
        let context = RequestContext::new(Arc::new(config));
        let pair = context.client_certificate(None, None).unwrap();
        assert_eq!(pair.cert, cert.path());
        assert_eq!(pair.key, key.path());

        let err = RequestContext::default()
            .client_certificate(Some(cert.path().into()), None)
            .unwrap_err();
        assert!(matches!(err, Error::MissingParameter(e) if e.name == "client_key_path"));

        let err = RequestContext::default()
            .client_certificate(Some("/nope/cert.pem".into()), Some(key.path().into()))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(e) if e.name == "client_cert_path"));
    }
}
