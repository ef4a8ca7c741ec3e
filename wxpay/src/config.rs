//! Merchant configuration.
//!
//! Holds the credentials every request builder falls back to when the
//! caller does not pass them explicitly. Loads from a TOML file with
//! support for environment variable expansion in string values. Variables
//! use `$VAR` or `${VAR}` syntax.
//!
//! # Example Configuration
//!
//! ```toml
//! app_id = "wx85bbb9f0e9460321"
//! merchant_id = "1619665394"
//! merchant_key = "$WXPAY_KEY"
//! client_cert_path = "/etc/wxpay/apiclient_cert.pem"
//! client_key_path = "/etc/wxpay/apiclient_key.pem"
//! ```
//!
//! # Environment Variables
//!
//! - `WXPAY_CONFIG`: path to the configuration file (default: `wxpay.toml`)
//! - `WXPAY_APP_ID`, `WXPAY_MERCHANT_ID`, `WXPAY_MERCHANT_KEY`,
//!   `WXPAY_CLIENT_CERT_PATH`, `WXPAY_CLIENT_KEY_PATH`: override file values

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::InvalidParameterError;
use crate::schema;

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_VAR: &str = "WXPAY_CONFIG";

/// Configuration file used when [`CONFIG_PATH_VAR`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "wxpay.toml";

/// Errors raised while loading a [`MerchantConfig`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The configuration file exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path of the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The configuration file is not valid TOML for this schema.
    #[error("invalid configuration: {0}")]
    Toml(#[from] toml::de::Error),
    /// A certificate or key path does not reference an existing file.
    #[error(transparent)]
    InvalidParameter(#[from] InvalidParameterError),
}

/// Merchant credentials shared by every request.
///
/// Every field may be left unset; a credential that an operation needs
/// must then be passed per call.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MerchantConfig {
    /// Application id issued by the gateway (`appid` on the wire).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,

    /// Merchant account id (`mch_id` on the wire).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_id: Option<String>,

    /// Merchant API key used for signing. Never sent on the wire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_key: Option<String>,

    /// PEM client certificate for secured endpoints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_cert_path: Option<PathBuf>,

    /// PEM private key matching [`Self::client_cert_path`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_key_path: Option<PathBuf>,
}

impl fmt::Debug for MerchantConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MerchantConfig")
            .field("app_id", &self.app_id)
            .field("merchant_id", &self.merchant_id)
            .field(
                "merchant_key",
                &self.merchant_key.as_ref().map(|_| "<redacted>"),
            )
            .field("client_cert_path", &self.client_cert_path)
            .field("client_key_path", &self.client_key_path)
            .finish()
    }
}

impl MerchantConfig {
    /// Sets the application id.
    #[must_use]
    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    /// Sets the merchant id.
    #[must_use]
    pub fn with_merchant_id(mut self, merchant_id: impl Into<String>) -> Self {
        self.merchant_id = Some(merchant_id.into());
        self
    }

    /// Sets the merchant API key.
    #[must_use]
    pub fn with_merchant_key(mut self, merchant_key: impl Into<String>) -> Self {
        self.merchant_key = Some(merchant_key.into());
        self
    }

    /// Sets the client certificate path.
    #[must_use]
    pub fn with_client_cert_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.client_cert_path = Some(path.into());
        self
    }

    /// Sets the client private key path.
    #[must_use]
    pub fn with_client_key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.client_key_path = Some(path.into());
        self
    }

    /// Checks that configured certificate and key paths exist.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParameterError`] for the first missing file.
    pub fn validate(&self) -> Result<(), InvalidParameterError> {
        if let Some(path) = &self.client_cert_path {
            schema::existing_file("client_cert_path", path)?;
        }
        if let Some(path) = &self.client_key_path {
            schema::existing_file("client_key_path", path)?;
        }
        Ok(())
    }

    /// Loads configuration from the file named by `WXPAY_CONFIG`, falling
    /// back to `wxpay.toml` in the current directory.
    ///
    /// A `.env` file in the current directory is loaded first, if present.
    /// String values with `$VAR` / `${VAR}` references are expanded from the
    /// process environment, then `WXPAY_*` variables override file values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or if a
    /// certificate path does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let path =
            std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_owned());
        Self::load_from(path)
    }

    /// Loads configuration from a specific file path.
    ///
    /// A missing file yields an empty configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or if a
    /// certificate path does not exist.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        load_with(path.as_ref(), &|name| std::env::var(name).ok())
    }

    /// Parses configuration from a TOML string without environment lookups.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] if the string is not a valid
    /// configuration.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

fn load_with(path: &Path, lookup: &dyn Fn(&str) -> Option<String>) -> Result<MerchantConfig, ConfigError> {
    let content = if path.exists() {
        std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?
    } else {
        String::new()
    };

    let expanded = expand_env_vars(&content, lookup);
    let mut config = MerchantConfig::from_toml_str(&expanded)?;

    if let Some(app_id) = lookup("WXPAY_APP_ID") {
        config.app_id = Some(app_id);
    }
    if let Some(merchant_id) = lookup("WXPAY_MERCHANT_ID") {
        config.merchant_id = Some(merchant_id);
    }
    if let Some(merchant_key) = lookup("WXPAY_MERCHANT_KEY") {
        config.merchant_key = Some(merchant_key);
    }
    if let Some(cert) = lookup("WXPAY_CLIENT_CERT_PATH") {
        config.client_cert_path = Some(cert.into());
    }
    if let Some(key) = lookup("WXPAY_CLIENT_KEY_PATH") {
        config.client_key_path = Some(key.into());
    }

    config.validate()?;
    Ok(config)
}

/// Expands `$VAR` and `${VAR}` patterns using `lookup`.
///
/// Unresolved variables are left as-is.
fn expand_env_vars(input: &str, lookup: &dyn Fn(&str) -> Option<String>) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            result.push(ch);
            continue;
        }

        let braced = chars.peek() == Some(&'{');
        if braced {
            chars.next();
        }

        let mut var_name = String::new();
        while let Some(&c) = chars.peek() {
            if braced {
                if c == '}' {
                    chars.next();
                    break;
                }
            } else if !c.is_ascii_alphanumeric() && c != '_' {
                break;
            }
            var_name.push(c);
            chars.next();
        }

        if var_name.is_empty() {
            result.push('$');
            if braced {
                result.push('{');
            }
        } else if let Some(val) = lookup(&var_name) {
            result.push_str(&val);
        } else {
            result.push('$');
            if braced {
                result.push('{');
            }
            result.push_str(&var_name);
            if braced {
                result.push('}');
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_expand_env_vars() {
        let lookup = env(&[("KEY", "secret"), ("ID", "42")]);
        assert_eq!(expand_env_vars("k = \"$KEY\"", &lookup), "k = \"secret\"");
        assert_eq!(expand_env_vars("${ID}x", &lookup), "42x");
        assert_eq!(expand_env_vars("$UNKNOWN ${NOPE}", &lookup), "$UNKNOWN ${NOPE}");
        assert_eq!(expand_env_vars("cost: $ 5", &lookup), "cost: $ 5");
    }

    #[test]
    fn test_missing_file_is_empty_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_with(&dir.path().join("absent.toml"), &env(&[])).unwrap();
        assert_eq!(config, MerchantConfig::default());
    }

    #[test]
    fn test_load_with_expansion_and_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "app_id = \"wx_file\"\nmerchant_id = \"1000\"\nmerchant_key = \"${{KEY}}\""
        )
        .unwrap();

        let lookup = env(&[("KEY", "from-env"), ("WXPAY_MERCHANT_ID", "2000")]);
        let config = load_with(file.path(), &lookup).unwrap();
        assert_eq!(config.app_id.as_deref(), Some("wx_file"));
        assert_eq!(config.merchant_id.as_deref(), Some("2000"));
        assert_eq!(config.merchant_key.as_deref(), Some("from-env"));
    }

    #[test]
    fn test_certificate_paths_must_exist() {
        let cert = tempfile::NamedTempFile::new().unwrap();
        let config = MerchantConfig::default()
            .with_client_cert_path(cert.path())
            .with_client_key_path("/no/such/key.pem");
        let err = config.validate().unwrap_err();
        assert_eq!(err.name, "client_key_path");

        let config = MerchantConfig::default()
            .with_client_cert_path(cert.path())
            .with_client_key_path(cert.path());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(matches!(
            MerchantConfig::from_toml_str("mchkey = \"x\""),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = MerchantConfig::default().with_merchant_key("super-secret");
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
