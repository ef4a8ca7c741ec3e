//! Environment-derived request defaults.
//!
//! Nonces, timestamps and the client IP are taken from an injected
//! [`Environment`] rather than from ambient process state, so builders stay
//! deterministic under test.

use std::fmt::Debug;

use rand::RngExt;
use rand::rng;

use crate::timestamp::UnixTimestamp;

/// Fallback client IP when none is known.
pub const UNSPECIFIED_CLIENT_IP: &str = "0.0.0.0";

/// Source of per-request default values.
pub trait Environment: Debug + Send + Sync {
    /// Returns a fresh random nonce.
    fn nonce_str(&self) -> String;

    /// Returns the current time.
    fn timestamp(&self) -> UnixTimestamp;

    /// Returns the IP of the end user initiating the payment.
    fn client_ip(&self) -> String;
}

/// Wall-clock, OS-randomness backed environment.
#[derive(Debug, Clone)]
pub struct SystemEnvironment {
    client_ip: String,
}

impl SystemEnvironment {
    /// Creates an environment reporting `0.0.0.0` as client IP.
    #[must_use]
    pub fn new() -> Self {
        Self {
            client_ip: UNSPECIFIED_CLIENT_IP.to_owned(),
        }
    }

    /// Sets the client IP reported to the gateway.
    ///
    /// Servers typically derive it from `X-Forwarded-For` or the peer address.
    #[must_use]
    pub fn with_client_ip(mut self, client_ip: impl Into<String>) -> Self {
        self.client_ip = client_ip.into();
        self
    }
}

impl Default for SystemEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for SystemEnvironment {
    fn nonce_str(&self) -> String {
        let nonce: [u8; 16] = rng().random();
        hex::encode(nonce)
    }

    fn timestamp(&self) -> UnixTimestamp {
        UnixTimestamp::now()
    }

    fn client_ip(&self) -> String {
        self.client_ip.clone()
    }
}

/// Environment returning fixed values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedEnvironment {
    /// Nonce returned for every request.
    pub nonce_str: String,
    /// Timestamp returned for every request.
    pub timestamp: UnixTimestamp,
    /// Client IP returned for every request.
    pub client_ip: String,
}

impl FixedEnvironment {
    /// Creates a fixed environment.
    #[must_use]
    pub fn new(
        nonce_str: impl Into<String>,
        timestamp: UnixTimestamp,
        client_ip: impl Into<String>,
    ) -> Self {
        Self {
            nonce_str: nonce_str.into(),
            timestamp,
            client_ip: client_ip.into(),
        }
    }
}

impl Environment for FixedEnvironment {
    fn nonce_str(&self) -> String {
        self.nonce_str.clone()
    }

    fn timestamp(&self) -> UnixTimestamp {
        self.timestamp
    }

    fn client_ip(&self) -> String {
        self.client_ip.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_nonce_is_random_hex() {
        let env = SystemEnvironment::new();
        let a = env.nonce_str();
        let b = env.nonce_str();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_system_client_ip() {
        assert_eq!(SystemEnvironment::new().client_ip(), "0.0.0.0");
        assert_eq!(
            SystemEnvironment::new().with_client_ip("10.0.0.7").client_ip(),
            "10.0.0.7"
        );
    }

    #[test]
    fn test_fixed_environment() {
        let env = FixedEnvironment::new("abc", UnixTimestamp::from_secs(42), "127.0.0.1");
        assert_eq!(env.nonce_str(), "abc");
        assert_eq!(env.timestamp().as_secs(), 42);
        assert_eq!(env.client_ip(), "127.0.0.1");
    }
}
