//! Admission configuration with validation.

use crate::domain::routes::DEFAULT_MODEL_ROUTES;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

/// Main admission configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Cookie session settings (management routes)
    pub session: SessionConfig,
    /// Relay (token-authenticated) route settings
    pub relay: RelayConfig,
    /// Device fingerprint binding
    pub fingerprint: FingerprintConfig,
    /// Client IP resolution
    pub security: SecurityConfig,
    /// Collaborator deadlines
    pub timeouts: TimeoutConfig,
    /// Log output
    pub logging: LoggingConfig,
}

impl AdmissionConfig {
    /// Parse from JSON and validate
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.cookie_name.is_empty()
            || self
                .session
                .cookie_name
                .bytes()
                .any(|b| b == b'=' || b == b';' || b.is_ascii_whitespace())
        {
            return Err(ConfigError::InvalidSession(format!(
                "cookie name {:?} is not a valid cookie token",
                self.session.cookie_name
            )));
        }

        if axum::http::HeaderName::from_bytes(self.fingerprint.header.as_bytes()).is_err() {
            return Err(ConfigError::InvalidFingerprint(format!(
                "header {:?} is not a valid header name",
                self.fingerprint.header
            )));
        }

        if self.relay.max_body_size == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_body_size cannot be 0".into(),
            ));
        }

        if let Some(prefix) = self
            .relay
            .model_required_prefixes
            .iter()
            .find(|p| !p.starts_with('/'))
        {
            return Err(ConfigError::Invalid(format!(
                "model route prefix {prefix:?} must start with '/'"
            )));
        }

        if self.timeouts.collaborator.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "collaborator timeout cannot be 0".into(),
            ));
        }

        Ok(())
    }
}

/// Cookie session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Name of the cookie carrying the session id
    pub cookie_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "session".to_string(),
        }
    }
}

/// Relay route configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Path prefixes that must carry a model name
    pub model_required_prefixes: Vec<String>,
    /// Max request body buffered for model extraction (default: 4MB)
    pub max_body_size: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            model_required_prefixes: DEFAULT_MODEL_ROUTES.iter().map(|p| p.to_string()).collect(),
            max_body_size: 4 * 1024 * 1024,
        }
    }
}

/// What the binder does when persisting a first binding fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindFailurePolicy {
    /// Log, audit and let the request through unbound
    #[default]
    FailOpen,
    /// Reject with an internal error
    FailClosed,
}

/// Device fingerprint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerprintConfig {
    /// Header carrying the device fingerprint
    pub header: String,
    pub on_bind_failure: BindFailurePolicy,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            header: "systemCode".to_string(),
            on_bind_failure: BindFailurePolicy::FailOpen,
        }
    }
}

/// Client IP resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// List of trusted proxy IPs
    pub trusted_proxies: Vec<IpAddr>,
    /// Trust loopback peers as proxies
    pub trust_localhost: bool,
    /// Trust private IPs (10.x, 172.16.x, 192.168.x)
    pub trust_private_ips: bool,
    /// Header holding the original client address
    pub real_ip_header: String,
    /// Number of proxies in chain (for X-Forwarded-For parsing)
    pub proxy_count: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            trusted_proxies: Vec::new(),
            trust_localhost: true,
            trust_private_ips: false,
            real_ip_header: "X-Forwarded-For".to_string(),
            proxy_count: 1,
        }
    }
}

/// Timeout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for each store, cache or log call made by a gate
    #[serde(with = "humantime_serde")]
    pub collaborator: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            collaborator: Duration::from_secs(5),
        }
    }
}

/// Log output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset
    pub level: String,
    /// JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid session config: {0}")]
    InvalidSession(String),
    #[error("invalid fingerprint config: {0}")]
    InvalidFingerprint(String),
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Durations as `"5s"`, `"250ms"`, `"2m"` or plain seconds
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, &'static str> {
        let s = s.trim();
        // "ms" before "s" and "m"
        if let Some(ms) = s.strip_suffix("ms") {
            ms.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| "invalid milliseconds")
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid seconds")
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.trim()
                .parse::<u64>()
                .ok()
                .and_then(|m| m.checked_mul(60))
                .map(Duration::from_secs)
                .ok_or("invalid minutes")
        } else {
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid duration format")
        }
    }
}
