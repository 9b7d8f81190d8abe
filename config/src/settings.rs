//! # Resolver Settings
//!
//! Tuning for the resolution pipeline itself: where the key-value agent
//! lives, how DNS fan-out is bounded and which source wins when discovery
//! and static configuration disagree.
//!
//! All settings structures:
//! - Use `serde` for serialization/deserialization
//! - Use `validator` for input validation

use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum::{Display, EnumString};
use validator::Validate;

/// Settings for one resolution pipeline.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Controls the key-value agent connection, DNS lookup concurrency and
/// timeouts, the un-prefixed environment fallback and the precedence of
/// discovered services over static values.
///
/// ## Usage
/// ```rust
/// use config::{ResolverSettings, ServicePrecedence};
///
/// let settings = ResolverSettings::builder()
///     .dns_concurrency(5)
///     .service_precedence(ServicePrecedence::Explicit)
///     .build();
/// assert_eq!(settings.dns_concurrency, 5);
/// assert!(settings.consul.is_none());
/// ```
///
/// ## Validation
/// - `dns_concurrency`: 1-64
/// - `dns_timeout_ms`, `kv_timeout_ms`: 1-600000
/// - `consul`: see [`ConsulSettings`]
///
/// ## Environment fallback
/// `env_fallback` is on by default. With it on, a requested key whose
/// scoped variable is unset reads the bare variable, including ones the
/// operating system sets such as `PATH` or `HOME`. Set
/// `ENVCONF_ENV_FALLBACK=false` to restrict lookups to `<NAMESPACE>_<PATH>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ResolverSettings {
    /// Key-value agent connection; `None` disables the key-value source.
    #[serde(default)]
    #[validate(nested)]
    pub consul: Option<ConsulSettings>,

    /// Maximum outstanding SRV lookups per resolution pass.
    #[serde(default = "default_dns_concurrency")]
    #[validate(range(min = 1, max = 64))]
    pub dns_concurrency: usize,

    #[serde(default = "default_dns_timeout_ms")]
    #[validate(range(min = 1, max = 600000))]
    pub dns_timeout_ms: u64,

    #[serde(default = "default_kv_timeout_ms")]
    #[validate(range(min = 1, max = 600000))]
    pub kv_timeout_ms: u64,

    /// Also look up `<PATH>` when `<NAMESPACE>_<PATH>` is unset.
    ///
    /// The un-prefixed name is read from the whole process environment, so
    /// keys such as `#/path`, `#/home` or `#/user` pick up the operating
    /// system's `PATH`, `HOME` and `USER`. Disable it when key names can
    /// collide with ambient variables.
    #[serde(default = "default_true")]
    pub env_fallback: bool,

    #[serde(default)]
    pub service_precedence: ServicePrecedence,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            consul: None,
            dns_concurrency: default_dns_concurrency(),
            dns_timeout_ms: default_dns_timeout_ms(),
            kv_timeout_ms: default_kv_timeout_ms(),
            env_fallback: true,
            service_precedence: ServicePrecedence::default(),
        }
    }
}

impl ResolverSettings {
    #[must_use]
    pub fn builder() -> ResolverSettingsBuilder {
        ResolverSettingsBuilder::default()
    }

    pub fn dns_timeout(&self) -> Duration {
        Duration::from_millis(self.dns_timeout_ms)
    }

    pub fn kv_timeout(&self) -> Duration {
        Duration::from_millis(self.kv_timeout_ms)
    }
}

/// Connection parameters for a Consul agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ConsulSettings {
    #[validate(length(min = 1, max = 255))]
    pub host: String,

    #[validate(range(min = 1, max = 65535))]
    pub port: u16,

    /// Use HTTPS when talking to the agent.
    pub secure: bool,
}

impl ConsulSettings {
    pub fn base_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

/// Which value wins when a discovered service and a static source both
/// provide the service's target key.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ServicePrecedence {
    /// A successful lookup overwrites key-value and environment values.
    #[default]
    Discovery,
    /// Key-value and environment values are kept; discovery only fills
    /// keys left undefined.
    Explicit,
}

/// Builder for `ResolverSettings`.
#[derive(Default)]
pub struct ResolverSettingsBuilder {
    consul: Option<ConsulSettings>,
    dns_concurrency: Option<usize>,
    dns_timeout_ms: Option<u64>,
    kv_timeout_ms: Option<u64>,
    env_fallback: Option<bool>,
    service_precedence: Option<ServicePrecedence>,
}

impl ResolverSettingsBuilder {
    /// Sets the key-value agent connection.
    #[must_use]
    pub fn consul(mut self, host: impl Into<String>, port: u16, secure: bool) -> Self {
        self.consul = Some(ConsulSettings {
            host: host.into(),
            port,
            secure,
        });
        self
    }

    #[must_use]
    pub fn dns_concurrency(mut self, concurrency: usize) -> Self {
        self.dns_concurrency = Some(concurrency);
        self
    }

    #[must_use]
    pub fn dns_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.dns_timeout_ms = Some(timeout_ms);
        self
    }

    #[must_use]
    pub fn kv_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.kv_timeout_ms = Some(timeout_ms);
        self
    }

    #[must_use]
    pub fn env_fallback(mut self, enabled: bool) -> Self {
        self.env_fallback = Some(enabled);
        self
    }

    #[must_use]
    pub fn service_precedence(mut self, precedence: ServicePrecedence) -> Self {
        self.service_precedence = Some(precedence);
        self
    }

    pub fn build(self) -> ResolverSettings {
        let defaults = ResolverSettings::default();
        ResolverSettings {
            consul: self.consul,
            dns_concurrency: self.dns_concurrency.unwrap_or(defaults.dns_concurrency),
            dns_timeout_ms: self.dns_timeout_ms.unwrap_or(defaults.dns_timeout_ms),
            kv_timeout_ms: self.kv_timeout_ms.unwrap_or(defaults.kv_timeout_ms),
            env_fallback: self.env_fallback.unwrap_or(defaults.env_fallback),
            service_precedence: self
                .service_precedence
                .unwrap_or(defaults.service_precedence),
        }
    }
}

fn default_dns_concurrency() -> usize {
    3
}

fn default_dns_timeout_ms() -> u64 {
    5000
}

fn default_kv_timeout_ms() -> u64 {
    10000
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = ResolverSettings::default();
        assert_eq!(settings.dns_concurrency, 3);
        assert_eq!(settings.dns_timeout(), Duration::from_secs(5));
        assert_eq!(settings.kv_timeout(), Duration::from_secs(10));
        assert!(settings.env_fallback);
        assert_eq!(settings.service_precedence, ServicePrecedence::Discovery);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_invalid_concurrency() {
        let settings = ResolverSettings::builder().dns_concurrency(0).build();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_invalid_consul_host() {
        let settings = ResolverSettings::builder().consul("", 8500, false).build();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_consul_base_url() {
        let plain = ConsulSettings {
            host: "localhost".to_string(),
            port: 8500,
            secure: false,
        };
        assert_eq!(plain.base_url(), "http://localhost:8500");
        let tls = ConsulSettings {
            secure: true,
            ..plain
        };
        assert_eq!(tls.base_url(), "https://localhost:8500");
    }

    #[test]
    fn test_precedence_parsing() {
        assert_eq!(
            "explicit".parse::<ServicePrecedence>().unwrap(),
            ServicePrecedence::Explicit
        );
        assert_eq!(
            "Discovery".parse::<ServicePrecedence>().unwrap(),
            ServicePrecedence::Discovery
        );
        assert!("nobody".parse::<ServicePrecedence>().is_err());
    }

    #[test]
    fn test_deserialize_partial_settings() {
        let settings: ResolverSettings =
            serde_json::from_str(r#"{"dns_concurrency": 8}"#).unwrap();
        assert_eq!(settings.dns_concurrency, 8);
        assert_eq!(settings.dns_timeout_ms, 5000);
        assert!(settings.env_fallback);
    }
}
