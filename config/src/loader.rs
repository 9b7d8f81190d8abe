//! # Environment Variable Loader
//!
//! Loads [`ResolverSettings`] from environment variables following 12-factor
//! app principles.
//!
//! # Naming Convention
//! - `CONSUL_*`: key-value agent connection
//! - `ENVCONF_*`: pipeline tuning

use crate::settings::{ConsulSettings, ResolverSettings};
use envconf_core::{EnvSource, ProcessEnv};
use errors::ConfigError;
use std::str::FromStr;
use tracing::debug;
use validator::Validate;

/// Load resolver settings from the process environment.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Reads the key-value agent connection and the pipeline tuning knobs.
/// Unset variables fall back to defaults; set but unparsable variables are
/// an error rather than being silently ignored.
///
/// ## Usage
/// ```rust,no_run
/// use config::load_from_env;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let settings = load_from_env()?;
///     println!("DNS concurrency: {}", settings.dns_concurrency);
///     Ok(())
/// }
/// ```
///
/// ## Environment Variables
/// ### Key-value agent (`CONSUL_*`)
/// All three must be set, otherwise the key-value source is disabled.
/// - `CONSUL_HOST`: agent host
/// - `CONSUL_PORT`: agent port
/// - `CONSUL_SECURE`: `true`/`false` (also `1`/`0`), use HTTPS
///
/// ### Pipeline (`ENVCONF_*`)
/// - `ENVCONF_DNS_CONCURRENCY`: outstanding SRV lookups (default: 3)
/// - `ENVCONF_DNS_TIMEOUT_MS`: per-lookup timeout (default: 5000)
/// - `ENVCONF_KV_TIMEOUT_MS`: key-value request timeout (default: 10000)
/// - `ENVCONF_ENV_FALLBACK`: un-prefixed env lookup, which also sees OS
///   variables like `PATH` (default: true)
/// - `ENVCONF_SERVICE_PRECEDENCE`: `discovery` or `explicit` (default:
///   discovery)
pub fn load_from_env() -> Result<ResolverSettings, ConfigError> {
    load_from(&ProcessEnv)
}

/// Load resolver settings from any environment source.
pub fn load_from(env: &dyn EnvSource) -> Result<ResolverSettings, ConfigError> {
    let defaults = ResolverSettings::default();
    let settings = ResolverSettings {
        consul: load_consul(env)?,
        dns_concurrency: parse_env(env, "ENVCONF_DNS_CONCURRENCY")?
            .unwrap_or(defaults.dns_concurrency),
        dns_timeout_ms: parse_env(env, "ENVCONF_DNS_TIMEOUT_MS")?
            .unwrap_or(defaults.dns_timeout_ms),
        kv_timeout_ms: parse_env(env, "ENVCONF_KV_TIMEOUT_MS")?.unwrap_or(defaults.kv_timeout_ms),
        env_fallback: parse_flag(env, "ENVCONF_ENV_FALLBACK")?.unwrap_or(defaults.env_fallback),
        service_precedence: parse_env(env, "ENVCONF_SERVICE_PRECEDENCE")?
            .unwrap_or(defaults.service_precedence),
    };

    settings.validate().map_err(|e| ConfigError::Settings {
        reason: e.to_string(),
    })?;

    Ok(settings)
}

fn load_consul(env: &dyn EnvSource) -> Result<Option<ConsulSettings>, ConfigError> {
    let (Some(host), Some(_), Some(_)) = (
        env.var("CONSUL_HOST"),
        env.var("CONSUL_PORT"),
        env.var("CONSUL_SECURE"),
    ) else {
        debug!("CONSUL_HOST, CONSUL_PORT and CONSUL_SECURE not all set, key-value source disabled");
        return Ok(None);
    };

    Ok(Some(ConsulSettings {
        host,
        port: parse_env(env, "CONSUL_PORT")?.unwrap_or_default(),
        secure: parse_flag(env, "CONSUL_SECURE")?.unwrap_or_default(),
    }))
}

fn parse_env<T>(env: &dyn EnvSource, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env.var(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::Settings {
                reason: format!("{key}={raw:?}: {e}"),
            })
        })
        .transpose()
}

fn parse_flag(env: &dyn EnvSource, key: &str) -> Result<Option<bool>, ConfigError> {
    env.var(key)
        .map(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(ConfigError::Settings {
                reason: format!("{key}={raw:?}: expected true or false"),
            }),
        })
        .transpose()
}
