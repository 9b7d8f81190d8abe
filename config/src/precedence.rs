//! # Resolution Pipeline
//!
//! Resolves one namespace by running its sources in a fixed order over a
//! single configuration document.
//!
//! # Precedence Order
//! 1. Service discovery (highest priority)
//! 2. Environment variables
//! 3. Key-value store (lowest priority)
//!
//! Each stage sees everything written by the stages before it. A failing
//! stage never stops the pass; the validation stage then decides whether the
//! namespace was fulfilled.

use crate::consul::{ConsulKv, ConsulSource};
use crate::environment::EnvironmentSource;
use crate::services::ServiceSource;
use crate::settings::ResolverSettings;
use crate::telemetry::{ResolutionTimer, Telemetry};
use crate::validator::missing_values;
use async_trait::async_trait;
use discovery::{HickoryResolver, ServiceLocator, SrvResolver};
use envconf_core::{EnvSource, KvBackend, ProcessEnv, RequestSpec};
use errors::{ConfigError, ResolutionError};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

/// One stage of the resolution pipeline.
#[async_trait]
pub trait Source: Send + Sync {
    /// Stage name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Writes this source's values into `config`.
    ///
    /// An error means the source could not be consulted at all; anything it
    /// wrote before failing is kept.
    async fn contribute(&self, spec: &RequestSpec, config: &mut Value)
    -> Result<(), ResolutionError>;
}

/// Result of one resolution pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub namespace: String,
    /// Everything the sources produced, complete or not.
    pub config: Value,
    /// Empty on success. Otherwise transport errors followed by one
    /// missing-value error per absent required pointer.
    pub errors: Vec<ResolutionError>,
}

impl Resolution {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self) -> Result<Value, ConfigError> {
        if self.errors.is_empty() {
            Ok(self.config)
        } else {
            Err(ConfigError::Unresolved {
                namespace: self.namespace,
                errors: self.errors,
            })
        }
    }
}

/// Resolution pipeline: key-value, environment, service discovery, then
/// validation.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Merges the three sources last-write-wins in precedence order and reports
/// which required pointers are still missing.
///
/// ## Usage
/// ```rust,no_run
/// use config::{Pipeline, load_from_env};
/// use envconf_core::{Pointer, RequestSpec};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let pipeline = Pipeline::from_settings(&load_from_env()?)?;
/// let spec = RequestSpec::new("TEST").with_key(Pointer::parse("#/foo/uri")?);
/// let config = pipeline.resolve(&spec).await.into_result()?;
/// println!("{config}");
/// # Ok(())
/// # }
/// ```
pub struct Pipeline {
    kv: ConsulSource,
    env: EnvironmentSource,
    services: ServiceSource,
}

impl Pipeline {
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Production pipeline: Consul (when configured), the process
    /// environment and the system DNS resolver.
    pub fn from_settings(settings: &ResolverSettings) -> Result<Self, ConfigError> {
        Self::builder().settings(settings.clone()).build()
    }

    fn stages(&self) -> [&dyn Source; 3] {
        [&self.kv as &dyn Source, &self.env, &self.services]
    }

    pub async fn resolve(&self, spec: &RequestSpec) -> Resolution {
        let timer = ResolutionTimer::new(&spec.name);
        let mut config = Value::Object(Map::new());
        let mut errors = Vec::new();

        for stage in self.stages() {
            if let Err(err) = stage.contribute(spec, &mut config).await {
                warn!(namespace = %spec.name, stage = stage.name(), error = %err, "Stage failed, continuing");
                Telemetry::record_transport_error(stage.name());
                errors.push(err);
            }
        }

        let missing = missing_values(spec, &config);
        Telemetry::record_missing_values(&spec.name, missing.len());
        if missing.is_empty() {
            if !errors.is_empty() {
                warn!(
                    namespace = %spec.name,
                    dropped = errors.len(),
                    "All required values resolved despite transport errors"
                );
            }
            errors.clear();
        } else {
            errors.extend(missing);
        }

        Telemetry::record_resolution(&spec.name, errors.is_empty());
        timer.finish();
        info!(namespace = %spec.name, errors = errors.len(), "Resolution pass complete");

        Resolution {
            namespace: spec.name.clone(),
            config,
            errors,
        }
    }
}

/// Builder for `Pipeline`.
///
/// Collaborators left unset come from `settings`: Consul when a connection
/// is configured, the process environment and the system DNS resolver.
#[derive(Default)]
pub struct PipelineBuilder {
    settings: ResolverSettings,
    kv: Option<Arc<dyn KvBackend>>,
    env: Option<Arc<dyn EnvSource>>,
    resolver: Option<Arc<dyn SrvResolver>>,
}

impl PipelineBuilder {
    #[must_use]
    pub fn settings(mut self, settings: ResolverSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn kv_backend(mut self, backend: Arc<dyn KvBackend>) -> Self {
        self.kv = Some(backend);
        self
    }

    #[must_use]
    pub fn env_source(mut self, env: Arc<dyn EnvSource>) -> Self {
        self.env = Some(env);
        self
    }

    #[must_use]
    pub fn resolver(mut self, resolver: Arc<dyn SrvResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn build(self) -> Result<Pipeline, ConfigError> {
        let settings = self.settings;
        settings.validate().map_err(|e| ConfigError::Settings {
            reason: e.to_string(),
        })?;

        let kv = match (self.kv, &settings.consul) {
            (Some(backend), _) => ConsulSource::new(backend),
            (None, Some(consul)) => {
                let client = ConsulKv::new(consul, settings.kv_timeout()).map_err(|e| {
                    ConfigError::Settings {
                        reason: e.to_string(),
                    }
                })?;
                ConsulSource::new(Arc::new(client))
            }
            (None, None) => ConsulSource::disabled(),
        };

        let env = EnvironmentSource::new(self.env.unwrap_or_else(|| Arc::new(ProcessEnv)))
            .with_fallback(settings.env_fallback);

        let resolver: Arc<dyn SrvResolver> = match self.resolver {
            Some(resolver) => resolver,
            None => Arc::new(HickoryResolver::from_system_conf().map_err(|e| {
                ConfigError::Settings {
                    reason: e.to_string(),
                }
            })?),
        };
        let locator = ServiceLocator::new(resolver)
            .with_concurrency(settings.dns_concurrency)
            .with_timeout(settings.dns_timeout());
        let services = ServiceSource::new(locator).with_precedence(settings.service_precedence);

        Ok(Pipeline { kv, env, services })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use discovery::SrvRecord;
    use serde_json::json;
    use testing::{MapEnv, StaticKv, StaticSrvResolver};

    fn spec(value: Value) -> RequestSpec {
        serde_json::from_value(value).unwrap()
    }

    fn pipeline(kv: StaticKv, env: MapEnv, resolver: StaticSrvResolver) -> Pipeline {
        Pipeline::builder()
            .kv_backend(Arc::new(kv))
            .env_source(Arc::new(env))
            .resolver(Arc::new(resolver))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_empty_request_succeeds() {
        let pipeline = pipeline(StaticKv::new(), MapEnv::new(), StaticSrvResolver::new());
        let resolution = pipeline.resolve(&RequestSpec::new("EMPTY")).await;

        assert!(resolution.is_success());
        assert_eq!(resolution.config, json!({}));
    }

    #[tokio::test]
    async fn test_stage_precedence() {
        let kv = StaticKv::new()
            .with_entry("app/a", "kv")
            .with_entry("app/b", "kv")
            .with_entry("app/c", "kv");
        let env = MapEnv::new().with_var("APP_B", "env").with_var("APP_C", "env");
        let resolver = StaticSrvResolver::new()
            .with_records("c.service.consul", vec![SrvRecord::new(1, 1, 80, "dns")]);

        let resolution = pipeline(kv, env, resolver)
            .resolve(&spec(json!({
                "name": "app",
                "keys": ["#/a", "#/b", "#/c"],
                "services": [{"name": "c.service.consul", "key": "#/c"}]
            })))
            .await;

        assert_eq!(resolution.config, json!({"a": "kv", "b": "env", "c": "dns"}));
        assert!(resolution.is_success());
    }

    #[tokio::test]
    async fn test_transport_error_dropped_when_nothing_missing() {
        let env = MapEnv::new().with_var("APP_A", "env");
        let resolution = pipeline(StaticKv::failing("refused"), env, StaticSrvResolver::new())
            .resolve(&spec(json!({"name": "app", "keys": ["#/a"]})))
            .await;

        assert!(resolution.is_success());
        assert_eq!(resolution.config, json!({"a": "env"}));
    }

    #[tokio::test]
    async fn test_transport_errors_precede_missing_values() {
        let resolution = pipeline(
            StaticKv::failing("refused"),
            MapEnv::new(),
            StaticSrvResolver::new(),
        )
        .resolve(&spec(json!({"name": "app", "keys": ["#/a", "#/b"]})))
        .await;

        assert_eq!(resolution.errors.len(), 3);
        assert!(matches!(resolution.errors[0], ResolutionError::Transport { .. }));
        assert!(resolution.errors[1..].iter().all(ResolutionError::is_missing_value));

        let err = resolution.into_result().unwrap_err();
        assert_eq!(err.resolution_errors().len(), 3);
    }

    #[tokio::test]
    async fn test_disabled_kv_without_consul_settings() {
        let env = MapEnv::new().with_var("APP_A", "env");
        let pipeline = Pipeline::builder()
            .env_source(Arc::new(env))
            .resolver(Arc::new(StaticSrvResolver::new()))
            .build()
            .unwrap();

        assert!(!pipeline.kv.is_enabled());
        let config = pipeline
            .resolve(&spec(json!({"name": "app", "keys": ["#/a"]})))
            .await
            .into_result()
            .unwrap();
        assert_eq!(config, json!({"a": "env"}));
    }

    #[tokio::test]
    async fn test_settings_disable_env_fallback() {
        let env = MapEnv::new().with_var("A", "bare");
        let pipeline = Pipeline::builder()
            .settings(ResolverSettings::builder().env_fallback(false).build())
            .env_source(Arc::new(env))
            .resolver(Arc::new(StaticSrvResolver::new()))
            .build()
            .unwrap();

        let resolution = pipeline
            .resolve(&spec(json!({"name": "app", "keys": ["#/a"]})))
            .await;
        assert_eq!(resolution.errors.len(), 1);
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        for settings in [
            ResolverSettings::builder().dns_concurrency(0).build(),
            ResolverSettings::builder().dns_timeout_ms(0).build(),
        ] {
            let built = Pipeline::builder()
                .settings(settings)
                .env_source(Arc::new(MapEnv::new()))
                .resolver(Arc::new(StaticSrvResolver::new()))
                .build();
            assert!(matches!(built, Err(ConfigError::Settings { .. })));
        }
    }
}
