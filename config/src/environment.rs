//! # Environment Source
//!
//! Overrides key-value values with environment variables named
//! `<NAMESPACE>_<PATH>`, optionally falling back to the un-prefixed `<PATH>`.

use crate::precedence::Source;
use async_trait::async_trait;
use envconf_core::{EnvSource, ProcessEnv, RequestSpec};
use errors::ResolutionError;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct EnvironmentSource {
    env: Arc<dyn EnvSource>,
    fallback: bool,
}

impl Default for EnvironmentSource {
    fn default() -> Self {
        Self::new(Arc::new(ProcessEnv))
    }
}

impl EnvironmentSource {
    pub fn new(env: Arc<dyn EnvSource>) -> Self {
        Self {
            env,
            fallback: true,
        }
    }

    /// Enables or disables the un-prefixed lookup.
    ///
    /// The un-prefixed lookup sees every process variable, so `#/home`
    /// resolves to `HOME` when `<NAMESPACE>_HOME` is unset.
    #[must_use]
    pub fn with_fallback(mut self, fallback: bool) -> Self {
        self.fallback = fallback;
        self
    }
}

#[async_trait]
impl Source for EnvironmentSource {
    fn name(&self) -> &'static str {
        "environment"
    }

    async fn contribute(
        &self,
        spec: &RequestSpec,
        config: &mut Value,
    ) -> Result<(), ResolutionError> {
        for pointer in spec.requested_pointers() {
            let scoped = pointer.env_name(Some(&spec.name));
            let found = self.env.var(&scoped).map(|v| (scoped, v)).or_else(|| {
                if !self.fallback {
                    return None;
                }
                let bare = pointer.env_name(None);
                self.env.var(&bare).map(|v| (bare, v))
            });

            if let Some((variable, value)) = found {
                debug!(namespace = %spec.name, %pointer, %variable, "Value from environment");
                pointer.set(config, Value::String(value));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use testing::MapEnv;

    fn spec(value: Value) -> RequestSpec {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_reads_prefixed_variable() {
        let env = MapEnv::new().with_var("TEST_ME", "foobar");
        let source = EnvironmentSource::new(Arc::new(env));
        let mut config = json!({});

        source
            .contribute(&spec(json!({"name": "TEST", "keys": ["#/me"]})), &mut config)
            .await
            .unwrap();

        assert_eq!(config, json!({"me": "foobar"}));
    }

    #[tokio::test]
    async fn test_overrides_existing_value() {
        let env = MapEnv::new().with_var("TEST3_FOO_BAZ", "bar");
        let source = EnvironmentSource::new(Arc::new(env));
        let mut config = json!({"foo": {"baz": "from-kv", "other": "kept"}});

        source
            .contribute(
                &spec(json!({"name": "test3", "keys": ["#/foo/baz"]})),
                &mut config,
            )
            .await
            .unwrap();

        assert_eq!(config, json!({"foo": {"baz": "bar", "other": "kept"}}));
    }

    #[tokio::test]
    async fn test_prefixed_wins_over_fallback() {
        let env = MapEnv::new()
            .with_var("APP_PORT", "8080")
            .with_var("PORT", "9090");
        let source = EnvironmentSource::new(Arc::new(env));
        let mut config = json!({});

        source
            .contribute(&spec(json!({"name": "app", "keys": ["#/port"]})), &mut config)
            .await
            .unwrap();

        assert_eq!(config, json!({"port": "8080"}));
    }

    #[tokio::test]
    async fn test_unprefixed_fallback() {
        let env = MapEnv::new().with_var("PORT", "9090");
        let source = EnvironmentSource::new(Arc::new(env.clone()));
        let mut config = json!({});
        let request = spec(json!({"name": "app", "keys": ["#/port"]}));

        source.contribute(&request, &mut config).await.unwrap();
        assert_eq!(config, json!({"port": "9090"}));

        let strict = EnvironmentSource::new(Arc::new(env)).with_fallback(false);
        let mut config = json!({});
        strict.contribute(&request, &mut config).await.unwrap();
        assert_eq!(config, json!({}));
    }

    #[tokio::test]
    async fn test_fallback_reads_ambient_os_variables() {
        let env = MapEnv::new()
            .with_var("HOME", "/root")
            .with_var("PATH", "/usr/bin");
        let request = spec(json!({"name": "app", "keys": ["#/home", "#/path"]}));

        let mut config = json!({});
        EnvironmentSource::new(Arc::new(env.clone()))
            .contribute(&request, &mut config)
            .await
            .unwrap();
        assert_eq!(config, json!({"home": "/root", "path": "/usr/bin"}));

        let mut config = json!({});
        EnvironmentSource::new(Arc::new(env))
            .with_fallback(false)
            .contribute(&request, &mut config)
            .await
            .unwrap();
        assert_eq!(config, json!({}));
    }

    #[tokio::test]
    async fn test_reads_service_affixes() {
        let env = MapEnv::new()
            .with_var("APP_DB_USER", "admin@")
            .with_var("APP_DB_URI", "mongodb://fallback:27017/");
        let source = EnvironmentSource::new(Arc::new(env)).with_fallback(false);
        let mut config = json!({});

        let request = spec(json!({
            "name": "app",
            "services": [{"name": "db", "key": "#/db/uri", "prefix": "#/db/user"}]
        }));
        source.contribute(&request, &mut config).await.unwrap();

        assert_eq!(
            config,
            json!({"db": {"uri": "mongodb://fallback:27017/", "user": "admin@"}})
        );
    }

    #[tokio::test]
    async fn test_empty_value_is_present() {
        let env = MapEnv::new().with_var("APP_TOKEN", "");
        let source = EnvironmentSource::new(Arc::new(env));
        let mut config = json!({});

        source
            .contribute(&spec(json!({"name": "app", "keys": ["#/token"]})), &mut config)
            .await
            .unwrap();

        assert_eq!(config, json!({"token": ""}));
    }
}
