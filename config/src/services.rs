//! # Service Source
//!
//! Writes discovered service endpoints over the statically configured
//! values. Prefixes and suffixes are read from the configuration merged by
//! the earlier stages; a service whose lookup fails keeps its static value,
//! wrapped by the same prefix and suffix.

use crate::precedence::Source;
use crate::settings::ServicePrecedence;
use async_trait::async_trait;
use discovery::{Formatter, LookupOutcome, ServiceLocator, ServiceLookup};
use envconf_core::{Pointer, RequestSpec};
use errors::ResolutionError;
use serde_json::Value;
use tracing::debug;

#[derive(Clone)]
pub struct ServiceSource {
    locator: ServiceLocator,
    precedence: ServicePrecedence,
}

impl ServiceSource {
    pub fn new(locator: ServiceLocator) -> Self {
        Self {
            locator,
            precedence: ServicePrecedence::default(),
        }
    }

    #[must_use]
    pub fn with_precedence(mut self, precedence: ServicePrecedence) -> Self {
        self.precedence = precedence;
        self
    }

    /// The value to store for one lookup, if any, computed against the
    /// configuration as it stood before this stage.
    fn value_for(&self, lookup: &ServiceLookup, merged: &Value) -> Option<String> {
        let service = &lookup.service;
        let prefix = affix(service.prefix.as_ref(), merged);
        let suffix = affix(service.suffix.as_ref(), merged);
        let existing = service.key.get(merged);

        match &lookup.outcome {
            LookupOutcome::Resolved(_)
                if self.precedence == ServicePrecedence::Explicit && existing.is_some() =>
            {
                debug!(service = %service.name, key = %service.key, "Keeping explicit value over discovered endpoint");
                None
            }
            LookupOutcome::Resolved(endpoint) => {
                Some(Formatter::for_service(service).format(endpoint, &prefix, &suffix))
            }
            LookupOutcome::Unresolved(reason) => match existing {
                Some(Value::String(value)) => {
                    debug!(service = %service.name, key = %service.key, %reason, "Falling back to static value");
                    Some(format!("{prefix}{value}{suffix}"))
                }
                _ => {
                    debug!(service = %service.name, key = %service.key, %reason, "Service unresolved, nothing to write");
                    None
                }
            },
        }
    }
}

/// Renders a prefix or suffix; absent pointers and containers are empty.
fn affix(pointer: Option<&Pointer>, merged: &Value) -> String {
    match pointer.and_then(|p| p.get(merged)) {
        Some(Value::String(s)) => s.clone(),
        Some(scalar @ (Value::Number(_) | Value::Bool(_))) => scalar.to_string(),
        _ => String::new(),
    }
}

#[async_trait]
impl Source for ServiceSource {
    fn name(&self) -> &'static str {
        "service-locator"
    }

    async fn contribute(
        &self,
        spec: &RequestSpec,
        config: &mut Value,
    ) -> Result<(), ResolutionError> {
        if spec.services.is_empty() {
            return Ok(());
        }

        let lookups = self.locator.locate(&spec.services).await;
        let merged = &*config;
        let writes: Vec<(Pointer, String)> = lookups
            .iter()
            .filter_map(|lookup| {
                self.value_for(lookup, merged)
                    .map(|value| (lookup.service.key.clone(), value))
            })
            .collect();

        for (key, value) in writes {
            debug!(namespace = %spec.name, %key, %value, "Value from service locator");
            key.set(config, Value::String(value));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use discovery::SrvRecord;
    use serde_json::json;
    use std::sync::Arc;
    use testing::StaticSrvResolver;

    fn spec(value: Value) -> RequestSpec {
        serde_json::from_value(value).unwrap()
    }

    fn source(resolver: StaticSrvResolver) -> ServiceSource {
        ServiceSource::new(ServiceLocator::new(Arc::new(resolver)))
    }

    #[tokio::test]
    async fn test_discovered_endpoint_overwrites_static_value() {
        let resolver = StaticSrvResolver::new().with_records(
            "foo.service.consul",
            vec![SrvRecord::new(1, 1, 443, "foo.example.com.")],
        );
        let mut config = json!({"foo": {"uri": "https://static:1/"}});

        source(resolver)
            .contribute(
                &spec(json!({
                    "name": "TEST",
                    "services": [{"name": "foo.service.consul", "key": "#/foo/uri", "formatter": "https"}]
                })),
                &mut config,
            )
            .await
            .unwrap();

        assert_eq!(config, json!({"foo": {"uri": "https://foo.example.com:443/"}}));
    }

    #[tokio::test]
    async fn test_affixes_come_from_merged_config() {
        let resolver = StaticSrvResolver::new().with_records(
            "api.service.consul",
            vec![SrvRecord::new(1, 1, 8080, "api.internal")],
        );
        let mut config = json!({"api": {"auth": "user:pw@", "path": "v1", "port": 3}});

        source(resolver)
            .contribute(
                &spec(json!({
                    "name": "app",
                    "services": [{
                        "name": "api.service.consul",
                        "key": "#/api/url",
                        "formatter": "http",
                        "prefix": "#/api/auth",
                        "suffix": "#/api/path"
                    }]
                })),
                &mut config,
            )
            .await
            .unwrap();

        assert_eq!(config["api"]["url"], json!("http://user:pw@api.internal:8080/v1"));
    }

    #[tokio::test]
    async fn test_missing_affixes_are_empty() {
        let resolver = StaticSrvResolver::new()
            .with_records("db.service.consul", vec![SrvRecord::new(1, 1, 5432, "db.internal")]);
        let mut config = json!({});

        source(resolver)
            .contribute(
                &spec(json!({
                    "name": "app",
                    "services": [{
                        "name": "db.service.consul",
                        "key": "#/db/host",
                        "prefix": "#/db/user",
                        "suffix": "#/db/domain"
                    }]
                })),
                &mut config,
            )
            .await
            .unwrap();

        assert_eq!(config, json!({"db": {"host": "db.internal"}}));
    }

    #[tokio::test]
    async fn test_numeric_affix_is_rendered() {
        let resolver = StaticSrvResolver::new()
            .with_records("db.service.consul", vec![SrvRecord::new(1, 1, 5432, "db")]);
        let mut config = json!({"shard": 7});

        source(resolver)
            .contribute(
                &spec(json!({
                    "name": "app",
                    "services": [{"name": "db.service.consul", "key": "#/host", "suffix": "#/shard"}]
                })),
                &mut config,
            )
            .await
            .unwrap();

        assert_eq!(config["host"], json!("db7"));
    }

    #[tokio::test]
    async fn test_unresolved_wraps_static_value() {
        let mut config = json!({"db": {"host": "fallback.internal", "user": "admin@"}});

        source(StaticSrvResolver::new())
            .contribute(
                &spec(json!({
                    "name": "app",
                    "services": [{
                        "name": "db.service.consul",
                        "key": "#/db/host",
                        "prefix": "#/db/user"
                    }]
                })),
                &mut config,
            )
            .await
            .unwrap();

        assert_eq!(config["db"]["host"], json!("admin@fallback.internal"));
    }

    #[tokio::test]
    async fn test_unresolved_without_static_value_writes_nothing() {
        let resolver = StaticSrvResolver::new().with_failure("db.service.consul", "SERVFAIL");
        let mut config = json!({});

        source(resolver)
            .contribute(
                &spec(json!({
                    "name": "app",
                    "services": [{"name": "db.service.consul", "key": "#/db/host"}]
                })),
                &mut config,
            )
            .await
            .unwrap();

        assert_eq!(config, json!({}));
    }

    #[tokio::test]
    async fn test_explicit_precedence_keeps_static_value() {
        let resolver = StaticSrvResolver::new()
            .with_records("a.service.consul", vec![SrvRecord::new(1, 1, 80, "a.internal")])
            .with_records("b.service.consul", vec![SrvRecord::new(1, 1, 80, "b.internal")]);
        let mut config = json!({"a": "pinned"});

        source(resolver)
            .with_precedence(ServicePrecedence::Explicit)
            .contribute(
                &spec(json!({
                    "name": "app",
                    "services": [
                        {"name": "a.service.consul", "key": "#/a"},
                        {"name": "b.service.consul", "key": "#/b"}
                    ]
                })),
                &mut config,
            )
            .await
            .unwrap();

        assert_eq!(config, json!({"a": "pinned", "b": "b.internal"}));
    }

    #[tokio::test]
    async fn test_no_services_skips_lookups() {
        let resolver = Arc::new(StaticSrvResolver::new());
        let source = ServiceSource::new(ServiceLocator::new(resolver.clone()));
        let mut config = json!({"a": "1"});

        source
            .contribute(&spec(json!({"name": "app", "keys": ["#/a"]})), &mut config)
            .await
            .unwrap();

        assert_eq!(resolver.calls(), 0);
        assert_eq!(config, json!({"a": "1"}));
    }
}
