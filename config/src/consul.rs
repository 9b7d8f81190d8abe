//! # Key-Value Source
//!
//! Fetches every key under `<namespace>/` from a key-value agent and writes
//! the ones the request asked for. Consul is the production backend.

use crate::precedence::Source;
use crate::settings::ConsulSettings;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use envconf_core::{KvBackend, KvEntry, Pointer, RequestSpec};
use errors::{KvError, ResolutionError};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use reqwest::Url;
use tracing::{debug, warn};

const BACKEND: &str = "consul";

/// One record of a Consul `GET /v1/kv/<prefix>?recurse` answer.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ConsulKvRecord {
    key: String,
    #[serde(default)]
    value: Option<String>,
}

/// Consul KV HTTP client.
pub struct ConsulKv {
    base_url: Url,
    client: reqwest::Client,
}

impl ConsulKv {
    pub fn new(settings: &ConsulSettings, timeout: Duration) -> Result<Self, KvError> {
        Self::with_base_url(&settings.base_url(), timeout)
    }

    /// Client for an explicit agent URL such as `http://127.0.0.1:8500`.
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, KvError> {
        let base_url = Url::parse(base_url).map_err(|e| setup_error(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(setup_error(format!("{base_url} cannot be a base URL")));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| setup_error(e.to_string()))?;
        Ok(Self { base_url, client })
    }

    /// `<base>/v1/kv/<prefix>?recurse=true` with every prefix segment
    /// percent-encoded.
    fn list_url(&self, prefix: &str) -> Result<Url, KvError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| setup_error(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(["v1", "kv"])
            .extend(prefix.split('/'));
        url.set_query(Some("recurse=true"));
        Ok(url)
    }
}

fn setup_error(reason: String) -> KvError {
    KvError::Setup {
        backend: BACKEND.to_string(),
        reason,
    }
}

#[async_trait]
impl KvBackend for ConsulKv {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn list(&self, prefix: &str) -> Result<Vec<KvEntry>, KvError> {
        let url = self.list_url(prefix)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| KvError::Connection {
                backend: BACKEND.to_string(),
                reason: e.to_string(),
            })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            debug!(%prefix, "No keys under prefix");
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(KvError::Status {
                backend: BACKEND.to_string(),
                status: response.status().as_u16(),
            });
        }

        let records: Vec<ConsulKvRecord> =
            response.json().await.map_err(|e| KvError::Decode {
                backend: BACKEND.to_string(),
                reason: e.to_string(),
            })?;

        Ok(records.into_iter().filter_map(decode_record).collect())
    }
}

fn decode_record(record: ConsulKvRecord) -> Option<KvEntry> {
    let Some(encoded) = record.value else {
        return Some(KvEntry {
            key: record.key,
            value: None,
        });
    };

    let decoded = STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| e.to_string())
        .and_then(|bytes| String::from_utf8(bytes).map_err(|e| e.to_string()));

    match decoded {
        Ok(value) => Some(KvEntry {
            key: record.key,
            value: Some(value),
        }),
        Err(reason) => {
            warn!(key = %record.key, %reason, "Skipping undecodable key-value entry");
            None
        }
    }
}

/// Pipeline stage reading from a key-value backend.
///
/// Without a backend the stage is a no-op.
#[derive(Clone, Default)]
pub struct ConsulSource {
    backend: Option<Arc<dyn KvBackend>>,
}

impl ConsulSource {
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }
}

#[async_trait]
impl Source for ConsulSource {
    fn name(&self) -> &'static str {
        "key-value"
    }

    async fn contribute(
        &self,
        spec: &RequestSpec,
        config: &mut Value,
    ) -> Result<(), ResolutionError> {
        let Some(backend) = &self.backend else {
            debug!(namespace = %spec.name, "No key-value agent configured");
            return Ok(());
        };

        let prefix = format!("{}/", spec.name);
        let entries = backend
            .list(&prefix)
            .await
            .map_err(|e| ResolutionError::transport(backend.name(), e))?;

        let wanted: HashSet<&Pointer> = spec.requested_pointers().into_iter().collect();
        let mut written = 0usize;
        for entry in entries {
            let Some(relative) = entry.key.strip_prefix(&prefix) else {
                continue;
            };
            let pointer = Pointer::from_kv_key(relative);
            if !wanted.contains(&pointer) {
                continue;
            }
            let Some(value) = entry.value else {
                continue;
            };
            debug!(namespace = %spec.name, %pointer, "Value from key-value store");
            pointer.set(config, Value::String(value));
            written += 1;
        }

        debug!(namespace = %spec.name, written, "Key-value stage complete");
        Ok(())
    }
}
