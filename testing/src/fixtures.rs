use async_trait::async_trait;
use dashmap::DashMap;
use discovery::{SrvRecord, SrvResolver};
use envconf_core::{EnvSource, KvBackend, KvEntry};
use errors::{KvError, LookupError};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// SRV resolver answering from a fixed table.
///
/// Names missing from the table resolve to [`LookupError::NoRecords`].
#[derive(Default)]
pub struct StaticSrvResolver {
    answers: HashMap<String, Result<Vec<SrvRecord>, String>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StaticSrvResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(mut self, name: &str, records: Vec<SrvRecord>) -> Self {
        self.answers.insert(name.to_string(), Ok(records));
        self
    }

    pub fn with_failure(mut self, name: &str, reason: &str) -> Self {
        self.answers.insert(name.to_string(), Err(reason.to_string()));
        self
    }

    /// Delays every answer, useful for timeout and concurrency tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SrvResolver for StaticSrvResolver {
    async fn lookup_srv(&self, name: &str) -> Result<Vec<SrvRecord>, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.answers.get(name) {
            Some(Ok(records)) => Ok(records.clone()),
            Some(Err(reason)) => Err(LookupError::Failed {
                name: name.to_string(),
                reason: reason.clone(),
            }),
            None => Err(LookupError::NoRecords {
                name: name.to_string(),
            }),
        }
    }
}

/// Environment backed by a concurrent map; safe to mutate between
/// resolution passes without `unsafe` process-env writes.
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    vars: Arc<DashMap<String, String>>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(self, name: &str, value: &str) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&self, name: &str, value: &str) {
        self.vars.insert(name.to_string(), value.to_string());
    }

    pub fn remove(&self, name: &str) {
        self.vars.remove(name);
    }
}

impl EnvSource for MapEnv {
    fn var(&self, name: &str) -> Option<String> {
        self.vars.get(name).map(|v| v.value().clone())
    }
}

/// Key-value backend with fixed entries, or a fixed transport error.
#[derive(Debug, Default)]
pub struct StaticKv {
    entries: Vec<KvEntry>,
    failure: Option<String>,
    calls: AtomicUsize,
}

impl StaticKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, key: &str, value: &str) -> Self {
        self.entries.push(KvEntry::new(key, value));
        self
    }

    /// A folder entry: present key, no value.
    pub fn with_folder(mut self, key: &str) -> Self {
        self.entries.push(KvEntry {
            key: key.to_string(),
            value: None,
        });
        self
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            failure: Some(reason.to_string()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KvBackend for StaticKv {
    fn name(&self) -> &'static str {
        "static-kv"
    }

    async fn list(&self, prefix: &str) -> Result<Vec<KvEntry>, KvError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = &self.failure {
            return Err(KvError::Connection {
                backend: self.name().to_string(),
                reason: reason.clone(),
            });
        }
        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.key.starts_with(prefix))
            .cloned()
            .collect())
    }
}
