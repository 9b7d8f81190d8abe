//! # Configuration Store
//!
//! Holds, per namespace, the accepted request specification and its most
//! recent resolved configuration.
//!
//! # Concurrency
//! - The namespace map is a `DashMap`; no map guard is held across an await.
//! - Each entry's configuration is an `Arc<Value>` behind a
//!   `parking_lot::RwLock` and is only ever replaced wholesale, so readers
//!   never observe a pass in progress.
//! - Writers of one namespace (first fulfillment, renewals) serialize on a
//!   per-entry `tokio::sync::Mutex`.

use crate::precedence::{Pipeline, Resolution};
use crate::settings::ResolverSettings;
use crate::validator::{is_usable_name, parse_spec, validate_spec};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use envconf_core::{Pointer, RequestSpec};
use errors::{ConfigError, PointerError};
use futures_util::future::join_all;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

struct NamespaceEntry {
    /// `None` for the placeholder left behind by a rejected request.
    spec: Option<Arc<RequestSpec>>,
    resolved: RwLock<Arc<Value>>,
    writer: Arc<Mutex<()>>,
}

impl NamespaceEntry {
    fn placeholder() -> Self {
        Self {
            spec: None,
            resolved: RwLock::new(Arc::new(Value::Object(Map::new()))),
            writer: Arc::new(Mutex::new(())),
        }
    }

    fn registered(spec: RequestSpec) -> Self {
        Self {
            spec: Some(Arc::new(spec)),
            ..Self::placeholder()
        }
    }

    fn config(&self) -> Arc<Value> {
        Arc::clone(&self.resolved.read())
    }
}

/// Resolved configuration for every fulfilled namespace.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// The caller-facing surface: register namespaces with [`fulfill`],
/// refresh them with [`renew`], and read values with [`get`]. A store is an
/// ordinary value; create one per application and share it by reference.
///
/// ## Usage
/// ```rust,no_run
/// use config::{ConfigStore, load_from_env};
/// use serde_json::json;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let store = ConfigStore::from_settings(&load_from_env()?)?;
/// store
///     .fulfill_json(json!({
///         "name": "TEST",
///         "keys": ["#/foo/uri"],
///         "services": [{"name": "foo.service.consul", "key": "#/foo/uri", "formatter": "https"}]
///     }))
///     .await?;
/// let uri = store.get("TEST", "#/foo/uri")?;
/// # Ok(())
/// # }
/// ```
///
/// [`fulfill`]: ConfigStore::fulfill
/// [`renew`]: ConfigStore::renew
/// [`get`]: ConfigStore::get
pub struct ConfigStore {
    pipeline: Arc<Pipeline>,
    entries: DashMap<String, Arc<NamespaceEntry>>,
}

impl ConfigStore {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            entries: DashMap::new(),
        }
    }

    pub fn from_settings(settings: &ResolverSettings) -> Result<Self, ConfigError> {
        Ok(Self::new(Arc::new(Pipeline::from_settings(settings)?)))
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    /// Registers and resolves a namespace.
    ///
    /// A rejected request leaves an empty placeholder under its name, if the
    /// name is usable. A name that is already registered is not resolved
    /// again; the call waits for that namespace's first pass to finish and
    /// returns `Ok`. Partial results are stored even when resolution
    /// reports errors.
    pub async fn fulfill(&self, spec: RequestSpec) -> Result<(), ConfigError> {
        if let Err(err) = validate_spec(&spec) {
            warn!(namespace = %spec.name, error = %err, "Rejected request specification");
            self.store_placeholder(&spec.name);
            return Err(err);
        }

        let name = spec.name.clone();
        let candidate = Arc::new(NamespaceEntry::registered(spec));
        let guard = Arc::clone(&candidate.writer).lock_owned().await;

        let existing = match self.entries.entry(name.clone()) {
            Entry::Occupied(occupied) if occupied.get().spec.is_some() => {
                Some(Arc::clone(occupied.get()))
            }
            Entry::Occupied(mut occupied) => {
                occupied.insert(Arc::clone(&candidate));
                None
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::clone(&candidate));
                None
            }
        };

        if let Some(existing) = existing {
            drop(guard);
            let _settled = existing.writer.lock().await;
            debug!(namespace = %name, "Namespace already registered, keeping its specification");
            return Ok(());
        }

        info!(namespace = %name, "Registered namespace");
        let result = self.resolve_into(&candidate).await;
        drop(guard);
        result
    }

    /// Deserializes, validates and fulfills a JSON request.
    pub async fn fulfill_json(&self, request: Value) -> Result<(), ConfigError> {
        let name = request
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_owned);

        match parse_spec(request) {
            Ok(spec) => self.fulfill(spec).await,
            Err(err) => {
                warn!(namespace = name.as_deref().unwrap_or_default(), error = %err, "Rejected request specification");
                if let Some(name) = name {
                    self.store_placeholder(&name);
                }
                Err(err)
            }
        }
    }

    /// Fulfills every request concurrently.
    ///
    /// Successful namespaces stay registered even when others fail.
    pub async fn fulfill_all(&self, specs: Vec<RequestSpec>) -> Result<(), ConfigError> {
        let results = join_all(specs.into_iter().map(|spec| self.fulfill(spec))).await;
        collect_batch(results)
    }

    /// Re-resolves a registered namespace and replaces its configuration.
    ///
    /// Unknown names and placeholders are ignored.
    pub async fn renew(&self, name: &str) -> Result<(), ConfigError> {
        let Some(entry) = self.entry(name) else {
            debug!(namespace = %name, "Renewal of unknown namespace ignored");
            return Ok(());
        };
        if entry.spec.is_none() {
            debug!(namespace = %name, "Renewal of unregistered namespace ignored");
            return Ok(());
        }

        let _guard = entry.writer.lock().await;
        self.resolve_into(&entry).await
    }

    /// Renews every registered namespace concurrently.
    pub async fn renew_all(&self) -> Result<(), ConfigError> {
        let names = self.namespaces();
        let results = join_all(names.iter().map(|name| self.renew(name))).await;
        collect_batch(results)
    }

    /// Reads the value at `pointer` in namespace `context`.
    ///
    /// # Errors
    /// - [`ConfigError::UnknownNamespace`] when `context` was never fulfilled
    /// - [`ConfigError::InvalidPointer`] for malformed pointer text
    /// - [`ConfigError::MissingValue`] when the value is absent and the
    ///   pointer is not optional for the namespace
    ///
    /// An absent optional value is `Ok(None)`.
    pub fn get(&self, context: &str, pointer: &str) -> Result<Option<Value>, ConfigError> {
        let entry = self
            .entry(context)
            .ok_or_else(|| ConfigError::UnknownNamespace {
                namespace: context.to_string(),
            })?;
        let pointer = Pointer::parse(pointer)?;
        read(context, &entry, &pointer)
    }

    /// Reads a store-wide pointer whose first segment names the namespace,
    /// e.g. `#/TEST/foo/uri`.
    pub fn get_path(&self, full: &str) -> Result<Option<Value>, ConfigError> {
        let pointer = Pointer::parse(full)?;
        let (namespace, rest) = pointer.split_first().ok_or_else(|| {
            PointerError::MissingNamespace {
                pointer: full.to_string(),
            }
        })?;
        let entry = self
            .entry(namespace)
            .ok_or_else(|| ConfigError::UnknownNamespace {
                namespace: namespace.to_string(),
            })?;
        read(namespace, &entry, &rest)
    }

    /// The namespace's current configuration.
    pub fn snapshot(&self, name: &str) -> Option<Arc<Value>> {
        self.entry(name).map(|entry| entry.config())
    }

    /// The specification registered for `name`; `None` for unknown names
    /// and placeholders.
    pub fn spec(&self, name: &str) -> Option<Arc<RequestSpec>> {
        self.entry(name).and_then(|entry| entry.spec.clone())
    }

    /// Registered namespace names, sorted.
    pub fn namespaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.value().spec.is_some())
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    fn entry(&self, name: &str) -> Option<Arc<NamespaceEntry>> {
        self.entries.get(name).map(|entry| Arc::clone(entry.value()))
    }

    fn store_placeholder(&self, name: &str) {
        if is_usable_name(name) {
            self.entries
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(NamespaceEntry::placeholder()));
        }
    }

    /// Runs one pass and swaps its result in, complete or not. Callers hold
    /// the writer lock.
    async fn resolve_into(&self, entry: &NamespaceEntry) -> Result<(), ConfigError> {
        let Some(spec) = entry.spec.as_deref() else {
            return Ok(());
        };
        let Resolution {
            namespace,
            config,
            errors,
        } = self.pipeline.resolve(spec).await;
        *entry.resolved.write() = Arc::new(config);

        if errors.is_empty() {
            return Ok(());
        }
        let err = ConfigError::Unresolved { namespace, errors };
        warn!(namespace = %spec.name, error = %err, "Namespace resolved with errors");
        Err(err)
    }
}

fn read(
    namespace: &str,
    entry: &NamespaceEntry,
    pointer: &Pointer,
) -> Result<Option<Value>, ConfigError> {
    let config = entry.config();
    match pointer.get(&config) {
        Some(value) => Ok(Some(value.clone())),
        None if entry
            .spec
            .as_ref()
            .is_some_and(|spec| spec.is_optional(pointer)) =>
        {
            Ok(None)
        }
        None => Err(ConfigError::MissingValue {
            namespace: namespace.to_string(),
            pointer: pointer.to_string(),
        }),
    }
}

fn collect_batch(results: Vec<Result<(), ConfigError>>) -> Result<(), ConfigError> {
    let failures: Vec<ConfigError> = results.into_iter().filter_map(Result::err).collect();
    if failures.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Batch { failures })
    }
}
