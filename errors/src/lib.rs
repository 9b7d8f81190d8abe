//! # envconf Errors
//!
//! Error taxonomy for configuration resolution.
//!
//! - [`PointerError`]: malformed path pointer text
//! - [`KvError`], [`LookupError`]: failures talking to a key-value backend or
//!   the DNS resolver
//! - [`ResolutionError`]: accumulated by the resolution pipeline (transport
//!   failures and missing required values)
//! - [`ConfigError`]: caller-facing errors from the configuration store
//!
//! Uses `thiserror` with named fields throughout.

use serde::Serialize;
use thiserror::Error;

/// Path pointer parse errors
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PointerError {
    #[error("Invalid pointer syntax: {pointer:?} must start with '#' or '/'")]
    InvalidSyntax { pointer: String },

    #[error("Invalid escape sequence in pointer: {pointer:?}")]
    InvalidEscape { pointer: String },

    #[error("Pointer {pointer:?} does not name a namespace")]
    MissingNamespace { pointer: String },
}

/// Key-value backend errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KvError {
    #[error("Connection to {backend} failed: {reason}")]
    Connection { backend: String, reason: String },

    #[error("{backend} answered with status {status}")]
    Status { backend: String, status: u16 },

    #[error("Malformed response from {backend}: {reason}")]
    Decode { backend: String, reason: String },

    #[error("Invalid {backend} client setup: {reason}")]
    Setup { backend: String, reason: String },
}

/// DNS SRV lookup errors
///
/// None of these are fatal for a resolution pass: they mark a service as
/// unresolved so that statically configured values can take over.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("No SRV records for {name}")]
    NoRecords { name: String },

    #[error("SRV lookup for {name} failed: {reason}")]
    Failed { name: String, reason: String },

    #[error("SRV lookup for {name} timed out after {timeout_ms}ms")]
    Timeout { name: String, timeout_ms: u64 },

    #[error("DNS resolver setup failed: {reason}")]
    Setup { reason: String },
}

/// Errors accumulated while a namespace is being resolved.
///
/// Transport errors never abort the pipeline; missing-value errors are only
/// produced by the validation stage.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolutionError {
    #[error("Transport error from {source_name}: {reason}")]
    Transport { source_name: String, reason: String },

    #[error("Missing required value in {namespace}: {pointer}")]
    MissingValue { namespace: String, pointer: String },
}

impl ResolutionError {
    pub fn transport(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::Transport {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn is_missing_value(&self) -> bool {
        matches!(self, Self::MissingValue { .. })
    }
}

/// Configuration store errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid request specification: {reason}")]
    InvalidSpec { reason: String },

    #[error(transparent)]
    InvalidPointer(#[from] PointerError),

    #[error("Resolution of {namespace} reported {} error(s): {}", .errors.len(), join(.errors))]
    Unresolved {
        namespace: String,
        errors: Vec<ResolutionError>,
    },

    #[error("Unknown namespace: {namespace}")]
    UnknownNamespace { namespace: String },

    #[error("Missing required value in {namespace}: {pointer}")]
    MissingValue { namespace: String, pointer: String },

    #[error("{} namespace(s) failed: {}", .failures.len(), join(.failures))]
    Batch { failures: Vec<ConfigError> },

    #[error("Invalid resolver settings: {reason}")]
    Settings { reason: String },
}

impl ConfigError {
    /// Resolution errors carried by this error, flattened across batches.
    pub fn resolution_errors(&self) -> Vec<&ResolutionError> {
        match self {
            Self::Unresolved { errors, .. } => errors.iter().collect(),
            Self::Batch { failures } => failures
                .iter()
                .flat_map(ConfigError::resolution_errors)
                .collect(),
            _ => Vec::new(),
        }
    }
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
