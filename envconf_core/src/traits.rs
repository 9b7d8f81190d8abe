//! Core traits for configuration sources

use crate::types::KvEntry;
use async_trait::async_trait;
use errors::KvError;

/// Key-value backend trait for remote configuration stores
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Short backend name used in logs and transport errors.
    fn name(&self) -> &'static str;

    /// Recursively lists every entry under `prefix`.
    ///
    /// A prefix with no entries is an empty list, not an error.
    async fn list(&self, prefix: &str) -> Result<Vec<KvEntry>, KvError>;
}

/// Read-only view of environment variables
pub trait EnvSource: Send + Sync {
    fn var(&self, name: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}
