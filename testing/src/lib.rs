//! Shared test fixtures for the envconf workspace.
//!
//! Provides in-memory stand-ins for every external collaborator of the
//! resolution pipeline:
//! - [`StaticSrvResolver`]: canned SRV answers, failures and delays
//! - [`MapEnv`]: an environment that never touches the process
//! - [`StaticKv`]: a key-value backend with fixed entries or a fixed error
//!
//! Every fixture counts its calls so tests can assert that a source was (or
//! was not) queried.

mod fixtures;

pub use fixtures::*;
use std::sync::atomic::{AtomicU32, Ordering};

static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

pub fn unique_id(prefix: &str) -> String {
    let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{}-{}", prefix, id)
}

/// A namespace name that no other test in this process uses.
pub fn unique_namespace() -> String {
    unique_id("test").replace('-', "_")
}
