//! # envconf Core
//!
//! Shared types and traits for resolving configuration namespaces.
//!
//! This crate provides:
//! - Path pointers used to request, write and read configuration values
//! - The request specification and service descriptor data model
//! - Traits for key-value backends and environment sources

pub mod pointer;
pub mod traits;
pub mod types;

pub use pointer::Pointer;
pub use traits::{EnvSource, KvBackend, ProcessEnv};
pub use types::{KvEntry, RequestSpec, ServiceDescriptor};
