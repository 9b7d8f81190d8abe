//! # Configuration Resolution
//!
//! Resolves named configuration namespaces from a key-value store, the
//! process environment and DNS service discovery, and keeps the results in a
//! [`ConfigStore`].
//!
//! This crate provides:
//! - Source stages for Consul KV, environment variables and SRV discovery
//! - The fixed-order resolution [`Pipeline`] and its validation stage
//! - The [`ConfigStore`] with fulfill, renew and path-based reads
//! - Resolver settings loaded from the environment (12-factor app principles)
//!
//! # Best Practices
//!
//! - Uses `validator` crate for input validation
//! - Transport failures are accumulated, never fatal
//! - Readers only ever see complete resolution passes

pub mod consul;
pub mod environment;
pub mod loader;
pub mod precedence;
pub mod services;
pub mod settings;
pub mod store;
pub mod telemetry;
pub mod validator;

pub use consul::{ConsulKv, ConsulSource};
pub use environment::EnvironmentSource;
pub use loader::{load_from, load_from_env};
pub use precedence::{Pipeline, PipelineBuilder, Resolution, Source};
pub use services::ServiceSource;
pub use settings::{ConsulSettings, ResolverSettings, ResolverSettingsBuilder, ServicePrecedence};
pub use store::ConfigStore;
pub use crate::validator::{is_usable_name, missing_values, parse_spec, validate_spec};

pub type Result<T> = std::result::Result<T, errors::ConfigError>;
