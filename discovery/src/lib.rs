//! # Service Discovery
//!
//! Resolves named services to endpoint strings through DNS SRV records.
//!
//! This crate provides:
//! - SRV record ranking (priority ascending, weight descending)
//! - Endpoint formatters (`bareName`, `http`, `https`, `mongodb`)
//! - The [`SrvResolver`] seam with a system-DNS implementation
//! - A [`ServiceLocator`] with bounded concurrent lookups

pub mod formatter;
pub mod locator;
pub mod ranking;
pub mod resolver;

pub use formatter::Formatter;
pub use locator::{LookupOutcome, ServiceLocator, ServiceLookup};
pub use ranking::{SrvRecord, rank, top_ranked};
pub use resolver::{HickoryResolver, SrvResolver};
