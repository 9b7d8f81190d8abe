//! # Service Locator
//!
//! Resolves service descriptors to their top-ranked SRV record.
//!
//! Lookups for one request run concurrently with a fixed cap on outstanding
//! queries. Each lookup is bounded by a timeout. A failed, empty or timed
//! out lookup marks the service as unresolved; it never fails the batch.

use crate::ranking::{SrvRecord, top_ranked};
use crate::resolver::SrvResolver;
use envconf_core::ServiceDescriptor;
use errors::LookupError;
use futures_util::StreamExt;
use futures_util::stream;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_CONCURRENCY: usize = 3;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of locating one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Resolved(SrvRecord),
    Unresolved(LookupError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceLookup {
    pub service: ServiceDescriptor,
    pub outcome: LookupOutcome,
}

impl ServiceLookup {
    pub fn endpoint(&self) -> Option<&SrvRecord> {
        match &self.outcome {
            LookupOutcome::Resolved(record) => Some(record),
            LookupOutcome::Unresolved(_) => None,
        }
    }
}

/// One unit of work for the fan-out; owns its descriptor.
struct LookupTask {
    index: usize,
    service: ServiceDescriptor,
}

#[derive(Clone)]
pub struct ServiceLocator {
    resolver: Arc<dyn SrvResolver>,
    concurrency: usize,
    timeout: Duration,
}

impl ServiceLocator {
    pub fn new(resolver: Arc<dyn SrvResolver>) -> Self {
        Self {
            resolver,
            concurrency: DEFAULT_CONCURRENCY,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Looks up every service and returns one result per descriptor, in
    /// descriptor order, once all lookups have settled.
    pub async fn locate(&self, services: &[ServiceDescriptor]) -> Vec<ServiceLookup> {
        let tasks = services
            .iter()
            .cloned()
            .enumerate()
            .map(|(index, service)| LookupTask { index, service });

        let mut settled: Vec<(usize, ServiceLookup)> = stream::iter(tasks)
            .map(|task| self.run(task))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        settled.sort_by_key(|(index, _)| *index);
        settled.into_iter().map(|(_, lookup)| lookup).collect()
    }

    async fn run(&self, task: LookupTask) -> (usize, ServiceLookup) {
        let name = task.service.name.as_str();
        let outcome = match tokio::time::timeout(self.timeout, self.resolver.lookup_srv(name)).await
        {
            Ok(Ok(records)) => match top_ranked(records) {
                Some(record) => LookupOutcome::Resolved(record),
                None => LookupOutcome::Unresolved(LookupError::NoRecords {
                    name: name.to_string(),
                }),
            },
            Ok(Err(err)) => LookupOutcome::Unresolved(err),
            Err(_) => LookupOutcome::Unresolved(LookupError::Timeout {
                name: name.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        };

        match &outcome {
            LookupOutcome::Resolved(record) => {
                debug!(service = %name, target = %record.target, port = record.port, "SRV lookup resolved");
            }
            LookupOutcome::Unresolved(reason) => {
                debug!(service = %name, %reason, "SRV lookup unresolved");
            }
        }

        (
            task.index,
            ServiceLookup {
                service: task.service,
                outcome,
            },
        )
    }
}
