use crate::ranking::SrvRecord;
use async_trait::async_trait;
use errors::LookupError;
use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::error::ResolveErrorKind;

/// SRV lookup trait so the locator can run against any resolver
#[async_trait]
pub trait SrvResolver: Send + Sync {
    async fn lookup_srv(&self, name: &str) -> Result<Vec<SrvRecord>, LookupError>;
}

/// SRV resolver backed by the system DNS configuration.
pub struct HickoryResolver {
    inner: TokioAsyncResolver,
}

impl HickoryResolver {
    /// Builds a resolver from `/etc/resolv.conf` (or the platform
    /// equivalent).
    pub fn from_system_conf() -> Result<Self, LookupError> {
        let inner = TokioAsyncResolver::tokio_from_system_conf().map_err(|e| LookupError::Setup {
            reason: e.to_string(),
        })?;
        Ok(Self { inner })
    }
}

impl std::fmt::Debug for HickoryResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HickoryResolver").finish_non_exhaustive()
    }
}

#[async_trait]
impl SrvResolver for HickoryResolver {
    async fn lookup_srv(&self, name: &str) -> Result<Vec<SrvRecord>, LookupError> {
        let lookup = self.inner.srv_lookup(name).await.map_err(|e| match e.kind() {
            ResolveErrorKind::NoRecordsFound { .. } => LookupError::NoRecords {
                name: name.to_string(),
            },
            _ => LookupError::Failed {
                name: name.to_string(),
                reason: e.to_string(),
            },
        })?;

        Ok(lookup
            .iter()
            .map(|srv| SrvRecord::new(srv.priority(), srv.weight(), srv.port(), srv.target().to_utf8()))
            .collect())
    }
}
