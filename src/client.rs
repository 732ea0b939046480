use crate::cache::DirectoryCache;
use crate::config::PdpConfig;
use crate::enforcer::Enforcer;
use crate::error::PdpError;
use crate::transport::PdpTransport;
use crate::types::{CheckQuery, ContextMap, ResourceSpec, SubjectKey};

/// One configured PDP sidecar: an [`Enforcer`] and a [`DirectoryCache`]
/// sharing a single connection pool.
///
/// Cheap to clone; build it once per process and hand out clones.
#[derive(Debug, Clone)]
pub struct PdpClient {
    config: PdpConfig,
    enforcer: Enforcer,
    cache: DirectoryCache,
}

impl PdpClient {
    pub fn new(config: PdpConfig) -> Result<Self, PdpError> {
        let transport = PdpTransport::new(&config)?;
        Ok(Self {
            enforcer: Enforcer::with_transport(transport.clone(), &config),
            cache: DirectoryCache::with_transport(transport, &config),
            config,
        })
    }

    /// Build from `PDP_*` environment variables; see [`PdpConfig::from_env`].
    pub fn from_env() -> Result<Self, PdpError> {
        Self::new(PdpConfig::from_env()?)
    }

    pub fn enforcer(&self) -> &Enforcer {
        &self.enforcer
    }

    pub fn cache(&self) -> &DirectoryCache {
        &self.cache
    }

    pub fn config(&self) -> &PdpConfig {
        &self.config
    }

    /// Shorthand for [`Enforcer::check`].
    pub async fn check(
        &self,
        subject: &SubjectKey,
        action: &str,
        resource: &ResourceSpec,
        context: Option<&ContextMap>,
    ) -> Result<bool, PdpError> {
        self.enforcer.check(subject, action, resource, context).await
    }

    /// Shorthand for [`Enforcer::check_str`].
    pub async fn check_str(
        &self,
        subject: &str,
        action: &str,
        resource: &str,
        context: Option<&ContextMap>,
    ) -> Result<bool, PdpError> {
        self.enforcer.check_str(subject, action, resource, context).await
    }

    /// Shorthand for [`Enforcer::bulk_check`].
    pub async fn bulk_check(
        &self,
        checks: &[CheckQuery],
        context: Option<&ContextMap>,
    ) -> Result<Vec<bool>, PdpError> {
        self.enforcer.bulk_check(checks, context).await
    }
}
