//! Client configuration.
//!
//! A [`PdpConfig`] is built once, handed to [`crate::PdpClient`] (or directly
//! to [`crate::Enforcer`] / [`crate::DirectoryCache`]) and never mutated
//! afterwards. Every call reads the same [`CheckContext`].

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use crate::error::PdpError;

/// PDP sidecar address used when none is configured.
pub const DEFAULT_PDP_URL: &str = "http://localhost:7000";

pub const ENV_TOKEN: &str = "PDP_TOKEN";
pub const ENV_URL: &str = "PDP_URL";
pub const ENV_DEFAULT_TENANT: &str = "PDP_DEFAULT_TENANT";
pub const ENV_USE_DEFAULT_TENANT: &str = "PDP_USE_DEFAULT_TENANT_IF_EMPTY";
pub const ENV_DEBUG: &str = "PDP_DEBUG";
pub const ENV_TIMEOUT_MS: &str = "PDP_TIMEOUT_MS";

/// Tenant defaulting rules applied by resource normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CheckContext {
    pub default_tenant: Option<String>,
    pub use_default_tenant_if_empty: bool,
}

impl CheckContext {
    pub fn new(default_tenant: Option<String>, use_default_tenant_if_empty: bool) -> Self {
        Self {
            default_tenant,
            use_default_tenant_if_empty,
        }
    }

    /// Shorthand for "always fall back to `tenant`".
    pub fn with_default_tenant(tenant: impl Into<String>) -> Self {
        Self::new(Some(tenant.into()), true)
    }
}

/// Bounded retry for transport-classified failures.
///
/// The default policy makes a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Values below 1 behave as 1.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled for each one after that.
    pub base_delay: Duration,
    /// Wall-clock cap for the whole call, in-flight attempts included.
    pub max_elapsed: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_elapsed: Duration::ZERO,
        }
    }

    pub fn new(max_attempts: u32, base_delay: Duration, max_elapsed: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_elapsed,
        }
    }

    /// Delay to sleep after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_elapsed)
    }

    /// Whether another attempt may start after `attempt` failed with
    /// `elapsed` already spent.
    pub fn allows_retry(&self, attempt: u32, elapsed: Duration) -> bool {
        attempt < self.max_attempts.max(1)
            && elapsed.saturating_add(self.delay_for(attempt)) < self.max_elapsed
    }

    /// Wall-clock time left for the whole call, or `None` when retry is off
    /// and only the request timeout applies.
    pub fn remaining_budget(&self, elapsed: Duration) -> Option<Duration> {
        (self.max_attempts > 1).then(|| self.max_elapsed.saturating_sub(elapsed))
    }
}

/// Everything the clients need to talk to one PDP sidecar.
#[derive(Clone, PartialEq, Eq)]
pub struct PdpConfig {
    token: String,
    pdp_url: String,
    check_context: CheckContext,
    debug_mode: bool,
    timeout: Option<Duration>,
    retry: RetryPolicy,
}

impl Debug for PdpConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("PdpConfig")
            .field("token", &"[redacted]")
            .field("pdp_url", &self.pdp_url)
            .field("check_context", &self.check_context)
            .field("debug_mode", &self.debug_mode)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

impl PdpConfig {
    /// Configuration for the default local sidecar, authenticated with `token`.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            pdp_url: DEFAULT_PDP_URL.to_string(),
            check_context: CheckContext::default(),
            debug_mode: false,
            timeout: None,
            retry: RetryPolicy::default(),
        }
    }

    /// Point at a different sidecar. A single trailing `/` is dropped.
    pub fn with_pdp_url(mut self, url: impl Into<String>) -> Self {
        let mut url = url.into();
        if url.ends_with('/') {
            url.pop();
        }
        self.pdp_url = url;
        self
    }

    pub fn with_default_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.check_context.default_tenant = Some(tenant.into());
        self
    }

    pub fn with_use_default_tenant_if_empty(mut self, enabled: bool) -> Self {
        self.check_context.use_default_tenant_if_empty = enabled;
        self
    }

    pub fn with_check_context(mut self, check_context: CheckContext) -> Self {
        self.check_context = check_context;
        self
    }

    pub fn with_debug_mode(mut self, enabled: bool) -> Self {
        self.debug_mode = enabled;
        self
    }

    /// Default deadline for every request; individual calls may override it.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn pdp_url(&self) -> &str {
        &self.pdp_url
    }

    pub fn check_context(&self) -> &CheckContext {
        &self.check_context
    }

    pub fn debug_mode(&self) -> bool {
        self.debug_mode
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    /// Check the token and parse the PDP URL into a base that relative
    /// endpoint paths can be appended to.
    pub fn base_url(&self) -> Result<Url, PdpError> {
        if self.token.trim().is_empty() {
            return Err(PdpError::InvalidConfig("API token must not be empty".into()));
        }

        let url = Url::parse(&self.pdp_url).map_err(|e| {
            PdpError::InvalidConfig(format!("invalid PDP URL '{}': {e}", self.pdp_url))
        })?;

        if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
            return Err(PdpError::InvalidConfig(format!(
                "PDP URL '{}' must be an absolute http(s) URL",
                self.pdp_url
            )));
        }

        Ok(url)
    }

    /// Load from `PDP_*` environment variables.
    ///
    /// `PDP_TOKEN` is required; unparseable optional values are logged and
    /// replaced by their defaults.
    pub fn from_env() -> Result<Self, PdpError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, PdpError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup(ENV_TOKEN)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| PdpError::InvalidConfig(format!("{ENV_TOKEN} is not set")))?;

        let mut config = PdpConfig::new(token);

        if let Some(url) = lookup(ENV_URL) {
            config = config.with_pdp_url(url);
        }
        if let Some(tenant) = lookup(ENV_DEFAULT_TENANT).filter(|t| !t.is_empty()) {
            config = config.with_default_tenant(tenant);
        }
        if let Some(flag) = lookup(ENV_USE_DEFAULT_TENANT) {
            config = config.with_use_default_tenant_if_empty(parse_flag(ENV_USE_DEFAULT_TENANT, &flag));
        }
        if let Some(flag) = lookup(ENV_DEBUG) {
            config = config.with_debug_mode(parse_flag(ENV_DEBUG, &flag));
        }
        if let Some(ms) = lookup(ENV_TIMEOUT_MS) {
            match ms.parse::<u64>() {
                Ok(ms) if ms > 0 => config = config.with_timeout(Duration::from_millis(ms)),
                _ => warn!(variable = ENV_TIMEOUT_MS, value = %ms, "ignoring invalid timeout"),
            }
        }

        config.base_url()?;
        Ok(config)
    }
}

fn parse_flag(variable: &str, value: &str) -> bool {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" | "" => false,
        other => {
            warn!(variable, value = other, "ignoring invalid boolean, using false");
            false
        }
    }
}
