//! Best-effort reads against the PDP's local directory mirror.
//!
//! The mirror is eventually consistent and may be cold. Reads never fail:
//! a non-200, a transport failure or an undecodable body all degrade to
//! `None` / an empty collection and are logged at `warn!`.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use strum_macros::{AsRefStr, Display};
use tracing::{debug, info, warn};

use crate::config::PdpConfig;
use crate::error::PdpError;
use crate::timers::{as_millis_f64, timed};
use crate::transport::{CallOptions, PdpTransport};
use crate::types::{SyncedRole, SyncedUser};

/// Which sidecar updater a resync trigger addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum TriggerTarget {
    DataUpdater,
    PolicyUpdater,
}

#[derive(Debug, Clone)]
pub struct DirectoryCache {
    transport: PdpTransport,
    debug_mode: bool,
}

impl DirectoryCache {
    pub fn new(config: &PdpConfig) -> Result<Self, PdpError> {
        Ok(Self::with_transport(PdpTransport::new(config)?, config))
    }

    pub(crate) fn with_transport(transport: PdpTransport, config: &PdpConfig) -> Self {
        DirectoryCache {
            transport,
            debug_mode: config.debug_mode(),
        }
    }

    pub async fn get_user(&self, user_id: &str) -> Option<SyncedUser> {
        if is_blank(user_id) {
            return None;
        }
        self.get_cached(&["local", "users", user_id]).await
    }

    /// Whether the mirror currently knows `user_id`.
    pub async fn is_user(&self, user_id: &str) -> bool {
        self.get_user(user_id).await.is_some()
    }

    pub async fn get_users(&self) -> Vec<SyncedUser> {
        self.get_cached(&["local", "users"]).await.unwrap_or_default()
    }

    /// Tenant keys the user has any role in.
    pub async fn get_user_tenants(&self, user_id: &str) -> Vec<String> {
        if is_blank(user_id) {
            return Vec::new();
        }
        self.get_cached(&["local", "users", user_id, "tenants"])
            .await
            .unwrap_or_default()
    }

    pub async fn get_assigned_roles(&self, user_id: &str) -> Vec<SyncedRole> {
        if is_blank(user_id) {
            return Vec::new();
        }
        self.get_cached(&["local", "users", user_id, "roles"])
            .await
            .unwrap_or_default()
    }

    pub async fn get_roles(&self) -> Vec<SyncedRole> {
        self.get_cached(&["local", "roles"]).await.unwrap_or_default()
    }

    pub async fn get_role_by_id(&self, role_id: &str) -> Option<SyncedRole> {
        if is_blank(role_id) {
            return None;
        }
        self.get_cached(&["local", "roles", role_id]).await
    }

    pub async fn get_role_by_name(&self, role_name: &str) -> Option<SyncedRole> {
        if is_blank(role_name) {
            return None;
        }
        self.get_cached(&["local", "roles", "by-name", role_name])
            .await
    }

    /// Ask the sidecar to resync its directory data. `true` means the
    /// request was accepted, not that the resync has finished.
    pub async fn trigger_data_update(&self) -> bool {
        self.trigger(TriggerTarget::DataUpdater).await
    }

    /// Ask the sidecar to reload policies. Same acceptance semantics as
    /// [`trigger_data_update`](Self::trigger_data_update).
    pub async fn trigger_policy_update(&self) -> bool {
        self.trigger(TriggerTarget::PolicyUpdater).await
    }

    /// Data first; policy is only triggered when the data trigger was accepted.
    pub async fn trigger_data_and_policy_update(&self) -> bool {
        self.trigger_data_update().await && self.trigger_policy_update().await
    }

    async fn get_cached<T: DeserializeOwned>(&self, segments: &[&str]) -> Option<T> {
        let url = match self.transport.endpoint(segments) {
            Ok(url) => url,
            Err(err) => {
                warn!(event = "CacheRead", phase = "Error", error = %err);
                return None;
            }
        };

        debug!(event = "CacheRead", phase = "Request", url = %url);

        let (result, elapsed) = timed(async {
            self.transport
                .get(url.clone(), &CallOptions::default())
                .await?
                .decode::<T>()
        })
        .await;

        match result {
            Ok(value) => {
                debug!(
                    event = "CacheRead",
                    phase = "Result",
                    url = %url,
                    latency_ms = as_millis_f64(elapsed)
                );
                Some(value)
            }
            Err(err) => {
                warn!(
                    event = "CacheRead",
                    phase = "Degraded",
                    url = %url,
                    latency_ms = as_millis_f64(elapsed),
                    error = %err
                );
                None
            }
        }
    }

    async fn trigger(&self, target: TriggerTarget) -> bool {
        let url = match self.transport.endpoint(&[target.as_ref(), "trigger"]) {
            Ok(url) => url,
            Err(err) => {
                warn!(event = "Trigger", phase = "Error", updater = %target, error = %err);
                return false;
            }
        };

        if self.debug_mode {
            info!(event = "Trigger", phase = "Request", updater = %target);
        }

        let (result, elapsed) = timed(self.transport.post(url, &json!({}), &CallOptions::default())).await;

        let accepted = match result {
            Ok(response) if response.is_ok() => true,
            Ok(response) => {
                warn!(
                    event = "Trigger",
                    phase = "Rejected",
                    updater = %target,
                    status = response.status.as_u16()
                );
                false
            }
            Err(err) => {
                warn!(event = "Trigger", phase = "Error", updater = %target, error = %err);
                false
            }
        };

        #[cfg(feature = "observability")]
        crate::metrics::record_trigger(target, accepted, elapsed);

        debug!(
            event = "Trigger",
            phase = "Result",
            updater = %target,
            accepted,
            latency_ms = as_millis_f64(elapsed)
        );
        accepted
    }
}

/// A blank id would address the collection endpoint instead of one record.
fn is_blank(id: &str) -> bool {
    id.trim().is_empty()
}
