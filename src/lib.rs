//! Client for a co-located policy decision point (PDP) sidecar.
//!
//! [`Enforcer`] asks "may this subject perform this action on this
//! resource?" one query or one batch at a time. [`DirectoryCache`] reads the
//! sidecar's eventually consistent copy of users and roles and can ask it to
//! resync. [`PdpClient`] bundles both over one connection pool.
//!
//! A `false` decision always means the PDP said deny. Failing to get an
//! answer is a [`PdpError`], classified by [`PdpError::is_connection_error`]
//! and [`PdpError::is_response_error`].

pub use cache::{DirectoryCache, TriggerTarget};
pub use client::PdpClient;
pub use config::{CheckContext, DEFAULT_PDP_URL, PdpConfig, RetryPolicy};
pub use enforcer::Enforcer;
pub use error::{ConnectionFailure, PdpError};
pub use request::CheckRequest;
pub use transport::CallOptions;
pub use types::{
    Attributes, BulkDecision, CheckQuery, ContextMap, Decision, NormalizedResourceSpec,
    ResourceSpec, Role, RoleAssignment, SubjectKey, SyncedRole, SyncedUser, Tenant,
};

mod cache;
mod client;
mod config;
mod enforcer;
mod error;
#[cfg(feature = "observability")]
pub mod metrics;
mod request;
mod timers;
mod transport;
pub mod types;

#[cfg(test)]
mod tests;
