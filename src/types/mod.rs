//! Data model for check requests, decisions and the cached directory.
//!
//! Canonical string forms:
//! - Subject: the opaque key, e.g. `alice` or `user|1234`
//! - Resource: `type` (the whole resource type) or `type:key` (one instance)
//!
//! Attribute maps are loosely typed JSON and are passed to the PDP untouched.

mod decision;
mod directory;
mod query;
mod resource;
mod subject;

use std::collections::BTreeMap;

pub use decision::{BulkDecision, Decision};
pub use directory::{Role, RoleAssignment, SyncedRole, SyncedUser, Tenant};
pub use query::CheckQuery;
pub use resource::{NormalizedResourceSpec, ResourceSpec};
pub use subject::SubjectKey;

/// String-to-string context map sent alongside a check.
pub type ContextMap = BTreeMap<String, String>;

/// Free-form attributes forwarded to the PDP without local interpretation.
pub type Attributes = BTreeMap<String, serde_json::Value>;
