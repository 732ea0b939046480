//! Read-only records mirroring the PDP's locally synced directory.
//!
//! These carry no behavior; fields are whatever the sidecar last synced, so
//! everything except identifiers is optional and unknown fields are ignored.
//!
//! [`SyncedUser`] and [`SyncedRole`] are what [`crate::DirectoryCache`]
//! returns. [`Tenant`], [`Role`] and [`RoleAssignment`] are not returned by
//! any sidecar endpoint; they are decode targets for callers that read
//! tenant and role-assignment payloads from the management API themselves.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SyncedRole {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "tenantId", skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    #[schema(value_type = Object)]
    pub metadata: BTreeMap<String, Value>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SyncedUser {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    #[schema(value_type = Object)]
    pub metadata: BTreeMap<String, Value>,
    #[serde(default)]
    pub roles: Vec<SyncedRole>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Tenant {
    #[serde(default)]
    pub id: String,
    #[serde(default, alias = "externalId", alias = "key")]
    pub external_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Role {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, alias = "tenantId", skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

/// A role granted to a user within a scope (tenant).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RoleAssignment {
    #[serde(default)]
    pub id: String,
    pub role: Role,
    pub user: String,
    #[serde(default)]
    pub scope: String,
}
