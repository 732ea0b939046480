//! Decisions returned by the PDP.

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The PDP's answer to one query. A response without `allow` is a deny.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Decision {
    #[serde(default)]
    pub allow: bool,
}

impl Display for Decision {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        if self.allow {
            write!(f, "Allow")
        } else {
            write!(f, "Deny")
        }
    }
}

/// Bulk response body: one decision per query, in request order.
///
/// Unlike [`Decision::allow`], the outer `allow` array is mandatory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BulkDecision {
    pub allow: Vec<Decision>,
}

impl BulkDecision {
    pub fn len(&self) -> usize {
        self.allow.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allow.is_empty()
    }

    pub fn into_bools(self) -> Vec<bool> {
        self.allow.into_iter().map(|d| d.allow).collect()
    }
}
