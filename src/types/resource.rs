//! Resources being acted upon, and the tenant-defaulting normalization
//! applied before they are sent to the PDP.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::ops::Deref;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::CheckContext;
use crate::error::PdpError;

use super::{Attributes, ContextMap};

/// Context key the PDP reads tenant scoping from.
const TENANT_CONTEXT_KEY: &str = "tenant";

/// What is being acted upon.
///
/// A missing `key` addresses the resource type as a whole. A missing
/// `tenant` may be filled in from the configured default during
/// [`ResourceSpec::normalize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ResourceSpec {
    /// Resource category, e.g. "document"
    #[serde(rename = "type")]
    kind: String,
    /// Specific instance id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tenant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    attributes: Option<Attributes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    context: Option<ContextMap>,
}

impl Display for ResourceSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match &self.key {
            Some(key) => write!(f, "{}:{}", self.kind, key),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl FromStr for ResourceSpec {
    type Err = PdpError;

    /// Accepts:
    /// - document
    /// - document:file1
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        match parts.as_slice() {
            [kind] if !kind.is_empty() => Ok(ResourceSpec::new(*kind)),
            [kind, key] if !kind.is_empty() && !key.is_empty() => {
                Ok(ResourceSpec::new(*kind).with_key(*key))
            }
            _ => Err(PdpError::malformed_resource(s)),
        }
    }
}

impl ResourceSpec {
    /// A resource type with no specific instance.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            key: None,
            tenant: None,
            attributes: None,
            context: None,
        }
    }

    /// Parse the compact `type` / `type:key` form.
    pub fn parse(s: &str) -> Result<Self, PdpError> {
        s.parse()
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    /// Add an attribute to the resource, returning the updated value.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attributes
            .get_or_insert_with(Attributes::new)
            .insert(key.into(), value.into());
        self
    }

    /// Replace the context map. An explicit context is never overwritten by
    /// normalization, even when it lacks a tenant entry.
    pub fn with_context(mut self, context: ContextMap) -> Self {
        self.context = Some(context);
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn tenant(&self) -> Option<&str> {
        self.tenant.as_deref()
    }

    pub fn attributes(&self) -> Option<&Attributes> {
        self.attributes.as_ref()
    }

    pub fn context(&self) -> Option<&ContextMap> {
        self.context.as_ref()
    }

    /// Produce the shape the PDP must see.
    ///
    /// 1. A missing tenant is replaced by the default tenant when the
    ///    context asks for it.
    /// 2. If a tenant is now known and no context was supplied, the context
    ///    becomes `{"tenant": <tenant>}`.
    ///
    /// The input is left untouched.
    pub fn normalize(&self, check_context: &CheckContext) -> NormalizedResourceSpec {
        let mut resource = self.clone();

        if resource.tenant.is_none() && check_context.use_default_tenant_if_empty {
            resource.tenant = check_context.default_tenant.clone();
        }

        if resource.context.is_none() {
            if let Some(tenant) = &resource.tenant {
                resource.context = Some(ContextMap::from([(
                    TENANT_CONTEXT_KEY.to_string(),
                    tenant.clone(),
                )]));
            }
        }

        NormalizedResourceSpec(resource)
    }
}

/// A [`ResourceSpec`] after tenant defaulting and context injection.
///
/// Only obtainable through [`ResourceSpec::normalize`]; read it through
/// `Deref`, or turn it back into a plain spec with [`into_inner`](Self::into_inner).
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(transparent)]
pub struct NormalizedResourceSpec(ResourceSpec);

impl NormalizedResourceSpec {
    pub fn into_inner(self) -> ResourceSpec {
        self.0
    }
}

impl Deref for NormalizedResourceSpec {
    type Target = ResourceSpec;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for NormalizedResourceSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        self.0.fmt(f)
    }
}
