//! Wire bodies for `/allowed` and `/allowed/bulk`.

use serde::Serialize;

use crate::config::CheckContext;
use crate::types::{CheckQuery, ContextMap, NormalizedResourceSpec, ResourceSpec, SubjectKey};

/// One `{user, action, resource, context?}` item, with the resource already
/// normalized.
#[derive(Debug, Clone, Serialize)]
pub struct CheckRequest<'a> {
    user: &'a SubjectKey,
    action: &'a str,
    resource: NormalizedResourceSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a ContextMap>,
}

impl<'a> CheckRequest<'a> {
    pub fn new(
        user: &'a SubjectKey,
        action: &'a str,
        resource: &ResourceSpec,
        check_context: &CheckContext,
        context: Option<&'a ContextMap>,
    ) -> Self {
        Self {
            user,
            action,
            resource: resource.normalize(check_context),
            context,
        }
    }

    /// A query's own context wins over the batch-wide `shared` one.
    pub fn from_query(
        query: &'a CheckQuery,
        check_context: &CheckContext,
        shared: Option<&'a ContextMap>,
    ) -> Self {
        Self::new(
            &query.subject,
            &query.action,
            &query.resource,
            check_context,
            query.context.as_ref().or(shared),
        )
    }

    pub fn user(&self) -> &SubjectKey {
        self.user
    }

    pub fn action(&self) -> &str {
        self.action
    }

    pub fn resource(&self) -> &NormalizedResourceSpec {
        &self.resource
    }

    pub fn context(&self) -> Option<&ContextMap> {
        self.context
    }
}

/// Build the bulk body, one item per query in input order.
pub fn bulk_request<'a>(
    checks: &'a [CheckQuery],
    check_context: &CheckContext,
    shared: Option<&'a ContextMap>,
) -> Vec<CheckRequest<'a>> {
    checks
        .iter()
        .map(|query| CheckRequest::from_query(query, check_context, shared))
        .collect()
}
