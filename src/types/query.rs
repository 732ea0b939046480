//! One authorization question.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::PdpError;

use super::{ContextMap, ResourceSpec, SubjectKey};

/// The unit of work for both single and bulk checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CheckQuery {
    pub subject: SubjectKey,
    pub action: String,
    pub resource: ResourceSpec,
    /// Per-query context; when set it takes precedence over the batch-wide
    /// context passed to `bulk_check`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextMap>,
}

impl CheckQuery {
    pub fn new(subject: SubjectKey, action: impl Into<String>, resource: ResourceSpec) -> Self {
        Self {
            subject,
            action: action.into(),
            resource,
            context: None,
        }
    }

    /// Build from plain strings, parsing `resource` as `type` or `type:key`.
    pub fn parse(subject: &str, action: &str, resource: &str) -> Result<Self, PdpError> {
        Ok(Self::new(subject.parse()?, action, resource.parse()?))
    }

    pub fn with_context(mut self, context: ContextMap) -> Self {
        self.context = Some(context);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query() {
        let query = CheckQuery::parse("alice", "read", "document:file1").unwrap();
        assert_eq!(query.subject.key(), "alice");
        assert_eq!(query.action, "read");
        assert_eq!(query.resource.kind(), "document");
        assert_eq!(query.resource.key(), Some("file1"));
        assert!(query.context.is_none());
    }

    #[test]
    fn test_parse_query_propagates_resource_error() {
        let err = CheckQuery::parse("alice", "read", "a:b:c").unwrap_err();
        assert!(matches!(err, PdpError::MalformedResourceSpec { .. }));
    }

    #[test]
    fn test_parse_query_propagates_subject_error() {
        let err = CheckQuery::parse("", "read", "document").unwrap_err();
        assert!(matches!(err, PdpError::InvalidSubject(_)));
    }

    #[test]
    fn test_deserialize_rejects_empty_subject() {
        let err = serde_json::from_str::<CheckQuery>(
            r#"{"subject": {"key": ""}, "action": "read", "resource": {"type": "doc"}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("subject key must not be empty"), "{err}");
    }

    #[test]
    fn test_deserialize_query() {
        let query: CheckQuery = serde_json::from_str(
            r#"{"subject": {"key": "alice"}, "action": "read", "resource": {"type": "doc", "key": "1"}}"#,
        )
        .unwrap();
        assert_eq!(query, CheckQuery::parse("alice", "read", "doc:1").unwrap());
    }

    #[test]
    fn test_with_context() {
        let context = ContextMap::from([("ip".to_string(), "10.0.0.1".to_string())]);
        let query = CheckQuery::parse("alice", "read", "document")
            .unwrap()
            .with_context(context.clone());
        assert_eq!(query.context, Some(context));
    }
}
