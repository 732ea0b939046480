use itertools::Itertools;
use tracing::{debug, info, warn};

use crate::config::{CheckContext, PdpConfig};
use crate::error::PdpError;
use crate::request::{CheckRequest, bulk_request};
use crate::timers::{as_millis_f64, timed};
use crate::transport::{CallOptions, PdpTransport};
use crate::types::{BulkDecision, CheckQuery, ContextMap, Decision, ResourceSpec, SubjectKey};

const ALLOWED_PATH: &[&str] = &["allowed"];
const ALLOWED_BULK_PATH: &[&str] = &["allowed", "bulk"];

/// Asks the PDP sidecar for decisions. Cloneable and safe to share.
///
/// Every failure to obtain a decision is returned as an error; a `false`
/// result always means the PDP answered "deny".
#[derive(Debug, Clone)]
pub struct Enforcer {
    transport: PdpTransport,
    check_context: CheckContext,
    debug_mode: bool,
}

impl Enforcer {
    pub fn new(config: &PdpConfig) -> Result<Self, PdpError> {
        Ok(Self::with_transport(PdpTransport::new(config)?, config))
    }

    pub(crate) fn with_transport(transport: PdpTransport, config: &PdpConfig) -> Self {
        Enforcer {
            transport,
            check_context: config.check_context().clone(),
            debug_mode: config.debug_mode(),
        }
    }

    pub fn check_context(&self) -> &CheckContext {
        &self.check_context
    }

    /// May `subject` perform `action` on `resource`?
    pub async fn check(
        &self,
        subject: &SubjectKey,
        action: &str,
        resource: &ResourceSpec,
        context: Option<&ContextMap>,
    ) -> Result<bool, PdpError> {
        self.check_with(subject, action, resource, context, &CallOptions::default())
            .await
    }

    /// String form of [`check`](Self::check): `resource` is `type` or `type:key`.
    pub async fn check_str(
        &self,
        subject: &str,
        action: &str,
        resource: &str,
        context: Option<&ContextMap>,
    ) -> Result<bool, PdpError> {
        let resource: ResourceSpec = resource.parse()?;
        let subject: SubjectKey = subject.parse()?;
        self.check(&subject, action, &resource, context).await
    }

    /// [`check`](Self::check) with a per-call deadline or cancellation token.
    pub async fn check_with(
        &self,
        subject: &SubjectKey,
        action: &str,
        resource: &ResourceSpec,
        context: Option<&ContextMap>,
        options: &CallOptions,
    ) -> Result<bool, PdpError> {
        let body = CheckRequest::new(subject, action, resource, &self.check_context, context);

        if self.debug_mode {
            info!(
                event = "Check",
                phase = "Request",
                subject = %subject,
                action,
                resource_type = resource.kind(),
                tenant = body.resource().tenant()
            );
        } else {
            debug!(
                event = "Check",
                phase = "Request",
                subject = %subject,
                action,
                resource_type = resource.kind()
            );
        }

        let url = self.transport.endpoint(ALLOWED_PATH)?;
        let (result, elapsed) = timed(async {
            let response = self.transport.post(url, &body, options).await?;
            response.decode::<Decision>()
        })
        .await;

        #[cfg(feature = "observability")]
        crate::metrics::record_check(
            result.as_ref().map(|d| d.allow),
            elapsed,
            action,
            resource.kind(),
        );

        match result {
            Ok(decision) => {
                debug!(
                    event = "Check",
                    phase = "Result",
                    subject = %subject,
                    action,
                    resource = %body.resource(),
                    decision = %decision,
                    latency_ms = as_millis_f64(elapsed)
                );
                Ok(decision.allow)
            }
            Err(err) => {
                warn!(
                    event = "Check",
                    phase = "Error",
                    subject = %subject,
                    action,
                    resource = %body.resource(),
                    latency_ms = as_millis_f64(elapsed),
                    error = %err
                );
                Err(err)
            }
        }
    }

    /// Ask many questions in one round trip.
    ///
    /// The result has one entry per query, in input order. `context` applies
    /// to every query that does not carry its own. Either every decision is
    /// returned or an error is; there are no partial results.
    pub async fn bulk_check(
        &self,
        checks: &[CheckQuery],
        context: Option<&ContextMap>,
    ) -> Result<Vec<bool>, PdpError> {
        self.bulk_check_with(checks, context, &CallOptions::default())
            .await
    }

    pub async fn bulk_check_with(
        &self,
        checks: &[CheckQuery],
        context: Option<&ContextMap>,
        options: &CallOptions,
    ) -> Result<Vec<bool>, PdpError> {
        if checks.is_empty() {
            return Ok(Vec::new());
        }

        let body = bulk_request(checks, &self.check_context, context);

        let actions = checks.iter().map(|q| q.action.as_str()).unique().join(",");
        if self.debug_mode {
            info!(event = "BulkCheck", phase = "Request", batch_size = body.len(), actions = %actions);
        } else {
            debug!(event = "BulkCheck", phase = "Request", batch_size = body.len(), actions = %actions);
        }

        let url = self.transport.endpoint(ALLOWED_BULK_PATH)?;
        let (result, elapsed) = timed(async {
            let response = self.transport.post(url, &body, options).await?;
            let url = response.url.clone();
            let decisions = response.decode::<BulkDecision>()?;
            if decisions.len() != checks.len() {
                return Err(PdpError::Decode {
                    url,
                    reason: format!(
                        "expected {} decisions, got {}",
                        checks.len(),
                        decisions.len()
                    ),
                });
            }
            Ok(decisions.into_bools())
        })
        .await;

        #[cfg(feature = "observability")]
        crate::metrics::record_bulk_check(result.as_deref(), checks.len(), elapsed);

        match result {
            Ok(decisions) => {
                debug!(
                    event = "BulkCheck",
                    phase = "Result",
                    batch_size = decisions.len(),
                    allowed = decisions.iter().filter(|allow| **allow).count(),
                    latency_ms = as_millis_f64(elapsed)
                );
                Ok(decisions)
            }
            Err(err) => {
                warn!(
                    event = "BulkCheck",
                    phase = "Error",
                    batch_size = checks.len(),
                    latency_ms = as_millis_f64(elapsed),
                    error = %err
                );
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConnectionFailure;
    use crate::tests::unreachable_pdp_url;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use yare::parameterized;

    fn enforcer_for(server: &MockServer) -> Enforcer {
        Enforcer::new(
            &PdpConfig::new("tok")
                .with_pdp_url(server.uri())
                .with_default_tenant("acme")
                .with_use_default_tenant_if_empty(true),
        )
        .unwrap()
    }

    async fn mount_allowed(server: &MockServer, response: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path("/allowed"))
            .respond_with(response)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_check_end_to_end_wire_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/allowed"))
            .and(body_json(json!({
                "user": {"key": "alice"},
                "action": "read",
                "resource": {
                    "type": "document",
                    "key": "file1",
                    "tenant": "acme",
                    "context": {"tenant": "acme"}
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"allow": true})))
            .expect(1)
            .mount(&server)
            .await;

        let allowed = enforcer_for(&server)
            .check_str("alice", "read", "document:file1", None)
            .await
            .unwrap();
        assert!(allowed);
    }

    #[parameterized(
        allow = { json!({"allow": true}), true },
        deny = { json!({"allow": false}), false },
        missing_allow = { json!({}), false },
        with_debug_payload = { json!({"allow": true, "debug": {"rbac": {}}}), true },
    )]
    #[test_macro(tokio::test)]
    async fn test_check_decodes_decision(body: serde_json::Value, expected: bool) {
        let server = MockServer::start().await;
        mount_allowed(&server, ResponseTemplate::new(200).set_body_json(body)).await;

        let allowed = enforcer_for(&server)
            .check_str("alice", "read", "document", None)
            .await
            .unwrap();
        assert_eq!(allowed, expected);
    }

    #[tokio::test]
    async fn test_check_sends_caller_context() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/allowed"))
            .and(body_json(json!({
                "user": {"key": "alice"},
                "action": "read",
                "resource": {"type": "document", "tenant": "other", "context": {"x": "1"}},
                "context": {"ip": "10.0.0.1"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"allow": true})))
            .expect(1)
            .mount(&server)
            .await;

        let subject = SubjectKey::new("alice").unwrap();
        let resource = ResourceSpec::new("document")
            .with_tenant("other")
            .with_context(ContextMap::from([("x".to_string(), "1".to_string())]));
        let context = ContextMap::from([("ip".to_string(), "10.0.0.1".to_string())]);

        assert!(
            enforcer_for(&server)
                .check(&subject, "read", &resource, Some(&context))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_check_500_is_response_error() {
        let server = MockServer::start().await;
        mount_allowed(&server, ResponseTemplate::new(500)).await;

        let err = enforcer_for(&server)
            .check_str("alice", "read", "document:file1", None)
            .await
            .unwrap_err();

        assert!(err.is_response_error());
        assert!(!err.is_connection_error());
        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test]
    async fn test_check_non_json_200_is_decode_error() {
        let server = MockServer::start().await;
        mount_allowed(&server, ResponseTemplate::new(200).set_body_string("<html>")).await;

        let err = enforcer_for(&server)
            .check_str("alice", "read", "document", None)
            .await
            .unwrap_err();
        assert!(matches!(err, PdpError::Decode { .. }));
        assert!(err.is_response_error());
    }

    #[tokio::test]
    async fn test_check_connection_refused_is_connection_error() {
        let config = PdpConfig::new("tok").with_pdp_url(unreachable_pdp_url());
        let err = Enforcer::new(&config)
            .unwrap()
            .check_str("alice", "read", "document:file1", None)
            .await
            .unwrap_err();

        assert!(err.is_connection_error());
        assert!(!err.is_response_error());
        match err {
            PdpError::Connection { url, kind, .. } => {
                assert!(url.ends_with("/allowed"), "{url}");
                assert_eq!(kind, ConnectionFailure::Connect);
            }
            other => panic!("expected connection error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_check_malformed_resource_never_reaches_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = enforcer_for(&server)
            .check_str("alice", "read", "a:b:c", None)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            PdpError::MalformedResourceSpec {
                input: "a:b:c".into()
            }
        );
    }

    #[tokio::test]
    async fn test_check_deadline_reports_timeout() {
        let server = MockServer::start().await;
        mount_allowed(
            &server,
            ResponseTemplate::new(200)
                .set_body_json(json!({"allow": true}))
                .set_delay(Duration::from_secs(5)),
        )
        .await;

        let subject = SubjectKey::new("alice").unwrap();
        let err = enforcer_for(&server)
            .check_with(
                &subject,
                "read",
                &ResourceSpec::new("document"),
                None,
                &CallOptions::new().with_timeout(Duration::from_millis(50)),
            )
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(err.is_connection_error());
    }

    #[tokio::test]
    async fn test_bulk_check_preserves_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/allowed/bulk"))
            .and(body_json(json!([
                {"user": {"key": "alice"}, "action": "read", "resource": {"type": "document", "key": "1", "tenant": "acme", "context": {"tenant": "acme"}}, "context": {"req": "r1"}},
                {"user": {"key": "bob"}, "action": "write", "resource": {"type": "document", "key": "2", "tenant": "acme", "context": {"tenant": "acme"}}, "context": {"own": "yes"}},
                {"user": {"key": "carol"}, "action": "delete", "resource": {"type": "folder", "tenant": "acme", "context": {"tenant": "acme"}}, "context": {"req": "r1"}}
            ])))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "allow": [{"allow": true}, {"allow": false}, {"allow": true}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let checks = vec![
            CheckQuery::parse("alice", "read", "document:1").unwrap(),
            CheckQuery::parse("bob", "write", "document:2")
                .unwrap()
                .with_context(ContextMap::from([("own".to_string(), "yes".to_string())])),
            CheckQuery::parse("carol", "delete", "folder").unwrap(),
        ];
        let shared = ContextMap::from([("req".to_string(), "r1".to_string())]);

        let decisions = enforcer_for(&server)
            .bulk_check(&checks, Some(&shared))
            .await
            .unwrap();
        assert_eq!(decisions, vec![true, false, true]);
    }

    #[parameterized(
        too_few = { json!({"allow": [{"allow": true}]}) },
        too_many = { json!({"allow": [{"allow": true}, {"allow": true}, {"allow": true}]}) },
        wrong_shape = { json!([{"allow": true}, {"allow": true}]) },
        missing_outer = { json!({}) },
    )]
    #[test_macro(tokio::test)]
    async fn test_bulk_check_shape_mismatch_is_error(body: serde_json::Value) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/allowed/bulk"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let checks = vec![
            CheckQuery::parse("alice", "read", "document:1").unwrap(),
            CheckQuery::parse("bob", "read", "document:2").unwrap(),
        ];
        let err = enforcer_for(&server)
            .bulk_check(&checks, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PdpError::Decode { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn test_bulk_check_non_200_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/allowed/bulk"))
            .respond_with(ResponseTemplate::new(422))
            .mount(&server)
            .await;

        let checks = vec![CheckQuery::parse("alice", "read", "document:1").unwrap()];
        let err = enforcer_for(&server)
            .bulk_check(&checks, None)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(422));
    }

    #[tokio::test]
    async fn test_bulk_check_connection_refused() {
        let config = PdpConfig::new("tok").with_pdp_url(unreachable_pdp_url());
        let checks = vec![CheckQuery::parse("alice", "read", "document:1").unwrap()];
        let err = Enforcer::new(&config)
            .unwrap()
            .bulk_check(&checks, None)
            .await
            .unwrap_err();
        assert!(err.is_connection_error());
    }

    #[tokio::test]
    async fn test_bulk_check_empty_batch_skips_network() {
        let config = PdpConfig::new("tok").with_pdp_url(unreachable_pdp_url());
        let decisions = Enforcer::new(&config)
            .unwrap()
            .bulk_check(&[], None)
            .await
            .unwrap();
        assert!(decisions.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_checks_share_one_client() {
        let server = MockServer::start().await;
        mount_allowed(&server, ResponseTemplate::new(200).set_body_json(json!({"allow": true}))).await;

        let enforcer = enforcer_for(&server);
        let mut handles = Vec::new();
        for i in 0..16 {
            let enforcer = enforcer.clone();
            handles.push(tokio::spawn(async move {
                enforcer
                    .check_str(&format!("user-{i}"), "read", "document", None)
                    .await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().unwrap());
        }
        assert_eq!(server.received_requests().await.unwrap().len(), 16);
    }
}
