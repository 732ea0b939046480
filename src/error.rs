use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;

/// Why a request never produced an HTTP response from the PDP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConnectionFailure {
    /// DNS resolution or TCP/TLS connect failed.
    Connect,
    /// The per-call or configured deadline elapsed.
    Timeout,
    /// The caller's cancellation token fired.
    Cancelled,
    /// Any other transport failure (reset mid-body, protocol error, ...).
    Other,
}

#[derive(Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum PdpError {
    #[error("malformed resource '{input}': expected '<type>' or '<type>:<key>'")]
    MalformedResourceSpec { input: String },

    #[error("invalid subject: {0}")]
    InvalidSubject(String),

    #[error("could not reach PDP at {url} ({kind}): {cause}; check that the PDP sidecar is running and reachable at the configured URL")]
    Connection {
        url: String,
        kind: ConnectionFailure,
        cause: String,
    },

    #[error("PDP at {url} responded with HTTP {status}: {hint}")]
    Response {
        url: String,
        status: u16,
        hint: String,
    },

    #[error("failed to decode PDP response from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("failed to encode request body: {0}")]
    Encode(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PdpError {
    pub(crate) fn malformed_resource(input: &str) -> Self {
        PdpError::MalformedResourceSpec {
            input: input.to_string(),
        }
    }

    pub(crate) fn response(url: impl Into<String>, status: u16) -> Self {
        PdpError::Response {
            url: url.into(),
            status,
            hint: remediation_hint(status).to_string(),
        }
    }

    pub(crate) fn cancelled(url: impl Into<String>) -> Self {
        PdpError::Connection {
            url: url.into(),
            kind: ConnectionFailure::Cancelled,
            cause: "request cancelled by caller".to_string(),
        }
    }

    pub(crate) fn budget_exhausted(url: impl Into<String>, budget: Duration) -> Self {
        PdpError::Connection {
            url: url.into(),
            kind: ConnectionFailure::Timeout,
            cause: format!("retry budget of {}ms exhausted", budget.as_millis()),
        }
    }

    /// Classify a reqwest failure that happened before a complete response arrived.
    pub(crate) fn from_transport(url: impl Into<String>, err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ConnectionFailure::Timeout
        } else if err.is_connect() {
            ConnectionFailure::Connect
        } else {
            ConnectionFailure::Other
        };

        PdpError::Connection {
            url: url.into(),
            kind,
            cause: error_chain(err),
        }
    }

    /// The PDP could not be asked at all.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, PdpError::Connection { .. })
    }

    /// The PDP answered, but not with a usable decision.
    pub fn is_response_error(&self) -> bool {
        matches!(self, PdpError::Response { .. } | PdpError::Decode { .. })
    }

    /// Deadline elapsed or the call was cancelled.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            PdpError::Connection {
                kind: ConnectionFailure::Timeout | ConnectionFailure::Cancelled,
                ..
            }
        )
    }

    /// Only transport failures are worth another attempt; a non-200 from the
    /// PDP is a policy or configuration problem and will not go away.
    pub fn is_retryable(&self) -> bool {
        match self {
            PdpError::Connection { kind, .. } => *kind != ConnectionFailure::Cancelled,
            _ => false,
        }
    }

    /// HTTP status for response-classified failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            PdpError::Response { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn remediation_hint(status: u16) -> &'static str {
    match status {
        401 | 403 => "the PDP rejected the bearer token; verify the configured API token",
        404 => "endpoint not found; verify the PDP URL and that the sidecar version supports this call",
        400 | 422 => "the PDP rejected the request shape; verify subject, action and resource values",
        500..=599 => "the PDP failed while evaluating; inspect the sidecar logs",
        _ => "unexpected status from the PDP; inspect the sidecar logs",
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        out.push_str(": ");
        out.push_str(&inner.to_string());
        source = inner.source();
    }
    out
}
