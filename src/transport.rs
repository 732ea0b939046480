//! HTTP plumbing shared by the enforcer and the directory cache.
//!
//! One `reqwest::Client` (and therefore one connection pool) is built per
//! configuration and cloned freely; nothing here holds per-request state.

use std::time::{Duration, Instant};

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::config::{PdpConfig, RetryPolicy};
use crate::error::PdpError;

/// Per-call overrides for deadline and cancellation.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Overrides the configured request timeout for this call.
    pub timeout: Option<Duration>,
    /// Aborts the in-flight request when cancelled.
    pub cancel: Option<CancellationToken>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// A fully read response.
#[derive(Debug)]
pub(crate) struct PdpResponse {
    pub(crate) url: String,
    pub(crate) status: StatusCode,
    pub(crate) body: Vec<u8>,
}

impl PdpResponse {
    pub(crate) fn is_ok(&self) -> bool {
        self.status == StatusCode::OK
    }

    /// Decode a 200 body; anything else is a response-classified error.
    pub(crate) fn decode<T: DeserializeOwned>(self) -> Result<T, PdpError> {
        if !self.is_ok() {
            return Err(PdpError::response(self.url, self.status.as_u16()));
        }

        serde_json::from_slice(&self.body).map_err(|e| PdpError::Decode {
            url: self.url,
            reason: e.to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct PdpTransport {
    http: reqwest::Client,
    base: Url,
    timeout: Option<Duration>,
    retry: RetryPolicy,
}

impl PdpTransport {
    pub(crate) fn new(config: &PdpConfig) -> Result<Self, PdpError> {
        let base = config.base_url()?;

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.token()))
            .map_err(|e| PdpError::InvalidConfig(format!("API token is not a valid header value: {e}")))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| PdpError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base,
            timeout: config.timeout(),
            retry: config.retry(),
        })
    }

    /// Append path segments to the base URL, percent-encoding each one.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url, PdpError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| PdpError::InvalidConfig(format!("PDP URL '{}' cannot be a base", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub(crate) async fn get(&self, url: Url, options: &CallOptions) -> Result<PdpResponse, PdpError> {
        self.send(Method::GET, url, None, options).await
    }

    pub(crate) async fn post<B>(
        &self,
        url: Url,
        body: &B,
        options: &CallOptions,
    ) -> Result<PdpResponse, PdpError>
    where
        B: Serialize + ?Sized,
    {
        let payload = serde_json::to_vec(body).map_err(|e| PdpError::Encode(e.to_string()))?;
        self.send(Method::POST, url, Some(payload), options).await
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        payload: Option<Vec<u8>>,
        options: &CallOptions,
    ) -> Result<PdpResponse, PdpError> {
        let timeout = options.timeout.or(self.timeout);
        let exchange = self.exchange_with_retry(&method, &url, payload.as_deref(), timeout);

        match &options.cancel {
            Some(token) => tokio::select! {
                biased;
                () = token.cancelled() => {
                    debug!(event = "Http", phase = "Cancelled", method = %method, url = %url);
                    Err(PdpError::cancelled(url.as_str()))
                }
                result = exchange => result,
            },
            None => exchange.await,
        }
    }

    async fn exchange_with_retry(
        &self,
        method: &Method,
        url: &Url,
        payload: Option<&[u8]>,
        timeout: Option<Duration>,
    ) -> Result<PdpResponse, PdpError> {
        let started = Instant::now();
        let mut attempt = 1;

        loop {
            let attempt_timeout = match self.retry.remaining_budget(started.elapsed()) {
                Some(remaining) if remaining.is_zero() => {
                    return Err(PdpError::budget_exhausted(url.as_str(), self.retry.max_elapsed));
                }
                Some(remaining) => Some(timeout.map_or(remaining, |t| t.min(remaining))),
                None => timeout,
            };

            match self.exchange(method, url, payload, attempt_timeout).await {
                Err(err) if err.is_retryable() && self.retry.allows_retry(attempt, started.elapsed()) => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        event = "Http",
                        phase = "Retry",
                        method = %method,
                        url = %url,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn exchange(
        &self,
        method: &Method,
        url: &Url,
        payload: Option<&[u8]>,
        timeout: Option<Duration>,
    ) -> Result<PdpResponse, PdpError> {
        let mut request = self.http.request(method.clone(), url.clone());
        if let Some(payload) = payload {
            request = request.body(payload.to_vec());
        }
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PdpError::from_transport(url.as_str(), &e))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| PdpError::from_transport(url.as_str(), &e))?;

        debug!(
            event = "Http",
            phase = "Response",
            method = %method,
            url = %url,
            status = status.as_u16(),
            bytes = body.len()
        );

        Ok(PdpResponse {
            url: url.to_string(),
            status,
            body: body.to_vec(),
        })
    }
}
