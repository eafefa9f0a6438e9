//! HTTP transport for the DueDil API
//!
//! Every call resolves to one of three things:
//!
//! - `Ok(Some(json))`: the endpoint returned data
//! - `Ok(None)`: nothing could be obtained. A 404, a 400, or a transient
//!   failure that outlived the retry budget. Callers treat all three as
//!   "no data for this request".
//! - `Err(_)`: an unrecoverable status or a malformed body; the run aborts.

use crate::api::retry::{classify_status, Condition, RetryPolicy, StatusClass};
use crate::config::Config;
use crate::error::{Result, TapError};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::Client;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tap_common::Metrics;
use tracing::{debug, error, warn};

pub const AUTH_HEADER: &str = "X-AUTH-TOKEN";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    fn as_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        }
    }
}

/// One logical API call
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the API root
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Stream id used for metrics and logs
    pub endpoint_id: String,
}

impl ApiRequest {
    pub fn get(endpoint_id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
            endpoint_id: endpoint_id.into(),
        }
    }

    pub fn post(endpoint_id: impl Into<String>, path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
            endpoint_id: endpoint_id.into(),
        }
    }

    pub fn with_query(mut self, params: Vec<(String, String)>) -> Self {
        self.query = params;
        self
    }

    /// Value of a query parameter, if present
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Issues API calls on behalf of the pagination driver
#[async_trait]
pub trait Transport: Send + Sync {
    async fn call(&self, request: &ApiRequest) -> Result<Option<Value>>;
}

/// Result of a single attempt, before retry handling
enum Attempt {
    Data(Value),
    NoData,
    Transient(Condition),
}

/// reqwest-backed transport with bounded retry
pub struct HttpTransport {
    client: Client,
    base_url: String,
    api_key: String,
    user_agent: Option<String>,
    retry: RetryPolicy,
    metrics: Arc<dyn Metrics>,
    errors: AtomicU64,
}

impl HttpTransport {
    pub fn new(config: &Config, metrics: Arc<dyn Metrics>) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout()).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            user_agent: config.user_agent.clone(),
            retry: RetryPolicy::new(config.max_retries, config.retry_base_delay()),
            metrics,
            errors: AtomicU64::new(0),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Requests that gave up after exhausting their retries
    pub fn error_count(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    async fn attempt(&self, request: &ApiRequest) -> Result<Attempt> {
        let url = self.url(&request.path);
        let mut builder = self
            .client
            .request(request.method.as_reqwest(), &url)
            .query(&request.query)
            .header(AUTH_HEADER, &self.api_key)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json");

        if let Some(agent) = &self.user_agent {
            builder = builder.header(USER_AGENT, agent);
        }

        if let Some(body) = &request.body {
            builder = builder.body(serde_json::to_string(body)?);
        }

        let started = Instant::now();
        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) if is_transport_failure(&e) => {
                self.metrics
                    .http_request(&request.endpoint_id, None, started.elapsed());
                warn!(endpoint = %request.endpoint_id, error = %e, "Request did not complete");
                return Ok(Attempt::Transient(Condition::UpstreamUnavailable));
            },
            Err(e) => return Err(e.into()),
        };

        let status = response.status().as_u16();
        self.metrics
            .http_request(&request.endpoint_id, Some(status), started.elapsed());

        match classify_status(status) {
            StatusClass::Success => {
                let text = match response.text().await {
                    Ok(text) => text,
                    Err(e) if is_transport_failure(&e) => {
                        warn!(endpoint = %request.endpoint_id, error = %e, "Response body cut short");
                        return Ok(Attempt::Transient(Condition::UpstreamUnavailable));
                    },
                    Err(e) => return Err(e.into()),
                };
                if text.trim().is_empty() {
                    return Ok(Attempt::NoData);
                }
                let json = serde_json::from_str(&text).map_err(|e| {
                    TapError::unexpected_response(&request.endpoint_id, format!("invalid JSON: {}", e))
                })?;
                Ok(Attempt::Data(json))
            },
            StatusClass::NotFound => {
                debug!(endpoint = %request.endpoint_id, url = %url, "No data (404)");
                Ok(Attempt::NoData)
            },
            StatusClass::BadRequest => {
                let body = response.text().await.unwrap_or_default();
                error!(
                    severity = "critical",
                    endpoint = %request.endpoint_id,
                    url = %url,
                    body = %body,
                    "Bad request (400)"
                );
                Ok(Attempt::NoData)
            },
            StatusClass::Transient(condition) => Ok(Attempt::Transient(condition)),
            StatusClass::Fatal => {
                let body = response.text().await.unwrap_or_default();
                Err(TapError::HttpStatus {
                    endpoint: request.endpoint_id.clone(),
                    url,
                    status,
                    body,
                })
            },
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, request: &ApiRequest) -> Result<Option<Value>> {
        let mut attempt = 1;
        loop {
            match self.attempt(request).await? {
                Attempt::Data(json) => return Ok(Some(json)),
                Attempt::NoData => return Ok(None),
                Attempt::Transient(condition) if self.retry.should_retry(attempt) => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        endpoint = %request.endpoint_id,
                        path = %request.path,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "{}, backing off",
                        condition
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                },
                Attempt::Transient(condition) => {
                    self.errors.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        endpoint = %request.endpoint_id,
                        path = %request.path,
                        attempts = attempt,
                        "{} after every retry, giving up on this request",
                        condition
                    );
                    return Ok(None);
                },
            }
        }
    }
}

/// Connection drops, timeouts and truncated bodies; builder errors stay fatal
fn is_transport_failure(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() || e.is_decode()
}

/// Join a base URL and a path with exactly one slash between them
pub fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
