//! In-memory doubles shared by unit tests

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::api::client::{ApiRequest, Transport};
use crate::checkpoint::{CheckpointState, CheckpointStore};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tap_common::Metrics;

type Responder = dyn Fn(&ApiRequest) -> Result<Option<Value>> + Send + Sync;

/// Transport answering from a closure and remembering every request
pub struct FakeTransport {
    respond: Box<Responder>,
    calls: Mutex<Vec<ApiRequest>>,
}

impl FakeTransport {
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(&ApiRequest) -> Result<Option<Value>> + Send + Sync + 'static,
    {
        Self {
            respond: Box::new(respond),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn call(&self, request: &ApiRequest) -> Result<Option<Value>> {
        self.calls.lock().unwrap().push(request.clone());
        (self.respond)(request)
    }
}

#[derive(Default)]
pub struct RecordingMetrics {
    requests: Mutex<Vec<(String, Option<u16>)>>,
    records: Mutex<Vec<(String, usize)>>,
}

impl RecordingMetrics {
    pub fn requests(&self) -> Vec<(String, Option<u16>)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn records(&self) -> Vec<(String, usize)> {
        self.records.lock().unwrap().clone()
    }
}

impl Metrics for RecordingMetrics {
    fn http_request(&self, endpoint: &str, status: Option<u16>, _elapsed: Duration) {
        self.requests.lock().unwrap().push((endpoint.to_string(), status));
    }

    fn record_count(&self, endpoint: &str, count: usize) {
        self.records.lock().unwrap().push((endpoint.to_string(), count));
    }
}

/// Checkpoint store keeping every persisted state; clones share history
#[derive(Clone, Default)]
pub struct RecordingStore {
    persisted: Arc<Mutex<Vec<CheckpointState>>>,
}

impl RecordingStore {
    pub fn persisted(&self) -> Vec<CheckpointState> {
        self.persisted.lock().unwrap().clone()
    }

    pub fn company_indexes(&self) -> Vec<u64> {
        self.persisted().iter().map(|s| s.company_index).collect()
    }
}

impl CheckpointStore for RecordingStore {
    fn persist(&mut self, state: &CheckpointState) -> Result<()> {
        self.persisted.lock().unwrap().push(state.clone());
        Ok(())
    }
}
