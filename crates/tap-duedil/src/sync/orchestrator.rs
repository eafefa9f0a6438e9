//! Chunked sync orchestrator
//!
//! Companies are processed in fixed-size chunks. Each chunk runs through
//! every selected endpoint before the checkpoint moves past it:
//!
//! 1. `company_index` is set to the chunk start and persisted
//! 2. each endpoint emits its schema, then syncs every company in the chunk
//! 3. `company_index` advances by the chunk length and is persisted again
//!
//! A restarted run skips the chunks wholly before `company_index` and
//! replays the chunk it was in. Records for that chunk may be emitted twice.

use super::stream::sync_company;
use super::SyncSettings;
use crate::api::client::Transport;
use crate::api::endpoints::EndpointDescriptor;
use crate::checkpoint::{CheckpointState, CheckpointStore};
use crate::company_cache::CompanyRef;
use crate::error::{Result, TapError};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tap_common::{Metrics, RecordSink};
use tracing::{debug, info};

/// Outcome of one sync run
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSummary {
    pub chunks_total: usize,
    pub chunks_skipped: usize,
    pub companies_processed: usize,
    pub records_emitted: usize,
    pub final_company_index: u64,
    pub duration_seconds: f64,
}

pub struct SyncOrchestrator<'a> {
    transport: &'a dyn Transport,
    sink: &'a mut dyn RecordSink,
    metrics: Arc<dyn Metrics>,
    settings: SyncSettings,
    state: CheckpointState,
    store: Option<Box<dyn CheckpointStore + 'a>>,
}

impl<'a> SyncOrchestrator<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        sink: &'a mut dyn RecordSink,
        metrics: Arc<dyn Metrics>,
        settings: SyncSettings,
        state: CheckpointState,
    ) -> Self {
        Self {
            transport,
            sink,
            metrics,
            settings,
            state,
            store: None,
        }
    }

    /// Also write every persisted state to `store`
    pub fn with_store(mut self, store: impl CheckpointStore + 'a) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    pub fn state(&self) -> &CheckpointState {
        &self.state
    }

    /// Sync `streams` (with their schemas) for every company
    pub async fn sync(
        &mut self,
        streams: &[(&EndpointDescriptor, Value)],
        companies: &[CompanyRef],
    ) -> Result<SyncSummary> {
        let start_time = Instant::now();
        let chunk_size = self.settings.chunk_size;
        if chunk_size == 0 {
            return Err(TapError::config("chunk_size must be at least 1"));
        }

        let chunks: Vec<&[CompanyRef]> = companies.chunks(chunk_size).collect();
        let start_chunk = (self.state.company_index / chunk_size as u64) as usize;
        let chunks_skipped = start_chunk.min(chunks.len());
        let remaining = chunks.len() - chunks_skipped;

        info!(
            "Syncing {} streams for {} companies: {} chunks, resuming at chunk {}",
            streams.len(),
            companies.len(),
            chunks.len(),
            chunks_skipped + 1
        );

        let mut index = (start_chunk * chunk_size) as u64;
        let mut companies_processed = 0;
        let mut records_emitted = 0;

        for (position, chunk) in chunks.iter().skip(start_chunk).enumerate() {
            // Step 1: mark the chunk as in progress
            self.state.company_index = index;
            self.persist()?;

            // Step 2: every endpoint over the chunk
            for (endpoint, schema) in streams {
                self.sink
                    .write_schema(endpoint.id, schema, endpoint.primary_key_fields)?;

                for (i, company) in chunk.iter().enumerate() {
                    info!(
                        "Running for {} on {} (company {} of {}) [chunk {}/{}]",
                        company.company_id,
                        endpoint.id,
                        i + 1,
                        chunk.len(),
                        position + 1,
                        remaining
                    );

                    let written = sync_company(
                        self.transport,
                        &mut *self.sink,
                        self.metrics.as_ref(),
                        &self.settings,
                        endpoint,
                        schema,
                        company,
                    )
                    .await?;
                    records_emitted += written;
                }

                if let Some(last) = chunk.last() {
                    self.state.set_bookmark(endpoint.id, "company_id", last.company_id.clone());
                    self.state
                        .set_bookmark(endpoint.id, "country_code", last.country_code.clone());
                }
            }

            // Step 3: move past the chunk
            index += chunk.len() as u64;
            companies_processed += chunk.len();
            self.state.company_index = index;
            self.persist()?;

            debug!(chunk = position + 1, company_index = index, "Chunk complete");
        }

        self.persist()?;

        let duration = start_time.elapsed();
        info!(
            "Sync complete: {} companies, {} records in {:.2}s",
            companies_processed,
            records_emitted,
            duration.as_secs_f64()
        );

        Ok(SyncSummary {
            chunks_total: chunks.len(),
            chunks_skipped,
            companies_processed,
            records_emitted,
            final_company_index: self.state.company_index,
            duration_seconds: duration.as_secs_f64(),
        })
    }

    fn persist(&mut self) -> Result<()> {
        self.sink.write_state(&self.state.to_value())?;
        if let Some(store) = self.store.as_mut() {
            store.persist(&self.state)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::api::endpoints::find_endpoint;
    use crate::test_support::{FakeTransport, RecordingMetrics, RecordingStore};
    use serde_json::json;
    use tap_common::Message;

    fn companies(n: usize) -> Vec<CompanyRef> {
        (0..n).map(|i| CompanyRef::new(format!("{:08}", i), "GB")).collect()
    }

    fn vitals_stream() -> Vec<(&'static EndpointDescriptor, Value)> {
        let schema = json!({
            "type": "object",
            "properties": {"companyId": {"type": ["string", "null"]}, "countryCode": {"type": ["string", "null"]}}
        });
        vec![(find_endpoint("company_vitals").unwrap(), schema)]
    }

    /// Echoes the company id parsed from the vitals path
    fn echo_transport() -> FakeTransport {
        FakeTransport::new(|request| {
            let id = request
                .path
                .trim_start_matches("/company/gb/")
                .trim_end_matches(".json")
                .to_string();
            Ok(Some(json!({"companyId": id, "countryCode": "GB"})))
        })
    }

    fn states(messages: &[Message]) -> Vec<u64> {
        messages
            .iter()
            .filter_map(|m| match m {
                Message::State { value } => value["company_index"].as_u64(),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_checkpoints_bracket_every_chunk() {
        let transport = echo_transport();
        let store = RecordingStore::default();
        let mut messages: Vec<Message> = Vec::new();

        let summary = SyncOrchestrator::new(
            &transport,
            &mut messages,
            Arc::new(RecordingMetrics::default()),
            SyncSettings::default(),
            CheckpointState::default(),
        )
        .with_store(store.clone())
        .sync(&vitals_stream(), &companies(120))
        .await
        .unwrap();

        assert_eq!(summary.chunks_total, 3);
        assert_eq!(summary.companies_processed, 120);
        assert_eq!(summary.records_emitted, 120);
        assert_eq!(summary.final_company_index, 120);
        assert_eq!(transport.call_count(), 120);

        assert_eq!(store.company_indexes(), vec![0, 50, 50, 100, 100, 120, 120]);
        assert_eq!(states(&messages), vec![0, 50, 50, 100, 100, 120, 120]);

        let last = store.persisted().pop().unwrap();
        assert_eq!(last.bookmark("company_vitals", "company_id"), Some(&json!("00000119")));

        let schemas = messages
            .iter()
            .filter(|m| matches!(m, Message::Schema { .. }))
            .count();
        assert_eq!(schemas, 3);
    }

    #[tokio::test]
    async fn test_resume_skips_finished_chunks() {
        let transport = echo_transport();
        let store = RecordingStore::default();
        let mut messages: Vec<Message> = Vec::new();
        let state = CheckpointState::from_value(json!({"company_index": 50, "bookmarks": {}})).unwrap();

        let summary = SyncOrchestrator::new(
            &transport,
            &mut messages,
            Arc::new(RecordingMetrics::default()),
            SyncSettings::default(),
            state,
        )
        .with_store(store.clone())
        .sync(&vitals_stream(), &companies(120))
        .await
        .unwrap();

        assert_eq!(summary.chunks_skipped, 1);
        assert_eq!(summary.companies_processed, 70);
        assert_eq!(transport.calls()[0].path, "/company/gb/00000050.json");
        assert_eq!(store.company_indexes(), vec![50, 100, 100, 120, 120]);
    }

    #[tokio::test]
    async fn test_resume_mid_chunk_replays_whole_chunk() {
        let transport = echo_transport();
        let mut messages: Vec<Message> = Vec::new();
        let state = CheckpointState::from_value(json!({"company_index": 73})).unwrap();

        SyncOrchestrator::new(
            &transport,
            &mut messages,
            Arc::new(RecordingMetrics::default()),
            SyncSettings::default(),
            state,
        )
        .sync(&vitals_stream(), &companies(120))
        .await
        .unwrap();

        assert_eq!(transport.calls()[0].path, "/company/gb/00000050.json");
        assert_eq!(states(&messages)[0], 50);
    }

    #[tokio::test]
    async fn test_missing_data_continues() {
        let transport = FakeTransport::new(|request| {
            if request.path.contains("00000001") {
                Ok(None)
            } else {
                Ok(Some(json!({"companyId": "x", "countryCode": "GB"})))
            }
        });
        let mut messages: Vec<Message> = Vec::new();

        let summary = SyncOrchestrator::new(
            &transport,
            &mut messages,
            Arc::new(RecordingMetrics::default()),
            SyncSettings::default(),
            CheckpointState::default(),
        )
        .sync(&vitals_stream(), &companies(3))
        .await
        .unwrap();

        assert_eq!(transport.call_count(), 3);
        assert_eq!(summary.records_emitted, 2);
        assert_eq!(summary.final_company_index, 3);
    }

    #[tokio::test]
    async fn test_fatal_error_stops_without_persisting() {
        let transport = FakeTransport::new(|request| {
            if request.path.contains("00000002") {
                Err(TapError::HttpStatus {
                    endpoint: "company_vitals".into(),
                    url: request.path.clone(),
                    status: 401,
                    body: "invalid token".into(),
                })
            } else {
                Ok(Some(json!({"companyId": "x", "countryCode": "GB"})))
            }
        });
        let store = RecordingStore::default();
        let mut messages: Vec<Message> = Vec::new();

        let err = SyncOrchestrator::new(
            &transport,
            &mut messages,
            Arc::new(RecordingMetrics::default()),
            SyncSettings::default(),
            CheckpointState::default(),
        )
        .with_store(store.clone())
        .sync(&vitals_stream(), &companies(5))
        .await
        .unwrap_err();

        assert!(matches!(err, TapError::HttpStatus { status: 401, .. }));
        assert_eq!(transport.call_count(), 3);
        assert_eq!(store.company_indexes(), vec![0]);
    }

    #[tokio::test]
    async fn test_endpoints_run_in_order_per_chunk() {
        let transport = FakeTransport::new(|_| Ok(Some(json!({"companyId": "x", "countryCode": "GB"}))));
        let schema = json!({"type": "object", "properties": {"companyId": {"type": "string"}}});
        let streams = vec![
            (find_endpoint("company_vitals").unwrap(), schema.clone()),
            (find_endpoint("company_keywords").unwrap(), schema),
        ];
        let mut messages: Vec<Message> = Vec::new();
        let settings = SyncSettings {
            chunk_size: 2,
            ..SyncSettings::default()
        };

        SyncOrchestrator::new(
            &transport,
            &mut messages,
            Arc::new(RecordingMetrics::default()),
            settings,
            CheckpointState::default(),
        )
        .sync(&streams, &companies(3))
        .await
        .unwrap();

        let paths: Vec<_> = transport.calls().into_iter().map(|r| r.path).collect();
        assert_eq!(
            paths,
            vec![
                "/company/gb/00000000.json",
                "/company/gb/00000001.json",
                "/company/gb/00000000/keywords.json",
                "/company/gb/00000001/keywords.json",
                "/company/gb/00000002.json",
                "/company/gb/00000002/keywords.json",
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_company_list() {
        let transport = echo_transport();
        let store = RecordingStore::default();
        let mut messages: Vec<Message> = Vec::new();

        let summary = SyncOrchestrator::new(
            &transport,
            &mut messages,
            Arc::new(RecordingMetrics::default()),
            SyncSettings::default(),
            CheckpointState::default(),
        )
        .with_store(store.clone())
        .sync(&vitals_stream(), &[])
        .await
        .unwrap();

        assert_eq!(summary.chunks_total, 0);
        assert_eq!(transport.call_count(), 0);
        assert_eq!(store.company_indexes(), vec![0]);
    }
}
