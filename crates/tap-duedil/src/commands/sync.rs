//! Sync command implementation
//!
//! Syncs the selected per-company streams for every company in the cache,
//! checkpointing after each chunk.

use super::RunInputs;
use crate::api::client::HttpTransport;
use crate::api::endpoints::{default_sync_stream_ids, select_endpoints, COMPANY_QUERY};
use crate::checkpoint::{CheckpointState, FileCheckpointStore};
use crate::company_cache::read_companies;
use crate::error::{Result, TapError};
use crate::sync::{SyncOrchestrator, SyncSettings};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tap_common::{LogMetrics, MessageWriter, Metrics};
use tracing::{info, warn};

/// Run the sync command
///
/// # Arguments
///
/// * `config_path` - Tap config file
/// * `catalog_path` - Catalog produced by `discover`
/// * `companies_path` - Company cache written by `query`
/// * `state_path` - Optional state file, read at start and rewritten on every checkpoint
/// * `streams` - Streams to sync; empty means every per-company stream
/// * `schemas_dir` - Optional schema directory overriding the embedded set
pub async fn run(
    config_path: &Path,
    catalog_path: &Path,
    companies_path: &Path,
    state_path: Option<&PathBuf>,
    streams: &[String],
    schemas_dir: Option<&PathBuf>,
) -> Result<()> {
    let inputs = RunInputs::load(config_path, catalog_path, schemas_dir)?;

    let companies = read_companies(companies_path).map_err(|e| match e {
        TapError::Io(io) => TapError::config(format!(
            "cannot read company cache '{}': {}",
            companies_path.display(),
            io
        )),
        other => other,
    })?;

    let state = match state_path {
        Some(path) => CheckpointState::load(path)?,
        None => CheckpointState::default(),
    };

    let endpoints = if streams.is_empty() {
        select_endpoints(&default_sync_stream_ids())?
    } else {
        if streams.iter().any(|s| s == COMPANY_QUERY) {
            return Err(TapError::config(
                "company_query is not a per-company stream; use the query command",
            ));
        }
        select_endpoints(streams)?
    };

    let selected = endpoints
        .into_iter()
        .map(|endpoint| -> Result<_> {
            Ok((endpoint, inputs.catalog.schema_for(endpoint.id, &inputs.registry)?))
        })
        .collect::<Result<Vec<_>>>()?;

    info!(
        companies = companies.len(),
        streams = selected.len(),
        company_index = state.company_index,
        "Starting sync"
    );

    let metrics: Arc<dyn Metrics> = Arc::new(LogMetrics);
    let transport = HttpTransport::new(&inputs.config, metrics.clone())?;
    let mut sink = MessageWriter::stdout();

    let mut orchestrator = SyncOrchestrator::new(
        &transport,
        &mut sink,
        metrics,
        SyncSettings::from_config(&inputs.config),
        state,
    );
    if let Some(path) = state_path {
        orchestrator = orchestrator.with_store(FileCheckpointStore::new(path));
    }

    let summary = orchestrator.sync(&selected, &companies).await?;

    info!(
        chunks = summary.chunks_total,
        skipped = summary.chunks_skipped,
        records = summary.records_emitted,
        company_index = summary.final_company_index,
        "Sync finished"
    );

    if transport.error_count() > 0 {
        warn!(
            errors = transport.error_count(),
            "Some requests were abandoned after exhausting retries"
        );
    }

    Ok(())
}
