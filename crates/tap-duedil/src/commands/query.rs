//! Query command implementation
//!
//! Runs the company search described by a JSON criteria file, emits the
//! `company_query` stream and writes the company cache for `sync`.

use super::RunInputs;
use crate::api::client::HttpTransport;
use crate::api::endpoints::COMPANY_QUERY;
use crate::checkpoint::CheckpointState;
use crate::company_cache::write_companies;
use crate::error::{Result, TapError};
use crate::sync::{QueryRunner, SyncSettings};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tap_common::{LogMetrics, MessageWriter, Metrics};
use tracing::{info, warn};

/// Run the query command
///
/// # Arguments
///
/// * `config_path` - Tap config file
/// * `catalog_path` - Catalog produced by `discover`
/// * `companies_path` - Company cache to write
/// * `query_path` - JSON search criteria, sent as the request body
/// * `schemas_dir` - Optional schema directory overriding the embedded set
pub async fn run(
    config_path: &Path,
    catalog_path: &Path,
    companies_path: &Path,
    query_path: &Path,
    schemas_dir: Option<&PathBuf>,
) -> Result<()> {
    let inputs = RunInputs::load(config_path, catalog_path, schemas_dir)?;
    let criteria = load_criteria(query_path)?;
    let schema = inputs.catalog.schema_for(COMPANY_QUERY, &inputs.registry)?;

    let metrics: Arc<dyn Metrics> = Arc::new(LogMetrics);
    let transport = HttpTransport::new(&inputs.config, metrics.clone())?;
    let mut sink = MessageWriter::stdout();
    let mut state = CheckpointState::default();

    let companies = QueryRunner::new(
        &transport,
        &mut sink,
        metrics,
        SyncSettings::from_config(&inputs.config),
    )
    .run(&schema, &criteria, &mut state)
    .await?;

    write_companies(companies_path, &companies)?;
    info!(
        count = companies.len(),
        path = %companies_path.display(),
        "Wrote company cache"
    );

    if transport.error_count() > 0 {
        warn!(
            errors = transport.error_count(),
            "Some requests were abandoned after exhausting retries"
        );
    }

    Ok(())
}

fn load_criteria(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        TapError::config(format!("cannot read query file '{}': {}", path.display(), e))
    })?;
    let criteria: Value = serde_json::from_str(&content).map_err(|e| {
        TapError::config(format!("query file '{}' is not valid JSON: {}", path.display(), e))
    })?;

    if !criteria.is_object() {
        return Err(TapError::config(format!(
            "query file '{}' must hold a JSON object",
            path.display()
        )));
    }
    Ok(criteria)
}
