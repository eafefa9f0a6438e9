//! Extraction engines
//!
//! - `query`: runs the company search and returns the companies it found
//! - `stream`: syncs one endpoint for one company
//! - `orchestrator`: drives every selected endpoint over the company list in
//!   checkpointed chunks

pub mod orchestrator;
pub mod query;
pub mod stream;

pub use orchestrator::{SyncOrchestrator, SyncSummary};
pub use query::QueryRunner;

use crate::config::{self, Config};
use crate::error::{Result, TapError};
use crate::pagination::MissingData;
use crate::schema::transform;
use serde_json::Value;
use std::time::Duration;

/// Tunables shared by the query and sync engines
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSettings {
    /// Companies per checkpointed chunk
    pub chunk_size: usize,
    pub page_size: u64,
    pub max_pages: u32,
    pub query_cooldown: Duration,
    pub query_max_attempts: u32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            chunk_size: config::DEFAULT_CHUNK_SIZE,
            page_size: config::DEFAULT_PAGE_SIZE,
            max_pages: config::DEFAULT_MAX_PAGES,
            query_cooldown: Duration::from_secs(config::DEFAULT_QUERY_COOLDOWN_SECS),
            query_max_attempts: config::DEFAULT_QUERY_MAX_ATTEMPTS,
        }
    }
}

impl SyncSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunk_size: config.chunk_size,
            page_size: config.page_size,
            max_pages: config.max_pages,
            query_cooldown: config.query_cooldown(),
            query_max_attempts: config.query_max_attempts,
        }
    }

    /// Cool-down policy for an empty company search response
    pub fn query_missing_data(&self) -> MissingData {
        MissingData::CoolDown {
            max_attempts: self.query_max_attempts,
            interval: self.query_cooldown,
        }
    }
}

/// Conform every record to the stream schema; the first failure aborts
pub(crate) fn conform_records(stream: &str, schema: &Value, records: Vec<Value>) -> Result<Vec<Value>> {
    records
        .iter()
        .map(|record| {
            transform(record, schema).map_err(|e| TapError::Transform {
                stream: stream.to_string(),
                path: e.path,
                message: e.message,
            })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_settings_from_config() {
        let mut config = Config::new("key");
        config.chunk_size = 10;
        config.query_cooldown_secs = 5;
        config.query_max_attempts = 2;

        let settings = SyncSettings::from_config(&config);
        assert_eq!(settings.chunk_size, 10);
        assert_eq!(settings.page_size, 50);
        assert_eq!(
            settings.query_missing_data(),
            MissingData::CoolDown {
                max_attempts: 2,
                interval: Duration::from_secs(5)
            }
        );
        assert_eq!(SyncSettings::from_config(&Config::new("key")), SyncSettings::default());
    }

    #[test]
    fn test_conform_records_reports_stream() {
        let schema = json!({"type": "object", "properties": {"n": {"type": "integer"}}});
        let err = conform_records("company_vitals", &schema, vec![json!({"n": 1}), json!({"n": "x"})])
            .unwrap_err();
        match err {
            TapError::Transform { stream, path, .. } => {
                assert_eq!(stream, "company_vitals");
                assert_eq!(path, "$.n");
            },
            other => panic!("unexpected error: {other}"),
        }
    }
}
