//! Company search
//!
//! Pages through `/search/companies.json` with the user's criteria as the
//! POST body. Every company found is emitted as a `company_query` record
//! and returned in order so the caller can write the company cache.

use super::{conform_records, SyncSettings};
use crate::api::client::Transport;
use crate::api::endpoints::{company_query, COMPANY_PK, COMPANY_QUERY};
use crate::checkpoint::CheckpointState;
use crate::company_cache::CompanyRef;
use crate::error::{Result, TapError};
use crate::pagination::Paginator;
use serde_json::Value;
use std::sync::Arc;
use tap_common::{Metrics, RecordSink};
use tracing::info;

pub struct QueryRunner<'a> {
    transport: &'a dyn Transport,
    sink: &'a mut dyn RecordSink,
    metrics: Arc<dyn Metrics>,
    settings: SyncSettings,
}

impl<'a> QueryRunner<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        sink: &'a mut dyn RecordSink,
        metrics: Arc<dyn Metrics>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            transport,
            sink,
            metrics,
            settings,
        }
    }

    /// Run the search and return every company found, in response order
    ///
    /// The offset of the last page fetched is stored in `state` under
    /// `company_query.company_offset` and emitted as a `STATE` message.
    pub async fn run(
        &mut self,
        schema: &Value,
        criteria: &Value,
        state: &mut CheckpointState,
    ) -> Result<Vec<CompanyRef>> {
        let endpoint = company_query();
        self.sink.write_schema(COMPANY_QUERY, schema, COMPANY_PK)?;

        let mut paginator = Paginator::new(
            self.transport,
            endpoint,
            endpoint.path_template,
            self.settings.page_size,
        )
        .with_body(criteria.clone())
        .with_missing_data(self.settings.query_missing_data())
        .with_max_pages(self.settings.max_pages);

        let mut companies = Vec::new();
        let mut last_offset = 0;

        while let Some(page) = paginator.next_page().await? {
            last_offset = page.cursor.offset;

            for record in &page.records {
                companies.push(company_ref(record)?);
            }

            let records = conform_records(COMPANY_QUERY, schema, page.records)?;
            self.sink.write_records(COMPANY_QUERY, &records)?;
            self.metrics.record_count(COMPANY_QUERY, records.len());

            info!(
                "Queried offset {} of {} -- got {} companies",
                paginator.cursor().offset,
                page.total.map_or_else(|| "?".to_string(), |t| t.to_string()),
                records.len()
            );
        }

        info!(count = companies.len(), "Company query complete");

        state.set_bookmark(COMPANY_QUERY, "company_offset", last_offset);
        self.sink.write_state(&state.to_value())?;

        Ok(companies)
    }
}

fn company_ref(record: &Value) -> Result<CompanyRef> {
    let field = |name: &str| match record.get(name) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(TapError::unexpected_response(
            COMPANY_QUERY,
            format!("company without '{}': {}", name, record),
        )),
    };
    Ok(CompanyRef::new(field("companyId")?, field("countryCode")?))
}
