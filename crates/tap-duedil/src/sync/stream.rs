//! One endpoint, one company

use super::{conform_records, SyncSettings};
use crate::api::client::Transport;
use crate::api::endpoints::EndpointDescriptor;
use crate::company_cache::CompanyRef;
use crate::error::Result;
use crate::pagination::Paginator;
use serde_json::Value;
use tap_common::{Metrics, RecordSink};
use tracing::debug;

/// Page through `endpoint` for `company`, emitting conformed records
///
/// Returns the number of records written. A company the API has nothing
/// for yields zero, not an error.
pub async fn sync_company(
    transport: &dyn Transport,
    sink: &mut dyn RecordSink,
    metrics: &dyn Metrics,
    settings: &SyncSettings,
    endpoint: &EndpointDescriptor,
    schema: &Value,
    company: &CompanyRef,
) -> Result<usize> {
    let path = endpoint.path_for(company);
    let mut paginator = Paginator::new(transport, endpoint, path, settings.page_size)
        .with_max_pages(settings.max_pages);

    let mut written = 0;
    while let Some(page) = paginator.next_page().await? {
        let records = conform_records(endpoint.id, schema, page.records)?;
        sink.write_records(endpoint.id, &records)?;
        metrics.record_count(endpoint.id, records.len());
        written += records.len();
    }

    if written == 0 {
        debug!(stream = endpoint.id, company = %company, "No data for company");
    }
    Ok(written)
}
