//! Pagination driver
//!
//! `Paginator` walks one endpoint page by page. It is pull-based: nothing is
//! fetched until `next_page` is awaited, and it keeps no durable position.
//! A restarted run replays the loop from offset 0.
//!
//! Termination:
//!
//! - Collections stop on the first page with zero records.
//! - Single documents stop when the transport has no data, or when their
//!   embedded `pagination` block is absent or says the last page was served
//!   (`offset + limit >= total`).
//! - Either way, a hard page cap bounds a server that never stops.

use crate::api::client::Transport;
use crate::api::endpoints::{EndpointDescriptor, EndpointKind};
use crate::error::{Result, TapError};
use serde_json::Value;
use std::time::Duration;
use tracing::{error, info, warn};

/// Offset/limit position of one pagination loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub offset: u64,
    pub limit: u64,
    pub total: Option<u64>,
}

impl Cursor {
    pub fn start(limit: u64) -> Self {
        Self {
            offset: 0,
            limit,
            total: None,
        }
    }

    /// Parse an echoed `{"offset", "limit", "total"}` block
    pub fn from_block(block: &Value) -> Option<Self> {
        let field = |name: &str| block.get(name).and_then(as_u64);
        Some(Self {
            offset: field("offset")?,
            limit: field("limit")?,
            total: field("total"),
        })
    }

    /// Offset of the following page, `None` if it would overflow
    pub fn next_offset(&self) -> Option<u64> {
        self.offset.checked_add(self.limit)
    }

    /// Whether a page after this one exists
    pub fn has_more(&self) -> bool {
        if self.limit == 0 {
            return false;
        }
        match (self.next_offset(), self.total) {
            (None, _) => false,
            (Some(next), Some(total)) => next < total,
            (Some(_), None) => true,
        }
    }
}

/// Numbers occasionally arrive as strings or floats
fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// What to do when the transport yields no data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingData {
    /// Treat it as the end of the sequence
    EndOfStream,
    /// Sleep and re-issue the same page; fail after `max_attempts`
    CoolDown { max_attempts: u32, interval: Duration },
}

impl MissingData {
    /// Default for an endpoint kind
    pub fn for_kind(kind: EndpointKind) -> Self {
        match kind {
            EndpointKind::CompanyQuery => MissingData::CoolDown {
                max_attempts: 3,
                interval: Duration::from_secs(30),
            },
            EndpointKind::CompanyInfo | EndpointKind::CompanyOfficers => MissingData::EndOfStream,
        }
    }
}

/// Records from one response, with the cursor that fetched them
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub records: Vec<Value>,
    pub cursor: Cursor,
    /// `total` echoed by the server, when it sent one
    pub total: Option<u64>,
}

pub struct Paginator<'a> {
    transport: &'a dyn Transport,
    endpoint: &'a EndpointDescriptor,
    path: String,
    body: Option<Value>,
    cursor: Cursor,
    missing: MissingData,
    max_pages: u32,
    pages: u32,
    fetches: u32,
    finished: bool,
}

impl<'a> Paginator<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        endpoint: &'a EndpointDescriptor,
        path: impl Into<String>,
        page_size: u64,
    ) -> Self {
        Self {
            transport,
            endpoint,
            path: path.into(),
            body: None,
            cursor: Cursor::start(page_size),
            missing: MissingData::for_kind(endpoint.kind),
            max_pages: crate::config::DEFAULT_MAX_PAGES,
            pages: 0,
            fetches: 0,
            finished: false,
        }
    }

    /// JSON body sent with every page request (POST endpoints)
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_missing_data(mut self, missing: MissingData) -> Self {
        self.missing = missing;
        self
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Transport calls issued so far, cool-down retries included
    pub fn fetches(&self) -> u32 {
        self.fetches
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Fetch the next page, or `None` once the sequence is exhausted
    pub async fn next_page(&mut self) -> Result<Option<Page>> {
        if self.finished {
            return Ok(None);
        }

        if self.pages >= self.max_pages {
            warn!(
                endpoint = self.endpoint.id,
                path = %self.path,
                max_pages = self.max_pages,
                "Page limit reached, stopping pagination"
            );
            self.finished = true;
            return Ok(None);
        }

        let Some(response) = self.fetch().await? else {
            self.finished = true;
            return Ok(None);
        };
        self.pages += 1;

        let current = self.cursor;
        let records = self.endpoint.format_response(Some(&response));
        if records.is_empty() {
            self.finished = true;
            return Ok(None);
        }

        let echoed = response.get("pagination").and_then(Cursor::from_block);
        if self.endpoint.is_collection {
            let step = echoed
                .map(|c| c.limit)
                .filter(|limit| *limit > 0)
                .unwrap_or(current.limit);
            match current.offset.checked_add(step) {
                Some(offset) => {
                    self.cursor = Cursor {
                        offset,
                        limit: current.limit,
                        total: echoed.and_then(|c| c.total),
                    };
                },
                None => self.finished = true,
            }
        } else {
            match echoed {
                Some(block) if block.has_more() => {
                    self.cursor = Cursor {
                        offset: block.next_offset().unwrap_or(u64::MAX),
                        limit: current.limit,
                        total: block.total,
                    };
                },
                _ => self.finished = true,
            }
        }

        Ok(Some(Page {
            records,
            cursor: current,
            total: echoed.and_then(|c| c.total),
        }))
    }

    /// Drain every remaining page into one vector
    pub async fn collect_all(&mut self) -> Result<Vec<Value>> {
        let mut all = Vec::new();
        while let Some(page) = self.next_page().await? {
            all.extend(page.records);
        }
        Ok(all)
    }

    async fn fetch(&mut self) -> Result<Option<Value>> {
        let request = self.endpoint.request(
            &self.path,
            self.cursor.offset,
            self.cursor.limit,
            self.body.as_ref(),
        );

        let mut attempt = 0;
        loop {
            attempt += 1;
            self.fetches += 1;

            if let Some(response) = self.transport.call(&request).await? {
                return Ok(Some(response));
            }

            match self.missing {
                MissingData::EndOfStream => return Ok(None),
                MissingData::CoolDown { max_attempts, .. } if attempt >= max_attempts => {
                    error!(
                        endpoint = self.endpoint.id,
                        path = %self.path,
                        offset = self.cursor.offset,
                        attempts = attempt,
                        "No results after retrying, giving up"
                    );
                    return Err(TapError::QueryExhausted {
                        endpoint: self.endpoint.id.to_string(),
                        offset: self.cursor.offset,
                        attempts: attempt,
                    });
                },
                MissingData::CoolDown { interval, .. } => {
                    info!(
                        endpoint = self.endpoint.id,
                        offset = self.cursor.offset,
                        attempt,
                        "Unable to get results, sleeping for {}s then trying again",
                        interval.as_secs()
                    );
                    tokio::time::sleep(interval).await;
                },
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::api::endpoints::{company_query, find_endpoint};
    use crate::test_support::FakeTransport;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn query_page(offset: u64, size: usize) -> Value {
        let companies: Vec<_> = (0..size)
            .map(|i| json!({"companyId": format!("{}", offset as usize + i), "countryCode": "GB"}))
            .collect();
        json!({
            "companies": companies,
            "pagination": {"offset": offset, "limit": 50, "total": 123}
        })
    }

    #[test]
    fn test_cursor_from_block() {
        let cursor = Cursor::from_block(&json!({"offset": 50, "limit": "50", "total": 120.0})).unwrap();
        assert_eq!(cursor, Cursor { offset: 50, limit: 50, total: Some(120) });
        assert!(Cursor::from_block(&json!({"offset": 0})).is_none());
    }

    #[test]
    fn test_cursor_has_more() {
        assert!(Cursor { offset: 0, limit: 50, total: Some(120) }.has_more());
        assert!(Cursor { offset: 50, limit: 50, total: Some(120) }.has_more());
        assert!(!Cursor { offset: 100, limit: 50, total: Some(120) }.has_more());
        assert!(!Cursor { offset: 0, limit: 50, total: Some(50) }.has_more());
        assert!(!Cursor { offset: 0, limit: 0, total: None }.has_more());
    }

    #[test]
    fn test_cursor_overflow_ends_sequence() {
        let cursor = Cursor { offset: u64::MAX - 10, limit: 50, total: None };
        assert_eq!(cursor.next_offset(), None);
        assert!(!cursor.has_more());
        assert!(!Cursor { offset: u64::MAX, limit: 1, total: Some(u64::MAX) }.has_more());
    }

    #[tokio::test]
    async fn test_garbage_pagination_block_stops() {
        let transport = FakeTransport::new(|_| {
            Ok(Some(json!({
                "companyId": "1",
                "countryCode": "GB",
                "pagination": {"offset": u64::MAX, "limit": u64::MAX, "total": u64::MAX},
                "filings": []
            })))
        });

        let filings = find_endpoint("company_filings").unwrap();
        let mut paginator = Paginator::new(&transport, filings, "/company/gb/1/filings.json", 50);

        assert_eq!(paginator.collect_all().await.unwrap().len(), 1);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_collection_offset_overflow_stops() {
        let transport = FakeTransport::new(|_| {
            Ok(Some(json!({
                "companies": [{"companyId": "1", "countryCode": "GB"}],
                "pagination": {"offset": 0, "limit": u64::MAX, "total": 1}
            })))
        });

        let mut paginator = Paginator::new(&transport, company_query(), "/search/companies.json", 50);
        paginator.next_page().await.unwrap().unwrap();
        let step = paginator.cursor().offset;
        assert_eq!(step, u64::MAX);

        // the following page is fetched but the cursor cannot move past it
        assert!(paginator.next_page().await.unwrap().is_some());
        assert!(paginator.next_page().await.unwrap().is_none());
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn test_collection_stops_on_empty_page() {
        let sizes = [50usize, 50, 23, 0];
        let transport = FakeTransport::new(move |request| {
            let offset: u64 = request.query_param("offset").unwrap().parse().unwrap();
            let index = (offset / 50) as usize;
            Ok(Some(query_page(offset, sizes[index])))
        });

        let mut paginator = Paginator::new(&transport, company_query(), "/search/companies.json", 50)
            .with_body(json!({}));
        let records = paginator.collect_all().await.unwrap();

        assert_eq!(records.len(), 123);
        assert_eq!(paginator.fetches(), 4);
        assert_eq!(transport.call_count(), 4);

        let offsets: Vec<_> = transport
            .calls()
            .iter()
            .map(|r| r.query_param("offset").unwrap().to_string())
            .collect();
        assert_eq!(offsets, vec!["0", "50", "100", "150"]);
    }

    #[tokio::test]
    async fn test_collection_is_lazy() {
        let transport = FakeTransport::new(|request| {
            let offset: u64 = request.query_param("offset").unwrap().parse().unwrap();
            Ok(Some(query_page(offset, 50)))
        });

        let mut paginator = Paginator::new(&transport, company_query(), "/search/companies.json", 50);
        assert_eq!(transport.call_count(), 0);

        let page = paginator.next_page().await.unwrap().unwrap();
        assert_eq!(page.records.len(), 50);
        assert_eq!(page.cursor.offset, 0);
        assert_eq!(page.total, Some(123));
        assert_eq!(transport.call_count(), 1);
        assert_eq!(paginator.cursor().offset, 50);
    }

    #[tokio::test]
    async fn test_document_follows_embedded_pagination() {
        let transport = FakeTransport::new(|request| {
            let offset: u64 = request.query_param("offset").unwrap().parse().unwrap();
            Ok(Some(json!({
                "companyId": "1",
                "countryCode": "GB",
                "pagination": {"offset": offset, "limit": 50, "total": 120},
                "filings": [{"offset": offset}]
            })))
        });

        let filings = find_endpoint("company_filings").unwrap();
        let mut paginator = Paginator::new(&transport, filings, "/company/gb/1/filings.json", 50);
        let records = paginator.collect_all().await.unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[2]["filings"][0]["offset"], 100);
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test]
    async fn test_document_without_pagination_is_single_page() {
        let transport = FakeTransport::new(|_| Ok(Some(json!({"companyId": "1", "countryCode": "GB"}))));

        let vitals = find_endpoint("company_vitals").unwrap();
        let mut paginator = Paginator::new(&transport, vitals, "/company/gb/1.json", 50);

        assert_eq!(paginator.collect_all().await.unwrap().len(), 1);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_document_no_data_ends_sequence() {
        let transport = FakeTransport::new(|_| Ok(None));

        let charges = find_endpoint("company_charges").unwrap();
        let mut paginator = Paginator::new(&transport, charges, "/company/gb/1/charges.json", 50);

        assert!(paginator.next_page().await.unwrap().is_none());
        assert!(paginator.next_page().await.unwrap().is_none());
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_cool_down_then_success() {
        let calls = AtomicU32::new(0);
        let transport = FakeTransport::new(move |_| {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok((call >= 3).then(|| json!({"companies": []})))
        });

        let mut paginator = Paginator::new(&transport, company_query(), "/search/companies.json", 50);
        assert!(paginator.next_page().await.unwrap().is_none());
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_cool_down_exhausted() {
        let transport = FakeTransport::new(|_| Ok(None));

        let mut paginator = Paginator::new(&transport, company_query(), "/search/companies.json", 50);
        let err = paginator.next_page().await.unwrap_err();

        assert!(matches!(err, TapError::QueryExhausted { attempts: 3, offset: 0, .. }));
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test]
    async fn test_page_cap() {
        let transport = FakeTransport::new(|request| {
            let offset: u64 = request.query_param("offset").unwrap().parse().unwrap();
            Ok(Some(query_page(offset, 50)))
        });

        let mut paginator = Paginator::new(&transport, company_query(), "/search/companies.json", 50)
            .with_max_pages(5);
        let records = paginator.collect_all().await.unwrap();

        assert_eq!(records.len(), 250);
        assert_eq!(transport.call_count(), 5);
    }
}
