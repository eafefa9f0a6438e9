//! Endpoint registry
//!
//! Every syncable DueDil resource is described by one immutable
//! `EndpointDescriptor`. Behaviour that differs between resources (HTTP
//! method, paging parameters, what a missing response means) is selected by
//! `EndpointKind` rather than by separate types.

use crate::api::client::{ApiRequest, Method};
use crate::company_cache::CompanyRef;
use crate::error::{Result, TapError};
use serde_json::Value;

/// Primary key shared by every DueDil stream
pub const COMPANY_PK: &[&str] = &["companyId", "countryCode"];

/// Stream id of the company search
pub const COMPANY_QUERY: &str = "company_query";

/// Post-processing applied to the records extracted from one response
pub type RecordFormatter = fn(Vec<Value>) -> Vec<Value>;

fn identity(records: Vec<Value>) -> Vec<Value> {
    records
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    /// Paged POST search returning a `companies` collection
    CompanyQuery,
    /// Per-company GET returning one document
    CompanyInfo,
    /// Per-company GET that also filters on appointment status
    CompanyOfficers,
}

#[derive(Debug, Clone)]
pub struct EndpointDescriptor {
    pub id: &'static str,
    pub primary_key_fields: &'static [&'static str],
    /// Path with `:company_id` and `:country_code` placeholders
    pub path_template: &'static str,
    pub kind: EndpointKind,
    /// Whether a response holds many records (vs. one document)
    pub is_collection: bool,
    /// Envelope field holding the record array, for collections
    pub collection_key: Option<&'static str>,
    pub record_formatter: RecordFormatter,
}

impl EndpointDescriptor {
    const fn company_info(id: &'static str, path_template: &'static str) -> Self {
        Self {
            id,
            primary_key_fields: COMPANY_PK,
            path_template,
            kind: EndpointKind::CompanyInfo,
            is_collection: false,
            collection_key: None,
            record_formatter: identity,
        }
    }

    const fn company_officers(id: &'static str, path_template: &'static str) -> Self {
        Self {
            kind: EndpointKind::CompanyOfficers,
            ..Self::company_info(id, path_template)
        }
    }

    const fn company_query(id: &'static str, path_template: &'static str) -> Self {
        Self {
            id,
            primary_key_fields: COMPANY_PK,
            path_template,
            kind: EndpointKind::CompanyQuery,
            is_collection: true,
            collection_key: Some("companies"),
            record_formatter: identity,
        }
    }

    pub fn method(&self) -> Method {
        match self.kind {
            EndpointKind::CompanyQuery => Method::Post,
            EndpointKind::CompanyInfo | EndpointKind::CompanyOfficers => Method::Get,
        }
    }

    /// Whether this endpoint is fetched once per company
    pub fn is_per_company(&self) -> bool {
        self.kind != EndpointKind::CompanyQuery
    }

    /// Fill the path template for one company; country codes are lower-cased
    pub fn path_for(&self, company: &CompanyRef) -> String {
        self.path_template
            .replace(":company_id", &company.company_id)
            .replace(":country_code", &company.country_code.to_lowercase())
    }

    /// Query parameters for the page starting at `offset`
    pub fn page_params(&self, offset: u64, limit: u64) -> Vec<(String, String)> {
        let mut params = vec![
            ("offset".to_string(), offset.to_string()),
            ("limit".to_string(), limit.to_string()),
        ];
        if self.kind == EndpointKind::CompanyOfficers {
            params.push((
                "appointmentStatuses".to_string(),
                "open,closed,retired".to_string(),
            ));
        }
        params
    }

    /// Build the request for one page
    pub fn request(&self, path: &str, offset: u64, limit: u64, body: Option<&Value>) -> ApiRequest {
        let query = self.page_params(offset, limit);
        let request = match self.method() {
            Method::Post => {
                let body = body.cloned().unwrap_or_else(|| Value::Object(Default::default()));
                ApiRequest::post(self.id, path, body)
            },
            Method::Get => ApiRequest::get(self.id, path),
        };
        request.with_query(query)
    }

    /// Extract records from a response envelope
    pub fn format_response(&self, response: Option<&Value>) -> Vec<Value> {
        let records = match response {
            None | Some(Value::Null) => Vec::new(),
            Some(response) if self.is_collection => {
                let items = match self.collection_key {
                    Some(key) => response.get(key),
                    None => Some(response),
                };
                match items {
                    Some(Value::Array(items)) => items.clone(),
                    _ => Vec::new(),
                }
            },
            Some(Value::Object(doc)) if doc.is_empty() => Vec::new(),
            Some(doc) => vec![doc.clone()],
        };
        (self.record_formatter)(records)
    }
}

static ENDPOINTS: &[EndpointDescriptor] = &[
    EndpointDescriptor::company_query(COMPANY_QUERY, "/search/companies.json"),
    EndpointDescriptor::company_info("company_vitals", "/company/:country_code/:company_id.json"),
    EndpointDescriptor::company_info("company_industries", "/company/:country_code/:company_id/industries.json"),
    EndpointDescriptor::company_info("company_addresses", "/company/:country_code/:company_id/addresses.json"),
    EndpointDescriptor::company_info("company_descriptions", "/company/:country_code/:company_id/descriptions.json"),
    EndpointDescriptor::company_info("company_keywords", "/company/:country_code/:company_id/keywords.json"),
    EndpointDescriptor::company_info("company_telephone_numbers", "/company/:country_code/:company_id/telephone-numbers.json"),
    EndpointDescriptor::company_info("company_websites", "/company/:country_code/:company_id/websites.json"),
    EndpointDescriptor::company_info("company_related_names", "/company/:country_code/:company_id/related-names.json"),
    EndpointDescriptor::company_officers("company_officers", "/company/:country_code/:company_id/officers.json"),
    EndpointDescriptor::company_info("company_social_media_profiles", "/company/:country_code/:company_id/social-media-profiles.json"),
    EndpointDescriptor::company_info("company_shareholders", "/company/:country_code/:company_id/shareholders.json"),
    EndpointDescriptor::company_info("company_group_parents", "/company/:country_code/:company_id/group-parents.json"),
    EndpointDescriptor::company_info("company_group_subsidiaries", "/company/:country_code/:company_id/group-subsidiaries.json"),
    EndpointDescriptor::company_info("company_portfolio_companies", "/company/:country_code/:company_id/portfolio-companies.json"),
    EndpointDescriptor::company_info("company_gazette_notices", "/company/:country_code/:company_id/gazette-notices.json"),
    EndpointDescriptor::company_info("company_related_companies", "/company/:country_code/:company_id/related-companies.json"),
    EndpointDescriptor::company_info("company_fca_authorisations", "/company/:country_code/:company_id/fca-authorisations.json"),
    EndpointDescriptor::company_info("company_filings", "/company/:country_code/:company_id/filings.json"),
    EndpointDescriptor::company_info("company_charges", "/company/:country_code/:company_id/charges.json"),
    EndpointDescriptor::company_info("company_persons_of_significant_control", "/company/:country_code/:company_id/persons-significant-control.json"),
    EndpointDescriptor::company_info("company_financials", "/company/:country_code/:company_id/financials.json"),
];

/// Every endpoint, in declaration order
pub fn all_endpoints() -> &'static [EndpointDescriptor] {
    ENDPOINTS
}

pub fn find_endpoint(id: &str) -> Option<&'static EndpointDescriptor> {
    ENDPOINTS.iter().find(|e| e.id == id)
}

/// The company search descriptor
pub fn company_query() -> &'static EndpointDescriptor {
    &ENDPOINTS[0]
}

/// Ids synced when `--streams` is not given: everything but the search
pub fn default_sync_stream_ids() -> Vec<&'static str> {
    ENDPOINTS
        .iter()
        .filter(|e| e.is_per_company())
        .map(|e| e.id)
        .collect()
}

/// Resolve stream names to descriptors, keeping registry order
pub fn select_endpoints<S: AsRef<str>>(names: &[S]) -> Result<Vec<&'static EndpointDescriptor>> {
    for name in names {
        if find_endpoint(name.as_ref()).is_none() {
            return Err(TapError::UnknownStream(name.as_ref().to_string()));
        }
    }

    Ok(ENDPOINTS
        .iter()
        .filter(|e| names.iter().any(|n| n.as_ref() == e.id))
        .collect())
}
