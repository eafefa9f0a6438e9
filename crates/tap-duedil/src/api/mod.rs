//! DueDil API access
//!
//! - `client`: HTTP transport with auth headers and bounded retry
//! - `retry`: status classification and backoff policy
//! - `endpoints`: the registry of syncable resources

pub mod client;
pub mod endpoints;
pub mod retry;

pub use client::{ApiRequest, HttpTransport, Method, Transport};
pub use endpoints::{EndpointDescriptor, EndpointKind};
pub use retry::RetryPolicy;
