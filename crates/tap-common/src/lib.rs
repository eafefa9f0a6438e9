//! tap-common
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared plumbing for Singer taps in this workspace.
//!
//! # Overview
//!
//! - **Error Handling**: `TapCommonError` and its `Result` alias
//! - **Logging**: `tracing` subscriber setup that keeps stdout free for the
//!   Singer message stream
//! - **Messages**: the Singer `SCHEMA` / `RECORD` / `STATE` wire format
//! - **Metrics**: the injectable timer/counter sink used by extractors
//!
//! # Example
//!
//! ```no_run
//! use tap_common::messages::{MessageWriter, RecordSink};
//! use serde_json::json;
//!
//! fn emit() -> tap_common::Result<()> {
//!     let mut writer = MessageWriter::stdout();
//!     writer.write_schema("companies", &json!({"type": "object"}), &["companyId"])?;
//!     writer.write_records("companies", &[json!({"companyId": "06999618"})])?;
//!     writer.write_state(&json!({"company_index": 0}))?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;
pub mod messages;
pub mod metrics;

// Re-export commonly used types
pub use error::{Result, TapCommonError};
pub use messages::{Message, MessageWriter, RecordSink};
pub use metrics::{LogMetrics, Metrics};
