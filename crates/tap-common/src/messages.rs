//! Singer message protocol
//!
//! A tap communicates exclusively through newline-delimited JSON messages on
//! stdout. Three kinds are emitted here:
//!
//! - `SCHEMA`: describes the records that follow for one stream
//! - `RECORD`: a single extracted row
//! - `STATE`: an opaque checkpoint document the runner hands back on resume
//!
//! Each message is flushed as soon as it is written so that a `STATE` line is
//! on disk (or in the pipe) before the tap moves on to the next unit of work.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{self, Write};

/// One line of the Singer output stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum Message {
    Schema {
        stream: String,
        schema: Value,
        key_properties: Vec<String>,
    },
    Record {
        stream: String,
        record: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time_extracted: Option<DateTime<Utc>>,
    },
    State {
        value: Value,
    },
}

impl Message {
    /// Stream name for schema and record messages
    pub fn stream(&self) -> Option<&str> {
        match self {
            Message::Schema { stream, .. } | Message::Record { stream, .. } => Some(stream),
            Message::State { .. } => None,
        }
    }
}

/// Destination for Singer messages
pub trait RecordSink {
    fn write_message(&mut self, message: &Message) -> Result<()>;

    fn write_schema(&mut self, stream: &str, schema: &Value, key_properties: &[&str]) -> Result<()> {
        self.write_message(&Message::Schema {
            stream: stream.to_string(),
            schema: schema.clone(),
            key_properties: key_properties.iter().map(|k| k.to_string()).collect(),
        })
    }

    /// Write every record with a shared extraction timestamp
    fn write_records(&mut self, stream: &str, records: &[Value]) -> Result<()> {
        let time_extracted = Utc::now();
        for record in records {
            self.write_message(&Message::Record {
                stream: stream.to_string(),
                record: record.clone(),
                time_extracted: Some(time_extracted),
            })?;
        }
        Ok(())
    }

    fn write_state(&mut self, value: &Value) -> Result<()> {
        self.write_message(&Message::State {
            value: value.clone(),
        })
    }
}

/// Writes messages as JSON lines to any `Write`
pub struct MessageWriter<W: Write> {
    out: W,
}

impl MessageWriter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> MessageWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> RecordSink for MessageWriter<W> {
    fn write_message(&mut self, message: &Message) -> Result<()> {
        serde_json::to_writer(&mut self.out, message)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}

/// Collects messages in memory
impl RecordSink for Vec<Message> {
    fn write_message(&mut self, message: &Message) -> Result<()> {
        self.push(message.clone());
        Ok(())
    }
}
