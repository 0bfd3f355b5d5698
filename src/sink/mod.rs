//! Row sinks.
//!
//! The scheduler never writes to disk itself: rows go through a bounded
//! channel to a dedicated writer thread ([`SinkWorker`]) that fans them out
//! to every configured [`RowSink`].

pub mod csv;
pub mod jsonl;
pub mod worker;

pub use csv::CsvSink;
pub use jsonl::JsonlSink;
pub use worker::{RowSender, SinkWorker};

use crate::core::row::Row;
use std::sync::{Arc, Mutex, PoisonError};

/// Destination for summary rows.
pub trait RowSink: Send {
    /// Short name used in log messages.
    fn name(&self) -> &str;

    fn write_row(&mut self, row: &Row) -> Result<(), SinkError>;

    fn flush(&mut self) -> Result<(), SinkError>;
}

/// Sink errors.
#[derive(Debug)]
pub enum SinkError {
    Io(std::io::Error),
    Serialize(String),
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkError::Io(e) => write!(f, "IO error: {e}"),
            SinkError::Serialize(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for SinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SinkError::Io(e) => Some(e),
            SinkError::Serialize(_) => None,
        }
    }
}

impl From<std::io::Error> for SinkError {
    fn from(e: std::io::Error) -> Self {
        SinkError::Io(e)
    }
}

/// Keeps rows in memory. Clones share the same buffer, so a test can hand
/// one clone to the worker and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    rows: Arc<Mutex<Vec<Row>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> Vec<Row> {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RowSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn write_row(&mut self, row: &Row) -> Result<(), SinkError> {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(row.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}
