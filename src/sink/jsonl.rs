//! JSON Lines summary log: one object per row, keys in column order.

use super::{RowSink, SinkError};
use crate::core::row::Row;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

pub struct JsonlSink {
    writer: BufWriter<File>,
}

impl JsonlSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl RowSink for JsonlSink {
    fn name(&self) -> &str {
        "jsonl"
    }

    fn write_row(&mut self, row: &Row) -> Result<(), SinkError> {
        serde_json::to_writer(&mut self.writer, row)
            .map_err(|e| SinkError::Serialize(e.to_string()))?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}
