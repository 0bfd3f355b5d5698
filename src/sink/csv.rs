//! Append-only CSV summary log.

use super::{RowSink, SinkError};
use crate::core::row::Row;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Writes one line per row. The header is written only when the file is new
/// or empty, so restarts keep appending to the same log.
pub struct CsvSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl CsvSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let is_new = file.metadata()?.len() == 0;
        let mut writer = BufWriter::new(file);
        if is_new {
            writeln!(writer, "{}", Row::column_names().join(","))?;
            writer.flush()?;
        }

        Ok(Self { path, writer })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RowSink for CsvSink {
    fn name(&self) -> &str {
        "csv"
    }

    fn write_row(&mut self, row: &Row) -> Result<(), SinkError> {
        writeln!(self.writer, "{}", row.to_record().join(","))?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::row::COLUMN_COUNT;
    use chrono::Local;

    #[test]
    fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary_log.csv");

        let mut row = Row::empty(Local::now(), [0, 1, 0]);
        row.metrics.heart_rate = 68.5;

        {
            let mut sink = CsvSink::open(&path).unwrap();
            sink.write_row(&row).unwrap();
            sink.flush().unwrap();
        }
        {
            let mut sink = CsvSink::open(&path).unwrap();
            sink.write_row(&row).unwrap();
            sink.flush().unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("timestamp,toggle_0"));
        for line in &lines {
            assert_eq!(line.split(',').count(), COLUMN_COUNT);
        }
        assert!(lines[1].contains(",68.5,"));
    }
}
