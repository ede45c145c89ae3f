//! Append-only record of everything the peer received.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use mivr_core::MetricRecord;

/// Default results file, appended to across runs.
pub const DEFAULT_RESULTS_PATH: &str = "LearningResults.csv";

/// One CSV row per received [`MetricRecord`], fields in wire order, no header.
pub struct ResultsLog {
    writer: BufWriter<File>,
    path: PathBuf,
    rows: u64,
}

impl ResultsLog {
    /// Open `path` for appending, creating it if needed.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path,
            rows: 0,
        })
    }

    pub fn append(&mut self, record: &MetricRecord) -> std::io::Result<()> {
        let [reserved, x, y, z, mi] = record.as_array();
        writeln!(self.writer, "{reserved:?},{x:?},{y:?},{z:?},{mi:?}")?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows appended by this handle.
    pub fn rows(&self) -> u64 {
        self.rows
    }
}
