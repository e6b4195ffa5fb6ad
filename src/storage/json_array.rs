//! Streaming JSON array files
//!
//! Each export job can mirror its event bodies to `<dir>/<job>.json`: one JSON
//! array, elements in fetch order, written incrementally so the whole export
//! never sits in memory.

use eyre::{Context, Result};
use serde_json::Value;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Write a JSON array one element at a time
pub struct JsonArrayWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    count: usize,
}

impl JsonArrayWriter {
    /// Create (or truncate) the file and open the array
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let file = File::create(&path)
            .with_context(|| format!("Failed to create JSON file: {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        writer.write_all(b"[")?;

        Ok(Self {
            path,
            writer,
            count: 0,
        })
    }

    /// Path of the job file inside `dir`
    pub fn job_path(dir: impl AsRef<Path>, job: &str) -> PathBuf {
        dir.as_ref().join(format!("{}.json", job))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Append one element
    pub fn append(&mut self, item: &Value) -> Result<()> {
        if self.count > 0 {
            self.writer.write_all(b",\n")?;
        }
        serde_json::to_writer(&mut self.writer, item)
            .with_context(|| format!("Failed to write to {}", self.path.display()))?;
        self.count += 1;
        Ok(())
    }

    /// Close the array and flush; returns the number of elements written
    pub fn finish(mut self) -> Result<usize> {
        self.writer.write_all(b"]\n")?;
        self.writer
            .flush()
            .with_context(|| format!("Failed to flush {}", self.path.display()))?;
        Ok(self.count)
    }
}
