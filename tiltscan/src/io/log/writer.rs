//! Buffered writer producing fixed-size record logs.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use super::types::FixedRecord;
use crate::error::{Error, Result};

/// Log writer for one record type.
///
/// # Example
///
/// ```ignore
/// use tiltscan::io::log::{LidarRecord, LogWriter};
///
/// let mut writer = LogWriter::<LidarRecord>::create("trimmed.log")?;
/// writer.write(&LidarRecord::new(1_000_000_000, 0.5, vec![1200; 181]))?;
/// let count = writer.finish()?;
/// ```
pub struct LogWriter<T> {
    writer: BufWriter<File>,
    path: PathBuf,
    buffer: Vec<u8>,
    records_written: u64,
    _record: PhantomData<T>,
}

impl<T: FixedRecord> LogWriter<T> {
    /// Create (or truncate) a log file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|e| Error::file_open(&path, e))?;
        Ok(Self {
            writer: BufWriter::new(file),
            path,
            buffer: Vec::with_capacity(T::SIZE),
            records_written: 0,
            _record: PhantomData,
        })
    }

    /// Append one record.
    pub fn write(&mut self, record: &T) -> Result<()> {
        self.buffer.clear();
        record.encode(&mut self.buffer);
        debug_assert_eq!(self.buffer.len(), T::SIZE);
        self.writer.write_all(&self.buffer)?;
        self.records_written += 1;
        Ok(())
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush and close, returning the number of records written.
    pub fn finish(mut self) -> Result<u64> {
        self.writer.flush()?;
        log::debug!("Wrote {} records to {}", self.records_written, self.path.display());
        Ok(self.records_written)
    }
}
