//! Sequential and random-access reading of fixed-size record logs.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::marker::PhantomData;
use std::path::Path;

use super::types::FixedRecord;
use crate::error::{Error, Result};

/// First and last record timestamps of a log, in seconds since epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    #[inline]
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    #[inline]
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t <= self.end
    }
}

/// Streaming reader of fixed-size records.
///
/// # Example
///
/// ```ignore
/// use tiltscan::io::log::{LidarRecord, RecordReader};
///
/// let mut reader = RecordReader::<_, LidarRecord>::open("lidar.log")?;
/// while let Some(rec) = reader.read_record()? {
///     println!("{} {}", rec.timestamp_ns, rec.tilt);
/// }
/// ```
pub struct RecordReader<R, T> {
    reader: R,
    buffer: Vec<u8>,
    records_read: u64,
    _record: PhantomData<T>,
}

impl<T: FixedRecord> RecordReader<BufReader<File>, T> {
    /// Open a log file for sequential reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::file_open(path, e))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read, T: FixedRecord> RecordReader<R, T> {
    /// Wrap a byte source positioned at a record boundary.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: vec![0; T::SIZE],
            records_read: 0,
            _record: PhantomData,
        }
    }

    /// Read the next record.
    ///
    /// Returns `Ok(None)` at a clean end of stream and
    /// `Err(IncompleteRecord)` when the stream ends mid-record.
    pub fn read_record(&mut self) -> Result<Option<T>> {
        let filled = fill(&mut self.reader, &mut self.buffer)?;
        if filled == 0 {
            return Ok(None);
        }
        if filled < T::SIZE {
            return Err(Error::IncompleteRecord {
                expected: T::SIZE,
                actual: filled,
            });
        }
        self.records_read += 1;
        Ok(Some(T::decode(&self.buffer)))
    }

    /// Number of complete records decoded so far.
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// Read until `buf` is full or the stream ends; returns bytes read.
fn fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

/// Byte offset of the last complete record of a log of `file_size` bytes.
///
/// # Example
/// ```
/// use tiltscan::io::log::last_record_offset;
///
/// assert_eq!(last_record_offset(392 * 10, 392), Some(392 * 9));
/// assert_eq!(last_record_offset(392 * 10 + 17, 392), Some(392 * 9));
/// assert_eq!(last_record_offset(100, 392), None);
/// ```
pub fn last_record_offset(file_size: u64, record_len: usize) -> Option<u64> {
    let record_len = record_len as u64;
    match file_size / record_len {
        0 => None,
        n => Some((n - 1) * record_len),
    }
}

/// Decode the record at `index` of a seekable source.
pub fn read_record_at<S: Read + Seek, T: FixedRecord>(source: &mut S, index: u64) -> Result<Option<T>> {
    source.seek(SeekFrom::Start(index * T::SIZE as u64))?;
    RecordReader::<_, T>::new(source).read_record()
}

/// Timestamps of the first and last complete record of a log.
///
/// Reads only those two records. A log holding a single record has
/// `start == end`; a log without a complete record yields `None`.
pub fn log_time_range<T: FixedRecord>(path: impl AsRef<Path>) -> Result<Option<TimeRange>> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|e| Error::file_open(path, e))?;
    let size = file.metadata()?.len();

    let Some(last_offset) = last_record_offset(size, T::SIZE) else {
        return Ok(None);
    };
    let Some(first) = RecordReader::<_, T>::new(&mut file).read_record()? else {
        return Ok(None);
    };
    let start = first.timestamp();

    let end = if last_offset > 0 {
        let last: Option<T> = read_record_at(&mut file, last_offset / T::SIZE as u64)?;
        last.map_or(start, |r| r.timestamp())
    } else {
        start
    };

    log::debug!(
        "{}: {} records, {:.3}s .. {:.3}s",
        path.display(),
        size / T::SIZE as u64,
        start,
        end
    );
    Ok(Some(TimeRange { start, end }))
}
