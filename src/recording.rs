//! Append-only CSV logs of sampled values.
//!
//! Every log starts with a header row. Each row is the sample timestamp
//! followed by the value's own columns:
//!
//! ```text
//! timestamp,percent,user,system,children_user,children_system
//! timestamp,usage
//! ```
//!
//! Memory usage is written in mebibytes.

use crate::constants::{columns, BYTES_PER_MIB};
use crate::error::{BenchError, Result};
use crate::process::CpuTimes;
use crate::sampler::{CpuUsage, MemoryUsage, Sample};

use csv::{ReaderBuilder, Trim, Writer, WriterBuilder};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// A value that can be written as (and read back from) one log row
pub trait LogRecord: Sized {
    /// Header, timestamp column included
    const COLUMNS: &'static [&'static str];

    /// Columns after the timestamp
    fn fields(&self) -> Vec<String>;

    fn from_fields(fields: &[&str]) -> Option<Self>;
}

impl LogRecord for CpuUsage {
    const COLUMNS: &'static [&'static str] = &columns::CPU;

    fn fields(&self) -> Vec<String> {
        vec![
            self.percent.to_string(),
            self.times.user.to_string(),
            self.times.system.to_string(),
            self.times.children_user.to_string(),
            self.times.children_system.to_string(),
        ]
    }

    fn from_fields(fields: &[&str]) -> Option<Self> {
        let [percent, user, system, children_user, children_system] = fields else {
            return None;
        };
        Some(CpuUsage {
            percent: percent.parse().ok()?,
            times: CpuTimes {
                user: user.parse().ok()?,
                system: system.parse().ok()?,
                children_user: children_user.parse().ok()?,
                children_system: children_system.parse().ok()?,
            },
        })
    }
}

impl LogRecord for MemoryUsage {
    const COLUMNS: &'static [&'static str] = &columns::MEMORY;

    fn fields(&self) -> Vec<String> {
        vec![self.mebibytes().to_string()]
    }

    fn from_fields(fields: &[&str]) -> Option<Self> {
        let [usage] = fields else {
            return None;
        };
        let mebibytes: f64 = usage.parse().ok()?;
        if !mebibytes.is_finite() || mebibytes < 0.0 {
            return None;
        }
        Some(MemoryUsage {
            bytes: (mebibytes * BYTES_PER_MIB).round() as u64,
        })
    }
}

/// Open log file owned by a single sampler
#[derive(Debug)]
pub struct RecordLog {
    path: PathBuf,
    writer: Writer<File>,
}

impl RecordLog {
    /// Create (or truncate) the log and write its header
    pub fn create<R: LogRecord>(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        writer.write_record(R::COLUMNS)?;
        writer.flush()?;

        Ok(Self {
            path: path.to_path_buf(),
            writer,
        })
    }

    /// Append one row, flushed right away so readers can follow along
    pub fn append<R: LogRecord>(&mut self, sample: &Sample<R>) -> Result<()> {
        let row = std::iter::once(sample.timestamp.to_string()).chain(sample.value.fields());
        self.writer.write_record(row)?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parse a log written by [`RecordLog`]
pub fn read_log<R: LogRecord>(path: &Path) -> Result<Vec<Sample<R>>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(File::open(path)?);

    let headers = reader.headers()?;
    if !headers.iter().eq(R::COLUMNS.iter().copied()) {
        return Err(BenchError::MalformedRecord {
            line: 1,
            reason: format!(
                "unexpected header `{}`",
                headers.iter().collect::<Vec<_>>().join(",")
            ),
        });
    }

    let mut samples = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map_or(0, |position| position.line() as usize);
        let fields: Vec<&str> = record.iter().collect();
        let malformed = || BenchError::MalformedRecord {
            line,
            reason: format!(
                "expected {} columns in `{}`",
                R::COLUMNS.len(),
                fields.join(",")
            ),
        };

        let (timestamp, rest) = fields.split_first().ok_or_else(malformed)?;
        let timestamp: f64 = timestamp.parse().map_err(|_| malformed())?;
        let value = R::from_fields(rest).ok_or_else(malformed)?;

        samples.push(Sample::new(timestamp, value));
    }

    Ok(samples)
}

pub fn read_cpu_log(path: &Path) -> Result<Vec<Sample<CpuUsage>>> {
    read_log(path)
}

pub fn read_memory_log(path: &Path) -> Result<Vec<Sample<MemoryUsage>>> {
    read_log(path)
}
