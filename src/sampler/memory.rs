//! Resident memory sampling over a whole process tree.

use super::{Measure, Sampler};
use crate::constants::BYTES_PER_MIB;
use crate::error::Result;
use crate::process::MonitoredProcess;

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub bytes: u64,
}

impl MemoryUsage {
    pub fn mebibytes(&self) -> f64 {
        self.bytes as f64 / BYTES_PER_MIB
    }
}

/// Resident memory of `root` plus, when `include_children` is set, of every
/// live descendant.
///
/// The tree is resolved again on every call. A descendant that exits while
/// the walk is in progress contributes 0; only the root vanishing is
/// reported, as `ProcessNotFound`.
pub fn tree_memory<P: MonitoredProcess>(root: &P, include_children: bool) -> Result<u64> {
    let mut total = root.memory_rss()?;
    if !include_children {
        return Ok(total);
    }

    for process in root.descendants()? {
        total += process.memory_rss().unwrap_or(0);
    }

    Ok(total)
}

#[derive(Debug, Clone, Copy)]
pub struct MemoryMeasure {
    include_children: bool,
}

impl MemoryMeasure {
    pub fn new(include_children: bool) -> Self {
        Self { include_children }
    }
}

impl Default for MemoryMeasure {
    fn default() -> Self {
        Self::new(true)
    }
}

impl<P: MonitoredProcess> Measure<P> for MemoryMeasure {
    type Value = MemoryUsage;

    const NAME: &'static str = "memory";

    fn measure(&mut self, process: &P) -> Result<MemoryUsage> {
        tree_memory(process, self.include_children).map(|bytes| MemoryUsage { bytes })
    }
}

impl<P: MonitoredProcess> Sampler<P, MemoryMeasure> {
    pub fn memory(
        target: P,
        interval: Duration,
        include_children: bool,
        record_file: Option<&Path>,
    ) -> Result<Self> {
        Sampler::new(
            target,
            MemoryMeasure::new(include_children),
            interval,
            record_file,
        )
    }
}
