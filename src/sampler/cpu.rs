//! CPU time sampling.

use super::{Measure, Sampler};
use crate::error::Result;
use crate::process::{CpuTimes, MonitoredProcess};

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, Instant};

/// Cumulative CPU times plus the usage derived from the previous sample
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuUsage {
    pub times: CpuTimes,
    /// CPU seconds per wall-clock second since the previous sample
    /// (1.0 = one fully busy core). Always 0 for the first sample.
    pub percent: f64,
}

#[derive(Debug, Default)]
pub struct CpuMeasure {
    previous: Option<(f64, Instant)>,
}

impl CpuMeasure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a new reading into the measure, deriving usage from the last one
    pub fn observe(&mut self, times: CpuTimes, at: Instant) -> CpuUsage {
        let busy = times.busy();
        let percent = match self.previous {
            Some((previous_busy, previous_at)) => {
                let wall = at.saturating_duration_since(previous_at).as_secs_f64();
                if wall > 0.0 {
                    ((busy - previous_busy) / wall).max(0.0)
                } else {
                    0.0
                }
            }
            None => 0.0,
        };
        self.previous = Some((busy, at));

        CpuUsage { times, percent }
    }
}

impl<P: MonitoredProcess> Measure<P> for CpuMeasure {
    type Value = CpuUsage;

    const NAME: &'static str = "cpu";

    fn measure(&mut self, process: &P) -> Result<CpuUsage> {
        let times = process.cpu_times()?;
        Ok(self.observe(times, Instant::now()))
    }
}

impl<P: MonitoredProcess> Sampler<P, CpuMeasure> {
    pub fn cpu(target: P, interval: Duration, record_file: Option<&Path>) -> Result<Self> {
        Sampler::new(target, CpuMeasure::new(), interval, record_file)
    }
}
