//! CPU and memory sampling of one process, started and awaited together.

use crate::config::MonitorConfig;
use crate::constants::suffix;
use crate::error::Result;
use crate::process::{CpuTimes, MonitoredProcess, ProcessHandle};
use crate::sampler::{
    CpuSampler, CpuUsage, MemorySampler, MemoryUsage, MonitorState, Sample, Sampler,
};

use serde::{Deserialize, Serialize};

/// Summary of the series collected by a [`ResourceRecorder`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceStats {
    pub cpu_samples: usize,
    pub memory_samples: usize,
    pub peak_cpu_percent: f64,
    /// Mean over every sample but the first, which has no usage yet
    pub mean_cpu_percent: f64,
    /// Last CPU times observed before the process exited
    pub cpu_times: Option<CpuTimes>,
    pub peak_memory_mib: f64,
    pub mean_memory_mib: f64,
}

impl ResourceStats {
    pub fn from_samples(cpu: &[Sample<CpuUsage>], memory: &[Sample<MemoryUsage>]) -> Self {
        let usage: Vec<f64> = cpu.iter().skip(1).map(|s| s.value.percent).collect();
        let mebibytes: Vec<f64> = memory.iter().map(|s| s.value.mebibytes()).collect();

        Self {
            cpu_samples: cpu.len(),
            memory_samples: memory.len(),
            peak_cpu_percent: usage.iter().copied().fold(0.0, f64::max),
            mean_cpu_percent: mean(&usage),
            cpu_times: cpu.last().map(|s| s.value.times),
            peak_memory_mib: mebibytes.iter().copied().fold(0.0, f64::max),
            mean_memory_mib: mean(&mebibytes),
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// One CPU sampler and one memory sampler bound to the same target
pub struct ResourceRecorder<P: MonitoredProcess = ProcessHandle> {
    cpu: CpuSampler<P>,
    memory: MemorySampler<P>,
}

impl<P: MonitoredProcess> ResourceRecorder<P> {
    /// Build both samplers. With a record path `P` the logs are
    /// `P.cpu.report` and `P.memory.report`, created with their headers here.
    pub fn new(target: P, config: &MonitorConfig) -> Result<Self> {
        config.validate()?;

        let cpu_log = config.record_file(suffix::CPU_LOG);
        let memory_log = config.record_file(suffix::MEMORY_LOG);

        Ok(Self {
            cpu: Sampler::cpu(target.clone(), config.interval, cpu_log.as_deref())?,
            memory: Sampler::memory(
                target,
                config.interval,
                config.include_children,
                memory_log.as_deref(),
            )?,
        })
    }

    /// The CPU sampler, e.g. to subscribe before [`ResourceRecorder::start`]
    pub fn cpu(&mut self) -> &mut CpuSampler<P> {
        &mut self.cpu
    }

    pub fn memory(&mut self) -> &mut MemorySampler<P> {
        &mut self.memory
    }

    pub fn start(&mut self) {
        self.cpu.start();
        self.memory.start();
    }

    /// Block until both samplers have stopped, in whatever order they do
    pub fn wait(&mut self) -> ResourceStats {
        self.cpu.wait();
        self.memory.wait();
        self.stats()
    }

    pub fn stats(&self) -> ResourceStats {
        ResourceStats::from_samples(self.cpu.samples(), self.memory.samples())
    }

    /// `Running` while either sampler still runs
    pub fn state(&self) -> MonitorState {
        match (self.cpu.state(), self.memory.state()) {
            (MonitorState::Idle, MonitorState::Idle) => MonitorState::Idle,
            (MonitorState::Running, _) | (_, MonitorState::Running) => MonitorState::Running,
            _ => MonitorState::Stopped,
        }
    }

    pub fn cpu_samples(&self) -> &[Sample<CpuUsage>] {
        self.cpu.samples()
    }

    pub fn memory_samples(&self) -> &[Sample<MemoryUsage>] {
        self.memory.samples()
    }
}
