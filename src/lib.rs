//! Run benchmark commands as subprocesses and record how much CPU and memory
//! they (and their descendants) use.
//!
//! The crate has two layers:
//!
//! - the monitoring engine: [`ProcessHandle`], threaded [`Sampler`]s for CPU
//!   and memory, and the [`ResourceRecorder`] combining both;
//! - the orchestration layer: an [`Experiment`] launches one command under a
//!   recorder, and a [`Runner`] executes a batch of experiments in order.

pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod experiment;
pub mod interrupt;
pub mod logging;
pub mod process;
pub mod recorder;
pub mod recording;
pub mod runner;
pub mod sampler;

pub use config::{BatchConfig, ExperimentSpec, MonitorConfig};
pub use error::{BenchError, BoxError, Result};
pub use event::{Event, HandlerId};
pub use experiment::{Evaluator, Experiment, ExperimentResult};
pub use interrupt::Interrupt;
pub use logging::{LogContext, MemoryLog};
pub use process::{CpuTimes, MonitoredProcess, ProcessHandle};
pub use recorder::{ResourceRecorder, ResourceStats};
pub use runner::{RunSummary, Runner};
pub use sampler::{
    CpuSampler, CpuUsage, MemorySampler, MemoryUsage, MonitorState, Sample, Sampler,
};
