//! Threaded samplers.
//!
//! A [`Sampler`] drives one polling loop on its own thread: check that the
//! target is still alive, take one measurement through its [`Measure`],
//! append it to the record log, hand it to the subscribers, sleep, repeat.
//! The loop ends on its own once the target is gone. A
//! [`BenchError::ProcessNotFound`] raised mid-measurement is the normal way
//! for that to happen and is never reported as an error.
//!
//! [`BenchError::ProcessNotFound`]: crate::error::BenchError::ProcessNotFound

pub mod cpu;
pub mod memory;

pub use cpu::{CpuMeasure, CpuUsage};
pub use memory::{tree_memory, MemoryMeasure, MemoryUsage};

use crate::error::{BenchError, Result};
use crate::event::{Event, HandlerId};
use crate::process::{MonitoredProcess, ProcessHandle};
use crate::recording::{LogRecord, RecordLog};

use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub type CpuSampler<P = ProcessHandle> = Sampler<P, CpuMeasure>;
pub type MemorySampler<P = ProcessHandle> = Sampler<P, MemoryMeasure>;

/// One timestamped measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample<V> {
    /// Wall-clock seconds since the Unix epoch
    pub timestamp: f64,
    pub value: V,
}

impl<V> Sample<V> {
    pub fn new(timestamp: f64, value: V) -> Self {
        Self { timestamp, value }
    }

    /// Stamp `value` with the current wall-clock time
    pub fn now(value: V) -> Self {
        Self::new(unix_timestamp(), value)
    }
}

pub fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or(0.0)
}

/// Lifecycle of a sampler. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Running,
    Stopped,
}

/// Takes one measurement of one resource dimension
pub trait Measure<P: MonitoredProcess>: Send + 'static {
    type Value: LogRecord + Clone + Send + Sync + 'static;

    /// Short name used in log messages
    const NAME: &'static str;

    fn measure(&mut self, process: &P) -> Result<Self::Value>;
}

/// Everything the polling thread owns
struct Worker<P, M: Measure<P>>
where
    P: MonitoredProcess,
{
    target: P,
    measure: M,
    interval: Duration,
    on_sample: Event<Sample<M::Value>>,
    log: Option<RecordLog>,
}

impl<P: MonitoredProcess, M: Measure<P>> Worker<P, M> {
    fn run(mut self) -> Vec<Sample<M::Value>> {
        let pid = self.target.pid();
        let mut samples = Vec::new();
        debug!("{} sampler started for PID {}", M::NAME, pid);

        while self.target.is_running() {
            let value = match self.measure.measure(&self.target) {
                Ok(value) => value,
                Err(BenchError::ProcessNotFound(_)) => break,
                Err(err) => {
                    warn!("{} sampler for PID {} stopped: {}", M::NAME, pid, err);
                    break;
                }
            };

            let sample = Sample::now(value);
            self.record(&sample);
            self.on_sample.broadcast(&sample);
            samples.push(sample);

            thread::sleep(self.interval);
        }

        debug!(
            "{} sampler for PID {} stopped after {} samples",
            M::NAME,
            pid,
            samples.len()
        );
        samples
    }

    fn record(&mut self, sample: &Sample<M::Value>) {
        let Some(log) = self.log.as_mut() else {
            return;
        };
        if let Err(err) = log.append(sample) {
            warn!(
                "Disabling {} record log {}: {}",
                M::NAME,
                log.path().display(),
                err
            );
            self.log = None;
        }
    }
}

/// Periodically measures one resource of a target process on its own thread
pub struct Sampler<P, M>
where
    P: MonitoredProcess,
    M: Measure<P>,
{
    pid: u32,
    idle: Option<Worker<P, M>>,
    handle: Option<JoinHandle<Vec<Sample<M::Value>>>>,
    samples: Vec<Sample<M::Value>>,
}

impl<P: MonitoredProcess, M: Measure<P>> Sampler<P, M> {
    /// Create an idle sampler.
    ///
    /// When `record_file` is given the log is created (truncated) and its
    /// header written right away, before any sample is taken.
    pub fn new(
        target: P,
        measure: M,
        interval: Duration,
        record_file: Option<&Path>,
    ) -> Result<Self> {
        if interval.is_zero() {
            return Err(BenchError::InvalidConfiguration(
                "Sampling interval must be greater than zero".to_string(),
            ));
        }

        let log = record_file
            .map(RecordLog::create::<M::Value>)
            .transpose()?;

        Ok(Self {
            pid: target.pid(),
            idle: Some(Worker {
                target,
                measure,
                interval,
                on_sample: Event::new(),
                log,
            }),
            handle: None,
            samples: Vec::new(),
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Subscribe to every sample. Returns `None` once the sampler has
    /// started, since the handler list then belongs to the polling thread.
    pub fn on_sample<F>(&mut self, handler: F) -> Option<HandlerId>
    where
        F: Fn(&Sample<M::Value>) + Send + Sync + 'static,
    {
        match self.idle.as_mut() {
            Some(worker) => Some(worker.on_sample.add(handler)),
            None => {
                warn!(
                    "{} sampler for PID {} already started; handler ignored",
                    M::NAME,
                    self.pid
                );
                None
            }
        }
    }

    pub fn remove_handler(&mut self, id: HandlerId) -> bool {
        self.idle
            .as_mut()
            .map(|worker| worker.on_sample.remove(id))
            .unwrap_or(false)
    }

    /// Spawn the polling thread. Does nothing unless the sampler is idle.
    pub fn start(&mut self) {
        let Some(worker) = self.idle.take() else {
            return;
        };

        let spawned = thread::Builder::new()
            .name(format!("{}-sampler-{}", M::NAME, self.pid))
            .spawn(move || worker.run());

        match spawned {
            Ok(handle) => self.handle = Some(handle),
            Err(err) => error!(
                "Could not spawn {} sampler for PID {}: {}",
                M::NAME,
                self.pid,
                err
            ),
        }
    }

    /// Block until the polling loop has ended. Returns immediately if the
    /// sampler was never started or has already been waited for.
    pub fn wait(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        match handle.join() {
            Ok(samples) => self.samples = samples,
            Err(_) => error!(
                "{} sampler for PID {} panicked; its samples are lost",
                M::NAME,
                self.pid
            ),
        }
    }

    pub fn state(&self) -> MonitorState {
        if self.idle.is_some() {
            MonitorState::Idle
        } else if self
            .handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
        {
            MonitorState::Running
        } else {
            MonitorState::Stopped
        }
    }

    /// Samples collected by the loop, available after [`Sampler::wait`]
    pub fn samples(&self) -> &[Sample<M::Value>] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<Sample<M::Value>> {
        self.samples
    }
}
