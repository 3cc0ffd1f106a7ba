//! A single benchmark run: launch a command, record it, report the outcome.

use crate::config::MonitorConfig;
use crate::constants::suffix;
use crate::error::{BenchError, BoxError, Result};
use crate::event::{Event, HandlerId};
use crate::logging::LogContext;
use crate::process::ProcessHandle;
use crate::recorder::{ResourceRecorder, ResourceStats};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Instant;

/// Post-run hook invoked with every experiment that exits successfully,
/// e.g. to compute quality metrics from the recorded logs
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, experiment: &Experiment) -> std::result::Result<(), BoxError>;
}

type SuccessEvent = Event<Experiment, std::result::Result<(), BoxError>>;

/// Outcome of one [`Experiment::run`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResult {
    pub name: String,
    pub return_code: i32,
    pub success: bool,
    pub duration_secs: f64,
    pub stats: ResourceStats,
    #[serde(skip)]
    pub stdout: Vec<u8>,
    #[serde(skip)]
    pub stderr: Vec<u8>,
}

impl ExperimentResult {
    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }
}

pub struct Experiment {
    name: String,
    command: Vec<String>,
    config: MonitorConfig,
    on_success: SuccessEvent,
    log: LogContext,
}

impl Experiment {
    /// `record_path`, when given, is the prefix of the CPU, memory and
    /// result files written for this experiment
    pub fn new(
        name: impl Into<String>,
        command: Vec<String>,
        record_path: Option<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            command,
            config: MonitorConfig::default().with_record_path(record_path),
            on_success: Event::new(),
            log: LogContext::default().scoped("experiment"),
        }
    }

    /// Replace the monitor settings, keeping the record path if the new
    /// settings have none
    pub fn with_config(mut self, config: MonitorConfig) -> Self {
        let record_path = config
            .record_path
            .clone()
            .or_else(|| self.config.record_path.take());
        self.config = config.with_record_path(record_path);
        self
    }

    pub fn with_log_context(mut self, log: LogContext) -> Self {
        self.log = log;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    pub fn record_path(&self) -> Option<&Path> {
        self.config.record_path.as_deref()
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Derived record file, e.g. `record_file(".cpu.report")`
    pub fn record_file(&self, suffix: &str) -> Option<PathBuf> {
        self.config.record_file(suffix)
    }

    pub fn add_success_handler<F>(&mut self, handler: F) -> HandlerId
    where
        F: Fn(&Experiment) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    {
        self.on_success.add(handler)
    }

    pub fn remove_success_handler(&mut self, id: HandlerId) -> bool {
        self.on_success.remove(id)
    }

    pub fn add_evaluator(&mut self, evaluator: Arc<dyn Evaluator>) -> HandlerId {
        self.add_success_handler(move |experiment| evaluator.evaluate(experiment))
    }

    /// Run the command to completion while recording its resource usage.
    ///
    /// A non-zero exit is reported through [`ExperimentResult::success`].
    /// Errors are reserved for commands that cannot be launched, I/O
    /// failures while setting up the recording, and failing success
    /// handlers. Every call launches a new process.
    pub fn run(&self) -> Result<ExperimentResult> {
        let (program, args) = self.command.split_first().ok_or_else(|| {
            BenchError::InvalidCommand(format!(
                "Experiment \"{}\" has an empty command",
                self.name
            ))
        })?;

        let started = Instant::now();
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| BenchError::Spawn {
                command: self.command.join(" "),
                source,
            })?;
        let pid = child.id();
        self.log.debug(format_args!(
            "Launched \"{}\" as PID {}",
            self.name, pid
        ));

        let mut recorder = match ResourceRecorder::new(ProcessHandle::new(pid), &self.config) {
            Ok(recorder) => recorder,
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(err);
            }
        };
        recorder.start();

        // Drains both pipes while waiting, so a chatty child cannot block
        let output = child.wait_with_output()?;
        let return_code = exit_code(&output.status);
        let stats = recorder.wait();

        let result = ExperimentResult {
            name: self.name.clone(),
            return_code,
            success: return_code == 0,
            duration_secs: started.elapsed().as_secs_f64(),
            stats,
            stdout: output.stdout,
            stderr: output.stderr,
        };
        self.log.debug(format_args!(
            "\"{}\" exited with {} after {:.2}s ({} cpu / {} memory samples)",
            self.name,
            return_code,
            result.duration_secs,
            result.stats.cpu_samples,
            result.stats.memory_samples
        ));

        if let Some(path) = self.record_file(suffix::RESULT) {
            if let Err(err) = result.save(&path) {
                self.log.warn(format_args!(
                    "Could not write result file {}: {}",
                    path.display(),
                    err
                ));
            }
        }

        if result.success {
            self.on_success
                .try_broadcast(self)
                .map_err(|source| BenchError::SubscriberFailure {
                    experiment: self.name.clone(),
                    source,
                })?;
        }

        Ok(result)
    }
}

impl fmt::Debug for Experiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Experiment")
            .field("name", &self.name)
            .field("command", &self.command)
            .field("config", &self.config)
            .field("success_handlers", &self.on_success.len())
            .finish()
    }
}

/// Return code of a finished child; `128 + signal` when it was killed
fn exit_code(status: &ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    -1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(args: &[&str]) -> Vec<String> {
        args.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn test_empty_command_is_rejected() {
        let experiment = Experiment::new("empty", Vec::new(), None);
        assert!(matches!(
            experiment.run(),
            Err(BenchError::InvalidCommand(_))
        ));
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let experiment = Experiment::new(
            "missing",
            command(&["/definitely/not/a/real/program"]),
            None,
        );
        assert!(matches!(experiment.run(), Err(BenchError::Spawn { .. })));
    }

    #[test]
    fn test_with_config_keeps_record_path() {
        let experiment = Experiment::new("ex", command(&["true"]), Some("out/ex".into()))
            .with_config(MonitorConfig::builder().interval_ms(20).build().unwrap());

        assert_eq!(experiment.record_path(), Some(Path::new("out/ex")));
        assert_eq!(experiment.config().interval.as_millis(), 20);
        assert_eq!(
            experiment.record_file(".cpu.report"),
            Some(PathBuf::from("out/ex.cpu.report"))
        );
    }

    #[test]
    fn test_remove_success_handler() {
        let mut experiment = Experiment::new("ex", command(&["true"]), None);
        let id = experiment.add_success_handler(|_| Ok(()));

        assert!(experiment.remove_success_handler(id));
        assert!(!experiment.remove_success_handler(id));
    }

    #[cfg(unix)]
    #[test]
    fn test_signal_exit_code() {
        let status = Command::new("sh")
            .args(["-c", "kill -9 $$"])
            .status()
            .unwrap();
        assert_eq!(exit_code(&status), 137);
    }

    #[test]
    fn test_result_file_roundtrip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("ex.result.json");
        let result = ExperimentResult {
            name: "ex".to_string(),
            return_code: 1,
            success: false,
            duration_secs: 0.5,
            stats: ResourceStats::default(),
            stdout: b"ignored".to_vec(),
            stderr: Vec::new(),
        };

        result.save(&path)?;
        let loaded = ExperimentResult::load(&path)?;

        assert_eq!(loaded.name, "ex");
        assert_eq!(loaded.return_code, 1);
        assert!(!loaded.success);
        assert!(loaded.stdout.is_empty());
        Ok(())
    }
}
