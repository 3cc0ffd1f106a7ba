//! Injectable logging context.
//!
//! The experiment layer never logs through a module-level logger. `Runner`
//! and `Experiment` receive a [`LogContext`] at construction: a target name
//! plus a `log::Log` sink. The default sink forwards to whatever global
//! logger the binary installed, while [`MemoryLog`] keeps records around so
//! callers can inspect the progress of a batch.

use log::{Level, Log, Metadata, Record};
use std::fmt;
use std::sync::{Arc, Mutex};

/// Sink forwarding to the logger installed through the `log` facade
struct GlobalLog;

impl Log for GlobalLog {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level() && log::logger().enabled(metadata)
    }

    fn log(&self, record: &Record) {
        log::logger().log(record)
    }

    fn flush(&self) {
        log::logger().flush()
    }
}

#[derive(Clone)]
pub struct LogContext {
    target: Arc<str>,
    sink: Arc<dyn Log>,
}

impl LogContext {
    /// Context logging to the global logger under `target`
    pub fn new(target: impl Into<String>) -> Self {
        Self::with_sink(target, Arc::new(GlobalLog))
    }

    /// Context logging to an explicit sink
    pub fn with_sink(target: impl Into<String>, sink: Arc<dyn Log>) -> Self {
        Self {
            target: Arc::from(target.into()),
            sink,
        }
    }

    /// Same sink, nested target (`parent::name`)
    pub fn scoped(&self, name: &str) -> Self {
        Self {
            target: Arc::from(format!("{}::{}", self.target, name)),
            sink: Arc::clone(&self.sink),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        let metadata = Metadata::builder()
            .level(level)
            .target(&self.target)
            .build();
        if !self.sink.enabled(&metadata) {
            return;
        }

        self.sink.log(
            &Record::builder()
                .metadata(metadata)
                .args(args)
                .module_path(Some(module_path!()))
                .build(),
        );
    }

    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Error, args)
    }

    pub fn warn(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Warn, args)
    }

    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Info, args)
    }

    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, args)
    }
}

impl Default for LogContext {
    fn default() -> Self {
        Self::new(env!("CARGO_PKG_NAME"))
    }
}

impl fmt::Debug for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogContext")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

/// A single record kept by [`MemoryLog`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub level: Level,
    pub target: String,
    pub message: String,
}

/// Sink that keeps every record in memory
#[derive(Debug, Default)]
pub struct MemoryLog {
    lines: Mutex<Vec<LogLine>>,
}

impl MemoryLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn lines(&self) -> Vec<LogLine> {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Messages logged at exactly `level`
    pub fn messages(&self, level: Level) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|line| line.level == level)
            .map(|line| line.message)
            .collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.message.contains(needle))
    }
}

impl Log for MemoryLog {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(LogLine {
                level: record.level(),
                target: record.target().to_string(),
                message: record.args().to_string(),
            });
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_log_captures_records() {
        let sink = MemoryLog::new();
        let context = LogContext::with_sink("bench", sink.clone());

        context.info(format_args!("[{} / {}] Running", 1, 2));
        context.warn(format_args!("No experiments to run."));

        let lines = sink.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].level, Level::Info);
        assert_eq!(lines[0].message, "[1 / 2] Running");
        assert_eq!(lines[1].target, "bench");
        assert_eq!(sink.messages(Level::Warn), vec!["No experiments to run."]);
    }

    #[test]
    fn test_scoped_context_shares_sink() {
        let sink = MemoryLog::new();
        let runner = LogContext::with_sink("bench", sink.clone());
        let experiment = runner.scoped("experiment");

        experiment.debug(format_args!("launched"));

        assert_eq!(experiment.target(), "bench::experiment");
        assert_eq!(sink.lines()[0].target, "bench::experiment");
    }
}
