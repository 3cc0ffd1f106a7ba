//! Sequential execution of a batch of experiments.

use crate::error::{BenchError, Result};
use crate::experiment::{Experiment, ExperimentResult};
use crate::interrupt::Interrupt;
use crate::logging::LogContext;

use serde::Serialize;

/// Tallies of one [`Runner::run`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    /// Set when the batch stopped early on an interrupt
    pub interrupted: bool,
    /// Results of the experiments that ran to completion, in batch order
    pub results: Vec<ExperimentResult>,
}

impl RunSummary {
    pub fn completed(&self) -> usize {
        self.successful + self.failed
    }
}

/// Runs experiments one after the other.
///
/// An experiment that cannot run (bad command, I/O error) is logged and
/// skipped without being counted. An interrupt stops the batch before the
/// next experiment starts; the experiment it cut short is not counted. A
/// failing success handler aborts the batch: the error is returned after the
/// summary has been logged.
pub struct Runner {
    experiments: Vec<Experiment>,
    interrupt: Interrupt,
    log: LogContext,
    total: usize,
    successful: usize,
    failed: usize,
}

impl Runner {
    pub fn new(log: LogContext) -> Self {
        Self {
            experiments: Vec::new(),
            interrupt: Interrupt::new(),
            log,
            total: 0,
            successful: 0,
            failed: 0,
        }
    }

    pub fn with_experiments(
        log: LogContext,
        experiments: impl IntoIterator<Item = Experiment>,
    ) -> Self {
        let mut runner = Self::new(log);
        runner.experiments.extend(experiments);
        runner
    }

    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn add_experiment(&mut self, experiment: Experiment) {
        self.experiments.push(experiment);
    }

    pub fn experiments(&self) -> &[Experiment] {
        &self.experiments
    }

    /// Handle on the flag checked between experiments
    pub fn interrupt(&self) -> Interrupt {
        self.interrupt.clone()
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn successful(&self) -> usize {
        self.successful
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn run(&mut self) -> Result<RunSummary> {
        self.total = self.experiments.len();
        self.successful = 0;
        self.failed = 0;

        let mut summary = RunSummary {
            total: self.total,
            ..RunSummary::default()
        };

        if self.total == 0 {
            self.log.warn(format_args!("No experiments to run."));
            return Ok(summary);
        }

        let total = self.total;
        self.log.info(format_args!(
            "Starting runner with {} experiments",
            total
        ));

        for (index, experiment) in self.experiments.iter().enumerate() {
            let position = index + 1;

            if self.interrupt.is_triggered() {
                self.log_interrupted(position);
                summary.interrupted = true;
                break;
            }

            self.log.info(format_args!(
                "[{} / {}] Running experiment \"{}\"...",
                position,
                total,
                experiment.name()
            ));

            let outcome = experiment.run();

            // Ctrl+C also reaches the child, so whatever it returned is not
            // a result of its own
            if self.interrupt.is_triggered() {
                self.log_interrupted(position);
                summary.interrupted = true;
                break;
            }

            match outcome {
                Ok(result) => {
                    if result.success {
                        self.successful += 1;
                        self.log
                            .info(format_args!("[{} / {}] Successful", position, total));
                    } else {
                        self.failed += 1;
                        self.log.info(format_args!(
                            "[{} / {}] Failed with return code {}",
                            position, total, result.return_code
                        ));
                    }
                    summary.results.push(result);
                }
                Err(err @ BenchError::SubscriberFailure { .. }) => {
                    self.log
                        .error(format_args!("[{} / {}] {}", position, total, err));
                    self.log
                        .error(format_args!("Aborting runner after a failed success handler"));
                    self.finish(&mut summary);
                    return Err(err);
                }
                Err(err) => {
                    self.log
                        .error(format_args!("[{} / {}] {}", position, total, err));
                }
            }
        }

        self.finish(&mut summary);
        Ok(summary)
    }

    fn log_interrupted(&self, position: usize) {
        self.log.info(format_args!(
            "[{} / {}] Interrupted after {} completed experiments",
            position,
            self.total,
            self.successful + self.failed
        ));
    }

    fn finish(&self, summary: &mut RunSummary) {
        summary.successful = self.successful;
        summary.failed = self.failed;
        self.log.info(format_args!(
            "Finished runner with {} experiments. Successful: {}, Failed: {}",
            self.total, self.successful, self.failed
        ));
    }
}

impl Default for Runner {
    fn default() -> Self {
        Self::new(LogContext::default().scoped("runner"))
    }
}
