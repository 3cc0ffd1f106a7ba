//! Batch behaviour of the runner over real commands.

#![cfg(unix)]

use benchmon::{
    BenchError, BoxError, Experiment, Interrupt, LogContext, MemoryLog, MonitorConfig, Runner,
};
use log::Level;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn experiment(name: &str, command: &[&str]) -> Experiment {
    Experiment::new(
        name,
        command.iter().map(|arg| arg.to_string()).collect(),
        None,
    )
    .with_config(MonitorConfig::builder().interval_ms(20).build().unwrap())
}

fn runner(sink: &Arc<MemoryLog>) -> Runner {
    Runner::new(LogContext::with_sink("runner", sink.clone()))
}

#[test]
fn test_all_successful() {
    let sink = MemoryLog::new();
    let mut runner = runner(&sink);
    for index in 0..3 {
        runner.add_experiment(experiment(&format!("ok-{index}"), &["true"]));
    }

    let summary = runner.run().unwrap();

    assert_eq!(summary.total, 3);
    assert_eq!(summary.successful, 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(runner.successful(), 3);
    assert_eq!(runner.failed(), 0);
    assert_eq!(summary.results.len(), 3);
    assert!(sink.contains("Starting runner with 3 experiments"));
    assert!(sink.contains("[3 / 3] Successful"));
    assert!(sink.contains("Finished runner with 3 experiments. Successful: 3, Failed: 0"));
}

#[test]
fn test_failures_and_errors_do_not_abort_the_batch() {
    let sink = MemoryLog::new();
    let mut runner = runner(&sink);
    runner.add_experiment(experiment("first", &["true"]));
    runner.add_experiment(experiment("failing", &["false"]));
    runner.add_experiment(experiment("missing", &["/definitely/not/a/real/program"]));
    runner.add_experiment(experiment("last", &["true"]));

    let summary = runner.run().unwrap();

    assert_eq!(summary.total, 4);
    assert_eq!(summary.successful, 2);
    assert_eq!(summary.failed, 1);
    assert!(!summary.interrupted);
    assert!(sink.contains("[2 / 4] Failed with return code 1"));
    assert!(sink.contains("[4 / 4] Running experiment \"last\"..."));
    let errors = sink.messages(Level::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("[3 / 4]"));
}

#[test]
fn test_interrupt_stops_after_completed_experiments() {
    let sink = MemoryLog::new();
    let interrupt = Interrupt::new();
    let mut runner = runner(&sink).with_interrupt(interrupt.clone());
    let launched = Arc::new(AtomicUsize::new(0));

    for index in 1..=5 {
        let mut experiment = experiment(&format!("ex-{index}"), &["true"]);
        let launched = Arc::clone(&launched);
        let interrupt = interrupt.clone();
        experiment.add_success_handler(move |_| {
            // Ctrl+C arriving while the third experiment is still running
            if launched.fetch_add(1, Ordering::SeqCst) + 1 == 3 {
                interrupt.trigger();
            }
            Ok(())
        });
        runner.add_experiment(experiment);
    }

    let summary = runner.run().unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.successful + summary.failed, 2);
    assert_eq!(summary.completed(), 2);
    assert_eq!(summary.results.len(), 2);
    assert_eq!(launched.load(Ordering::SeqCst), 3);
    assert!(sink.contains("[3 / 5] Interrupted after 2 completed experiments"));
    assert!(!sink.contains("Running experiment \"ex-4\""));
    assert!(sink.contains("Finished runner with 5 experiments. Successful: 2, Failed: 0"));
}

#[test]
fn test_experiment_cut_short_by_interrupt_is_not_counted() {
    let sink = MemoryLog::new();
    let interrupt = Interrupt::new();
    let mut runner = runner(&sink).with_interrupt(interrupt.clone());
    // The terminal delivers SIGINT to the child as well
    runner.add_experiment(experiment("cut-short", &["sh", "-c", "sleep 0.4; kill -INT $$"]));
    runner.add_experiment(experiment("after", &["true"]));

    let trigger = interrupt.clone();
    let ctrl_c = thread::spawn(move || {
        thread::sleep(Duration::from_millis(200));
        trigger.trigger();
    });
    let summary = runner.run().unwrap();
    ctrl_c.join().unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.successful, 0);
    assert!(summary.results.is_empty());
    assert!(sink.contains("[1 / 2] Interrupted after 0 completed experiments"));
    assert!(!sink.contains("Running experiment \"after\""));
    assert!(sink.contains("Finished runner with 2 experiments. Successful: 0, Failed: 0"));
}

#[test]
fn test_failing_success_handler_aborts_the_batch() {
    let sink = MemoryLog::new();
    let mut runner = runner(&sink);
    let mut broken = experiment("broken", &["true"]);
    broken.add_success_handler(|_| Err::<(), BoxError>("evaluator crashed".into()));
    runner.add_experiment(experiment("before", &["true"]));
    runner.add_experiment(broken);
    runner.add_experiment(experiment("after", &["true"]));

    let err = runner.run().unwrap_err();

    assert!(matches!(err, BenchError::SubscriberFailure { .. }));
    assert_eq!(runner.successful(), 1);
    assert_eq!(runner.failed(), 0);
    assert!(!sink.contains("Running experiment \"after\""));
    assert!(sink.contains("Finished runner with 3 experiments. Successful: 1, Failed: 0"));
}

#[test]
fn test_empty_batch_returns_immediately() {
    let sink = MemoryLog::new();
    let mut runner = runner(&sink);

    let started = Instant::now();
    let summary = runner.run().unwrap();

    assert!(started.elapsed() < Duration::from_millis(100));
    assert_eq!(summary.total, 0);
    assert!(summary.results.is_empty());
    assert_eq!(sink.messages(Level::Warn), vec!["No experiments to run."]);
}

#[test]
fn test_counters_reset_between_runs() {
    let sink = MemoryLog::new();
    let mut runner = runner(&sink);
    runner.add_experiment(experiment("only", &["false"]));

    runner.run().unwrap();
    let summary = runner.run().unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(runner.failed(), 1);
    assert_eq!(runner.total(), 1);
}
