use benchmon::{
    BatchConfig, Experiment, Interrupt, LogContext, MonitorConfig, RunSummary, Runner,
};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::process::ExitCode;
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// Run benchmark commands and record their CPU and memory usage
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Print the batch summary as JSON
    #[clap(short, long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run every experiment of a JSON batch file
    Batch {
        /// Batch file
        #[clap(required = true)]
        file: PathBuf,
    },

    /// Run and record a single command
    Run {
        /// Experiment name used in logs
        #[clap(short, long, default_value = "experiment")]
        name: String,

        /// Record path prefix for the .cpu.report, .memory.report and .result.json files
        #[clap(short, long, value_name = "PREFIX")]
        record: Option<PathBuf>,

        /// Sampling interval in milliseconds
        #[clap(short, long, default_value = "100")]
        interval: u64,

        /// Only measure the memory of the command itself
        #[clap(long)]
        exclude_children: bool,

        /// Command to run
        #[clap(required = true, last = true)]
        command: Vec<String>,
    },
}

#[derive(Tabled)]
struct ResultRow {
    #[tabled(rename = "Experiment")]
    name: String,
    #[tabled(rename = "Code")]
    code: i32,
    #[tabled(rename = "Time (s)")]
    duration: String,
    #[tabled(rename = "Mean CPU")]
    mean_cpu: String,
    #[tabled(rename = "Peak CPU")]
    peak_cpu: String,
    #[tabled(rename = "Peak memory (MiB)")]
    peak_memory: String,
    #[tabled(rename = "Samples")]
    samples: usize,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match run(&args) {
        Ok(summary) => {
            print_summary(&summary, args.json);
            if summary.failed == 0 && summary.completed() == summary.total {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            eprintln!("{} {}", "Error:".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> benchmon::Result<RunSummary> {
    let log = LogContext::default();
    let experiments = match &args.command {
        Commands::Batch { file } => {
            let batch = BatchConfig::from_file(file)?;
            batch
                .experiments
                .iter()
                .map(|spec| {
                    Experiment::new(spec.name.clone(), spec.command.clone(), None)
                        .with_config(batch.monitor_config(spec))
                        .with_log_context(log.scoped("experiment"))
                })
                .collect::<Vec<_>>()
        }
        Commands::Run {
            name,
            record,
            interval,
            exclude_children,
            command,
        } => {
            let mut builder = MonitorConfig::builder()
                .interval_ms(*interval)
                .include_children(!exclude_children);
            if let Some(record) = record {
                builder = builder.record_path(record);
            }
            vec![Experiment::new(name.clone(), command.clone(), None)
                .with_config(builder.build()?)
                .with_log_context(log.scoped("experiment"))]
        }
    };

    let interrupt = Interrupt::install_ctrlc()?;
    let mut runner =
        Runner::with_experiments(log.scoped("runner"), experiments).with_interrupt(interrupt);
    runner.run()
}

fn print_summary(summary: &RunSummary, json: bool) {
    if json {
        match serde_json::to_string_pretty(summary) {
            Ok(json) => println!("{json}"),
            Err(err) => eprintln!("Error serializing summary: {err}"),
        }
        return;
    }

    if !summary.results.is_empty() {
        let rows: Vec<ResultRow> = summary
            .results
            .iter()
            .map(|result| ResultRow {
                name: result.name.clone(),
                code: result.return_code,
                duration: format!("{:.2}", result.duration_secs),
                mean_cpu: format!("{:.2}", result.stats.mean_cpu_percent),
                peak_cpu: format!("{:.2}", result.stats.peak_cpu_percent),
                peak_memory: format!("{:.1}", result.stats.peak_memory_mib),
                samples: result.stats.cpu_samples,
            })
            .collect();
        println!("{}", Table::new(rows).with(Style::rounded()));
    }

    let mut line = format!(
        "{} successful, {} failed, {} total",
        summary.successful.to_string().green(),
        summary.failed.to_string().red(),
        summary.total
    );
    if summary.interrupted {
        line.push_str(&format!(" ({})", "interrupted".yellow()));
    }
    println!("{line}");
}
