mod cli;
mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use duplex_bus::{BatchReport, BatchRequest, BatchRunner, BusObserver, NoopObserver, RecordingObserver};
use duplex_core::BusConfig;

use crate::cli::{CliArgs, Command, RunArgs};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    let config = config::load(args.config.as_deref())?;

    match args.command {
        Command::Config => {
            let toml_str =
                toml::to_string_pretty(&config).context("failed to serialize config")?;
            print!("{toml_str}");
            Ok(())
        }
        Command::Run(run) => run_batch(config, &run),
    }
}

fn run_batch(config: BusConfig, args: &RunArgs) -> Result<()> {
    let config = config::apply_overrides(config, args)?;
    config.log_summary();

    let request = BatchRequest::new(args.priority_send, args.priority_receive, args.send, args.receive);
    request.validate(config.max_tasks)?;

    let recorder = Arc::new(RecordingObserver::new());
    let observer: Arc<dyn BusObserver> = if args.trace {
        recorder.clone()
    } else {
        Arc::new(NoopObserver)
    };
    let controller = duplex_bus::init_with_observer(&config, observer);
    let mut runner = BatchRunner::from_config(controller, &config);
    let report = runner.run_batch(request).context("batch failed")?;

    if args.json {
        let mut value = serde_json::to_value(&report).context("failed to serialize report")?;
        if args.trace {
            value["events"] = serde_json::to_value(recorder.events())?;
        }
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        print_summary(&report);
        if args.trace {
            for event in recorder.events() {
                println!("  {event:?}");
            }
        }
    }
    info!("done");
    Ok(())
}

fn print_summary(report: &BatchReport) {
    let m = &report.metrics;
    println!(
        "{} tasks ({} waited), total transfer {} units, elapsed {:?}",
        report.tasks.len(),
        report.waited(),
        report.total_duration,
        report.elapsed
    );
    println!(
        "  admitted: {} immediately, {} after waiting {:?}",
        m.admitted_immediately,
        m.admitted() - m.admitted_immediately,
        m.admitted_after_wait
    );
    println!(
        "  max occupied: {}, direction changes: {}, wake bursts: {} ({} woken)",
        m.max_occupied, m.direction_changes, m.wake_bursts, m.tasks_woken
    );
    println!("  final state: {:?}", report.final_state);
}
