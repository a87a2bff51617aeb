//! tenant-walker - Directory membership crawler
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tenant_walker::config::{CliArgs, WalkConfig};
use tenant_walker::directory::GraphClient;
use tenant_walker::progress::{print_header, print_summary, ProgressReporter};
use tenant_walker::sink::CsvSink;
use tenant_walker::walker::{WalkOutcome, WaveCoordinator};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Exit code after a forced second Ctrl+C, as a shell reports SIGINT
const FORCED_EXIT_CODE: i32 = 130;

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Setup logging
    setup_logging(args.verbose)?;

    // Validate and create config
    let config = WalkConfig::from_args(args).context("Invalid configuration")?;

    if config.show_progress {
        print_header(
            &config.tenant,
            config.seeds.len(),
            config.worker_count,
            &config.output_dir.display().to_string(),
        );
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create async runtime")?;

    runtime.block_on(run_walk(config))
}

async fn run_walk(config: WalkConfig) -> Result<ExitCode> {
    let sink = Arc::new(
        CsvSink::create(&config.output_dir, &config.tenant)
            .context("Failed to create output files")?,
    );
    let client = Arc::new(
        GraphClient::new(config.graph.clone()).context("Failed to initialize directory client")?,
    );

    let coordinator = WaveCoordinator::new(client, sink.clone(), config.walk_options());

    // First Ctrl+C stops launching new expansions, second one exits immediately
    let shutdown_flag = coordinator.shutdown_flag();
    let interrupted = AtomicBool::new(false);
    ctrlc::set_handler(move || {
        if interrupted.swap(true, Ordering::SeqCst) {
            eprintln!("\nSecond interrupt, exiting now");
            std::process::exit(FORCED_EXIT_CODE);
        }
        eprintln!("\nInterrupt received, finishing in-flight queries (Ctrl+C again to force)...");
        shutdown_flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    // Create progress reporter
    let progress = if config.show_progress {
        Some(ProgressReporter::new())
    } else {
        None
    };

    let ticker = progress.clone().map(|reporter| {
        let handle = coordinator.progress_handle();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(250));
            loop {
                interval.tick().await;
                reporter.update(&handle.snapshot());
            }
        })
    });

    if let Some(ref p) = progress {
        p.set_status("Resolving seed accounts...");
    }

    // Run the walk
    let result = coordinator.run(&config.seeds).await;

    if let Some(ticker) = ticker {
        ticker.abort();
    }

    let result = result.context("Walk failed")?;

    // Finish progress
    if let Some(ref p) = progress {
        match result.outcome {
            WalkOutcome::Completed => p.finish("Walk completed"),
            WalkOutcome::Interrupted => p.finish("Walk interrupted"),
            WalkOutcome::NoSeedsResolved => p.finish_and_clear(),
        }
    }

    print_summary(&result, sink.stats(), &config.output_dir);

    if result.stats.errors > 0 {
        info!(errors = result.stats.errors, "Walk completed with errors");
    }

    Ok(match result.outcome {
        WalkOutcome::Completed => ExitCode::SUCCESS,
        WalkOutcome::NoSeedsResolved => {
            eprintln!("No users found to start the analysis");
            ExitCode::FAILURE
        }
        WalkOutcome::Interrupted => ExitCode::from(FORCED_EXIT_CODE as u8),
    })
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("tenant_walker=debug,warn")
    } else {
        EnvFilter::new("tenant_walker=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}
