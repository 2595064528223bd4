mod browser;
mod cli;
mod config;
mod logging;
mod progress;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use engine_logging::{engine_error, engine_info, engine_warn};
use harvest_core::SessionOutcome;
use harvest_engine::{
    default_output_filename, EngineConfig, ExportFormat, ExtractorOptions, Orchestrator,
    SearchRequest, SessionReport,
};
use tokio_util::sync::CancellationToken;

use crate::browser::ChromiumDriver;
use crate::cli::Cli;
use crate::config::ConfigFile;
use crate::progress::LogProgress;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::initialize(cli.verbose, cli.log_file.as_deref());

    let config = engine_config(&cli)?;
    let request = search_request(&cli);
    engine_info!(
        "Searching {} for {:?}, exporting {} to {:?}",
        request.workspace_url,
        request.query,
        request.format,
        request.output
    );

    let driver = ChromiumDriver::launch(cli.headless)
        .await
        .context("could not start the browser")?;

    let cancel = CancellationToken::new();
    spawn_interrupt_listener(cancel.clone());

    let report = Orchestrator::new(driver, config, cancel)
        .with_progress(Arc::new(LogProgress))
        .run(&request)
        .await
        .context("could not create the export file")?;

    print_status(&report, &request);
    Ok(())
}

fn engine_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    let mut config = EngineConfig::default();
    if let Some(path) = &cli.config {
        ConfigFile::load(path)?.apply(&mut config);
    }
    config.search.sort = cli.sort.map(Into::into);
    config.extractor = ExtractorOptions {
        verbose: cli.verbose,
    };
    Ok(config)
}

fn search_request(cli: &Cli) -> SearchRequest {
    let format = ExportFormat::from(cli.format);
    let output = cli.output.clone().unwrap_or_else(|| {
        PathBuf::from(default_output_filename(format, &chrono::Local::now()))
    });
    SearchRequest {
        query: cli.query.clone(),
        workspace_url: cli.workspace.clone(),
        auth_file: cli.auth_file.clone(),
        output,
        format,
    }
}

/// First Ctrl-C cancels the session; the export is closed before exit.
fn spawn_interrupt_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                engine_warn!("Interrupted; finishing the export file");
                cancel.cancel();
            }
            Err(err) => engine_error!("Could not listen for Ctrl-C: {}", err),
        }
    });
}

fn print_status(report: &SessionReport, request: &SearchRequest) {
    let written = report.messages_written();
    let pages = report.summary.pages_harvested;
    match report.outcome {
        SessionOutcome::Completed => println!(
            "Done: {written} messages from {pages} page(s) written to {}",
            request.output.display()
        ),
        SessionOutcome::Aborted(reason) => println!(
            "Stopped early ({reason:?}): {written} messages from {pages} page(s) written to {}",
            request.output.display()
        ),
    }
    if let Some(total) = report.total_results {
        println!("The search reported {total} results.");
    }
    if report.export.is_none() {
        println!("Warning: the export file may not have been closed cleanly.");
    }
}
