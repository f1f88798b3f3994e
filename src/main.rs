// src/main.rs

use clap::Parser;
use confluence2md::{
    failure_reason, AppError, CommandLineInput, ConfluenceHttpClient, HttpIncludeSource,
    PageExporter, PageOutcome, PipelineConfig,
};
use log::LevelFilter;
use log4rs::{
    append::console::ConsoleAppender,
    append::file::FileAppender,
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
    filter::threshold::ThresholdFilter,
    Config,
};
use std::fs;
use std::process::ExitCode;
use std::sync::Arc;

/// Sets up logging configuration.
fn setup_logging(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let log_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };

    let log_file_path = std::env::temp_dir().join("confluence2md.log");
    if let Some(parent) = log_file_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let pattern = if verbose {
        "{d(%Y-%m-%d %H:%M:%S)} [{l}] - {m}{n}"
    } else {
        "{m}{n}"
    };

    let stderr_appender = ConsoleAppender::builder()
        .target(log4rs::append::console::Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(pattern)))
        .build();

    let file_appender = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(
            "{d(%Y-%m-%d %H:%M:%S)} [{l}] - {m}{n}",
        )))
        .build(&log_file_path)?;

    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr_appender)))
        .appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(LevelFilter::Debug)))
                .build("file", Box::new(file_appender)),
        )
        .build(
            Root::builder()
                .appender("stderr")
                .appender("file")
                .build(log_level),
        )?;

    log4rs::init_config(config)?;
    log::info!("Logging initialized. Log file: {}", log_file_path.display());
    Ok(())
}

/// Builds the exporter from resolved configuration and runs one batch.
async fn execute_export(config: &PipelineConfig) -> Result<Vec<PageOutcome>, AppError> {
    let client = ConfluenceHttpClient::new(config.settings.base_url.clone(), &config.credentials)?;
    let includes = HttpIncludeSource::new()?;
    let exporter = PageExporter::new(
        Arc::new(client),
        Arc::new(includes),
        config.settings.clone(),
    );
    Ok(exporter.export_batch(&config.pages).await)
}

/// Prints one line per page and returns how many failed.
fn report_outcomes(outcomes: &[PageOutcome]) -> usize {
    let mut failures = 0;
    for outcome in outcomes {
        match outcome {
            PageOutcome::Written {
                page_id,
                title,
                directory,
                summary,
            } => {
                let mut line = format!("✓ {} '{}' → {}", page_id, title, directory.display());
                if summary.degraded + summary.failed > 0 {
                    line.push_str(&format!(
                        " ({} degraded, {} failed resources)",
                        summary.degraded, summary.failed
                    ));
                }
                println!("{}", line);
            }
            PageOutcome::Failed { reference, error } => {
                failures += 1;
                eprintln!("✗ {}: {} ({})", reference, error, failure_reason(error));
            }
        }
    }
    failures
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = CommandLineInput::parse();

    setup_logging(cli.verbose)?;

    let config = PipelineConfig::resolve(cli)?;

    let outcomes = execute_export(&config).await?;
    let failures = report_outcomes(&outcomes);

    if failures > 0 {
        eprintln!("{} of {} pages failed", failures, outcomes.len());
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
