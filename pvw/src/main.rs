//! pvw - Purview bulk lineage loader
//!
//! CLI entry point for validating and loading lineage CSV files.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use pvw::bulk::{
    self, ConsoleProgress, NoProgress, ProcessOptions, ProgressSink, RetryPolicy, Row, RunOptions, RunReport,
    RunSummary, Template, ValidationResult,
};
use pvw::cli::{Cli, Command, OutputFormat};
use pvw::client::create_client;
use pvw::config::Config;

/// Failed rows listed in text output before the rest are elided
const MAX_LISTED_FAILURES: usize = 20;

fn parse_level(level_str: Option<&str>) -> tracing::Level {
    match level_str.map(|s| s.to_uppercase()) {
        Some(s) => match s.as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    }
}

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Priority: CLI --log-level > config file > default (INFO)
    let level = parse_level(cli_log_level.or(config_log_level));
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pvw")
        .join("logs");

    let log_file = fs::create_dir_all(&log_dir).and_then(|_| fs::File::create(log_dir.join("pvw.log")));
    match log_file {
        Ok(file) => {
            tracing_subscriber::fmt()
                .with_writer(file)
                .with_ansi(false)
                .with_env_filter(filter)
                .try_init()
                .map_err(|e| eyre::eyre!("Failed to install log subscriber: {}", e))?;
        }
        Err(e) => {
            eprintln!("Warning: cannot write log file in {}: {}; logging to stderr", log_dir.display(), e);
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(filter)
                .try_init()
                .map_err(|e| eyre::eyre!("Failed to install log subscriber: {}", e))?;
        }
    }

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    if let Err(e) = setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()) {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        return ExitCode::from(2);
    }

    match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            warn!(error = %format!("{:#}", e), "pvw exiting with hard error");
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::from(2)
        }
    }
}

async fn dispatch(cli: Cli) -> Result<ExitCode> {
    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Templates { format } => {
            debug!(?format, "main: matched Templates command");
            cmd_templates(format)
        }
        Command::Validate {
            file,
            template,
            format,
            error_csv,
        } => {
            debug!(file = %file.display(), %template, "main: matched Validate command");
            cmd_validate(&file, &template, format, error_csv.as_deref())
        }
        Command::Sample {
            file,
            num_samples,
            template,
        } => {
            debug!(file = %file.display(), num_samples, %template, "main: matched Sample command");
            cmd_sample(&file, &template, num_samples)
        }
        Command::Process {
            file,
            template,
            batch_size,
            concurrency,
            validate_entities,
            create_missing_entities,
            progress,
            error_csv,
            force,
            format,
        } => {
            debug!(file = %file.display(), %template, "main: matched Process command");
            let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
            let options = RunOptions {
                process: ProcessOptions {
                    batch_size: batch_size.unwrap_or(config.batch.batch_size),
                    concurrency: concurrency.unwrap_or(config.batch.concurrency),
                    validate_entities_exist: validate_entities,
                    create_missing_entities,
                },
                force,
            };
            cmd_process(&config, &file, &template, &options, progress, error_csv.as_deref(), format).await
        }
    }
}

/// List the built-in templates
fn cmd_templates(format: OutputFormat) -> Result<ExitCode> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(bulk::templates())?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            for template in bulk::templates() {
                println!("{} - {}", template.name.cyan().bold(), template.description);
                for field in template.fields {
                    let marker = if field.required { "*".red() } else { " ".normal() };
                    println!("  {}{}", marker, field.name);
                }
            }
            println!();
            println!("{} required", "*".red());
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Validate a file without contacting Purview
fn cmd_validate(file: &Path, template_name: &str, format: OutputFormat, error_csv: Option<&Path>) -> Result<ExitCode> {
    let template = bulk::get_template(template_name)?;
    let result = bulk::validate(file, template_name)?;

    if let Some(path) = error_csv {
        write_error_file(template, result.rejections(), path, format)?;
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&validation_json(&result))?),
        OutputFormat::Text => print_validation(&result),
    }

    Ok(if result.is_valid() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

/// Write a sample CSV for a template
fn cmd_sample(file: &Path, template: &str, num_samples: usize) -> Result<ExitCode> {
    let template = bulk::get_template(template)?;
    let written = bulk::write_sample(file, template, num_samples)
        .context(format!("Failed to write sample to {}", file.display()))?;
    println!(
        "{} Wrote {} sample rows for template '{}' to {}",
        "✓".green(),
        written,
        template.name,
        file.display()
    );
    Ok(ExitCode::SUCCESS)
}

/// Validate then load a file into Purview
async fn cmd_process(
    config: &Config,
    file: &Path,
    template_name: &str,
    options: &RunOptions,
    progress: bool,
    error_csv: Option<&Path>,
    format: OutputFormat,
) -> Result<ExitCode> {
    // Hard errors first: template and file before credentials
    let template = bulk::get_template(template_name)?;
    if !file.exists() {
        eyre::bail!("File not found: {}", file.display());
    }

    let client = create_client(&config.purview).context("Failed to create Purview client")?;
    let retry = RetryPolicy::from(&config.retry);
    let sink: Arc<dyn ProgressSink> = if progress {
        Arc::new(ConsoleProgress)
    } else {
        Arc::new(NoProgress)
    };

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling after in-flight rows");
            eprintln!("{} interrupt received, finishing in-flight rows", "!".yellow());
            ctrl_c.cancel();
        }
    });

    let report = bulk::run(file, template_name, options, client, retry, sink, cancel).await?;

    // Always written, so a clean run never leaves an older file behind
    if let Some(path) = error_csv {
        write_error_file(template, report.error_rows(), path, format)?;
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report_json(&report))?),
        OutputFormat::Text => print_report(&report),
    }

    Ok(if report.has_failures() {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    })
}

fn write_error_file<'a, I>(template: &Template, rows: I, path: &Path, format: OutputFormat) -> Result<()>
where
    I: IntoIterator<Item = (&'a Row, String)>,
{
    let written = bulk::write_error_rows(template, rows, path)
        .context(format!("Failed to write error CSV to {}", path.display()))?;
    info!(path = %path.display(), rows = written, "Error CSV written");
    if format == OutputFormat::Text {
        println!("{} Wrote {} rows to {}", "»".cyan(), written, path.display());
    }
    Ok(())
}

fn validation_json(result: &ValidationResult) -> serde_json::Value {
    serde_json::json!({
        "template": result.template,
        "valid": result.is_valid(),
        "total_rows": result.total_rows,
        "valid_rows": result.rows.len(),
        "invalid_rows": result.invalid_row_count(),
        "errors": result.errors,
    })
}

fn report_json(report: &RunReport) -> serde_json::Value {
    serde_json::json!({
        "validation": validation_json(&report.validation),
        "summary": report.summary,
    })
}

fn print_validation(result: &ValidationResult) {
    if result.is_valid() {
        println!(
            "{} {} rows valid for template '{}'",
            "✓".green(),
            result.total_rows,
            result.template
        );
        return;
    }

    println!(
        "{} {} of {} rows invalid for template '{}'",
        "✗".red(),
        result.invalid_row_count(),
        result.total_rows,
        result.template
    );
    for error in &result.errors {
        println!("  {}", error.to_string().red());
    }
}

fn print_report(report: &RunReport) {
    print_validation(&report.validation);
    match &report.summary {
        Some(summary) => print_summary(summary),
        None => println!("{} nothing processed; fix the rows above or use --force", "»".cyan()),
    }
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!(
        "Processed {} rows in {:.1}s: {} succeeded, {} failed, {} skipped",
        summary.total(),
        summary.elapsed.as_secs_f64(),
        summary.succeeded.to_string().green(),
        summary.failed.to_string().red(),
        summary.skipped.to_string().yellow()
    );

    for warning in &summary.warnings {
        println!("{} {}", "warning:".yellow().bold(), warning);
    }

    let failures: Vec<_> = summary.failures().collect();
    for outcome in failures.iter().take(MAX_LISTED_FAILURES) {
        println!(
            "  {} row {}: {}",
            "✗".red(),
            outcome.row,
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }
    if failures.len() > MAX_LISTED_FAILURES {
        println!("  ... and {} more", failures.len() - MAX_LISTED_FAILURES);
    }
}
