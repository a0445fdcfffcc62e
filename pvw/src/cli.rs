//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// pvw - bulk lineage loader for Microsoft Purview
#[derive(Debug, Parser)]
#[command(
    name = "pvw",
    about = "Validate and bulk-load lineage CSV files into Microsoft Purview",
    version,
    after_help = "Logs are written to: ~/.local/share/pvw/logs/pvw.log\n\nExit codes: 0 all rows succeeded, 1 some rows failed, 2 hard error"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(short, long, global = true, help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the built-in templates and their columns
    Templates {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Validate a CSV file against a template without contacting Purview
    Validate {
        /// CSV file to validate
        file: PathBuf,

        /// Template name
        #[arg(short, long, default_value = "basic")]
        template: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Write rejected rows with their errors to this CSV for correction
        #[arg(long, value_name = "PATH")]
        error_csv: Option<PathBuf>,
    },

    /// Write a sample CSV for a template
    Sample {
        /// Output file
        file: PathBuf,

        /// Number of data rows
        #[arg(short, long, default_value = "10")]
        num_samples: usize,

        /// Template name
        #[arg(short, long, default_value = "basic")]
        template: String,
    },

    /// Validate a CSV file and write its rows to Purview
    Process {
        /// CSV file to load
        file: PathBuf,

        /// Template name
        #[arg(short, long, default_value = "basic")]
        template: String,

        /// Rows per batch (default from config)
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Rows in flight per batch (default from config)
        #[arg(long)]
        concurrency: Option<usize>,

        /// Check that referenced entities exist before writing
        #[arg(long)]
        validate_entities: bool,

        /// Create placeholder entities for missing references
        #[arg(long, requires = "validate_entities")]
        create_missing_entities: bool,

        /// Print progress to stderr
        #[arg(long)]
        progress: bool,

        /// Write rejected and failed rows to this CSV for resubmission
        #[arg(long, value_name = "PATH")]
        error_csv: Option<PathBuf>,

        /// Process valid rows even when some rows fail validation
        #[arg(long)]
        force: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Output format for command results
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_templates() {
        let cli = Cli::parse_from(["pvw", "templates"]);
        assert!(matches!(
            cli.command,
            Command::Templates {
                format: OutputFormat::Text
            }
        ));
    }

    #[test]
    fn test_cli_parse_validate() {
        let cli = Cli::parse_from(["pvw", "validate", "lineage.csv", "-t", "etl", "--format", "json"]);
        if let Command::Validate {
            file,
            template,
            format,
            error_csv,
        } = cli.command
        {
            assert_eq!(file, PathBuf::from("lineage.csv"));
            assert_eq!(template, "etl");
            assert_eq!(format, OutputFormat::Json);
            assert_eq!(error_csv, None);
        } else {
            panic!("Expected Validate command");
        }
    }

    #[test]
    fn test_cli_parse_validate_error_csv() {
        let cli = Cli::parse_from(["pvw", "validate", "lineage.csv", "--error-csv", "rejected.csv"]);
        if let Command::Validate { error_csv, .. } = cli.command {
            assert_eq!(error_csv, Some(PathBuf::from("rejected.csv")));
        } else {
            panic!("Expected Validate command");
        }
    }

    #[test]
    fn test_cli_parse_sample_defaults() {
        let cli = Cli::parse_from(["pvw", "sample", "out.csv"]);
        if let Command::Sample {
            num_samples, template, ..
        } = cli.command
        {
            assert_eq!(num_samples, 10);
            assert_eq!(template, "basic");
        } else {
            panic!("Expected Sample command");
        }
    }

    #[test]
    fn test_cli_parse_process() {
        let cli = Cli::parse_from([
            "pvw",
            "process",
            "lineage.csv",
            "-b",
            "25",
            "--concurrency",
            "8",
            "--validate-entities",
            "--create-missing-entities",
            "--error-csv",
            "failed.csv",
            "--force",
        ]);
        if let Command::Process {
            batch_size,
            concurrency,
            validate_entities,
            create_missing_entities,
            error_csv,
            force,
            progress,
            ..
        } = cli.command
        {
            assert_eq!(batch_size, Some(25));
            assert_eq!(concurrency, Some(8));
            assert!(validate_entities);
            assert!(create_missing_entities);
            assert_eq!(error_csv, Some(PathBuf::from("failed.csv")));
            assert!(force);
            assert!(!progress);
        } else {
            panic!("Expected Process command");
        }
    }

    #[test]
    fn test_create_missing_requires_validate_entities() {
        let result = Cli::try_parse_from(["pvw", "process", "lineage.csv", "--create-missing-entities"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_output_format_from_str() {
        assert!(matches!("text".parse::<OutputFormat>(), Ok(OutputFormat::Text)));
        assert!(matches!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json)));
        assert!("table".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_cli_global_options() {
        let cli = Cli::parse_from(["pvw", "-c", "/path/to/pvw.yml", "-l", "debug", "templates"]);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/pvw.yml")));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }
}
