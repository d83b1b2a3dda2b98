//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// hazard-report - geologic hazard report data for an area of interest
///
/// Intersects an area of interest with every configured hazard map
/// layer, gathers the related report text, and writes a Markdown or
/// JSON report.
///
/// Examples:
///   hazard-report --aoi parcel.json
///   hazard-report --aoi parcel.json --format json --output parcel.json.out
///   hazard-report --aoi parcel.json --max-attempts 5 --retry-delay-ms 500
///   hazard-report --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Area of interest JSON file
    ///
    /// Must contain a `description` and an Esri `polygon` with
    /// `rings` and `spatialReference`.
    #[arg(short, long, value_name = "FILE", required_unless_present = "init_config")]
    pub aoi: Option<PathBuf>,

    /// Output file path for the report
    ///
    /// Defaults to the configured output (hazard_report.md).
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Path to configuration file
    ///
    /// If not specified, looks for .hazard-report.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Hide the query progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Feature service base URL for hazard layers
    #[arg(long, value_name = "URL", env = "HAZARD_REPORT_BASE_URL")]
    pub base_url: Option<String>,

    /// Attempts per request before giving up
    #[arg(long, value_name = "COUNT")]
    pub max_attempts: Option<u32>,

    /// Delay between attempts in milliseconds
    #[arg(long, value_name = "MS")]
    pub retry_delay_ms: Option<u64>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Generate a default .hazard-report.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        match self.aoi {
            None => return Err("--aoi is required".to_string()),
            Some(ref path) if !path.is_file() => {
                return Err(format!("AOI file does not exist: {}", path.display()));
            }
            Some(_) => {}
        }

        if let Some(ref base_url) = self.base_url {
            if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                return Err("Base URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.max_attempts == Some(0) {
            return Err("Max attempts must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn make_args(aoi: PathBuf) -> Args {
        Args {
            aoi: Some(aoi),
            output: None,
            format: OutputFormat::Markdown,
            config: None,
            verbose: false,
            quiet: false,
            no_progress: false,
            base_url: None,
            max_attempts: None,
            retry_delay_ms: None,
            timeout: None,
            init_config: false,
        }
    }

    fn aoi_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{}}").unwrap();
        file
    }

    #[test]
    fn test_parse_from_command_line() {
        let args = Args::try_parse_from([
            "hazard-report",
            "--aoi",
            "parcel.json",
            "--format",
            "json",
            "--max-attempts",
            "5",
        ])
        .unwrap();

        assert_eq!(args.aoi, Some(PathBuf::from("parcel.json")));
        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(args.max_attempts, Some(5));
        assert!(args.output.is_none());
    }

    #[test]
    fn test_aoi_required_unless_init_config() {
        assert!(Args::try_parse_from(["hazard-report"]).is_err());
        assert!(Args::try_parse_from(["hazard-report", "--init-config"]).is_ok());
    }

    #[test]
    fn test_validation_missing_aoi_file() {
        let args = make_args(PathBuf::from("/nonexistent/aoi.json"));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_ok() {
        let file = aoi_file();
        let args = make_args(file.path().to_path_buf());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_invalid_base_url() {
        let file = aoi_file();
        let mut args = make_args(file.path().to_path_buf());
        args.base_url = Some("ftp://example.com".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_zero_attempts() {
        let file = aoi_file();
        let mut args = make_args(file.path().to_path_buf());
        args.max_attempts = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let file = aoi_file();
        let mut args = make_args(file.path().to_path_buf());
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args(PathBuf::from("aoi.json"));
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
