//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.hazard-report.toml` files. The defaults point at the Utah
//! Geological Survey hazard services.

use crate::cli::OutputFormat;
use crate::models::HazardSource;
use crate::query::RetryPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".hazard-report.toml";

const DEFAULT_BASE_URL: &str =
    "https://services.arcgis.com/ZzrwjTRez6FJiOq4/arcgis/rest/services";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Feature service settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Report table URLs.
    #[serde(default)]
    pub tables: TablesConfig,

    /// Retry and timeout settings.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Hazard layers intersected with the AOI, in report order.
    #[serde(default = "default_sources")]
    pub sources: Vec<HazardSource>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            service: ServiceConfig::default(),
            tables: TablesConfig::default(),
            fetch: FetchConfig::default(),
            sources: default_sources(),
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Draw a progress bar while querying.
    #[serde(default = "default_true")]
    pub show_progress: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            show_progress: true,
        }
    }
}

fn default_output() -> String {
    "hazard_report.md".to_string()
}

fn default_true() -> bool {
    true
}

/// Feature service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL that relative source paths are joined onto.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

/// URLs of the report tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TablesConfig {
    pub hazard_groupings: String,
    pub hazard_group_text: String,
    pub hazard_intro_text: String,
    pub hazard_reference_text: String,
    pub hazard_unit_text: String,
    pub other_data: String,
    pub report_text: String,
}

impl Default for TablesConfig {
    fn default() -> Self {
        let table = |layer: u32| format!("{}/Report_Tables_View/FeatureServer/{}", DEFAULT_BASE_URL, layer);
        Self {
            hazard_groupings: table(0),
            hazard_group_text: table(1),
            hazard_intro_text: table(2),
            hazard_reference_text: table(3),
            hazard_unit_text: table(4),
            other_data: table(7),
            report_text: table(8),
        }
    }
}

/// Retry and timeout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Total attempts per query, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed wait between attempts.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout_seconds: default_timeout(),
        }
    }
}

impl FetchConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    100
}

fn default_timeout() -> u64 {
    60
}

fn default_sources() -> Vec<HazardSource> {
    const WORKING_DB: &str =
        "Utah_Geologic_Hazards_Working_Database___AGOLservice__test_view/FeatureServer";
    const EARTHQUAKE: &str = "Utah_Earthquake_Hazards/FeatureServer";

    let mut sources: Vec<HazardSource> = [
        (0, "FLH"),  // Flood Hazard
        (1, "SGS"),  // Shallow Groundwater Susceptibility
        (2, "LSS"),  // Landslide Susceptibility
        (3, "LSF"),  // Landslides
        (4, "LSC"),  // Legacy Landslide Compilation
        (5, "CAS"),  // Caliche Susceptibility
        (6, "CSS"),  // Collapsible Soil Susceptibility
        (7, "CRS"),  // Corrosive Soil and Rock Susceptibility
        (8, "EFH"),  // Earth Fissure Hazard
        (9, "ERZ"),  // Erosion Hazard Zones
        (10, "EXS"), // Expansive Soil and Rock Susceptibility
        (12, "MKF"), // Karst Features
        (13, "PES"), // Piping and Erosion Susceptibility
        (14, "GRS"), // Radon Susceptibility
        (15, "RFH"), // Rockfall Hazard
        (16, "SDH"), // Salt Tectonics Related Ground Deformation
        (17, "SBP"), // Shallow Bedrock Potential
        (18, "SLS"), // Soluble Soil and Rock Susceptibility
        (19, "WSS"), // Wind-Blown Sand Susceptibility
        (24, "AAF"), // Alluvial Fan Inventory
    ]
    .into_iter()
    .map(|(layer, code)| HazardSource::new(format!("{}/{}", WORKING_DB, layer), code))
    .collect();

    sources.push(HazardSource::new(
        "https://webmaps.geology.utah.gov/arcgis/rest/services/Hazards/quaternary_faults/MapServer/0",
        "QFF",
    ));
    sources.push(HazardSource::new(format!("{}/2", EARTHQUAKE), "LQS"));
    sources.push(HazardSource::new(format!("{}/3", EARTHQUAKE), "SFR"));
    sources.push(HazardSource::new(format!("{}/5", EARTHQUAKE), "EGS"));
    sources
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.hazard-report.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref base_url) = args.base_url {
            self.service.base_url = base_url.clone();
        }
        if let Some(attempts) = args.max_attempts {
            self.fetch.max_attempts = attempts;
        }
        if let Some(delay) = args.retry_delay_ms {
            self.fetch.retry_delay_ms = delay;
        }
        if let Some(timeout) = args.timeout {
            self.fetch.timeout_seconds = timeout;
        }
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        } else if args.format == OutputFormat::Json {
            // Keep the configured name, but not a Markdown extension
            let output = Path::new(&self.general.output);
            if output.extension().map_or(true, |ext| ext == "md") {
                self.general.output = output.with_extension("json").display().to_string();
            }
        }

        // Flags always override
        if args.no_progress || args.quiet {
            self.general.show_progress = false;
        }
    }

    /// Check settings that would otherwise fail mid-run.
    pub fn validate(&self) -> Result<(), String> {
        if self.fetch.max_attempts == 0 {
            return Err("max_attempts must be at least 1".to_string());
        }

        if self.fetch.timeout_seconds == 0 {
            return Err("timeout_seconds must be at least 1".to_string());
        }

        let base = &self.service.base_url;
        if !base.starts_with("http://") && !base.starts_with("https://") {
            return Err(format!("base_url must start with 'http://' or 'https://': {}", base));
        }

        if self.sources.is_empty() {
            return Err("at least one hazard source must be configured".to_string());
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            let code = &source.hazard_code;
            if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
                return Err(format!(
                    "hazard code must be three upper-case letters: '{}'",
                    code
                ));
            }
            if !seen.insert(source.progress_id()) {
                return Err(format!("duplicate hazard source: {}", source));
            }
        }

        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
