//! Configuration management for vpn-qos.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use vpn_qos::report::OutputFormat;
use vpn_qos::settings::DEFAULT_SETTINGS_FILE;
use vpn_qos::tiers::{ClassifyBy, MapOptions, DEFAULT_POLICY_PREFIX};

// Default configuration constants
pub const DEFAULT_INTERVAL_SECONDS: u64 = 1;
pub const DEFAULT_DURATION_SECONDS: u64 = 60;
pub const DEFAULT_LOG_FILE: &str = "traffic_monitor.log";
pub const DEFAULT_POWERSHELL: &str = vpn_qos::gateway::powershell::DEFAULT_POWERSHELL;

/// Effective configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Files
    #[serde(alias = "tiers-file")]
    pub tiers_file: Option<PathBuf>,
    #[serde(alias = "settings-file")]
    pub settings_file: Option<PathBuf>,
    /// Path to JSON replay data (uses recorded samples instead of PowerShell)
    #[serde(alias = "test-data-file")]
    pub test_data_file: Option<PathBuf>,

    // Policy store
    #[serde(alias = "policy-prefix")]
    pub policy_prefix: Option<String>,
    pub powershell: Option<String>,

    // Monitoring
    pub interface: Option<String>,
    #[serde(alias = "interval-seconds")]
    pub interval_seconds: Option<u64>,
    /// 0 = run until interrupted
    #[serde(alias = "duration-seconds")]
    pub duration_seconds: Option<u64>,
    /// "name" | "dscp"
    #[serde(alias = "classify-by")]
    pub classify_by: Option<String>,
    /// Compare policy names lower-cased with whitespace removed
    #[serde(alias = "normalize-policy-names")]
    pub normalize_policy_names: Option<bool>,
    /// "text" | "json"
    #[serde(alias = "output-format")]
    pub output_format: Option<String>,

    // Logging
    pub log_level: Option<String>,
    pub enable_file_logging: Option<bool>,
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tiers_file: None,
            settings_file: Some(PathBuf::from(DEFAULT_SETTINGS_FILE)),
            test_data_file: None,
            policy_prefix: Some(DEFAULT_POLICY_PREFIX.to_string()),
            powershell: Some(DEFAULT_POWERSHELL.to_string()),
            interface: None,
            interval_seconds: Some(DEFAULT_INTERVAL_SECONDS),
            duration_seconds: Some(DEFAULT_DURATION_SECONDS),
            classify_by: Some("name".into()),
            normalize_policy_names: Some(false),
            output_format: Some("text".into()),
            log_level: Some("info".into()),
            enable_file_logging: Some(false),
            log_file: None,
        }
    }
}

impl Config {
    pub fn prefix(&self) -> &str {
        self.policy_prefix.as_deref().unwrap_or(DEFAULT_POLICY_PREFIX)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.settings_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE))
    }

    pub fn powershell_program(&self) -> &str {
        self.powershell.as_deref().unwrap_or(DEFAULT_POWERSHELL)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds.unwrap_or(DEFAULT_INTERVAL_SECONDS))
    }

    /// `None` means run until interrupted.
    pub fn session_duration(&self) -> Option<Duration> {
        match self.duration_seconds.unwrap_or(DEFAULT_DURATION_SECONDS) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn classify_by(&self) -> ClassifyBy {
        match self.classify_by.as_deref() {
            Some("dscp") => ClassifyBy::Dscp,
            _ => ClassifyBy::Name,
        }
    }

    pub fn output_format(&self) -> OutputFormat {
        match self.output_format.as_deref() {
            Some("json") => OutputFormat::Json,
            _ => OutputFormat::Text,
        }
    }

    pub fn map_options(&self) -> MapOptions {
        MapOptions {
            prefix: self.prefix().to_string(),
            classify_by: self.classify_by(),
            normalize: self.normalize_policy_names.unwrap_or(false),
        }
    }

    /// Log file to write to, if file logging is enabled.
    pub fn effective_log_file(&self) -> Option<PathBuf> {
        if !self.enable_file_logging.unwrap_or(false) {
            return None;
        }
        Some(
            self.log_file
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
        )
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if cfg.interval_seconds == Some(0) {
        return Err("interval_seconds must be greater than 0".into());
    }

    if let Some(mode) = cfg.classify_by.as_deref() {
        if mode != "name" && mode != "dscp" {
            return Err(format!("Invalid classify_by '{}', expected 'name' or 'dscp'", mode).into());
        }
    }

    if let Some(format) = cfg.output_format.as_deref() {
        if format != "text" && format != "json" {
            return Err(
                format!("Invalid output_format '{}', expected 'text' or 'json'", format).into(),
            );
        }
    }

    if cfg.prefix().trim().is_empty() {
        return Err("policy_prefix must not be empty".into());
    }

    if cfg.powershell_program().trim().is_empty() {
        return Err("powershell must name an executable".into());
    }

    if let Some(path) = &cfg.test_data_file {
        if !path.exists() {
            return Err(format!("Test data file not found: {}", path.display()).into());
        }
    }

    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(path) = &args.tiers_file {
        config.tiers_file = Some(path.clone());
    }
    if let Some(path) = &args.settings_file {
        config.settings_file = Some(path.clone());
    }
    if let Some(path) = &args.test_data_file {
        config.test_data_file = Some(path.clone());
    }
    if let Some(path) = &args.log_file {
        config.enable_file_logging = Some(true);
        config.log_file = Some(path.clone());
    }

    Ok(config)
}

/// Enhanced configuration loading with multiple format support
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = if let Some(p) = path {
        PathBuf::from(p)
    } else {
        default_config_locations()
            .into_iter()
            .find(|p| p.exists())
            .unwrap_or_default()
    };

    if path.as_os_str().is_empty() || !path.exists() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&path)?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Default config file locations, most specific last.
fn default_config_locations() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(program_data) = std::env::var_os("ProgramData") {
        let dir = PathBuf::from(program_data).join("vpn-qos");
        paths.push(dir.join("vpn-qos.yaml"));
        paths.push(dir.join("vpn-qos.json"));
    }
    paths.push(PathBuf::from("./vpn-qos.yaml"));
    paths.push(PathBuf::from("./vpn-qos.yml"));
    paths.push(PathBuf::from("./vpn-qos.json"));
    paths
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };
    println!("{output}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = Config::default();
        assert!(validate_effective_config(&cfg).is_ok());
        assert_eq!(cfg.prefix(), "Auto_");
        assert_eq!(cfg.tick_interval(), Duration::from_secs(1));
        assert_eq!(cfg.session_duration(), Some(Duration::from_secs(60)));
        assert_eq!(cfg.classify_by(), ClassifyBy::Name);
        assert!(cfg.effective_log_file().is_none());
    }

    #[test]
    fn test_zero_duration_is_unbounded() {
        let cfg = Config {
            duration_seconds: Some(0),
            ..Config::default()
        };
        assert!(cfg.session_duration().is_none());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let cfg = Config {
            interval_seconds: Some(0),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());

        let cfg = Config {
            classify_by: Some("port".into()),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());

        let cfg = Config {
            policy_prefix: Some("  ".into()),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());
    }

    #[test]
    fn test_file_logging_default_path() {
        let cfg = Config {
            enable_file_logging: Some(true),
            ..Config::default()
        };
        assert_eq!(
            cfg.effective_log_file(),
            Some(PathBuf::from(DEFAULT_LOG_FILE))
        );
    }

    #[test]
    fn test_load_yaml_config() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "interface: \"Wi-Fi\"\ninterval_seconds: 5\nclassify_by: dscp").unwrap();

        let cfg = load_config(Some(file.path())).unwrap();
        assert_eq!(cfg.interface.as_deref(), Some("Wi-Fi"));
        assert_eq!(cfg.interval_seconds, Some(5));
        assert_eq!(cfg.classify_by(), ClassifyBy::Dscp);
    }

    #[test]
    fn test_load_json_config() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"output_format": "json", "policy_prefix": "QoS_"}}"#).unwrap();

        let cfg = load_config(Some(file.path())).unwrap();
        assert_eq!(cfg.output_format(), OutputFormat::Json);
        assert_eq!(cfg.prefix(), "QoS_");
    }

    #[test]
    fn test_missing_config_is_default() {
        let cfg = load_config(Some(Path::new("/nonexistent/vpn-qos.yaml"))).unwrap();
        assert_eq!(cfg.interval_seconds, Some(DEFAULT_INTERVAL_SECONDS));
    }
}
