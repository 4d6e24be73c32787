//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::Config;

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let output = match output {
        Some(path) => path,
        None => PathBuf::from(match format {
            ConfigFormat::Json => "vpn-qos.json",
            ConfigFormat::Toml => "vpn-qos.toml",
            ConfigFormat::Yaml => "vpn-qos.yaml",
        }),
    };

    let content = render_config(&config, format, commented)?;

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

fn render_config(
    config: &Config,
    format: ConfigFormat,
    commented: bool,
) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => {
            let content = serde_yaml::to_string(config)?;
            if commented {
                add_config_comments(content)
            } else {
                content
            }
        }
    })
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# vpn-qos Configuration
# ======================
#
# Files
# -----
# tiers_file: null             # Priority tier document (null = built-in tiers)
# settings_file: "settings.json" # Saved interface selection
# test_data_file: null         # Replay file instead of PowerShell (see generate-testdata)
#
# Policy Store
# ------------
# policy_prefix: "Auto_"       # Prefix of every policy this tool installs
# powershell: "powershell"     # PowerShell executable (e.g. "pwsh")
#
# Monitoring
# ----------
# interface: null              # Interface to monitor (null = settings, then auto-detect)
# interval_seconds: 1          # Seconds between ticks
# duration_seconds: 60         # Session length (0 = until Ctrl+C)
# classify_by: "name"          # "name" (policy name) or "dscp" (DSCP marking)
# normalize_policy_names: false # Compare names lower-cased without whitespace
# output_format: "text"        # "text" or "json"
#
# Logging
# -------
# log_level: "info"            # off, error, warn, info, debug, trace
# enable_file_logging: false   # Also write logs to log_file
# log_file: null               # Log file path (null = traffic_monitor.log)
"#;

    format!("{comments}\n{yaml}")
}
