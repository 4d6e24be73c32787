//! CLI arguments and subcommands for vpn-qos.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use vpn_qos::report::OutputFormat;
use vpn_qos::ClassifyBy;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "vpn-qos",
    about = "Per-application DSCP QoS policies and tier traffic monitor",
    long_about = "Per-application DSCP QoS policies and tier traffic monitor.\n\n\
                  Applies Windows policy-based QoS rules to configured applications, \
                  grouped into priority tiers, and reports how observed traffic is \
                  shared between those tiers.",
    version = "0.1.0",
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Log level (overrides log_level from the config file)
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Priority tier document (JSON); the built-in tiers are used when omitted
    #[arg(short = 't', long)]
    pub tiers_file: Option<PathBuf>,

    /// Settings document (JSON) holding the selected interface
    #[arg(long)]
    pub settings_file: Option<PathBuf>,

    /// Replay policy and interface samples from a JSON file instead of PowerShell
    #[arg(long)]
    pub test_data_file: Option<PathBuf>,

    /// Write logs to this file in addition to stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

/// Subcommands; without one, `monitor` runs with the configured settings
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Poll policy and interface counters and report per-tier traffic
    Monitor {
        /// Session length in seconds (0 = until Ctrl+C)
        #[arg(short = 'd', long)]
        duration: Option<u64>,

        /// Seconds between ticks
        #[arg(short = 'i', long)]
        interval: Option<u64>,

        /// Interface to monitor (overrides settings and auto-detection)
        #[arg(long)]
        interface: Option<String>,

        /// Classify policies by generated name or by DSCP marking
        #[arg(long, value_enum)]
        classify_by: Option<ClassifyBy>,

        /// Report format
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,
    },

    /// Create QoS policies for running applications
    Apply {
        /// Applications to prioritize (display or executable name)
        apps: Vec<String>,

        /// Apply every configured application that is running
        #[arg(long, conflicts_with = "apps")]
        all: bool,
    },

    /// Remove QoS policies
    Remove {
        /// Applications whose policy should be removed
        apps: Vec<String>,

        /// Remove the policies of every configured application
        #[arg(long, conflicts_with = "apps")]
        all: bool,
    },

    /// Remove every policy installed under the tool's prefix
    Cleanup,

    /// List installed policies and the tier each one maps to
    List,

    /// List configured priority tiers
    Tiers {
        /// Show applications and generated policy names
        #[arg(long)]
        verbose: bool,

        /// Filter by tier name
        #[arg(long)]
        tier: Option<String>,
    },

    /// Show or save the settings document
    Settings {
        /// Save this interface as the monitored interface
        #[arg(long, conflicts_with = "detect")]
        interface: Option<String>,

        /// Detect the first active interface and save it
        #[arg(long)]
        detect: bool,
    },

    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Validate configuration, tier document, settings and PowerShell access
    Check,

    /// Generate a synthetic replay file for --test-data-file
    GenerateTestdata {
        /// Output file path
        #[arg(short = 'o', long, default_value = "testdata.json")]
        output: PathBuf,

        /// Number of ticks to generate
        #[arg(long, default_value_t = 60)]
        ticks: usize,

        /// Number of policies outside any tier to include per tick
        #[arg(long, default_value_t = 2)]
        unknown_policies: usize,
    },
}
