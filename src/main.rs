//! vpn-qos - version 0.1.0
//!
//! Per-application DSCP QoS policies and tier traffic monitor with tracing logging.
//! This is the main entry point that sets up logging and dispatches subcommands.

mod cli;
mod commands;
mod config;

use clap::Parser;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing::{info, Level};
use tracing_subscriber::fmt::writer::MakeWriterExt;

use cli::{Args, Commands, LogLevel};
use commands::monitor::MonitorOverrides;
use commands::{
    command_apply, command_check, command_cleanup, command_config, command_generate_testdata,
    command_list, command_monitor, command_remove, command_settings, command_tiers,
};
use config::{resolve_config, show_config, validate_effective_config, Config};

/// Effective log level: CLI > config file > info. `None` disables logging.
fn resolve_log_level(config: &Config, args: &Args) -> Option<Level> {
    let level = match &args.log_level {
        Some(level) => level.clone(),
        None => match config.log_level.as_deref() {
            Some("off") => LogLevel::Off,
            Some("error") => LogLevel::Error,
            Some("warn") => LogLevel::Warn,
            Some("debug") => LogLevel::Debug,
            Some("trace") => LogLevel::Trace,
            _ => LogLevel::Info,
        },
    };

    match level {
        LogLevel::Off => None,
        LogLevel::Error => Some(Level::ERROR),
        LogLevel::Warn => Some(Level::WARN),
        LogLevel::Info => Some(Level::INFO),
        LogLevel::Debug => Some(Level::DEBUG),
        LogLevel::Trace => Some(Level::TRACE),
    }
}

/// Initializes tracing logging subsystem with configured log level.
///
/// Logs go to stderr so that tick reports on stdout stay machine-readable.
fn setup_logging(config: &Config, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let Some(log_level) = resolve_log_level(config, args) else {
        return Ok(());
    };

    if let Some(path) = config.effective_log_file() {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .with_writer(std::io::stderr.and(Mutex::new(file)))
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
        info!(
            "Logging initialized with level: {} (file: {})",
            log_level,
            path.display()
        );
    } else {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
        info!("Logging initialized with level: {}", log_level);
    }

    Ok(())
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

async fn run_command(command: Commands, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Monitor {
            duration,
            interval,
            interface,
            classify_by,
            format,
        } => {
            let overrides = MonitorOverrides {
                duration,
                interval,
                interface,
                classify_by,
                format,
            };
            command_monitor(overrides, config).await
        }

        Commands::Apply { apps, all } => command_apply(apps, all, config),

        Commands::Remove { apps, all } => command_remove(apps, all, config),

        Commands::Cleanup => command_cleanup(config),

        Commands::List => command_list(config),

        Commands::Tiers { verbose, tier } => command_tiers(verbose, tier, config),

        Commands::Settings { interface, detect } => command_settings(interface, detect, config),

        Commands::Config {
            output,
            format,
            commented,
        } => command_config(output, format, commented),

        Commands::Check => command_check(config),

        Commands::GenerateTestdata {
            output,
            ticks,
            unknown_policies,
        } => command_generate_testdata(output, ticks, unknown_policies, config),
    }
}

/// Main application entry point.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format.clone());
    }

    // Config generation and check report their own problems
    let config = match &args.command {
        Some(Commands::Config { .. }) | Some(Commands::Check) => resolve_config(&args)?,
        _ => load_validated_config(&args)?,
    };

    setup_logging(&config, &args)?;
    info!("Starting vpn-qos");

    let command = args.command.unwrap_or(Commands::Monitor {
        duration: None,
        interval: None,
        interface: None,
        classify_by: None,
        format: None,
    });

    if let Err(e) = run_command(command, &config).await {
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }

    Ok(())
}
