//! Monitor command implementation.
//!
//! Runs a monitoring session and prints one report per tick.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{debug, error, info, warn};

use vpn_qos::gateway::resolve_interface;
use vpn_qos::report::{render, OutputFormat};
use vpn_qos::settings::load_settings;
use vpn_qos::tiers::{ClassificationMap, ClassifyBy};
use vpn_qos::{Session, SessionOptions, StopSignal};

use super::{build_gateways, load_tiers};
use crate::config::Config;

/// Per-invocation overrides of the configured monitor settings.
#[derive(Debug, Default)]
pub struct MonitorOverrides {
    pub duration: Option<u64>,
    pub interval: Option<u64>,
    pub interface: Option<String>,
    pub classify_by: Option<ClassifyBy>,
    pub format: Option<OutputFormat>,
}

/// Picks the interface name to pass to resolution: CLI, config, settings, replay file.
fn preferred_interface(
    overrides: &MonitorOverrides,
    config: &Config,
    replay_interface: Option<String>,
) -> Option<String> {
    if let Some(name) = overrides.interface.clone().or_else(|| config.interface.clone()) {
        return Some(name);
    }
    match load_settings(&config.settings_path()) {
        Ok(settings) if settings.interface.is_some() => settings.interface,
        Ok(_) => replay_interface,
        Err(e) => {
            warn!("Ignoring unreadable settings: {}", e);
            replay_interface
        }
    }
}

/// Writes one rendered report and flushes it.
fn emit(out: &mut impl Write, text: &str) -> io::Result<()> {
    writeln!(out, "{}", text)?;
    out.flush()
}

/// Runs the traffic monitor until the duration elapses or Ctrl+C is pressed.
pub async fn command_monitor(
    overrides: MonitorOverrides,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut map_options = config.map_options();
    if let Some(mode) = overrides.classify_by {
        map_options.classify_by = mode;
    }
    let format = overrides.format.unwrap_or_else(|| config.output_format());

    let tick_interval = match overrides.interval {
        Some(0) => return Err("interval must be greater than 0".into()),
        Some(secs) => Duration::from_secs(secs),
        None => config.tick_interval(),
    };
    let duration = match overrides.duration {
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
        None => config.session_duration(),
    };

    let doc = load_tiers(config);
    let map = Arc::new(ClassificationMap::from_document(&doc, &map_options));
    debug!(
        "Classification map: {} entries over {} tiers ({:?})",
        map.len(),
        map.tiers().len(),
        map.classify_by()
    );

    let gateways = build_gateways(config)?;
    let preferred = preferred_interface(&overrides, config, gateways.replay_interface.clone());
    let interface = resolve_interface(preferred.as_deref(), gateways.interface_counters.as_ref());

    let options = SessionOptions {
        interface,
        tick_interval,
        duration,
    };
    let stop = StopSignal::new();
    let session = Session::new(
        gateways.policy_store,
        gateways.interface_counters,
        map,
        options,
        Arc::clone(&stop),
    );

    // Ctrl+C ends the session between ticks
    let ctrl_c_stop = Arc::clone(&stop);
    let ctrl_c = tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Monitoring stopped by user");
            ctrl_c_stop.stop();
        }
    });

    let stats = tokio::task::spawn_blocking(move || {
        let mut session = session;
        let stop = session.stop_handle();
        let stdout = io::stdout();
        let mut out = stdout.lock();
        for report in session.by_ref() {
            let text = match render(&report, format) {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to render tick {}: {}", report.tick, e);
                    continue;
                }
            };
            if let Err(e) = emit(&mut out, &text) {
                if e.kind() == io::ErrorKind::BrokenPipe {
                    info!("Output closed, ending session");
                } else {
                    error!("Failed to write report: {}", e);
                }
                stop.stop();
                break;
            }
        }
        session.stats().clone()
    })
    .await?;

    ctrl_c.abort();
    stats.log_summary();
    info!("Monitoring completed");
    Ok(())
}
