//! Apply, remove and cleanup command implementations.
//!
//! Manage the QoS policies installed for configured applications.

use tracing::{debug, info, warn};

use vpn_qos::apps::{apply_all, apply_application, remove_all, remove_application, SystemProcesses};
use vpn_qos::gateway::PolicyStore;

use super::{build_gateways, load_tiers};
use crate::config::Config;

/// Creates policies for the named applications, or for every running one with `all`.
pub fn command_apply(
    apps: Vec<String>,
    all: bool,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    if apps.is_empty() && !all {
        return Err("no applications given (use --all to apply every configured application)".into());
    }

    let doc = load_tiers(config);
    let gateways = build_gateways(config)?;
    let store = gateways.policy_store.as_ref();
    let lookup = SystemProcesses::new();
    let prefix = config.prefix();

    if all {
        let report = apply_all(store, &lookup, &doc, prefix);
        for spec in &report.applied {
            println!("✅ {} (DSCP {}) -> {}", spec.name, spec.dscp, spec.executable_path);
        }
        if !report.not_running.is_empty() {
            println!("⏭️  Not running: {}", report.not_running.join(", "));
        }
        for (app, e) in &report.failed {
            println!("❌ {}: {}", app, e);
        }
        println!(
            "\n📋 Applied {} policies, {} not running, {} failed",
            report.applied.len(),
            report.not_running.len(),
            report.failed.len()
        );
        if !report.failed.is_empty() {
            return Err(format!("{} policies failed to apply", report.failed.len()).into());
        }
        return Ok(());
    }

    let mut failures = 0;
    for app in &apps {
        match apply_application(store, &lookup, &doc, app, prefix) {
            Ok(spec) => {
                println!("✅ {} (DSCP {}) -> {}", spec.name, spec.dscp, spec.executable_path);
            }
            Err(e) => {
                println!("❌ {}: {}", app, e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        return Err(format!("{} of {} applications failed", failures, apps.len()).into());
    }
    Ok(())
}

/// Removes the policies of the named applications, or of every configured one with `all`.
pub fn command_remove(
    apps: Vec<String>,
    all: bool,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    if apps.is_empty() && !all {
        return Err("no applications given (use --all to remove every configured policy)".into());
    }

    let doc = load_tiers(config);
    let gateways = build_gateways(config)?;
    let store = gateways.policy_store.as_ref();
    let prefix = config.prefix();

    if all {
        let (removed, failed) = remove_all(store, &doc, prefix);
        for name in &removed {
            println!("🗑️  Removed {}", name);
        }
        for (name, e) in &failed {
            println!("❌ {}: {}", name, e);
        }
        if !failed.is_empty() {
            return Err(format!("{} policies could not be removed", failed.len()).into());
        }
        return Ok(());
    }

    let mut failures = 0;
    for app in &apps {
        match remove_application(store, &doc, app, prefix) {
            Ok(name) => println!("🗑️  Removed {}", name),
            Err(e) => {
                println!("❌ {}: {}", app, e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        return Err(format!("{} of {} removals failed", failures, apps.len()).into());
    }
    Ok(())
}

/// Removes every installed policy whose name carries the configured prefix.
pub fn command_cleanup(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let gateways = build_gateways(config)?;
    let removed = cleanup_prefixed(gateways.policy_store.as_ref())?;

    if removed == 0 {
        println!("ℹ️  No {}* policies installed", config.prefix());
    } else {
        println!("✅ Removed {} policies", removed);
    }
    Ok(())
}

/// Deletes every policy the store enumerates. Returns how many were removed.
fn cleanup_prefixed(store: &dyn PolicyStore) -> Result<usize, Box<dyn std::error::Error>> {
    let installed = store.enumerate()?;
    debug!("Cleanup found {} policies", installed.len());

    let mut removed = 0;
    for policy in &installed {
        info!("Removing policy: {}", policy.policy_name);
        match store.delete(&policy.policy_name) {
            Ok(()) => removed += 1,
            Err(e) => warn!("Failed to remove {}: {}", policy.policy_name, e),
        }
    }
    Ok(removed)
}
