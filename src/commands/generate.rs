//! Generate testdata command implementation.
//!
//! Generates synthetic replay files for `--test-data-file`.

use chrono::Utc;
use rand::Rng;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

use vpn_qos::gateway::{InterfaceSample, ReplayData, ReplayTick};
use vpn_qos::tiers::TierDocument;
use vpn_qos::PolicySample;

use super::load_tiers;
use crate::config::Config;

// Per-tick traffic ranges
const MAX_POLICY_BYTES_PER_TICK: u64 = 5 * 1024 * 1024; // 5 MB
const MAX_INTERFACE_BYTES_PER_TICK: u64 = 20 * 1024 * 1024; // 20 MB

/// Replay file format version.
pub const REPLAY_VERSION: &str = "1.0";

/// Generates a synthetic replay file.
pub fn command_generate_testdata(
    output: PathBuf,
    ticks: usize,
    unknown_policies: usize,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    debug!(
        "Generating replay data: ticks={}, unknown_policies={}, output={}",
        ticks,
        unknown_policies,
        output.display()
    );

    let doc = load_tiers(config);
    let data = generate_replay_data(
        &mut rand::thread_rng(),
        &doc,
        config.prefix(),
        ticks,
        unknown_policies,
    );

    let json_content = serde_json::to_string_pretty(&data)?;
    fs::write(&output, &json_content)?;

    println!(
        "✅ Generated replay data: {} ticks in {}",
        data.ticks.len(),
        output.display()
    );

    Ok(())
}

/// Builds `ticks` ticks of cumulative counters for every configured application
/// plus `unknown_policies` prefixed policies that belong to no tier.
pub fn generate_replay_data(
    rng: &mut impl Rng,
    doc: &TierDocument,
    prefix: &str,
    ticks: usize,
    unknown_policies: usize,
) -> ReplayData {
    let mut policies: Vec<PolicySample> = Vec::new();
    for (tier, app) in doc.applications() {
        let mut sample = PolicySample::new(app.policy_name(prefix), 0);
        sample.dscp = tier.dscp;
        sample.throttle_bits_per_second = tier.throttle_bits_per_second;
        if !policies.iter().any(|p| p.policy_name == sample.policy_name) {
            policies.push(sample);
        }
    }
    for i in 0..unknown_policies {
        policies.push(PolicySample::new(format!("{}unlisted{}", prefix, i + 1), 0));
    }

    let mut interface = InterfaceSample::default();
    let mut out = Vec::with_capacity(ticks);

    for _ in 0..ticks {
        for policy in policies.iter_mut() {
            // Idle applications stay idle for the tick
            if rng.gen_bool(0.8) {
                policy.observed_bytes += rng.gen_range(0..MAX_POLICY_BYTES_PER_TICK);
            }
        }
        interface.input_bytes += rng.gen_range(0..MAX_INTERFACE_BYTES_PER_TICK);
        interface.output_bytes += rng.gen_range(0..MAX_INTERFACE_BYTES_PER_TICK);

        out.push(ReplayTick {
            policies: policies.clone(),
            interface,
        });
    }

    ReplayData {
        version: REPLAY_VERSION.to_string(),
        generated_at: Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        interface: Some("Ethernet".to_string()),
        ticks: out,
    }
}
