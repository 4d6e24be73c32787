//! List command implementation.
//!
//! Lists installed policies with the tier each one classifies into.

use vpn_qos::tiers::ClassificationMap;

use super::{build_gateways, load_tiers};
use crate::config::Config;

/// Lists installed policies and their tiers.
pub fn command_list(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let doc = load_tiers(config);
    let map = ClassificationMap::from_document(&doc, &config.map_options());
    let gateways = build_gateways(config)?;
    let policies = gateways.policy_store.enumerate()?;

    println!("📋 Installed QoS policies ({}*)", config.prefix());
    println!("===================================");

    if policies.is_empty() {
        println!("   (none)");
        return Ok(());
    }

    for policy in &policies {
        let tier = map
            .tier_for(policy)
            .map(|t| t.to_string())
            .unwrap_or_else(|| "unclassified".to_string());
        let dscp = policy
            .dscp
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());
        let throttle = policy
            .throttle_bits_per_second
            .map(|b| format!("{} bps", b))
            .unwrap_or_else(|| "none".to_string());
        println!(
            "   ├─ {} [{}] DSCP={} throttle={} bytes={}",
            policy.policy_name, tier, dscp, throttle, policy.observed_bytes
        );
    }

    println!("\n📋 Total: {} policies", policies.len());
    Ok(())
}
