//! Tiers command implementation.
//!
//! Lists configured priority tiers and their applications.

use vpn_qos::tiers::TierDocument;

use super::load_tiers;
use crate::config::Config;

/// Lists priority tiers, optionally filtered by name.
pub fn command_tiers(
    verbose: bool,
    tier: Option<String>,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let doc = load_tiers(config);
    print_tiers(&doc, verbose, tier.as_deref(), config.prefix());
    Ok(())
}

/// Prints the tiers matching `filter`. Returns (tiers shown, applications shown).
fn print_tiers(
    doc: &TierDocument,
    verbose: bool,
    filter: Option<&str>,
    prefix: &str,
) -> (usize, usize) {
    println!("📊 vpn-qos - Priority Tiers");
    println!("===========================");

    let mut shown = 0;
    let mut shown_apps = 0;
    for level in &doc.priority_levels {
        if let Some(filter) = filter {
            if !level.name.to_lowercase().contains(&filter.to_lowercase()) {
                continue;
            }
        }
        shown += 1;
        shown_apps += level.applications.len();

        let dscp = level
            .dscp
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("\n🏷️  Tier: {} (DSCP {})", level.name, dscp);
        println!("{}", "─".repeat(50));
        if let Some(bps) = level.throttle_bits_per_second {
            println!("   ├─ Throttle: {} bps", bps);
        }

        if verbose {
            for app in &level.applications {
                println!(
                    "   ├─ 📂 {} ({}) -> {}",
                    app.name,
                    app.executable_name(),
                    app.policy_name(prefix)
                );
            }
        } else {
            let examples: Vec<&str> = level
                .applications
                .iter()
                .take(3)
                .map(|a| a.name.as_str())
                .collect();
            println!("   ├─ {} applications", level.applications.len());
            if !examples.is_empty() {
                println!("   └─ Examples: {}", examples.join(", "));
            }
        }
    }

    println!(
        "\n📋 Total: {} applications in {} tiers",
        shown_apps, shown
    );
    (shown, shown_apps)
}
