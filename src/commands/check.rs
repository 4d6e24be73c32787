//! Check command implementation.
//!
//! Validates configuration, tier document, settings and gateway access.

use vpn_qos::gateway::{load_replay_data, PowerShell};
use vpn_qos::settings::load_settings;
use vpn_qos::tiers::{load_tier_document, ClassificationMap};

use crate::config::{validate_effective_config, Config};

/// Validates system requirements and configuration.
pub fn command_check(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 vpn-qos - System Check");
    println!("=========================");

    let mut all_ok = true;

    // Check configuration
    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => println!("   ✅ Configuration is valid"),
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    // Check tier document
    println!("\n📊 Checking priority tiers...");
    match load_tier_document(config.tiers_file.as_deref()) {
        Ok(doc) => {
            let map = ClassificationMap::from_document(&doc, &config.map_options());
            if doc.priority_levels.is_empty() {
                println!("   ⚠️  No tiers configured");
            } else {
                println!(
                    "   ✅ {} tiers, {} applications, {} classification entries",
                    doc.priority_levels.len(),
                    doc.applications().count(),
                    map.len()
                );
            }
            for level in doc.priority_levels.iter().filter(|l| l.dscp.is_none()) {
                println!("   ⚠️  Tier '{}' has no DSCP value (apply will fail)", level.name);
            }
        }
        Err(e) => {
            println!("   ❌ {}", e);
            all_ok = false;
        }
    }

    // Check settings
    println!("\n💾 Checking settings...");
    match load_settings(&config.settings_path()) {
        Ok(settings) => println!(
            "   ✅ Settings readable (interface: {})",
            settings.interface.as_deref().unwrap_or("auto-detect")
        ),
        Err(e) => {
            println!("   ❌ {}", e);
            all_ok = false;
        }
    }

    // Check gateway access
    println!("\n🔌 Checking gateways...");
    if let Some(path) = &config.test_data_file {
        match load_replay_data(path) {
            Ok(data) => println!("   ✅ Replay data: {} ticks", data.ticks.len()),
            Err(e) => {
                println!("   ❌ {}", e);
                all_ok = false;
            }
        }
    } else {
        match PowerShell::new(config.powershell_program()).probe() {
            Ok(version) => println!("   ✅ PowerShell {} available", version.trim()),
            Err(e) => {
                println!("   ❌ PowerShell not usable: {}", e);
                all_ok = false;
            }
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - system is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review warnings");
        std::process::exit(1);
    }
}
