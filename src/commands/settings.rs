//! Settings command implementation.
//!
//! Shows the settings document or saves a new interface selection.

use vpn_qos::gateway::resolve_interface;
use vpn_qos::settings::{load_settings, save_settings, Settings};

use super::build_gateways;
use crate::config::Config;

/// Shows settings, or saves `interface` (or the detected one with `detect`).
pub fn command_settings(
    interface: Option<String>,
    detect: bool,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = config.settings_path();

    let selected = if let Some(name) = interface {
        Some(name)
    } else if detect {
        let gateways = build_gateways(config)?;
        Some(resolve_interface(None, gateways.interface_counters.as_ref()))
    } else {
        None
    };

    match selected {
        Some(name) => {
            let mut settings = load_settings(&path)?;
            settings.interface = Some(name.clone());
            save_settings(&path, &settings)?;
            println!("✅ Interface '{}' saved to {}", name, path.display());
        }
        None => {
            let settings: Settings = load_settings(&path)?;
            println!("⚙️  Settings ({})", path.display());
            println!(
                "   interface: {}",
                settings.interface.as_deref().unwrap_or("(auto-detect)")
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_interface() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let config = Config {
            settings_file: Some(path.clone()),
            ..Config::default()
        };

        command_settings(Some("Wi-Fi".into()), false, &config).unwrap();
        assert_eq!(
            load_settings(&path).unwrap().interface.as_deref(),
            Some("Wi-Fi")
        );
    }
}
