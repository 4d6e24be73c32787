//! CLI command implementations for vpn-qos.
//!
//! This module provides implementations for all CLI subcommands:
//! - `monitor`: Per-tier traffic monitoring session
//! - `apply` / `remove` / `cleanup`: Policy management
//! - `list`: Installed policy listing
//! - `tiers`: Tier listing
//! - `settings`: Interface selection
//! - `config`: Configuration file generation
//! - `check`: System validation
//! - `generate`: Replay data generation

pub mod apply;
pub mod check;
pub mod config;
pub mod generate;
pub mod list;
pub mod monitor;
pub mod settings;
pub mod tiers;

use std::sync::Arc;
use tracing::info;

use vpn_qos::gateway::{
    load_replay_data, InterfaceCounters, PolicyStore, PowerShell, PowerShellInterfaceCounters,
    PowerShellPolicyStore, ReplayInterfaceCounters, ReplayPolicyStore,
};
use vpn_qos::tiers::{load_tiers_or_empty, TierDocument};

use crate::config::Config;

// Re-export command functions
pub use apply::{command_apply, command_cleanup, command_remove};
pub use check::command_check;
pub use config::command_config;
pub use generate::command_generate_testdata;
pub use list::command_list;
pub use monitor::command_monitor;
pub use settings::command_settings;
pub use tiers::command_tiers;

/// Policy store and interface counters selected by the configuration.
pub struct Gateways {
    pub policy_store: Box<dyn PolicyStore>,
    pub interface_counters: Box<dyn InterfaceCounters>,
    /// Interface recorded in the replay file, if replaying.
    pub replay_interface: Option<String>,
}

/// Builds the gateways: replay file when `test_data_file` is set, PowerShell otherwise.
pub fn build_gateways(config: &Config) -> Result<Gateways, Box<dyn std::error::Error>> {
    if let Some(path) = &config.test_data_file {
        let data = Arc::new(load_replay_data(path)?);
        info!("Using replay data from {}", path.display());
        return Ok(Gateways {
            policy_store: Box::new(ReplayPolicyStore::new(Arc::clone(&data), config.prefix())),
            interface_counters: Box::new(ReplayInterfaceCounters::new(Arc::clone(&data))),
            replay_interface: data.interface.clone(),
        });
    }

    let shell = PowerShell::new(config.powershell_program());
    Ok(Gateways {
        policy_store: Box::new(PowerShellPolicyStore::new(shell.clone(), config.prefix())),
        interface_counters: Box::new(PowerShellInterfaceCounters::new(shell)),
        replay_interface: None,
    })
}

/// Tier document from the configured file, or the built-in one.
pub fn load_tiers(config: &Config) -> TierDocument {
    load_tiers_or_empty(config.tiers_file.as_deref())
}
