//! Gateways to the operating system's QoS policy store and adapter counters.
//!
//! This module provides:
//! - `policy`: enumerate/create/delete named QoS policies
//! - `interface`: cumulative byte counters for one network interface
//! - `powershell`: structured PowerShell invocation used by the Windows gateways
//! - `replay`: file-backed gateways that replay recorded or synthetic samples

pub mod interface;
pub mod policy;
pub mod powershell;
pub mod replay;

pub use interface::{
    resolve_interface, InterfaceCounters, InterfaceSample, PowerShellInterfaceCounters,
    DEFAULT_INTERFACE,
};
pub use policy::{PolicySpec, PolicyStore, PowerShellPolicyStore};
pub use powershell::PowerShell;
pub use replay::{
    load_replay_data, ReplayData, ReplayInterfaceCounters, ReplayPolicyStore, ReplayTick,
};
