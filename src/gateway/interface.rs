//! Interface Counter gateway.
//!
//! Reads cumulative received/sent byte counters for one network adapter.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::GatewayError;
use crate::gateway::powershell::{parse_json_rows, PowerShell};

/// Interface used when none is configured and none reports "Up".
pub const DEFAULT_INTERFACE: &str = "Ethernet";

/// Cumulative counters for the monitored link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceSample {
    pub input_bytes: u64,
    pub output_bytes: u64,
}

/// Access to per-adapter byte counters.
pub trait InterfaceCounters: Send {
    /// Counters for the named interface.
    fn sample(&self, interface: &str) -> Result<InterfaceSample, GatewayError>;

    /// Name of the first interface whose operational status is up.
    fn detect_active(&self) -> Result<Option<String>, GatewayError>;
}

const SAMPLE_SCRIPT: &str = r#"
$ErrorActionPreference = 'Stop'
Get-NetAdapterStatistics -Name $env:VPNQOS_INTERFACE |
    Select-Object ReceivedBytes, SentBytes |
    ConvertTo-Json -Compress
"#;

const DETECT_SCRIPT: &str = r#"
$ErrorActionPreference = 'Stop'
Get-NetAdapter | Where-Object { $_.Status -eq 'Up' } |
    Select-Object -First 1 -ExpandProperty Name
"#;

#[derive(Debug, Deserialize)]
struct RawAdapterStatistics {
    #[serde(rename = "ReceivedBytes", default)]
    received_bytes: u64,
    #[serde(rename = "SentBytes", default)]
    sent_bytes: u64,
}

/// Parses `Get-NetAdapterStatistics` JSON into a sample.
pub fn parse_interface_output(output: &str) -> Result<InterfaceSample, GatewayError> {
    let rows: Vec<RawAdapterStatistics> = parse_json_rows(output)?;
    let row = rows
        .into_iter()
        .next()
        .ok_or_else(|| GatewayError::MalformedPayload("no adapter statistics returned".into()))?;
    Ok(InterfaceSample {
        input_bytes: row.received_bytes,
        output_bytes: row.sent_bytes,
    })
}

/// Interface counters backed by the `NetAdapter` PowerShell cmdlets.
#[derive(Debug, Clone, Default)]
pub struct PowerShellInterfaceCounters {
    shell: PowerShell,
}

impl PowerShellInterfaceCounters {
    pub fn new(shell: PowerShell) -> Self {
        Self { shell }
    }
}

impl InterfaceCounters for PowerShellInterfaceCounters {
    fn sample(&self, interface: &str) -> Result<InterfaceSample, GatewayError> {
        let output = self
            .shell
            .run(SAMPLE_SCRIPT, &[("VPNQOS_INTERFACE", Some(interface.to_string()))])?;
        parse_interface_output(&output)
    }

    fn detect_active(&self) -> Result<Option<String>, GatewayError> {
        let output = self.shell.run(DETECT_SCRIPT, &[])?;
        let name = output.lines().next().map(str::trim).unwrap_or_default();
        if name.is_empty() {
            debug!("No adapter reports status Up");
            Ok(None)
        } else {
            Ok(Some(name.to_string()))
        }
    }
}

/// Resolves the interface to monitor: explicit name, else first "up", else the default.
pub fn resolve_interface(explicit: Option<&str>, counters: &dyn InterfaceCounters) -> String {
    if let Some(name) = explicit.filter(|n| !n.trim().is_empty()) {
        return name.to_string();
    }
    match counters.detect_active() {
        Ok(Some(name)) => {
            info!("Detected active interface: {}", name);
            name
        }
        Ok(None) => {
            warn!(
                "No active network interface found. Using default '{}'.",
                DEFAULT_INTERFACE
            );
            DEFAULT_INTERFACE.to_string()
        }
        Err(e) => {
            error!("Failed to detect network interface: {}", e);
            DEFAULT_INTERFACE.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Result<Option<String>, ()>);

    impl InterfaceCounters for Fixed {
        fn sample(&self, _interface: &str) -> Result<InterfaceSample, GatewayError> {
            Ok(InterfaceSample::default())
        }
        fn detect_active(&self) -> Result<Option<String>, GatewayError> {
            self.0
                .clone()
                .map_err(|_| GatewayError::Unavailable("boom".into()))
        }
    }

    #[test]
    fn test_parse_interface_output() {
        let sample =
            parse_interface_output(r#"{"ReceivedBytes":123456,"SentBytes":7890}"#).unwrap();
        assert_eq!(sample.input_bytes, 123456);
        assert_eq!(sample.output_bytes, 7890);
    }

    #[test]
    fn test_parse_interface_output_empty() {
        assert!(matches!(
            parse_interface_output(""),
            Err(GatewayError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_resolve_interface_explicit_wins() {
        let counters = Fixed(Ok(Some("Wi-Fi".into())));
        assert_eq!(resolve_interface(Some("VPN"), &counters), "VPN");
    }

    #[test]
    fn test_resolve_interface_detects() {
        let counters = Fixed(Ok(Some("Wi-Fi".into())));
        assert_eq!(resolve_interface(None, &counters), "Wi-Fi");
        assert_eq!(resolve_interface(Some("  "), &counters), "Wi-Fi");
    }

    #[test]
    fn test_resolve_interface_falls_back() {
        assert_eq!(resolve_interface(None, &Fixed(Ok(None))), DEFAULT_INTERFACE);
        assert_eq!(resolve_interface(None, &Fixed(Err(()))), DEFAULT_INTERFACE);
    }
}
