//! Policy Store gateway.
//!
//! Enumerates the QoS policies installed under this tool's naming convention
//! and creates or deletes them by name.

use serde::Deserialize;
use tracing::{debug, info, trace};

use crate::aggregator::PolicySample;
use crate::error::GatewayError;
use crate::gateway::powershell::{OneOrMany, PowerShell};
use crate::tiers::{DEFAULT_POLICY_PREFIX, MAX_DSCP};

/// Parameters of a policy to install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicySpec {
    pub name: String,
    pub executable_path: String,
    pub dscp: u8,
    pub throttle_bits_per_second: Option<u64>,
}

/// Access to the operating system's named QoS policies.
pub trait PolicyStore: Send {
    /// Lists installed policies whose name carries the store's prefix.
    fn enumerate(&self) -> Result<Vec<PolicySample>, GatewayError>;

    /// Installs `spec`, replacing any policy of the same name.
    fn create(&self, spec: &PolicySpec) -> Result<(), GatewayError>;

    /// Removes the named policy. Removing an absent policy succeeds.
    fn delete(&self, name: &str) -> Result<(), GatewayError>;
}

const ENUMERATE_SCRIPT: &str = r#"
$ErrorActionPreference = 'Stop'
$prefix = $env:VPNQOS_PREFIX
$flows = @()
try {
    $flows = @((Get-Counter '\Pacer Flow(*)\Bytes transmitted').CounterSamples | ForEach-Object {
        [pscustomobject]@{ Name = $_.InstanceName; Bytes = [double]$_.CookedValue }
    })
} catch { }
$policies = @(Get-NetQosPolicy | Where-Object { $_.Name.StartsWith($prefix) } | ForEach-Object {
    [pscustomobject]@{
        Name = $_.Name
        DSCPAction = $_.DSCPAction
        ThrottleRateActionBitsPerSecond = $_.ThrottleRateActionBitsPerSecond
    }
})
ConvertTo-Json -InputObject @{ Policies = $policies; Flows = $flows } -Depth 3 -Compress
"#;

const CREATE_SCRIPT: &str = r#"
$ErrorActionPreference = 'Stop'
$name = $env:VPNQOS_POLICY_NAME
if (Get-NetQosPolicy -Name $name -ErrorAction SilentlyContinue) {
    Remove-NetQosPolicy -Name $name -Confirm:$false
}
$params = @{
    Name = $name
    AppPathNameMatchCondition = $env:VPNQOS_APP_PATH
    IPProtocolMatchCondition = 'Both'
    DSCPAction = [sbyte]$env:VPNQOS_DSCP
    NetworkProfile = 'All'
}
if ($env:VPNQOS_THROTTLE_BPS) {
    $params.ThrottleRateActionBitsPerSecond = [uint64]$env:VPNQOS_THROTTLE_BPS
}
New-NetQosPolicy @params | Out-Null
"#;

const DELETE_SCRIPT: &str = r#"
$ErrorActionPreference = 'Stop'
$name = $env:VPNQOS_POLICY_NAME
if (Get-NetQosPolicy -Name $name -ErrorAction SilentlyContinue) {
    Remove-NetQosPolicy -Name $name -Confirm:$false
}
"#;

/// One policy row of the enumerate script's JSON output.
#[derive(Debug, Deserialize)]
struct RawPolicy {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "DSCPAction", default)]
    dscp_action: Option<i64>,
    #[serde(rename = "ThrottleRateActionBitsPerSecond", default)]
    throttle_rate: Option<u64>,
}

/// One Pacer Flow counter instance.
#[derive(Debug, Deserialize)]
struct RawFlow {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Bytes", default)]
    bytes: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawEnumeration {
    #[serde(rename = "Policies", default)]
    policies: Option<OneOrMany<RawPolicy>>,
    #[serde(rename = "Flows", default)]
    flows: Option<OneOrMany<RawFlow>>,
}

impl From<RawPolicy> for PolicySample {
    fn from(raw: RawPolicy) -> Self {
        PolicySample {
            policy_name: raw.name,
            // -1 is "no DSCP action"
            dscp: raw
                .dscp_action
                .filter(|d| (0..=MAX_DSCP as i64).contains(d))
                .map(|d| d as u8),
            throttle_bits_per_second: raw.throttle_rate.filter(|&t| t > 0),
            observed_bytes: 0,
        }
    }
}

/// Adds each flow's bytes to the one policy with the longest name contained
/// in the flow instance name, so no flow is counted twice.
fn attribute_flows(samples: &mut [PolicySample], flows: &[RawFlow]) {
    let needles: Vec<String> = samples
        .iter()
        .map(|s| s.policy_name.to_lowercase())
        .collect();

    for flow in flows {
        let bytes = flow.bytes.filter(|b| b.is_finite() && *b > 0.0).unwrap_or(0.0) as u64;
        if bytes == 0 {
            continue;
        }
        let instance = flow.name.to_lowercase();
        let owner = needles
            .iter()
            .enumerate()
            .filter(|(_, needle)| !needle.is_empty() && instance.contains(needle.as_str()))
            .max_by_key(|(_, needle)| needle.len())
            .map(|(i, _)| i);

        match owner {
            Some(i) => {
                samples[i].observed_bytes = samples[i].observed_bytes.saturating_add(bytes)
            }
            None => trace!("Flow {} matches no policy", flow.name),
        }
    }
}

/// Parses the enumerate script's output into policy samples.
pub fn parse_policy_output(output: &str) -> Result<Vec<PolicySample>, GatewayError> {
    let output = output.trim();
    if output.is_empty() || output == "null" {
        return Ok(Vec::new());
    }

    let raw: RawEnumeration = serde_json::from_str(output)?;
    let mut samples: Vec<PolicySample> = raw
        .policies
        .map(OneOrMany::into_vec)
        .unwrap_or_default()
        .into_iter()
        .map(PolicySample::from)
        .collect();
    let flows = raw.flows.map(OneOrMany::into_vec).unwrap_or_default();
    attribute_flows(&mut samples, &flows);
    Ok(samples)
}

/// Policy store backed by the `NetQos` PowerShell cmdlets.
#[derive(Debug, Clone)]
pub struct PowerShellPolicyStore {
    shell: PowerShell,
    prefix: String,
}

impl PowerShellPolicyStore {
    pub fn new(shell: PowerShell, prefix: impl Into<String>) -> Self {
        Self {
            shell,
            prefix: prefix.into(),
        }
    }
}

impl Default for PowerShellPolicyStore {
    fn default() -> Self {
        Self::new(PowerShell::default(), DEFAULT_POLICY_PREFIX)
    }
}

impl PolicyStore for PowerShellPolicyStore {
    fn enumerate(&self) -> Result<Vec<PolicySample>, GatewayError> {
        let output = self
            .shell
            .run(ENUMERATE_SCRIPT, &[("VPNQOS_PREFIX", Some(self.prefix.clone()))])?;
        let samples = parse_policy_output(&output)?;
        debug!("Enumerated {} policies with prefix {}", samples.len(), self.prefix);
        Ok(samples)
    }

    fn create(&self, spec: &PolicySpec) -> Result<(), GatewayError> {
        self.shell.run(
            CREATE_SCRIPT,
            &[
                ("VPNQOS_POLICY_NAME", Some(spec.name.clone())),
                ("VPNQOS_APP_PATH", Some(spec.executable_path.clone())),
                ("VPNQOS_DSCP", Some(spec.dscp.to_string())),
                (
                    "VPNQOS_THROTTLE_BPS",
                    spec.throttle_bits_per_second.map(|t| t.to_string()),
                ),
            ],
        )?;
        info!(
            "Created policy {} (DSCP {}) for {}",
            spec.name, spec.dscp, spec.executable_path
        );
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<(), GatewayError> {
        self.shell
            .run(DELETE_SCRIPT, &[("VPNQOS_POLICY_NAME", Some(name.to_string()))])?;
        info!("Removed policy {}", name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_policies_and_flows() {
        let out = r#"{"Policies":[
            {"Name":"Auto_zoom","DSCPAction":46,"ThrottleRateActionBitsPerSecond":0},
            {"Name":"Auto_steam","DSCPAction":10,"ThrottleRateActionBitsPerSecond":10000000}
        ],"Flows":[
            {"Name":"auto_zoom-0001","Bytes":1000.0},
            {"Name":"Auto_Steam-0002","Bytes":500},
            {"Name":"unrelated-flow","Bytes":77}
        ]}"#;
        let samples = parse_policy_output(out).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].policy_name, "Auto_zoom");
        assert_eq!(samples[0].dscp, Some(46));
        assert_eq!(samples[0].throttle_bits_per_second, None);
        assert_eq!(samples[0].observed_bytes, 1000);
        assert_eq!(samples[1].throttle_bits_per_second, Some(10_000_000));
        assert_eq!(samples[1].observed_bytes, 500);
    }

    #[test]
    fn test_overlapping_names_count_each_flow_once() {
        let out = r#"{"Policies":[
            {"Name":"Auto_discord","DSCPAction":46},
            {"Name":"Auto_discordptb","DSCPAction":46},
            {"Name":"Auto_obs","DSCPAction":28}
        ],"Flows":[
            {"Name":"auto_discordptb-0001","Bytes":100},
            {"Name":"auto_discord-0002","Bytes":40},
            {"Name":"auto_obsstudio-0003","Bytes":5}
        ]}"#;
        let samples = parse_policy_output(out).unwrap();
        let bytes: Vec<u64> = samples.iter().map(|s| s.observed_bytes).collect();
        assert_eq!(bytes, vec![40, 100, 5]);
        assert_eq!(bytes.iter().sum::<u64>(), 145);
    }

    #[test]
    fn test_parse_single_policy_with_missing_fields() {
        let samples =
            parse_policy_output(r#"{"Policies":{"Name":"Auto_obs","DSCPAction":-1},"Flows":[]}"#)
                .unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].dscp, None);
        assert_eq!(samples[0].observed_bytes, 0);
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_policy_output(r#"{"Policies":[],"Flows":[]}"#)
            .unwrap()
            .is_empty());
        assert!(parse_policy_output("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_wrong_shape() {
        assert!(matches!(
            parse_policy_output("Get-NetQosPolicy : Access denied"),
            Err(GatewayError::MalformedPayload(_))
        ));
    }
}
