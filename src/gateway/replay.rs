//! File-backed gateways.
//!
//! A replay file holds a sequence of recorded (or synthetic) ticks. The replay
//! gateways hand them out one per call so the monitor can run on machines
//! without the Windows QoS cmdlets. After the last tick the final one repeats.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::aggregator::PolicySample;
use crate::error::GatewayError;
use crate::gateway::interface::{InterfaceCounters, InterfaceSample};
use crate::gateway::policy::{PolicySpec, PolicyStore};

/// One recorded tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplayTick {
    pub policies: Vec<PolicySample>,
    #[serde(default)]
    pub interface: InterfaceSample,
}

/// Root structure of a replay file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayData {
    pub version: String,
    pub generated_at: String,
    #[serde(default)]
    pub interface: Option<String>,
    pub ticks: Vec<ReplayTick>,
}

impl ReplayData {
    fn tick(&self, index: usize) -> Option<&ReplayTick> {
        if self.ticks.is_empty() {
            return None;
        }
        self.ticks.get(index.min(self.ticks.len() - 1))
    }
}

/// Loads a replay file.
pub fn load_replay_data(path: &Path) -> Result<ReplayData, GatewayError> {
    debug!("Loading replay data from: {}", path.display());

    if !path.exists() {
        return Err(GatewayError::Unavailable(format!(
            "replay file not found: {}",
            path.display()
        )));
    }

    let content = fs::read_to_string(path)
        .map_err(|e| GatewayError::Unavailable(format!("failed to read replay file: {}", e)))?;
    let data: ReplayData = serde_json::from_str(&content)?;

    info!(
        "Loaded replay data version {} ({} ticks) generated at {}",
        data.version,
        data.ticks.len(),
        data.generated_at
    );
    Ok(data)
}

/// Policy store that replays recorded policy samples.
#[derive(Debug)]
pub struct ReplayPolicyStore {
    data: Arc<ReplayData>,
    prefix: String,
    cursor: AtomicUsize,
}

impl ReplayPolicyStore {
    pub fn new(data: Arc<ReplayData>, prefix: impl Into<String>) -> Self {
        Self {
            data,
            prefix: prefix.into(),
            cursor: AtomicUsize::new(0),
        }
    }
}

impl PolicyStore for ReplayPolicyStore {
    fn enumerate(&self) -> Result<Vec<PolicySample>, GatewayError> {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed);
        let Some(tick) = self.data.tick(index) else {
            return Ok(Vec::new());
        };
        Ok(tick
            .policies
            .iter()
            .filter(|p| p.policy_name.starts_with(&self.prefix))
            .cloned()
            .collect())
    }

    fn create(&self, spec: &PolicySpec) -> Result<(), GatewayError> {
        info!(
            "Replay mode: not creating policy {} (DSCP {}) for {}",
            spec.name, spec.dscp, spec.executable_path
        );
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<(), GatewayError> {
        info!("Replay mode: not removing policy {}", name);
        Ok(())
    }
}

/// Interface counters that replay recorded samples.
#[derive(Debug)]
pub struct ReplayInterfaceCounters {
    data: Arc<ReplayData>,
    cursor: AtomicUsize,
}

impl ReplayInterfaceCounters {
    pub fn new(data: Arc<ReplayData>) -> Self {
        Self {
            data,
            cursor: AtomicUsize::new(0),
        }
    }
}

impl InterfaceCounters for ReplayInterfaceCounters {
    fn sample(&self, _interface: &str) -> Result<InterfaceSample, GatewayError> {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .data
            .tick(index)
            .map(|t| t.interface)
            .unwrap_or_default())
    }

    fn detect_active(&self) -> Result<Option<String>, GatewayError> {
        Ok(self.data.interface.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> Arc<ReplayData> {
        Arc::new(ReplayData {
            version: "1.0".into(),
            generated_at: "2026-01-01T00:00:00Z".into(),
            interface: Some("Ethernet 2".into()),
            ticks: vec![
                ReplayTick {
                    policies: vec![
                        PolicySample::new("Auto_zoom", 10),
                        PolicySample::new("Other_policy", 99),
                    ],
                    interface: InterfaceSample {
                        input_bytes: 1,
                        output_bytes: 2,
                    },
                },
                ReplayTick {
                    policies: vec![PolicySample::new("Auto_zoom", 20)],
                    interface: InterfaceSample {
                        input_bytes: 3,
                        output_bytes: 4,
                    },
                },
            ],
        })
    }

    #[test]
    fn test_replay_filters_prefix_and_advances() {
        let store = ReplayPolicyStore::new(data(), "Auto_");
        let first = store.enumerate().unwrap();
        assert_eq!(first, vec![PolicySample::new("Auto_zoom", 10)]);
        let second = store.enumerate().unwrap();
        assert_eq!(second[0].observed_bytes, 20);
        // Last tick repeats
        let third = store.enumerate().unwrap();
        assert_eq!(third[0].observed_bytes, 20);
    }

    #[test]
    fn test_replay_interface() {
        let counters = ReplayInterfaceCounters::new(data());
        assert_eq!(counters.detect_active().unwrap().as_deref(), Some("Ethernet 2"));
        assert_eq!(counters.sample("x").unwrap().input_bytes, 1);
        assert_eq!(counters.sample("x").unwrap().output_bytes, 4);
    }

    #[test]
    fn test_empty_replay() {
        let empty = Arc::new(ReplayData {
            version: "1.0".into(),
            generated_at: String::new(),
            interface: None,
            ticks: Vec::new(),
        });
        assert!(ReplayPolicyStore::new(Arc::clone(&empty), "Auto_")
            .enumerate()
            .unwrap()
            .is_empty());
        assert_eq!(
            ReplayInterfaceCounters::new(empty).sample("x").unwrap(),
            InterfaceSample::default()
        );
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_replay_data(&dir.path().join("missing.json")),
            Err(GatewayError::Unavailable(_))
        ));
    }

    #[test]
    fn test_load_malformed_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        fs::write(file.path(), "{ not json").unwrap();
        assert!(matches!(
            load_replay_data(file.path()),
            Err(GatewayError::MalformedPayload(_))
        ));
    }
}
