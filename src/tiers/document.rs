//! Tier-definition document loading.
//!
//! The document is JSON of the form
//! `{ "priority_levels": [ { "name": "...", "applications": [ { "name": "..." } ] } ] }`.
//! A built-in document is embedded for machines without a tier file.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{error, info, warn};

use crate::error::TierConfigError;

/// Prefix of every policy this tool installs.
pub const DEFAULT_POLICY_PREFIX: &str = "Auto_";

/// Highest valid DSCP code point.
pub const MAX_DSCP: u8 = 63;

/// One application listed under a tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    /// Display name, also the source of the policy name.
    pub name: String,
    /// Executable image name matched against the process table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<String>,
}

impl Application {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            executable: None,
        }
    }

    /// Policy name for this application: prefix + normalized display name.
    pub fn policy_name(&self, prefix: &str) -> String {
        format!("{}{}", prefix, normalize_app_name(&self.name))
    }

    /// Executable image name, derived from the display name when not configured.
    pub fn executable_name(&self) -> String {
        if let Some(exe) = &self.executable {
            return exe.clone();
        }
        if self.name.to_ascii_lowercase().ends_with(".exe") {
            self.name.clone()
        } else {
            format!("{}.exe", normalize_app_name(&self.name))
        }
    }

    /// True if `query` names this application by display name, executable or normalized form.
    pub fn matches(&self, query: &str) -> bool {
        let q = normalize_app_name(query);
        q == normalize_app_name(&self.name) || q == normalize_app_name(&self.executable_name())
    }
}

/// A named QoS class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityTier {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dscp: Option<u8>,
    #[serde(
        default,
        alias = "throttle_bps",
        skip_serializing_if = "Option::is_none"
    )]
    pub throttle_bits_per_second: Option<u64>,
    #[serde(default)]
    pub applications: Vec<Application>,
}

/// Root of the tier-definition document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierDocument {
    pub priority_levels: Vec<PriorityTier>,
}

impl TierDocument {
    /// Parses and validates a document from a JSON string.
    pub fn from_json(content: &str) -> Result<Self, TierConfigError> {
        let doc: TierDocument =
            serde_json::from_str(content).map_err(|e| TierConfigError::Invalid(e.to_string()))?;
        doc.validate()?;
        Ok(doc)
    }

    /// Structural checks: unique tier names, DSCP in range and unique per tier.
    pub fn validate(&self) -> Result<(), TierConfigError> {
        let mut names = HashSet::new();
        let mut dscps = HashSet::new();

        for tier in &self.priority_levels {
            if tier.name.trim().is_empty() {
                return Err(TierConfigError::Invalid("tier with empty name".into()));
            }
            if !names.insert(tier.name.as_str()) {
                return Err(TierConfigError::Invalid(format!(
                    "duplicate tier '{}'",
                    tier.name
                )));
            }
            if let Some(dscp) = tier.dscp {
                if dscp > MAX_DSCP {
                    return Err(TierConfigError::Invalid(format!(
                        "tier '{}' has DSCP {} (must be 0-{})",
                        tier.name, dscp, MAX_DSCP
                    )));
                }
                if !dscps.insert(dscp) {
                    return Err(TierConfigError::Invalid(format!(
                        "DSCP {} is assigned to more than one tier",
                        dscp
                    )));
                }
            }
            if tier.applications.iter().any(|a| a.name.trim().is_empty()) {
                return Err(TierConfigError::Invalid(format!(
                    "tier '{}' lists an application with an empty name",
                    tier.name
                )));
            }
        }
        Ok(())
    }

    /// Finds the application matching `query` and the tier it belongs to.
    pub fn find_application(&self, query: &str) -> Option<(&PriorityTier, &Application)> {
        self.priority_levels.iter().find_map(|tier| {
            tier.applications
                .iter()
                .find(|app| app.matches(query))
                .map(|app| (tier, app))
        })
    }

    /// All (tier, application) pairs in document order.
    pub fn applications(&self) -> impl Iterator<Item = (&PriorityTier, &Application)> {
        self.priority_levels
            .iter()
            .flat_map(|tier| tier.applications.iter().map(move |app| (tier, app)))
    }
}

/// Lower-cases a display name and strips whitespace and dots.
///
/// `"Zoom.exe"` becomes `"zoomexe"`, `"League of Legends"` becomes `"leagueoflegends"`.
pub fn normalize_app_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '.')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Built-in tier document embedded at compile time.
static BUILTIN_TIERS: Lazy<TierDocument> = Lazy::new(|| {
    let content = include_str!("../../data/priority_tiers.json");
    match TierDocument::from_json(content) {
        Ok(doc) => doc,
        Err(e) => {
            error!("Built-in tier document is invalid: {}", e);
            TierDocument::default()
        }
    }
});

/// Copy of the built-in tier document.
pub fn builtin_tiers() -> TierDocument {
    BUILTIN_TIERS.clone()
}

/// Loads the tier document from `path`, or the built-in one when no path is given.
pub fn load_tier_document(path: Option<&Path>) -> Result<TierDocument, TierConfigError> {
    let Some(path) = path else {
        return Ok(builtin_tiers());
    };

    if !path.exists() {
        return Err(TierConfigError::Missing(path.to_path_buf()));
    }

    let content = fs::read_to_string(path)
        .map_err(|e| TierConfigError::Invalid(format!("{}: {}", path.display(), e)))?;
    let doc = TierDocument::from_json(&content)?;

    info!(
        "Loaded {} priority tiers from {}",
        doc.priority_levels.len(),
        path.display()
    );
    Ok(doc)
}

/// Like [`load_tier_document`], but logs failures and yields an empty document.
pub fn load_tiers_or_empty(path: Option<&Path>) -> TierDocument {
    match load_tier_document(path) {
        Ok(doc) => doc,
        Err(e) => {
            warn!("{} - every policy will be unclassified", e);
            TierDocument::default()
        }
    }
}
