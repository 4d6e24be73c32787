//! Priority tier definitions and policy classification.
//!
//! This module provides:
//! - `document`: the tier-definition document (tier name → applications)
//! - `classifier`: the policy-name / DSCP → tier lookup used by the monitor

pub mod classifier;
pub mod document;

// Re-export commonly used types
pub use classifier::{classify, normalize_key, ClassificationMap, ClassifyBy, MapOptions};
pub use document::{
    builtin_tiers, load_tier_document, load_tiers_or_empty, normalize_app_name, Application,
    PriorityTier, TierDocument, DEFAULT_POLICY_PREFIX, MAX_DSCP,
};
