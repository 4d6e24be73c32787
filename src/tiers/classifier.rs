//! Policy classification into priority tiers.
//!
//! A `ClassificationMap` is built once from the tier document and held for the
//! whole monitoring session. Policies are looked up either by their generated
//! policy name or by their DSCP marking.

use ahash::AHashMap as HashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::aggregator::PolicySample;
use crate::tiers::document::{TierDocument, DEFAULT_POLICY_PREFIX};

/// Which attribute of a policy selects its tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ClassifyBy {
    /// Match the policy name against `<prefix><application>`.
    #[default]
    Name,
    /// Match the policy's DSCP action against each tier's DSCP value.
    Dscp,
}

/// Options used when building a map from a tier document.
#[derive(Debug, Clone)]
pub struct MapOptions {
    pub prefix: String,
    pub classify_by: ClassifyBy,
    /// Compare policy names lower-cased with whitespace removed.
    pub normalize: bool,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_POLICY_PREFIX.to_string(),
            classify_by: ClassifyBy::Name,
            normalize: false,
        }
    }
}

/// Immutable policy → tier lookup.
#[derive(Debug, Clone, Default)]
pub struct ClassificationMap {
    by_policy: HashMap<Arc<str>, Arc<str>>,
    by_dscp: HashMap<u8, Arc<str>>,
    tier_order: Vec<Arc<str>>,
    classify_by: ClassifyBy,
    normalize: bool,
}

/// Lower-cases a policy name and strips whitespace.
pub fn normalize_key(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

impl ClassificationMap {
    /// Builds the map from a tier document.
    pub fn from_document(doc: &TierDocument, options: &MapOptions) -> Self {
        let mut map = ClassificationMap {
            classify_by: options.classify_by,
            normalize: options.normalize,
            ..Default::default()
        };

        for tier in &doc.priority_levels {
            let tier_arc: Arc<str> = Arc::from(tier.name.as_str());
            map.tier_order.push(Arc::clone(&tier_arc));

            if let Some(dscp) = tier.dscp {
                map.by_dscp.insert(dscp, Arc::clone(&tier_arc));
            }

            for app in &tier.applications {
                let policy = app.policy_name(&options.prefix);
                map.insert_policy(&policy, &tier_arc);
            }
        }

        debug!(
            "Classification map built: {} policies, {} DSCP values, {} tiers",
            map.by_policy.len(),
            map.by_dscp.len(),
            map.tier_order.len()
        );
        map
    }

    /// Builds a name-keyed map from explicit (policy name, tier) pairs.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut map = ClassificationMap::default();
        for (policy, tier) in pairs {
            let tier_arc = map.intern_tier(tier);
            map.insert_policy(policy, &tier_arc);
        }
        map
    }

    /// Builds a DSCP-keyed map from explicit (dscp, tier) pairs.
    pub fn from_dscp_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (u8, &'a str)>,
    {
        let mut map = ClassificationMap {
            classify_by: ClassifyBy::Dscp,
            ..Default::default()
        };
        for (dscp, tier) in pairs {
            let tier_arc = map.intern_tier(tier);
            map.by_dscp.insert(dscp, tier_arc);
        }
        map
    }

    fn intern_tier(&mut self, tier: &str) -> Arc<str> {
        if let Some(existing) = self.tier_order.iter().find(|t| t.as_ref() == tier) {
            return Arc::clone(existing);
        }
        let tier_arc: Arc<str> = Arc::from(tier);
        self.tier_order.push(Arc::clone(&tier_arc));
        tier_arc
    }

    fn insert_policy(&mut self, policy: &str, tier: &Arc<str>) {
        let key: Arc<str> = if self.normalize {
            Arc::from(normalize_key(policy))
        } else {
            Arc::from(policy)
        };

        // An application listed under two tiers keeps its first tier
        if let Some(existing) = self.by_policy.get(&key) {
            if existing != tier {
                warn!(
                    "Policy {} already mapped to tier '{}', ignoring tier '{}'",
                    policy, existing, tier
                );
            }
            return;
        }
        self.by_policy.insert(key, Arc::clone(tier));
    }

    /// Resolves a policy sample to its tier, if any.
    pub fn tier_for(&self, sample: &PolicySample) -> Option<Arc<str>> {
        match self.classify_by {
            ClassifyBy::Name => {
                let tier = if self.normalize {
                    self.by_policy
                        .get(normalize_key(&sample.policy_name).as_str())
                } else {
                    self.by_policy.get(sample.policy_name.as_str())
                };
                tier.map(Arc::clone)
            }
            ClassifyBy::Dscp => sample
                .dscp
                .and_then(|d| self.by_dscp.get(&d))
                .map(Arc::clone),
        }
    }

    /// Position of a tier in configuration order.
    pub fn tier_index(&self, tier: &str) -> Option<usize> {
        self.tier_order.iter().position(|t| t.as_ref() == tier)
    }

    /// Tier names in configuration order.
    pub fn tiers(&self) -> &[Arc<str>] {
        &self.tier_order
    }

    pub fn classify_by(&self) -> ClassifyBy {
        self.classify_by
    }

    /// Number of entries usable under the active classification key.
    pub fn len(&self) -> usize {
        match self.classify_by {
            ClassifyBy::Name => self.by_policy.len(),
            ClassifyBy::Dscp => self.by_dscp.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolves `sample` against `map`; `None` means the sample is dropped.
pub fn classify(sample: &PolicySample, map: &ClassificationMap) -> Option<Arc<str>> {
    map.tier_for(sample)
}
