//! Per-tick tier aggregation.
//!
//! Policy samples are grouped by their resolved tier, byte counts are summed
//! and each tier's share of the classified total is computed. Nothing here
//! keeps state between ticks.

use ahash::AHashMap as HashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::tiers::{classify, ClassificationMap};

/// Bits per second in one unit of `bandwidth_limit_mbps`.
pub const BITS_PER_MBPS: f64 = 1_000_000.0;

/// One installed policy as observed at poll time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySample {
    pub policy_name: String,
    #[serde(default)]
    pub dscp: Option<u8>,
    #[serde(default)]
    pub throttle_bits_per_second: Option<u64>,
    #[serde(default)]
    pub observed_bytes: u64,
}

impl PolicySample {
    pub fn new(policy_name: impl Into<String>, observed_bytes: u64) -> Self {
        Self {
            policy_name: policy_name.into(),
            dscp: None,
            throttle_bits_per_second: None,
            observed_bytes,
        }
    }

    pub fn with_throttle(mut self, bits_per_second: u64) -> Self {
        self.throttle_bits_per_second = Some(bits_per_second);
        self
    }

    pub fn with_dscp(mut self, dscp: u8) -> Self {
        self.dscp = Some(dscp);
        self
    }
}

/// Totals for one tier within one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierAggregate {
    pub tier: Arc<str>,
    pub bytes: u64,
    /// Highest throttle seen for the tier, in megabits per second. 0 means none.
    pub bandwidth_limit_mbps: f64,
    /// Number of samples that contributed.
    pub policies: usize,
}

impl TierAggregate {
    fn new(tier: Arc<str>) -> Self {
        Self {
            tier,
            bytes: 0,
            bandwidth_limit_mbps: 0.0,
            policies: 0,
        }
    }

    /// True when no throttle is configured; the tier is classified by marking only.
    pub fn is_unlimited(&self) -> bool {
        self.bandwidth_limit_mbps <= 0.0
    }
}

/// A tier's percentage of classified traffic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierShare {
    pub tier: Arc<str>,
    pub percent: f64,
}

/// Groups samples by tier and sums their bytes.
///
/// Unclassified samples are dropped. The result is in configuration order,
/// and only tiers with at least one classified sample are present.
pub fn aggregate(samples: &[PolicySample], map: &ClassificationMap) -> Vec<TierAggregate> {
    let mut by_tier: HashMap<Arc<str>, TierAggregate> = HashMap::new();

    for sample in samples {
        let Some(tier) = classify(sample, map) else {
            continue;
        };

        let entry = by_tier
            .entry(Arc::clone(&tier))
            .or_insert_with(|| TierAggregate::new(tier));
        entry.bytes = entry.bytes.saturating_add(sample.observed_bytes);
        entry.policies += 1;

        if let Some(bps) = sample.throttle_bits_per_second {
            let mbps = bps as f64 / BITS_PER_MBPS;
            if mbps > entry.bandwidth_limit_mbps {
                entry.bandwidth_limit_mbps = mbps;
            }
        }
    }

    let mut aggregates: Vec<TierAggregate> = by_tier.into_values().collect();
    aggregates.sort_by(|a, b| {
        let ia = map.tier_index(&a.tier).unwrap_or(usize::MAX);
        let ib = map.tier_index(&b.tier).unwrap_or(usize::MAX);
        ia.cmp(&ib).then_with(|| a.tier.cmp(&b.tier))
    });
    aggregates
}

/// Sum of bytes over all aggregates.
pub fn total_bytes(aggregates: &[TierAggregate]) -> u64 {
    aggregates
        .iter()
        .fold(0u64, |acc, a| acc.saturating_add(a.bytes))
}

/// Computes each tier's share of the total. Returns `None` when the total is 0.
pub fn compute_shares(aggregates: &[TierAggregate]) -> Option<Vec<TierShare>> {
    let total = total_bytes(aggregates);
    if total == 0 {
        return None;
    }

    Some(
        aggregates
            .iter()
            .map(|a| TierShare {
                tier: Arc::clone(&a.tier),
                percent: a.bytes as f64 / total as f64 * 100.0,
            })
            .collect(),
    )
}
