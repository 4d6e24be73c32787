//! Integration tests for tier classification and aggregation.
//!
//! These tests verify byte conservation, share normalization and tick
//! independence across realistic sample sets built from the built-in tiers.

use vpn_qos::aggregator::total_bytes;
use vpn_qos::tiers::{builtin_tiers, MapOptions};
use vpn_qos::{aggregate, classify, compute_shares, ClassificationMap, ClassifyBy, PolicySample};

fn mixed_samples() -> Vec<PolicySample> {
    vec![
        PolicySample::new("Auto_zoom", 4_000),
        PolicySample::new("Auto_discord", 1_500),
        PolicySample::new("Auto_teams", 0),
        PolicySample::new("Auto_leagueoflegends", 2_250),
        PolicySample::new("Auto_obs", 333),
        PolicySample::new("Auto_steam", 17).with_throttle(5_000_000),
        PolicySample::new("Auto_notepad", 123_456),
        PolicySample::new("Other_zoom", 99),
    ]
}

fn builtin_map() -> ClassificationMap {
    ClassificationMap::from_document(&builtin_tiers(), &MapOptions::default())
}

#[test]
fn test_classified_bytes_land_in_exactly_one_tier() {
    let map = builtin_map();
    let samples = mixed_samples();
    let aggregates = aggregate(&samples, &map);

    for sample in samples.iter().filter(|s| classify(s, &map).is_some()) {
        let tier = classify(sample, &map).unwrap();
        let holders: Vec<_> = aggregates.iter().filter(|a| a.tier == tier).collect();
        assert_eq!(holders.len(), 1, "tier {} reported more than once", tier);
    }
}

#[test]
fn test_unclassified_samples_do_not_change_totals() {
    let map = builtin_map();
    let samples = mixed_samples();
    let classified: Vec<PolicySample> = samples
        .iter()
        .filter(|s| classify(s, &map).is_some())
        .cloned()
        .collect();

    assert_eq!(
        aggregate(&samples, &map),
        aggregate(&classified, &map)
    );
}

#[test]
fn test_conservation() {
    let map = builtin_map();
    let samples = mixed_samples();
    let expected: u64 = samples
        .iter()
        .filter(|s| classify(s, &map).is_some())
        .map(|s| s.observed_bytes)
        .sum();

    let aggregates = aggregate(&samples, &map);
    assert_eq!(total_bytes(&aggregates), expected);
    assert_eq!(expected, 4_000 + 1_500 + 2_250 + 333 + 17);
}

#[test]
fn test_shares_sum_to_100() {
    let map = builtin_map();
    let aggregates = aggregate(&mixed_samples(), &map);
    let shares = compute_shares(&aggregates).expect("traffic observed");

    let sum: f64 = shares.iter().map(|s| s.percent).sum();
    assert!((sum - 100.0).abs() <= 0.01, "shares sum to {}", sum);
    assert_eq!(shares.len(), aggregates.len());
}

#[test]
fn test_zero_traffic_emits_no_shares() {
    let map = builtin_map();
    let samples = vec![
        PolicySample::new("Auto_zoom", 0),
        PolicySample::new("Auto_steam", 0),
    ];
    let aggregates = aggregate(&samples, &map);
    assert_eq!(aggregates.len(), 2);
    assert!(compute_shares(&aggregates).is_none());
}

#[test]
fn test_empty_inputs() {
    let map = ClassificationMap::default();
    let aggregates = aggregate(&[], &map);
    assert!(aggregates.is_empty());
    assert_eq!(total_bytes(&aggregates), 0);
    assert!(compute_shares(&aggregates).is_none());
}

#[test]
fn test_tick_independence() {
    let map = builtin_map();
    let samples = mixed_samples();
    let first = aggregate(&samples, &map);
    let second = aggregate(&samples, &map);
    assert_eq!(first, second);
}

#[test]
fn test_end_to_end_example() {
    let map = ClassificationMap::from_pairs([("Auto_zoomexe", "Ultra High"), ("Auto_steamexe", "Low")]);
    let samples = vec![
        PolicySample::new("Auto_zoomexe", 1000),
        PolicySample::new("Auto_steamexe", 500).with_throttle(10_000_000),
        PolicySample::new("Auto_unknown", 9999),
    ];

    let aggregates = aggregate(&samples, &map);
    assert_eq!(aggregates.len(), 2);
    assert_eq!(&*aggregates[0].tier, "Ultra High");
    assert_eq!(aggregates[0].bytes, 1000);
    assert_eq!(aggregates[0].bandwidth_limit_mbps, 0.0);
    assert_eq!(&*aggregates[1].tier, "Low");
    assert_eq!(aggregates[1].bytes, 500);
    assert_eq!(aggregates[1].bandwidth_limit_mbps, 10.0);
    assert_eq!(total_bytes(&aggregates), 1500);

    let shares = compute_shares(&aggregates).unwrap();
    assert!((shares[0].percent - 66.67).abs() < 0.01);
    assert!((shares[1].percent - 33.33).abs() < 0.01);
}

#[test]
fn test_dscp_classification_from_document() {
    let options = MapOptions {
        classify_by: ClassifyBy::Dscp,
        ..MapOptions::default()
    };
    let map = ClassificationMap::from_document(&builtin_tiers(), &options);
    let samples = vec![
        PolicySample::new("Auto_anything", 700).with_dscp(46),
        PolicySample::new("Auto_other", 300).with_dscp(10),
        PolicySample::new("Auto_unmarked", 1_000),
    ];

    let aggregates = aggregate(&samples, &map);
    let tiers: Vec<&str> = aggregates.iter().map(|a| &*a.tier).collect();
    assert_eq!(tiers, vec!["Ultra High", "Low"]);
    assert_eq!(total_bytes(&aggregates), 1_000);
}
