//! Integration tests for monitoring sessions over replay files.
//!
//! A replay file is written to a temp dir, loaded through the public
//! gateway API and driven through a full session.

use std::sync::Arc;
use std::time::Duration;

use vpn_qos::gateway::{
    load_replay_data, resolve_interface, InterfaceSample, ReplayData, ReplayInterfaceCounters,
    ReplayPolicyStore, ReplayTick,
};
use vpn_qos::report::{render, OutputFormat};
use vpn_qos::tiers::{builtin_tiers, MapOptions};
use vpn_qos::{run_session, ClassificationMap, GatewayError, PolicySample, SessionOptions};

fn replay_file(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let data = ReplayData {
        version: "1.0".into(),
        generated_at: "2026-10-01T12:00:00Z".into(),
        interface: Some("Ethernet 2".into()),
        ticks: vec![
            ReplayTick {
                policies: vec![
                    PolicySample::new("Auto_zoom", 1_000).with_dscp(46),
                    PolicySample::new("Auto_steam", 500)
                        .with_dscp(10)
                        .with_throttle(10_000_000),
                    PolicySample::new("Auto_unlisted1", 9_999),
                ],
                interface: InterfaceSample {
                    input_bytes: 10_000,
                    output_bytes: 2_000,
                },
            },
            ReplayTick {
                policies: vec![
                    PolicySample::new("Auto_zoom", 3_000).with_dscp(46),
                    PolicySample::new("Auto_steam", 1_000)
                        .with_dscp(10)
                        .with_throttle(10_000_000),
                ],
                interface: InterfaceSample {
                    input_bytes: 20_000,
                    output_bytes: 4_000,
                },
            },
        ],
    };

    let path = dir.path().join("replay.json");
    std::fs::write(&path, serde_json::to_string_pretty(&data).unwrap()).unwrap();
    path
}

#[test]
fn test_replay_session_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let data = Arc::new(load_replay_data(&replay_file(&dir)).unwrap());

    let counters = ReplayInterfaceCounters::new(Arc::clone(&data));
    let interface = resolve_interface(None, &counters);
    assert_eq!(interface, "Ethernet 2");

    let map = Arc::new(ClassificationMap::from_document(
        &builtin_tiers(),
        &MapOptions::default(),
    ));
    let mut session = run_session(
        Box::new(ReplayPolicyStore::new(Arc::clone(&data), "Auto_")),
        Box::new(counters),
        map,
        SessionOptions {
            interface,
            tick_interval: Duration::from_millis(1),
            duration: Some(Duration::from_millis(3)),
        },
    );

    let reports: Vec<_> = session.by_ref().collect();
    assert_eq!(reports.len(), 3);

    let first = &reports[0];
    assert_eq!(first.total_bytes, 1_500);
    assert_eq!(first.unclassified_policies, 1);
    assert_eq!(&*first.aggregates[0].tier, "Ultra High");
    assert_eq!(first.aggregates[1].bandwidth_limit_mbps, 10.0);
    assert_eq!(first.interface_sample.input_bytes, 10_000);

    // Counters are reported as cumulative totals
    assert_eq!(reports[1].total_bytes, 4_000);
    assert_eq!(reports[2].total_bytes, 4_000);
    assert_eq!(session.stats().ticks, 3);
    assert_eq!(session.stats().unclassified_samples, 1);

    let text = render(first, OutputFormat::Text).unwrap();
    assert!(text.contains("Ultra High Priority"));
    assert!(text.contains("Bandwidth Allocation:"));
    assert!(text.contains("Interface Statistics (Ethernet 2):"));

    let json = render(first, OutputFormat::Json).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["total_bytes"], 1_500);
}

#[test]
fn test_missing_replay_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_replay_data(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, GatewayError::Unavailable(_)));
}

#[test]
fn test_malformed_replay_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(
        load_replay_data(&path),
        Err(GatewayError::MalformedPayload(_))
    ));
}
