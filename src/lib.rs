//! vpn-qos library
//!
//! Core of the `vpn-qos` tool: per-application DSCP QoS policies and a tier
//! traffic monitor for Windows policy-based QoS. The binary wraps this library
//! with a CLI; everything here is usable (and testable) on its own.
//!
//! # Features
//!
//! - **Tier classification**: policy name (or DSCP) → priority tier, built once
//!   from a JSON tier document
//! - **Per-tick aggregation**: byte totals, bandwidth limits and percentage
//!   shares per tier, with no state carried between ticks
//! - **Typed gateways**: the OS policy store and adapter counters behind traits,
//!   with PowerShell and replay-file implementations
//! - **Monitoring sessions**: an iterator of tick reports with cooperative stop
//!
//! # Usage
//!
//! ```rust
//! use vpn_qos::aggregator::{aggregate, compute_shares, PolicySample};
//! use vpn_qos::tiers::ClassificationMap;
//!
//! let map = ClassificationMap::from_pairs([("Auto_zoomexe", "Ultra High"), ("Auto_steamexe", "Low")]);
//! let samples = vec![
//!     PolicySample::new("Auto_zoomexe", 1000),
//!     PolicySample::new("Auto_steamexe", 500).with_throttle(10_000_000),
//! ];
//!
//! let aggregates = aggregate(&samples, &map);
//! for share in compute_shares(&aggregates).unwrap_or_default() {
//!     println!("{}: {:.2}%", share.tier, share.percent);
//! }
//! ```

pub mod aggregator;
pub mod apps;
pub mod error;
pub mod gateway;
pub mod report;
pub mod session;
pub mod settings;
pub mod stats;
pub mod tiers;

// Re-export main types for convenience
pub use aggregator::{aggregate, compute_shares, PolicySample, TierAggregate, TierShare};
pub use error::{ApplyError, GatewayError, SettingsError, TierConfigError};
pub use session::{run_session, Session, SessionOptions, StopSignal, TickReport};
pub use tiers::{classify, ClassificationMap, ClassifyBy, TierDocument};
