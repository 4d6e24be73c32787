//! The monitoring session: a tick-driven poll → classify → aggregate loop.
//!
//! A `Session` is an iterator of `TickReport`s. Each `next()` runs one tick:
//! the policy query, then the interface query, then aggregation. Between
//! ticks the calling thread waits out the rest of the tick interval, or until the
//! session's `StopSignal` is raised. Gateway failures never end the session;
//! the tick proceeds with empty or zeroed data.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::aggregator::{aggregate, compute_shares, total_bytes, PolicySample, TierAggregate, TierShare};
use crate::error::GatewayError;
use crate::gateway::{InterfaceCounters, InterfaceSample, PolicyStore};
use crate::stats::SessionStats;
use crate::tiers::{classify, ClassificationMap};

/// Cooperative cancellation shared between the session and whoever stops it.
#[derive(Debug, Default)]
pub struct StopSignal {
    stopped: Mutex<bool>,
    cvar: Condvar,
}

impl StopSignal {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Requests the session to end after the in-flight tick.
    pub fn stop(&self) {
        if let Ok(mut stopped) = self.stopped.lock() {
            *stopped = true;
        }
        self.cvar.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.lock().map(|s| *s).unwrap_or(true)
    }

    /// Waits up to `timeout`. Returns true if the signal was raised.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let Ok(guard) = self.stopped.lock() else {
            return true;
        };
        match self.cvar.wait_timeout_while(guard, timeout, |stopped| !*stopped) {
            Ok((stopped, _)) => *stopped,
            Err(_) => true,
        }
    }
}

/// Timing and target of a session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub interface: String,
    pub tick_interval: Duration,
    /// Total session length. `None` or zero runs until stopped.
    pub duration: Option<Duration>,
}

impl SessionOptions {
    /// Number of ticks the session will produce: `floor(duration / tick_interval)`.
    pub fn tick_limit(&self) -> Option<u64> {
        let duration = self.duration.filter(|d| !d.is_zero())?;
        if self.tick_interval.is_zero() {
            return None;
        }
        Some((duration.as_nanos() / self.tick_interval.as_nanos()) as u64)
    }
}

/// Everything observed and computed in one tick.
#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub tick: u64,
    pub timestamp: DateTime<Utc>,
    pub interface: String,
    pub interface_sample: InterfaceSample,
    pub aggregates: Vec<TierAggregate>,
    pub total_bytes: u64,
    /// Absent when `total_bytes` is 0.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shares: Option<Vec<TierShare>>,
    pub unclassified_policies: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface_error: Option<String>,
}

/// A monitoring session over a policy store and interface counters.
pub struct Session {
    policy_store: Box<dyn PolicyStore>,
    interface_counters: Box<dyn InterfaceCounters>,
    map: Arc<ClassificationMap>,
    options: SessionOptions,
    stop: Arc<StopSignal>,
    stats: SessionStats,
    ticks_done: u64,
    last_tick_started: Option<Instant>,
}

/// Starts a new, independent session.
pub fn run_session(
    policy_store: Box<dyn PolicyStore>,
    interface_counters: Box<dyn InterfaceCounters>,
    map: Arc<ClassificationMap>,
    options: SessionOptions,
) -> Session {
    Session::new(policy_store, interface_counters, map, options, StopSignal::new())
}

impl Session {
    pub fn new(
        policy_store: Box<dyn PolicyStore>,
        interface_counters: Box<dyn InterfaceCounters>,
        map: Arc<ClassificationMap>,
        options: SessionOptions,
        stop: Arc<StopSignal>,
    ) -> Self {
        match options.tick_limit() {
            Some(limit) => info!(
                "Starting traffic monitoring for {} ticks every {:?} on interface {}...",
                limit, options.tick_interval, options.interface
            ),
            None => info!(
                "Starting traffic monitoring every {:?} on interface {} until stopped...",
                options.tick_interval, options.interface
            ),
        }
        if map.is_empty() {
            warn!("Classification map is empty - every tick will report no classified traffic");
        }

        Self {
            policy_store,
            interface_counters,
            map,
            options,
            stop,
            stats: SessionStats::default(),
            ticks_done: 0,
            last_tick_started: None,
        }
    }

    /// Handle that ends the session between ticks.
    pub fn stop_handle(&self) -> Arc<StopSignal> {
        Arc::clone(&self.stop)
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Queries the policy store.
    pub fn collect_policy_samples(&self) -> Result<Vec<PolicySample>, GatewayError> {
        self.policy_store.enumerate()
    }

    /// Queries the interface counters, yielding zeros on failure.
    pub fn collect_interface_sample(&mut self) -> InterfaceSample {
        self.try_interface_sample().0
    }

    fn try_interface_sample(&mut self) -> (InterfaceSample, Option<String>) {
        match self.interface_counters.sample(&self.options.interface) {
            Ok(sample) => (sample, None),
            Err(e) => {
                warn!(
                    "Failed to get interface stats for {}: {}",
                    self.options.interface, e
                );
                self.stats.interface_failures += 1;
                (InterfaceSample::default(), Some(e.to_string()))
            }
        }
    }

    /// Runs one tick unconditionally.
    pub fn run_tick(&mut self) -> TickReport {
        let start = Instant::now();
        self.last_tick_started = Some(start);
        self.ticks_done += 1;

        let (samples, policy_error) = match self.collect_policy_samples() {
            Ok(samples) => (samples, None),
            Err(e) => {
                warn!("Failed to get QoS stats: {}", e);
                self.stats.policy_failures += 1;
                (Vec::new(), Some(e.to_string()))
            }
        };
        let (interface_sample, interface_error) = self.try_interface_sample();

        let aggregates = aggregate(&samples, &self.map);
        let unclassified = samples
            .iter()
            .filter(|s| classify(s, &self.map).is_none())
            .count();
        let total = total_bytes(&aggregates);
        let shares = compute_shares(&aggregates);

        debug!(
            "Tick {}: {} policies, {} tiers, {} unclassified, {} bytes",
            self.ticks_done,
            samples.len(),
            aggregates.len(),
            unclassified,
            total
        );

        self.stats.ticks += 1;
        self.stats.unclassified_samples += unclassified as u64;
        self.stats
            .tick_duration_ms
            .add(start.elapsed().as_secs_f64() * 1000.0);

        TickReport {
            tick: self.ticks_done,
            timestamp: Utc::now(),
            interface: self.options.interface.clone(),
            interface_sample,
            aggregates,
            total_bytes: total,
            shares,
            unclassified_policies: unclassified,
            policy_error,
            interface_error,
        }
    }
}

/// Time left of `interval` once `elapsed` has been spent on the tick itself.
pub fn remaining_wait(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

impl Iterator for Session {
    type Item = TickReport;

    fn next(&mut self) -> Option<TickReport> {
        if self.stop.is_stopped() {
            return None;
        }
        if let Some(limit) = self.options.tick_limit() {
            if self.ticks_done >= limit {
                return None;
            }
        }
        if let Some(started) = self.last_tick_started {
            let wait = remaining_wait(self.options.tick_interval, started.elapsed());
            if self.stop.wait_timeout(wait) {
                debug!("Stop requested, ending session after {} ticks", self.ticks_done);
                return None;
            }
        }
        Some(self.run_tick())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingStore;

    impl PolicyStore for FailingStore {
        fn enumerate(&self) -> Result<Vec<PolicySample>, GatewayError> {
            Err(GatewayError::Unavailable("spawn failed".into()))
        }
        fn create(&self, _spec: &crate::gateway::PolicySpec) -> Result<(), GatewayError> {
            Ok(())
        }
        fn delete(&self, _name: &str) -> Result<(), GatewayError> {
            Ok(())
        }
    }

    struct FailingCounters;

    impl InterfaceCounters for FailingCounters {
        fn sample(&self, _interface: &str) -> Result<InterfaceSample, GatewayError> {
            Err(GatewayError::MalformedPayload("bad json".into()))
        }
        fn detect_active(&self) -> Result<Option<String>, GatewayError> {
            Ok(None)
        }
    }

    fn options(duration_ms: Option<u64>, interval_ms: u64) -> SessionOptions {
        SessionOptions {
            interface: "Ethernet".into(),
            tick_interval: Duration::from_millis(interval_ms),
            duration: duration_ms.map(Duration::from_millis),
        }
    }

    #[test]
    fn test_tick_limit() {
        assert_eq!(options(Some(60_000), 1000).tick_limit(), Some(60));
        assert_eq!(options(Some(2500), 1000).tick_limit(), Some(2));
        assert_eq!(options(Some(500), 1000).tick_limit(), Some(0));
        assert_eq!(options(Some(0), 1000).tick_limit(), None);
        assert_eq!(options(None, 1000).tick_limit(), None);
    }

    #[test]
    fn test_failures_degrade_to_empty_tick() {
        let mut session = run_session(
            Box::new(FailingStore),
            Box::new(FailingCounters),
            Arc::new(ClassificationMap::default()),
            options(Some(3), 1),
        );
        let reports: Vec<TickReport> = session.by_ref().collect();
        assert_eq!(reports.len(), 3);
        for r in &reports {
            assert!(r.aggregates.is_empty());
            assert_eq!(r.total_bytes, 0);
            assert!(r.shares.is_none());
            assert_eq!(r.interface_sample, InterfaceSample::default());
            assert!(r.policy_error.is_some());
            assert!(r.interface_error.is_some());
        }
        assert_eq!(session.stats().policy_failures, 3);
        assert_eq!(session.stats().interface_failures, 3);
    }

    #[test]
    fn test_stop_signal_ends_unbounded_session() {
        let mut session = run_session(
            Box::new(FailingStore),
            Box::new(FailingCounters),
            Arc::new(ClassificationMap::default()),
            options(None, 10_000),
        );
        let stop = session.stop_handle();
        assert!(session.next().is_some());

        let stopper = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            stop.stop();
        });
        let started = Instant::now();
        assert!(session.next().is_none());
        assert!(started.elapsed() < Duration::from_secs(5));
        stopper.join().unwrap();
    }

    #[test]
    fn test_collect_interface_sample_zeroes_on_failure() {
        let mut session = run_session(
            Box::new(FailingStore),
            Box::new(FailingCounters),
            Arc::new(ClassificationMap::default()),
            options(None, 1000),
        );
        assert_eq!(session.collect_interface_sample(), InterfaceSample::default());
        assert_eq!(session.stats().interface_failures, 1);
        assert!(session.collect_policy_samples().is_err());
    }

    #[test]
    fn test_remaining_wait() {
        let second = Duration::from_secs(1);
        assert_eq!(
            remaining_wait(second, Duration::from_millis(300)),
            Duration::from_millis(700)
        );
        assert_eq!(remaining_wait(second, Duration::from_secs(2)), Duration::ZERO);
    }

    #[test]
    fn test_wait_timeout_without_stop() {
        let stop = StopSignal::new();
        assert!(!stop.wait_timeout(Duration::from_millis(5)));
        stop.stop();
        assert!(stop.wait_timeout(Duration::from_secs(60)));
        assert!(stop.is_stopped());
    }
}
