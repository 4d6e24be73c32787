//! Application lookup in the process table and policy management per application.
//!
//! Applying a policy needs the full path of a running executable; removing one
//! only needs the generated policy name.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use sysinfo::{ProcessesToUpdate, System};
use tracing::{debug, info, warn};

use crate::error::{ApplyError, GatewayError};
use crate::gateway::{PolicySpec, PolicyStore};
use crate::tiers::{Application, PriorityTier, TierDocument};

/// Resolves an executable image name to the path of a running process.
pub trait ProcessLookup {
    fn find_executable(&self, image_name: &str) -> Option<PathBuf>;
}

/// Process lookup backed by the live process table.
///
/// The table is scanned on the first lookup and reused afterwards; call
/// [`SystemProcesses::refresh`] to rescan.
pub struct SystemProcesses {
    sys: Mutex<System>,
    scans: AtomicUsize,
}

impl SystemProcesses {
    pub fn new() -> Self {
        Self {
            sys: Mutex::new(System::new()),
            scans: AtomicUsize::new(0),
        }
    }

    /// Rescans the process table.
    pub fn refresh(&self) {
        if let Ok(mut sys) = self.sys.lock() {
            self.scan(&mut sys);
        }
    }

    /// Number of process table scans so far.
    pub fn scans(&self) -> usize {
        self.scans.load(Ordering::Relaxed)
    }

    fn scan(&self, sys: &mut System) {
        sys.refresh_processes(ProcessesToUpdate::All, true);
        let count = self.scans.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("Process table scanned ({} processes, scan #{})", sys.processes().len(), count);
    }
}

impl Default for SystemProcesses {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessLookup for SystemProcesses {
    fn find_executable(&self, image_name: &str) -> Option<PathBuf> {
        let mut sys = self.sys.lock().ok()?;
        if self.scans() == 0 {
            self.scan(&mut sys);
        }

        let wanted = image_name.to_lowercase();
        let found = sys.processes().values().find_map(|p| {
            let name = p.name().to_string_lossy().to_lowercase();
            if name == wanted {
                p.exe().map(|path| path.to_path_buf())
            } else {
                None
            }
        });
        found
    }
}

/// Builds the policy for one configured application.
pub fn policy_spec(
    tier: &PriorityTier,
    app: &Application,
    executable_path: String,
    prefix: &str,
) -> Result<PolicySpec, ApplyError> {
    let dscp = tier
        .dscp
        .ok_or_else(|| ApplyError::MissingDscp(tier.name.clone()))?;
    Ok(PolicySpec {
        name: app.policy_name(prefix),
        executable_path,
        dscp,
        throttle_bits_per_second: tier.throttle_bits_per_second,
    })
}

/// Applies the tier policy for the application named by `query`.
///
/// Fails without touching the policy store when the application is unknown
/// or has no running process.
pub fn apply_application(
    store: &dyn PolicyStore,
    lookup: &dyn ProcessLookup,
    doc: &TierDocument,
    query: &str,
    prefix: &str,
) -> Result<PolicySpec, ApplyError> {
    let (tier, app) = doc
        .find_application(query)
        .ok_or_else(|| ApplyError::UnknownApplication(query.to_string()))?;

    let image = app.executable_name();
    let path = lookup
        .find_executable(&image)
        .ok_or_else(|| ApplyError::ProcessNotRunning(image.clone()))?;
    debug!("Resolved {} to {}", image, path.display());

    let spec = policy_spec(tier, app, path.to_string_lossy().into_owned(), prefix)?;
    store.create(&spec)?;
    info!(
        "Applying QoS to: {} with DSCP {} ({} tier)",
        image, spec.dscp, tier.name
    );
    Ok(spec)
}

/// Removes the policy of the application named by `query`. Returns the policy name.
pub fn remove_application(
    store: &dyn PolicyStore,
    doc: &TierDocument,
    query: &str,
    prefix: &str,
) -> Result<String, ApplyError> {
    let (_, app) = doc
        .find_application(query)
        .ok_or_else(|| ApplyError::UnknownApplication(query.to_string()))?;
    let name = app.policy_name(prefix);
    store.delete(&name)?;
    Ok(name)
}

/// Outcome of applying every configured application.
#[derive(Debug, Default)]
pub struct ApplyAllReport {
    pub applied: Vec<PolicySpec>,
    /// Applications skipped because no process is running.
    pub not_running: Vec<String>,
    pub failed: Vec<(String, ApplyError)>,
}

/// Applies policies for every configured application that is currently running.
///
/// Each policy name is applied at most once per call.
pub fn apply_all(
    store: &dyn PolicyStore,
    lookup: &dyn ProcessLookup,
    doc: &TierDocument,
    prefix: &str,
) -> ApplyAllReport {
    let mut report = ApplyAllReport::default();
    let mut already_applied = HashSet::new();

    for (tier, app) in doc.applications() {
        let policy = app.policy_name(prefix);
        if !already_applied.insert(policy) {
            continue;
        }

        let image = app.executable_name();
        let Some(path) = lookup.find_executable(&image) else {
            debug!("{} is not running, skipping", image);
            report.not_running.push(app.name.clone());
            continue;
        };

        let result = policy_spec(tier, app, path.to_string_lossy().into_owned(), prefix)
            .and_then(|spec| {
                store.create(&spec)?;
                Ok(spec)
            });
        match result {
            Ok(spec) => report.applied.push(spec),
            Err(e) => {
                warn!("Failed to apply policy for {}: {}", app.name, e);
                report.failed.push((app.name.clone(), e));
            }
        }
    }
    report
}

/// Removes the policy of every configured application. Returns the names removed
/// and the failures.
pub fn remove_all(
    store: &dyn PolicyStore,
    doc: &TierDocument,
    prefix: &str,
) -> (Vec<String>, Vec<(String, GatewayError)>) {
    let mut removed = Vec::new();
    let mut failed = Vec::new();
    let mut seen = HashSet::new();

    for (_, app) in doc.applications() {
        let name = app.policy_name(prefix);
        if !seen.insert(name.clone()) {
            continue;
        }
        info!("Removing QoS policy: {}", name);
        match store.delete(&name) {
            Ok(()) => removed.push(name),
            Err(e) => {
                warn!("Failed to remove {}: {}", name, e);
                failed.push((name, e));
            }
        }
    }
    (removed, failed)
}
