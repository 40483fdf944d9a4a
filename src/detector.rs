use std::collections::BTreeMap;
use std::io::Write;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard};
use std::thread::{self, ThreadId};
use tracing::{error, info};

use crate::plugin::{EnvironmentPlugin, PluginRegistry};
use crate::probes::{BuiltinProbes, Probes};
use crate::report;
use crate::snapshot::EnvironmentSnapshot;

/// Cached, lazily computed view of the host environment.
///
/// The cache starts empty and is populated by the first read or the first
/// explicit [`run_detection`](Self::run_detection) call; afterwards it only
/// changes by wholesale replacement and lives for the process lifetime.
///
/// The cache mutex guards only reads and the wholesale swap; a separate
/// pass mutex serializes detection itself, so N concurrent cold readers
/// trigger exactly one pass and then observe the same record. Neither lock
/// is held while plugins run: a plugin that calls back into the detector
/// from its own pass gets the record as it currently stands instead of
/// deadlocking, and notified plugins may re-enter freely.
pub struct EnvironmentDetector {
    cache: Mutex<Option<EnvironmentSnapshot>>,
    probes: Mutex<Box<dyn Probes>>,
    pass: Mutex<()>,
    pass_owner: Mutex<Option<ThreadId>>,
    plugins: PluginRegistry,
}

// Clears the pass-owner mark before the serializing guard is released.
struct PassGuard<'a> {
    owner: &'a Mutex<Option<ThreadId>>,
    _serial: MutexGuard<'a, ()>,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        *lock(self.owner) = None;
    }
}

impl EnvironmentDetector {
    /// Build a detector over the built-in probes and an already-resolved,
    /// ordered plugin collection.
    pub fn new(plugins: Vec<Box<dyn EnvironmentPlugin>>) -> Self {
        Self::with_probes(Box::new(BuiltinProbes::new()), plugins)
    }

    /// Build a detector over a custom probe set. Used by tests to inject
    /// failing or counting probes.
    pub fn with_probes(
        probes: Box<dyn Probes>,
        plugins: Vec<Box<dyn EnvironmentPlugin>>,
    ) -> Self {
        Self {
            cache: Mutex::new(None),
            probes: Mutex::new(probes),
            pass: Mutex::new(()),
            pass_owner: Mutex::new(None),
            plugins: PluginRegistry::new(plugins),
        }
    }

    /// The current environment snapshot, as an independent copy. Triggers a
    /// synchronous detection pass first if none has completed yet; a lazy
    /// pass notifies listeners just like an explicit one. Never fails: a
    /// degraded (possibly empty) record is a valid result.
    pub fn environment(&self) -> EnvironmentSnapshot {
        let (snapshot, fresh) = self.ensure_detected();
        if fresh {
            self.plugins.notify(&snapshot);
        }
        snapshot
    }

    /// Run one full detection pass: the three built-in probes, plugin
    /// contributions, wholesale cache replacement and, when requested,
    /// plugin notification. Returns the fresh snapshot. A failure of the
    /// pass itself degrades the cache to the empty record instead of
    /// propagating.
    pub fn run_detection(&self, notify_plugins: bool) -> EnvironmentSnapshot {
        if self.in_pass_on_this_thread() {
            return self.cached().unwrap_or_default();
        }

        let snapshot = {
            let _pass = self.begin_pass();
            let fresh = self.detection_pass();
            *lock(&self.cache) = Some(fresh.clone());
            fresh
        };

        if notify_plugins {
            self.plugins.notify(&snapshot);
        }
        snapshot
    }

    /// Deliver the current snapshot to every notification-capable plugin,
    /// running a detection pass first (without re-notification) if the
    /// cache is still cold.
    pub fn notify_plugins(&self) {
        let (snapshot, _) = self.ensure_detected();
        self.plugins.notify(&snapshot);
    }

    /// Log the detected environment as a human-readable block, either
    /// through the default log stream or into `handler` (e.g. a support
    /// bundle file). Rendering and write failures are logged, never
    /// propagated.
    pub fn log_detected_environment(&self, handler: Option<&mut dyn Write>) {
        let snapshot = self.environment();
        let logged = match handler {
            Some(writer) => report::write_report(&snapshot, writer),
            None => report::render_report(&snapshot).map(|block| info!("{block}")),
        };
        if let Err(err) = logged {
            error!(error = %err, "error logging detected environment");
        }
    }

    /// Cold-path read with single-flight: concurrent callers wait for the
    /// pass in flight and adopt its result instead of starting their own,
    /// while a plugin re-entering from inside its own pass gets the record
    /// as it stands. Returns the snapshot and whether this call ran a pass.
    fn ensure_detected(&self) -> (EnvironmentSnapshot, bool) {
        if let Some(snapshot) = self.cached() {
            return (snapshot, false);
        }
        if self.in_pass_on_this_thread() {
            return (self.cached().unwrap_or_default(), false);
        }

        let _pass = self.begin_pass();
        // Another thread may have completed the pass while we waited.
        if let Some(snapshot) = self.cached() {
            return (snapshot, false);
        }
        let fresh = self.detection_pass();
        *lock(&self.cache) = Some(fresh.clone());
        (fresh, true)
    }

    fn cached(&self) -> Option<EnvironmentSnapshot> {
        lock(&self.cache).clone()
    }

    fn begin_pass(&self) -> PassGuard<'_> {
        let serial = lock(&self.pass);
        *lock(&self.pass_owner) = Some(thread::current().id());
        PassGuard {
            owner: &self.pass_owner,
            _serial: serial,
        }
    }

    fn in_pass_on_this_thread(&self) -> bool {
        *lock(&self.pass_owner) == Some(thread::current().id())
    }

    // Catch-all boundary for bugs in the orchestration itself: a panic
    // escaping the pass degrades the result to the empty record.
    fn detection_pass(&self) -> EnvironmentSnapshot {
        match catch_unwind(AssertUnwindSafe(|| self.detect())) {
            Ok(snapshot) => snapshot,
            Err(_) => {
                error!("unexpected error while detecting environment");
                EnvironmentSnapshot::default()
            }
        }
    }

    fn detect(&self) -> EnvironmentSnapshot {
        let mut snapshot = {
            let mut probes = lock(&self.probes);
            EnvironmentSnapshot {
                os: Some(probes.os()),
                runtime: Some(probes.runtime()),
                hardware: Some(probes.hardware()),
                plugins: BTreeMap::new(),
            }
        };
        snapshot.plugins = self.plugins.collect();
        snapshot
    }
}

// The cache is only ever replaced wholesale and the probe box is only used
// inside a pass, so a lock poisoned by a panicking probe holds no partial
// state worth rejecting.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
