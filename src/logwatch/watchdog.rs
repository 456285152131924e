//! Presence watchdog
//!
//! Scans the chat client's log newest-line-first on every refresh, keeps the
//! latest observation in a [`WatchdogSnapshot`], and optionally runs a
//! background polling loop that fires an update hook once per new observation.

use chrono::{DateTime, FixedOffset};
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::WatchdogError;
use super::parser::parse_line;
use super::schema::{PresenceState, Transition, WatchdogSnapshot};

/// Callback invoked when an unacknowledged observation is found
pub type UpdateHook = Arc<dyn Fn() + Send + Sync + 'static>;

/// Lifecycle of the polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Not started, or stopped
    Idle,
    /// Waiting for the next tick
    Running,
    /// A refresh is in progress
    Refreshing,
}

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct Shared {
    log_path: PathBuf,
    snapshot: RwLock<WatchdogSnapshot>,
    hook: RwLock<Option<UpdateHook>>,
    worker: Mutex<Option<Worker>>,
    /// Serializes refresh cycles
    refresh_lock: Mutex<()>,
}

/// Watches a presence log file and tracks the newest state transition.
///
/// Cloning yields another handle to the same watchdog.
#[derive(Clone)]
pub struct PresenceWatchdog {
    shared: Arc<Shared>,
}

/// Non-owning handle, for hooks that refer back to their own watchdog
#[derive(Clone)]
pub struct WeakPresenceWatchdog {
    shared: Weak<Shared>,
}

impl WeakPresenceWatchdog {
    pub fn upgrade(&self) -> Option<PresenceWatchdog> {
        self.shared.upgrade().map(|shared| PresenceWatchdog { shared })
    }
}

impl std::fmt::Debug for PresenceWatchdog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceWatchdog")
            .field("log_path", &self.shared.log_path)
            .field("snapshot", &self.snapshot())
            .field("loop_state", &self.loop_state())
            .finish_non_exhaustive()
    }
}

impl PresenceWatchdog {
    /// Create a watchdog for the given log file
    pub fn new(log_path: impl Into<PathBuf>) -> Result<Self, WatchdogError> {
        let log_path = log_path.into();
        if log_path.as_os_str().is_empty() {
            return Err(WatchdogError::InvalidConfiguration(
                "log file path is empty".to_string(),
            ));
        }

        Ok(Self {
            shared: Arc::new(Shared {
                log_path,
                snapshot: RwLock::new(WatchdogSnapshot::new()),
                hook: RwLock::new(None),
                worker: Mutex::new(None),
                refresh_lock: Mutex::new(()),
            }),
        })
    }

    pub fn downgrade(&self) -> WeakPresenceWatchdog {
        WeakPresenceWatchdog {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Path of the monitored log file
    pub fn log_path(&self) -> &Path {
        &self.shared.log_path
    }

    /// Register the update hook, replacing any previous one.
    ///
    /// The hook runs synchronously on whichever context performs the refresh
    /// (the polling worker when started). The snapshot and hook locks are
    /// released first, so it may read the snapshot, acknowledge, or call
    /// [`Self::stop`]. The refresh lock stays held for the whole cycle: the
    /// hook must not call [`Self::refresh`] (it would deadlock), and
    /// [`Self::loop_state`] reports `Refreshing` while it runs. Slow work
    /// belongs on another task.
    pub fn set_update_hook<F>(&self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.shared.hook.write() = Some(Arc::new(hook));
    }

    pub fn clear_update_hook(&self) {
        *self.shared.hook.write() = None;
    }

    /// Consistent copy of the current snapshot
    pub fn snapshot(&self) -> WatchdogSnapshot {
        *self.shared.snapshot.read()
    }

    pub fn current_state(&self) -> PresenceState {
        self.shared.snapshot.read().current_state
    }

    pub fn previous_state(&self) -> PresenceState {
        self.shared.snapshot.read().previous_state
    }

    pub fn last_observed(&self) -> DateTime<FixedOffset> {
        self.shared.snapshot.read().last_observed
    }

    /// True while the newest observation has not been acknowledged
    pub fn has_changed(&self) -> bool {
        self.shared.snapshot.read().has_changed()
    }

    /// Mark the newest observation as consumed
    pub fn acknowledge(&self) {
        self.shared.snapshot.write().acknowledge();
    }

    /// Scan the log for the newest transition and update the snapshot.
    ///
    /// Lines are examined from the end of the file backwards and the first
    /// transition wins. Malformed presence records are logged and skipped.
    /// When nothing matches the snapshot is left untouched. On a match the
    /// update hook fires if the observation is unacknowledged.
    pub fn refresh(&self) -> Result<Option<Transition>, WatchdogError> {
        let _guard = self.shared.refresh_lock.lock();
        self.refresh_locked()
    }

    fn refresh_locked(&self) -> Result<Option<Transition>, WatchdogError> {
        let path = &self.shared.log_path;
        let bytes = std::fs::read(path).map_err(|source| WatchdogError::SourceUnavailable {
            path: path.clone(),
            source,
        })?;
        let content = String::from_utf8_lossy(&bytes);

        let Some((line_number, transition)) = find_newest_transition(&content) else {
            debug!("No presence transition found in {}", path.display());
            return Ok(None);
        };

        let changed = {
            let mut snapshot = self.shared.snapshot.write();
            snapshot.record(transition);
            snapshot.has_changed()
        };

        debug!(
            "Presence transition on line {} from end: {} at {} (changed: {})",
            line_number, transition.state, transition.observed_at, changed
        );

        if changed {
            self.fire_hook();
        }

        Ok(Some(transition))
    }

    fn fire_hook(&self) {
        let hook = self.shared.hook.read().clone();
        if let Some(hook) = hook {
            hook();
        }
    }

    /// One polling cycle: refresh, then acknowledge what the hook was told about
    fn tick(&self) {
        let _guard = self.shared.refresh_lock.lock();

        if let Err(e) = self.refresh_locked() {
            warn!("Presence refresh failed: {}", e);
            return;
        }

        let mut snapshot = self.shared.snapshot.write();
        if snapshot.has_changed() {
            info!(
                "Presence changed: {} -> {}",
                snapshot.previous_state, snapshot.current_state
            );
            snapshot.acknowledge();
        }
    }

    /// Start polling every `interval`.
    ///
    /// Must be called from within a Tokio runtime. Starting an already running
    /// watchdog is a no-op. Each start begins a fresh snapshot session.
    pub fn start(&self, interval: Duration) -> Result<(), WatchdogError> {
        if interval.is_zero() {
            return Err(WatchdogError::InvalidConfiguration(
                "polling interval must be positive".to_string(),
            ));
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| WatchdogError::NoRuntime)?;

        let mut worker = self.shared.worker.lock();
        if worker.as_ref().is_some_and(|w| !w.handle.is_finished()) {
            debug!("Presence watchdog already running");
            return Ok(());
        }

        *self.shared.snapshot.write() = WatchdogSnapshot::new();

        let cancel = CancellationToken::new();
        let handle = runtime.spawn(poll_loop(self.clone(), interval, cancel.clone()));
        *worker = Some(Worker { cancel, handle });

        info!(
            "Presence watchdog started (interval: {:?}, log: {})",
            interval,
            self.shared.log_path.display()
        );
        Ok(())
    }

    /// Stop polling.
    ///
    /// An in-flight refresh finishes; no further tick starts. Never blocks, so
    /// it is safe to call from the update hook. Calling it when not running
    /// does nothing.
    pub fn stop(&self) {
        if let Some(worker) = self.shared.worker.lock().take() {
            worker.cancel.cancel();
            info!("Presence watchdog stopped");
        }
    }

    /// Stop polling and wait for the worker to exit
    pub async fn stop_and_wait(&self) {
        let worker = self.shared.worker.lock().take();
        if let Some(worker) = worker {
            worker.cancel.cancel();
            if let Err(e) = worker.handle.await {
                warn!("Presence watchdog worker ended abnormally: {}", e);
            }
            info!("Presence watchdog stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared
            .worker
            .lock()
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    /// `Refreshing` while the loop is running and any refresh is in progress,
    /// including a manual [`Self::refresh`] made between ticks.
    pub fn loop_state(&self) -> LoopState {
        if !self.is_running() {
            LoopState::Idle
        } else if self.shared.refresh_lock.is_locked() {
            LoopState::Refreshing
        } else {
            LoopState::Running
        }
    }
}

/// Newest transition in `content`, with its 1-based line position from the end
fn find_newest_transition(content: &str) -> Option<(usize, Transition)> {
    for (line_number, line) in content.lines().rev().enumerate() {
        match parse_line(line) {
            Ok(Some(transition)) => return Some((line_number + 1, transition)),
            Ok(None) => {}
            Err(e) => warn!("Skipping log line {} from end: {}", line_number + 1, e),
        }
    }
    None
}

async fn poll_loop(watchdog: PresenceWatchdog, interval: Duration, cancel: CancellationToken) {
    debug!("Presence polling loop started");

    loop {
        if cancel.is_cancelled() {
            break;
        }

        watchdog.tick();

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    debug!("Presence polling loop exited");
}
