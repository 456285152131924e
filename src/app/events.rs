use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use tokio::sync::mpsc;

use super::alert::AlertLevel;
use crate::logwatch::{PresenceState, PresenceWatchdog, WatchdogSnapshot};

/// Application events
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The watchdog reported a new presence observation
    PresenceChanged(StateChange),
    /// Shutdown requested
    Quit,
}

/// A presence change as seen by the consumer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateChange {
    pub previous: PresenceState,
    pub current: PresenceState,
    pub observed_at: DateTime<FixedOffset>,
    pub alert: AlertLevel,
}

impl StateChange {
    pub fn from_snapshot(snapshot: &WatchdogSnapshot) -> Self {
        Self {
            previous: snapshot.previous_state,
            current: snapshot.current_state,
            observed_at: snapshot.last_observed,
            alert: AlertLevel::from_state(snapshot.current_state),
        }
    }

    /// First observation of the session rather than a real change
    pub fn is_initial(&self) -> bool {
        self.previous == PresenceState::Start
    }

    /// Notification title, e.g. "Teams Status: Busy"
    pub fn title(&self) -> String {
        format!("Teams Status: {}", self.current)
    }

    /// Notification body; none for the initial observation
    pub fn message(&self) -> Option<String> {
        if self.is_initial() {
            None
        } else {
            Some(format!("Changed from {} -> {}", self.previous, self.current))
        }
    }
}

/// Register a hook that forwards each change into `tx`.
///
/// Uses `try_send` so the watchdog worker never waits on the consumer; a full
/// channel drops the event.
pub fn forward_changes(watchdog: &PresenceWatchdog, tx: mpsc::Sender<AppEvent>) {
    let weak = watchdog.downgrade();
    watchdog.set_update_hook(move || {
        let Some(watchdog) = weak.upgrade() else {
            return;
        };
        let change = StateChange::from_snapshot(&watchdog.snapshot());
        if let Err(e) = tx.try_send(AppEvent::PresenceChanged(change)) {
            tracing::warn!("Dropping presence event: {}", e);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logwatch::Transition;
    use chrono::TimeZone;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn at(hour: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2024, 6, 14, hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_initial_change_has_no_message() {
        let mut snapshot = WatchdogSnapshot::starting_at(at(8));
        snapshot.record(Transition::new(PresenceState::Busy, at(9)));

        let change = StateChange::from_snapshot(&snapshot);
        assert!(change.is_initial());
        assert_eq!(change.title(), "Teams Status: Busy");
        assert_eq!(change.message(), None);
        assert_eq!(change.alert, AlertLevel::Busy);
    }

    #[test]
    fn test_change_message() {
        let mut snapshot = WatchdogSnapshot::starting_at(at(8));
        snapshot.record(Transition::new(PresenceState::Available, at(9)));
        snapshot.record(Transition::new(PresenceState::BeRightBack, at(10)));

        let change = StateChange::from_snapshot(&snapshot);
        assert!(!change.is_initial());
        assert_eq!(
            change.message().as_deref(),
            Some("Changed from Available -> Be Right Back")
        );
        assert_eq!(change.alert, AlertLevel::Away);
    }

    #[test]
    fn test_forward_changes_sends_event() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "Fri Jun 14 2024 09:15:42 GMT+0200 <1> -- info -- StatusIndicatorStateService: Added Away (current state: Busy -> Away)"
        )
        .unwrap();
        file.flush().unwrap();

        let watchdog = PresenceWatchdog::new(file.path()).unwrap();
        let (tx, mut rx) = mpsc::channel(4);
        forward_changes(&watchdog, tx);

        watchdog.refresh().unwrap();
        match rx.try_recv().unwrap() {
            AppEvent::PresenceChanged(change) => {
                assert_eq!(change.current, PresenceState::Away);
                assert!(change.is_initial());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
