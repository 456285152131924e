//! Error types for log parsing and the watchdog

use std::path::PathBuf;
use thiserror::Error;

/// Why a line that passed the marker checks could not be turned into a transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedReason {
    #[error("no timestamp found in line")]
    MissingTimestamp,
    #[error("timestamp '{0}' could not be parsed")]
    InvalidTimestamp(String),
    #[error("line has too few tokens to hold a state name")]
    MissingStateToken,
}

/// Failure to parse a line that looked like a presence record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogParseError {
    #[error("malformed presence log entry: {reason}")]
    MalformedLogEntry { reason: MalformedReason },
}

impl From<MalformedReason> for LogParseError {
    fn from(reason: MalformedReason) -> Self {
        LogParseError::MalformedLogEntry { reason }
    }
}

/// Errors surfaced by [`super::PresenceWatchdog`]
#[derive(Debug, Error)]
pub enum WatchdogError {
    /// The monitored log file could not be opened or read
    #[error("log source '{}' unavailable: {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Rejected at call time: empty path, zero interval
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// `start()` needs a Tokio runtime to spawn its worker on
    #[error("no Tokio runtime available to run the polling loop")]
    NoRuntime,
}
