//! Presence log line parsing
//!
//! The chat client writes one line per presence-indicator update, e.g.
//!
//! ```text
//! Fri Jun 14 2024 09:15:42 GMT+0200 (Central European Summer Time) <21284> -- info -- StatusIndicatorStateService: Added Busy (current state: Available -> Busy)
//! ```
//!
//! Only lines carrying all three markers are state transitions; everything
//! else is rejected before any timestamp work happens.

use chrono::{DateTime, FixedOffset};
use once_cell::sync::Lazy;
use regex::Regex;

use super::error::{LogParseError, MalformedReason};
use super::schema::{PresenceState, Transition};

/// Token naming the presence-indicator subsystem
const INDICATOR_MARKER: &str = "StatusIndicatorStateService:";
/// Token for the "entry added" verb
const ADDED_MARKER: &str = "Added";
/// Raw substring anchoring the message template
const CURRENT_STATE_MARKER: &str = "current state";
/// Position of the state name, counted from the end of the line
const STATE_TOKEN_FROM_END: usize = 6;
/// chrono layout for the matched timestamp after the weekday
const TIMESTAMP_FORMAT: &str = "%b %d %Y %H:%M:%S GMT%z";
/// Bytes of the leading "Www " weekday, which is not checked against the date
const WEEKDAY_PREFIX_LEN: usize = 4;

static TIMESTAMP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[a-zA-Z]{3} [a-zA-Z]{3} [0-9]{2} [0-9]{4} [0-9]{2}:[0-9]{2}:[0-9]{2} GMT[+-][0-9]{4}\b")
        .expect("valid timestamp regex")
});

/// Parse one raw log line.
///
/// Returns `Ok(None)` for lines that are not presence transitions (the vast
/// majority), `Ok(Some(_))` for a transition, and an error when the markers
/// match but the state token or timestamp is missing or unreadable.
pub fn parse_line(line: &str) -> Result<Option<Transition>, LogParseError> {
    if !is_transition_record(line) {
        return Ok(None);
    }

    let state = extract_state(line)?;
    let observed_at = extract_timestamp(line)?;

    Ok(Some(Transition::new(state, observed_at)))
}

/// Check the three markers, cheapest rejection first in template order
fn is_transition_record(line: &str) -> bool {
    line.split_whitespace().any(|t| t == INDICATOR_MARKER)
        && line.split_whitespace().any(|t| t == ADDED_MARKER)
        && line.contains(CURRENT_STATE_MARKER)
}

fn extract_state(line: &str) -> Result<PresenceState, MalformedReason> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < STATE_TOKEN_FROM_END {
        return Err(MalformedReason::MissingStateToken);
    }

    let token = tokens[tokens.len() - STATE_TOKEN_FROM_END];
    let state = PresenceState::from_token(token);
    if state == PresenceState::Unknown {
        tracing::debug!("Unrecognized presence state token: {}", token);
    }
    Ok(state)
}

fn extract_timestamp(line: &str) -> Result<DateTime<FixedOffset>, MalformedReason> {
    let found = TIMESTAMP_RE
        .find(line)
        .ok_or(MalformedReason::MissingTimestamp)?;

    DateTime::parse_from_str(&found.as_str()[WEEKDAY_PREFIX_LEN..], TIMESTAMP_FORMAT)
        .map_err(|_| MalformedReason::InvalidTimestamp(found.as_str().to_string()))
}
