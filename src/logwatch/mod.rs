//! Presence tracking from the chat client's log file
//!
//! This module parses presence-indicator records out of the client's
//! append-only log and keeps the newest observed state up to date.

pub mod error;
pub mod parser;
pub mod schema;
pub mod watchdog;

pub use error::{LogParseError, MalformedReason, WatchdogError};
pub use parser::parse_line;
pub use schema::{PresenceState, Transition, WatchdogSnapshot};
pub use watchdog::{LoopState, PresenceWatchdog, UpdateHook, WeakPresenceWatchdog};
