pub mod alert;
pub mod config;
pub mod events;

pub use alert::AlertLevel;
pub use config::Config;
pub use events::{forward_changes, AppEvent, StateChange};
