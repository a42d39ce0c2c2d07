//! Watch runtime: notify events, monitor configuration, and the daemon.

mod events;
mod runtime;

pub use events::{convert_event, filter_ignored, MonitorConfig, RenamePairer, DEFAULT_RENAME_WINDOW};
pub use runtime::{MonitorDaemon, MonitorHandle, MonitorMessage, MonitorSummary};
