//! Plumbing shared by every mailpool crate: logging setup, log macros and the
//! process shutdown signal.

pub mod logging;

pub use tracing;

/// Broadcast to long-running tasks when the daemon stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Shutdown,
    Finalised,
}
