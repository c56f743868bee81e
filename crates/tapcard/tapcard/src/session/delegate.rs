//! Host callbacks for events the user may need to react to

use std::{fmt, time::Duration};

use tracing::{info, warn};

/// Receives session events
///
/// Both hooks default to no-ops.
pub trait SessionDelegate: Send + Sync + fmt::Debug {
    /// The card is enforcing a security delay with `remaining` left
    fn on_security_delay(&self, remaining: Duration) {
        let _ = remaining;
    }

    /// The card left the field mid-session
    fn on_tag_lost(&self) {}
}

/// Delegate that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentDelegate;

impl SessionDelegate for SilentDelegate {}

/// Delegate that logs events through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDelegate;

impl SessionDelegate for TracingDelegate {
    fn on_security_delay(&self, remaining: Duration) {
        info!(remaining_ms = remaining.as_millis() as u64, "Security delay in progress");
    }

    fn on_tag_lost(&self) {
        warn!("Card left the field");
    }
}
