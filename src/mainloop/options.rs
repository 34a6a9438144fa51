//! Main-loop configuration.

use std::time::Duration;

/// Timings and switches for the main loop and its collaborators.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoopOptions {
    /// Minimum gap between two sends of requests with the same terminator.
    pub throttle: Duration,
    /// An unanswered request older than this is presumed abandoned.
    pub stale_after: Duration,
    /// Minimum gap between two non-forced scheduler runs.
    pub schedule_interval: Duration,
    /// Maximum gap between presses counted as one click run.
    pub click_window: Duration,
    /// How long a lone escape is held before it becomes the Escape key.
    pub escape_timeout: Duration,
    /// How long a late expectation is kept to swallow its reply.
    pub late_response_ttl: Duration,
    /// Idle sleep of the blocking [`run`](crate::Coordinator::run) loop.
    pub tick: Duration,
    /// How long `start` waits for the reader to signal readiness.
    pub ready_timeout: Duration,
    /// Enable SGR mouse reporting.
    pub enable_mouse: bool,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            throttle: Duration::from_millis(100),
            stale_after: Duration::from_secs(5),
            schedule_interval: Duration::from_millis(100),
            click_window: Duration::from_millis(500),
            escape_timeout: Duration::from_millis(50),
            late_response_ttl: Duration::from_secs(30),
            tick: Duration::from_millis(10),
            ready_timeout: Duration::from_secs(2),
            enable_mouse: true,
        }
    }
}
