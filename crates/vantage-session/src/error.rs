//! Error types for the session lifetime monitor.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    /// Timeout configuration is unusable (zero or inverted durations).
    #[error("Invalid session timeout config: {0}")]
    InvalidConfig(String),

    /// The external session provider reported a failure.
    #[error("Session provider error: {0}")]
    Provider(String),

    /// The monitor has been unmounted or its session already expired.
    #[error("Session monitor is no longer running")]
    MonitorClosed,
}

pub type Result<T> = std::result::Result<T, SessionError>;
