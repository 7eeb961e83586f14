//! Error types for response cache operations.

/// Error type for response cache operations.
///
/// Plain lookups never fail; only read-through fetches can surface an
/// error, and only when the upstream call itself fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// The upstream call failed. The failure is not cached.
    #[error("Upstream call failed: {0}")]
    Upstream(String),
}

/// Result type for response cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
