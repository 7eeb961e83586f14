//! TTL presets for upstream data.

use std::time::Duration;

/// Volatile data: page analysis results, map search results.
pub const VOLATILE: Duration = Duration::from_secs(5 * 60);

/// Near-static reference data: geographic location lookups.
pub const REFERENCE: Duration = Duration::from_secs(24 * 60 * 60);
