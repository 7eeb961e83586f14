//! Deterministic cache keys built from request parameters.

use std::collections::BTreeMap;
use std::fmt;

/// Builder for cache keys.
///
/// The key is `endpoint?name=value&...` with parameters sorted by name,
/// values trimmed, and every component percent-encoded (endpoint segments
/// keep their `/` separators), so the same logical request always
/// produces the same key regardless of the order parameters were added in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    endpoint: String,
    params: BTreeMap<String, String>,
}

impl CacheKey {
    /// Start a key for the given upstream endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            params: BTreeMap::new(),
        }
    }

    /// Add a distinguishing parameter. A repeated name replaces the earlier value.
    pub fn param(mut self, name: impl Into<String>, value: impl AsRef<str>) -> Self {
        self.params
            .insert(name.into(), value.as_ref().trim().to_string());
        self
    }

    /// Add a parameter only when a value is present.
    pub fn param_opt(self, name: impl Into<String>, value: Option<impl AsRef<str>>) -> Self {
        match value {
            Some(v) => self.param(name, v),
            None => self,
        }
    }

    /// Render the key string.
    pub fn build(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Segments are encoded so an endpoint can never contain a raw `?`, `&` or `=`.
        for (i, segment) in self.endpoint.split('/').enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            f.write_str(&urlencoding::encode(segment))?;
        }
        for (i, (name, value)) in self.params.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(
                f,
                "{}{}={}",
                sep,
                urlencoding::encode(name),
                urlencoding::encode(value)
            )?;
        }
        Ok(())
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.build()
    }
}
