//! Configuration types.
//!
//! Every field is optional in the file; anything left out falls back to the
//! defaults of the selected [`Profile`].

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use vantage_cache::CacheConfig;
use vantage_session::SessionTimeoutConfig;

use crate::error::{ConfigError, Result};

/// Named bundle of defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Short timeouts so manual testing doesn't take half an hour.
    Development,
    #[default]
    Production,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Development => "development",
            Profile::Production => "production",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Profile::Development),
            "production" | "prod" => Ok(Profile::Production),
            other => Err(ConfigError::UnknownProfile(other.to_string())),
        }
    }
}

/// Root configuration as written in `vantage.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VantageConfig {
    /// Profile whose defaults fill unset fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,

    /// Upstream response cache settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheSection>,

    /// Session lifetime monitor settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionSection>,
}

/// The `[cache]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    /// Maximum number of entries before LRU eviction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_entries: Option<usize>,
    /// TTL used when a caller does not pass one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_ttl_secs: Option<u64>,
    /// Share one upstream call between concurrent misses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub single_flight: Option<bool>,
}

/// The `[session]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inactivity_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning_before_logout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heartbeat_interval_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_debounce_ms: Option<u64>,
    /// Where users are sent after a forced logout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_entry_path: Option<String>,
}

impl CacheSection {
    fn merge(&mut self, other: CacheSection) {
        self.max_entries = other.max_entries.or(self.max_entries);
        self.default_ttl_secs = other.default_ttl_secs.or(self.default_ttl_secs);
        self.single_flight = other.single_flight.or(self.single_flight);
    }
}

impl SessionSection {
    fn merge(&mut self, other: SessionSection) {
        self.inactivity_timeout_secs = other
            .inactivity_timeout_secs
            .or(self.inactivity_timeout_secs);
        self.warning_before_logout_secs = other
            .warning_before_logout_secs
            .or(self.warning_before_logout_secs);
        self.heartbeat_interval_secs = other
            .heartbeat_interval_secs
            .or(self.heartbeat_interval_secs);
        self.activity_debounce_ms = other.activity_debounce_ms.or(self.activity_debounce_ms);
        if other.public_entry_path.is_some() {
            self.public_entry_path = other.public_entry_path;
        }
    }
}

impl VantageConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// A config with every field filled from `profile`'s defaults.
    pub fn template(profile: Profile) -> Self {
        let cache = CacheConfig::default();
        let session = default_session_config(profile);
        Self {
            profile: Some(profile),
            cache: Some(CacheSection {
                max_entries: Some(cache.max_entries),
                default_ttl_secs: Some(cache.default_ttl.as_secs()),
                single_flight: Some(cache.single_flight),
            }),
            session: Some(SessionSection {
                inactivity_timeout_secs: Some(session.inactivity_timeout.as_secs()),
                warning_before_logout_secs: Some(session.warning_before_logout.as_secs()),
                heartbeat_interval_secs: Some(session.heartbeat_interval.as_secs()),
                activity_debounce_ms: Some(session.activity_debounce.as_millis() as u64),
                public_entry_path: Some(session.public_entry_path),
            }),
        }
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: VantageConfig) {
        if other.profile.is_some() {
            self.profile = other.profile;
        }

        match (&mut self.cache, other.cache) {
            (Some(base), Some(layer)) => base.merge(layer),
            (None, Some(layer)) => self.cache = Some(layer),
            _ => {}
        }

        match (&mut self.session, other.session) {
            (Some(base), Some(layer)) => base.merge(layer),
            (None, Some(layer)) => self.session = Some(layer),
            _ => {}
        }
    }

    /// The selected profile, defaulting to production.
    pub fn profile(&self) -> Profile {
        self.profile.unwrap_or_default()
    }

    /// Resolve cache settings over the cache defaults, which are the same for every profile.
    pub fn cache_config(&self) -> CacheConfig {
        let mut config = CacheConfig::default();
        if let Some(ref section) = self.cache {
            if let Some(max) = section.max_entries {
                config = config.with_max_entries(max);
            }
            if let Some(secs) = section.default_ttl_secs {
                config = config.with_default_ttl(Duration::from_secs(secs));
            }
            if let Some(enabled) = section.single_flight {
                config = config.with_single_flight(enabled);
            }
        }
        config
    }

    /// Resolve session timeouts over the profile defaults and validate them.
    pub fn session_timeout_config(&self) -> Result<SessionTimeoutConfig> {
        let mut config = default_session_config(self.profile());
        if let Some(ref section) = self.session {
            if let Some(secs) = section.inactivity_timeout_secs {
                config = config.with_inactivity_timeout(Duration::from_secs(secs));
            }
            if let Some(secs) = section.warning_before_logout_secs {
                config = config.with_warning_before_logout(Duration::from_secs(secs));
            }
            if let Some(secs) = section.heartbeat_interval_secs {
                config = config.with_heartbeat_interval(Duration::from_secs(secs));
            }
            if let Some(ms) = section.activity_debounce_ms {
                config = config.with_activity_debounce(Duration::from_millis(ms));
            }
            if let Some(ref path) = section.public_entry_path {
                config = config.with_public_entry_path(path.clone());
            }
        }

        config
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(config)
    }
}

fn default_session_config(profile: Profile) -> SessionTimeoutConfig {
    match profile {
        Profile::Development => SessionTimeoutConfig::development(),
        Profile::Production => SessionTimeoutConfig::production(),
    }
}
