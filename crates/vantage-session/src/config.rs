//! Configuration for the session lifetime monitor.

use std::time::Duration;

use crate::error::{Result, SessionError};

/// Debounce window applied to raw activity events.
pub const DEFAULT_ACTIVITY_DEBOUNCE: Duration = Duration::from_millis(300);

/// How often the countdown text is refreshed while warning.
pub const DEFAULT_COUNTDOWN_REFRESH: Duration = Duration::from_secs(1);

/// Upper bound for every configured duration; deadlines are computed as
/// `Instant + duration` and must not overflow.
pub const MAX_DURATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Where users land after a forced logout.
pub const DEFAULT_PUBLIC_ENTRY_PATH: &str = "/";

/// Timing configuration for [`SessionMonitor`](crate::SessionMonitor).
///
/// The warning is shown once `inactivity_timeout - warning_before_logout`
/// has passed without activity, and the user is signed out when the full
/// `inactivity_timeout` is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTimeoutConfig {
    /// Total idle time before forced logout.
    pub inactivity_timeout: Duration,

    /// Length of the warning countdown that ends the idle period.
    pub warning_before_logout: Duration,

    /// Minimum spacing between heartbeats sent to the session provider.
    pub heartbeat_interval: Duration,

    /// Activity events closer together than this are coalesced.
    pub activity_debounce: Duration,

    /// Refresh period for the remaining-time display during the warning.
    pub countdown_refresh: Duration,

    /// Public, unauthenticated path to redirect to after logout.
    pub public_entry_path: String,
}

impl Default for SessionTimeoutConfig {
    fn default() -> Self {
        Self::production()
    }
}

impl SessionTimeoutConfig {
    /// Short timeouts for manual testing.
    pub fn development() -> Self {
        Self {
            inactivity_timeout: Duration::from_secs(2 * 60),
            warning_before_logout: Duration::from_secs(30),
            heartbeat_interval: Duration::from_secs(30),
            activity_debounce: DEFAULT_ACTIVITY_DEBOUNCE,
            countdown_refresh: DEFAULT_COUNTDOWN_REFRESH,
            public_entry_path: DEFAULT_PUBLIC_ENTRY_PATH.to_string(),
        }
    }

    /// Timeouts for deployed dashboards.
    pub fn production() -> Self {
        Self {
            inactivity_timeout: Duration::from_secs(30 * 60),
            warning_before_logout: Duration::from_secs(2 * 60),
            heartbeat_interval: Duration::from_secs(5 * 60),
            activity_debounce: DEFAULT_ACTIVITY_DEBOUNCE,
            countdown_refresh: DEFAULT_COUNTDOWN_REFRESH,
            public_entry_path: DEFAULT_PUBLIC_ENTRY_PATH.to_string(),
        }
    }

    pub fn with_inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.inactivity_timeout = timeout;
        self
    }

    pub fn with_warning_before_logout(mut self, warning: Duration) -> Self {
        self.warning_before_logout = warning;
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_activity_debounce(mut self, debounce: Duration) -> Self {
        self.activity_debounce = debounce;
        self
    }

    pub fn with_countdown_refresh(mut self, refresh: Duration) -> Self {
        self.countdown_refresh = refresh;
        self
    }

    pub fn with_public_entry_path(mut self, path: impl Into<String>) -> Self {
        self.public_entry_path = path.into();
        self
    }

    /// Idle time after which the warning is shown.
    pub fn warning_after(&self) -> Duration {
        self.inactivity_timeout
            .saturating_sub(self.warning_before_logout)
    }

    /// Reject configurations that would produce meaningless timers.
    pub fn validate(&self) -> Result<()> {
        if self.inactivity_timeout.is_zero() {
            return Err(SessionError::InvalidConfig(
                "inactivity_timeout must be greater than zero".to_string(),
            ));
        }
        if self.warning_before_logout.is_zero() {
            return Err(SessionError::InvalidConfig(
                "warning_before_logout must be greater than zero".to_string(),
            ));
        }
        if self.warning_before_logout >= self.inactivity_timeout {
            return Err(SessionError::InvalidConfig(format!(
                "warning_before_logout ({:?}) must be shorter than inactivity_timeout ({:?})",
                self.warning_before_logout, self.inactivity_timeout
            )));
        }
        if self.countdown_refresh.is_zero() {
            return Err(SessionError::InvalidConfig(
                "countdown_refresh must be greater than zero".to_string(),
            ));
        }

        let bounded = [
            ("inactivity_timeout", self.inactivity_timeout),
            ("heartbeat_interval", self.heartbeat_interval),
            ("activity_debounce", self.activity_debounce),
            ("countdown_refresh", self.countdown_refresh),
        ];
        for (name, value) in bounded {
            if value > MAX_DURATION {
                return Err(SessionError::InvalidConfig(format!(
                    "{} ({:?}) exceeds the maximum of {:?}",
                    name, value, MAX_DURATION
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles_are_valid() {
        assert!(SessionTimeoutConfig::development().validate().is_ok());
        assert!(SessionTimeoutConfig::production().validate().is_ok());
        assert!(
            SessionTimeoutConfig::development().inactivity_timeout
                < SessionTimeoutConfig::production().inactivity_timeout
        );
    }

    #[test]
    fn test_warning_after() {
        let config = SessionTimeoutConfig::default()
            .with_inactivity_timeout(Duration::from_millis(2000))
            .with_warning_before_logout(Duration::from_millis(500));
        assert_eq!(config.warning_after(), Duration::from_millis(1500));
    }

    #[test]
    fn test_validate_rejects_bad_durations() {
        let zero = SessionTimeoutConfig::default().with_inactivity_timeout(Duration::ZERO);
        assert!(matches!(zero.validate(), Err(SessionError::InvalidConfig(_))));

        let inverted = SessionTimeoutConfig::default()
            .with_inactivity_timeout(Duration::from_secs(10))
            .with_warning_before_logout(Duration::from_secs(10));
        assert!(matches!(
            inverted.validate(),
            Err(SessionError::InvalidConfig(_))
        ));

        let no_refresh = SessionTimeoutConfig::default().with_countdown_refresh(Duration::ZERO);
        assert!(no_refresh.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_durations_past_max() {
        let huge = SessionTimeoutConfig::default()
            .with_inactivity_timeout(Duration::from_secs(u64::MAX))
            .with_warning_before_logout(Duration::from_secs(60));
        assert!(matches!(huge.validate(), Err(SessionError::InvalidConfig(_))));

        let refresh = SessionTimeoutConfig::default().with_countdown_refresh(Duration::MAX);
        assert!(refresh.validate().is_err());

        let at_max = SessionTimeoutConfig::default().with_inactivity_timeout(MAX_DURATION);
        assert!(at_max.validate().is_ok());
    }
}
