//! Inactivity state machine.
//!
//! Every input, whether a timer tick or a user interaction, goes through
//! [`SessionMonitor::handle`] together with the current instant. Time-driven
//! transitions are applied first, so an event that arrives at or after a
//! deadline always observes the later phase.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, trace};

use crate::config::SessionTimeoutConfig;

/// Lifecycle phase within one inactivity cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Active,
    Warning,
    Expired,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Active => "active",
            Phase::Warning => "warning",
            Phase::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// Kinds of user interaction that count as activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    PointerMove,
    KeyPress,
    PointerDown,
    TouchStart,
    Scroll,
}

/// Input to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A timer fired; only time-driven transitions apply.
    Tick,
    /// Raw user activity, subject to debouncing.
    Activity(ActivityKind),
    /// The user explicitly asked to stay signed in.
    KeepAlive,
    /// The user asked to sign out now.
    LogoutNow,
}

/// Why the session is being signed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutReason {
    Inactivity,
    UserRequested,
}

/// Side effect the host must perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Show the logout countdown.
    ShowWarning { remaining: Duration },
    /// Hide the logout countdown.
    DismissWarning,
    /// Extend the external session.
    Heartbeat,
    /// Sign out with the provider, then leave the authenticated area.
    SignOut { reason: SignOutReason },
}

/// Inactivity tracker for one authenticated view.
#[derive(Debug, Clone)]
pub struct SessionMonitor {
    config: SessionTimeoutConfig,
    phase: Phase,
    last_activity_at: Instant,
    last_heartbeat_at: Instant,
    warning_deadline: Option<Instant>,
}

impl SessionMonitor {
    /// Start a fresh cycle in [`Phase::Active`] at `now`.
    pub fn new(config: SessionTimeoutConfig, now: Instant) -> Self {
        Self {
            config,
            phase: Phase::Active,
            last_activity_at: now,
            last_heartbeat_at: now,
            warning_deadline: None,
        }
    }

    pub fn config(&self) -> &SessionTimeoutConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn last_activity_at(&self) -> Instant {
        self.last_activity_at
    }

    /// Instant at which the warning turns into a logout, while warning.
    pub fn warning_deadline(&self) -> Option<Instant> {
        self.warning_deadline
    }

    /// Time left until forced logout.
    pub fn time_remaining(&self, now: Instant) -> Duration {
        match self.phase {
            Phase::Active => (self.last_activity_at + self.config.inactivity_timeout)
                .saturating_duration_since(now),
            Phase::Warning => self
                .warning_deadline
                .map(|d| d.saturating_duration_since(now))
                .unwrap_or_default(),
            Phase::Expired => Duration::ZERO,
        }
    }

    /// Next instant at which a [`Event::Tick`] would change the phase.
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.phase {
            Phase::Active => Some(self.last_activity_at + self.config.warning_after()),
            Phase::Warning => self.warning_deadline,
            Phase::Expired => None,
        }
    }

    /// Apply `event` at `now` and return the actions to perform, in order.
    pub fn handle(&mut self, event: Event, now: Instant) -> Vec<Action> {
        let mut actions = Vec::new();
        self.advance(now, &mut actions);

        if self.phase == Phase::Expired {
            if actions.is_empty() {
                trace!(?event, "Session already expired, ignoring event");
            }
            return actions;
        }

        match event {
            Event::Tick => {}
            Event::Activity(kind) => {
                let since = now.saturating_duration_since(self.last_activity_at);
                if since < self.config.activity_debounce {
                    trace!(?kind, "Activity within debounce window, coalesced");
                } else {
                    trace!(?kind, "Activity accepted");
                    self.renew(now, &mut actions);
                }
            }
            Event::KeepAlive => {
                debug!("Session kept alive by user");
                self.renew(now, &mut actions);
            }
            Event::LogoutNow => self.expire(SignOutReason::UserRequested, &mut actions),
        }

        actions
    }

    /// Apply time-driven transitions up to `now`.
    fn advance(&mut self, now: Instant, actions: &mut Vec<Action>) {
        if self.phase == Phase::Active
            && now >= self.last_activity_at + self.config.warning_after()
        {
            let deadline = self.last_activity_at + self.config.inactivity_timeout;
            self.phase = Phase::Warning;
            self.warning_deadline = Some(deadline);
            let remaining = deadline.saturating_duration_since(now);
            info!(
                remaining = %format_remaining(remaining),
                "Session inactive, showing logout warning"
            );
            actions.push(Action::ShowWarning { remaining });
        }

        if self.phase == Phase::Warning
            && self.warning_deadline.is_some_and(|deadline| now >= deadline)
        {
            self.expire(SignOutReason::Inactivity, actions);
        }
    }

    /// Back to `Active` with a fresh inactivity window starting at `now`.
    fn renew(&mut self, now: Instant, actions: &mut Vec<Action>) {
        if self.phase == Phase::Warning {
            info!("Session renewed during warning");
            actions.push(Action::DismissWarning);
        }

        self.phase = Phase::Active;
        self.last_activity_at = now;
        self.warning_deadline = None;

        if now.saturating_duration_since(self.last_heartbeat_at) >= self.config.heartbeat_interval
        {
            self.last_heartbeat_at = now;
            actions.push(Action::Heartbeat);
        }
    }

    fn expire(&mut self, reason: SignOutReason, actions: &mut Vec<Action>) {
        info!(?reason, "Session expired, signing out");
        self.phase = Phase::Expired;
        self.warning_deadline = None;
        actions.push(Action::SignOut { reason });
    }
}

/// Render a remaining duration as `m:ss`, rounding up to the next second.
pub fn format_remaining(remaining: Duration) -> String {
    let millis = remaining.as_millis();
    let secs = millis.div_ceil(1000);
    format!("{}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn config() -> SessionTimeoutConfig {
        SessionTimeoutConfig::default()
            .with_inactivity_timeout(ms(2000))
            .with_warning_before_logout(ms(500))
            .with_heartbeat_interval(ms(1000))
            .with_activity_debounce(ms(300))
    }

    fn sign_outs(actions: &[Action]) -> usize {
        actions
            .iter()
            .filter(|a| matches!(a, Action::SignOut { .. }))
            .count()
    }

    #[test]
    fn test_idle_session_warns_then_expires() {
        let t0 = Instant::now();
        let mut monitor = SessionMonitor::new(config(), t0);

        assert!(monitor.handle(Event::Tick, t0 + ms(1499)).is_empty());
        assert_eq!(monitor.phase(), Phase::Active);

        let actions = monitor.handle(Event::Tick, t0 + ms(1500));
        assert_eq!(actions, vec![Action::ShowWarning { remaining: ms(500) }]);
        assert_eq!(monitor.phase(), Phase::Warning);
        assert_eq!(monitor.time_remaining(t0 + ms(1500)), ms(500));
        assert_eq!(monitor.warning_deadline(), Some(t0 + ms(2000)));

        let mut total_sign_outs = 0;
        total_sign_outs += sign_outs(&monitor.handle(Event::Tick, t0 + ms(1999)));
        assert_eq!(monitor.phase(), Phase::Warning);

        let actions = monitor.handle(Event::Tick, t0 + ms(2000));
        total_sign_outs += sign_outs(&actions);
        assert_eq!(
            actions,
            vec![Action::SignOut {
                reason: SignOutReason::Inactivity
            }]
        );
        assert_eq!(monitor.phase(), Phase::Expired);

        total_sign_outs += sign_outs(&monitor.handle(Event::Tick, t0 + ms(5000)));
        assert_eq!(total_sign_outs, 1);
    }

    #[test]
    fn test_keep_alive_during_warning_starts_new_window() {
        let t0 = Instant::now();
        let mut monitor = SessionMonitor::new(config(), t0);

        monitor.handle(Event::Tick, t0 + ms(1500));
        assert_eq!(monitor.phase(), Phase::Warning);

        let actions = monitor.handle(Event::KeepAlive, t0 + ms(1600));
        assert_eq!(actions, vec![Action::DismissWarning, Action::Heartbeat]);
        assert_eq!(monitor.phase(), Phase::Active);
        assert_eq!(monitor.last_activity_at(), t0 + ms(1600));
        assert_eq!(monitor.next_deadline(), Some(t0 + ms(3100)));

        assert!(monitor.handle(Event::Tick, t0 + ms(3099)).is_empty());
        assert_eq!(monitor.phase(), Phase::Active);
        monitor.handle(Event::Tick, t0 + ms(3100));
        assert_eq!(monitor.phase(), Phase::Warning);
    }

    #[test]
    fn test_activity_during_warning_returns_to_active() {
        let t0 = Instant::now();
        let mut monitor = SessionMonitor::new(config(), t0);

        monitor.handle(Event::Tick, t0 + ms(1700));
        let actions = monitor.handle(Event::Activity(ActivityKind::Scroll), t0 + ms(1800));
        assert!(actions.contains(&Action::DismissWarning));
        assert_eq!(monitor.phase(), Phase::Active);
    }

    #[test]
    fn test_activity_is_debounced() {
        let t0 = Instant::now();
        let mut monitor = SessionMonitor::new(config(), t0);

        monitor.handle(Event::Activity(ActivityKind::PointerMove), t0 + ms(400));
        assert_eq!(monitor.last_activity_at(), t0 + ms(400));

        for offset in [450, 500, 600, 699] {
            monitor.handle(Event::Activity(ActivityKind::PointerMove), t0 + ms(offset));
            assert_eq!(monitor.last_activity_at(), t0 + ms(400));
        }

        monitor.handle(Event::Activity(ActivityKind::KeyPress), t0 + ms(700));
        assert_eq!(monitor.last_activity_at(), t0 + ms(700));
    }

    #[test]
    fn test_keep_alive_is_not_debounced() {
        let t0 = Instant::now();
        let mut monitor = SessionMonitor::new(config(), t0);

        monitor.handle(Event::KeepAlive, t0 + ms(10));
        assert_eq!(monitor.last_activity_at(), t0 + ms(10));
        monitor.handle(Event::KeepAlive, t0 + ms(20));
        assert_eq!(monitor.last_activity_at(), t0 + ms(20));
    }

    #[test]
    fn test_activity_after_expiry_is_ignored() {
        let t0 = Instant::now();
        let mut monitor = SessionMonitor::new(config(), t0);

        monitor.handle(Event::Tick, t0 + ms(2000));
        assert_eq!(monitor.phase(), Phase::Expired);

        for event in [
            Event::Activity(ActivityKind::TouchStart),
            Event::KeepAlive,
            Event::LogoutNow,
        ] {
            assert!(monitor.handle(event, t0 + ms(2500)).is_empty());
            assert_eq!(monitor.phase(), Phase::Expired);
        }
        assert_eq!(monitor.next_deadline(), None);
        assert_eq!(monitor.time_remaining(t0 + ms(2500)), Duration::ZERO);
    }

    #[test]
    fn test_activity_at_deadline_loses_to_expiry() {
        let t0 = Instant::now();
        let mut monitor = SessionMonitor::new(config(), t0);

        monitor.handle(Event::Tick, t0 + ms(1500));
        let actions = monitor.handle(Event::KeepAlive, t0 + ms(2000));
        assert_eq!(
            actions,
            vec![Action::SignOut {
                reason: SignOutReason::Inactivity
            }]
        );
        assert_eq!(monitor.phase(), Phase::Expired);
    }

    #[test]
    fn test_late_tick_warns_and_expires_at_once() {
        let t0 = Instant::now();
        let mut monitor = SessionMonitor::new(config(), t0);

        let actions = monitor.handle(Event::Tick, t0 + ms(10_000));
        assert_eq!(
            actions,
            vec![
                Action::ShowWarning {
                    remaining: Duration::ZERO
                },
                Action::SignOut {
                    reason: SignOutReason::Inactivity
                },
            ]
        );
    }

    #[test]
    fn test_logout_now() {
        let t0 = Instant::now();
        let mut monitor = SessionMonitor::new(config(), t0);

        let actions = monitor.handle(Event::LogoutNow, t0 + ms(100));
        assert_eq!(
            actions,
            vec![Action::SignOut {
                reason: SignOutReason::UserRequested
            }]
        );
        assert_eq!(monitor.phase(), Phase::Expired);
    }

    #[test]
    fn test_heartbeat_is_rate_limited() {
        let t0 = Instant::now();
        let mut monitor = SessionMonitor::new(config(), t0);

        // Mount counts as the first heartbeat.
        let early = monitor.handle(Event::Activity(ActivityKind::KeyPress), t0 + ms(500));
        assert!(!early.contains(&Action::Heartbeat));

        let due = monitor.handle(Event::Activity(ActivityKind::KeyPress), t0 + ms(1000));
        assert_eq!(due, vec![Action::Heartbeat]);

        let again = monitor.handle(Event::Activity(ActivityKind::KeyPress), t0 + ms(1400));
        assert!(again.is_empty());
    }

    #[test]
    fn test_phase_never_moves_backwards_without_renewal() {
        let t0 = Instant::now();
        let mut monitor = SessionMonitor::new(config(), t0);
        let mut last = monitor.phase();

        for offset in (0..=3000).step_by(100) {
            monitor.handle(Event::Tick, t0 + ms(offset));
            assert!(monitor.phase() >= last);
            last = monitor.phase();
        }
        assert_eq!(last, Phase::Expired);
    }

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(Duration::ZERO), "0:00");
        assert_eq!(format_remaining(ms(500)), "0:01");
        assert_eq!(format_remaining(ms(30_000)), "0:30");
        assert_eq!(format_remaining(ms(119_001)), "2:00");
        assert_eq!(format_remaining(Duration::from_secs(125)), "2:05");
    }
}
