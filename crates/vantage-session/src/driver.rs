//! Tokio driver for [`SessionMonitor`].
//!
//! A single task owns the state machine. User actions arrive over a channel,
//! timer wake-ups are computed from the machine's next deadline, and both are
//! applied strictly in the order the task observes them.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SessionTimeoutConfig;
use crate::error::{Result, SessionError};
use crate::monitor::{Action, ActivityKind, Event, Phase, SessionMonitor, format_remaining};
use crate::provider::{SharedNavigator, SharedSessionProvider};

/// Snapshot of monitor state for the host view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    /// Current phase, or `None` while loading or without a session.
    pub phase: Option<Phase>,
    /// Whether the logout countdown should be visible.
    pub show_warning: bool,
    /// Remaining time before forced logout, as `m:ss`.
    pub time_remaining: String,
    /// Remaining time in milliseconds.
    pub remaining_ms: u64,
    pub is_authenticated: bool,
    /// True until the provider has answered whether a session exists.
    pub is_loading: bool,
}

impl SessionView {
    fn loading() -> Self {
        Self {
            phase: None,
            show_warning: false,
            time_remaining: format_remaining(Duration::ZERO),
            remaining_ms: 0,
            is_authenticated: false,
            is_loading: true,
        }
    }

    fn anonymous() -> Self {
        Self {
            is_loading: false,
            ..Self::loading()
        }
    }

    fn from_monitor(monitor: &SessionMonitor, now: Instant) -> Self {
        let phase = monitor.phase();
        let remaining = monitor.time_remaining(now);
        Self {
            phase: Some(phase),
            show_warning: phase == Phase::Warning,
            time_remaining: format_remaining(remaining),
            remaining_ms: remaining.as_millis() as u64,
            is_authenticated: phase != Phase::Expired,
            is_loading: false,
        }
    }
}

/// Running session lifetime monitor bound to one authenticated view.
///
/// Dropping the monitor (or calling [`unmount`](Self::unmount)) cancels all
/// pending timers and stops processing events.
#[derive(Debug)]
pub struct LifetimeMonitor {
    events: mpsc::UnboundedSender<Event>,
    view: watch::Receiver<SessionView>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl LifetimeMonitor {
    /// Validate `config` and start monitoring on the current tokio runtime.
    pub fn mount(
        config: SessionTimeoutConfig,
        provider: SharedSessionProvider,
        navigator: SharedNavigator,
    ) -> Result<Self> {
        config.validate()?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(SessionView::loading());
        let cancel = CancellationToken::new();

        let driver = Driver {
            config,
            provider,
            navigator,
            events: events_rx,
            view: view_tx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(driver.run());

        Ok(Self {
            events: events_tx,
            view: view_rx,
            cancel,
            task: Some(task),
        })
    }

    /// Report a user interaction.
    pub fn record_activity(&self, kind: ActivityKind) -> Result<()> {
        self.send(Event::Activity(kind))
    }

    /// Explicitly extend the session (e.g. the "stay signed in" button).
    pub fn keep_session_active(&self) -> Result<()> {
        self.send(Event::KeepAlive)
    }

    /// Sign out immediately.
    pub fn logout_now(&self) -> Result<()> {
        self.send(Event::LogoutNow)
    }

    /// Current view snapshot.
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// Receiver that is notified on every view change.
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    /// Stop monitoring and wait for the driver task to finish.
    pub async fn unmount(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            warn!(error = %e, "Session monitor task ended abnormally");
        }
    }

    fn send(&self, event: Event) -> Result<()> {
        self.events
            .send(event)
            .map_err(|_| SessionError::MonitorClosed)
    }
}

impl Drop for LifetimeMonitor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct Driver {
    config: SessionTimeoutConfig,
    provider: SharedSessionProvider,
    navigator: SharedNavigator,
    events: mpsc::UnboundedReceiver<Event>,
    view: watch::Sender<SessionView>,
    cancel: CancellationToken,
}

impl Driver {
    async fn run(mut self) {
        let authenticated = tokio::select! {
            _ = self.cancel.cancelled() => return,
            result = self.provider.is_authenticated() => match result {
                Ok(authenticated) => authenticated,
                Err(e) => {
                    warn!(error = %e, "Could not determine session state, treating as signed out");
                    false
                }
            },
        };

        if !authenticated {
            debug!("No authenticated session, monitor inactive");
            self.view.send_replace(SessionView::anonymous());
            return;
        }

        let mut monitor = SessionMonitor::new(self.config.clone(), Instant::now());
        self.publish(&monitor);
        info!(
            inactivity_timeout_ms = self.config.inactivity_timeout.as_millis() as u64,
            warning_ms = self.config.warning_before_logout.as_millis() as u64,
            "Session monitor mounted"
        );

        loop {
            let Some(wake_at) = self.next_wake(&monitor) else {
                break;
            };

            let event = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!("Session monitor unmounted");
                    break;
                }
                received = self.events.recv() => match received {
                    Some(event) => event,
                    None => break,
                },
                _ = sleep_until(wake_at) => Event::Tick,
            };

            let actions = monitor.handle(event, Instant::now());
            for action in actions {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => {
                        debug!("Session monitor unmounted during provider call");
                        return;
                    }
                    _ = self.perform(action) => {}
                }
            }
            self.publish(&monitor);

            if monitor.phase() == Phase::Expired {
                break;
            }
        }
    }

    /// Wake for the next phase deadline, or sooner to refresh the countdown.
    fn next_wake(&self, monitor: &SessionMonitor) -> Option<Instant> {
        let deadline = monitor.next_deadline()?;
        if monitor.phase() == Phase::Warning {
            let refresh = Instant::now() + self.config.countdown_refresh;
            Some(deadline.min(refresh))
        } else {
            Some(deadline)
        }
    }

    async fn perform(&self, action: Action) {
        match action {
            Action::ShowWarning { remaining } => {
                debug!(remaining = %format_remaining(remaining), "Warning shown");
            }
            Action::DismissWarning => {
                debug!("Warning dismissed");
            }
            Action::Heartbeat => {
                if let Err(e) = self.provider.heartbeat().await {
                    warn!(error = %e, "Session heartbeat failed");
                }
            }
            Action::SignOut { reason } => {
                if let Err(e) = self.provider.sign_out().await {
                    warn!(error = %e, ?reason, "Sign-out failed, leaving authenticated area anyway");
                }
                if self.cancel.is_cancelled() {
                    return;
                }
                self.navigator.redirect(&self.config.public_entry_path);
            }
        }
    }

    fn publish(&self, monitor: &SessionMonitor) {
        self.view
            .send_replace(SessionView::from_monitor(monitor, Instant::now()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::time::sleep;

    use async_trait::async_trait;

    use crate::provider::{InMemorySessionProvider, RecordingNavigator, SessionProvider};

    /// Provider whose sign-out takes far longer than any test waits.
    #[derive(Debug)]
    struct SlowSignOutProvider;

    #[async_trait]
    impl SessionProvider for SlowSignOutProvider {
        async fn is_authenticated(&self) -> Result<bool> {
            Ok(true)
        }

        async fn sign_out(&self) -> Result<()> {
            sleep(Duration::from_secs(5)).await;
            Ok(())
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn config() -> SessionTimeoutConfig {
        SessionTimeoutConfig::default()
            .with_inactivity_timeout(ms(2000))
            .with_warning_before_logout(ms(500))
            .with_heartbeat_interval(ms(1000))
            .with_activity_debounce(ms(300))
            .with_countdown_refresh(ms(100))
            .with_public_entry_path("/login")
    }

    fn mount(
        provider: InMemorySessionProvider,
    ) -> (
        LifetimeMonitor,
        Arc<InMemorySessionProvider>,
        Arc<RecordingNavigator>,
    ) {
        let provider = Arc::new(provider);
        let navigator = Arc::new(RecordingNavigator::new());
        let monitor = LifetimeMonitor::mount(config(), provider.clone(), navigator.clone())
            .expect("valid config");
        (monitor, provider, navigator)
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_session_is_signed_out() {
        let (monitor, provider, navigator) = mount(InMemorySessionProvider::authenticated());
        assert!(monitor.view().is_loading);

        sleep(ms(1499)).await;
        let view = monitor.view();
        assert!(!view.is_loading);
        assert!(view.is_authenticated);
        assert_eq!(view.phase, Some(Phase::Active));
        assert!(!view.show_warning);

        sleep(ms(2)).await;
        let view = monitor.view();
        assert_eq!(view.phase, Some(Phase::Warning));
        assert!(view.show_warning);
        assert_eq!(view.remaining_ms, 500);
        assert_eq!(view.time_remaining, "0:01");

        sleep(ms(500)).await;
        let view = monitor.view();
        assert_eq!(view.phase, Some(Phase::Expired));
        assert!(!view.is_authenticated);
        assert_eq!(provider.sign_out_count(), 1);
        assert_eq!(navigator.redirects(), vec!["/login"]);

        sleep(ms(10_000)).await;
        assert_eq!(provider.sign_out_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_refreshes_during_warning() {
        let (monitor, _provider, _navigator) = mount(InMemorySessionProvider::authenticated());
        let rx = monitor.subscribe();

        sleep(ms(1501)).await;
        assert_eq!(monitor.view().remaining_ms, 500);

        sleep(ms(100)).await;
        assert_eq!(monitor.view().remaining_ms, 400);
        assert!(rx.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_keep_session_active_restarts_window() {
        let (monitor, provider, navigator) = mount(InMemorySessionProvider::authenticated());

        sleep(ms(1600)).await;
        assert_eq!(monitor.view().phase, Some(Phase::Warning));

        monitor.keep_session_active().unwrap();
        sleep(ms(1)).await;
        let view = monitor.view();
        assert_eq!(view.phase, Some(Phase::Active));
        assert!(!view.show_warning);
        assert_eq!(provider.heartbeat_count(), 1);

        // New window started at 1600ms: warning again at 3100ms.
        sleep(ms(1498)).await;
        assert_eq!(monitor.view().phase, Some(Phase::Active));
        sleep(ms(2)).await;
        assert_eq!(monitor.view().phase, Some(Phase::Warning));
        assert!(navigator.redirects().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_bursts_keep_session_alive() {
        let (monitor, provider, _navigator) = mount(InMemorySessionProvider::authenticated());

        for _ in 0..40 {
            sleep(ms(100)).await;
            monitor.record_activity(ActivityKind::PointerMove).unwrap();
        }
        sleep(ms(1)).await;

        assert_eq!(monitor.view().phase, Some(Phase::Active));
        assert_eq!(provider.sign_out_count(), 0);
        // Heartbeats are spaced at least heartbeat_interval apart over ~4s.
        assert!(provider.heartbeat_count() <= 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_out_failure_still_redirects() {
        let (monitor, provider, navigator) =
            mount(InMemorySessionProvider::authenticated().fail_sign_out());

        sleep(ms(2001)).await;
        assert_eq!(provider.sign_out_count(), 1);
        assert_eq!(navigator.redirects(), vec!["/login"]);
        assert_eq!(monitor.view().phase, Some(Phase::Expired));
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_now() {
        let (monitor, provider, navigator) = mount(InMemorySessionProvider::authenticated());

        sleep(ms(10)).await;
        monitor.logout_now().unwrap();
        sleep(ms(1)).await;

        assert_eq!(provider.sign_out_count(), 1);
        assert_eq!(navigator.redirects(), vec!["/login"]);
        assert_eq!(monitor.view().phase, Some(Phase::Expired));

        // The driver has stopped; further events are rejected.
        assert!(matches!(
            monitor.keep_session_active(),
            Err(SessionError::MonitorClosed)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_anonymous_monitor_is_inert() {
        let (monitor, provider, navigator) = mount(InMemorySessionProvider::anonymous());

        sleep(ms(10_000)).await;
        let view = monitor.view();
        assert!(!view.is_loading);
        assert!(!view.is_authenticated);
        assert_eq!(view.phase, None);
        assert_eq!(provider.sign_out_count(), 0);
        assert!(navigator.redirects().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_cancels_timers() {
        let (monitor, provider, navigator) = mount(InMemorySessionProvider::authenticated());
        sleep(ms(100)).await;

        monitor.unmount().await;
        sleep(ms(10_000)).await;

        assert_eq!(provider.sign_out_count(), 0);
        assert!(navigator.redirects().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_timers() {
        let (monitor, provider, _navigator) = mount(InMemorySessionProvider::authenticated());
        sleep(ms(100)).await;

        drop(monitor);
        sleep(ms(10_000)).await;

        assert_eq!(provider.sign_out_count(), 0);
    }

    #[tokio::test]
    async fn test_mount_rejects_invalid_config() {
        let result = LifetimeMonitor::mount(
            SessionTimeoutConfig::default().with_inactivity_timeout(Duration::ZERO),
            Arc::new(InMemorySessionProvider::authenticated()),
            Arc::new(RecordingNavigator::new()),
        );
        assert!(matches!(result, Err(SessionError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_mount_rejects_timeout_that_would_overflow() {
        let result = LifetimeMonitor::mount(
            config()
                .with_inactivity_timeout(Duration::from_secs(u64::MAX))
                .with_warning_before_logout(Duration::from_secs(60)),
            Arc::new(InMemorySessionProvider::authenticated()),
            Arc::new(RecordingNavigator::new()),
        );
        assert!(matches!(result, Err(SessionError::InvalidConfig(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_interrupts_slow_sign_out() {
        let navigator = Arc::new(RecordingNavigator::new());
        let monitor =
            LifetimeMonitor::mount(config(), Arc::new(SlowSignOutProvider), navigator.clone())
                .expect("valid config");

        sleep(ms(10)).await;
        monitor.logout_now().unwrap();
        sleep(ms(100)).await;

        let started = Instant::now();
        monitor.unmount().await;
        assert!(started.elapsed() < ms(1000));

        sleep(ms(10_000)).await;
        assert!(navigator.redirects().is_empty());
    }
}
