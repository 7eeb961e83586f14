//! Session lifetime monitor for authenticated dashboard views.
//!
//! Tracks user inactivity, warns before a forced logout and signs the user
//! out when the warning runs out. The crate is split in two:
//!
//! - [`SessionMonitor`]: a pure state machine. Timer ticks and user activity
//!   are both [`Event`]s fed through one `now`-driven transition function,
//!   which returns the [`Action`]s the host must perform.
//! - [`LifetimeMonitor`]: a tokio driver that owns the timers, feeds events
//!   in order, calls the injected [`SessionProvider`] and [`Navigator`], and
//!   publishes a [`SessionView`] for the host view.
//!
//! # Example
//!
//! ```rust,ignore
//! use vantage_session::{LifetimeMonitor, SessionTimeoutConfig, ActivityKind};
//!
//! let monitor = LifetimeMonitor::mount(
//!     SessionTimeoutConfig::production(),
//!     provider,
//!     navigator,
//! )?;
//!
//! monitor.record_activity(ActivityKind::KeyPress)?;
//! let view = monitor.view();
//! if view.show_warning {
//!     println!("Logging out in {}", view.time_remaining);
//! }
//! ```

mod config;
mod driver;
mod error;
mod monitor;
mod provider;

pub use config::SessionTimeoutConfig;
pub use driver::{LifetimeMonitor, SessionView};
pub use error::{Result, SessionError};
pub use monitor::{
    Action, ActivityKind, Event, Phase, SessionMonitor, SignOutReason, format_remaining,
};
pub use provider::{
    InMemorySessionProvider, Navigator, RecordingNavigator, SessionProvider,
    SharedNavigator, SharedSessionProvider,
};
