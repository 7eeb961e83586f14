//! Capabilities the monitor needs from its host.
//!
//! The monitor never looks up session state on its own; the host injects an
//! authenticated-session accessor and a way to leave the authenticated area.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Result, SessionError};

// ============================================================================
// Traits
// ============================================================================

/// External identity/session provider.
#[async_trait]
pub trait SessionProvider: Send + Sync + std::fmt::Debug {
    /// Whether the current user has an authenticated session.
    async fn is_authenticated(&self) -> Result<bool>;

    /// End the session with the provider.
    async fn sign_out(&self) -> Result<()>;

    /// Extend the provider's own session lifetime.
    ///
    /// Default implementation does nothing.
    async fn heartbeat(&self) -> Result<()> {
        Ok(())
    }
}

/// Moves the user to another location in the host application.
pub trait Navigator: Send + Sync + std::fmt::Debug {
    fn redirect(&self, path: &str);
}

/// Shared session provider for use across async contexts.
pub type SharedSessionProvider = Arc<dyn SessionProvider>;

/// Shared navigator.
pub type SharedNavigator = Arc<dyn Navigator>;

// ============================================================================
// InMemorySessionProvider (for testing and simulation)
// ============================================================================

/// In-memory session provider for testing and local simulation.
#[derive(Debug)]
pub struct InMemorySessionProvider {
    authenticated: AtomicBool,
    fail_sign_out: AtomicBool,
    sign_out_count: AtomicU32,
    heartbeat_count: AtomicU32,
}

impl InMemorySessionProvider {
    /// A provider with an authenticated session.
    pub fn authenticated() -> Self {
        Self::with_state(true)
    }

    /// A provider with no session.
    pub fn anonymous() -> Self {
        Self::with_state(false)
    }

    fn with_state(authenticated: bool) -> Self {
        Self {
            authenticated: AtomicBool::new(authenticated),
            fail_sign_out: AtomicBool::new(false),
            sign_out_count: AtomicU32::new(0),
            heartbeat_count: AtomicU32::new(0),
        }
    }

    /// Make every subsequent sign-out call fail.
    pub fn fail_sign_out(self) -> Self {
        self.fail_sign_out.store(true, Ordering::SeqCst);
        self
    }

    pub fn sign_out_count(&self) -> u32 {
        self.sign_out_count.load(Ordering::SeqCst)
    }

    pub fn heartbeat_count(&self) -> u32 {
        self.heartbeat_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionProvider for InMemorySessionProvider {
    async fn is_authenticated(&self) -> Result<bool> {
        Ok(self.authenticated.load(Ordering::SeqCst))
    }

    async fn sign_out(&self) -> Result<()> {
        self.sign_out_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(SessionError::Provider(
                "simulated sign-out failure".to_string(),
            ));
        }
        self.authenticated.store(false, Ordering::SeqCst);
        tracing::debug!("InMemorySessionProvider: signed out");
        Ok(())
    }

    async fn heartbeat(&self) -> Result<()> {
        self.heartbeat_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// RecordingNavigator
// ============================================================================

/// Navigator that records every redirect instead of performing it.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    redirects: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths redirected to, oldest first.
    pub fn redirects(&self) -> Vec<String> {
        self.redirects.lock().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, path: &str) {
        self.redirects.lock().push(path.to_string());
    }
}
