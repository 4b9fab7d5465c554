//! Authentication gate.
//!
//! Reminder cycles must not run before the session is known. [`InitGate`]
//! resolves exactly once, either signed in or signed out, and every waiter
//! observes the same outcome.

use tokio::sync::watch;
use tracing::{debug, warn};

/// Whether a user session exists, and when that becomes known.
#[async_trait::async_trait]
pub trait AuthGate: Send + Sync {
    /// Whether a user is currently signed in.
    fn is_signed_in(&self) -> bool;

    /// Resolve once authentication initialization has finished.
    async fn wait_for_init(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthState {
    Pending,
    Ready { signed_in: bool },
}

/// Gate backed by a `watch` channel.
#[derive(Debug)]
pub struct InitGate {
    tx: watch::Sender<AuthState>,
}

impl InitGate {
    /// A gate that has not finished initializing.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(AuthState::Pending);
        Self { tx }
    }

    /// A gate that is already initialized with a signed-in user.
    #[must_use]
    pub fn signed_in() -> Self {
        let gate = Self::new();
        gate.complete(true);
        gate
    }

    /// Finish initialization.
    pub fn complete(&self, signed_in: bool) {
        debug!("Authentication initialized, signed in: {}", signed_in);
        self.tx.send_replace(AuthState::Ready { signed_in });
    }

    /// Finish initialization after a failure. The user counts as signed out.
    pub fn fail(&self, reason: &str) {
        warn!("Authentication failed to initialize: {}", reason);
        self.tx.send_replace(AuthState::Ready { signed_in: false });
    }

    /// Whether initialization has finished.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(*self.tx.borrow(), AuthState::Ready { .. })
    }
}

impl Default for InitGate {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl AuthGate for InitGate {
    fn is_signed_in(&self) -> bool {
        matches!(*self.tx.borrow(), AuthState::Ready { signed_in: true })
    }

    async fn wait_for_init(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx
            .wait_for(|state| matches!(state, AuthState::Ready { .. }))
            .await;
    }
}
