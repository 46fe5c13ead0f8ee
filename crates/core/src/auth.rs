//! Authentication capability consumed by the store.
//!
//! Sign-up, sign-in and session refresh live entirely in the hosted auth
//! service; this crate only needs an opaque "who is the current user"
//! surface and a way to notice when that identity changes.

use serde::{Deserialize, Serialize};

/// Opaque identifier of an authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Listener invoked when the authenticated identity changes.
pub type AuthListener = Box<dyn Fn(Option<UserId>) + Send + Sync>;

/// Handle returned by [`AuthSession::on_change`]; dropping it or calling
/// [`AuthWatch::unsubscribe`] stops future notifications. In-flight
/// notifications are not cancelled.
pub struct AuthWatch {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl AuthWatch {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A watch that has nothing to tear down.
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for AuthWatch {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

/// Current-user capability provided by the embedding application.
pub trait AuthSession: Send + Sync {
    fn current_user(&self) -> Option<UserId>;

    fn on_change(&self, listener: AuthListener) -> AuthWatch;
}

/// Fixed identity session for tests and single-user embeddings.
pub struct StaticSession {
    user: Option<UserId>,
}

impl StaticSession {
    pub fn signed_in(user: UserId) -> Self {
        Self { user: Some(user) }
    }

    pub fn signed_out() -> Self {
        Self { user: None }
    }
}

impl AuthSession for StaticSession {
    fn current_user(&self) -> Option<UserId> {
        self.user.clone()
    }

    fn on_change(&self, _listener: AuthListener) -> AuthWatch {
        // The identity never changes, so there is nothing to watch.
        AuthWatch::noop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_session_reports_identity() {
        let session = StaticSession::signed_in(UserId::new("user-1"));
        assert_eq!(session.current_user(), Some(UserId::new("user-1")));
        assert!(StaticSession::signed_out().current_user().is_none());
    }

    #[test]
    fn watch_runs_teardown_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let watch = AuthWatch::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        watch.unsubscribe();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
