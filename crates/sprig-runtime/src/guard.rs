#![forbid(unsafe_code)]

//! Re-entrancy guard for synchronous dispatch.
//!
//! A guarded runtime processes one action at a time, start to finish, on the
//! caller's stack. A second dispatch arriving while the first is still
//! running (typically from a listener or hook called by the first) is an
//! error: it is reported, never queued.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// Error returned when a dispatch starts while another is in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// An update was already being processed.
    Reentrant,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reentrant => write!(f, "dispatch attempted while an update is in progress"),
        }
    }
}

impl std::error::Error for DispatchError {}

/// Tracks whether an update is in progress.
#[derive(Clone, Default)]
pub struct DispatchGuard {
    active: Rc<Cell<bool>>,
}

impl DispatchGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an update as started.
    ///
    /// The update ends when the returned token drops, including during
    /// unwinding.
    pub fn enter(&self) -> Result<DispatchToken, DispatchError> {
        if self.active.replace(true) {
            tracing::warn!("re-entrant dispatch rejected");
            return Err(DispatchError::Reentrant);
        }
        Ok(DispatchToken {
            active: Rc::clone(&self.active),
        })
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.get()
    }
}

impl fmt::Debug for DispatchGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchGuard")
            .field("active", &self.active.get())
            .finish()
    }
}

/// Proof that an update is in progress; releases the guard on drop.
#[must_use = "the update ends as soon as the token is dropped"]
#[derive(Debug)]
pub struct DispatchToken {
    active: Rc<Cell<bool>>,
}

impl Drop for DispatchToken {
    fn drop(&mut self) {
        self.active.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_enter_fails_until_token_drops() {
        let guard = DispatchGuard::new();
        let token = guard.enter().expect("first enter");
        assert!(guard.is_active());
        assert_eq!(guard.enter().unwrap_err(), DispatchError::Reentrant);
        drop(token);
        assert!(!guard.is_active());
        assert!(guard.enter().is_ok());
    }

    #[test]
    fn clones_share_state() {
        let guard = DispatchGuard::new();
        let other = guard.clone();
        let _token = guard.enter().expect("enter");
        assert!(other.enter().is_err());
    }

    #[test]
    fn token_released_on_panic() {
        let guard = DispatchGuard::new();
        let g = guard.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _token = g.enter().expect("enter");
            panic!("update failed");
        }));
        assert!(result.is_err());
        assert!(!guard.is_active());
    }

    #[test]
    fn error_display() {
        assert_eq!(
            DispatchError::Reentrant.to_string(),
            "dispatch attempted while an update is in progress"
        );
    }
}
