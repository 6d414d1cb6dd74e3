//! Registry of in-flight sessions keyed by correlation id.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::session::Session;

/// Shared handle to one tracked session.
pub type SessionHandle = Arc<Mutex<Session>>;

/// Maps a session key (output filename or raw link) to its live state.
///
/// Every mutation of the map goes through one mutex, so push-event delivery
/// and submission can race on the same key safely. Lookups hand out a clone
/// of the [`SessionHandle`] and release the map lock before the caller
/// touches the session.
#[derive(Debug, Default)]
pub struct SessionTracker {
    sessions: Mutex<HashMap<String, SessionHandle>>,
}

impl SessionTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `session` under `key`, replacing any existing entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptySessionKey`] if `key` is empty.
    pub fn create(&self, key: &str, mut session: Session) -> Result<SessionHandle> {
        if key.is_empty() {
            return Err(Error::EmptySessionKey);
        }
        session.id = key.to_string();
        let handle = Arc::new(Mutex::new(session));
        if self
            .sessions
            .lock()
            .insert(key.to_string(), Arc::clone(&handle))
            .is_some()
        {
            log::debug!("session {key} replaced");
        }
        Ok(handle)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<SessionHandle> {
        self.sessions.lock().get(key).cloned()
    }

    /// Removes `key` if present.
    pub fn remove(&self, key: &str) {
        self.sessions.lock().remove(key);
    }

    /// Removes `key` only if it still maps to `handle`.
    ///
    /// Returns false when the key is absent or was taken over by another
    /// session in the meantime.
    pub fn remove_handle(&self, key: &str, handle: &SessionHandle) -> bool {
        let mut sessions = self.sessions.lock();
        if sessions
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, handle))
        {
            sessions.remove(key);
            return true;
        }
        false
    }

    /// Moves the session at `old` to `new`, updating its id.
    ///
    /// An existing entry at `new` is replaced. Returns `None` if `old` is not
    /// tracked or `new` is empty.
    pub fn rekey(&self, old: &str, new: &str) -> Option<SessionHandle> {
        if new.is_empty() {
            return None;
        }
        let mut sessions = self.sessions.lock();
        let handle = sessions.remove(old)?;
        handle.lock().id = new.to_string();
        sessions.insert(new.to_string(), Arc::clone(&handle));
        Some(handle)
    }

    /// Moves `handle` from `old` to `new`, updating its id.
    ///
    /// Unlike [`rekey`](Self::rekey) this never touches a different session
    /// that has since been registered under `old`: that entry stays where it
    /// is. `handle` is inserted at `new` either way. Returns whether `old`
    /// still pointed at `handle`, or false when `new` is empty.
    pub fn rekey_handle(&self, old: &str, new: &str, handle: &SessionHandle) -> bool {
        if new.is_empty() {
            return false;
        }
        let mut sessions = self.sessions.lock();
        let owned = sessions
            .get(old)
            .is_some_and(|current| Arc::ptr_eq(current, handle));
        if owned {
            sessions.remove(old);
        }
        handle.lock().id = new.to_string();
        sessions.insert(new.to_string(), Arc::clone(handle));
        owned
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.sessions.lock().keys().cloned().collect()
    }

    pub fn clear(&self) {
        self.sessions.lock().clear();
    }
}
