//! Session persistence for the dropp client.
//!
//! A session is the bearer token and user id handed back by the browser
//! login through the `dropp://auth` deep link. It is stored through the
//! typed [`SessionStore`] interface so it survives process restarts, and
//! wiped on logout.

pub mod deep_link;
pub mod file;
#[cfg(feature = "keychain")]
pub mod keychain;

pub use deep_link::{parse_auth_link, AuthCallback};
pub use file::FileSessionStore;
#[cfg(feature = "keychain")]
pub use keychain::KeychainSessionStore;

use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::error::{DroppError, Result};

/// Persisted authentication state.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize, Zeroize)]
pub struct Session {
    pub token: Option<String>,
    pub user_id: Option<String>,
}

impl Session {
    pub fn new(token: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            user_id: Some(user_id.into()),
        }
    }

    /// A session is usable only when it carries a non-empty token.
    pub fn is_valid(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Durable storage for a single [`Session`].
///
/// Every call commits synchronously: once `save` or `clear` returns `Ok`,
/// a fresh process calling `load` observes the change.
pub trait SessionStore: Send + Sync {
    /// Load the stored session, `None` if nothing was ever saved or it was cleared.
    fn load(&self) -> Result<Option<Session>>;

    /// Replace the stored session.
    fn save(&self, session: &Session) -> Result<()>;

    /// Remove every stored session field. Clearing an empty store succeeds.
    fn clear(&self) -> Result<()>;
}

/// Process-local store. Nothing survives a restart.
#[derive(Default)]
pub struct MemorySessionStore {
    inner: Mutex<Option<Session>>,
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<Session>> {
        let guard = self
            .inner
            .lock()
            .map_err(|_| DroppError::SessionStore("session lock poisoned".into()))?;
        Ok(guard.clone())
    }

    fn save(&self, session: &Session) -> Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| DroppError::SessionStore("session lock poisoned".into()))?;
        *guard = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| DroppError::SessionStore("session lock poisoned".into()))?;
        if let Some(ref mut s) = *guard {
            s.zeroize();
        }
        *guard = None;
        Ok(())
    }
}

/// Session lifecycle on top of a [`SessionStore`].
///
/// Reads go straight to the store, so two managers sharing a backend always
/// agree. Writes are last-write-wins.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Manager over a [`MemorySessionStore`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySessionStore::default()))
    }

    /// Persist a token and user id.
    pub fn save_session(&self, token: &str, user_id: &str) -> Result<()> {
        self.store.save(&Session::new(token, user_id))?;
        log::info!("Session saved for user {}", user_id);
        Ok(())
    }

    /// The stored token, if present and non-empty.
    ///
    /// Backend failures read as "no token" and are logged.
    pub fn get_token(&self) -> Option<String> {
        self.load_logged()
            .and_then(|s| s.token)
            .filter(|t| !t.is_empty())
    }

    pub fn get_user_id(&self) -> Option<String> {
        self.load_logged().and_then(|s| s.user_id)
    }

    pub fn is_logged_in(&self) -> bool {
        self.load_logged().is_some_and(|s| s.is_valid())
    }

    /// The stored token, or [`DroppError::MissingSession`].
    pub fn require_token(&self) -> Result<String> {
        self.store
            .load()?
            .and_then(|s| s.token)
            .filter(|t| !t.is_empty())
            .ok_or(DroppError::MissingSession)
    }

    /// Remove the stored session (logout).
    pub fn clear_session(&self) -> Result<()> {
        self.store.clear()?;
        log::info!("Session cleared");
        Ok(())
    }

    /// Establish a session from a `dropp://auth?...` callback URL.
    ///
    /// Returns the user id of the new session.
    pub fn complete_login(&self, link: &str) -> Result<String> {
        let mut callback = parse_auth_link(link)?;
        self.save_session(&callback.session_token, &callback.user_id)?;
        let user_id = callback.user_id.clone();
        callback.zeroize();
        Ok(user_id)
    }

    fn load_logged(&self) -> Option<Session> {
        match self.store.load() {
            Ok(session) => session,
            Err(e) => {
                log::warn!("Failed to read stored session: {}", e);
                None
            }
        }
    }
}
