//! OS keychain session backend.
//!
//! Uses the `keyring` crate with the native store of each supported OS
//! (macOS Keychain, Windows Credential Manager, Linux kernel keyutils). The
//! token and user id live in two entries under the same service name;
//! nothing touches disk directly.

use keyring::Entry;
use zeroize::Zeroizing;

use super::{Session, SessionStore};
use crate::error::{DroppError, Result};

/// Keychain service name matching the app identifier.
pub const SERVICE_NAME: &str = "tech.yangm.dropp";

const TOKEN_KEY: &str = "session_token";
const USER_ID_KEY: &str = "user_id";

/// Whether a persistent native store is compiled in for this target.
const NATIVE_STORE: bool = cfg!(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "windows",
    target_os = "linux"
));

type EntryFactory = fn(&str, &str) -> keyring::Result<Entry>;

pub struct KeychainSessionStore {
    service: String,
    entry: EntryFactory,
}

impl KeychainSessionStore {
    /// Open the store under [`SERVICE_NAME`].
    ///
    /// Fails on targets without a native keychain, where `keyring` would
    /// otherwise fall back to a store that keeps nothing.
    pub fn new() -> Result<Self> {
        Self::with_service(SERVICE_NAME)
    }

    pub fn with_service(service: &str) -> Result<Self> {
        if !NATIVE_STORE {
            return Err(DroppError::SessionStore(
                "no native keychain on this platform".into(),
            ));
        }
        Ok(Self::with_entry_factory(service, Entry::new))
    }

    fn with_entry_factory(service: &str, entry: EntryFactory) -> Self {
        Self {
            service: service.to_string(),
            entry,
        }
    }

    fn entry(&self, key: &str) -> Result<Entry> {
        Ok((self.entry)(&self.service, key)?)
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        found(self.entry(key)?.get_password())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        Ok(self.entry(key)?.set_password(value)?)
    }

    fn delete(&self, key: &str) -> Result<()> {
        removed(self.entry(key)?.delete_credential())
    }
}

/// A missing entry is an absent value, not an error.
fn found(result: keyring::Result<String>) -> Result<Option<String>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Deleting a missing entry succeeds.
fn removed(result: keyring::Result<()>) -> Result<()> {
    match result {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

impl SessionStore for KeychainSessionStore {
    fn load(&self) -> Result<Option<Session>> {
        let token = self.get(TOKEN_KEY)?;
        if token.is_none() {
            return Ok(None);
        }
        let user_id = self.get(USER_ID_KEY)?;
        Ok(Some(Session { token, user_id }))
    }

    fn save(&self, session: &Session) -> Result<()> {
        match session.user_id {
            Some(ref id) => self.set(USER_ID_KEY, id)?,
            None => self.delete(USER_ID_KEY)?,
        }
        match session.token {
            Some(ref token) => self.set(TOKEN_KEY, token)?,
            None => self.delete(TOKEN_KEY)?,
        }

        // Read back through a fresh entry so a store that drops writes is
        // reported here instead of as a later "Not logged in".
        let stored = self.get(TOKEN_KEY)?.map(Zeroizing::new);
        if stored.as_ref().map(|t| t.as_str()) != session.token.as_deref() {
            return Err(DroppError::SessionStore(
                "keychain did not retain the session".into(),
            ));
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.delete(TOKEN_KEY)?;
        self.delete(USER_ID_KEY)?;
        Ok(())
    }
}
