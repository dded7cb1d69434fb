//! Durable session persistence.
//!
//! A session is persisted as four independent string entries, mirroring
//! browser local storage:
//!
//! | key            | content                                   |
//! |----------------|-------------------------------------------|
//! | `token`        | access token                              |
//! | `refreshToken` | refresh token                             |
//! | `tokenExpiry`  | epoch milliseconds, stringified           |
//! | `userProfile`  | JSON `{"username", "profilePicture"}`     |
//!
//! `EntrySessionStore` maps sessions onto any `KeyValueBackend`:
//! - `MemoryBackend`: in-process, for tests and the demo
//! - `FileBackend`: one file per entry, optionally encrypted at rest
//! - `KeyringBackend`: one OS keychain entry per key

pub mod cipher;
pub mod file;
pub mod keychain;
pub mod memory;

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::auth::{Session, StoredProfile, StoredSession};
use crate::config::StoreKind;

pub use cipher::EntryCipher;
pub use file::FileBackend;
pub use keychain::KeyringBackend;
pub use memory::MemoryBackend;

pub const TOKEN_KEY: &str = "token";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const TOKEN_EXPIRY_KEY: &str = "tokenExpiry";
pub const USER_PROFILE_KEY: &str = "userProfile";

/// Every entry a session occupies, in write order.
pub const SESSION_KEYS: [&str; 4] = [
    TOKEN_KEY,
    REFRESH_TOKEN_KEY,
    TOKEN_EXPIRY_KEY,
    USER_PROFILE_KEY,
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Persistence for the single current session. Operations are synchronous
/// and never suspend.
pub trait SessionStore: Send + Sync {
    /// Overwrite the stored session with `session` (profile is projected).
    fn save(&self, session: &Session) -> Result<(), StoreError>;

    /// Return the stored session only if every entry is present and well formed.
    fn load(&self) -> Result<Option<StoredSession>, StoreError>;

    /// Remove every session entry. Safe to call on an empty store.
    fn clear(&self) -> Result<(), StoreError>;
}

/// A string key/value medium.
pub trait KeyValueBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

impl<B: KeyValueBackend + ?Sized> KeyValueBackend for Arc<B> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }
}

/// Session store laid out as the four entries above.
pub struct EntrySessionStore<B> {
    backend: B,
}

impl<B: KeyValueBackend> EntrySessionStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

/// Treat empty strings like missing entries.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl<B: KeyValueBackend> SessionStore for EntrySessionStore<B> {
    fn save(&self, session: &Session) -> Result<(), StoreError> {
        let profile = serde_json::to_string(&StoredProfile::from(&session.profile))
            .map_err(|e| StoreError::Unavailable(format!("Failed to encode profile: {}", e)))?;

        let expiry = session.expires_at.to_string();
        let entries = [
            (TOKEN_KEY, session.access_token.as_str()),
            (REFRESH_TOKEN_KEY, session.refresh_token.as_str()),
            (TOKEN_EXPIRY_KEY, expiry.as_str()),
            (USER_PROFILE_KEY, profile.as_str()),
        ];
        for (key, value) in entries {
            if let Err(e) = self.backend.set(key, value) {
                // Never leave a new token next to an old expiry
                warn!(key = key, error = %e, "Session save failed part way, clearing entries");
                if let Err(clear_err) = self.clear() {
                    warn!(error = %clear_err, "Failed to clear partially saved session");
                }
                return Err(e);
            }
        }

        debug!(expires_at = session.expires_at, "Session saved");
        Ok(())
    }

    fn load(&self) -> Result<Option<StoredSession>, StoreError> {
        let token = non_empty(self.backend.get(TOKEN_KEY)?);
        let refresh_token = non_empty(self.backend.get(REFRESH_TOKEN_KEY)?);
        let expiry = non_empty(self.backend.get(TOKEN_EXPIRY_KEY)?);
        let profile = non_empty(self.backend.get(USER_PROFILE_KEY)?);

        let (access_token, refresh_token, expiry, profile) =
            match (token, refresh_token, expiry, profile) {
                (Some(t), Some(r), Some(e), Some(p)) => (t, r, e, p),
                (None, None, None, None) => return Ok(None),
                _ => {
                    warn!("Incomplete session entries in store, ignoring");
                    return Ok(None);
                }
            };

        let Ok(expires_at) = expiry.trim().parse::<i64>() else {
            warn!("Stored token expiry is not an integer, ignoring session");
            return Ok(None);
        };

        let profile: StoredProfile = match serde_json::from_str(&profile) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "Stored user profile is malformed, ignoring session");
                return Ok(None);
            }
        };

        Ok(Some(StoredSession {
            access_token,
            refresh_token,
            expires_at,
            profile,
        }))
    }

    fn clear(&self) -> Result<(), StoreError> {
        for key in SESSION_KEYS {
            self.backend.remove(key)?;
        }
        debug!("Session entries cleared");
        Ok(())
    }
}

/// Open the session store selected in configuration.
pub fn open(
    kind: StoreKind,
    dir: &Path,
    passphrase: Option<&str>,
) -> Result<Arc<dyn SessionStore>, StoreError> {
    let store: Arc<dyn SessionStore> = match kind {
        StoreKind::Memory => Arc::new(EntrySessionStore::new(MemoryBackend::new())),
        StoreKind::Keyring => Arc::new(EntrySessionStore::new(KeyringBackend::default())),
        StoreKind::File => {
            let backend = match passphrase {
                Some(p) => FileBackend::encrypted(dir, p)?,
                None => FileBackend::new(dir),
            };
            Arc::new(EntrySessionStore::new(backend))
        }
    };
    Ok(store)
}
