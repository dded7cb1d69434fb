//! Remembered login passwords for `tokengate login --remember`.
//!
//! These live under their own keychain service so that clearing the session
//! (`KeyringBackend`) never forgets a password, and forgetting a password
//! never signs anybody out.

use anyhow::{Context, Result};
use keyring::Entry;

/// Keychain service for remembered login passwords
const SERVICE_NAME: &str = "tokengate-credentials";

pub struct CredentialStore;

impl CredentialStore {
    pub fn remember(username: &str, password: &str) -> Result<()> {
        Self::entry(username)?
            .set_password(password)
            .context("Failed to store password in keychain")
    }

    /// The remembered password, `None` if there is none. A keychain that
    /// cannot be reached is an error, not an absent password.
    pub fn recall(username: &str) -> Result<Option<String>> {
        remembered(Self::entry(username)?.get_password())
    }

    /// Forget the password for a username; forgetting twice is fine.
    pub fn forget(username: &str) -> Result<()> {
        match Self::entry(username)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete credential from keychain"),
        }
    }

    fn entry(username: &str) -> Result<Entry> {
        if username.is_empty() {
            anyhow::bail!("Cannot remember a password without a username");
        }
        Entry::new(SERVICE_NAME, username).context("Failed to create keyring entry")
    }
}

fn remembered(lookup: keyring::Result<String>) -> Result<Option<String>> {
    match lookup {
        Ok(password) if password.is_empty() => Ok(None),
        Ok(password) => Ok(Some(password)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(e).context("Failed to retrieve password from keychain"),
    }
}
