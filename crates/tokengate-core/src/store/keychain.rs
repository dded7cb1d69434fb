use keyring::Entry;

use super::{KeyValueBackend, StoreError};

/// Keychain service the session entries are filed under
const SERVICE_NAME: &str = "tokengate";

/// One OS keychain entry per key.
pub struct KeyringBackend {
    service: String,
}

impl Default for KeyringBackend {
    fn default() -> Self {
        Self::new(SERVICE_NAME)
    }
}

impl KeyringBackend {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, StoreError> {
        Entry::new(&self.service, key).map_err(|e| {
            StoreError::Unavailable(format!("Failed to create keyring entry: {}", e))
        })
    }
}

impl KeyValueBackend for KeyringBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StoreError::Unavailable(format!(
                "Failed to read {} from keychain: {}",
                key, e
            ))),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entry(key)?.set_password(value).map_err(|e| {
            StoreError::Unavailable(format!("Failed to store {} in keychain: {}", key, e))
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(StoreError::Unavailable(format!(
                "Failed to delete {} from keychain: {}",
                key, e
            ))),
        }
    }
}
