use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::warn;

use super::cipher::{EntryCipher, SALT_LEN};
use super::{KeyValueBackend, StoreError};

/// Salt file name inside an encrypted store directory
const SALT_FILE: &str = ".salt";

/// One file per entry inside a directory.
pub struct FileBackend {
    dir: PathBuf,
    cipher: Option<EntryCipher>,
}

fn unavailable(action: &str, path: &Path, e: std::io::Error) -> StoreError {
    StoreError::Unavailable(format!("Failed to {} {}: {}", action, path.display(), e))
}

impl FileBackend {
    /// Plaintext entries
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cipher: None,
        }
    }

    /// Entries sealed with a key derived from `passphrase`. The salt is
    /// created on first use and kept beside the entries.
    pub fn encrypted(dir: impl Into<PathBuf>, passphrase: &str) -> Result<Self, StoreError> {
        let dir = dir.into();
        let salt = Self::load_or_create_salt(&dir)?;
        let cipher = EntryCipher::from_passphrase(passphrase, &salt)?;
        Ok(Self {
            dir,
            cipher: Some(cipher),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn load_or_create_salt(dir: &Path) -> Result<Vec<u8>, StoreError> {
        let path = dir.join(SALT_FILE);
        match std::fs::read(&path) {
            Ok(salt) if salt.len() == SALT_LEN => Ok(salt),
            Ok(_) => Err(StoreError::Unavailable(format!(
                "Salt file {} is corrupt",
                path.display()
            ))),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                std::fs::create_dir_all(dir).map_err(|e| unavailable("create", dir, e))?;
                let salt = EntryCipher::generate_salt();
                std::fs::write(&path, salt).map_err(|e| unavailable("write", &path, e))?;
                Ok(salt.to_vec())
            }
            Err(e) => Err(unavailable("read", &path, e)),
        }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl KeyValueBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.entry_path(key);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(unavailable("read", &path, e)),
        };

        let bytes = match &self.cipher {
            Some(cipher) => match cipher.decrypt(&bytes) {
                Some(plain) => plain,
                None => {
                    warn!(key = key, "Stored entry failed authentication, ignoring");
                    return Ok(None);
                }
            },
            None => bytes,
        };

        match String::from_utf8(bytes) {
            Ok(value) => Ok(Some(value)),
            Err(_) => {
                warn!(key = key, "Stored entry is not valid UTF-8, ignoring");
                Ok(None)
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| unavailable("create", &self.dir, e))?;

        let path = self.entry_path(key);
        let contents = match &self.cipher {
            Some(cipher) => cipher.encrypt(value.as_bytes())?,
            None => value.as_bytes().to_vec(),
        };
        std::fs::write(&path, contents).map_err(|e| unavailable("write", &path, e))
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.entry_path(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(unavailable("remove", &path, e)),
        }
    }
}
