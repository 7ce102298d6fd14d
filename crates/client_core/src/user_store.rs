//! Persists the logged-in operator between runs as a small JSON file.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use shared::domain::User;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum UserStoreError {
    #[error("failed to access user store '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode user: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct UserStore {
    path: PathBuf,
}

impl UserStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file means nobody is logged in. A corrupt file is removed and treated the
    /// same way.
    pub fn load(&self) -> Option<User> {
        let raw = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(err) => {
                warn!(path = %self.path.display(), %err, "discarding unreadable user store");
                let _ = fs::remove_file(&self.path);
                None
            }
        }
    }

    pub fn save(&self, user: &User) -> Result<(), UserStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }
        let raw = serde_json::to_string_pretty(user)?;
        fs::write(&self.path, raw).map_err(|source| self.io_error(source))
    }

    pub fn clear(&self) -> Result<(), UserStoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(self.io_error(source)),
        }
    }

    fn io_error(&self, source: io::Error) -> UserStoreError {
        UserStoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
#[path = "tests/user_store_tests.rs"]
mod tests;
