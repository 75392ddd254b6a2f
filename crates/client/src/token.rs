//! File-backed bearer token, shared by every command of one profile.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tlx_core::time::{self, iso};
use tracing::debug;

use crate::error::ClientResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub token: String,
    #[serde(with = "iso")]
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$HOME/.tlx/<profile>.json`, or the working directory when there is
    /// no home.
    pub fn for_profile(profile: &str) -> Self {
        let base = std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(base.join(".tlx").join(format!("{profile}.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The saved token, if any. A missing or unreadable file counts as
    /// logged out.
    pub fn load(&self) -> Option<StoredToken> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "Token file unreadable");
                return None;
            }
        };
        match serde_json::from_str::<StoredToken>(&raw) {
            Ok(stored) if !stored.token.is_empty() => Some(stored),
            Ok(_) => None,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "Token file corrupt");
                None
            }
        }
    }

    pub fn token(&self) -> Option<String> {
        self.load().map(|s| s.token)
    }

    pub fn save(&self, token: &str) -> ClientResult<StoredToken> {
        let stored = StoredToken {
            token: token.to_string(),
            saved_at: time::now(),
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(&stored)?)?;
        Ok(stored)
    }

    /// Forget the token. Clearing an absent token is not an error.
    pub fn clear(&self) -> ClientResult<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}
