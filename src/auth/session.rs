use std::fs::{self, File};
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Session file name in cache directory
const SESSION_FILE: &str = "jwtToken";

/// Token lifetime in days.
/// Sign-in tokens issued by the API are accepted for a week.
pub const TOKEN_EXPIRY_DAYS: i64 = 7;

/// A bearer token together with the moment it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub acquired_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            acquired_at: Utc::now(),
        }
    }

    pub fn with_acquired_at(token: impl Into<String>, acquired_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            acquired_at,
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.acquired_at + Duration::days(TOKEN_EXPIRY_DAYS)
    }

    /// Valid while non-empty and younger than the token lifetime
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.token.is_empty() && now < self.expires_at()
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn time_until_expiry(&self) -> Duration {
        self.expires_at() - Utc::now()
    }
}

/// File-backed store for the current credential.
///
/// The file holds the raw token only; its modification time is the
/// acquisition timestamp.
pub struct SessionStore {
    cache_dir: PathBuf,
    credential: Option<Credential>,
}

impl SessionStore {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            credential: None,
        }
    }

    /// Check for a usable stored token.
    ///
    /// A missing file is created empty. Returns false for a missing, empty or
    /// expired file; otherwise the credential becomes available via [`load`](Self::load).
    pub fn exists(&mut self) -> Result<bool> {
        let path = self.session_path();
        if !path.exists() {
            self.ensure_dir()?;
            File::create(&path).map_err(|e| Error::filesystem(&path, e))?;
            debug!(path = %path.display(), "Created empty session file");
            self.credential = None;
            return Ok(false);
        }

        let metadata = fs::metadata(&path).map_err(|e| Error::filesystem(&path, e))?;
        if metadata.len() == 0 {
            self.credential = None;
            return Ok(false);
        }

        let modified = metadata.modified().map_err(|e| Error::filesystem(&path, e))?;
        let token = fs::read_to_string(&path).map_err(|e| Error::filesystem(&path, e))?;
        let credential = Credential::with_acquired_at(token.trim(), DateTime::<Utc>::from(modified));

        if !credential.is_valid() {
            warn!(acquired_at = %credential.acquired_at, "Stored session token expired");
            self.credential = None;
            return Ok(false);
        }

        self.credential = Some(credential);
        Ok(true)
    }

    /// The credential found by the last successful [`exists`](Self::exists) or [`save`](Self::save)
    pub fn load(&self) -> Result<Credential> {
        self.credential
            .clone()
            .ok_or_else(|| Error::Authentication("No stored session".to_string()))
    }

    /// Save credential to disk, replacing whatever was stored
    pub fn save(&mut self, credential: Credential) -> Result<()> {
        self.ensure_dir()?;
        let path = self.session_path();
        fs::write(&path, &credential.token).map_err(|e| Error::filesystem(&path, e))?;
        debug!(path = %path.display(), "Session token saved");
        self.credential = Some(credential);
        Ok(())
    }

    /// Clear session data
    pub fn clear(&mut self) -> Result<()> {
        self.credential = None;
        let path = self.session_path();
        if path.exists() {
            fs::remove_file(&path).map_err(|e| Error::filesystem(&path, e))?;
        }
        Ok(())
    }

    pub fn path(&self) -> PathBuf {
        self.session_path()
    }

    fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.cache_dir).map_err(|e| Error::filesystem(&self.cache_dir, e))
    }

    fn session_path(&self) -> PathBuf {
        self.cache_dir.join(SESSION_FILE)
    }
}
