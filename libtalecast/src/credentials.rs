//! Reddit credentials and the access token cache
//!
//! Long-lived credentials come from the environment and never touch disk.
//! The short-lived access token is cached in a single plain-text file so a
//! restart does not force a new password grant.
//!
//! # Example
//!
//! ```no_run
//! use libtalecast::credentials::{FileTokenStore, TokenStore};
//! use libtalecast::types::AccessToken;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = FileTokenStore::new("/var/lib/talecast/token.txt");
//! store.save(&AccessToken::new("eyJhbGciOi..."))?;
//! assert!(store.load().is_some());
//! # Ok(())
//! # }
//! ```

use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, error, warn};

use crate::error::PersistenceError;
use crate::types::AccessToken;

pub const ENV_CLIENT_ID: &str = "REDDIT_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "REDDIT_CLIENT_SECRET";
pub const ENV_USERNAME: &str = "REDDIT_USERNAME";
pub const ENV_PASSWORD: &str = "REDDIT_PASSWORD";

/// Script-app credentials for the password grant.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: SecretString,
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// Read credentials from the environment.
    ///
    /// Unset variables become empty strings; the auth client reports them
    /// when it first needs them.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).unwrap_or_default();
        Self::new(
            var(ENV_CLIENT_ID),
            var(ENV_CLIENT_SECRET),
            var(ENV_USERNAME),
            var(ENV_PASSWORD),
        )
    }

    /// Name of the first credential that is blank, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.client_id.trim().is_empty() {
            Some(ENV_CLIENT_ID)
        } else if self.client_secret.expose_secret().is_empty() {
            Some(ENV_CLIENT_SECRET)
        } else if self.username.trim().is_empty() {
            Some(ENV_USERNAME)
        } else if self.password.expose_secret().is_empty() {
            Some(ENV_PASSWORD)
        } else {
            None
        }
    }

    /// Subreddit name of the user's own profile, e.g. `u_spooky_teller`.
    pub fn profile_name(&self) -> String {
        format!("u_{}", self.username)
    }

    pub fn profile_link(&self) -> String {
        format!("https://www.reddit.com/user/{}/", self.username)
    }
}

/// Single-slot access token cache.
///
/// There is exactly one token; saving replaces it wholesale.
pub trait TokenStore: Send + Sync {
    /// Return the cached token.
    ///
    /// Absent, unreadable, and whitespace-only caches all yield `None`.
    fn load(&self) -> Option<AccessToken>;

    /// Replace the cached token.
    fn save(&self, token: &AccessToken) -> Result<(), PersistenceError>;

    /// Forget the cached token. Clearing an empty cache succeeds.
    fn clear(&self) -> Result<(), PersistenceError>;

    /// Human-readable backend name for log lines
    fn backend_name(&self) -> &str;
}

/// Token cache backed by one plain-text file.
///
/// Writes go to a sibling `.tmp` file that is synced and then renamed over
/// the real file, so readers see either the old token or the new one.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| OsString::from("token"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_err(&self, source: io::Error) -> PersistenceError {
        PersistenceError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

/// The handle is dropped (closed) before this returns, on success or failure.
fn write_staged(path: &Path, contents: &str) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Option<AccessToken> {
        let metadata = match fs::symlink_metadata(&self.path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No cached token at {:?}", self.path);
                return None;
            }
            Err(e) => {
                error!(
                    "{}",
                    PersistenceError::Read {
                        path: self.path.clone(),
                        source: e,
                    }
                );
                return None;
            }
        };

        if metadata.is_symlink() {
            warn!(
                "Ignoring token cache {:?}: it is a symbolic link, not a regular file",
                self.path
            );
            return None;
        }

        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                error!(
                    "{}",
                    PersistenceError::Read {
                        path: self.path.clone(),
                        source: e,
                    }
                );
                return None;
            }
        };

        let token = contents.trim();
        if token.is_empty() {
            debug!("Token cache {:?} is empty", self.path);
            return None;
        }

        debug!("Loaded cached token from {:?}", self.path);
        Some(AccessToken::new(token))
    }

    fn save(&self, token: &AccessToken) -> Result<(), PersistenceError> {
        if token.is_empty() {
            return Err(PersistenceError::EmptyToken);
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.write_err(e))?;
        }

        let staging = self.staging_path();
        let result =
            write_staged(&staging, token.as_str()).and_then(|()| fs::rename(&staging, &self.path));

        if let Err(e) = result {
            let _ = fs::remove_file(&staging);
            return Err(self.write_err(e));
        }

        debug!("Saved access token to {:?}", self.path);
        Ok(())
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Cleared cached token at {:?}", self.path);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.write_err(e)),
        }
    }

    fn backend_name(&self) -> &str {
        "file"
    }
}
