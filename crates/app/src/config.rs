use std::fs;
use std::io;
use std::path::PathBuf;

use tracing::warn;

pub const DB_ENV: &str = "COURSE_DB_URL";
pub const DEFAULT_DB_FILE: &str = "progress.sqlite3";

/// Where the progress snapshot is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Database {
    /// Handed to sqlx untouched: in-memory databases and URLs carrying options.
    Url(String),
    /// A database file, resolved against the working directory on connect.
    File(PathBuf),
}

impl Default for Database {
    fn default() -> Self {
        Self::File(PathBuf::from(DEFAULT_DB_FILE))
    }
}

impl Database {
    /// Accepts `sqlite::memory:`, `sqlite:` / `sqlite://` URLs and bare paths.
    /// Returns `None` for blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw == "sqlite::memory:" || raw.starts_with("sqlite:file:") || raw.contains('?') {
            return Some(Self::Url(raw.to_string()));
        }
        let path = raw
            .strip_prefix("sqlite://")
            .or_else(|| raw.strip_prefix("sqlite:"))
            .unwrap_or(raw);
        if path.is_empty() {
            None
        } else {
            Some(Self::File(PathBuf::from(path)))
        }
    }

    /// Reads `COURSE_DB_URL`, falling back to `progress.sqlite3`.
    pub fn from_env() -> Self {
        match std::env::var(DB_ENV) {
            Ok(raw) => Self::parse(&raw).unwrap_or_else(|| {
                warn!(env = DB_ENV, "blank database setting; using the default file");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Resolve to a sqlx URL. File databases get an absolute path and an
    /// existing parent directory; the file itself is created on connect.
    pub fn into_url(self) -> io::Result<String> {
        match self {
            Self::Url(url) => Ok(url),
            Self::File(path) => {
                let absolute = std::path::absolute(path)?;
                if let Some(parent) = absolute.parent() {
                    fs::create_dir_all(parent)?;
                }
                Ok(format!("sqlite://{}", absolute.display()))
            }
        }
    }
}
