//! Runtime configuration.
//!
//! Precedence is explicit override (CLI flag) > environment variable >
//! built-in default. The binary loads a `.env` file before reading these.

use std::path::PathBuf;

use crate::api::DEFAULT_BASE_URL;
use crate::session::FileSessionStore;
use crate::transfer::storage::default_download_dir;

pub const DEFAULT_LOGIN_URL: &str = "https://dropp.yangm.tech/login";

pub const ENV_API_URL: &str = "DROPP_API_URL";
pub const ENV_LOGIN_URL: &str = "DROPP_LOGIN_URL";
pub const ENV_DOWNLOAD_DIR: &str = "DROPP_DOWNLOAD_DIR";
pub const ENV_SESSION_FILE: &str = "DROPP_SESSION_FILE";

/// Where the session is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionBackend {
    File(PathBuf),
    Keychain,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub login_url: String,
    pub download_dir: PathBuf,
    pub session: SessionBackend,
}

/// Values given on the command line; `None` falls through to the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_url: Option<String>,
    pub download_dir: Option<PathBuf>,
    pub session_file: Option<PathBuf>,
    pub keychain: bool,
}

impl Config {
    /// Resolve configuration from the process environment.
    pub fn resolve(overrides: Overrides) -> Self {
        Self::resolve_with(overrides, |key| std::env::var(key).ok())
    }

    /// Resolve with a custom environment lookup.
    pub fn resolve_with(overrides: Overrides, env: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let api_url = overrides
            .api_url
            .or_else(|| lookup(ENV_API_URL))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let login_url = lookup(ENV_LOGIN_URL).unwrap_or_else(|| DEFAULT_LOGIN_URL.to_string());
        let download_dir = overrides
            .download_dir
            .or_else(|| lookup(ENV_DOWNLOAD_DIR).map(PathBuf::from))
            .or_else(default_download_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        let session = if overrides.keychain {
            SessionBackend::Keychain
        } else {
            let path = overrides
                .session_file
                .or_else(|| lookup(ENV_SESSION_FILE).map(PathBuf::from))
                .or_else(FileSessionStore::default_path)
                .unwrap_or_else(|| PathBuf::from(crate::session::file::SESSION_FILE_NAME));
            SessionBackend::File(path)
        };

        Self {
            api_url,
            login_url,
            download_dir,
            session,
        }
    }
}
