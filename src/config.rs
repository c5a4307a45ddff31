//! Run configuration: API credentials, staging and NA-drop modes, and the
//! defaults shared by the client builder. No process-wide state; everything
//! is passed explicitly to the components that need it.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Base URL of the BMS API; `/metadata` and `/trenddata` are appended.
pub const DEFAULT_BASE_URL: &str = "https://bms-api.build.aau.dk/api/v1";

/// Default number of windows fetched in parallel.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Default per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const USER_ENV: &str = "BD_API_USER";
const PASSWORD_ENV: &str = "BD_API_PASSWORD";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable '{0}' is not set")]
    MissingEnv(&'static str),

    #[error("Unknown NA mode '{0}', expected 'all' or 'any'")]
    UnknownNaMode(String),
}

/// Basic-auth credentials for the metadata and trend-data endpoints.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Reads `BD_API_USER` / `BD_API_PASSWORD`, honoring a `.env` file in
    /// the working directory if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let username =
            std::env::var(USER_ENV).map_err(|_| ConfigError::MissingEnv(USER_ENV))?;
        let password =
            std::env::var(PASSWORD_ENV).map_err(|_| ConfigError::MissingEnv(PASSWORD_ENV))?;
        Ok(Self { username, password })
    }
}

/// Rule for dropping sparse rows from the merged wide table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NaMode {
    /// Drop a row only when every sensor column is null.
    #[default]
    All,
    /// Drop a row when any sensor column is null.
    Any,
}

impl FromStr for NaMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(NaMode::All),
            "any" => Ok(NaMode::Any),
            other => Err(ConfigError::UnknownNaMode(other.to_string())),
        }
    }
}

impl fmt::Display for NaMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NaMode::All => write!(f, "all"),
            NaMode::Any => write!(f, "any"),
        }
    }
}

/// Where window results are held between fetch and merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Staging {
    /// One Parquet file per window in a scratch directory that is removed
    /// when the run ends. Bounds peak memory for long ranges.
    #[default]
    Disk,
    /// Window results stay in process memory. Adequate for short runs.
    Memory,
}
