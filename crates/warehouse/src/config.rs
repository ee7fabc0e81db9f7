//! Process configuration for sync jobs
//!
//! API credentials are loaded from (in order of priority):
//! 1. Environment variables (`TENANT`, `CLIENT_ID`, `CLIENT_SECRET`, `USER_ID`)
//! 2. JSON file (`~/.config/warehouse-sync/credentials.json`)

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Credentials filename in the config directory
const CREDENTIALS_FILE: &str = "credentials.json";

/// Default database filename in the data directory
const DATABASE_FILE: &str = "warehouse.db";

const DEFAULT_API_BASE: &str = "https://api.seismic.com/";
const DEFAULT_AUTH_BASE: &str = "https://auth.seismic.com/";

const CREDENTIAL_VARS: [&str; 4] = ["TENANT", "CLIENT_ID", "CLIENT_SECRET", "USER_ID"];

/// Longest accepted repeat interval
const MAX_REPEAT_SECS: u64 = 366 * 24 * 3600;

/// Delegated-access credentials for the reporting API
#[derive(Clone, Deserialize)]
pub struct SourceCredentials {
    pub tenant: String,
    pub client_id: String,
    pub client_secret: String,
    pub user_id: String,
}

// Keep the secret out of logs
impl fmt::Debug for SourceCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceCredentials")
            .field("tenant", &self.tenant)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("user_id", &self.user_id)
            .finish()
    }
}

impl SourceCredentials {
    /// Load credentials from the environment, falling back to the
    /// credentials file
    pub fn load() -> Result<Self> {
        if Self::env_complete() {
            return Self::from_env();
        }

        if config::config_exists(CREDENTIALS_FILE) {
            let creds: SourceCredentials = config::load_json(CREDENTIALS_FILE)?;
            return creds.validated();
        }

        // Report the first missing variable
        Self::from_env()
    }

    /// Load credentials from environment variables
    pub fn from_env() -> Result<Self> {
        Self {
            tenant: config::env_required("TENANT")?,
            client_id: config::env_required("CLIENT_ID")?,
            client_secret: config::env_required("CLIENT_SECRET")?,
            user_id: config::env_required("USER_ID")?,
        }
        .validated()
    }

    /// Load credentials from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let creds: SourceCredentials = config::load_json_file(path)?;
        creds.validated()
    }

    /// Parse credentials from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let creds: SourceCredentials =
            serde_json::from_str(json).context("Failed to parse credentials JSON")?;
        creds.validated()
    }

    /// Default credentials file path (~/.config/warehouse-sync/credentials.json)
    pub fn default_credentials_path() -> Option<PathBuf> {
        config::config_path(CREDENTIALS_FILE)
    }

    /// Check if credentials are available (env vars or file)
    pub fn is_available() -> bool {
        Self::env_complete() || config::config_exists(CREDENTIALS_FILE)
    }

    fn env_complete() -> bool {
        CREDENTIAL_VARS
            .iter()
            .all(|name| config::env_optional(name).is_some())
    }

    fn validated(self) -> Result<Self> {
        for (name, value) in [
            ("tenant", &self.tenant),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("user_id", &self.user_id),
        ] {
            if value.trim().is_empty() {
                bail!("Credential field {} is empty", name);
            }
        }
        Ok(self)
    }
}

/// Base URLs of the API and token service
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub api_base: Url,
    pub auth_base: Url,
}

impl Endpoints {
    /// Production vendor hosts
    pub fn vendor() -> Result<Self> {
        Self::new(DEFAULT_API_BASE, DEFAULT_AUTH_BASE)
    }

    /// Vendor defaults, overridden by `API_BASE_URL` / `AUTH_BASE_URL`
    pub fn from_env() -> Result<Self> {
        let api_base = config::env_optional("API_BASE_URL");
        let auth_base = config::env_optional("AUTH_BASE_URL");
        Self::new(
            api_base.as_deref().unwrap_or(DEFAULT_API_BASE),
            auth_base.as_deref().unwrap_or(DEFAULT_AUTH_BASE),
        )
    }

    pub fn new(api_base: &str, auth_base: &str) -> Result<Self> {
        Ok(Self {
            api_base: parse_base(api_base).context("Invalid API base URL")?,
            auth_base: parse_base(auth_base).context("Invalid auth base URL")?,
        })
    }
}

/// Parse a base URL, making sure relative joins append to its path
fn parse_base(raw: &str) -> Result<Url> {
    let raw = raw.trim();
    let with_slash = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{}/", raw)
    };
    Url::parse(&with_slash).with_context(|| format!("Could not parse URL {:?}", raw))
}

/// How long a repeating job waits between runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatInterval {
    Minutes(u64),
    Hours(u64),
}

impl RepeatInterval {
    /// Read `REPEAT_INTERVAL_MINUTES` or `REPEAT_INTERVAL_HOURS`, whichever
    /// is set (minutes first), falling back to `default`
    pub fn from_env(default: RepeatInterval) -> Result<Self> {
        if let Some(minutes) = config::env_parse::<u64>("REPEAT_INTERVAL_MINUTES")? {
            return Self::Minutes(minutes).validated();
        }
        if let Some(hours) = config::env_parse::<u64>("REPEAT_INTERVAL_HOURS")? {
            return Self::Hours(hours).validated();
        }
        Ok(default)
    }

    /// Interval length; saturates for values [`RepeatInterval::from_env`]
    /// would have rejected
    pub fn as_duration(&self) -> Duration {
        self.seconds().map_or(Duration::MAX, Duration::from_secs)
    }

    fn seconds(&self) -> Option<u64> {
        match self {
            RepeatInterval::Minutes(m) => m.checked_mul(60),
            RepeatInterval::Hours(h) => h.checked_mul(3600),
        }
    }

    fn validated(self) -> Result<Self> {
        match self.seconds() {
            Some(0) => bail!("Repeat interval must be greater than zero"),
            Some(secs) if secs <= MAX_REPEAT_SECS => Ok(self),
            _ => bail!("Repeat interval of {} is longer than a year", self),
        }
    }
}

impl fmt::Display for RepeatInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (n, unit) = match self {
            RepeatInterval::Minutes(m) => (*m, "minute"),
            RepeatInterval::Hours(h) => (*h, "hour"),
        };
        let plural = if n == 1 { "" } else { "s" };
        write!(f, "{} {}{}", n, unit, plural)
    }
}

/// Whether jobs should repeat (`REPEAT`)
pub fn repeat_enabled() -> bool {
    config::env_flag("REPEAT", false)
}

/// Database location: `DB`, or `warehouse.db` in the data directory
pub fn database_path() -> Result<PathBuf> {
    if let Some(path) = config::env_optional("DB") {
        return Ok(PathBuf::from(path));
    }
    config::data_path(DATABASE_FILE).context("Could not determine data directory")
}
