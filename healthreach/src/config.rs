//! Process configuration read from the environment.
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DB_HOST` | PostGIS host | Required for PostGIS |
//! | `DB_PORT` | PostGIS port | 5432 |
//! | `DB_NAME` | Database name | Required for PostGIS |
//! | `DB_USERNAME` | Database user | Required for PostGIS |
//! | `DB_PASSWORD` | Database password | Required for PostGIS |
//! | `DB_MAX_CONNECTIONS` | Pool size | 10 |
//! | `API_MAP` | HERE geocoding API key | Geocoding disabled |
//! | `HERE_GEOCODE_URL` | Geocoder endpoint | HERE public endpoint |
//! | `GEOSERVER_URL` | Map server base URL | Proxy disabled |
//! | `HEALTHREACH_HTTP_TIMEOUT_SECS` | Outbound HTTP timeout | 30 |
//! | `HEALTHREACH_DATASET` | JSON dataset used instead of PostGIS | None |

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AccessError, Result};
use crate::geocode::HERE_GEOCODE_URL;

const DEFAULT_DB_PORT: u16 = 5432;
const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// PostGIS connection settings.
#[derive(Clone, PartialEq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub username: String,
    pub password: String,
    pub max_connections: u32,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

/// Everything the service needs to wire its collaborators.
#[derive(Clone, PartialEq)]
pub struct Config {
    /// Set when all `DB_*` variables are present.
    pub database: Option<DatabaseConfig>,
    /// JSON dataset snapshot; takes precedence over the database.
    pub dataset: Option<PathBuf>,
    pub geocoder_api_key: Option<String>,
    pub geocoder_url: String,
    pub geoserver_url: Option<String>,
    pub http_timeout: Duration,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database", &self.database)
            .field("dataset", &self.dataset)
            .field(
                "geocoder_api_key",
                &self.geocoder_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("geocoder_url", &self.geocoder_url)
            .field("geoserver_url", &self.geoserver_url)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl Config {
    /// Read the configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable is set but malformed, or if
    /// only some of the database variables are set while no dataset is.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through an arbitrary lookup function.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let dataset = get("HEALTHREACH_DATASET").map(PathBuf::from);

        // A dataset replaces the database, so DB_* is not consulted.
        let database = if dataset.is_some() {
            None
        } else {
            database_config(&get)?
        };

        let timeout_secs = parse_var(
            get("HEALTHREACH_HTTP_TIMEOUT_SECS"),
            "HEALTHREACH_HTTP_TIMEOUT_SECS",
            DEFAULT_HTTP_TIMEOUT_SECS,
        )?;

        Ok(Self {
            database,
            dataset,
            geocoder_api_key: get("API_MAP"),
            geocoder_url: get("HERE_GEOCODE_URL").unwrap_or_else(|| HERE_GEOCODE_URL.to_string()),
            geoserver_url: get("GEOSERVER_URL"),
            http_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn database_config(get: &impl Fn(&str) -> Option<String>) -> Result<Option<DatabaseConfig>> {
    match (
        get("DB_HOST"),
        get("DB_NAME"),
        get("DB_USERNAME"),
        get("DB_PASSWORD"),
    ) {
        (Some(host), Some(name), Some(username), Some(password)) => Ok(Some(DatabaseConfig {
            host,
            port: parse_var(get("DB_PORT"), "DB_PORT", DEFAULT_DB_PORT)?,
            name,
            username,
            password,
            max_connections: parse_var(
                get("DB_MAX_CONNECTIONS"),
                "DB_MAX_CONNECTIONS",
                DEFAULT_MAX_CONNECTIONS,
            )?,
        })),
        (None, None, None, None) => Ok(None),
        _ => Err(AccessError::InvalidParameter {
            name: "DB_*",
            reason: "DB_HOST, DB_NAME, DB_USERNAME and DB_PASSWORD must be set together".into(),
        }),
    }
}

fn parse_var<T: std::str::FromStr>(value: Option<String>, name: &'static str, default: T) -> Result<T> {
    match value {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| AccessError::invalid(name, format!("'{v}' is not a valid number"))),
    }
}
