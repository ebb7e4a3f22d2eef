//! Configuration loading.
//!
//! Server credentials come from a JSON "server params" file:
//!
//! ```json
//! { "host": "db.local", "port": 5432, "user": "postgres", "pw": "secret",
//!   "db": "postgres", "dev_db": "analytics" }
//! ```
//!
//! Service settings (bind address, timeouts, params file location) come from
//! environment variables. Both are read once at start-up into [`AppConfig`]
//! and handed to every operation by reference.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;

use crate::errors::{AppError, AppResult};

/// Default location of the server params file.
pub const DEFAULT_PARAMS_FILE: &str = "server_params.json";

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Logical database a connection targets.
///
/// Maps to a key of the server params file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DatabaseRole {
    /// The `db` key: maintenance / default database.
    #[default]
    Default,
    /// The `dev_db` key: database used for ad-hoc queries.
    Dev,
}

impl DatabaseRole {
    /// Key of this role in the params file.
    pub fn key(&self) -> &'static str {
        match self {
            DatabaseRole::Default => "db",
            DatabaseRole::Dev => "dev_db",
        }
    }
}

impl FromStr for DatabaseRole {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "db" => Ok(DatabaseRole::Default),
            "dev_db" => Ok(DatabaseRole::Dev),
            other => Err(AppError::Configuration(format!(
                "unknown database role '{}' (expected 'db' or 'dev_db')",
                other
            ))),
        }
    }
}

impl fmt::Display for DatabaseRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Contents of the server params file.
#[derive(Clone, Deserialize)]
pub struct ServerParams {
    pub host: String,
    pub port: u16,
    pub user: String,
    /// Optional so the password can be supplied on the command line instead.
    #[serde(default, rename = "pw")]
    pub password: Option<String>,
    #[serde(default)]
    pub db: Option<String>,
    #[serde(default)]
    pub dev_db: Option<String>,
}

// Hand-written so the password never ends up in logs.
impl fmt::Debug for ServerParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("db", &self.db)
            .field("dev_db", &self.dev_db)
            .finish()
    }
}

impl ServerParams {
    /// Reads and parses a server params file.
    ///
    /// # Errors
    /// Returns `AppError::Configuration` if the file is missing, unreadable
    /// or not valid JSON for this shape.
    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
            .map_err(|e| AppError::Configuration(format!("{}: {}", path.display(), e)))
    }

    /// Parses server params from a JSON string.
    pub fn from_json(content: &str) -> AppResult<Self> {
        serde_json::from_str(content)
            .map_err(|e| AppError::Configuration(format!("malformed server params: {}", e)))
    }

    /// Replaces the password from the file, e.g. with a `--pw` flag.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Database name configured for `role`.
    pub fn database(&self, role: DatabaseRole) -> AppResult<&str> {
        let name = match role {
            DatabaseRole::Default => self.db.as_deref(),
            DatabaseRole::Dev => self.dev_db.as_deref(),
        };
        name.ok_or_else(|| {
            AppError::Configuration(format!(
                "server params define no '{}' database",
                role.key()
            ))
        })
    }

    /// Direct-driver connection descriptor.
    pub fn connect_options(&self, role: DatabaseRole) -> AppResult<PgConnectOptions> {
        let mut options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .database(self.database(role)?);
        if let Some(password) = &self.password {
            options = options.password(password);
        }
        Ok(options)
    }

    /// Single connection URL for tools that take one.
    ///
    /// User, password and database are percent-encoded.
    pub fn url(&self, role: DatabaseRole) -> AppResult<String> {
        let database = self.database(role)?;
        let userinfo = match &self.password {
            Some(pw) => format!(
                "{}:{}",
                urlencoding::encode(&self.user),
                urlencoding::encode(pw)
            ),
            None => urlencoding::encode(&self.user).into_owned(),
        };
        Ok(format!(
            "postgres://{}@{}:{}/{}",
            userinfo,
            self.host,
            self.port,
            urlencoding::encode(database)
        ))
    }
}

/// Service configuration, constructed once at process start.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Bind host for HTTP services.
    pub host: String,
    /// Bind port for HTTP services.
    pub port: u16,
    pub connect_timeout_secs: u64,
    pub params: ServerParams,
}

impl AppConfig {
    /// Builds the configuration for an HTTP service from the environment.
    ///
    /// Reads `PG_PARAMS_FILE` (default `server_params.json`), `SERVER_HOST`,
    /// `SERVER_PORT` and `CONNECT_TIMEOUT_SECS`.
    pub fn load_with_service(service: &str) -> AppResult<Self> {
        let params_file = std::env::var("PG_PARAMS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_PARAMS_FILE));
        let params = ServerParams::load(&params_file)?;

        let config = Self {
            host: std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_parse("SERVER_PORT")?.unwrap_or(0),
            connect_timeout_secs: env_parse("CONNECT_TIMEOUT_SECS")?
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
            params,
        };
        tracing::debug!(service, params_file = %params_file.display(), "configuration loaded");
        Ok(config)
    }

    /// Builds a configuration around an already loaded params file (CLI use).
    pub fn from_params(params: ServerParams) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            params,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn env_parse<T: FromStr>(key: &str) -> AppResult<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| AppError::Configuration(format!("{} is not a valid value: {}", key, raw))),
        Err(_) => Ok(None),
    }
}

/// Loads `.env` from the working directory (best-effort, no error if missing).
///
/// Variables already present in the environment win.
pub fn load_dotenv() {
    let env_path = Path::new(".env");
    if let Ok(content) = std::fs::read_to_string(env_path) {
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                if std::env::var(key).is_err() {
                    std::env::set_var(key, value.trim());
                }
            }
        }
    }
}
