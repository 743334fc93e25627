/// Service configuration loaded from `tapwater.toml`.
///
/// Every section and key is optional; a missing file is not an error for the
/// binaries (they fall back to `Config::default()`), but a file that exists
/// and fails to parse is.
///
/// ```toml
/// [server]
/// bind = "0.0.0.0:3000"
///
/// [database]
/// url_env = "DATABASE_URL"
/// # fixture = "fixtures/arizona.toml"
///
/// [cache]
/// max_age_secs = 300
/// stale_while_revalidate_secs = 3600
///
/// [logging]
/// level = "info"
/// file = "tapwater.log"
/// timestamps = true
///
/// [client]
/// base_url = "http://127.0.0.1:3000"
/// timeout_secs = 30
/// ```

use serde::Deserialize;
use std::path::Path;

use crate::logging::LogLevel;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "tapwater.toml";

/// Environment variable that overrides the config path.
pub const CONFIG_PATH_ENV: &str = "TAPWATER_CONFIG";

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
    pub client: ClientConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: "127.0.0.1:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Name of the environment variable holding the connection string.
    pub url_env: String,
    /// When set, serve from this fixture file instead of PostgreSQL.
    pub fixture: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            url_env: "DATABASE_URL".to_string(),
            fixture: None,
        }
    }
}

/// Freshness hint attached to successful `/api/{zip}` responses.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_age_secs: u32,
    pub stale_while_revalidate_secs: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            max_age_secs: 300,
            stale_while_revalidate_secs: 3600,
        }
    }
}

impl CacheConfig {
    /// The `cache-control` header value.
    pub fn header_value(&self) -> String {
        format!(
            "public, s-maxage={}, stale-while-revalidate={}",
            self.max_age_secs, self.stale_while_revalidate_secs
        )
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            file: None,
            timestamps: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            base_url: "http://127.0.0.1:3000".to_string(),
            timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be read.
    Io(std::io::Error),
    /// The file is not valid TOML for this schema.
    Parse(toml::de::Error),
    /// The file parsed but a value is unusable.
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Config read error: {}", e),
            ConfigError::Parse(e) => write!(f, "Config parse error: {}", e),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err)
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Parses and validates a config document.
    pub fn from_toml_str(text: &str) -> Result<Config, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses the file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Loads from `$TAPWATER_CONFIG` or `tapwater.toml`, falling back to the
    /// defaults when the file does not exist.
    pub fn load_or_default() -> Result<Config, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        if Path::new(&path).exists() {
            Self::load(&path)
        } else {
            Ok(Config::default())
        }
    }

    pub fn log_level(&self) -> LogLevel {
        // validate() has already rejected unknown names
        LogLevel::parse(&self.logging.level).unwrap_or(LogLevel::Info)
    }

    /// Reads the database URL from the configured environment variable,
    /// after loading `.env` if one is present.
    pub fn database_url(&self) -> Result<String, ConfigError> {
        dotenv::dotenv().ok();
        std::env::var(&self.database.url_env).map_err(|_| {
            ConfigError::Invalid(format!(
                "{} must be set (or configure database.fixture)",
                self.database.url_env
            ))
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if LogLevel::parse(&self.logging.level).is_none() {
            return Err(ConfigError::Invalid(format!(
                "unknown logging.level '{}'",
                self.logging.level
            )));
        }
        if self.server.bind.trim().is_empty() {
            return Err(ConfigError::Invalid("server.bind must not be empty".to_string()));
        }
        if self.client.timeout_secs == 0 {
            return Err(ConfigError::Invalid("client.timeout_secs must be positive".to_string()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
