use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

const DEFAULT_PORT: u16 = 4400;
const DEFAULT_ACCESS_TTL_SECS: i64 = 3600; // 1 hour
const DEFAULT_REFRESH_TTL_SECS: i64 = 7 * 24 * 3600; // 7 days
const DEFAULT_BCRYPT_COST: u32 = 12;

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

// ─── ServerConfig ─────────────────────────────────────────────────────────────

/// HTTP server configuration (`[server]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address for the REST listener. Default: 127.0.0.1 (local only).
    pub bind_address: String,
    /// REST API port. Default: 4400.
    pub port: u16,
    /// Emit JSON log lines instead of the compact human format. Default: false.
    pub json_logs: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: DEFAULT_PORT,
            json_logs: false,
        }
    }
}

// ─── DatabaseConfig ───────────────────────────────────────────────────────────

/// SQLite storage configuration (`[database]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Directory holding `taskd.db`. Created on first start. Default: ./data.
    pub data_dir: PathBuf,
    /// Log SQLite queries that exceed this threshold (milliseconds). Default: 100.
    /// Set to 0 to disable slow query logging.
    pub slow_query_threshold_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            slow_query_threshold_ms: 100,
        }
    }
}

// ─── AuthConfig ───────────────────────────────────────────────────────────────

/// Authentication configuration (`[auth]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret for signing access and refresh tokens. Must be set before
    /// serving; an empty secret is rejected at startup.
    pub jwt_secret: String,
    /// Access token lifetime in seconds. Default: 3600.
    pub access_ttl_secs: i64,
    /// Refresh token lifetime in seconds. Default: 604800 (7 days).
    pub refresh_ttl_secs: i64,
    /// bcrypt work factor for password hashing. Default: 12.
    pub bcrypt_cost: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            access_ttl_secs: DEFAULT_ACCESS_TTL_SECS,
            refresh_ttl_secs: DEFAULT_REFRESH_TTL_SECS,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
        }
    }
}

// ─── CorsConfig ───────────────────────────────────────────────────────────────

/// CORS configuration (`[cors]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Origins allowed to call the API. `["*"]` allows any origin.
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
        }
    }
}

// ─── TaskdConfig ──────────────────────────────────────────────────────────────

/// Top-level configuration, loaded from a TOML file with environment
/// variable overrides layered on top.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TaskdConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub cors: CorsConfig,
}

impl TaskdConfig {
    /// Load configuration. Missing file is not an error — defaults apply and
    /// environment overrides still take effect.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) if p.exists() => {
                let raw = std::fs::read_to_string(p)
                    .with_context(|| format!("reading config file {}", p.display()))?;
                toml::from_str(&raw)
                    .with_context(|| format!("parsing config file {}", p.display()))?
            }
            Some(p) => {
                warn!("config file {} not found, using defaults", p.display());
                Self::default()
            }
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Environment overrides: TASKD_PORT, TASKD_BIND_ADDRESS, TASKD_DATA_DIR,
    /// TASKD_JWT_SECRET.
    fn apply_env(&mut self) {
        if let Ok(port) = std::env::var("TASKD_PORT") {
            match port.parse::<u16>() {
                Ok(p) => self.server.port = p,
                Err(_) => warn!("ignoring invalid TASKD_PORT: {port}"),
            }
        }
        if let Ok(addr) = std::env::var("TASKD_BIND_ADDRESS") {
            self.server.bind_address = addr;
        }
        if let Ok(dir) = std::env::var("TASKD_DATA_DIR") {
            self.database.data_dir = PathBuf::from(dir);
        }
        if let Ok(secret) = std::env::var("TASKD_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
    }
}
