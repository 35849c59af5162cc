use std::net::SocketAddr;

use clap::Parser;
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(name = "acas", about = "ACAS - general, sales and purchase ledgers with stock control")]
pub struct CliArgs {
    /// Path to config file
    #[arg(short, long, default_value = "acas.toml")]
    pub config: String,

    /// Port to listen on (overrides config file)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Log level (overrides config file)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Storage backend, `memory` or `sqlite` (overrides config file)
    #[arg(short, long)]
    pub storage: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_server")]
    pub server: ServerConfig,

    #[serde(default = "default_logging")]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageKind,

    /// Database file for the sqlite backend.
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            backend: StorageKind::default(),
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// When true, everything under /api/v1 requires a bearer token or API key.
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,

    #[serde(default = "default_token_ttl")]
    pub token_ttl_minutes: i64,

    /// Admin account created on first start when no users exist.
    #[serde(default)]
    pub bootstrap_admin: Option<BootstrapAdmin>,

    /// Static API keys. Each key has a name (for audit) and a role.
    #[serde(default)]
    pub api_keys: Vec<ApiKeyEntry>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            enabled: false,
            jwt_secret: default_jwt_secret(),
            token_ttl_minutes: default_token_ttl(),
            bootstrap_admin: None,
            api_keys: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiKeyEntry {
    pub name: String,
    pub key: String,
    #[serde(default = "default_role")]
    pub role: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("unknown storage backend: {0}")]
    UnknownBackend(String),

    #[error("invalid listen address {0}")]
    ListenAddr(String),

    #[error("API key {name} has unknown role {role}")]
    UnknownRole { name: String, role: String },
}

fn default_role() -> String {
    "viewer".to_string()
}

fn default_server() -> ServerConfig {
    ServerConfig {
        host: default_host(),
        port: default_port(),
    }
}

fn default_logging() -> LoggingConfig {
    LoggingConfig {
        level: default_log_level(),
        json: false,
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_db_path() -> String {
    "acas.db".to_string()
}

fn default_jwt_secret() -> String {
    "change-me".to_string()
}

fn default_token_ttl() -> i64 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: default_server(),
            logging: default_logging(),
            storage: StorageConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

impl Config {
    /// Reads the config file if present and applies CLI overrides. A missing
    /// file yields defaults; a malformed one is an error.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let mut config = match std::fs::read_to_string(&cli.config) {
            Ok(contents) => Self::parse(&cli.config, &contents)?,
            Err(_) => Config::default(),
        };

        // CLI overrides
        if let Some(port) = cli.port {
            config.server.port = port;
        }
        if let Some(ref level) = cli.log_level {
            config.logging.level = level.clone();
        }
        if let Some(ref backend) = cli.storage {
            config.storage.backend = match backend.to_ascii_lowercase().as_str() {
                "memory" => StorageKind::Memory,
                "sqlite" => StorageKind::Sqlite,
                other => return Err(ConfigError::UnknownBackend(other.to_string())),
            };
        }

        Ok(config)
    }

    pub fn parse(path: &str, contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.server.host, self.server.port);
        addr.parse().map_err(|_| ConfigError::ListenAddr(addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.storage.backend, StorageKind::Memory);
        assert!(!config.auth.enabled);
        assert_eq!(config.listen_addr().unwrap().port(), 3000);
    }

    #[test]
    fn test_parse_sections() {
        let config = Config::parse(
            "acas.toml",
            r#"
            [server]
            port = 8080

            [storage]
            backend = "sqlite"
            path = "/tmp/ledger.db"

            [auth]
            enabled = true
            jwt_secret = "s3cret"

            [auth.bootstrap_admin]
            username = "admin"
            password = "admin-pass"

            [[auth.api_keys]]
            name = "ci"
            key = "abc"
            role = "manager"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.storage.backend, StorageKind::Sqlite);
        assert_eq!(config.storage.path, "/tmp/ledger.db");
        assert_eq!(config.auth.token_ttl_minutes, 60);
        assert_eq!(config.auth.bootstrap_admin.unwrap().username, "admin");
        assert_eq!(config.auth.api_keys[0].role, "manager");
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        assert!(matches!(
            Config::parse("bad.toml", "[server\nport = "),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_cli_overrides() {
        let cli = CliArgs {
            config: "does-not-exist.toml".to_string(),
            port: Some(9000),
            log_level: Some("debug".to_string()),
            storage: Some("SQLite".to_string()),
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.storage.backend, StorageKind::Sqlite);

        let bad = CliArgs {
            storage: Some("postgres".to_string()),
            ..cli
        };
        assert!(matches!(Config::load(&bad), Err(ConfigError::UnknownBackend(_))));
    }
}
