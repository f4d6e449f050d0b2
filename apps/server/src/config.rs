//! Server configuration.
//!
//! Loaded in layers, later layers winning:
//!
//! ```text
//! built-in defaults ──► vitrina.toml (optional) ──► VITRINA_* environment
//! ```
//!
//! | Key                   | Env var                       | Default               |
//! |-----------------------|-------------------------------|-----------------------|
//! | `http_port`           | `VITRINA_HTTP_PORT`           | 8080                  |
//! | `bind_addr`           | `VITRINA_BIND_ADDR`           | 0.0.0.0               |
//! | `database_path`       | `VITRINA_DATABASE_PATH`       | ./vitrina.db          |
//! | `jwt_secret`          | `VITRINA_JWT_SECRET`          | development secret    |
//! | `token_lifetime_secs` | `VITRINA_TOKEN_LIFETIME_SECS` | 43200 (12 h)          |
//! | `max_connections`     | `VITRINA_MAX_CONNECTIONS`     | 5                     |
//! | `low_stock_threshold` | `VITRINA_LOW_STOCK_THRESHOLD` | 3                     |
//! | `admin_username`      | `VITRINA_ADMIN_USERNAME`      | admin                 |
//! | `admin_password`      | `VITRINA_ADMIN_PASSWORD`      | unset (no bootstrap)  |

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use vitrina_db::AdminSeed;

/// Secret used when none is configured. Fine on a laptop, never in a shop.
pub const DEV_JWT_SECRET: &str = "vitrina-dev-secret-change-in-production";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub http_port: u16,
    pub bind_addr: String,
    pub database_path: String,
    pub jwt_secret: String,
    pub token_lifetime_secs: i64,
    pub max_connections: u32,
    /// Stock at or below this is reported as low.
    pub low_stock_threshold: i64,
    pub admin_username: String,
    /// When set, an administrator is created on a database without users.
    #[serde(default)]
    pub admin_password: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            http_port: 8080,
            bind_addr: "0.0.0.0".to_string(),
            database_path: "./vitrina.db".to_string(),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            token_lifetime_secs: 12 * 60 * 60,
            max_connections: 5,
            low_stock_threshold: 3,
            admin_username: "admin".to_string(),
            admin_password: None,
        }
    }
}

impl ServerConfig {
    /// Loads `vitrina.toml` from the working directory (if present) and the
    /// `VITRINA_` environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("vitrina")
    }

    /// Like [`ServerConfig::load`] with another file stem.
    pub fn load_from(file_stem: &str) -> Result<Self, ConfigError> {
        let defaults = ServerConfig::default();

        let settings = config::Config::builder()
            .set_default("http_port", i64::from(defaults.http_port))?
            .set_default("bind_addr", defaults.bind_addr)?
            .set_default("database_path", defaults.database_path)?
            .set_default("jwt_secret", defaults.jwt_secret)?
            .set_default("token_lifetime_secs", defaults.token_lifetime_secs)?
            .set_default("max_connections", i64::from(defaults.max_connections))?
            .set_default("low_stock_threshold", defaults.low_stock_threshold)?
            .set_default("admin_username", defaults.admin_username)?
            .add_source(config::File::with_name(file_stem).required(false))
            .add_source(config::Environment::with_prefix("VITRINA").try_parsing(true))
            .build()?;

        let config: ServerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.trim().is_empty() {
            return Err(ConfigError::MissingRequired("jwt_secret".to_string()));
        }
        if self.token_lifetime_secs <= 0 {
            return Err(ConfigError::InvalidValue("token_lifetime_secs".to_string()));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue("max_connections".to_string()));
        }
        if self.low_stock_threshold < 0 {
            return Err(ConfigError::InvalidValue("low_stock_threshold".to_string()));
        }
        self.socket_addr()?;
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.http_port)
            .parse()
            .map_err(|_| ConfigError::InvalidValue("bind_addr".to_string()))
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }

    /// The first-run administrator, if a password was configured.
    pub fn admin_seed(&self) -> Option<AdminSeed> {
        self.admin_password.as_ref().map(|password| AdminSeed {
            username: self.admin_username.clone(),
            password: password.clone(),
            display_name: "Administrador".to_string(),
        })
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.uses_dev_secret());
        assert_eq!(config.socket_addr().unwrap().port(), 8080);
        assert!(config.admin_seed().is_none());
    }

    #[test]
    fn test_invalid_values() {
        let config = ServerConfig {
            token_lifetime_secs: 0,
            ..ServerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));

        let config = ServerConfig {
            bind_addr: "not an address".to_string(),
            ..ServerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(f)) if f == "bind_addr"));

        let config = ServerConfig {
            jwt_secret: "  ".to_string(),
            ..ServerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::MissingRequired(_))));
    }

    #[test]
    fn test_admin_seed() {
        let config = ServerConfig {
            admin_password: Some("cambiar123".to_string()),
            ..ServerConfig::default()
        };
        let seed = config.admin_seed().unwrap();
        assert_eq!(seed.username, "admin");
        assert_eq!(seed.password, "cambiar123");
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = ServerConfig::load_from("does-not-exist-vitrina").unwrap();
        assert!(config.http_port > 0);
        assert!(config.validate().is_ok());
    }
}
