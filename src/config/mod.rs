use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Overrides `data_dir` when set, e.g. `sqlite::memory:`
    #[serde(default)]
    pub database_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
            database_url: None,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Bootstrap admin account, created on startup if missing
    #[serde(default)]
    pub admin_email: Option<String>,
    #[serde(default)]
    pub admin_password: Option<String>,
    #[serde(default = "default_admin_name")]
    pub admin_name: String,
    /// Static bearer token that authenticates as a synthetic admin
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_session_ttl_days")]
    pub session_ttl_days: i64,
    #[serde(default = "default_min_password_length")]
    pub min_password_length: usize,
    /// Create the caller's employee profile during registration
    #[serde(default = "default_true")]
    pub create_profile_on_register: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_email: None,
            admin_password: None,
            admin_name: default_admin_name(),
            api_token: None,
            session_ttl_days: default_session_ttl_days(),
            min_password_length: default_min_password_length(),
            create_profile_on_register: true,
        }
    }
}

fn default_admin_name() -> String {
    "Administrator".to_string()
}

fn default_session_ttl_days() -> i64 {
    7
}

fn default_min_password_length() -> usize {
    6
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://127.0.0.1:3000".to_string(),
    ]
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| "Failed to parse configuration file")?;
            Ok(config)
        } else {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.auth.session_ttl_days, 7);
        assert_eq!(config.auth.min_password_length, 6);
        assert!(config.auth.create_profile_on_register);
        assert_eq!(config.cors.allowed_origins.len(), 2);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_file_keeps_section_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 8081

            [auth]
            admin_email = "root@example.com"
            create_profile_on_register = false
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.auth.admin_email.as_deref(), Some("root@example.com"));
        assert!(!config.auth.create_profile_on_register);
        assert_eq!(config.auth.session_ttl_days, 7);
        assert_eq!(config.bind_address(), "0.0.0.0:8081");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load(Path::new("/nonexistent/taskdesk.toml")).unwrap();
        assert_eq!(config.server.port, 5000);
    }
}
