//! Configuration management
//!
//! Configuration is loaded from `config.yml` and then overridden by
//! `BRIGADA_*` environment variables. Missing values fall back to defaults.

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub portal: PortalConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin (for cookie-based auth)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Connection URL or SQLite file path
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/brigada.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    #[default]
    Sqlite,
    Mysql,
}

/// Login session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session lifetime in days
    #[serde(default = "default_expiration_days")]
    pub expiration_days: i64,
    /// Interval between expired-session sweeps, in seconds
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expiration_days: default_expiration_days(),
            cleanup_interval_seconds: default_cleanup_interval(),
        }
    }
}

fn default_expiration_days() -> i64 {
    7
}

fn default_cleanup_interval() -> u64 {
    3600
}

/// Outbound mail configuration.
///
/// Notifications are skipped while no SMTP host or sender address is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_username: Option<String>,
    #[serde(default)]
    pub smtp_password: Option<String>,
    #[serde(default)]
    pub from_email: Option<String>,
    #[serde(default = "default_from_name")]
    pub from_name: String,
    /// Recipients per broadcast batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Pause between broadcast batches, in milliseconds
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: default_smtp_port(),
            smtp_username: None,
            smtp_password: None,
            from_email: None,
            from_name: default_from_name(),
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
        }
    }
}

impl MailConfig {
    pub fn is_configured(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.smtp_host) && present(&self.from_email)
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from_name() -> String {
    "Brigada Portal".to_string()
}

fn default_batch_size() -> usize {
    10
}

fn default_batch_delay_ms() -> u64 {
    1000
}

/// Portal presentation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    #[serde(default = "default_site_name")]
    pub site_name: String,
    /// Public base URL used in links inside emails
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            site_name: default_site_name(),
            base_url: default_base_url(),
        }
    }
}

fn default_site_name() -> String {
    "Brigada Portal".to_string()
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file.
    ///
    /// A missing or empty file yields the defaults; invalid YAML is an error
    /// carrying the line and column.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file with environment variable overrides.
    ///
    /// Recognised variables:
    /// - BRIGADA_SERVER_HOST / BRIGADA_SERVER_PORT / BRIGADA_SERVER_CORS_ORIGIN
    /// - BRIGADA_DATABASE_DRIVER / BRIGADA_DATABASE_URL
    /// - BRIGADA_SESSION_EXPIRATION_DAYS
    /// - BRIGADA_MAIL_SMTP_HOST / BRIGADA_MAIL_SMTP_PORT / BRIGADA_MAIL_SMTP_USERNAME
    /// - BRIGADA_MAIL_SMTP_PASSWORD / BRIGADA_MAIL_FROM_EMAIL / BRIGADA_MAIL_FROM_NAME
    /// - BRIGADA_PORTAL_SITE_NAME / BRIGADA_PORTAL_BASE_URL
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("BRIGADA_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("BRIGADA_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(cors_origin) = std::env::var("BRIGADA_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }

        if let Ok(driver) = std::env::var("BRIGADA_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("BRIGADA_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(days) = std::env::var("BRIGADA_SESSION_EXPIRATION_DAYS") {
            if let Ok(days) = days.parse::<i64>() {
                self.session.expiration_days = days;
            }
        }

        if let Ok(host) = std::env::var("BRIGADA_MAIL_SMTP_HOST") {
            self.mail.smtp_host = Some(host);
        }
        if let Ok(port) = std::env::var("BRIGADA_MAIL_SMTP_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.mail.smtp_port = port;
            }
        }
        if let Ok(username) = std::env::var("BRIGADA_MAIL_SMTP_USERNAME") {
            self.mail.smtp_username = Some(username);
        }
        if let Ok(password) = std::env::var("BRIGADA_MAIL_SMTP_PASSWORD") {
            self.mail.smtp_password = Some(password);
        }
        if let Ok(from) = std::env::var("BRIGADA_MAIL_FROM_EMAIL") {
            self.mail.from_email = Some(from);
        }
        if let Ok(name) = std::env::var("BRIGADA_MAIL_FROM_NAME") {
            self.mail.from_name = name;
        }

        if let Ok(site_name) = std::env::var("BRIGADA_PORTAL_SITE_NAME") {
            self.portal.site_name = site_name;
        }
        if let Ok(base_url) = std::env::var("BRIGADA_PORTAL_BASE_URL") {
            self.portal.base_url = base_url;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.session.expiration_days <= 0 {
            return Err(ConfigError::ValidationError(
                "session.expiration_days must be positive".to_string(),
            ));
        }
        if self.mail.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "mail.batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Config tests that touch the process environment serialize on this mutex.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
