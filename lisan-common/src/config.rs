//! Configuration loading
//!
//! Settings resolve in priority order:
//! 1. Command-line arguments (applied by the binary)
//! 2. Environment variables (`LISAN_*`)
//! 3. TOML config file
//! 4. Built-in defaults
//!
//! The TOML file is located via `--config`, then `LISAN_CONFIG`, then
//! `~/.config/lisan/config.toml`, then `/etc/lisan/config.toml`.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 3000;

/// Google TTS rejects synchronous requests above 5000 bytes of input
pub const DEFAULT_LONG_TEXT_THRESHOLD: usize = 5000;

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Path to the SQLite database file
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Interface to bind
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    /// Admin account created at startup if missing
    #[serde(default)]
    pub admin: Option<AdminSeed>,

    #[serde(default)]
    pub tts: TtsConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub ocr: OcrConfig,

    #[serde(default)]
    pub webhook: WebhookConfig,

    #[serde(default)]
    pub audio: AudioConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Bearer-token settings
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Secret used to sign tokens. Generated and stored in the database when absent.
    #[serde(default)]
    pub token_secret: Option<String>,

    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
    #[serde(default = "default_admin_username")]
    pub username: String,
}

/// Google Cloud Text-to-Speech
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TtsConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    /// Override for the synthesize endpoint (testing, proxies)
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Cloudinary media storage
#[derive(Debug, Clone, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub cloud_name: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_secret: Option<String>,
}

/// OpenAI vision OCR
#[derive(Debug, Clone, Deserialize)]
pub struct OcrConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_ocr_model")]
    pub model: String,
}

/// Cloud-storage completion webhook
#[derive(Debug, Clone, Deserialize, Default)]
pub struct WebhookConfig {
    /// Path segment that must match for the webhook route to accept a call
    #[serde(default)]
    pub secret_key: Option<String>,
    /// Bucket the notifications refer to, used to build public URLs
    #[serde(default)]
    pub bucket_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,
    /// Lesson content longer than this (bytes) goes through the audio job queue
    #[serde(default = "default_long_text_threshold")]
    pub long_text_threshold: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_token_ttl_hours() -> i64 {
    24
}

fn default_admin_username() -> String {
    "Admin".to_string()
}

fn default_ocr_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_long_text_threshold() -> usize {
    DEFAULT_LONG_TEXT_THRESHOLD
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            host: default_host(),
            port: default_port(),
            logging: LoggingConfig::default(),
            auth: AuthConfig::default(),
            admin: None,
            tts: TtsConfig::default(),
            storage: StorageConfig::default(),
            ocr: OcrConfig::default(),
            webhook: WebhookConfig::default(),
            audio: AudioConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: None,
            token_ttl_hours: default_token_ttl_hours(),
        }
    }
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_ocr_model(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            long_text_threshold: default_long_text_threshold(),
        }
    }
}

impl TomlConfig {
    /// Parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid config file {}: {}", path.display(), e)))
    }

    /// Locate and load the config file, fall back to defaults, then apply
    /// environment overrides
    pub fn resolve(cli_path: Option<&Path>) -> Result<Self> {
        let mut config = match locate_config_file(cli_path) {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                Self::load(&path)?
            }
            None => {
                debug!("No config file found, using built-in defaults");
                Self::default()
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Overlay `LISAN_*` environment variables on top of file values
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_value("LISAN_DATABASE_PATH") {
            self.database_path = Some(PathBuf::from(v));
        }
        if let Some(v) = env_value("LISAN_HOST") {
            self.host = v;
        }
        if let Some(port) = env_value("LISAN_PORT").and_then(|v| v.parse().ok()) {
            self.port = port;
        }
        if let Some(v) = env_value("LISAN_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = env_value("LISAN_TOKEN_SECRET") {
            self.auth.token_secret = Some(v);
        }
        if let (Some(email), Some(password)) =
            (env_value("LISAN_ADMIN_EMAIL"), env_value("LISAN_ADMIN_PASSWORD"))
        {
            self.admin = Some(AdminSeed {
                email,
                password,
                username: default_admin_username(),
            });
        }
        if let Some(v) = env_value("LISAN_TTS_API_KEY") {
            self.tts.api_key = Some(v);
        }
        if let Some(v) = env_value("LISAN_CLOUDINARY_CLOUD_NAME") {
            self.storage.cloud_name = Some(v);
        }
        if let Some(v) = env_value("LISAN_CLOUDINARY_API_KEY") {
            self.storage.api_key = Some(v);
        }
        if let Some(v) = env_value("LISAN_CLOUDINARY_API_SECRET") {
            self.storage.api_secret = Some(v);
        }
        if let Some(v) = env_value("LISAN_OPENAI_API_KEY") {
            self.ocr.api_key = Some(v);
        }
        if let Some(v) = env_value("LISAN_WEBHOOK_SECRET_KEY") {
            self.webhook.secret_key = Some(v);
        }
        if let Some(v) = env_value("LISAN_GCS_BUCKET_NAME") {
            self.webhook.bucket_name = Some(v);
        }
        if let Some(v) = env_value("LISAN_FFMPEG_PATH") {
            self.audio.ffmpeg_path = PathBuf::from(v);
        }
    }

    /// Database path, falling back to the OS data directory
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(default_database_path)
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Find the config file to load, if any
pub fn locate_config_file(cli_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    if let Some(path) = env_value("LISAN_CONFIG") {
        return Some(PathBuf::from(path));
    }

    let user_config = dirs::config_dir().map(|d| d.join("lisan").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    let system_config = PathBuf::from("/etc/lisan/config.toml");
    if system_config.exists() {
        return Some(system_config);
    }

    None
}

/// OS-dependent default database location
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("lisan").join("lisan.db"))
        .unwrap_or_else(|| PathBuf::from("./lisan_data/lisan.db"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.auth.token_ttl_hours, 24);
        assert_eq!(config.audio.long_text_threshold, 5000);
        assert_eq!(config.ocr.model, "gpt-4o-mini");
        assert!(config.admin.is_none());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            port = 8080

            [webhook]
            secret_key = "abc"
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.webhook.secret_key.as_deref(), Some("abc"));
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.audio.ffmpeg_path, PathBuf::from("ffmpeg"));
    }

    #[test]
    fn test_admin_section_default_username() {
        let config: TomlConfig = toml::from_str(
            r#"
            [admin]
            email = "admin@example.com"
            password = "password123"
            "#,
        )
        .unwrap();

        let admin = config.admin.unwrap();
        assert_eq!(admin.username, "Admin");
        assert_eq!(admin.email, "admin@example.com");
    }

    #[test]
    fn test_explicit_database_path_wins() {
        let config = TomlConfig {
            database_path: Some(PathBuf::from("/tmp/x.db")),
            ..TomlConfig::default()
        };
        assert_eq!(config.database_path(), PathBuf::from("/tmp/x.db"));
    }
}
