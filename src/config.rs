//! Service configuration: JSON file with per-section defaults, plus
//! environment overrides for the values that change per deployment.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Risk classifier endpoint and outbound timeout
    #[serde(default)]
    pub classifier: ClassifierConfig,
    /// Token signing and superuser allow-list
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Base URL of the scoring service; the client posts to `{base_url}/predict`
    pub base_url: String,
    /// Outbound request timeout (seconds)
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC-SHA256 signing secret for issued tokens
    pub signing_key: String,
    /// Token lifetime (hours)
    pub token_ttl_hours: i64,
    /// User ids allowed to log in through the admin surface
    pub superusers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("antifraud.db"),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 5,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            signing_key: "dev-secret-change-me".to_string(),
            token_ttl_hours: 24,
            superusers: vec!["admin".to_string()],
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

impl AppConfig {
    /// Load from JSON file if present, otherwise defaults; then apply
    /// environment overrides (PORT, DATABASE_PATH, ANTIFRAUD_MODEL_URL,
    /// SECRET_KEY).
    pub fn load(path: &std::path::Path) -> Self {
        let mut config = Self::default();
        if path.exists() {
            if let Ok(data) = std::fs::read_to_string(path) {
                if let Ok(c) = serde_json::from_str::<AppConfig>(&data) {
                    config = c;
                }
            }
        }
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if let Ok(port) = std::env::var("PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Ok(path) = std::env::var("DATABASE_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Ok(url) = std::env::var("ANTIFRAUD_MODEL_URL") {
            self.classifier.base_url = url;
        }
        if let Ok(key) = std::env::var("SECRET_KEY") {
            self.auth.signing_key = key;
        }
    }
}
