//! Application configuration
//!
//! Loads configuration from environment variables. Every setting has a
//! fallback, so loading never fails.

use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Store connection URL; `None` runs the service without a store
    pub database_url: Option<String>,
    /// Origin allowed by CORS
    pub frontend_url: String,
    /// Directory holding uploaded media
    pub upload_dir: String,
    /// Maximum size of a single uploaded file in bytes
    pub max_upload_size: usize,
    /// Emails promoted to admin when their profile is saved
    pub admin_emails: Vec<String>,
    /// Whether status changes require an admin or moderator caller
    pub require_admin_role: bool,
    /// Environment (development/production)
    pub environment: Environment,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Environment {
    Development,
    Production,
}

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_MAX_UPLOAD_SIZE: usize = 50 * 1024 * 1024;

impl Config {
    /// Load configuration from the environment, reading `.env` first if present
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let environment = match var("ENVIRONMENT")
            .or_else(|| var("NODE_ENV"))
            .unwrap_or_else(|| "development".to_string())
            .trim()
            .to_lowercase()
            .as_str()
        {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        };

        let port = match var("PORT") {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, default = DEFAULT_PORT, "Invalid PORT, using default");
                DEFAULT_PORT
            }),
            None => DEFAULT_PORT,
        };

        let require_admin_role = var("REQUIRE_ADMIN_ROLE")
            .and_then(|v| parse_bool(&v))
            .unwrap_or(environment == Environment::Production);

        Config {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            database_url: var("DATABASE_URL")
                .or_else(|| var("MONGODB_URI"))
                .filter(|url| !url.trim().is_empty()),
            frontend_url: var("FRONTEND_URL")
                .unwrap_or_else(|| "http://localhost:5173".to_string()),
            upload_dir: var("UPLOAD_DIR").unwrap_or_else(|| "uploads".to_string()),
            max_upload_size: var("MAX_UPLOAD_SIZE")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(DEFAULT_MAX_UPLOAD_SIZE),
            admin_emails: var("ADMIN_EMAILS")
                .map(|s| parse_list(&s))
                .unwrap_or_default(),
            require_admin_role,
            environment,
        }
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Get the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().to_lowercase())
        .filter(|item| !item.is_empty())
        .collect()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
