//! Configuration management
//!
//! Loads configuration from config.toml with support for:
//! - Server binding and the admin token
//! - SQLite fallback path (PostgreSQL comes from DATABASE_URL)
//! - Submission limits

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

/// Default upper bound on a flag submission, in bytes
pub const DEFAULT_MAX_SUBMISSION_LENGTH: usize = 1024;

/// Main configuration structure matching config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub submissions: SubmissionConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Token required by admin endpoints. Empty disables them.
    #[serde(default)]
    pub admin_token: String,
}

/// Database configuration
///
/// PostgreSQL is selected by the DATABASE_URL environment variable; the
/// SQLite path is only used when that variable is absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub sqlite_path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            sqlite_path: "ctf-scoreboard.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionConfig {
    pub max_submission_length: usize,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            max_submission_length: DEFAULT_MAX_SUBMISSION_LENGTH,
        }
    }
}

impl Config {
    /// Load from specific path
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            let content = std::fs::read_to_string(path).context("Failed to read config file")?;
            Self::parse(&content)
        } else {
            Self::parse(DEFAULT_CONFIG).context("Failed to parse default config")
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    /// Apply CTF_HOST / CTF_PORT / CTF_ADMIN_TOKEN overrides
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(host) = std::env::var("CTF_HOST") {
            if !host.is_empty() {
                self.server.host = host;
            }
        }
        if let Some(port) = std::env::var("CTF_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
        {
            self.server.port = port;
        }
        if let Ok(token) = std::env::var("CTF_ADMIN_TOKEN") {
            self.server.admin_token = token;
        }
        self
    }

    /// Admin token, if admin endpoints are enabled
    pub fn admin_token(&self) -> Option<&str> {
        if self.server.admin_token.is_empty() {
            None
        } else {
            Some(&self.server.admin_token)
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::parse(DEFAULT_CONFIG).unwrap_or_else(|_| Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                admin_token: String::new(),
            },
            database: DatabaseConfig::default(),
            submissions: SubmissionConfig::default(),
        })
    }
}
