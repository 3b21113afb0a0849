//! Application configuration loaded from environment variables.

use std::{env, net::SocketAddr};

use anyhow::{Context, Result};

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    /// Key used to sign session tokens.
    pub session_secret: String,
    pub session_ttl_hours: i64,
    /// Default page size for paginated listings; 0 disables pagination.
    pub page_size: u32,
    pub max_page_size: u32,
    pub json_logs: bool,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_var("PORT", 3001),
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", 5),
            session_secret: env::var("SESSION_SECRET").context("SESSION_SECRET must be set")?,
            session_ttl_hours: parse_var("SESSION_TTL_HOURS", 24 * 14),
            page_size: parse_var("PAGE_SIZE", 10),
            max_page_size: parse_var("MAX_PAGE_SIZE", 100),
            json_logs: env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        })
    }

    /// Configuration for an in-memory database, used by tests and local runs.
    pub fn in_memory(session_secret: &str) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            database_url: "sqlite::memory:".to_string(),
            db_max_connections: 1,
            session_secret: session_secret.to_string(),
            session_ttl_hours: 24,
            page_size: 10,
            max_page_size: 100,
            json_logs: false,
        }
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
