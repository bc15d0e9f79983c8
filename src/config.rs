use std::path::PathBuf;

use anyhow::Context;

/// Upper bound for `SESSION_TTL_MINUTES`: one year.
pub const MAX_SESSION_TTL_MINUTES: i64 = 60 * 24 * 365;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub secure_cookie: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub session: SessionConfig,
    pub files_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_vars<F>(var: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = var("DATABASE_URL").unwrap_or_else(|| "sqlite://users.db".into());
        let max_connections = var("DATABASE_MAX_CONNECTIONS")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(5);
        let ttl_minutes = var("SESSION_TTL_MINUTES")
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(60 * 24);
        anyhow::ensure!(
            (1..=MAX_SESSION_TTL_MINUTES).contains(&ttl_minutes),
            "SESSION_TTL_MINUTES must be between 1 and {}, got {}",
            MAX_SESSION_TTL_MINUTES,
            ttl_minutes
        );
        let session = SessionConfig {
            secret: var("SESSION_SECRET").context("SESSION_SECRET must be set")?,
            issuer: var("SESSION_ISSUER").unwrap_or_else(|| "gatekeep".into()),
            audience: var("SESSION_AUDIENCE").unwrap_or_else(|| "gatekeep-web".into()),
            ttl_minutes,
            secure_cookie: var("SESSION_COOKIE_SECURE")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        };
        let files_dir = var("FILES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("static/files"));
        Ok(Self {
            database_url,
            max_connections,
            session,
            files_dir,
        })
    }
}
