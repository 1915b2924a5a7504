use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;

const DEV_JWT_SECRET: &str = "arkpos-dev-secret";

/// Runtime settings read from the environment (and `.env` when present).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    pub bcrypt_cost: u32,
    /// When set, events go to Postgres instead of memory.
    pub database_url: Option<String>,
    pub font_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        // A missing .env file is the normal case in production.
        dotenv::dotenv().ok();

        let bind = var_or("ARKPOS_BIND", "0.0.0.0:8080")
            .parse()
            .context("ARKPOS_BIND must be a socket address such as 0.0.0.0:8080")?;

        let jwt_secret = match std::env::var("JWT_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => secret,
            _ => {
                tracing::warn!("JWT_SECRET not set; using insecure dev default");
                DEV_JWT_SECRET.to_string()
            }
        };

        let ttl_minutes: i64 = var_or("TOKEN_TTL_MINUTES", "480")
            .parse()
            .context("TOKEN_TTL_MINUTES must be a whole number of minutes")?;
        if ttl_minutes <= 0 {
            anyhow::bail!("TOKEN_TTL_MINUTES must be positive");
        }

        let bcrypt_cost = match std::env::var("BCRYPT_COST") {
            Ok(raw) => raw.parse().context("BCRYPT_COST must be a number between 4 and 31")?,
            Err(_) => bcrypt::DEFAULT_COST,
        };

        let database_url = std::env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty());

        Ok(Self {
            bind,
            jwt_secret,
            token_ttl: chrono::Duration::minutes(ttl_minutes),
            bcrypt_cost,
            database_url,
            font_dir: PathBuf::from(var_or("ARKPOS_FONT_DIR", "./fonts")),
        })
    }

    /// In-memory settings for tests and local experiments.
    pub fn in_memory(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 0)),
            jwt_secret: jwt_secret.into(),
            token_ttl: chrono::Duration::minutes(480),
            bcrypt_cost: 4,
            database_url: None,
            font_dir: PathBuf::from("./fonts"),
        }
    }
}

fn var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
