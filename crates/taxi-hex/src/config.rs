use serde::Deserialize;
use std::env;

use crate::application::tokens::MAX_TOKEN_TTL_SECS;

pub const DEV_JWT_SECRET: &str = "insecure-dev-secret-change-me";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: String,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    pub driver_page_size: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let server_port = env::var("SERVER_PORT").unwrap_or_else(|_| "3000".into());
        let database_url = env::var("DATABASE_URL").ok();
        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => {
                tracing::warn!("JWT_SECRET not set, using the development secret");
                DEV_JWT_SECRET.to_string()
            }
        };
        let config = Self {
            server_port,
            database_url,
            jwt_secret,
            access_token_ttl_secs: token_ttl(
                "ACCESS_TOKEN_TTL_SECS",
                parse_or_default("ACCESS_TOKEN_TTL_SECS", 300)?,
            )?,
            refresh_token_ttl_secs: token_ttl(
                "REFRESH_TOKEN_TTL_SECS",
                parse_or_default("REFRESH_TOKEN_TTL_SECS", 86_400)?,
            )?,
            driver_page_size: parse_or_default("DRIVER_PAGE_SIZE", 10)?,
        };
        if config.driver_page_size == 0 {
            anyhow::bail!("DRIVER_PAGE_SIZE must be at least 1");
        }
        Ok(config)
    }
}

fn token_ttl(key: &str, secs: i64) -> anyhow::Result<i64> {
    if !(1..=MAX_TOKEN_TTL_SECS).contains(&secs) {
        anyhow::bail!("{key} must be between 1 and {MAX_TOKEN_TTL_SECS} seconds, got {secs}");
    }
    Ok(secs)
}

fn parse_or_default<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| anyhow::anyhow!("invalid {key}: {err}")),
        Err(_) => Ok(default),
    }
}
