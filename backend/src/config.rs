use anyhow::{anyhow, bail};
use serde::{Deserialize, Serialize};
use std::{env, net::SocketAddr, path::PathBuf, str::FromStr};

use crate::{models::session::MAX_SLOTS, utils::jwt::TokenLifetimes};

/// Shipped placeholder; refusing it forces every deployment to set its own secret.
pub const DEFAULT_JWT_SECRET: &str = "your-secret-key-change-this-in-production";
pub const MIN_JWT_SECRET_LEN: usize = 16;
pub const MAX_ACCESS_TOKEN_TTL_MINUTES: u64 = 24 * 60;
pub const MAX_REFRESH_TOKEN_TTL_DAYS: u64 = 365;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AdminSecret {
    Hash(String),
    Plain(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub access_token_ttl_minutes: u64,
    pub refresh_token_ttl_days: u64,
    pub session_capacity: usize,
    pub session_store_path: PathBuf,
    pub trust_proxy_headers: bool,
    pub admin_username: String,
    pub admin_secret: AdminSecret,
    pub cors_allow_origins: Vec<String>,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = parse_or(&lookup, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?;

        let jwt_secret = lookup("JWT_SECRET").unwrap_or_else(|| DEFAULT_JWT_SECRET.to_string());
        validate_jwt_secret(&jwt_secret)?;

        let access_token_ttl_minutes = parse_or(&lookup, "ACCESS_TOKEN_TTL_MINUTES", 15u64)?;
        let refresh_token_ttl_days = parse_or(&lookup, "REFRESH_TOKEN_TTL_DAYS", 7u64)?;
        if !(1..=MAX_ACCESS_TOKEN_TTL_MINUTES).contains(&access_token_ttl_minutes) {
            bail!(
                "ACCESS_TOKEN_TTL_MINUTES must be between 1 and {}, got {}",
                MAX_ACCESS_TOKEN_TTL_MINUTES,
                access_token_ttl_minutes
            );
        }
        if !(1..=MAX_REFRESH_TOKEN_TTL_DAYS).contains(&refresh_token_ttl_days) {
            bail!(
                "REFRESH_TOKEN_TTL_DAYS must be between 1 and {}, got {}",
                MAX_REFRESH_TOKEN_TTL_DAYS,
                refresh_token_ttl_days
            );
        }

        let session_capacity = parse_or(&lookup, "SESSION_CAPACITY", 10usize)?;
        if session_capacity == 0 || session_capacity > MAX_SLOTS {
            bail!(
                "SESSION_CAPACITY must be between 1 and {}, got {}",
                MAX_SLOTS,
                session_capacity
            );
        }

        let session_store_path = lookup("SESSION_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data/sessions.bin"));

        let trust_proxy_headers = parse_or(&lookup, "TRUST_PROXY_HEADERS", false)?;

        let admin_username = lookup("ADMIN_USERNAME").unwrap_or_else(|| "admin".to_string());
        let admin_secret = match (lookup("ADMIN_PASSWORD_HASH"), lookup("ADMIN_PASSWORD")) {
            (Some(hash), _) if !hash.trim().is_empty() => AdminSecret::Hash(hash),
            (_, Some(plain)) if !plain.is_empty() => AdminSecret::Plain(plain),
            _ => bail!("ADMIN_PASSWORD_HASH or ADMIN_PASSWORD must be set"),
        };

        let cors_allow_origins = lookup("CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|origin| origin.trim().trim_end_matches('/').to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Ok(Config {
            bind_addr,
            jwt_secret,
            access_token_ttl_minutes,
            refresh_token_ttl_days,
            session_capacity,
            session_store_path,
            trust_proxy_headers,
            admin_username,
            admin_secret,
            cors_allow_origins,
        })
    }

    pub fn token_lifetimes(&self) -> TokenLifetimes {
        TokenLifetimes::new(self.access_token_ttl_minutes, self.refresh_token_ttl_days)
    }
}

pub fn validate_jwt_secret(secret: &str) -> anyhow::Result<()> {
    if secret == DEFAULT_JWT_SECRET {
        bail!("JWT_SECRET is still the default placeholder; set a real secret");
    }
    if secret.chars().count() < MIN_JWT_SECRET_LEN {
        bail!(
            "JWT_SECRET must be at least {} characters long",
            MIN_JWT_SECRET_LEN
        );
    }
    Ok(())
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| anyhow!("Invalid {} value: {}", key, raw)),
        _ => Ok(default),
    }
}
