use anyhow::{anyhow, bail, Context, Result};
use common_auth::config::{
    DEFAULT_ACCESS_EXPIRES_SECONDS, DEFAULT_API_KEY_EXPIRES_SECONDS, DEFAULT_REFRESH_EXPIRES_SECONDS,
};
use common_auth::{JwtConfig, RoleMatch, DEFAULT_REGISTRY_TIMEOUT};
use std::env;
use std::fmt::Display;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_PORT: u16 = 8085;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: IpAddr,
    pub port: u16,
    pub jwt: JwtConfig,
    /// Explicit role count. When absent the count is read from the `roles`
    /// table at startup.
    pub role_count: Option<usize>,
    pub role_match: RoleMatch,
    pub registry_timeout: Duration,
    pub database_url: Option<String>,
    pub allowed_origins: Vec<String>,
}

pub fn load_service_config() -> Result<ServiceConfig> {
    ServiceConfig::from_lookup(|key| env::var(key).ok())
}

impl ServiceConfig {
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let customer_secret = required(&lookup, "JWT_SECRET_KEY")?;
        let admin_secret = required(&lookup, "JWT_ADMIN_KEY")?;
        let api_key_secret = required(&lookup, "JWT_API_KEY")?;
        if customer_secret == admin_secret
            || customer_secret == api_key_secret
            || admin_secret == api_key_secret
        {
            bail!("JWT_SECRET_KEY, JWT_ADMIN_KEY and JWT_API_KEY must all differ");
        }

        let access_expires =
            parse_or(&lookup, "JWT_ACCESS_EXPIRES", DEFAULT_ACCESS_EXPIRES_SECONDS)?;
        let refresh_expires =
            parse_or(&lookup, "JWT_REFRESH_EXPIRES", DEFAULT_REFRESH_EXPIRES_SECONDS)?;
        let api_key_expires =
            parse_or(&lookup, "JWT_API_KEY_EXPIRES", DEFAULT_API_KEY_EXPIRES_SECONDS)?;
        let leeway: u32 = parse_or(&lookup, "JWT_LEEWAY_SECONDS", 0)?;

        for (key, seconds) in [
            ("JWT_ACCESS_EXPIRES", access_expires),
            ("JWT_REFRESH_EXPIRES", refresh_expires),
            ("JWT_API_KEY_EXPIRES", api_key_expires),
        ] {
            if seconds <= 0 {
                bail!("{key} must be a positive number of seconds, got {seconds}");
            }
        }

        let jwt = JwtConfig::new(customer_secret, admin_secret, api_key_secret)
            .with_expiry(access_expires, refresh_expires)
            .with_api_key_expiry(api_key_expires)
            .with_leeway(leeway);

        let database_url = lookup("DATABASE_URL").and_then(|value| normalize_optional(&value));
        let role_count = lookup("AUTH_ROLE_COUNT")
            .and_then(|value| normalize_optional(&value))
            .map(|value| {
                value
                    .parse::<usize>()
                    .with_context(|| format!("Failed to parse AUTH_ROLE_COUNT '{value}'"))
            })
            .transpose()?;
        if role_count.is_none() && database_url.is_none() {
            bail!("AUTH_ROLE_COUNT must be set when DATABASE_URL is absent");
        }

        let role_match = match lookup("AUTH_ROLE_MATCH").and_then(|value| normalize_optional(&value)) {
            Some(value) => value
                .parse::<RoleMatch>()
                .map_err(|err| anyhow!("Failed to parse AUTH_ROLE_MATCH: {err}"))?,
            None => RoleMatch::default(),
        };

        let registry_timeout = match lookup("AUTH_REGISTRY_TIMEOUT_MS") {
            Some(value) => Duration::from_millis(
                value
                    .trim()
                    .parse::<u64>()
                    .with_context(|| format!("Failed to parse AUTH_REGISTRY_TIMEOUT_MS '{value}'"))?,
            ),
            None => DEFAULT_REGISTRY_TIMEOUT,
        };

        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let host = host
            .trim()
            .parse::<IpAddr>()
            .with_context(|| format!("Failed to parse HOST '{host}'"))?;
        let port = parse_or(&lookup, "PORT", DEFAULT_PORT)?;

        let allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .map(|value| parse_list(&value))
            .unwrap_or_else(default_origins);

        Ok(ServiceConfig {
            host,
            port,
            jwt,
            role_count,
            role_match,
            registry_timeout,
            database_url,
            allowed_origins,
        })
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|value| normalize_optional(&value))
        .ok_or_else(|| anyhow!("{key} must be set"))
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key).and_then(|value| normalize_optional(&value)) {
        Some(value) => value
            .parse::<T>()
            .map_err(|err| anyhow!("Failed to parse {key} '{value}': {err}")),
        None => Ok(default),
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(|c| c == ',' || c == ';' || c == ' ')
        .filter_map(normalize_optional)
        .collect()
}

fn default_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
    ]
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
