use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres URL. `None` runs against the in-memory store.
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub frontend_url: String,
    /// Base URL this service is reached at; used to build confirmation links.
    pub public_url: String,
    pub cors_extra_origins: Vec<String>,

    pub jwt_secret: String,
    pub session_ttl_secs: i64,
    pub confirmation_ttl_secs: i64,
    pub require_email_confirmation: bool,
    pub secure_cookies: bool,

    pub store_timeout_ms: u64,
    pub request_timeout_secs: u64,

    pub auth_rate_limit: u32,
    pub auth_rate_window_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            host: "0.0.0.0".into(),
            port: 8080,
            frontend_url: "http://localhost:3000".into(),
            public_url: "http://localhost:8080".into(),
            cors_extra_origins: Vec::new(),
            jwt_secret: String::new(),
            session_ttl_secs: 604800,
            confirmation_ttl_secs: 86400,
            require_email_confirmation: true,
            secure_cookies: false,
            store_timeout_ms: 5000,
            request_timeout_secs: 15,
            auth_rate_limit: 10,
            auth_rate_window_secs: 60,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        if jwt_secret.len() < 16 {
            anyhow::bail!("JWT_SECRET must be at least 16 characters");
        }

        Ok(Self {
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            host: env::var("HOST").unwrap_or(defaults.host),
            port: parse_var("PORT", defaults.port)?,
            frontend_url: env::var("FRONTEND_URL").unwrap_or(defaults.frontend_url),
            public_url: env::var("PUBLIC_URL").unwrap_or(defaults.public_url),
            cors_extra_origins: env::var("CORS_EXTRA_ORIGINS")
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|o| !o.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),

            jwt_secret,
            session_ttl_secs: parse_var("SESSION_TTL_SECS", defaults.session_ttl_secs)?,
            confirmation_ttl_secs: parse_var(
                "CONFIRMATION_TTL_SECS",
                defaults.confirmation_ttl_secs,
            )?,
            require_email_confirmation: parse_var(
                "REQUIRE_EMAIL_CONFIRMATION",
                defaults.require_email_confirmation,
            )?,
            secure_cookies: parse_var("SECURE_COOKIES", defaults.secure_cookies)?,

            store_timeout_ms: parse_var("STORE_TIMEOUT_MS", defaults.store_timeout_ms)?,
            request_timeout_secs: parse_var(
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout_secs,
            )?,

            auth_rate_limit: parse_var("AUTH_RATE_LIMIT", defaults.auth_rate_limit)?,
            auth_rate_window_secs: parse_var(
                "AUTH_RATE_WINDOW_SECS",
                defaults.auth_rate_window_secs,
            )?,
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn confirmation_url(&self, token: &str) -> String {
        format!("{}/confirm?token={}", self.public_url.trim_end_matches('/'), token)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} has an invalid value: {raw:?}")),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listen_addr_joins_host_and_port() {
        let config = Config {
            host: "127.0.0.1".into(),
            port: 9000,
            ..Config::default()
        };
        assert_eq!(config.listen_addr(), "127.0.0.1:9000");
    }

    #[test]
    fn test_confirmation_url_points_at_confirm_page() {
        let config = Config {
            public_url: "https://habits.example.com/".into(),
            ..Config::default()
        };
        assert_eq!(
            config.confirmation_url("abc.def"),
            "https://habits.example.com/confirm?token=abc.def"
        );
    }

    #[test]
    fn test_defaults_require_confirmation() {
        let config = Config::default();
        assert!(config.require_email_confirmation);
        assert_eq!(config.store_timeout(), Duration::from_secs(5));
    }
}
