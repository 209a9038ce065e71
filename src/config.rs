use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub refresh_secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub window_secs: u64,
    pub max_requests: usize,
    pub auth_max_requests: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: 15 * 60,
            max_requests: 100,
            auth_max_requests: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub jwt: JwtConfig,
    pub rate_limit: RateLimitConfig,
    pub host: String,
    pub port: u16,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            refresh_secret: std::env::var("JWT_REFRESH_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "todo-api".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "todo-api-users".into()),
            ttl_minutes: env_or("JWT_ACCESS_TTL_MINUTES", 60),
            refresh_ttl_minutes: env_or("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 7),
        };
        anyhow::ensure!(
            jwt.secret != jwt.refresh_secret,
            "JWT_SECRET and JWT_REFRESH_SECRET must differ"
        );

        let defaults = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            window_secs: env_or("RATE_LIMIT_WINDOW_SECS", defaults.window_secs),
            max_requests: env_or("RATE_LIMIT_MAX", defaults.max_requests),
            auth_max_requests: env_or("AUTH_RATE_LIMIT_MAX", defaults.auth_max_requests),
        };

        let port = std::env::var("APP_PORT")
            .or_else(|_| std::env::var("PORT"))
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(3000);

        Ok(Self {
            database_url,
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10),
            jwt,
            rate_limit,
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_falls_back_on_garbage() {
        std::env::set_var("TODO_API_TEST_GARBAGE", "not-a-number");
        assert_eq!(env_or("TODO_API_TEST_GARBAGE", 42u64), 42);
        std::env::set_var("TODO_API_TEST_NUMBER", "7");
        assert_eq!(env_or("TODO_API_TEST_NUMBER", 42u64), 7);
    }

    #[test]
    fn default_rate_limits_match_fifteen_minute_window() {
        let cfg = RateLimitConfig::default();
        assert_eq!(cfg.window_secs, 900);
        assert_eq!(cfg.max_requests, 100);
        assert_eq!(cfg.auth_max_requests, 10);
    }
}
