//! Runtime configuration loaded from environment variables.

/// Server configuration
#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub rate_limit_per_minute: u32,
    pub default_admin_password: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://data/astex.db".to_string(),
            bind_addr: "0.0.0.0:3000".to_string(),
            jwt_secret: String::new(),
            token_ttl_hours: 24,
            rate_limit_per_minute: 100,
            default_admin_password: "changeme".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// `JWT_SECRET` is mandatory; everything else falls back to defaults
    /// with a warning when a value fails to parse.
    pub fn from_env() -> Result<AppConfig, String> {
        let mut config = AppConfig::default();

        config.jwt_secret = std::env::var("JWT_SECRET")
            .map_err(|_| "JWT_SECRET must be set".to_string())?;
        if config.jwt_secret.len() < 16 {
            return Err("JWT_SECRET must be at least 16 characters".to_string());
        }

        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database_url = url;
        }

        if let Ok(addr) = std::env::var("BIND_ADDR") {
            config.bind_addr = addr;
        }

        if let Ok(ttl) = std::env::var("TOKEN_TTL_HOURS") {
            match ttl.parse::<i64>() {
                Ok(value) if value > 0 => config.token_ttl_hours = value,
                Ok(value) => {
                    tracing::warn!(
                        "Invalid TOKEN_TTL_HOURS value: {} (must be positive), using default: {}",
                        value,
                        config.token_ttl_hours
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse TOKEN_TTL_HOURS '{}': {}, using default: {}",
                        ttl,
                        e,
                        config.token_ttl_hours
                    );
                }
            }
        }

        if let Ok(limit) = std::env::var("RATE_LIMIT_PER_MINUTE") {
            match limit.parse::<u32>() {
                Ok(value) if value > 0 => config.rate_limit_per_minute = value,
                _ => {
                    tracing::warn!(
                        "Invalid RATE_LIMIT_PER_MINUTE '{}', using default: {}",
                        limit,
                        config.rate_limit_per_minute
                    );
                }
            }
        }

        if let Ok(password) = std::env::var("DEFAULT_ADMIN_PASSWORD") {
            config.default_admin_password = password;
        }

        Ok(config)
    }
}
