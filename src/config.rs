use std::env;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub share_code: ShareCodeConfig,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origin allowed by CORS.
    pub frontend_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub expiration_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShareCodeConfig {
    /// Signing secret for share codes. Falls back to the JWT secret when unset.
    pub secret: Option<String>,
    /// Validity used when the owner does not ask for a specific TTL.
    pub default_ttl_hours: i64,
    /// Upper bound for an owner-configured TTL.
    pub max_ttl_hours: i64,
}

impl ShareCodeConfig {
    pub fn signing_secret<'a>(&'a self, jwt: &'a JwtConfig) -> &'a str {
        self.secret.as_deref().unwrap_or(&jwt.secret)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// When true the sub-user link is looked up on every request and the
    /// parent/role claims baked into the token are ignored. When false the
    /// login-time claims are trusted until the token expires.
    pub revalidate_sub_user_link: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Allowed requests per second (per IP) for auth endpoints (e.g. /api/auth/login)
    pub auth_per_second: u32,
    /// Burst size for auth endpoints
    pub auth_burst: u32,
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let share_code = ShareCodeConfig {
            secret: env::var("SHARE_CODE_SECRET").ok().filter(|s| !s.is_empty()),
            default_ttl_hours: env::var("SHARE_CODE_TTL_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SHARE_CODE_TTL_HOURS".to_string()))?,
            max_ttl_hours: env::var("SHARE_CODE_MAX_TTL_HOURS")
                .unwrap_or_else(|_| "168".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SHARE_CODE_MAX_TTL_HOURS".to_string()))?,
        };

        if share_code.default_ttl_hours <= 0
            || share_code.default_ttl_hours > share_code.max_ttl_hours
        {
            return Err(ConfigError::InvalidValue("SHARE_CODE_TTL_HOURS".to_string()));
        }

        Ok(Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?,
                frontend_url: env::var("FRONTEND_URL")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://data/pets.db".to_string()),
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            },
            jwt: JwtConfig {
                secret: env::var("JWT_SECRET")
                    .map_err(|_| ConfigError::MissingEnv("JWT_SECRET".to_string()))?,
                expiration_hours: env::var("JWT_EXPIRATION_HOURS")
                    .unwrap_or_else(|_| "24".to_string())
                    .parse()
                    .unwrap_or(24),
            },
            share_code,
            auth: AuthConfig {
                revalidate_sub_user_link: env::var("AUTH_REVALIDATE_SUB_USER_LINK")
                    .ok()
                    .and_then(|v| parse_bool(&v))
                    .unwrap_or(true),
            },
            rate_limit: RateLimitConfig {
                auth_per_second: env::var("RATE_LIMIT_AUTH_PER_SECOND")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()
                    .unwrap_or(3),
                auth_burst: env::var("RATE_LIMIT_AUTH_BURST")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
            },
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                frontend_url: "http://localhost:3000".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://data/pets.db".to_string(),
                max_connections: 5,
            },
            jwt: JwtConfig {
                secret: String::new(),
                expiration_hours: 24,
            },
            share_code: ShareCodeConfig {
                secret: None,
                default_ttl_hours: 24,
                max_ttl_hours: 168,
            },
            auth: AuthConfig {
                revalidate_sub_user_link: true,
            },
            rate_limit: RateLimitConfig {
                auth_per_second: 3,
                auth_burst: 10,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn share_code_secret_falls_back_to_jwt_secret() {
        let mut config = Config::default();
        config.jwt.secret = "jwt-secret".to_string();
        assert_eq!(config.share_code.signing_secret(&config.jwt), "jwt-secret");

        config.share_code.secret = Some("share-secret".to_string());
        assert_eq!(config.share_code.signing_secret(&config.jwt), "share-secret");
    }
}
