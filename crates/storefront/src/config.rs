//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `PostgreSQL` connection string
//! - `ANIMART_BASE_URL` - Public URL of the API (`https://` enables secure cookies)
//! - `ANIMART_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `ANIMART_HOST` - Bind address (default: 127.0.0.1)
//! - `ANIMART_PORT` - Listen port (default: 3000)
//! - `UPSTASH_REDIS_REST_URL` / `UPSTASH_REDIS_REST_TOKEN` - Hosted Redis for
//!   rate limiting. Both or neither; without them an in-process limiter is used.
//! - `ANIMART_FREE_SHIPPING_THRESHOLD` - Subtotal that ships free (default: 50.00)
//! - `ANIMART_FLAT_SHIPPING_RATE` - Shipping below the threshold (default: 5.99)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use animart_core::pricing::ShippingPolicy;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL
    pub base_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Hosted Redis for rate limiting, if configured
    pub redis: Option<RedisRestConfig>,
    /// Free-shipping threshold and flat rate
    pub shipping: ShippingPolicy,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

/// Redis REST endpoint and token.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct RedisRestConfig {
    pub url: Url,
    pub token: SecretString,
}

impl std::fmt::Debug for RedisRestConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisRestConfig")
            .field("url", &self.url.as_str())
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let database_url = get_required_secret("DATABASE_URL")?;
        let host = get_env_or_default("ANIMART_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("ANIMART_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("ANIMART_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("ANIMART_PORT".to_string(), e.to_string()))?;
        let base_url = get_required_env("ANIMART_BASE_URL")?;
        Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("ANIMART_BASE_URL".to_string(), e.to_string())
        })?;
        let session_secret = get_validated_secret("ANIMART_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "ANIMART_SESSION_SECRET")?;

        let redis = RedisRestConfig::from_parts(
            get_optional_env("UPSTASH_REDIS_REST_URL"),
            get_optional_env("UPSTASH_REDIS_REST_TOKEN"),
        )?;

        let shipping = ShippingPolicy {
            free_threshold: get_decimal_or_default("ANIMART_FREE_SHIPPING_THRESHOLD", "50.00")?,
            flat_rate: get_decimal_or_default("ANIMART_FLAT_SHIPPING_RATE", "5.99")?,
        };

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            redis,
            shipping,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` attribute.
    #[must_use]
    pub fn is_https(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl RedisRestConfig {
    fn from_parts(url: Option<String>, token: Option<String>) -> Result<Option<Self>, ConfigError> {
        match (url, token) {
            (None, None) => Ok(None),
            (Some(url), Some(token)) => {
                let url = Url::parse(&url).map_err(|e| {
                    ConfigError::InvalidEnvVar("UPSTASH_REDIS_REST_URL".to_string(), e.to_string())
                })?;
                if url.scheme() != "https" && url.scheme() != "http" {
                    return Err(ConfigError::InvalidEnvVar(
                        "UPSTASH_REDIS_REST_URL".to_string(),
                        "must be an http(s) URL".to_string(),
                    ));
                }
                validate_secret_strength(&token, "UPSTASH_REDIS_REST_TOKEN")?;
                Ok(Some(Self {
                    url,
                    token: SecretString::from(token),
                }))
            }
            (Some(_), None) => Err(ConfigError::MissingEnvVar(
                "UPSTASH_REDIS_REST_TOKEN".to_string(),
            )),
            (None, Some(_)) => Err(ConfigError::MissingEnvVar(
                "UPSTASH_REDIS_REST_URL".to_string(),
            )),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse a non-negative decimal amount, falling back to `default`.
fn get_decimal_or_default(key: &str, default: &str) -> Result<Decimal, ConfigError> {
    parse_amount(key, &get_env_or_default(key, default))
}

fn parse_amount(key: &str, raw: &str) -> Result<Decimal, ConfigError> {
    let value = raw
        .trim()
        .parse::<Decimal>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if value.is_sign_negative() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must not be negative".to_string(),
        ));
    }
    Ok(value)
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config() -> StorefrontConfig {
        StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/animart"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            session_secret: SecretString::from("x".repeat(32)),
            redis: None,
            shipping: ShippingPolicy::default(),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    #[test]
    fn test_shannon_entropy() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
        assert!(shannon_entropy("aB3$xY9!mK2@nL5#") > 3.3);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let err = validate_secret_strength("your-api-key-here", "TEST_VAR").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
        assert!(validate_secret_strength("changeme123", "TEST_VAR").is_err());
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        assert!(validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR").is_ok());
    }

    #[test]
    fn test_validate_session_secret_length() {
        assert!(validate_session_secret(&SecretString::from("short"), "S").is_err());
        assert!(validate_session_secret(&SecretString::from("a".repeat(32)), "S").is_ok());
    }

    #[test]
    fn test_socket_addr_and_https() {
        let mut config = config();
        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
        assert!(!config.is_https());
        config.base_url = "https://shop.animart.dev".to_string();
        assert!(config.is_https());
    }

    #[test]
    fn test_redis_config_requires_both_halves() {
        assert!(RedisRestConfig::from_parts(None, None).unwrap().is_none());
        assert!(matches!(
            RedisRestConfig::from_parts(Some("https://r.upstash.io".into()), None),
            Err(ConfigError::MissingEnvVar(_))
        ));
        assert!(matches!(
            RedisRestConfig::from_parts(None, Some("AXk3Jq9LmP2vR8tZ".into())),
            Err(ConfigError::MissingEnvVar(_))
        ));
        assert!(matches!(
            RedisRestConfig::from_parts(Some("ftp://r".into()), Some("AXk3Jq9LmP2vR8tZ".into())),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
        let cfg = RedisRestConfig::from_parts(
            Some("https://eu1-fine-cat.upstash.io".into()),
            Some("AXk3Jq9LmP2vR8tZwB7n".into()),
        )
        .unwrap()
        .unwrap();
        assert_eq!(cfg.url.host_str(), Some("eu1-fine-cat.upstash.io"));
    }

    #[test]
    fn test_redis_config_debug_redacts_token() {
        let cfg = RedisRestConfig {
            url: Url::parse("https://eu1-fine-cat.upstash.io").unwrap(),
            token: SecretString::from("AXk3Jq9LmP2vR8tZwB7n"),
        };
        let debug_output = format!("{cfg:?}");
        assert!(debug_output.contains("eu1-fine-cat.upstash.io"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("AXk3Jq9LmP2vR8tZwB7n"));
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("K", "5.99").unwrap(), Decimal::new(599, 2));
        assert!(parse_amount("K", "-1").is_err());
        assert!(parse_amount("K", "free").is_err());
    }
}
