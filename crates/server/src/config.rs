//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CYCLEMART_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `CYCLEMART_BASE_URL` - Public URL of the marketplace (checkout redirects land here)
//! - `AUTH_JWT_SECRET` - HS256 secret of the hosted auth provider (min 32 chars, high entropy)
//! - `STRIPE_SECRET_KEY` - Stripe API secret key
//! - `STORAGE_URL` - Base URL of the hosted object storage service
//! - `STORAGE_SERVICE_KEY` - Service-role key for object storage
//!
//! ## Optional
//! - `CYCLEMART_HOST` - Bind address (default: 127.0.0.1)
//! - `CYCLEMART_PORT` - Listen port (default: 3000)
//! - `STRIPE_WEBHOOK_SECRET` - Webhook signing secret (`whsec_...`)
//! - `STRIPE_API_BASE` - Stripe API base URL (default: <https://api.stripe.com>)
//! - `STRIPE_CURRENCY` - Checkout currency (default: usd)
//! - `STORAGE_BUCKET` - Bucket holding product images (default: product-images)
//! - `SIMILAR_PRODUCTS_LIMIT` - Default number of similar listings, 1-24 (default: 6)
//! - `OFFER_TTL_HOURS` - Hours an unanswered offer stays open, 1-720 (default: 48)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Largest number of similar listings a request may ask for.
pub const MAX_SIMILAR_LIMIT: usize = 24;

/// Longest offer lifetime, 30 days.
pub const MAX_OFFER_TTL_HOURS: i64 = 30 * 24;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
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

/// Marketplace server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the marketplace
    pub base_url: String,
    /// Bearer token verification
    pub auth: AuthConfig,
    /// Stripe Checkout configuration
    pub stripe: StripeConfig,
    /// Hosted object storage configuration
    pub storage: StorageConfig,
    /// Marketplace tuning knobs
    pub marketplace: MarketplaceConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Hosted auth provider token settings.
#[derive(Clone)]
pub struct AuthConfig {
    /// HS256 signing secret shared with the auth provider
    pub jwt_secret: SecretString,
    /// Expected `aud` claim
    pub audience: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("audience", &self.audience)
            .finish()
    }
}

/// Stripe configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct StripeConfig {
    /// Secret API key (server-side only)
    pub secret_key: SecretString,
    /// Webhook endpoint signing secret, when webhooks are configured
    pub webhook_secret: Option<SecretString>,
    /// API base URL
    pub api_base: String,
    /// Lowercase ISO currency code used for Checkout Sessions
    pub currency: String,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("api_base", &self.api_base)
            .field("currency", &self.currency)
            .finish()
    }
}

/// Hosted object storage configuration.
#[derive(Clone)]
pub struct StorageConfig {
    /// Storage service base URL
    pub url: String,
    /// Service-role key
    pub service_key: SecretString,
    /// Bucket holding product images
    pub bucket: String,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("url", &self.url)
            .field("service_key", &"[REDACTED]")
            .field("bucket", &self.bucket)
            .finish()
    }
}

/// Marketplace behaviour settings.
#[derive(Debug, Clone)]
pub struct MarketplaceConfig {
    /// Default number of similar listings returned
    pub similar_products_limit: usize,
    /// Hours an offer stays answerable after its last change
    pub offer_ttl_hours: i64,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            similar_products_limit: 6,
            offer_ttl_hours: 48,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("CYCLEMART_DATABASE_URL")?;
        let host = parse_env("CYCLEMART_HOST", "127.0.0.1")?;
        let port = parse_env("CYCLEMART_PORT", "3000")?;
        let base_url = get_required_env("CYCLEMART_BASE_URL")?;
        url::Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("CYCLEMART_BASE_URL".to_string(), e.to_string())
        })?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth: AuthConfig::from_env()?,
            stripe: StripeConfig::from_env()?,
            storage: StorageConfig::from_env()?,
            marketplace: MarketplaceConfig::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl AuthConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = get_validated_secret("AUTH_JWT_SECRET")?;
        validate_secret_length(&jwt_secret, "AUTH_JWT_SECRET")?;
        Ok(Self {
            jwt_secret,
            audience: get_env_or_default("AUTH_JWT_AUDIENCE", "authenticated"),
        })
    }
}

impl StripeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let webhook_secret = match get_optional_env("STRIPE_WEBHOOK_SECRET") {
            Some(value) => {
                validate_secret_strength(&value, "STRIPE_WEBHOOK_SECRET")?;
                Some(SecretString::from(value))
            }
            None => None,
        };

        Ok(Self {
            secret_key: get_validated_secret("STRIPE_SECRET_KEY")?,
            webhook_secret,
            api_base: get_env_or_default("STRIPE_API_BASE", "https://api.stripe.com"),
            currency: get_env_or_default("STRIPE_CURRENCY", "usd").to_lowercase(),
        })
    }
}

impl StorageConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: get_required_env("STORAGE_URL")?
                .trim_end_matches('/')
                .to_string(),
            service_key: get_validated_secret("STORAGE_SERVICE_KEY")?,
            bucket: get_env_or_default("STORAGE_BUCKET", "product-images"),
        })
    }
}

impl MarketplaceConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            similar_products_limit: parse_env("SIMILAR_PRODUCTS_LIMIT", "6")?,
            offer_ttl_hours: parse_env("OFFER_TTL_HOURS", "48")?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the settings against the limits the API enforces.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` naming the offending variable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_SIMILAR_LIMIT).contains(&self.similar_products_limit) {
            return Err(ConfigError::InvalidEnvVar(
                "SIMILAR_PRODUCTS_LIMIT".to_string(),
                format!("must be between 1 and {MAX_SIMILAR_LIMIT}"),
            ));
        }
        if !(1..=MAX_OFFER_TTL_HOURS).contains(&self.offer_ttl_hours) {
            return Err(ConfigError::InvalidEnvVar(
                "OFFER_TTL_HOURS".to_string(),
                format!("must be between 1 and {MAX_OFFER_TTL_HOURS}"),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable (or its default) into `T`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate that a secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_JWT_SECRET_LENGTH,
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
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
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

    fn sample_config() -> ServerConfig {
        ServerConfig {
            database_url: SecretString::from("postgres://localhost/cyclemart"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            auth: AuthConfig {
                jwt_secret: SecretString::from("jwt_signing_value_that_stays_hidden"),
                audience: "authenticated".to_string(),
            },
            stripe: StripeConfig {
                secret_key: SecretString::from("sk_test_hidden_value"),
                webhook_secret: Some(SecretString::from("whsec_hidden_value")),
                api_base: "https://api.stripe.com".to_string(),
                currency: "usd".to_string(),
            },
            storage: StorageConfig {
                url: "https://storage.local".to_string(),
                service_key: SecretString::from("service_role_hidden_value"),
                bucket: "product-images".to_string(),
            },
            marketplace: MarketplaceConfig::default(),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    #[test]
    fn test_marketplace_defaults_are_valid() {
        assert!(MarketplaceConfig::default().validate().is_ok());
    }

    #[test]
    fn test_similar_limit_above_cap_rejected() {
        for limit in [0, MAX_SIMILAR_LIMIT + 1] {
            let config = MarketplaceConfig {
                similar_products_limit: limit,
                ..MarketplaceConfig::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::InvalidEnvVar(var, _)) if var == "SIMILAR_PRODUCTS_LIMIT"
            ));
        }

        let at_cap = MarketplaceConfig {
            similar_products_limit: MAX_SIMILAR_LIMIT,
            ..MarketplaceConfig::default()
        };
        assert!(at_cap.validate().is_ok());
    }

    #[test]
    fn test_offer_ttl_bounds() {
        for hours in [0, -1, MAX_OFFER_TTL_HOURS + 1, i64::MAX] {
            let config = MarketplaceConfig {
                offer_ttl_hours: hours,
                ..MarketplaceConfig::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::InvalidEnvVar(var, _)) if var == "OFFER_TTL_HOURS"
            ));
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-stripe-key-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_accepts_stripe_style_keys() {
        let result = validate_secret_strength("sk_test_51NzQ8dLkA93bXvR2mTqW7hY", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_secret_length() {
        assert!(validate_secret_length(&SecretString::from("short"), "TEST").is_err());
        assert!(validate_secret_length(&SecretString::from("a".repeat(32)), "TEST").is_ok());
    }

    #[test]
    fn test_socket_addr() {
        let addr = sample_config().socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug_output = format!("{:?}", sample_config());

        assert!(debug_output.contains("https://storage.local"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("sk_test_hidden_value"));
        assert!(!debug_output.contains("whsec_hidden_value"));
        assert!(!debug_output.contains("service_role_hidden_value"));
        assert!(!debug_output.contains("jwt_signing_value_that_stays_hidden"));
    }
}
