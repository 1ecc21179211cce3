//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ASAAS_API_KEY` - Asaas API key (rejected if it looks like a placeholder).
//!   Optional for [`StorefrontConfig::from_env_offline`].
//!
//! ## Optional
//! - `QUANTOFY_DATA_DIR` - Directory of the file-backed store (default: ./data)
//! - `ASAAS_BASE_URL` - Gateway base URL (default: Asaas sandbox)
//! - `ASAAS_WEBHOOK_TOKEN` - Expected `asaas-access-token` on inbound webhooks
//! - `QUANTOFY_AUTH_LATENCY_MS` - Simulated auth latency (default: 1000)
//! - `QUANTOFY_CART_CLEAR_GRACE_MS` - Delay before a paid cart is cleared (default: 2000)
//! - `QUANTOFY_PAYMENT_DUE_DAYS` - Days until a charge is due (default: 7, at most 365)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

/// Asaas sandbox API.
pub const DEFAULT_ASAAS_BASE_URL: &str = "https://sandbox.asaas.com/api/v3";

const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_AUTH_LATENCY_MS: u64 = 1000;
const DEFAULT_CART_CLEAR_GRACE_MS: u64 = 2000;
const DEFAULT_PAYMENT_DUE_DAYS: u32 = 7;
const MAX_PAYMENT_DUE_DAYS: u32 = 365;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "your_",
    "changeme",
    "replace",
    "placeholder",
    "example",
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
    /// Directory holding one JSON document per storage key
    pub data_dir: PathBuf,
    /// Payment gateway configuration
    pub asaas: AsaasConfig,
    /// Simulated latency of login, register and password reset
    pub auth_latency: Duration,
    /// Delay between a confirmed checkout and the cart being cleared
    pub cart_clear_grace: Duration,
    /// Days from today until a created charge is due
    pub payment_due_days: u32,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

/// Asaas gateway configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct AsaasConfig {
    /// API root, e.g. `https://sandbox.asaas.com/api/v3`
    pub base_url: Url,
    /// Sent as the `access_token` header; `None` when loaded offline
    pub api_key: Option<SecretString>,
    /// Token Asaas sends back in `asaas-access-token` on webhooks
    pub webhook_token: Option<SecretString>,
}

impl std::fmt::Debug for AsaasConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsaasConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field(
                "webhook_token",
                &self.webhook_token.as_ref().map(|_| "[REDACTED]"),
            )
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
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration for work that never calls the gateway.
    ///
    /// `ASAAS_API_KEY` may be unset; when set it is still validated.
    ///
    /// # Errors
    ///
    /// Same as [`StorefrontConfig::from_env`], except for a missing API key.
    pub fn from_env_offline() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup_offline(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Same as [`StorefrontConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Self::load(&Env(&lookup), ApiKey::Required)
    }

    /// [`StorefrontConfig::from_env_offline`] over an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Same as [`StorefrontConfig::from_env_offline`].
    pub fn from_lookup_offline(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        Self::load(&Env(&lookup), ApiKey::Optional)
    }

    fn load(env: &Env<'_>, api_key: ApiKey) -> Result<Self, ConfigError> {
        let data_dir = PathBuf::from(env.or_default("QUANTOFY_DATA_DIR", DEFAULT_DATA_DIR));
        let asaas = AsaasConfig::from_env(env, api_key)?;
        let auth_latency = Duration::from_millis(
            env.parse_or("QUANTOFY_AUTH_LATENCY_MS", DEFAULT_AUTH_LATENCY_MS)?,
        );
        let cart_clear_grace = Duration::from_millis(
            env.parse_or("QUANTOFY_CART_CLEAR_GRACE_MS", DEFAULT_CART_CLEAR_GRACE_MS)?,
        );
        let payment_due_days = env.parse_or("QUANTOFY_PAYMENT_DUE_DAYS", DEFAULT_PAYMENT_DUE_DAYS)?;
        if payment_due_days > MAX_PAYMENT_DUE_DAYS {
            return Err(ConfigError::InvalidEnvVar(
                "QUANTOFY_PAYMENT_DUE_DAYS".to_string(),
                format!("{payment_due_days} exceeds the maximum of {MAX_PAYMENT_DUE_DAYS} days"),
            ));
        }

        Ok(Self {
            data_dir,
            asaas,
            auth_latency,
            cart_clear_grace,
            payment_due_days,
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
        })
    }
}

#[derive(Clone, Copy)]
enum ApiKey {
    Required,
    Optional,
}

impl AsaasConfig {
    fn from_env(env: &Env<'_>, api_key: ApiKey) -> Result<Self, ConfigError> {
        let raw_url = env.or_default("ASAAS_BASE_URL", DEFAULT_ASAAS_BASE_URL);
        let base_url = Url::parse(&raw_url)
            .map_err(|e| ConfigError::InvalidEnvVar("ASAAS_BASE_URL".to_string(), e.to_string()))?;

        let webhook_token = env
            .optional("ASAAS_WEBHOOK_TOKEN")
            .map(|token| {
                validate_secret_strength(&token, "ASAAS_WEBHOOK_TOKEN")?;
                Ok::<_, ConfigError>(SecretString::from(token))
            })
            .transpose()?;

        Ok(Self {
            base_url,
            api_key: match api_key {
                ApiKey::Required => Some(env.validated_secret("ASAAS_API_KEY")?),
                ApiKey::Optional => env
                    .optional("ASAAS_API_KEY")
                    .map(|key| {
                        validate_secret_strength(&key, "ASAAS_API_KEY")?;
                        Ok::<_, ConfigError>(SecretString::from(key))
                    })
                    .transpose()?,
            },
            webhook_token,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    /// Get an optional variable; empty values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get a variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    /// Parse a variable, falling back to `default` when unset.
    fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key).map_or(Ok(default), |raw| {
            raw.trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
    }

    /// Load and validate a secret.
    fn validated_secret(&self, key: &str) -> Result<SecretString, ConfigError> {
        let value = self.required(key)?;
        validate_secret_strength(&value, key)?;
        Ok(SecretString::from(value))
    }
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
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the key issued by the Asaas dashboard."
            ),
        ));
    }

    Ok(())
}
