//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional; defaults target a local development backend.
//!
//! - `SPAZA_API_BASE_URL` - Remote shop API base URL (default: `http://localhost:8089`)
//! - `SPAZA_API_TIMEOUT_SECS` - Request timeout in seconds (default: transport default)
//! - `SPAZA_SESSION_FILE` - File holding the persisted session token (default: `.spaza/session.json`)
//! - `SPAZA_INVOICE_DIR` - Directory generated invoices are written to (default: `.`)
//! - `PAYFAST_PROCESS_URL` - Payment gateway form endpoint (default: `PayFast` sandbox)
//! - `PAYFAST_MERCHANT_ID` - Merchant ID (default: sandbox merchant)
//! - `PAYFAST_MERCHANT_KEY` - Merchant key (default: sandbox key)
//! - `PAYFAST_RETURN_URL` - Where the gateway sends the customer after paying
//! - `PAYFAST_CANCEL_URL` - Where the gateway sends the customer after cancelling
//! - `PAYFAST_NOTIFY_URL` - Gateway server-to-server notification URL
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_API_BASE_URL: &str = "http://localhost:8089";
const DEFAULT_SESSION_FILE: &str = ".spaza/session.json";
const DEFAULT_PAYFAST_PROCESS_URL: &str = "https://sandbox.payfast.co.za/eng/process";
const DEFAULT_PAYFAST_MERCHANT_ID: &str = "10000100";
const DEFAULT_PAYFAST_MERCHANT_KEY: &str = "46f0cd694581a";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Remote shop API configuration
    pub api: ApiConfig,
    /// Payment gateway configuration
    pub payment: PaymentConfig,
    /// Durable key/value file for the session token
    pub session_file: PathBuf,
    /// Directory generated invoices are written to
    pub invoice_dir: PathBuf,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Remote shop API configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL every endpoint path is appended to
    pub base_url: Url,
    /// Request timeout; `None` keeps the transport default
    pub timeout: Option<Duration>,
}

/// `PayFast` payment gateway configuration.
///
/// Implements `Debug` manually to redact the merchant key.
#[derive(Clone)]
pub struct PaymentConfig {
    /// Gateway form endpoint
    pub process_url: Url,
    /// Merchant ID
    pub merchant_id: String,
    /// Merchant key
    pub merchant_key: SecretString,
    /// Return URL after a successful payment
    pub return_url: String,
    /// Return URL after a cancelled payment
    pub cancel_url: String,
    /// Server-to-server notification URL
    pub notify_url: String,
}

impl std::fmt::Debug for PaymentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentConfig")
            .field("process_url", &self.process_url.as_str())
            .field("merchant_id", &self.merchant_id)
            .field("merchant_key", &"[REDACTED]")
            .field("return_url", &self.return_url)
            .field("cancel_url", &self.cancel_url)
            .field("notify_url", &self.notify_url)
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
    /// Returns `ConfigError` if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Lookup(&lookup);

        let api = ApiConfig {
            base_url: env.url_or_default("SPAZA_API_BASE_URL", DEFAULT_API_BASE_URL)?,
            timeout: env.timeout("SPAZA_API_TIMEOUT_SECS")?,
        };

        let payment = PaymentConfig {
            process_url: env.url_or_default("PAYFAST_PROCESS_URL", DEFAULT_PAYFAST_PROCESS_URL)?,
            merchant_id: env.or_default("PAYFAST_MERCHANT_ID", DEFAULT_PAYFAST_MERCHANT_ID),
            merchant_key: SecretString::from(
                env.or_default("PAYFAST_MERCHANT_KEY", DEFAULT_PAYFAST_MERCHANT_KEY),
            ),
            return_url: env.or_default("PAYFAST_RETURN_URL", "http://localhost:3000/return"),
            cancel_url: env.or_default("PAYFAST_CANCEL_URL", "http://localhost:3000/cancel"),
            notify_url: env.or_default("PAYFAST_NOTIFY_URL", "http://localhost:3000/notify"),
        };

        Ok(Self {
            api,
            payment,
            session_file: PathBuf::from(env.or_default("SPAZA_SESSION_FILE", DEFAULT_SESSION_FILE)),
            invoice_dir: PathBuf::from(env.or_default("SPAZA_INVOICE_DIR", ".")),
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
        })
    }

    /// Configuration pointing at `base_url` with every other setting defaulted.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `base_url` is not a valid URL.
    pub fn for_base_url(base_url: &str) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| (key == "SPAZA_API_BASE_URL").then(|| base_url.to_string()))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Lookup<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Lookup<'_, F> {
    /// Get an optional variable, treating empty values as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// Get a variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn url_or_default(&self, key: &str, default: &str) -> Result<Url, ConfigError> {
        let raw = self.or_default(key, default);
        let url = Url::parse(&raw)
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEnvVar(
                key.to_string(),
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }
        Ok(url)
    }

    fn timeout(&self, key: &str) -> Result<Option<Duration>, ConfigError> {
        self.optional(key)
            .map(|raw| {
                raw.parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
            })
            .transpose()
    }
}
