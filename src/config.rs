use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

use crate::models::SourceInfo;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_GIFT_CARD_API_BASE_URL: &str = "https://giftcards.example.com/v1/gift-cards";
const DEFAULT_GIFT_CARD_API_VERSION: &str = "2020-07-16";
const DEFAULT_GIFT_CARD_TIMEOUT_SECS: u64 = 10;
const DEFAULT_PAYMENT_APPROVAL_RATE: f64 = 0.95;
const DEFAULT_PAYMENT_LATENCY_MS: u64 = 250;
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Base URL of the gift card service, up to and including the
    /// `/gift-cards` collection segment
    #[serde(default = "default_gift_card_api_base_url")]
    pub gift_card_api_base_url: String,

    /// Bearer credential for the gift card service (required, no default)
    pub gift_card_api_token: String,

    /// Merchant account id sent with every gift card service call (required)
    pub gift_card_account_id: String,

    /// Gift card service API version header value
    #[serde(default = "default_gift_card_api_version")]
    pub gift_card_api_version: String,

    /// Per-request timeout for gift card service calls (seconds)
    #[serde(default = "default_gift_card_timeout_secs")]
    pub gift_card_request_timeout_secs: u64,

    /// Tenant attribution attached to transactions
    #[serde(default)]
    pub source_tenant_id: String,

    /// Channel attribution attached to transactions
    #[serde(default)]
    pub source_channel_id: String,

    /// Optional location attribution attached to transactions
    #[serde(default)]
    pub source_location_id: Option<String>,

    /// Fraction of simulated secondary charges that are approved (0.0 - 1.0)
    #[serde(default = "default_payment_approval_rate")]
    #[validate(custom = "validate_approval_rate")]
    pub payment_approval_rate: f64,

    /// Simulated secondary-charge latency in milliseconds
    #[serde(default = "default_payment_latency_ms")]
    pub payment_latency_ms: u64,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// Event channel capacity for async event processing
    #[serde(default = "default_event_channel_capacity")]
    #[validate(custom = "validate_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl AppConfig {
    /// Checks if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Returns true if explicit CORS origins are configured
    pub fn has_cors_allowed_origins(&self) -> bool {
        self.cors_allowed_origins
            .as_ref()
            .map(|raw| raw.split(',').any(|origin| !origin.trim().is_empty()))
            .unwrap_or(false)
    }

    /// Whether we should fall back to permissive CORS
    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    /// Merchant-level source attribution, used when a gift card record
    /// carries none of its own.
    pub fn default_source_info(&self) -> SourceInfo {
        SourceInfo {
            source_tenant_id: self.source_tenant_id.clone(),
            source_channel_id: self.source_channel_id.clone(),
            source_location_id: self
                .source_location_id
                .clone()
                .filter(|loc| !loc.trim().is_empty()),
        }
    }

    /// Constraints that cannot be expressed as per-field validators.
    pub fn validate_additional_constraints(&self) -> Result<(), validator::ValidationErrors> {
        let mut errors = validator::ValidationErrors::new();

        if self.gift_card_api_token.trim().is_empty() {
            let mut err = ValidationError::new("gift_card_api_token_empty");
            err.message =
                Some("Gift card API token must not be empty. Set APP__GIFT_CARD_API_TOKEN.".into());
            errors.add("gift_card_api_token", err);
        }

        if self.gift_card_account_id.trim().is_empty() {
            let mut err = ValidationError::new("gift_card_account_id_empty");
            err.message = Some(
                "Gift card account id must not be empty. Set APP__GIFT_CARD_ACCOUNT_ID.".into(),
            );
            errors.add("gift_card_account_id", err);
        }

        if !self.is_development()
            && !self.has_cors_allowed_origins()
            && !self.cors_allow_any_origin
        {
            let mut err = ValidationError::new("cors_origins_required");
            err.message = Some(
                "Set APP__CORS_ALLOWED_ORIGINS for non-development environments or explicitly opt-in via APP__CORS_ALLOW_ANY_ORIGIN=true".into(),
            );
            errors.add("cors_allowed_origins", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_gift_card_api_base_url() -> String {
    DEFAULT_GIFT_CARD_API_BASE_URL.to_string()
}

fn default_gift_card_api_version() -> String {
    DEFAULT_GIFT_CARD_API_VERSION.to_string()
}

fn default_gift_card_timeout_secs() -> u64 {
    DEFAULT_GIFT_CARD_TIMEOUT_SECS
}

fn default_payment_approval_rate() -> f64 {
    DEFAULT_PAYMENT_APPROVAL_RATE
}

fn default_payment_latency_ms() -> u64 {
    DEFAULT_PAYMENT_LATENCY_MS
}

fn default_event_channel_capacity() -> usize {
    DEFAULT_EVENT_CHANNEL_CAPACITY
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_approval_rate(rate: f64) -> Result<(), ValidationError> {
    if !rate.is_finite() || rate < 0.0 || rate > 1.0 {
        let mut err = ValidationError::new("payment_approval_rate");
        err.message =
            Some("payment_approval_rate must be a finite value between 0.0 and 1.0".into());
        return Err(err);
    }
    Ok(())
}

fn validate_event_channel_capacity(capacity: usize) -> Result<(), ValidationError> {
    if capacity == 0 {
        let mut err = ValidationError::new("event_channel_capacity");
        err.message = Some("event_channel_capacity must be greater than 0".into());
        return Err(err);
    }
    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("giftcard_checkout_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Default config (config/default.toml)
/// 2. Environment-specific config (config/{env}.toml)
/// 3. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    // NOTE: the gift card credentials have no default - they MUST be provided
    // via environment variables or a config file.
    let config = Config::builder()
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    // Check for the credentials before deserialization to give a clear error message
    if config.get_string("gift_card_api_token").is_err() {
        error!("Gift card API token is not configured. Set the APP__GIFT_CARD_API_TOKEN environment variable.");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "gift_card_api_token is required but not configured. Set APP__GIFT_CARD_API_TOKEN."
                .into(),
        )));
    }
    if config.get_string("gift_card_account_id").is_err() {
        error!("Gift card account id is not configured. Set the APP__GIFT_CARD_ACCOUNT_ID environment variable.");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "gift_card_account_id is required but not configured. Set APP__GIFT_CARD_ACCOUNT_ID."
                .into(),
        )));
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig {
            host: "127.0.0.1".into(),
            port: 8080,
            environment: "production".into(),
            log_level: default_log_level(),
            log_json: false,
            gift_card_api_base_url: default_gift_card_api_base_url(),
            gift_card_api_token: "token-123".into(),
            gift_card_account_id: "acct-123".into(),
            gift_card_api_version: default_gift_card_api_version(),
            gift_card_request_timeout_secs: default_gift_card_timeout_secs(),
            source_tenant_id: "tenant-1".into(),
            source_channel_id: "channel-1".into(),
            source_location_id: None,
            payment_approval_rate: default_payment_approval_rate(),
            payment_latency_ms: default_payment_latency_ms(),
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }

    #[test]
    fn non_dev_requires_cors_origins() {
        let cfg = base_config();
        assert!(cfg.validate_additional_constraints().is_err());
    }

    #[test]
    fn non_dev_allows_override_flag() {
        let mut cfg = base_config();
        cfg.cors_allow_any_origin = true;
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn non_dev_with_origins_passes() {
        let mut cfg = base_config();
        cfg.cors_allowed_origins = Some("https://example.com".into());
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn development_allows_permissive_by_default() {
        let mut cfg = base_config();
        cfg.environment = "development".into();
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn empty_credentials_are_rejected() {
        let mut cfg = base_config();
        cfg.environment = "development".into();
        cfg.gift_card_api_token = "   ".into();
        assert!(cfg.validate_additional_constraints().is_err());
    }

    #[test]
    fn approval_rate_out_of_range_is_rejected() {
        let mut cfg = base_config();
        cfg.environment = "development".into();
        cfg.payment_approval_rate = 1.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn blank_location_is_dropped_from_source_info() {
        let mut cfg = base_config();
        cfg.source_location_id = Some("  ".into());
        assert_eq!(cfg.default_source_info().source_location_id, None);
    }
}
