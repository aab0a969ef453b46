//! Client configuration loaded from environment variables.
//!
//! Every setting has a default, so a client can start with nothing set apart
//! from `GEMINI_API_KEY`. Without a key, messages that need a grammar check
//! come back with the generic "couldn't verify" suggestion.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use engo_shared::constants::{
    DEFAULT_AUTO_APPROVE_MAX_TOKENS, DEFAULT_FALLBACK_NAME, DEFAULT_STORE_TIMEOUT_MS,
    DEFAULT_VALIDATOR_BASE_URL, DEFAULT_VALIDATOR_MODEL, DEFAULT_VALIDATOR_TIMEOUT_MS,
};

use crate::error::ConfigError;

/// Client configuration.
#[derive(Clone)]
pub struct ClientConfig {
    /// API key for the generative-language service.
    /// Env: `GEMINI_API_KEY`
    pub validator_api_key: Option<String>,

    /// Model used for grammar checks.
    /// Env: `GEMINI_MODEL`
    /// Default: `gemini-1.5-flash`
    pub validator_model: String,

    /// Base URL of the generative-language API.
    /// Env: `GEMINI_BASE_URL`
    pub validator_base_url: String,

    /// Bound on a single validator call.
    /// Env: `VALIDATOR_TIMEOUT_MS`
    /// Default: 10 s
    pub validator_timeout: Duration,

    /// Bound on a single store write.
    /// Env: `STORE_TIMEOUT_MS`
    /// Default: 10 s
    pub store_timeout: Duration,

    /// Messages with at most this many words skip the grammar check.
    /// Env: `AUTO_APPROVE_MAX_TOKENS`
    /// Default: `2`
    pub auto_approve_max_tokens: usize,

    /// SQLite file backing the store. In-memory store when unset.
    /// Env: `ENGO_DB_PATH`
    pub db_path: Option<PathBuf>,

    /// Label for participants without a display name.
    /// Env: `FALLBACK_DISPLAY_NAME`
    /// Default: `User`
    pub fallback_display_name: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            validator_api_key: None,
            validator_model: DEFAULT_VALIDATOR_MODEL.to_string(),
            validator_base_url: DEFAULT_VALIDATOR_BASE_URL.to_string(),
            validator_timeout: Duration::from_millis(DEFAULT_VALIDATOR_TIMEOUT_MS),
            store_timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
            auto_approve_max_tokens: DEFAULT_AUTO_APPROVE_MAX_TOKENS,
            db_path: None,
            fallback_display_name: DEFAULT_FALLBACK_NAME.to_string(),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field(
                "validator_api_key",
                &self.validator_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("validator_model", &self.validator_model)
            .field("validator_base_url", &self.validator_base_url)
            .field("validator_timeout", &self.validator_timeout)
            .field("store_timeout", &self.store_timeout)
            .field("auto_approve_max_tokens", &self.auto_approve_max_tokens)
            .field("db_path", &self.db_path)
            .field("fallback_display_name", &self.fallback_display_name)
            .finish()
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(key) = lookup("GEMINI_API_KEY").filter(|k| !k.trim().is_empty()) {
            config.validator_api_key = Some(key.trim().to_string());
        }

        if let Some(model) = lookup("GEMINI_MODEL").filter(|m| !m.is_empty()) {
            config.validator_model = model;
        }

        if let Some(url) = lookup("GEMINI_BASE_URL").filter(|u| !u.is_empty()) {
            config.validator_base_url = url.trim_end_matches('/').to_string();
        }

        if let Some(ms) = lookup("VALIDATOR_TIMEOUT_MS") {
            match ms.parse::<u64>() {
                Ok(ms) => config.validator_timeout = Duration::from_millis(ms),
                Err(_) => {
                    tracing::warn!(value = %ms, "Invalid VALIDATOR_TIMEOUT_MS, using default")
                }
            }
        }

        if let Some(ms) = lookup("STORE_TIMEOUT_MS") {
            match ms.parse::<u64>() {
                Ok(ms) => config.store_timeout = Duration::from_millis(ms),
                Err(_) => {
                    tracing::warn!(value = %ms, "Invalid STORE_TIMEOUT_MS, using default")
                }
            }
        }

        if let Some(val) = lookup("AUTO_APPROVE_MAX_TOKENS") {
            match val.parse::<usize>() {
                Ok(n) => config.auto_approve_max_tokens = n,
                Err(_) => {
                    tracing::warn!(value = %val, "Invalid AUTO_APPROVE_MAX_TOKENS, using default")
                }
            }
        }

        if let Some(path) = lookup("ENGO_DB_PATH").filter(|p| !p.is_empty()) {
            config.db_path = Some(PathBuf::from(path));
        }

        if let Some(name) = lookup("FALLBACK_DISPLAY_NAME").filter(|n| !n.trim().is_empty()) {
            config.fallback_display_name = name;
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.validator_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("VALIDATOR_TIMEOUT_MS"));
        }
        if self.store_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("STORE_TIMEOUT_MS"));
        }
        Ok(())
    }
}
