use serde::{Deserialize, Serialize};

use crate::utils::get_env_with_prefix;

/// Main configuration for the revenue reconciliation engine
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RevenueConfig {
    /// Process-wide default billing API key.
    ///
    /// Used when an operator has no scoped credential of their own. `None`
    /// means the live billing integration is disabled unless an operator
    /// carries an override. This value is injected here and passed explicitly
    /// into client construction; nothing reads it ambiently.
    #[serde(default)]
    pub default_api_key: Option<String>,

    pub provider: ProviderConfig,
    pub revalidation: RevalidationConfig,
    pub logging: LoggingConfig,
}

/// Billing provider endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// Base URL of the billing provider API
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Maximum retry attempts for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// Cache revalidation configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RevalidationConfig {
    /// How long a fetched live total is reused before the provider is
    /// consulted again, in seconds (default: 30 minutes)
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_json")]
    pub json: bool,
}

impl Default for RevenueConfig {
    fn default() -> Self {
        Self {
            default_api_key: None,
            provider: ProviderConfig::default(),
            revalidation: RevalidationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout_seconds(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for RevalidationConfig {
    fn default() -> Self {
        Self {
            window_seconds: default_window_seconds(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: default_json(),
        }
    }
}

impl RevalidationConfig {
    /// The revalidation window as a `Duration`
    pub fn window(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.window_seconds)
    }
}

fn default_base_url() -> String {
    "https://api.stripe.com/v1".to_string()
}

fn default_timeout_seconds() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_window_seconds() -> u64 {
    30 * 60
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_json() -> bool {
    false
}

/// Builder for RevenueConfig
///
/// # Example
///
/// ```rust
/// use ledgerline::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .from_env()
///     .revalidation_window_seconds(60 * 60)
///     .build();
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: RevenueConfig,
}

impl ConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load overrides from environment variables.
    ///
    /// Recognized (with optional `LEDGERLINE_` prefix): `BILLING_API_KEY`,
    /// `BILLING_BASE_URL`, `BILLING_TIMEOUT_SECONDS`,
    /// `REVALIDATION_WINDOW_SECONDS`, `LOG_LEVEL`, `LOG_JSON`.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if let Some(key) = get_env_with_prefix("BILLING_API_KEY") {
            self.config.default_api_key = Some(key);
        }
        if let Some(url) = get_env_with_prefix("BILLING_BASE_URL") {
            self.config.provider.base_url = url;
        }
        if let Some(timeout) = get_env_with_prefix("BILLING_TIMEOUT_SECONDS") {
            if let Ok(secs) = timeout.parse() {
                self.config.provider.timeout_seconds = secs;
            }
        }
        if let Some(window) = get_env_with_prefix("REVALIDATION_WINDOW_SECONDS") {
            if let Ok(secs) = window.parse() {
                self.config.revalidation.window_seconds = secs;
            }
        }
        if let Some(level) = get_env_with_prefix("LOG_LEVEL") {
            self.config.logging.level = level;
        }
        if let Some(json) = get_env_with_prefix("LOG_JSON") {
            self.config.logging.json = json.parse().unwrap_or(false);
        }
        self
    }

    #[must_use]
    pub fn default_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.default_api_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn provider_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.provider.base_url = url.into();
        self
    }

    #[must_use]
    pub fn provider_timeout_seconds(mut self, seconds: u64) -> Self {
        self.config.provider.timeout_seconds = seconds;
        self
    }

    #[must_use]
    pub fn revalidation_window_seconds(mut self, seconds: u64) -> Self {
        self.config.revalidation.window_seconds = seconds;
        self
    }

    pub fn build(self) -> RevenueConfig {
        self.config
    }
}
