//! Live billing provider client.
//!
//! Production HTTP client for the provider's subscription collection, with
//! retry logic, secure API key handling, and proper error mapping.

use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

use super::error::BillingError;
use super::feed::{SubscriptionFeed, SubscriptionPage, PAGE_LIMIT};

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the live billing client.
#[derive(Debug, Clone)]
pub struct LiveBillingClientConfig {
    /// Maximum number of retry attempts for transient failures.
    pub max_retries: u32,
    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,
    /// Maximum delay between retries in milliseconds.
    pub max_delay_ms: u64,
    /// Per-page request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for LiveBillingClientConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            timeout_seconds: 10,
        }
    }
}

impl LiveBillingClientConfig {
    /// Create a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum retry attempts.
    #[must_use]
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set base delay for exponential backoff.
    #[must_use]
    pub fn base_delay_ms(mut self, ms: u64) -> Self {
        self.base_delay_ms = ms;
        self
    }

    /// Set maximum delay between retries.
    #[must_use]
    pub fn max_delay_ms(mut self, ms: u64) -> Self {
        self.max_delay_ms = ms;
        self
    }

    /// Set per-page request timeout.
    #[must_use]
    pub fn timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }
}

// ============================================================================
// API Key Validation
// ============================================================================

/// Validate a billing API key format.
///
/// Valid formats:
/// - `sk_test_*` - Test mode secret key
/// - `sk_live_*` - Live mode secret key
/// - `rk_test_*` - Test mode restricted key
/// - `rk_live_*` - Live mode restricted key
fn validate_api_key(key: &str) -> std::result::Result<(), BillingError> {
    const MIN_KEY_LENGTH: usize = 20;

    if key.is_empty() {
        return Err(BillingError::InvalidKey {
            reason: "API key cannot be empty".to_string(),
        });
    }

    if key.len() < MIN_KEY_LENGTH {
        return Err(BillingError::InvalidKey {
            reason: format!("API key too short (minimum {} characters)", MIN_KEY_LENGTH),
        });
    }

    let valid_prefixes = ["sk_test_", "sk_live_", "rk_test_", "rk_live_"];
    if !valid_prefixes.iter().any(|prefix| key.starts_with(prefix)) {
        return Err(BillingError::InvalidKey {
            reason: "API key must start with sk_test_, sk_live_, rk_test_, or rk_live_"
                .to_string(),
        });
    }

    Ok(())
}

// ============================================================================
// Live Billing Client
// ============================================================================

/// Live billing provider client for production use.
///
/// Implements `SubscriptionFeed` with:
/// - Secure API key handling using `SecretString`
/// - Retry logic with exponential backoff for transient failures
/// - Per-attempt timeouts so a hung provider cannot stall reconciliation
/// - Error mapping to `BillingError` types
///
/// # Example
///
/// ```rust,ignore
/// use ledgerline::billing::{LiveBillingClient, LiveBillingClientConfig};
///
/// let client = LiveBillingClient::new(
///     "sk_live_xxx".to_string(),
///     "https://api.stripe.com/v1",
///     LiveBillingClientConfig::default(),
/// )?;
///
/// let total = ledgerline::billing::fetch_live_monthly_total(&client).await?;
/// ```
#[derive(Clone)]
pub struct LiveBillingClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    config: LiveBillingClientConfig,
}

impl LiveBillingClient {
    /// Create a new live billing client.
    ///
    /// The API key is validated and stored securely, and won't be exposed in
    /// debug output. `base_url` points at the provider API root and may be
    /// overridden for tests or self-hosted gateways.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key format is invalid.
    pub fn new(
        api_key: impl Into<SecretString>,
        base_url: impl Into<String>,
        config: LiveBillingClientConfig,
    ) -> std::result::Result<Self, BillingError> {
        let api_key: SecretString = api_key.into();
        validate_api_key(api_key.expose_secret())?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("ledgerline/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            config,
        })
    }

    /// Create a client with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key format is invalid.
    pub fn with_default_config(
        api_key: impl Into<SecretString>,
        base_url: impl Into<String>,
    ) -> std::result::Result<Self, BillingError> {
        Self::new(api_key, base_url, LiveBillingClientConfig::default())
    }

    /// Check if the client is using a test mode API key.
    #[must_use]
    pub fn is_test_mode(&self) -> bool {
        let key = self.api_key.expose_secret();
        key.starts_with("sk_test_") || key.starts_with("rk_test_")
    }

    /// Check if the client is using a live mode API key.
    #[must_use]
    pub fn is_live_mode(&self) -> bool {
        let key = self.api_key.expose_secret();
        key.starts_with("sk_live_") || key.starts_with("rk_live_")
    }

    /// Get the configured per-page timeout duration.
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_seconds)
    }

    /// Perform one page request without retry handling.
    async fn attempt_fetch_page(
        &self,
        cursor: Option<&str>,
    ) -> std::result::Result<SubscriptionPage, BillingError> {
        let url = format!("{}/subscriptions", self.base_url);
        let mut request = self
            .http
            .get(&url)
            .bearer_auth(self.api_key.expose_secret())
            .query(&[
                ("status", "active".to_string()),
                ("limit", PAGE_LIMIT.to_string()),
            ]);
        if let Some(cursor) = cursor {
            request = request.query(&[("starting_after", cursor)]);
        }

        let response = request.send().await.map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(BillingError::UpstreamUnavailable {
                status: Some(status.as_u16()),
                message: truncate(&message, 200),
            });
        }

        response
            .json::<SubscriptionPage>()
            .await
            .map_err(|e| BillingError::InvalidResponse {
                message: e.to_string(),
            })
    }
}

// Debug implementation that doesn't expose the API key
impl std::fmt::Debug for LiveBillingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveBillingClient")
            .field("base_url", &self.base_url)
            .field("config", &self.config)
            .field("is_test_mode", &self.is_test_mode())
            .finish_non_exhaustive()
    }
}

impl SubscriptionFeed for LiveBillingClient {
    async fn fetch_page(
        &self,
        cursor: Option<&str>,
    ) -> std::result::Result<SubscriptionPage, BillingError> {
        with_retry(&self.config, "fetch_subscriptions_page", || {
            self.attempt_fetch_page(cursor)
        })
        .await
    }
}

// ============================================================================
// Retry Logic
// ============================================================================

/// Execute an async operation with retry logic and timeout.
///
/// Retries on:
/// - HTTP 429 (Rate Limited)
/// - HTTP 5xx (Server Errors)
/// - Transport failures and timeouts
async fn with_retry<T, F, Fut>(
    config: &LiveBillingClientConfig,
    operation: &str,
    operation_fn: F,
) -> std::result::Result<T, BillingError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<T, BillingError>>,
{
    let timeout_duration = Duration::from_secs(config.timeout_seconds);
    let mut attempts = 0;

    loop {
        // Apply timeout to the operation
        let result = tokio::time::timeout(timeout_duration, operation_fn()).await;

        match result {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => {
                if !e.is_retryable() || attempts >= config.max_retries {
                    return Err(e);
                }

                log_retry(operation, attempts, &e, config);
                sleep_with_backoff(attempts, config).await;
                attempts += 1;
            }
            Err(_timeout) => {
                if attempts >= config.max_retries {
                    return Err(BillingError::UpstreamUnavailable {
                        status: None,
                        message: format!(
                            "Request timed out after {} seconds",
                            config.timeout_seconds
                        ),
                    });
                }

                tracing::warn!(
                    target: "ledgerline::billing::provider",
                    operation = operation,
                    attempt = attempts + 1,
                    timeout_seconds = config.timeout_seconds,
                    "Billing provider request timed out, retrying"
                );

                sleep_with_backoff(attempts, config).await;
                attempts += 1;
            }
        }
    }
}

/// Log a retry attempt.
#[inline]
fn log_retry(
    operation: &str,
    attempts: u32,
    error: &BillingError,
    config: &LiveBillingClientConfig,
) {
    let delay = calculate_backoff_delay(attempts, config.base_delay_ms, config.max_delay_ms);
    tracing::warn!(
        target: "ledgerline::billing::provider",
        operation = operation,
        attempt = attempts + 1,
        delay_ms = delay.as_millis() as u64,
        error = %error,
        "Retrying billing provider call after transient error"
    );
}

/// Sleep with exponential backoff.
#[inline]
async fn sleep_with_backoff(attempts: u32, config: &LiveBillingClientConfig) {
    let delay = calculate_backoff_delay(attempts, config.base_delay_ms, config.max_delay_ms);
    tokio::time::sleep(delay).await;
}

/// Calculate backoff delay with exponential backoff and jitter.
#[inline]
fn calculate_backoff_delay(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    // Exponential backoff: base_ms * 2^attempt
    let delay_ms = base_ms.saturating_mul(2_u64.saturating_pow(attempt));
    let delay_ms = delay_ms.min(max_ms);

    // Add jitter (0-25% of delay)
    let jitter = if delay_ms > 0 {
        fastrand::u64(0..=delay_ms / 4)
    } else {
        0
    };
    Duration::from_millis(delay_ms.saturating_add(jitter))
}

// ============================================================================
// Error Mapping
// ============================================================================

/// Map reqwest transport errors to BillingError.
fn map_transport_error(error: reqwest::Error) -> BillingError {
    let status = error.status().map(|s| s.as_u16());
    let message = if error.is_timeout() {
        "request timed out".to_string()
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else {
        error.to_string()
    };

    BillingError::UpstreamUnavailable { status, message }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &s[..end])
    }
}

// ============================================================================
// Tests
// ============================================================================
