use std::collections::HashMap;

/// The main error type for Ledgerline
#[derive(Debug, thiserror::Error)]
pub enum LedgerlineError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Upstream unavailable: {0}")]
    Unavailable(String),

    #[error("Request timeout")]
    RequestTimeout,

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Error context for additional error information
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Unique error ID for tracking
    pub error_id: Option<String>,
    /// Additional error details
    pub details: Option<String>,
    /// Contextual key-value pairs
    pub context: HashMap<String, String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_error_id(mut self, id: impl Into<String>) -> Self {
        self.error_id = Some(id.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.details = Some(detail.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error with attached context
///
/// Allows attaching context to a LedgerlineError while still being usable
/// as a LedgerlineError via the `Into` trait.
#[derive(Debug)]
pub struct ErrorWithContext {
    error: LedgerlineError,
    context: ErrorContext,
}

impl ErrorWithContext {
    /// Create a new error with context
    pub fn new(error: LedgerlineError, context: ErrorContext) -> Self {
        Self { error, context }
    }

    /// Get a reference to the underlying error
    pub fn error(&self) -> &LedgerlineError {
        &self.error
    }

    /// Get a reference to the context
    pub fn context(&self) -> &ErrorContext {
        &self.context
    }
}

impl std::fmt::Display for ErrorWithContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)?;
        if let Some(ref details) = self.context.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorWithContext {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl From<ErrorWithContext> for LedgerlineError {
    fn from(err: ErrorWithContext) -> Self {
        err.error
    }
}

impl LedgerlineError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn request_timeout() -> Self {
        Self::RequestTimeout
    }

    /// Add context to this error, returning an ErrorWithContext
    pub fn with_context(self, context: ErrorContext) -> ErrorWithContext {
        ErrorWithContext::new(self, context)
    }
}

/// Result type alias for Ledgerline operations
pub type Result<T> = std::result::Result<T, LedgerlineError>;

// Common error type conversions

impl From<serde_json::Error> for LedgerlineError {
    fn from(err: serde_json::Error) -> Self {
        // Classify based on error category
        if err.is_data() || err.is_syntax() || err.is_eof() {
            LedgerlineError::BadRequest(format!("JSON error: {}", err))
        } else {
            // IO errors are internal
            LedgerlineError::Internal(format!("JSON serialization error: {}", err))
        }
    }
}

impl From<reqwest::Error> for LedgerlineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LedgerlineError::RequestTimeout
        } else if err.is_connect() {
            LedgerlineError::Unavailable(format!("Connection error: {}", err))
        } else if err.is_status() {
            match err.status().map(|s| s.as_u16()) {
                Some(503) => {
                    LedgerlineError::Unavailable("Upstream service unavailable".to_string())
                }
                Some(status) if (400..500).contains(&status) => {
                    LedgerlineError::BadRequest(format!("Upstream rejected request: {}", err))
                }
                _ => LedgerlineError::Internal(format!("Upstream error: {}", err)),
            }
        } else {
            LedgerlineError::Internal(format!("Request error: {}", err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let err = LedgerlineError::not_found("Snapshot not found");
        assert!(matches!(err, LedgerlineError::NotFound(_)));
        assert_eq!(err.to_string(), "Not found: Snapshot not found");
    }

    #[test]
    fn test_unavailable_error() {
        let err = LedgerlineError::unavailable("provider is down");
        assert!(matches!(err, LedgerlineError::Unavailable(_)));
        assert_eq!(err.to_string(), "Upstream unavailable: provider is down");
    }

    #[test]
    fn test_anyhow_error() {
        let anyhow_err = anyhow::anyhow!("Something unexpected");
        let err: LedgerlineError = anyhow_err.into();
        assert!(matches!(err, LedgerlineError::Anyhow(_)));
    }

    #[test]
    fn test_error_with_context_display() {
        let error = LedgerlineError::not_found("Operator")
            .with_context(ErrorContext::new().with_detail("op_42 has no ledger"));
        assert_eq!(error.to_string(), "Not found: Operator (op_42 has no ledger)");

        let error = LedgerlineError::not_found("Operator").with_context(ErrorContext::new());
        assert_eq!(error.to_string(), "Not found: Operator");
    }

    #[test]
    fn test_error_with_context_into_ledgerline_error() {
        let with_ctx = LedgerlineError::bad_request("Invalid month key")
            .with_context(ErrorContext::new().with_context("month", "2026-13"));
        assert_eq!(
            with_ctx.context().context.get("month"),
            Some(&"2026-13".to_string())
        );

        let converted: LedgerlineError = with_ctx.into();
        assert!(matches!(converted, LedgerlineError::BadRequest(_)));
    }

    #[test]
    fn test_from_serde_json_syntax_error() {
        let result: std::result::Result<serde_json::Value, _> =
            serde_json::from_str("{ invalid json }");
        let err: LedgerlineError = result.unwrap_err().into();

        assert!(matches!(err, LedgerlineError::BadRequest(_)));
        assert!(err.to_string().contains("JSON error"));
    }
}
