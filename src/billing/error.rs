//! Billing-specific error types.
//!
//! Every variant here degrades to a lower-precedence revenue tier in the
//! reconciliation engine; none of them is fatal to the host application.

use std::fmt;

/// Billing provider errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingError {
    /// The API key failed format validation.
    InvalidKey { reason: String },

    /// The provider was unreachable, timed out, or answered non-2xx.
    UpstreamUnavailable {
        /// HTTP status if a response was received.
        status: Option<u16>,
        message: String,
    },

    /// A page fetch failed mid-pagination. The partial sum is discarded.
    UpstreamPartial { page: usize, message: String },

    /// Pagination did not terminate within the hard page cap.
    PageCapExceeded { pages: usize },

    /// The provider answered 2xx but the body did not decode.
    InvalidResponse { message: String },
}

impl fmt::Display for BillingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidKey { reason } => {
                write!(f, "Invalid billing API key: {}", reason)
            }
            Self::UpstreamUnavailable { status, message } => {
                write!(f, "Billing provider unavailable: {}", message)?;
                if let Some(status) = status {
                    write!(f, " [HTTP {}]", status)?;
                }
                Ok(())
            }
            Self::UpstreamPartial { page, message } => {
                write!(
                    f,
                    "Billing fetch aborted on page {}: {} (partial sum discarded)",
                    page, message
                )
            }
            Self::PageCapExceeded { pages } => {
                write!(f, "Billing pagination exceeded {} pages without terminating", pages)
            }
            Self::InvalidResponse { message } => {
                write!(f, "Invalid billing provider response: {}", message)
            }
        }
    }
}

impl std::error::Error for BillingError {}

impl BillingError {
    /// Check if this is a client-side error (bad key, bad request).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::InvalidKey { .. } => true,
            Self::UpstreamUnavailable { status, .. } => {
                matches!(status, Some(400..=499)) && !matches!(status, Some(429))
            }
            _ => false,
        }
    }

    /// Check if this error is retryable.
    ///
    /// Rate limits (429), server errors (5xx), and transport failures with no
    /// response at all are retryable; everything else is not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::UpstreamUnavailable { status, .. } => {
                matches!(status, Some(429) | Some(500..=599) | None)
            }
            _ => false,
        }
    }
}

impl From<BillingError> for crate::error::LedgerlineError {
    fn from(err: BillingError) -> Self {
        match &err {
            BillingError::InvalidKey { .. } => {
                crate::error::LedgerlineError::BadRequest(err.to_string())
            }
            BillingError::UpstreamUnavailable { .. }
            | BillingError::UpstreamPartial { .. }
            | BillingError::PageCapExceeded { .. } => {
                crate::error::LedgerlineError::Unavailable(err.to_string())
            }
            BillingError::InvalidResponse { .. } => {
                crate::error::LedgerlineError::Internal(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BillingError::UpstreamUnavailable {
            status: Some(503),
            message: "connection reset".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Billing provider unavailable: connection reset [HTTP 503]"
        );

        let err = BillingError::UpstreamPartial {
            page: 2,
            message: "timeout".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Billing fetch aborted on page 2: timeout (partial sum discarded)"
        );
    }

    #[test]
    fn test_error_classification() {
        let rate_limited = BillingError::UpstreamUnavailable {
            status: Some(429),
            message: "rate limited".to_string(),
        };
        assert!(rate_limited.is_retryable());
        assert!(!rate_limited.is_client_error());

        let unauthorized = BillingError::UpstreamUnavailable {
            status: Some(401),
            message: "bad key".to_string(),
        };
        assert!(!unauthorized.is_retryable());
        assert!(unauthorized.is_client_error());

        let network = BillingError::UpstreamUnavailable {
            status: None,
            message: "connection refused".to_string(),
        };
        assert!(network.is_retryable());

        let partial = BillingError::UpstreamPartial {
            page: 3,
            message: "boom".to_string(),
        };
        assert!(!partial.is_retryable());
    }

    #[test]
    fn test_convert_to_ledgerline_error() {
        let err: crate::error::LedgerlineError = BillingError::UpstreamUnavailable {
            status: Some(500),
            message: "oops".to_string(),
        }
        .into();
        assert!(matches!(err, crate::error::LedgerlineError::Unavailable(_)));

        let err: crate::error::LedgerlineError = BillingError::InvalidKey {
            reason: "too short".to_string(),
        }
        .into();
        assert!(matches!(err, crate::error::LedgerlineError::BadRequest(_)));
    }
}
