//! Error Types

use thiserror::Error;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Store error types
#[derive(Error, Debug)]
pub enum StoreError {
    /// A call into the purchasing SDK was rejected
    #[error("Purchases SDK error in {operation}: {message}")]
    Vendor {
        operation: &'static str,
        message: String,
    },

    /// Setup never completed, so the SDK is unusable
    #[error("Store setup failed: {0}")]
    SetupFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// Build a vendor error for the named SDK operation
    pub fn vendor(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Vendor {
            operation,
            message: message.into(),
        }
    }

    /// Whether a host could reasonably try again.
    ///
    /// The adapter itself never retries.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Vendor { .. } | Self::Io(_))
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Vendor { .. } => {
                "The store could not complete the request. Please try again.".into()
            }
            Self::SetupFailed(_) => "The store is currently unavailable.".into(),
            Self::Config(_) => "Store configuration error.".into(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}
