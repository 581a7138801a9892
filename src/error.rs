//! Error types for the execution engine

use thiserror::Error;

/// Main error type for the execution engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Submission to {endpoint} failed: {message}")]
    Submission { endpoint: String, message: String },

    #[error("Status query against {endpoint} failed: {message}")]
    Status { endpoint: String, message: String },

    #[error("RPC error from {endpoint}: {message}")]
    Rpc { endpoint: String, message: String },

    #[error("Signer error: {0}")]
    Signer(String),

    #[error("Confirmation timeout for {signature} after {elapsed_secs}s")]
    ConfirmationTimeout { signature: String, elapsed_secs: u64 },

    #[error("Execution failed after {attempts} attempts: {last_error}")]
    ExecutionFailed {
        attempts: u32,
        #[source]
        last_error: Box<EngineError>,
    },

    #[error("Execution cancelled")]
    Cancelled,
}

impl EngineError {
    /// Check if a per-attempt error should trigger a fresh attempt.
    ///
    /// Everything raised inside an attempt is retried, whatever the client
    /// reports. Only cancellation and an already exhausted execution stop the
    /// loop.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            EngineError::Cancelled | EngineError::ExecutionFailed { .. }
        )
    }

    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Config(_) => "config",
            EngineError::InvalidEndpoint(_) => "invalid_endpoint",
            EngineError::Submission { .. } => "submission",
            EngineError::Status { .. } => "status",
            EngineError::Rpc { .. } => "rpc",
            EngineError::Signer(_) => "signer",
            EngineError::ConfirmationTimeout { .. } => "confirmation_timeout",
            EngineError::ExecutionFailed { .. } => "execution_failed",
            EngineError::Cancelled => "cancelled",
        }
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
