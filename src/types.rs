//! Core data types shared by the engine and network clients

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

/// Network-assigned identifier of a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(String);

impl Signature {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Signature {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Transaction payload handed to the engine by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction {
    /// Serialized message that the signer set signs, in order
    Unsigned { message: Vec<u8> },
    /// Fully signed wire transaction, sent verbatim
    Signed { wire: Vec<u8> },
}

/// Network view of a submitted transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum ConfirmationStatus {
    /// No status reported yet
    Unknown,
    /// Included but not final
    Processing { confirmations: u64 },
    Finalized,
}

impl ConfirmationStatus {
    /// Whether this status satisfies the requested confirmation level.
    ///
    /// Finality satisfies any confirmation target. When `require_finalized`
    /// is set, a high confirmation count alone is never enough.
    pub fn satisfies(&self, target_confirmations: u64, require_finalized: bool) -> bool {
        match self {
            ConfirmationStatus::Unknown => false,
            ConfirmationStatus::Finalized => true,
            ConfirmationStatus::Processing { confirmations } => {
                !require_finalized && *confirmations >= target_confirmations
            }
        }
    }
}

/// Per-call execution parameters
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub max_retries: u32,
    pub skip_confirmation: bool,
    pub max_timeout_secs: u64,
    pub target_confirmations: u64,
    pub require_finalized: bool,
    pub poll_interval_ms: u64,
    pub retry_delay_ms: u64,
    pub skip_client_confirmation: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            skip_confirmation: false,
            max_timeout_secs: 60,
            target_confirmations: 20,
            require_finalized: true,
            poll_interval_ms: 1000,
            retry_delay_ms: 0,
            skip_client_confirmation: false,
        }
    }
}

impl ExecutionConfig {
    /// Validate configuration
    pub fn validate(&self) -> EngineResult<()> {
        if self.max_retries == 0 {
            return Err(EngineError::Config("max_retries must be at least 1".to_string()));
        }
        if self.max_timeout_secs == 0 {
            return Err(EngineError::Config(
                "max_timeout_secs must be positive".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(EngineError::Config(
                "poll_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn max_timeout(&self) -> Duration {
        Duration::from_secs(self.max_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Options forwarded to the network client on submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOptions {
    /// Skip the endpoint's own preflight simulation
    pub skip_preflight: bool,
    /// Skip the client's own post-submission acceptance check
    pub skip_confirmation: bool,
}

/// Final state reported to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Accepted by the endpoint, confirmation not awaited
    Submitted,
    Confirmed,
}

/// Result of a successful `execute` call
#[derive(Debug, Clone, Serialize)]
pub struct TransactionResult {
    pub execution_id: Uuid,
    pub endpoint: String,
    pub signatures: Vec<Signature>,
    pub status: ExecutionStatus,
    /// Attempts used, including the successful one
    pub attempts: u32,
    /// Status queries issued for the successful attempt
    pub poll_ticks: u32,
    pub submitted_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl TransactionResult {
    pub fn is_confirmed(&self) -> bool {
        self.status == ExecutionStatus::Confirmed
    }
}

/// How a single confirmation poll ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    Confirmed { ticks: u32, elapsed: Duration },
    TimedOut { ticks: u32, elapsed: Duration },
}
