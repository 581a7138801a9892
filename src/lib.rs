//! Transaction execution engine
//!
//! Submits a pre-built transaction to a network endpoint, retries whole
//! attempts on failure, and waits for a target confirmation depth or
//! finality within a bounded time.

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod signer;
pub mod types;

pub use client::{ClientPool, JsonRpcClient, NetworkClient, RpcConfig};
pub use engine::{ExecutionEngine, PollState};
pub use error::{EngineError, EngineResult};
pub use signer::TransactionSigner;
pub use types::{
    ConfirmationOutcome, ConfirmationStatus, ExecutionConfig, ExecutionStatus, Signature,
    SubmitOptions, Transaction, TransactionResult,
};
pub use tokio_util::sync::CancellationToken;
