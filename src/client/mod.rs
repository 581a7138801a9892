//! Network client module - the two primitives the engine depends on
//!
//! This module provides:
//! - The `NetworkClient` trait (submit + status query)
//! - A JSON-RPC implementation with per-request timeouts
//! - Wire encoding helpers for signed transactions
//! - A per-endpoint client pool

pub mod pool;
pub mod rpc;
pub mod wire;

pub use pool::ClientPool;
pub use rpc::{JsonRpcClient, RpcConfig};

use crate::error::EngineResult;
use crate::signer::TransactionSigner;
use crate::types::{ConfirmationStatus, Signature, SubmitOptions, Transaction};

use async_trait::async_trait;
use std::sync::Arc;

/// Capabilities the engine needs from a network endpoint
///
/// Any error other than [`EngineError::Cancelled`] returned from `submit` or
/// `get_status` fails the current attempt and is retried by the engine.
///
/// [`EngineError::Cancelled`]: crate::error::EngineError::Cancelled
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NetworkClient: Send + Sync {
    /// Endpoint this client talks to
    fn endpoint(&self) -> String;

    /// Submit a transaction, returning the signatures assigned on acceptance
    async fn submit(
        &self,
        transaction: &Transaction,
        signers: &[Arc<dyn TransactionSigner>],
        opts: SubmitOptions,
    ) -> EngineResult<Vec<Signature>>;

    /// Query status for each signature, in order
    async fn get_status(&self, signatures: &[Signature]) -> EngineResult<Vec<ConfirmationStatus>>;
}
