//! Signer seam for external key management
//!
//! Key material never enters the engine. Callers hand in implementations of
//! [`TransactionSigner`] backed by whatever keystore they use.

use crate::error::EngineResult;

/// Produces signatures over a serialized transaction message
pub trait TransactionSigner: Send + Sync {
    /// Public key of the signer, encoded for display
    fn public_key(&self) -> String;

    /// Sign the serialized message, returning raw signature bytes
    fn sign(&self, message: &[u8]) -> EngineResult<Vec<u8>>;
}
