//! Execution engine - submit, retry and await confirmation
//!
//! Each attempt is a full resubmission followed by a fresh confirmation poll.
//! Per-attempt failures are logged and retried; only an exhausted retry
//! budget surfaces as `ExecutionFailed`.

mod confirmation;
mod executor;

pub use confirmation::PollState;

use crate::client::NetworkClient;

use std::sync::Arc;

/// Retry and confirmation state machine over an injected network client
pub struct ExecutionEngine<C: ?Sized> {
    client: Arc<C>,
    endpoint: String,
}

impl<C: NetworkClient + ?Sized> ExecutionEngine<C> {
    /// Create an engine that submits through `client`
    pub fn new(client: Arc<C>) -> Self {
        let endpoint = client.endpoint();
        Self { client, endpoint }
    }

    /// Endpoint of the underlying client
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl<C: ?Sized> Clone for ExecutionEngine<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            endpoint: self.endpoint.clone(),
        }
    }
}
