//! Per-endpoint client pool
//!
//! Clients are built once per endpoint and reused across `execute` calls.

use super::rpc::{JsonRpcClient, RpcConfig};
use crate::engine::ExecutionEngine;
use crate::error::{EngineError, EngineResult};
use crate::signer::TransactionSigner;
use crate::types::{ExecutionConfig, Transaction, TransactionResult};

use dashmap::DashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Reusable JSON-RPC clients indexed by endpoint
pub struct ClientPool {
    clients: DashMap<String, Arc<JsonRpcClient>>,
    rpc_config: RpcConfig,
}

impl ClientPool {
    /// Create an empty pool; clients share `rpc_config`
    pub fn new(rpc_config: RpcConfig) -> Self {
        Self {
            clients: DashMap::new(),
            rpc_config,
        }
    }

    /// Get the client for `endpoint`, creating it on first use
    pub fn get_or_connect(&self, endpoint: &str) -> EngineResult<Arc<JsonRpcClient>> {
        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            return Err(EngineError::InvalidEndpoint("endpoint is empty".to_string()));
        }

        if let Some(client) = self.clients.get(endpoint) {
            return Ok(Arc::clone(client.value()));
        }

        let client = Arc::new(JsonRpcClient::new(endpoint, self.rpc_config.clone())?);
        let entry = self.clients.entry(endpoint.to_string()).or_insert(client);
        let client = Arc::clone(entry.value());
        drop(entry);
        info!("Connected client for {}", endpoint);
        Ok(client)
    }

    /// Engine bound to the pooled client for `endpoint`
    pub fn engine(&self, endpoint: &str) -> EngineResult<ExecutionEngine<JsonRpcClient>> {
        Ok(ExecutionEngine::new(self.get_or_connect(endpoint)?))
    }

    /// Submit and confirm `transaction` against `endpoint`
    pub async fn execute(
        &self,
        endpoint: &str,
        transaction: &Transaction,
        signers: &[Arc<dyn TransactionSigner>],
        config: &ExecutionConfig,
    ) -> EngineResult<TransactionResult> {
        self.engine(endpoint)?
            .execute(transaction, signers, config)
            .await
    }

    /// Cancellable variant of [`execute`](Self::execute)
    pub async fn execute_with_cancel(
        &self,
        endpoint: &str,
        transaction: &Transaction,
        signers: &[Arc<dyn TransactionSigner>],
        config: &ExecutionConfig,
        cancel: &CancellationToken,
    ) -> EngineResult<TransactionResult> {
        self.engine(endpoint)?
            .execute_with_cancel(transaction, signers, config, cancel)
            .await
    }

    /// Health check for all pooled endpoints
    pub async fn health_check(&self) -> Vec<(String, bool)> {
        let clients: Vec<(String, Arc<JsonRpcClient>)> = self
            .clients
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let checks = clients.into_iter().map(|(endpoint, client)| async move {
            let healthy = client.health_check().await;
            debug!("Endpoint {} healthy: {}", endpoint, healthy);
            (endpoint, healthy)
        });

        futures::future::join_all(checks).await
    }

    /// Endpoints with a cached client
    pub fn endpoints(&self) -> Vec<String> {
        self.clients.iter().map(|e| e.key().clone()).collect()
    }

    /// Drop the cached client for `endpoint`
    pub fn evict(&self, endpoint: &str) -> bool {
        self.clients.remove(endpoint.trim()).is_some()
    }
}

impl Default for ClientPool {
    fn default() -> Self {
        Self::new(RpcConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reuses_client_per_endpoint() {
        let pool = ClientPool::default();

        let a = pool.get_or_connect("http://127.0.0.1:8899").unwrap();
        let b = pool.get_or_connect(" http://127.0.0.1:8899 ").unwrap();
        let c = pool.get_or_connect("http://127.0.0.1:8900").unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(pool.endpoints().len(), 2);
    }

    #[test]
    fn test_rejects_empty_endpoint() {
        let pool = ClientPool::default();
        assert!(matches!(
            pool.get_or_connect(""),
            Err(EngineError::InvalidEndpoint(_))
        ));
        assert!(pool.endpoints().is_empty());
    }

    #[test]
    fn test_evict_forces_new_client() {
        let pool = ClientPool::default();
        let a = pool.get_or_connect("http://127.0.0.1:8899").unwrap();
        assert!(pool.evict("http://127.0.0.1:8899"));
        assert!(!pool.evict("http://127.0.0.1:8899"));

        let b = pool.get_or_connect("http://127.0.0.1:8899").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_execute_rejects_empty_endpoint() {
        let pool = ClientPool::default();
        let tx = Transaction::Signed { wire: vec![0] };
        let err = pool
            .execute("", &tx, &[], &ExecutionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidEndpoint(_)));
    }
}
