//! JSON-RPC network client with request timeouts
//!
//! Speaks `sendTransaction`, `getSignatureStatuses` and `getHealth`.

use super::wire;
use super::NetworkClient;
use crate::error::{EngineError, EngineResult};
use crate::signer::TransactionSigner;
use crate::types::{ConfirmationStatus, Signature, SubmitOptions, Transaction};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

/// Transport settings for a JSON-RPC client
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RpcConfig {
    pub request_timeout_secs: u64,
    /// Commitment used for the endpoint's preflight, when preflight runs
    pub preflight_commitment: String,
    /// Upper bound on the client's own post-submission acceptance wait
    pub acceptance_timeout_secs: u64,
    pub acceptance_poll_ms: u64,
    pub search_transaction_history: bool,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            preflight_commitment: "finalized".to_string(),
            acceptance_timeout_secs: 30,
            acceptance_poll_ms: 500,
            search_transaction_history: false,
        }
    }
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureStatusEntry {
    #[serde(default)]
    confirmations: Option<u64>,
    #[serde(default)]
    confirmation_status: Option<String>,
    #[serde(default)]
    err: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct SignatureStatusesResult {
    value: Vec<Option<SignatureStatusEntry>>,
}

/// JSON-RPC client bound to one endpoint
pub struct JsonRpcClient {
    endpoint: String,
    http: reqwest::Client,
    config: RpcConfig,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    /// Create a new client for `endpoint`
    pub fn new(endpoint: &str, config: RpcConfig) -> EngineResult<Self> {
        if endpoint.trim().is_empty() {
            return Err(EngineError::InvalidEndpoint("endpoint is empty".to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| EngineError::Rpc {
                endpoint: endpoint.to_string(),
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        debug!("Created JSON-RPC client for {}", endpoint);

        Ok(Self {
            endpoint: endpoint.to_string(),
            http,
            config,
            next_id: AtomicU64::new(1),
        })
    }

    /// Issue a JSON-RPC call and return its `result`
    async fn call(&self, method: &str, params: Value) -> EngineResult<Value> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let send = self.http.post(&self.endpoint).json(&request).send();
        let response = timeout(Duration::from_secs(self.config.request_timeout_secs), send)
            .await
            .map_err(|_| self.rpc_error(format!("{} timed out", method)))?
            .map_err(|e| self.rpc_error(format!("{} transport error: {}", method, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.rpc_error(format!("{} body read failed: {}", method, e)))?;

        if !status.is_success() {
            return Err(self.rpc_error(format!("{} returned HTTP {}: {}", method, status, body)));
        }

        parse_response(&body).map_err(|message| self.rpc_error(format!("{}: {}", method, message)))
    }

    fn rpc_error(&self, message: String) -> EngineError {
        EngineError::Rpc {
            endpoint: self.endpoint.clone(),
            message,
        }
    }

    /// Wait until the endpoint reports any status for `signature`
    async fn await_acceptance(&self, signature: &Signature) -> EngineResult<()> {
        let deadline = Instant::now() + Duration::from_secs(self.config.acceptance_timeout_secs);
        let poll = Duration::from_millis(self.config.acceptance_poll_ms.max(1));

        loop {
            let statuses = self.get_status(std::slice::from_ref(signature)).await?;
            if statuses.first().copied().unwrap_or(ConfirmationStatus::Unknown)
                != ConfirmationStatus::Unknown
            {
                return Ok(());
            }
            if Instant::now() + poll > deadline {
                return Err(EngineError::Submission {
                    endpoint: self.endpoint.clone(),
                    message: format!(
                        "transaction {} not seen within {}s",
                        signature, self.config.acceptance_timeout_secs
                    ),
                });
            }
            sleep(poll).await;
        }
    }

    /// Check endpoint health
    pub async fn health_check(&self) -> bool {
        match self.call("getHealth", json!([])).await {
            Ok(Value::String(s)) if s == "ok" => true,
            Ok(other) => {
                warn!("Endpoint {} reported unhealthy: {}", self.endpoint, other);
                false
            }
            Err(e) => {
                warn!("Health check failed for {}: {}", self.endpoint, e);
                false
            }
        }
    }
}

#[async_trait]
impl NetworkClient for JsonRpcClient {
    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }

    async fn submit(
        &self,
        transaction: &Transaction,
        signers: &[Arc<dyn TransactionSigner>],
        opts: SubmitOptions,
    ) -> EngineResult<Vec<Signature>> {
        let wire_bytes = match transaction {
            Transaction::Unsigned { message } => wire::sign_and_assemble(message, signers)?,
            Transaction::Signed { wire } => {
                if !signers.is_empty() {
                    return Err(EngineError::Signer(
                        "signed transaction must not be given additional signers".to_string(),
                    ));
                }
                wire.clone()
            }
        };
        let expected = wire::signatures_of(&wire_bytes)?;

        let params = json!([
            BASE64.encode(&wire_bytes),
            {
                "encoding": "base64",
                "skipPreflight": opts.skip_preflight,
                "preflightCommitment": self.config.preflight_commitment,
            }
        ]);

        let result = self
            .call("sendTransaction", params)
            .await
            .map_err(|e| match e {
                EngineError::Rpc { endpoint, message } => {
                    EngineError::Submission { endpoint, message }
                }
                other => other,
            })?;

        let returned = result.as_str().ok_or_else(|| EngineError::Submission {
            endpoint: self.endpoint.clone(),
            message: format!("unexpected sendTransaction result: {}", result),
        })?;

        if expected.first().map(|s| s.as_str()) != Some(returned) {
            warn!(
                "Endpoint {} returned signature {} not matching first wire signature",
                self.endpoint, returned
            );
        }
        info!("Transaction sent to {}: {}", self.endpoint, returned);

        let signatures = vec![Signature::new(returned)];
        if !opts.skip_confirmation {
            self.await_acceptance(&signatures[0]).await?;
        }

        Ok(signatures)
    }

    async fn get_status(&self, signatures: &[Signature]) -> EngineResult<Vec<ConfirmationStatus>> {
        let sigs: Vec<&str> = signatures.iter().map(Signature::as_str).collect();
        let params = json!([
            sigs,
            { "searchTransactionHistory": self.config.search_transaction_history }
        ]);

        let result = self
            .call("getSignatureStatuses", params)
            .await
            .map_err(|e| match e {
                EngineError::Rpc { endpoint, message } => EngineError::Status { endpoint, message },
                other => other,
            })?;

        parse_statuses(result).map_err(|message| EngineError::Status {
            endpoint: self.endpoint.clone(),
            message,
        })
    }
}

/// Extract `result` from a JSON-RPC response body
fn parse_response(body: &str) -> Result<Value, String> {
    let response: RpcResponse =
        serde_json::from_str(body).map_err(|e| format!("invalid response: {}", e))?;

    if let Some(err) = response.error {
        return Err(format!("error {}: {}", err.code, err.message));
    }

    response
        .result
        .ok_or_else(|| "response carried neither result nor error".to_string())
}

/// Map a `getSignatureStatuses` result onto confirmation statuses
fn parse_statuses(result: Value) -> Result<Vec<ConfirmationStatus>, String> {
    let parsed: SignatureStatusesResult =
        serde_json::from_value(result).map_err(|e| format!("invalid status payload: {}", e))?;

    Ok(parsed
        .value
        .into_iter()
        .map(|entry| match entry {
            None => ConfirmationStatus::Unknown,
            Some(entry) => {
                if let Some(err) = entry.err.as_ref().filter(|e| !e.is_null()) {
                    warn!("Transaction landed with error: {}", err);
                }
                match entry.confirmation_status.as_deref() {
                    Some("finalized") => ConfirmationStatus::Finalized,
                    _ => ConfirmationStatus::Processing {
                        confirmations: entry.confirmations.unwrap_or(0),
                    },
                }
            }
        })
        .collect())
}
