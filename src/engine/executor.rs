//! Whole-attempt retry loop

use super::ExecutionEngine;
use crate::client::NetworkClient;
use crate::error::{EngineError, EngineResult};
use crate::metrics;
use crate::signer::TransactionSigner;
use crate::types::{
    ConfirmationOutcome, ExecutionConfig, ExecutionStatus, SubmitOptions, Transaction,
    TransactionResult,
};

use chrono::Utc;
use std::sync::Arc;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

impl<C: NetworkClient + ?Sized> ExecutionEngine<C> {
    /// Submit `transaction` and, unless disabled, wait for confirmation
    pub async fn execute(
        &self,
        transaction: &Transaction,
        signers: &[Arc<dyn TransactionSigner>],
        config: &ExecutionConfig,
    ) -> EngineResult<TransactionResult> {
        self.execute_with_cancel(transaction, signers, config, &CancellationToken::new())
            .await
    }

    /// Same as [`execute`](Self::execute), aborting early when `cancel` fires
    pub async fn execute_with_cancel(
        &self,
        transaction: &Transaction,
        signers: &[Arc<dyn TransactionSigner>],
        config: &ExecutionConfig,
        cancel: &CancellationToken,
    ) -> EngineResult<TransactionResult> {
        config.validate()?;

        let execution_id = Uuid::new_v4();
        let max_attempts = config.max_retries;
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            metrics::record_attempt(&self.endpoint);

            match self
                .run_attempt(execution_id, transaction, signers, config, cancel)
                .await
            {
                Ok(mut result) => {
                    result.attempts = attempt;
                    info!(
                        %execution_id,
                        status = ?result.status,
                        "Execution finished on {} (attempt {}/{})",
                        self.endpoint, attempt, max_attempts
                    );
                    return Ok(result);
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    warn!(
                        %execution_id,
                        "Failed attempt {}/{} on {}: {}",
                        attempt, max_attempts, self.endpoint, e
                    );
                    metrics::record_attempt_failure(&self.endpoint, e.kind());
                    last_error = Some(e);
                }
            }

            if attempt < max_attempts && config.retry_delay_ms > 0 {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(EngineError::Cancelled),
                    _ = sleep(config.retry_delay()) => {}
                }
            }
        }

        metrics::record_execution_failed(&self.endpoint);
        let last_error = last_error.unwrap_or_else(|| EngineError::Submission {
            endpoint: self.endpoint.clone(),
            message: "no attempt was made".to_string(),
        });
        error!(
            %execution_id,
            "Execution on {} failed after {} attempts: {}",
            self.endpoint, max_attempts, last_error
        );

        Err(EngineError::ExecutionFailed {
            attempts: max_attempts,
            last_error: Box::new(last_error),
        })
    }

    /// One submission plus, unless skipped, one confirmation poll.
    ///
    /// Submission and polling share a single `max_timeout` deadline.
    async fn run_attempt(
        &self,
        execution_id: Uuid,
        transaction: &Transaction,
        signers: &[Arc<dyn TransactionSigner>],
        config: &ExecutionConfig,
        cancel: &CancellationToken,
    ) -> EngineResult<TransactionResult> {
        let started = Instant::now();
        let deadline = started + config.max_timeout();
        let opts = SubmitOptions {
            skip_preflight: true,
            skip_confirmation: config.skip_client_confirmation,
        };

        let signatures = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            submitted = self.client.submit(transaction, signers, opts) => submitted?,
            _ = sleep_until(deadline) => {
                return Err(EngineError::Submission {
                    endpoint: self.endpoint.clone(),
                    message: format!("not accepted within {}s", config.max_timeout_secs),
                });
            }
        };
        if signatures.is_empty() {
            return Err(EngineError::Submission {
                endpoint: self.endpoint.clone(),
                message: "endpoint returned no signature".to_string(),
            });
        }

        let submitted_at = Utc::now();
        metrics::record_tx_submitted(&self.endpoint);

        let mut result = TransactionResult {
            execution_id,
            endpoint: self.endpoint.clone(),
            signatures,
            status: ExecutionStatus::Submitted,
            attempts: 0,
            poll_ticks: 0,
            submitted_at,
            confirmed_at: None,
        };

        if config.skip_confirmation {
            return Ok(result);
        }

        info!(%execution_id, "Awaiting confirmation of {}", result.signatures[0]);

        match self
            .poll_until(
                &result.signatures,
                deadline,
                config.target_confirmations,
                config.require_finalized,
                config.poll_interval(),
                cancel,
            )
            .await?
        {
            ConfirmationOutcome::Confirmed { ticks, .. } => {
                metrics::record_tx_confirmed(&self.endpoint, started.elapsed().as_secs_f64());
                result.status = ExecutionStatus::Confirmed;
                result.poll_ticks = ticks;
                result.confirmed_at = Some(Utc::now());
                Ok(result)
            }
            ConfirmationOutcome::TimedOut { .. } => Err(EngineError::ConfirmationTimeout {
                signature: result.signatures[0].to_string(),
                elapsed_secs: started.elapsed().as_secs(),
            }),
        }
    }
}
