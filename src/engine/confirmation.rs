//! Confirmation polling
//!
//! One status query per poll interval until the confirmation predicate holds
//! or the attempt deadline passes. Only the first signature is inspected.

use super::ExecutionEngine;
use crate::client::NetworkClient;
use crate::error::{EngineError, EngineResult};
use crate::types::{ConfirmationOutcome, ConfirmationStatus, Signature};

use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// State of a single confirmation poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Waiting,
    Succeeded,
    TimedOut,
}

impl PollState {
    /// Transition after observing `status` with `elapsed` time spent.
    ///
    /// Success is checked before the deadline, so a status that satisfies the
    /// target on the final tick still counts.
    pub fn advance(
        status: ConfirmationStatus,
        elapsed: Duration,
        max_timeout: Duration,
        target_confirmations: u64,
        require_finalized: bool,
    ) -> Self {
        if status.satisfies(target_confirmations, require_finalized) {
            PollState::Succeeded
        } else if elapsed >= max_timeout {
            PollState::TimedOut
        } else {
            PollState::Waiting
        }
    }
}

impl<C: NetworkClient + ?Sized> ExecutionEngine<C> {
    /// Poll until `signatures[0]` reaches the requested confirmation level.
    ///
    /// Returns `TimedOut` rather than an error once `max_timeout` of wall-clock
    /// time has passed, including time spent inside status queries. A failed
    /// status query is returned as an error.
    pub async fn await_confirmation(
        &self,
        signatures: &[Signature],
        max_timeout: Duration,
        target_confirmations: u64,
        require_finalized: bool,
        poll_interval: Duration,
        cancel: &CancellationToken,
    ) -> EngineResult<ConfirmationOutcome> {
        self.poll_until(
            signatures,
            Instant::now() + max_timeout,
            target_confirmations,
            require_finalized,
            poll_interval,
            cancel,
        )
        .await
    }

    /// Poll on a fixed cadence until `deadline`.
    ///
    /// Each status query races the deadline and `cancel`, so a stalled
    /// endpoint cannot hold the poll past the deadline.
    pub(super) async fn poll_until(
        &self,
        signatures: &[Signature],
        deadline: Instant,
        target_confirmations: u64,
        require_finalized: bool,
        poll_interval: Duration,
        cancel: &CancellationToken,
    ) -> EngineResult<ConfirmationOutcome> {
        let first = signatures.first().ok_or_else(|| EngineError::Status {
            endpoint: self.endpoint.clone(),
            message: "no signature to poll".to_string(),
        })?;

        let started = Instant::now();
        let budget = deadline.saturating_duration_since(started);
        let mut ticks: u32 = 0;

        loop {
            let next_tick = (Instant::now() + poll_interval).min(deadline);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(EngineError::Cancelled),
                _ = sleep_until(next_tick) => {}
            }
            ticks += 1;

            // A query still in flight at the deadline counts as no status
            let statuses = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(EngineError::Cancelled),
                queried = self.client.get_status(signatures) => Some(queried?),
                _ = sleep_until(deadline) => None,
            };
            let status = statuses
                .as_deref()
                .and_then(|s| s.first().copied())
                .unwrap_or(ConfirmationStatus::Unknown);
            let elapsed = started.elapsed();

            match PollState::advance(
                status,
                elapsed,
                budget,
                target_confirmations,
                require_finalized,
            ) {
                PollState::Succeeded => {
                    info!(
                        "Took {:.1}s to confirm transaction {} ({} ticks)",
                        elapsed.as_secs_f64(),
                        first,
                        ticks
                    );
                    return Ok(ConfirmationOutcome::Confirmed { ticks, elapsed });
                }
                PollState::TimedOut => {
                    debug!(
                        "Confirmation of {} timed out after {:.1}s, last status {:?}",
                        first,
                        elapsed.as_secs_f64(),
                        status
                    );
                    return Ok(ConfirmationOutcome::TimedOut { ticks, elapsed });
                }
                PollState::Waiting => {
                    debug!(signature = %first, tick = ticks, ?status, "Awaiting confirmation");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockNetworkClient;
    use crate::engine::test_support::SlowClient;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::sleep;
    use tokio_test::{assert_err, assert_ok};

    const SECOND: Duration = Duration::from_secs(1);

    fn engine_with_statuses(
        statuses: Vec<ConfirmationStatus>,
    ) -> ExecutionEngine<MockNetworkClient> {
        let mut client = MockNetworkClient::new();
        client
            .expect_endpoint()
            .return_const("http://mock:8899".to_string());

        let calls = AtomicUsize::new(0);
        client
            .expect_get_status()
            .times(statuses.len())
            .returning(move |_| {
                let i = calls.fetch_add(1, Ordering::SeqCst);
                Ok(vec![statuses[i]])
            });

        ExecutionEngine::new(Arc::new(client))
    }

    fn sig() -> Vec<Signature> {
        vec![Signature::new("5VERv8NMvzbJMEkV8xnrLkEaWRtSz9CosKDYjCJjBRnb")]
    }

    /// Poll `sig()` once per second
    async fn poll<C: NetworkClient + ?Sized>(
        engine: &ExecutionEngine<C>,
        max_timeout: Duration,
        target: u64,
        require_finalized: bool,
        cancel: &CancellationToken,
    ) -> EngineResult<ConfirmationOutcome> {
        engine
            .await_confirmation(&sig(), max_timeout, target, require_finalized, SECOND, cancel)
            .await
    }

    #[test]
    fn test_poll_state_transitions() {
        let timeout = Duration::from_secs(60);
        let processing = ConfirmationStatus::Processing { confirmations: 20 };

        assert_eq!(
            PollState::advance(processing, SECOND, timeout, 20, false),
            PollState::Succeeded
        );
        assert_eq!(
            PollState::advance(processing, SECOND, timeout, 20, true),
            PollState::Waiting
        );
        assert_eq!(
            PollState::advance(ConfirmationStatus::Unknown, timeout, timeout, 0, false),
            PollState::TimedOut
        );
        assert_eq!(
            PollState::advance(ConfirmationStatus::Finalized, timeout, timeout, 20, true),
            PollState::Succeeded
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_first_tick_reaching_target() {
        let engine = engine_with_statuses(vec![
            ConfirmationStatus::Unknown,
            ConfirmationStatus::Processing { confirmations: 5 },
            ConfirmationStatus::Processing { confirmations: 20 },
        ]);

        let cancel = CancellationToken::new();
        let outcome = assert_ok!(poll(&engine, 60 * SECOND, 20, false, &cancel).await);
        assert_eq!(
            outcome,
            ConfirmationOutcome::Confirmed {
                ticks: 3,
                elapsed: 3 * SECOND
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_require_finalized_ignores_confirmation_count() {
        let engine = engine_with_statuses(vec![
            ConfirmationStatus::Processing { confirmations: 100 },
            ConfirmationStatus::Processing { confirmations: 500 },
            ConfirmationStatus::Finalized,
        ]);

        let cancel = CancellationToken::new();
        let outcome = assert_ok!(poll(&engine, 60 * SECOND, 20, true, &cancel).await);
        assert!(matches!(outcome, ConfirmationOutcome::Confirmed { ticks: 3, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_finalized_satisfies_unreached_target() {
        let engine = engine_with_statuses(vec![ConfirmationStatus::Finalized]);

        let cancel = CancellationToken::new();
        let outcome = assert_ok!(poll(&engine, 60 * SECOND, 1_000, false, &cancel).await);
        assert!(matches!(outcome, ConfirmationOutcome::Confirmed { ticks: 1, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_when_status_never_observed() {
        let engine = engine_with_statuses(vec![ConfirmationStatus::Unknown; 5]);

        let cancel = CancellationToken::new();
        let outcome = assert_ok!(poll(&engine, 5 * SECOND, 20, false, &cancel).await);
        assert_eq!(
            outcome,
            ConfirmationOutcome::TimedOut {
                ticks: 5,
                elapsed: 5 * SECOND
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_first_signature_is_inspected() {
        let mut client = MockNetworkClient::new();
        client
            .expect_endpoint()
            .return_const("http://mock:8899".to_string());
        client
            .expect_get_status()
            .withf(|signatures| signatures.len() == 2)
            .times(3)
            .returning(|_| {
                Ok(vec![
                    ConfirmationStatus::Unknown,
                    ConfirmationStatus::Finalized,
                ])
            });
        let engine = ExecutionEngine::new(Arc::new(client));

        let signatures = vec![Signature::new("first"), Signature::new("second")];
        let outcome = assert_ok!(
            engine
                .await_confirmation(
                    &signatures,
                    3 * SECOND,
                    0,
                    true,
                    SECOND,
                    &CancellationToken::new(),
                )
                .await
        );
        assert!(matches!(outcome, ConfirmationOutcome::TimedOut { ticks: 3, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_status_queries_count_against_timeout() {
        let client = Arc::new(SlowClient::new(Duration::ZERO, 5 * SECOND));
        let engine = ExecutionEngine::new(client.clone());

        let started = tokio::time::Instant::now();
        let cancel = CancellationToken::new();
        let outcome = assert_ok!(poll(&engine, 10 * SECOND, 20, false, &cancel).await);

        // Queries at 1s (answered at 6s) and 7s (cut off at the 10s deadline)
        assert_eq!(
            outcome,
            ConfirmationOutcome::TimedOut {
                ticks: 2,
                elapsed: 10 * SECOND
            }
        );
        assert_eq!(started.elapsed(), 10 * SECOND);
        assert_eq!(client.status_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_status_query_ends_at_deadline() {
        let client = Arc::new(SlowClient::new(Duration::ZERO, 3_600 * SECOND));
        let engine = ExecutionEngine::new(client);

        let started = tokio::time::Instant::now();
        let cancel = CancellationToken::new();
        let outcome = assert_ok!(poll(&engine, 10 * SECOND, 20, false, &cancel).await);

        assert!(matches!(outcome, ConfirmationOutcome::TimedOut { ticks: 1, .. }));
        assert_eq!(started.elapsed(), 10 * SECOND);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_error_is_returned() {
        let mut client = MockNetworkClient::new();
        client
            .expect_endpoint()
            .return_const("http://mock:8899".to_string());
        client.expect_get_status().times(1).returning(|_| {
            Err(EngineError::Status {
                endpoint: "http://mock:8899".to_string(),
                message: "connection reset".to_string(),
            })
        });
        let engine = ExecutionEngine::new(Arc::new(client));

        let cancel = CancellationToken::new();
        let err = assert_err!(poll(&engine, 60 * SECOND, 20, false, &cancel).await);
        assert!(matches!(err, EngineError::Status { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_polling() {
        let mut client = MockNetworkClient::new();
        client
            .expect_endpoint()
            .return_const("http://mock:8899".to_string());
        client
            .expect_get_status()
            .returning(|_| Ok(vec![ConfirmationStatus::Unknown]));
        let engine = ExecutionEngine::new(Arc::new(client));

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(3_500)).await;
            trigger.cancel();
        });

        let err = assert_err!(poll(&engine, 60 * SECOND, 20, false, &cancel).await);
        assert!(matches!(err, EngineError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_status_query() {
        let engine = ExecutionEngine::new(Arc::new(SlowClient::new(
            Duration::ZERO,
            30 * SECOND,
        )));

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(2_500)).await;
            trigger.cancel();
        });

        let started = tokio::time::Instant::now();
        let err = assert_err!(poll(&engine, 60 * SECOND, 20, false, &cancel).await);
        assert!(matches!(err, EngineError::Cancelled));
        assert_eq!(started.elapsed(), Duration::from_millis(2_500));
    }

    #[tokio::test]
    async fn test_empty_signatures_rejected() {
        let engine = engine_with_statuses(vec![]);

        let err = assert_err!(
            engine
                .await_confirmation(&[], 60 * SECOND, 20, false, SECOND, &CancellationToken::new())
                .await
        );
        assert!(matches!(err, EngineError::Status { .. }));
    }
}
