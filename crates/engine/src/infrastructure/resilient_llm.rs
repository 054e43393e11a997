//! Retrying decorator for the narrative LLM.
//!
//! A narrative that fails still leaves the run intact, so retries here only
//! buy commentary. The policy stays short: a few attempts with capped,
//! jittered exponential backoff, and no retry at all for requests the
//! endpoint has already refused.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::infrastructure::ports::{LlmError, LlmPort, LlmRequest, LlmResponse};

/// Backoff schedule for a narrative request.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Fraction of the backoff added or removed at random, in `0.0..=1.0`.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, never waits.
    pub fn none() -> Self {
        Self {
            retries: 0,
            ..Self::default()
        }
    }

    /// Wait before retry number `retry` (1-based), before jitter.
    pub fn backoff(&self, retry: u32) -> Duration {
        let doublings = retry.saturating_sub(1).min(31);
        self.initial_backoff
            .saturating_mul(1u32 << doublings)
            .min(self.max_backoff)
    }

    fn jittered(&self, retry: u32) -> Duration {
        let base = self.backoff(retry);
        let spread = self.jitter.clamp(0.0, 1.0);
        if spread == 0.0 || base.is_zero() {
            return base;
        }
        let factor = rand::thread_rng().gen_range(1.0 - spread..=1.0 + spread);
        base.mul_f64(factor)
    }
}

/// Whether another attempt can change the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    Transient,
    Permanent,
}

fn classify(error: &LlmError) -> Failure {
    match error {
        LlmError::RequestFailed(message) => match status_prefix(message) {
            Some(408 | 429) | None => Failure::Transient,
            Some(status) if (400..500).contains(&status) => Failure::Permanent,
            Some(_) => Failure::Transient,
        },
        // Truncated or garbled bodies usually come from the connection.
        LlmError::InvalidResponse(_) => Failure::Transient,
    }
}

/// HTTP status leading a failure message, e.g. `401 Unauthorized`.
fn status_prefix(message: &str) -> Option<u16> {
    let first = message.split_whitespace().next()?;
    (first.len() == 3)
        .then(|| first.parse().ok())
        .flatten()
}

/// [`LlmPort`] decorator that retries transient failures.
pub struct ResilientLlmClient {
    inner: Arc<dyn LlmPort>,
    policy: RetryPolicy,
}

impl ResilientLlmClient {
    pub fn new(inner: Arc<dyn LlmPort>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl LlmPort for ResilientLlmClient {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let mut retry = 0;
        loop {
            let error = match self.inner.generate(request.clone()).await {
                Ok(response) => {
                    if retry > 0 {
                        tracing::info!(retries = retry, "Narrative request recovered");
                    }
                    return Ok(response);
                }
                Err(error) => error,
            };

            if classify(&error) == Failure::Permanent {
                tracing::error!(error = %error, "Narrative request refused, not retrying");
                return Err(error);
            }
            if retry >= self.policy.retries {
                tracing::error!(
                    attempts = retry + 1,
                    error = %error,
                    "Narrative request failed on every attempt"
                );
                return Err(error);
            }

            retry += 1;
            let wait = self.policy.jittered(retry);
            tracing::warn!(
                retry,
                of = self.policy.retries,
                wait_ms = wait.as_millis() as u64,
                error = %error,
                "Narrative request failed, backing off"
            );
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ports::{FinishReason, MockLlmPort};
    use mockall::Sequence;

    fn ok(content: &str) -> Result<LlmResponse, LlmError> {
        Ok(LlmResponse {
            content: content.to_string(),
            finish_reason: FinishReason::Stop,
            usage: None,
        })
    }

    fn fail(message: &str) -> Result<LlmResponse, LlmError> {
        Err(LlmError::RequestFailed(message.to_string()))
    }

    fn quick(retries: u32) -> RetryPolicy {
        RetryPolicy {
            retries,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(10),
            jitter: 0.0,
        }
    }

    #[tokio::test]
    async fn when_first_attempt_succeeds_then_no_retry() {
        let mut llm = MockLlmPort::new();
        llm.expect_generate().times(1).returning(|_| ok("Payrolls beat."));

        let client = ResilientLlmClient::new(Arc::new(llm), quick(3));
        let response = client
            .generate(LlmRequest::new(vec![]))
            .await
            .expect("first attempt");

        assert_eq!(response.content, "Payrolls beat.");
    }

    #[tokio::test]
    async fn when_endpoint_recovers_then_response_is_returned() {
        let mut seq = Sequence::new();
        let mut llm = MockLlmPort::new();
        llm.expect_generate()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| fail("503 Service Unavailable"));
        llm.expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| ok("Recovered."));

        let client = ResilientLlmClient::new(Arc::new(llm), quick(3));
        let response = client
            .generate(LlmRequest::new(vec![]))
            .await
            .expect("third attempt");

        assert_eq!(response.content, "Recovered.");
    }

    #[tokio::test]
    async fn when_every_attempt_fails_then_last_error_is_returned() {
        let mut llm = MockLlmPort::new();
        llm.expect_generate()
            .times(3)
            .returning(|_| fail("connection reset by peer"));

        let client = ResilientLlmClient::new(Arc::new(llm), quick(2));
        let err = client
            .generate(LlmRequest::new(vec![]))
            .await
            .expect_err("exhausted");

        assert!(matches!(err, LlmError::RequestFailed(_)));
    }

    #[tokio::test]
    async fn when_request_is_refused_then_single_attempt() {
        let mut llm = MockLlmPort::new();
        llm.expect_generate()
            .times(1)
            .returning(|_| fail("401 Unauthorized"));

        let client = ResilientLlmClient::new(Arc::new(llm), quick(3));
        assert!(client.generate(LlmRequest::new(vec![])).await.is_err());
    }

    #[tokio::test]
    async fn when_policy_is_none_then_transient_errors_are_not_retried() {
        let mut llm = MockLlmPort::new();
        llm.expect_generate()
            .times(1)
            .returning(|_| fail("503 Service Unavailable"));

        let client = ResilientLlmClient::new(Arc::new(llm), RetryPolicy::none());
        assert!(client.generate(LlmRequest::new(vec![])).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn when_rate_limited_then_default_backoff_is_waited() {
        let mut seq = Sequence::new();
        let mut llm = MockLlmPort::new();
        llm.expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| fail("429 Too Many Requests"));
        llm.expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| ok("Calm returns."));

        let client = ResilientLlmClient::new(Arc::new(llm), RetryPolicy::default());
        let started = tokio::time::Instant::now();
        client
            .generate(LlmRequest::new(vec![]))
            .await
            .expect("retried");

        // One second, give or take the 20% jitter.
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(800), "{waited:?}");
        assert!(waited <= Duration::from_millis(1200), "{waited:?}");
    }

    #[test]
    fn failures_are_classified_by_status() {
        let failure = |message: &str| classify(&LlmError::RequestFailed(message.to_string()));

        assert_eq!(failure("400 model not found"), Failure::Permanent);
        assert_eq!(failure("403 Forbidden"), Failure::Permanent);
        assert_eq!(failure("408 Request Timeout"), Failure::Transient);
        assert_eq!(failure("503 Service Unavailable"), Failure::Transient);
        assert_eq!(failure("error sending request"), Failure::Transient);
        assert_eq!(
            classify(&LlmError::InvalidResponse("truncated body".to_string())),
            Failure::Transient
        );
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let policy = RetryPolicy {
            jitter: 0.0,
            ..RetryPolicy::default()
        };
        let waits: Vec<u64> = (1..=7)
            .map(|retry| policy.backoff(retry).as_secs())
            .collect();

        assert_eq!(waits, [1, 2, 4, 8, 16, 30, 30]);
        assert_eq!(policy.backoff(u32::MAX), Duration::from_secs(30));
        assert_eq!(policy.jittered(3), Duration::from_secs(4));
    }
}
