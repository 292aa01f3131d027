use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use spfoundry_core::config::AgentConfig;
use spfoundry_core::{AgentId, RunResult, ThreadId};
use tracing::warn;

use crate::client::{AgentsClient, ClientError};

/// Exponential backoff for transient failures: `base_delay * 2^attempt`,
/// zero-based, no jitter and no cap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay: Duration::from_secs(1) }
    }
}

impl RetryPolicy {
    pub fn from_config(agent: &AgentConfig) -> Self {
        Self {
            max_attempts: agent.max_retries.max(1),
            base_delay: Duration::from_millis(agent.retry_base_delay_ms),
        }
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u32 << exponent;
        self.base_delay.saturating_mul(multiplier)
    }

    /// Runs `operation` until it succeeds, fails non-transiently, or the
    /// attempts are used up.
    pub async fn run<T, F, Fut>(&self, sleeper: &dyn Sleeper, mut operation: F) -> Result<T, ClientError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_transient() && attempt + 1 < max_attempts => {
                    let delay = self.backoff(attempt);
                    warn!(
                        event_name = "run.retry_scheduled",
                        attempt = attempt + 1,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "transient failure, retrying"
                    );
                    sleeper.sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, delay: Duration);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

pub async fn execute_run_with_retry<C>(
    client: &C,
    thread_id: &ThreadId,
    agent_id: &AgentId,
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
) -> Result<RunResult, ClientError>
where
    C: AgentsClient + ?Sized,
{
    policy.run(sleeper, |_| client.execute_run(thread_id, agent_id)).await
}
