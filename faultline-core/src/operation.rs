//! Long-running cloud operations.
//!
//! Rule creation and deletion, as well as VM power operations, are accepted by
//! the cloud API immediately and complete later. Callers block on completion
//! with [`poll_until_done`], polling at a fixed interval up to a deadline.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, Instant};
use tracing::trace;

use faultline_config::NetworkConfig;

use crate::error::{AttackError, RemoteError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus<T> {
    Pending,
    Done(T),
}

#[async_trait]
pub trait LongRunningOperation<T>: Send {
    /// Queries the current state of the operation once.
    async fn poll(&mut self) -> Result<PollStatus<T>, RemoteError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self::from(&NetworkConfig::default())
    }
}

impl From<&NetworkConfig> for PollOptions {
    fn from(config: &NetworkConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.poll_interval_secs),
            timeout: Duration::from_secs(config.operation_timeout_secs),
        }
    }
}

/// Polls `operation` until it completes, fails or `options.timeout` elapses.
///
/// `context` names the operation in error messages, e.g.
/// `"creating security rule SteadybitBlockRule-0"`.
pub async fn poll_until_done<T>(
    operation: &mut dyn LongRunningOperation<T>,
    options: PollOptions,
    context: &str,
) -> Result<T, AttackError>
where
    T: Send,
{
    let started = Instant::now();
    loop {
        match operation.poll().await {
            Ok(PollStatus::Done(value)) => return Ok(value),
            Ok(PollStatus::Pending) => {}
            Err(source) => return Err(AttackError::remote(format!("failed {}", context), source)),
        }

        let waited = started.elapsed();
        if waited + options.interval > options.timeout {
            return Err(AttackError::Timeout {
                context: context.to_string(),
                waited: options.timeout,
            });
        }
        trace!(?waited, "{} still pending", context);
        sleep(options.interval).await;
    }
}
