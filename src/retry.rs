//! Retry-until-settled command driver
//!
//! The device signals backpressure by answering a command with TryLater; the
//! sender must wait and resubmit rather than give up, since dropping the
//! command would silently lose a notification or leave a stale one on the
//! watch. Every resubmission carries a freshly drawn token. By default the
//! retry count is unbounded, matching the device contract that TryLater
//! clears once the device's write pipeline drains; callers who prefer to
//! fail fast can set an attempt cap on the policy.

use crate::blobdb::{BlobCommand, BlobResponse};
use crate::token::next_token;
use crate::transport::BlobTransport;
use crate::types::{BlobDbError, Result};
use log::{debug, warn};
use std::time::Duration;
use tokio::time::sleep;

/// Fixed wait between a TryLater response and the resend
const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// How many attempts between "still retrying" log lines
const PROGRESS_LOG_INTERVAL: u32 = 10;

/// Retry behavior for one logical insert or delete
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Wait between a TryLater response and the next attempt
    pub retry_delay: Duration,

    /// Maximum number of send attempts, or `None` to retry until the device
    /// settles the command
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    /// A policy that gives up after `attempts` sends
    pub fn capped(attempts: u32) -> Self {
        Self {
            max_attempts: Some(attempts),
            ..Default::default()
        }
    }
}

/// Send a command and resubmit on TryLater until it settles
///
/// Settles on the first non-TryLater status. Transport and decode failures
/// are terminal and surface immediately; they are never interpreted as
/// backpressure.
pub async fn send_settling(
    transport: &dyn BlobTransport,
    command: BlobCommand,
    policy: &RetryPolicy,
) -> Result<BlobResponse> {
    let mut command = command;
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;

        let raw = transport.send(&command.encode()?).await?;
        let response = BlobResponse::decode(&raw)?;

        if !response.status.is_try_later() {
            debug!(
                "{} command settled with {} after {} attempt(s)",
                command.database(),
                response.status,
                attempts
            );
            return Ok(response);
        }

        if let Some(cap) = policy.max_attempts {
            if attempts >= cap {
                warn!(
                    "{} command still busy after {} attempts, giving up",
                    command.database(),
                    attempts
                );
                return Err(BlobDbError::RetriesExhausted(attempts));
            }
        }

        if attempts % PROGRESS_LOG_INTERVAL == 0 {
            warn!(
                "Device still busy after {} attempts, continuing to retry",
                attempts
            );
        }

        sleep(policy.retry_delay).await;
        command = command.rebind(next_token());
    }
}
