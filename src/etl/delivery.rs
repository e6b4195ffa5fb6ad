//! Batch delivery with a bounded retry policy

use super::Loader;
use crate::error::DeliveryError;
use std::time::Duration;

/// How many times a batch is attempted and how long to wait in between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one (at least 1)
    pub max_attempts: u32,
    /// Fixed pause between two attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Retry without pausing
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }
}

/// Delivers whole batches through a [`Loader`], retrying failed attempts.
///
/// A batch is all-or-nothing: it is either accepted by one attempt or, once
/// the policy is exhausted, reported as failed. Failed events are never
/// requeued.
pub struct DeliveryClient<L> {
    loader: L,
    policy: RetryPolicy,
}

impl<L: Loader> DeliveryClient<L> {
    pub fn new(loader: L, policy: RetryPolicy) -> Self {
        Self { loader, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Deliver a batch, returning the number of events accepted
    ///
    /// An empty batch is accepted without contacting the destination.
    ///
    /// # Errors
    /// [`DeliveryError::Exhausted`] once every attempt has failed.
    pub async fn deliver(&self, batch: &[L::Item]) -> Result<usize, DeliveryError> {
        if batch.is_empty() {
            return Ok(0);
        }

        let attempts = self.policy.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.loader.load(batch).await {
                Ok(count) => {
                    log::debug!(
                        "Delivered batch of {} event(s) on attempt {}",
                        count,
                        attempt
                    );
                    return Ok(count);
                }
                Err(e) => {
                    log::warn!("Delivery attempt {}/{} failed: {}", attempt, attempts, e);
                    last_error = e.to_string();
                }
            }

            if attempt < attempts && !self.policy.delay.is_zero() {
                tokio::time::sleep(self.policy.delay).await;
            }
        }

        log::error!(
            "Abandoning batch of {} event(s) after {} attempt(s)",
            batch.len(),
            attempts
        );
        Err(DeliveryError::Exhausted {
            events: batch.len(),
            attempts,
            last_error,
        })
    }
}
