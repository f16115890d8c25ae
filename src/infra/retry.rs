//! Timeout and bounded retry around the ingredient endpoints.
//!
//! Failures never escape this layer. Once a call is given up on, callers get
//! an empty payload marked [`FetchStatus::Degraded`] with the failure kind.

use std::{future::Future, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::api::{BatchLines, FailureKind, FetchError, IngredientApi};
use crate::domain::{RecipeId, RecipeIngredientLine};
use crate::util::config::FetchConfig;

/// Exponential backoff: `min(base * 2^attempt, max)` with a zero-based attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts made after the first one.
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 500,
            max_delay_ms: 2_000,
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(
            self.base_delay_ms
                .saturating_mul(factor)
                .min(self.max_delay_ms),
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchStatus {
    /// The payload came back from the endpoint (possibly empty).
    Fresh,
    /// The fetch failed and the payload is an empty stand-in.
    Degraded(FailureKind),
}

#[derive(Clone, Debug, PartialEq)]
pub struct FetchOutcome<T> {
    pub data: T,
    pub status: FetchStatus,
}

impl<T> FetchOutcome<T> {
    pub fn fresh(data: T) -> Self {
        Self {
            data,
            status: FetchStatus::Fresh,
        }
    }

    pub fn degraded(kind: FailureKind) -> Self
    where
        T: Default,
    {
        Self {
            data: T::default(),
            status: FetchStatus::Degraded(kind),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.status, FetchStatus::Degraded(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FetchOutcome<U> {
        FetchOutcome {
            data: f(self.data),
            status: self.status,
        }
    }
}

#[derive(Clone)]
pub struct RetryingFetcher {
    api: Arc<dyn IngredientApi>,
    policy: RetryPolicy,
    single_timeout: Duration,
    batch_timeout: Duration,
}

impl RetryingFetcher {
    pub fn new(api: Arc<dyn IngredientApi>, config: &FetchConfig) -> Self {
        Self {
            api,
            policy: config.retry.clone(),
            single_timeout: config.single_timeout(),
            batch_timeout: config.batch_timeout(),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn fetch_single(&self, recipe_id: &str) -> FetchOutcome<Vec<RecipeIngredientLine>> {
        let api = &self.api;
        self.with_retry("single", self.single_timeout, move || {
            api.recipe_ingredients(recipe_id)
        })
        .await
    }

    pub async fn fetch_batch(&self, recipe_ids: &[RecipeId]) -> FetchOutcome<BatchLines> {
        let api = &self.api;
        self.with_retry("batch", self.batch_timeout, move || {
            api.batch_recipe_ingredients(recipe_ids)
        })
        .await
    }

    async fn with_retry<T, F, Fut>(
        &self,
        label: &'static str,
        timeout: Duration,
        mut operation: F,
    ) -> FetchOutcome<T>
    where
        T: Default,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut attempt = 0u32;
        loop {
            // Dropping the timed-out future aborts the request in flight.
            let error = match tokio::time::timeout(timeout, operation()).await {
                Ok(Ok(data)) => {
                    debug!(label, attempt, "ingredient fetch succeeded");
                    return FetchOutcome::fresh(data);
                }
                Ok(Err(error)) => error,
                Err(_) => FetchError::Timeout,
            };

            if !error.is_retryable() {
                warn!(label, error = %error, "ingredient fetch failed, not retrying");
                return FetchOutcome::degraded(error.kind());
            }

            if attempt >= self.policy.max_retries {
                warn!(
                    label,
                    attempts = attempt + 1,
                    error = %error,
                    "ingredient fetch retries exhausted, returning empty result"
                );
                return FetchOutcome::degraded(error.kind());
            }

            let delay = self.policy.delay_for(attempt);
            warn!(
                label,
                attempt,
                max_retries = self.policy.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "transient ingredient fetch error, retrying after backoff"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
