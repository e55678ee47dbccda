// SPDX-License-Identifier: MPL-2.0

//! Cursor pagination over the remote listing endpoints.
//!
//! A [`PageSource`] fetches one page for a cursor. [`Paginator`] turns a source
//! into a pull-based stream of items that honours a result limit and paces
//! requests. [`Retrying`] wraps a source with bounded exponential backoff and a
//! per-attempt timeout.

use crate::atproto::Page;
use crate::config::{
    FOLLOWERS_ATTEMPT_TIMEOUT, FOLLOWERS_BASE_DELAY, FOLLOWERS_MAX_ATTEMPTS, MAX_PAGE_SIZE,
    PACING_DELAY,
};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Cancellable sleep tied to one invocation's cancellation token.
#[derive(Debug, Clone, Default)]
pub struct Waiter {
    cancel: CancellationToken,
}

impl Waiter {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Sleep for `delay`, or fail as soon as the token is cancelled. A zero
    /// delay only checks the token. `operation` and `input` name what was
    /// interrupted.
    pub async fn wait(&self, delay: Duration, operation: &'static str, input: &str) -> Result<()> {
        let cancelled = || Error::Cancelled {
            operation,
            input: input.to_string(),
        };
        if self.cancel.is_cancelled() {
            return Err(cancelled());
        }
        if delay.is_zero() {
            return Ok(());
        }
        tokio::select! {
            _ = self.cancel.cancelled() => Err(cancelled()),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

/// Rate-limit pacing for one listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub delay: Duration,
    /// Also wait between consecutive items, not only between pages.
    pub per_item: bool,
}

impl Pacing {
    pub fn per_page(delay: Duration) -> Self {
        Self {
            delay,
            per_item: false,
        }
    }

    pub fn per_item(delay: Duration) -> Self {
        Self {
            delay,
            per_item: true,
        }
    }

    pub fn none() -> Self {
        Self::per_page(Duration::ZERO)
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self::per_page(PACING_DELAY)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_multiplier: u32,
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    /// Delay before attempt `attempt` (0-based). The first attempt never
    /// waits; retry `k` waits `base_delay * multiplier^(k-1)`.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = self.backoff_multiplier.saturating_pow(attempt - 1);
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: FOLLOWERS_MAX_ATTEMPTS,
            base_delay: FOLLOWERS_BASE_DELAY,
            backoff_multiplier: 2,
            attempt_timeout: FOLLOWERS_ATTEMPT_TIMEOUT,
        }
    }
}

/// One remote listing operation with its query parameters bound.
#[async_trait]
pub trait PageSource: Send + Sync {
    type Item: Send;

    /// Remote operation name, for logs and errors.
    fn operation(&self) -> &'static str;

    /// The bound query parameter (DID, search string), for logs and errors.
    fn subject(&self) -> &str;

    async fn fetch_page(&self, cursor: Option<&str>, page_size: u8) -> Result<Page<Self::Item>>;
}

/// Page size for the next request given how many results are still wanted.
pub fn page_size(remaining: Option<usize>) -> u8 {
    // MAX_PAGE_SIZE fits in a u8
    remaining.unwrap_or(MAX_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE) as u8
}

/// Pull-based cursor walk over a [`PageSource`].
///
/// Pages are fetched lazily and strictly in order. Once `limit` items have
/// been yielded no further page is requested, even if a cursor remains.
pub struct Paginator<S: PageSource> {
    source: S,
    limit: Option<usize>,
    pacing: Pacing,
    waiter: Waiter,
    buffer: VecDeque<S::Item>,
    cursor: Option<String>,
    exhausted: bool,
    yielded: usize,
    pages_fetched: usize,
}

impl<S: PageSource> Paginator<S> {
    pub fn new(source: S, limit: Option<usize>, pacing: Pacing, waiter: Waiter) -> Self {
        Self {
            source,
            limit,
            pacing,
            waiter,
            buffer: VecDeque::new(),
            cursor: None,
            exhausted: false,
            yielded: 0,
            pages_fetched: 0,
        }
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    fn remaining(&self) -> Option<usize> {
        self.limit.map(|limit| limit.saturating_sub(self.yielded))
    }

    /// Next item, fetching another page if the current one is used up.
    /// `Ok(None)` once the limit is hit or the cursor chain ends.
    pub async fn next(&mut self) -> Result<Option<S::Item>> {
        loop {
            if self.remaining() == Some(0) {
                return Ok(None);
            }

            if let Some(item) = self.buffer.pop_front() {
                if self.pacing.per_item && self.yielded > 0 {
                    self.waiter
                        .wait(
                            self.pacing.delay,
                            self.source.operation(),
                            self.source.subject(),
                        )
                        .await?;
                }
                self.yielded += 1;
                return Ok(Some(item));
            }

            if self.exhausted {
                return Ok(None);
            }

            self.fetch_next_page().await?;
        }
    }

    async fn fetch_next_page(&mut self) -> Result<()> {
        if self.pages_fetched > 0 {
            self.waiter
                .wait(
                    self.pacing.delay,
                    self.source.operation(),
                    self.source.subject(),
                )
                .await?;
        }

        let size = page_size(self.remaining());
        debug!(
            operation = self.source.operation(),
            subject = self.source.subject(),
            cursor = self.cursor.as_deref(),
            page_size = size,
            "fetching page"
        );

        let page = self
            .source
            .fetch_page(self.cursor.as_deref(), size)
            .await?;
        self.pages_fetched += 1;

        let next = page.cursor.filter(|c| !c.is_empty());
        if next.is_some() && next == self.cursor {
            warn!(
                operation = self.source.operation(),
                cursor = next.as_deref(),
                "cursor did not advance, stopping"
            );
            self.exhausted = true;
        } else {
            self.exhausted = next.is_none();
        }
        self.cursor = next;
        self.buffer.extend(page.items);
        Ok(())
    }
}

/// Wraps a [`PageSource`] so each page fetch is retried with exponential
/// backoff and bounded by a per-attempt timeout.
pub struct Retrying<S> {
    inner: S,
    policy: RetryPolicy,
    waiter: Waiter,
}

impl<S> Retrying<S> {
    pub fn new(inner: S, policy: RetryPolicy, waiter: Waiter) -> Self {
        Self {
            inner,
            policy,
            waiter,
        }
    }
}

#[async_trait]
impl<S: PageSource> PageSource for Retrying<S> {
    type Item = S::Item;

    fn operation(&self) -> &'static str {
        self.inner.operation()
    }

    fn subject(&self) -> &str {
        self.inner.subject()
    }

    async fn fetch_page(&self, cursor: Option<&str>, page_size: u8) -> Result<Page<Self::Item>> {
        let operation = self.inner.operation();
        let mut last_error = None;

        for attempt in 0..self.policy.max_attempts {
            if attempt > 0 {
                if self.waiter.is_cancelled() {
                    return Err(Error::Cancelled {
                        operation,
                        input: self.inner.subject().to_string(),
                    });
                }
                let backoff = self.policy.delay_before(attempt);
                warn!(
                    operation,
                    attempt = attempt + 1,
                    backoff_ms = backoff.as_millis() as u64,
                    "retrying after error"
                );
                self.waiter
                    .wait(backoff, operation, self.inner.subject())
                    .await?;
            }

            let result = tokio::time::timeout(
                self.policy.attempt_timeout,
                self.inner.fetch_page(cursor, page_size),
            )
            .await;

            let err = match result {
                Ok(Ok(page)) => return Ok(page),
                Ok(Err(e)) if !e.is_retryable() => return Err(e),
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!(
                    "timed out after {}s",
                    self.policy.attempt_timeout.as_secs()
                ),
            };

            warn!(operation, attempt = attempt + 1, error = %err, "page fetch failed");
            last_error = Some(err);
        }

        Err(Error::Upstream {
            operation,
            input: self.inner.subject().to_string(),
            message: format!(
                "failed after {} attempts: {}",
                self.policy.max_attempts,
                last_error.unwrap_or_else(|| "no attempts made".to_string())
            ),
        })
    }
}
