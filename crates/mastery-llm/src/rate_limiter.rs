//! Sliding-window token rate limiting
//!
//! Each provider gets one limiter that tracks the tokens spent during the
//! last 60 seconds and makes callers wait when the next request would push
//! the window over its tokens-per-minute budget.

use crate::error::{Error, Result};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Length of the sliding window
pub const WINDOW: Duration = Duration::from_secs(60);

/// Extra time added to every wait so the oldest entry has surely expired
pub const SAFETY_MARGIN: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
struct UsageEntry {
    at: Instant,
    tokens: u64,
}

/// Token budget enforcer over a sliding 60 second window
#[derive(Debug)]
pub struct RateLimiter {
    tokens_per_minute: u64,
    window: Mutex<VecDeque<UsageEntry>>,
    cancel: CancellationToken,
}

impl RateLimiter {
    /// Create a limiter with the given budget
    #[must_use]
    pub fn new(tokens_per_minute: u64) -> Self {
        Self::with_cancellation(tokens_per_minute, CancellationToken::new())
    }

    /// Create a limiter whose waits end early when `cancel` fires
    #[must_use]
    pub fn with_cancellation(tokens_per_minute: u64, cancel: CancellationToken) -> Self {
        Self {
            tokens_per_minute,
            window: Mutex::new(VecDeque::new()),
            cancel,
        }
    }

    /// Configured budget
    #[must_use]
    pub fn tokens_per_minute(&self) -> u64 {
        self.tokens_per_minute
    }

    /// Tokens recorded during the last 60 seconds
    pub async fn get_current_usage(&self) -> u64 {
        let mut window = self.window.lock().await;
        evict_expired(&mut window, Instant::now());
        window.iter().map(|e| e.tokens).sum()
    }

    /// Wait until `estimated_tokens` fit in the window
    ///
    /// Returns how long the caller was held back. Nothing is recorded; pair
    /// with [`RateLimiter::record_usage`], or use [`RateLimiter::acquire`].
    pub async fn wait_if_needed(&self, estimated_tokens: u64) -> Result<Duration> {
        let delay = {
            let mut window = self.window.lock().await;
            self.required_delay(&mut window, estimated_tokens)
        };

        match delay {
            Some(delay) => {
                self.sleep(delay).await?;
                let mut window = self.window.lock().await;
                evict_expired(&mut window, Instant::now());
                Ok(delay)
            }
            None => Ok(Duration::ZERO),
        }
    }

    /// Record tokens spent now
    pub async fn record_usage(&self, tokens: u64) {
        let mut window = self.window.lock().await;
        window.push_back(UsageEntry {
            at: Instant::now(),
            tokens,
        });
    }

    /// Wait for budget and record the estimate in one step
    ///
    /// The window stays locked from the check until the estimate is
    /// recorded, so concurrent callers are admitted one at a time.
    pub async fn acquire(&self, estimated_tokens: u64) -> Result<Duration> {
        let mut window = self.window.lock().await;

        let waited = match self.required_delay(&mut window, estimated_tokens) {
            Some(delay) => {
                self.sleep(delay).await?;
                evict_expired(&mut window, Instant::now());
                delay
            }
            None => Duration::ZERO,
        };

        window.push_back(UsageEntry {
            at: Instant::now(),
            tokens: estimated_tokens,
        });
        Ok(waited)
    }

    fn required_delay(
        &self,
        window: &mut VecDeque<UsageEntry>,
        estimated_tokens: u64,
    ) -> Option<Duration> {
        let now = Instant::now();
        evict_expired(window, now);

        let current: u64 = window.iter().map(|e| e.tokens).sum();
        if current.saturating_add(estimated_tokens) <= self.tokens_per_minute {
            return None;
        }

        // An empty window admits any single request, even one over budget.
        let oldest = window.front()?;
        let remaining = WINDOW.checked_sub(now.saturating_duration_since(oldest.at))?;
        if remaining.is_zero() {
            return None;
        }

        debug!(
            current,
            estimated_tokens,
            limit = self.tokens_per_minute,
            "Token budget exhausted"
        );
        Some(remaining + SAFETY_MARGIN)
    }

    async fn sleep(&self, delay: Duration) -> Result<()> {
        info!("Rate limit reached, waiting {:.1}s", delay.as_secs_f64());
        tokio::select! {
            () = tokio::time::sleep(delay) => Ok(()),
            () = self.cancel.cancelled() => Err(Error::WaitInterrupted),
        }
    }
}

fn evict_expired(window: &mut VecDeque<UsageEntry>, now: Instant) {
    while let Some(entry) = window.front() {
        if now.saturating_duration_since(entry.at) > WINDOW {
            window.pop_front();
        } else {
            break;
        }
    }
}
