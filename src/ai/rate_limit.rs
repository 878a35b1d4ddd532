//! Client-side Rate Limiting
//!
//! Fixed-window counter of requests and tokens. All counter state lives in a
//! single [`RateWindow`] behind one mutex so `check_and_reserve` and `commit`
//! are serialized when a limiter is shared between pipelines.
//!
//! State is process-local: independent processes sharing an API quota each
//! keep their own window.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::config::RateLimitConfig;
use crate::constants::rate_limit as rate_constants;
use crate::types::{RateLimitExceeded, Result};

/// Limiter shared across concurrent pipelines in one process
pub type SharedRateLimiter = Arc<RateLimiter>;

/// Counter state for the current window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    pub request_count: u32,
    pub token_count: u64,
    pub window_start: Instant,
}

impl RateWindow {
    fn new(now: Instant) -> Self {
        Self {
            request_count: 0,
            token_count: 0,
            window_start: now,
        }
    }
}

/// Tokens held by one successful `check_and_reserve`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "reservations should be committed with actual usage"]
pub struct Reservation {
    tokens: u64,
    window_start: Instant,
}

impl Reservation {
    pub fn tokens(&self) -> u64 {
        self.tokens
    }
}

pub struct RateLimiter {
    max_requests: u32,
    max_tokens: u64,
    window: Duration,
    state: Mutex<RateWindow>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            max_requests: config.max_requests_per_window,
            max_tokens: config.max_tokens_per_window,
            window: Duration::from_secs(rate_constants::WINDOW_SECS),
            state: Mutex::new(RateWindow::new(Instant::now())),
        })
    }

    pub fn shared(config: &RateLimitConfig) -> Result<SharedRateLimiter> {
        Self::new(config).map(Arc::new)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RateWindow> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn roll_window(&self, state: &mut RateWindow, now: Instant) {
        if now.duration_since(state.window_start) >= self.window {
            debug!(
                requests = state.request_count,
                tokens = state.token_count,
                "Rate window reset"
            );
            *state = RateWindow::new(now);
        }
    }

    /// Count one request and reserve `estimated_tokens` in the current window.
    ///
    /// Fails without changing state when the request count is at its limit or
    /// the reservation would reach the token limit.
    pub fn check_and_reserve(
        &self,
        estimated_tokens: u64,
    ) -> std::result::Result<Reservation, RateLimitExceeded> {
        let now = Instant::now();
        let mut state = self.lock();
        self.roll_window(&mut state, now);

        let retry_after = self
            .window
            .saturating_sub(now.duration_since(state.window_start));

        if state.request_count >= self.max_requests {
            return Err(RateLimitExceeded {
                retry_after,
                message: format!(
                    "request limit reached ({}/{} per {}s)",
                    state.request_count,
                    self.max_requests,
                    self.window.as_secs()
                ),
            });
        }

        if state.token_count.saturating_add(estimated_tokens) >= self.max_tokens {
            return Err(RateLimitExceeded {
                retry_after,
                message: format!(
                    "token limit reached ({} used + {} requested, limit {} per {}s)",
                    state.token_count,
                    estimated_tokens,
                    self.max_tokens,
                    self.window.as_secs()
                ),
            });
        }

        state.request_count += 1;
        state.token_count += estimated_tokens;

        Ok(Reservation {
            tokens: estimated_tokens,
            window_start: state.window_start,
        })
    }

    /// Top up a reservation to actual usage.
    ///
    /// Counts never decrease within a window: usage below the reservation
    /// leaves the count as reserved. Only applies while the reserving window
    /// is still current; a reset window already dropped the reservation.
    pub fn commit(&self, reservation: Reservation, actual_tokens: u64) {
        let mut state = self.lock();
        if state.window_start != reservation.window_start {
            return;
        }
        state.token_count = state
            .token_count
            .saturating_add(actual_tokens.saturating_sub(reservation.tokens));
    }

    /// Current window, rolled forward if it has expired
    pub fn snapshot(&self) -> RateWindow {
        let mut state = self.lock();
        self.roll_window(&mut state, Instant::now());
        *state
    }
}
