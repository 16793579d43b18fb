use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::models::Transaction;

/// Capability boundary to the upstream banking-data aggregator. The real
/// network client lives outside this crate; analytics only need something
/// that turns a session handle and a day count into raw transactions.
pub(crate) trait TransactionSource {
    fn fetch_transactions(&self, login_id: &str, days: u32) -> Result<Vec<Transaction>>;
}

/// Sliding-window limiter for outbound upstream calls. The prune, capacity
/// check, and append happen under one lock so concurrent callers cannot
/// interleave mid-decision.
pub(crate) struct RateLimiter {
    max_calls: usize,
    window: Duration,
    calls: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub(crate) fn new(max_calls_per_minute: usize) -> Self {
        Self::with_window(max_calls_per_minute, Duration::from_secs(60))
    }

    pub(crate) fn with_window(max_calls: usize, window: Duration) -> Self {
        Self {
            max_calls,
            window,
            calls: Mutex::new(VecDeque::new()),
        }
    }

    /// Blocks until a call slot is free, then records the call. The wait is
    /// `window - (now - oldest)`, never negative.
    pub(crate) fn acquire(&self) {
        let mut calls = self
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let now = Instant::now();
        while calls
            .front()
            .is_some_and(|&t| now.duration_since(t) >= self.window)
        {
            calls.pop_front();
        }

        if calls.len() >= self.max_calls {
            if let Some(&oldest) = calls.front() {
                let wait = self.window.saturating_sub(now.duration_since(oldest));
                if !wait.is_zero() {
                    std::thread::sleep(wait);
                }
            }
            let now = Instant::now();
            while calls
                .front()
                .is_some_and(|&t| now.duration_since(t) >= self.window)
            {
                calls.pop_front();
            }
        }

        calls.push_back(Instant::now());
    }

    #[cfg(test)]
    pub(crate) fn recorded_calls(&self) -> Vec<Instant> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect()
    }
}
