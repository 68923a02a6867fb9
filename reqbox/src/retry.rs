//! Backoff between retry attempts.
//!
//! The delay before retry `k` (1-based) is `base * factor^(k-1)`, capped by
//! `max`. With jitter enabled the actual delay is drawn uniformly from
//! `[d/2, d]`. The first attempt of a request is never delayed.
//!
//! Sleeping goes through the [`Sleeper`] trait so tests can observe the
//! delays without waiting for them.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Exponential backoff policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Backoff {
    /// Delay before the first retry.
    #[serde(with = "humantime_serde")]
    pub base: Duration,
    /// Growth factor between consecutive retries. Values below 1 act as 1.
    pub factor: f64,
    /// Upper bound for a single delay.
    #[serde(with = "humantime_serde")]
    pub max: Option<Duration>,
    /// Randomizes each delay within `[d/2, d]`.
    pub jitter: bool,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(100),
            factor: 2.0,
            max: None,
            jitter: true,
        }
    }
}

impl Backoff {
    /// Exponential backoff from `base`, doubling, with jitter.
    pub fn exponential(base: Duration) -> Self {
        Self {
            base,
            ..Self::default()
        }
    }

    /// The same delay before every retry.
    pub fn constant(delay: Duration) -> Self {
        Self {
            base: delay,
            factor: 1.0,
            max: None,
            jitter: false,
        }
    }

    /// Retries immediately.
    pub fn none() -> Self {
        Self::constant(Duration::ZERO)
    }

    /// Caps every delay at `max`.
    pub fn with_max(mut self, max: Duration) -> Self {
        self.max = Some(max);
        self
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay to wait before retry number `retry`.
    ///
    /// `retry = 0` is the first attempt and always yields zero.
    pub fn delay(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(retry - 1).unwrap_or(i32::MAX);
        let scaled = self.base.as_secs_f64() * self.factor.max(1.0).powi(exponent);
        let mut delay = Duration::try_from_secs_f64(scaled).unwrap_or(Duration::MAX);

        if let Some(max) = self.max {
            delay = delay.min(max);
        }

        if self.jitter && !delay.is_zero() {
            let fraction: f64 = rand::thread_rng().gen_range(0.5..=1.0);
            delay = Duration::try_from_secs_f64(delay.as_secs_f64() * fraction).unwrap_or(delay);
        }

        delay
    }
}

/// Waits between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Suspends the current task for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
