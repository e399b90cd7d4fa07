// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Retry policy for single register requests.
//!
//! Lives under `tunnel.retry` in the configuration file:
//!
//! ```yaml
//! retry:
//!   max_retries: 3
//!   strategy:
//!     kind: exponential
//!     initial_delay: 50ms
//!     max_delay: 2s
//! ```
//!
//! The bridge loop reuses the same strategy to pace reconnects.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ModbusError;

/// How many times, and how patiently, a failed request is repeated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Repeats after the first failure. Zero disables retrying.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Pause before each repeat.
    #[serde(default)]
    pub strategy: RetryStrategy,
}

fn default_max_retries() -> u32 {
    3
}

impl RetryConfig {
    /// Fail on the first error.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            strategy: RetryStrategy::Immediate,
        }
    }

    /// Up to `max_retries` repeats, `delay` apart.
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            strategy: RetryStrategy::Fixed { delay },
        }
    }

    /// Up to `max_retries` repeats with doubling pauses.
    pub fn exponential(max_retries: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            strategy: RetryStrategy::exponential(initial_delay, max_delay),
        }
    }

    /// Whether to repeat a request that failed with `error` after
    /// `attempt` earlier repeats.
    pub fn should_retry(&self, error: &ModbusError, attempt: u32) -> bool {
        attempt < self.max_retries && error.is_retryable()
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            strategy: RetryStrategy::default(),
        }
    }
}

/// Pause schedule between repeats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetryStrategy {
    /// Repeat at once.
    Immediate,

    /// Same pause every time.
    Fixed {
        /// Pause.
        #[serde(with = "humantime_serde")]
        delay: Duration,
    },

    /// `step`, `2 * step`, `3 * step`, ... up to `max_delay`.
    Linear {
        /// Increment per attempt.
        #[serde(with = "humantime_serde")]
        step: Duration,
        /// Ceiling.
        #[serde(with = "humantime_serde")]
        max_delay: Duration,
    },

    /// `initial_delay * multiplier^attempt` up to `max_delay`, spread by
    /// `jitter` (a fraction of the pause, 0 to 1).
    Exponential {
        /// First pause.
        #[serde(with = "humantime_serde")]
        initial_delay: Duration,
        /// Ceiling.
        #[serde(with = "humantime_serde")]
        max_delay: Duration,
        /// Growth per attempt.
        #[serde(default = "default_multiplier")]
        multiplier: f64,
        /// Random spread.
        #[serde(default)]
        jitter: f64,
    },
}

fn default_multiplier() -> f64 {
    2.0
}

impl RetryStrategy {
    /// Doubling pauses without jitter.
    pub fn exponential(initial_delay: Duration, max_delay: Duration) -> Self {
        Self::Exponential {
            initial_delay,
            max_delay,
            multiplier: default_multiplier(),
            jitter: 0.0,
        }
    }

    /// Pause before repeat number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Self::Immediate => Duration::ZERO,
            Self::Fixed { delay } => delay,
            Self::Linear { step, max_delay } => {
                step.saturating_mul(attempt.saturating_add(1)).min(max_delay)
            }
            Self::Exponential {
                initial_delay,
                max_delay,
                multiplier,
                jitter,
            } => {
                let exponent = attempt.min(64) as i32;
                let pause = (initial_delay.as_secs_f64() * multiplier.powi(exponent))
                    .min(max_delay.as_secs_f64());
                let spread = pause * jitter.clamp(0.0, 1.0);
                let pause = if spread > 0.0 {
                    pause + rand::thread_rng().gen_range(-spread..=spread)
                } else {
                    pause
                };
                Duration::from_secs_f64(pause.max(0.0))
            }
        }
    }
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::Exponential {
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
            multiplier: default_multiplier(),
            jitter: 0.1,
        }
    }
}
