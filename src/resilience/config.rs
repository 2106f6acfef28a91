use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{circuit::BreakerOptions, retry::RetryOptions};

/// Configuration for retry, backoff and circuit-breaker behavior.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Maximum number of attempts including the first one
    pub max_attempts: u32,
    /// Initial backoff delay in milliseconds
    pub base_delay_ms: u64,
    /// Maximum backoff delay in milliseconds
    pub max_delay_ms: u64,
    /// Whether to add random jitter to backoff delays
    pub jitter: bool,
    /// Consecutive tripping failures before the circuit opens
    pub failure_threshold: u32,
    /// How long an open circuit rejects calls before allowing a trial
    pub reset_timeout_ms: u64,
    /// Concurrent trial calls admitted while half-open
    pub half_open_max_attempts: u32,
    /// Optional deadline for a single attempt; unset means no deadline
    pub request_timeout_ms: Option<u64>,
}

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BASE_DELAY_MS: u64 = 1_000;
const DEFAULT_MAX_DELAY_MS: u64 = 10_000;
const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
const DEFAULT_RESET_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_HALF_OPEN_MAX_ATTEMPTS: u32 = 1;

impl ResilienceConfig {
    /// Creates the configuration used by the resilient clients.
    pub fn defaults() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            jitter: true,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            reset_timeout_ms: DEFAULT_RESET_TIMEOUT_MS,
            half_open_max_attempts: DEFAULT_HALF_OPEN_MAX_ATTEMPTS,
            request_timeout_ms: None,
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn retry_options<E>(&self) -> RetryOptions<E> {
        RetryOptions::new()
            .max_attempts(self.max_attempts)
            .base_delay_ms(self.base_delay_ms)
            .max_delay_ms(self.max_delay_ms)
            .jitter(self.jitter)
    }

    pub fn breaker_options<E>(&self) -> BreakerOptions<E> {
        BreakerOptions::new()
            .failure_threshold(self.failure_threshold)
            .reset_timeout(Duration::from_millis(self.reset_timeout_ms))
            .half_open_max_attempts(self.half_open_max_attempts)
    }
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self::defaults()
    }
}
