use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;

/// Upper bound (exclusive) of the random factor added to each delay.
pub const MAX_JITTER: f64 = 0.3;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BASE_DELAY_MS: u64 = 1_000;
const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

type ShouldRetryFn<E> = dyn Fn(&E, u32) -> bool + Send + Sync;
type OnRetryFn<E> = dyn Fn(&E, u32, Duration) + Send + Sync;

/// Per-call retry settings.
///
/// Without a `should_retry` predicate every failure is retried until the
/// attempts run out.
pub struct RetryOptions<E> {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
    should_retry: Option<Arc<ShouldRetryFn<E>>>,
    on_retry: Option<Arc<OnRetryFn<E>>>,
}

impl<E> Clone for RetryOptions<E> {
    fn clone(&self) -> Self {
        Self {
            max_attempts: self.max_attempts,
            base_delay_ms: self.base_delay_ms,
            max_delay_ms: self.max_delay_ms,
            jitter: self.jitter,
            should_retry: self.should_retry.clone(),
            on_retry: self.on_retry.clone(),
        }
    }
}

impl<E> Default for RetryOptions<E> {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            jitter: true,
            should_retry: None,
            on_retry: None,
        }
    }
}

impl<E> std::fmt::Debug for RetryOptions<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryOptions")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay_ms", &self.base_delay_ms)
            .field("max_delay_ms", &self.max_delay_ms)
            .field("jitter", &self.jitter)
            .field("should_retry", &self.should_retry.is_some())
            .field("on_retry", &self.on_retry.is_some())
            .finish()
    }
}

impl<E> RetryOptions<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    pub fn max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Decides per failure whether another attempt is made.
    pub fn should_retry(mut self, predicate: impl Fn(&E, u32) -> bool + Send + Sync + 'static) -> Self {
        self.should_retry = Some(Arc::new(predicate));
        self
    }

    /// Observes each failure that is about to be retried, with the delay.
    pub fn on_retry(mut self, callback: impl Fn(&E, u32, Duration) + Send + Sync + 'static) -> Self {
        self.on_retry = Some(Arc::new(callback));
        self
    }

    fn allows_retry(&self, err: &E, attempt: u32) -> bool {
        self.should_retry
            .as_ref()
            .map_or(true, |predicate| predicate(err, attempt))
    }

    fn next_delay(&self, attempt: u32) -> Duration {
        let jitter = if self.jitter {
            rand::thread_rng().gen_range(0.0..MAX_JITTER)
        } else {
            0.0
        };
        backoff_delay(self.base_delay_ms, self.max_delay_ms, attempt, jitter)
    }
}

/// Delay before the attempt following `attempt` (1-based).
///
/// `base * 2^(attempt-1) * (1 + jitter)`, capped at `max_delay_ms`.
pub fn backoff_delay(base_delay_ms: u64, max_delay_ms: u64, attempt: u32, jitter: f64) -> Duration {
    let exponent = attempt.saturating_sub(1).min(52) as i32;
    let raw = base_delay_ms as f64 * 2f64.powi(exponent) * (1.0 + jitter);
    Duration::from_millis(raw.min(max_delay_ms as f64) as u64)
}

/// Runs `operation` until it succeeds, attempts run out, or the failure is
/// not worth retrying. The last failure is returned unchanged.
pub async fn with_retry<T, E, F, Fut>(mut operation: F, options: &RetryOptions<E>) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = options.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if attempt >= max_attempts || !options.allows_retry(&err, attempt) {
            return Err(err);
        }
        let delay = options.next_delay(attempt);
        if let Some(callback) = &options.on_retry {
            callback(&err, attempt, delay);
        }
        log::debug!(
            "attempt {attempt}/{max_attempts} failed, retrying in {}ms",
            delay.as_millis()
        );
        drop(err);
        sleep(delay).await;
        attempt += 1;
    }
}
