use std::future::Future;
use std::time::Duration;

use crate::{
    error::{AppError, ProviderError},
    normalize::{is_retryable_error, is_service_failure},
    resilience::{with_retry, BreakerOptions, CircuitRegistry, ResilienceConfig, RetryOptions},
};

/// Circuit breaker + retrier + normalizer shared by the resilient clients.
pub(super) struct CallGuard {
    pub(super) service: String,
    pub(super) registry: CircuitRegistry,
    pub(super) cfg: ResilienceConfig,
    normalize: fn(ProviderError) -> AppError,
}

impl CallGuard {
    pub(super) fn new(
        service: impl Into<String>,
        registry: CircuitRegistry,
        cfg: ResilienceConfig,
        normalize: fn(ProviderError) -> AppError,
    ) -> Self {
        Self {
            service: service.into(),
            registry,
            cfg,
            normalize,
        }
    }

    /// Runs `call` as `breaker(retry(call))` and normalizes what escapes.
    pub(super) async fn run<T, F, Fut>(&self, operation: &str, call: F) -> Result<T, AppError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let retry = self.retry_options(operation);
        let breaker = self.breaker_options();
        let timeout = self.cfg.request_timeout();
        log::debug!("{} {operation}", self.service);
        self.registry
            .call(&self.service, &breaker, || {
                with_retry(|| attempt(timeout, call()), &retry)
            })
            .await
            .map_err(self.normalize)
    }

    fn retry_options(&self, operation: &str) -> RetryOptions<ProviderError> {
        let service = self.service.clone();
        let operation = operation.to_string();
        self.cfg
            .retry_options::<ProviderError>()
            .should_retry(|err, _| is_retryable_error(err))
            .on_retry(move |err, attempt, delay| {
                log::warn!(
                    "{service} {operation} attempt {attempt} failed: {err}; retrying in {}ms",
                    delay.as_millis()
                );
            })
    }

    fn breaker_options(&self) -> BreakerOptions<ProviderError> {
        self.cfg
            .breaker_options::<ProviderError>()
            .should_trip(is_service_failure)
    }
}

async fn attempt<T, Fut>(timeout: Option<Duration>, call: Fut) -> Result<T, ProviderError>
where
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let Some(limit) = timeout else {
        return call.await;
    };
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or_else(|_| {
            Err(ProviderError::Network {
                code: Some("ETIMEDOUT".to_string()),
                message: format!("request timed out after {}ms", limit.as_millis()),
            })
        })
}
