use crate::resilience::{CircuitRegistry, ResilienceConfig};

use super::client_builder::ClientBuilder;

impl ClientBuilder {
    /// Shares circuit state with other clients built from the same registry.
    pub fn registry(mut self, registry: CircuitRegistry) -> Self {
        self.state.registry = Some(registry);
        self
    }

    /// Starts from a complete resilience config; the setters below override it.
    pub fn resilience(mut self, cfg: ResilienceConfig) -> Self {
        self.state.resilience = Some(cfg);
        self
    }

    /// Sets the number of attempts per call, including the first.
    pub fn resilient_attempts(mut self, attempts: u32) -> Self {
        self.state.resilient_attempts = Some(attempts);
        self
    }

    /// Sets base and max backoff delays in milliseconds.
    pub fn resilient_backoff(mut self, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        self.state.resilient_base_delay_ms = Some(base_delay_ms);
        self.state.resilient_max_delay_ms = Some(max_delay_ms);
        self
    }

    /// Sets jitter toggle for backoff.
    pub fn resilient_jitter(mut self, jitter: bool) -> Self {
        self.state.resilient_jitter = Some(jitter);
        self
    }

    /// Deadline for a single attempt.
    pub fn request_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.state.request_timeout_ms = Some(timeout_ms);
        self
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.state.failure_threshold = Some(threshold);
        self
    }

    pub fn reset_timeout_ms(mut self, reset_ms: u64) -> Self {
        self.state.reset_timeout_ms = Some(reset_ms);
        self
    }
}
