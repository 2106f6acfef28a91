#[path = "resilience/config.rs"]
mod config;

#[path = "resilience/retry.rs"]
mod retry;

#[path = "resilience/circuit.rs"]
mod circuit;

pub use circuit::{
    BreakerOptions, CircuitRegistry, CircuitState, CircuitStats, CircuitStatus,
};
pub use config::ResilienceConfig;
pub use retry::{backoff_delay, with_retry, RetryOptions, MAX_JITTER};
