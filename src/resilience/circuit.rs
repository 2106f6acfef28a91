//! Per-service circuit breaker.
//!
//! ```text
//! Closed   -> Open      failure_count reaches failure_threshold
//! Open     -> HalfOpen  reset_timeout elapsed since the last failure
//! HalfOpen -> Closed    trial call succeeds
//! HalfOpen -> Open      trial call fails
//! ```
//!
//! State lives in an explicit [`CircuitRegistry`] that clients share by
//! cloning. All transitions happen under one lock that is never held across
//! an await point, so concurrent calls against the same service cannot push
//! `failure_count` past the threshold before the circuit opens.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

use crate::error::AppError;

const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_millis(30_000);
const DEFAULT_HALF_OPEN_MAX_ATTEMPTS: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitStatus {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CircuitStatus::Closed => "closed",
            CircuitStatus::Open => "open",
            CircuitStatus::HalfOpen => "half-open",
        })
    }
}

#[derive(Debug, Clone)]
pub struct CircuitState {
    pub status: CircuitStatus,
    pub failure_count: u32,
    pub last_failure: Option<Instant>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub half_open_attempts: u32,
}

impl Default for CircuitState {
    fn default() -> Self {
        Self {
            status: CircuitStatus::Closed,
            failure_count: 0,
            last_failure: None,
            last_failure_at: None,
            half_open_attempts: 0,
        }
    }
}

impl CircuitState {
    fn transition(&mut self, to: CircuitStatus) -> (CircuitStatus, CircuitStatus) {
        let from = self.status;
        self.status = to;
        match to {
            CircuitStatus::Closed => self.failure_count = 0,
            CircuitStatus::HalfOpen | CircuitStatus::Open => self.half_open_attempts = 0,
        }
        (from, to)
    }
}

/// Read-only snapshot of one circuit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitStats {
    pub service: String,
    pub state: CircuitStatus,
    pub failure_count: u32,
    pub last_failure_time: Option<DateTime<Utc>>,
}

type ShouldTripFn<E> = dyn Fn(&E) -> bool + Send + Sync;
type StateChangeFn = dyn Fn(CircuitStatus, CircuitStatus, &str) + Send + Sync;

pub struct BreakerOptions<E> {
    pub failure_threshold: u32,
    pub reset_timeout: Duration,
    pub half_open_max_attempts: u32,
    should_trip: Option<Arc<ShouldTripFn<E>>>,
    on_state_change: Option<Arc<StateChangeFn>>,
}

impl<E> Clone for BreakerOptions<E> {
    fn clone(&self) -> Self {
        Self {
            failure_threshold: self.failure_threshold,
            reset_timeout: self.reset_timeout,
            half_open_max_attempts: self.half_open_max_attempts,
            should_trip: self.should_trip.clone(),
            on_state_change: self.on_state_change.clone(),
        }
    }
}

impl<E> Default for BreakerOptions<E> {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            reset_timeout: DEFAULT_RESET_TIMEOUT,
            half_open_max_attempts: DEFAULT_HALF_OPEN_MAX_ATTEMPTS,
            should_trip: None,
            on_state_change: None,
        }
    }
}

impl<E> fmt::Debug for BreakerOptions<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BreakerOptions")
            .field("failure_threshold", &self.failure_threshold)
            .field("reset_timeout", &self.reset_timeout)
            .field("half_open_max_attempts", &self.half_open_max_attempts)
            .finish_non_exhaustive()
    }
}

impl<E> BreakerOptions<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }

    pub fn half_open_max_attempts(mut self, attempts: u32) -> Self {
        self.half_open_max_attempts = attempts;
        self
    }

    /// Selects which failures count against the circuit. Defaults to all.
    pub fn should_trip(mut self, predicate: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        self.should_trip = Some(Arc::new(predicate));
        self
    }

    pub fn on_state_change(
        mut self,
        hook: impl Fn(CircuitStatus, CircuitStatus, &str) + Send + Sync + 'static,
    ) -> Self {
        self.on_state_change = Some(Arc::new(hook));
        self
    }

    fn trips_on(&self, err: &E) -> bool {
        self.should_trip.as_ref().map_or(true, |predicate| predicate(err))
    }

    fn notify(&self, service: &str, change: Option<(CircuitStatus, CircuitStatus)>) {
        let Some((from, to)) = change else {
            return;
        };
        log::warn!("circuit for {service} moved from {from} to {to}");
        if let Some(hook) = &self.on_state_change {
            hook(from, to, service);
        }
    }
}

/// Process-wide view of service health, keyed by service name.
///
/// Cloning is cheap and every clone shares the same circuits.
#[derive(Clone, Default)]
pub struct CircuitRegistry {
    circuits: Arc<Mutex<HashMap<String, CircuitState>>>,
}

impl fmt::Debug for CircuitRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitRegistry")
            .field("circuits", &self.lock().len())
            .finish()
    }
}

impl CircuitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `operation` if the circuit for `service` admits it.
    ///
    /// Rejections are `CIRCUIT_BREAKER_OPEN` errors and never invoke
    /// `operation`. Failures of `operation` are always returned unchanged.
    pub async fn call<T, E, F, Fut>(
        &self,
        service: &str,
        options: &BreakerOptions<E>,
        operation: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<AppError>,
    {
        let trial = self.admit(service, options)?;
        match operation().await {
            Ok(value) => {
                self.record_success(service, options);
                Ok(value)
            }
            Err(err) => {
                if options.trips_on(&err) {
                    self.record_failure(service, options);
                } else if trial {
                    self.release_trial(service);
                }
                Err(err)
            }
        }
    }

    pub fn circuit_state(&self, service: &str) -> CircuitStatus {
        self.lock()
            .get(service)
            .map_or(CircuitStatus::Closed, |state| state.status)
    }

    pub fn circuit_stats(&self, service: &str) -> CircuitStats {
        let circuits = self.lock();
        let state = circuits.get(service).cloned().unwrap_or_default();
        CircuitStats {
            service: service.to_string(),
            state: state.status,
            failure_count: state.failure_count,
            last_failure_time: state.last_failure_at,
        }
    }

    pub fn reset_circuit(&self, service: &str) {
        self.lock().remove(service);
    }

    pub fn reset_all_circuits(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CircuitState>> {
        self.circuits.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns whether the admitted call is a half-open trial.
    fn admit<E>(&self, service: &str, options: &BreakerOptions<E>) -> Result<bool, AppError> {
        let mut change = None;
        let admission = {
            let mut circuits = self.lock();
            let state = circuits.entry(service.to_string()).or_default();
            admit_locked(state, service, options, &mut change)
        };
        options.notify(service, change);
        admission
    }

    fn record_success<E>(&self, service: &str, options: &BreakerOptions<E>) {
        let change = {
            let mut circuits = self.lock();
            let state = circuits.entry(service.to_string()).or_default();
            match state.status {
                CircuitStatus::HalfOpen => Some(state.transition(CircuitStatus::Closed)),
                CircuitStatus::Closed => {
                    state.failure_count = 0;
                    None
                }
                CircuitStatus::Open => None,
            }
        };
        options.notify(service, change);
    }

    fn record_failure<E>(&self, service: &str, options: &BreakerOptions<E>) {
        let change = {
            let mut circuits = self.lock();
            let state = circuits.entry(service.to_string()).or_default();
            state.failure_count = state.failure_count.saturating_add(1);
            state.last_failure = Some(Instant::now());
            state.last_failure_at = Some(Utc::now());
            match state.status {
                CircuitStatus::HalfOpen => Some(state.transition(CircuitStatus::Open)),
                CircuitStatus::Closed if state.failure_count >= options.failure_threshold => {
                    Some(state.transition(CircuitStatus::Open))
                }
                _ => None,
            }
        };
        options.notify(service, change);
    }

    fn release_trial(&self, service: &str) {
        let mut circuits = self.lock();
        if let Some(state) = circuits.get_mut(service) {
            if state.status == CircuitStatus::HalfOpen {
                state.half_open_attempts = state.half_open_attempts.saturating_sub(1);
            }
        }
    }
}

fn admit_locked<E>(
    state: &mut CircuitState,
    service: &str,
    options: &BreakerOptions<E>,
    change: &mut Option<(CircuitStatus, CircuitStatus)>,
) -> Result<bool, AppError> {
    if state.status == CircuitStatus::Open {
        let elapsed = state.last_failure.map(|at| at.elapsed());
        match elapsed {
            Some(elapsed) if elapsed < options.reset_timeout => {
                let remaining = options.reset_timeout - elapsed;
                return Err(AppError::circuit_open(service, remaining.as_millis() as u64));
            }
            _ => *change = Some(state.transition(CircuitStatus::HalfOpen)),
        }
    }
    if state.status == CircuitStatus::HalfOpen {
        // A zero limit would pin the circuit half-open with no way out.
        if state.half_open_attempts >= options.half_open_max_attempts.max(1) {
            return Err(AppError::circuit_open(service, 0));
        }
        state.half_open_attempts += 1;
        return Ok(true);
    }
    Ok(false)
}

#[cfg(test)]
#[path = "circuit_tests.rs"]
mod tests;
