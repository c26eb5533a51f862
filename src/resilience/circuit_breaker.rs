//! Circuit breaker for external store calls
//!
//! Prevents cascading failures by failing fast once the ledger store has
//! proven unhealthy, and allowing it time to recover.
//!
//! States: **Closed** (calls pass through, consecutive failures within a
//! window are counted) → **Open** (calls fail fast with
//! [`Error::Unavailable`]) → **HalfOpen** (after a cooldown, a bounded
//! number of probe calls are let through) → back to Closed on enough probe
//! successes, or straight back to Open on a probe failure.
//!
//! Only transient errors ([`Error::is_transient`]) count as failures:
//! a validation outcome such as `InsufficientLp` proves the store answered
//! and must not open the circuit.

use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Instant;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::BreakerConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Circuit breaker guarding one external service.
pub struct CircuitBreaker {
    config: BreakerConfig,
    state: RwLock<CircuitState>,
    failure_count: AtomicU32,
    success_count: AtomicU32,
    half_open_calls: AtomicU32,
    last_failure: RwLock<Option<Instant>>,
    last_transition: RwLock<Instant>,
    total_calls: AtomicU64,
    total_failures: AtomicU64,
    times_opened: AtomicU32,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            state: RwLock::new(CircuitState::Closed),
            failure_count: AtomicU32::new(0),
            success_count: AtomicU32::new(0),
            half_open_calls: AtomicU32::new(0),
            last_failure: RwLock::new(None),
            last_transition: RwLock::new(Instant::now()),
            total_calls: AtomicU64::new(0),
            total_failures: AtomicU64::new(0),
            times_opened: AtomicU32::new(0),
        }
    }

    /// Run `f` under breaker protection. `operation` names the call for
    /// logs and for the `Unavailable` error surfaced while open.
    pub async fn call<T, F, Fut>(&self, operation: &str, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.total_calls.fetch_add(1, Ordering::Relaxed);

        if !self.admit().await {
            return Err(Error::Unavailable {
                operation: operation.to_string(),
            });
        }

        match f().await {
            Ok(value) => {
                self.record_success().await;
                Ok(value)
            }
            Err(e) if e.is_transient() => {
                self.total_failures.fetch_add(1, Ordering::Relaxed);
                self.record_failure(operation).await;
                Err(e)
            }
            // The store answered; a validation outcome is a healthy call.
            Err(e) => {
                self.record_success().await;
                Err(e)
            }
        }
    }

    /// Whether a call may proceed in the current state.
    async fn admit(&self) -> bool {
        let state = *self.state.read().await;
        match state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let since = self.last_transition.read().await.elapsed();
                if since >= self.config.open_cooldown {
                    self.transition_to_half_open().await;
                    self.try_probe()
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => self.try_probe(),
        }
    }

    /// Reserve a probe slot in half-open state.
    fn try_probe(&self) -> bool {
        let current = self.half_open_calls.fetch_add(1, Ordering::AcqRel);
        if current < self.config.half_open_max_calls {
            true
        } else {
            self.half_open_calls.fetch_sub(1, Ordering::AcqRel);
            false
        }
    }

    async fn record_success(&self) {
        let state = *self.state.read().await;
        match state {
            CircuitState::Closed => {
                self.failure_count.store(0, Ordering::Release);
            }
            CircuitState::HalfOpen => {
                let successes = self.success_count.fetch_add(1, Ordering::AcqRel) + 1;
                self.half_open_calls.fetch_sub(1, Ordering::AcqRel);
                if successes >= self.config.success_threshold {
                    self.transition_to_closed().await;
                }
            }
            CircuitState::Open => {}
        }
    }

    async fn record_failure(&self, operation: &str) {
        let state = *self.state.read().await;
        match state {
            CircuitState::Closed => {
                let mut last = self.last_failure.write().await;
                let now = Instant::now();
                // Failures outside the window start a fresh count.
                if !matches!(*last, Some(prev) if now.duration_since(prev) <= self.config.failure_window)
                {
                    self.failure_count.store(0, Ordering::Relaxed);
                }
                *last = Some(now);
                let failures = self.failure_count.fetch_add(1, Ordering::AcqRel) + 1;
                if failures >= self.config.failure_threshold {
                    drop(last);
                    self.transition_to_open(operation).await;
                }
            }
            CircuitState::HalfOpen => {
                self.half_open_calls.fetch_sub(1, Ordering::AcqRel);
                self.transition_to_open(operation).await;
            }
            CircuitState::Open => {}
        }
    }

    async fn transition_to_open(&self, operation: &str) {
        let mut state = self.state.write().await;
        if *state != CircuitState::Open {
            *state = CircuitState::Open;
            *self.last_transition.write().await = Instant::now();
            self.times_opened.fetch_add(1, Ordering::AcqRel);
            self.success_count.store(0, Ordering::Release);
            warn!(
                operation,
                threshold = self.config.failure_threshold,
                "circuit breaker opened"
            );
        }
    }

    async fn transition_to_half_open(&self) {
        let mut state = self.state.write().await;
        if *state == CircuitState::Open {
            *state = CircuitState::HalfOpen;
            *self.last_transition.write().await = Instant::now();
            self.success_count.store(0, Ordering::Relaxed);
            self.half_open_calls.store(0, Ordering::Relaxed);
            info!("circuit breaker half-open, probing store");
        }
    }

    async fn transition_to_closed(&self) {
        let mut state = self.state.write().await;
        if *state != CircuitState::Closed {
            *state = CircuitState::Closed;
            *self.last_transition.write().await = Instant::now();
            self.failure_count.store(0, Ordering::Relaxed);
            self.success_count.store(0, Ordering::Relaxed);
            self.half_open_calls.store(0, Ordering::Relaxed);
            info!("circuit breaker closed after recovery");
        }
    }

    pub async fn state(&self) -> CircuitState {
        *self.state.read().await
    }

    pub fn stats(&self) -> CircuitBreakerStats {
        CircuitBreakerStats {
            total_calls: self.total_calls.load(Ordering::Relaxed),
            total_failures: self.total_failures.load(Ordering::Relaxed),
            current_failure_count: self.failure_count.load(Ordering::Relaxed),
            times_opened: self.times_opened.load(Ordering::Relaxed),
        }
    }
}

/// Counters for monitoring.
#[derive(Debug, Clone)]
pub struct CircuitBreakerStats {
    pub total_calls: u64,
    pub total_failures: u64,
    pub current_failure_count: u32,
    pub times_opened: u32,
}
