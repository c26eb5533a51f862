//! Resilience layer for ledger store traffic
//!
//! A failing record store must degrade predictably instead of hanging or
//! cascading into the tap/purchase/spin paths. Every store call the engine
//! makes goes through [`ResilientLedger`], which routes it through a
//! [`CircuitBreaker`]: after enough consecutive store failures the circuit
//! opens and callers get an immediate, retryable
//! [`crate::error::Error::Unavailable`] instead of piling up on a dead
//! backend.

pub mod circuit_breaker;
pub mod ledger;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerStats, CircuitState};
pub use ledger::ResilientLedger;
