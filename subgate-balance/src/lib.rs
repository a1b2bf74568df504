//! Subgate Balance Library
//!
//! This library provides the failover engine for Subgate including:
//! - Dynamic weight computation from live backend statistics
//! - Weighted random selection
//! - The enabled/disabled health state machine with time-based auto-recovery
//! - Sequential failover execution with per-attempt bookkeeping

pub mod balance;

// Re-export commonly used types
pub use balance::{
    dynamic_weight, rank_by_weight, select_weighted, sweep_disabled_backends,
    sweep_disabled_backends_at, BackendRegistry, FailoverService, HttpForwarder, MemoryRegistry,
    ProxyRequest, ProxyResponse, RequestForwarder, ServedResponse,
};
