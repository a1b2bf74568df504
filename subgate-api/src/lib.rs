//! Subgate API Server Library
//!
//! This library provides the HTTP surface for the Subgate failover proxy

pub mod app;
pub mod router;

// Re-export the main server function
pub use app::start_server;
