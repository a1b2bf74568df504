//! Subgate Core Library
//!
//! This library provides core functionality for the Subgate proxy including:
//! - Configuration management
//! - Shared backend/snapshot types
//! - Error taxonomy

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::model::{Config, Settings};
pub use error::{FailoverError, ForwardError};
pub use types::{Attempt, Backend, BackendSpec, BackendUpdate, RequestSnapshot};
