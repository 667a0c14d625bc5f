//! Core module containing configuration and error types
//!
//! These are the building blocks every other module depends on: the error
//! taxonomy, the session configuration and the connection parameters.

pub mod config;
pub mod errors;

// Re-export for convenience
pub use config::{ConnectOptions, ReplicationMode, SessionConfig};
pub use errors::{WalError, WalResult};
