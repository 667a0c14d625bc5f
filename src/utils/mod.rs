//! Shared value types
//!
//! - LSN parsing and formatting
//! - PostgreSQL epoch timestamp conversion

pub mod lsn;
pub mod timestamp;

// Re-export for convenience
pub use lsn::Lsn;
pub use timestamp::PgTimestamp;
