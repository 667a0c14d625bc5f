//! Replication session, commands, slots and streaming
//!
//! The session owns the connection and its state machine; commands run over
//! the simple-query protocol; slot handles bind slot metadata to a session
//! at streaming time.

pub mod commands;
pub mod session;
pub mod slot;
pub mod state;

// Re-export for convenience
pub use commands::{
    CreateSlotOptions, IdentifySystem, SimpleQueryResult, SlotKind, SnapshotInitMode,
    TimelineHistory,
};
pub use session::{
    CancelHandle, ReplicationSession, ReplicationStream, SessionState, StartOption,
    StartReplication,
};
pub use slot::{
    EventStream, PgOutputSlot, RawLogicalSlot, ReplicationSlotOptions, TestDecodingSlot,
};
pub use state::WalPositions;
