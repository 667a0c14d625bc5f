//! Client-side streaming logical replication for PostgreSQL
//!
//! walsub speaks the replication sub-protocol natively: it opens a
//! replication-mode session, manages replication slots, drives the
//! `CopyBoth` stream produced by `START_REPLICATION` and decodes the
//! logical replication payloads into typed events, while keeping the
//! server informed of progress through standby status updates.
//!
//! ```no_run
//! use walsub::{
//!     ConnectOptions, CreateSlotOptions, PgOutputSlot, ReplicationMode,
//!     ReplicationSession, SessionConfig, SlotKind,
//! };
//!
//! # async fn demo() -> walsub::WalResult<()> {
//! let options = ConnectOptions {
//!     user: "postgres".into(),
//!     database: Some("postgres".into()),
//!     ..Default::default()
//! };
//! let mut session =
//!     ReplicationSession::connect(&options, ReplicationMode::Logical, SessionConfig::default())
//!         .await?;
//!
//! let slot = session
//!     .create_replication_slot(
//!         "my_slot",
//!         SlotKind::Logical { output_plugin: "pgoutput".into() },
//!         CreateSlotOptions { temporary: true, ..Default::default() },
//!     )
//!     .await?;
//!
//! let slot = PgOutputSlot::new(slot);
//! let mut stream = slot.start_replication(&mut session, None, ["my_pub"]).await?;
//! while let Some(message) = stream.next_event().await? {
//!     println!("{:?}", message.event);
//!     stream.update_applied(message.wal_end);
//! }
//! stream.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod plugins;
pub mod protocol;
pub mod replication;
pub mod utils;

pub use crate::core::config::{ConnectOptions, ReplicationMode, SessionConfig};
pub use crate::core::errors::{WalError, WalResult};
pub use plugins::{
    DecoderPlugin, PgOutputMessage, PgOutputPlugin, TestDecodingPlugin, TextMessage,
};
pub use protocol::messages::{PrimaryKeepalive, StandbyStatusUpdate, XLogData};
pub use protocol::parser::{
    PgOutputEvent, Relation, RelationColumn, TupleData, TypeDescription,
};
pub use replication::commands::{
    CreateSlotOptions, IdentifySystem, SlotKind, SnapshotInitMode, TimelineHistory,
};
pub use replication::session::{
    CancelHandle, ReplicationSession, ReplicationStream, SessionState, StartOption,
    StartReplication,
};
pub use replication::slot::{
    EventStream, PgOutputSlot, RawLogicalSlot, ReplicationSlotOptions, TestDecodingSlot,
};
pub use utils::lsn::Lsn;
pub use utils::timestamp::PgTimestamp;
