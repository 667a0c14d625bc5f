//! Wire protocol handling
//!
//! Framed buffers over the socket, the protocol v3 message envelope, the
//! replication sub-messages and the `pgoutput` payload parser.

pub mod buffer;
pub mod messages;
pub mod parser;

// Re-export for convenience
pub use buffer::{PayloadReader, ReadBuffer, WriteBuffer};
pub use messages::{BackendMessage, PrimaryKeepalive, StandbyStatusUpdate, XLogData};
pub use parser::{PgOutputEvent, PgOutputParser, Relation, RelationColumn, TupleData};
