//! Output plugin decoders
//!
//! A decoder turns raw `XLogData` payloads into plugin-specific typed
//! events. Decoders may keep per-session state; the `pgoutput` decoder
//! caches relation metadata announced on the stream.

pub mod pgoutput;
pub mod test_decoding;

use crate::core::errors::WalResult;
use crate::protocol::messages::XLogData;
use crate::replication::session::StartOption;

/// A logical decoding output plugin on the client side
pub trait DecoderPlugin {
    /// Event type produced by this decoder
    type Event;

    /// Server-side plugin name used in `CREATE_REPLICATION_SLOT`
    fn output_plugin(&self) -> &'static str;

    /// Options appended to `START_REPLICATION`, in emission order
    fn start_options(&self) -> Vec<StartOption>;

    /// Decode one envelope into zero or more events
    fn decode(&mut self, data: &XLogData) -> WalResult<Vec<Self::Event>>;
}

// Re-export for convenience
pub use pgoutput::{PgOutputMessage, PgOutputPlugin, RelationCache};
pub use test_decoding::{TestDecodingPlugin, TextMessage};
