//! The `test_decoding` output plugin
//!
//! The simplest decoder there is: every payload is one human-readable line
//! like `BEGIN 1234` or `table public.t: INSERT: id[integer]:1`.

use serde::Serialize;

use crate::core::errors::WalResult;
use crate::plugins::DecoderPlugin;
use crate::protocol::messages::XLogData;
use crate::replication::session::StartOption;
use crate::utils::lsn::Lsn;
use crate::utils::timestamp::PgTimestamp;

/// One textual event with its envelope positions
#[derive(Debug, Clone, Serialize)]
pub struct TextMessage {
    pub wal_start: Lsn,
    pub wal_end: Lsn,
    pub server_clock: PgTimestamp,
    pub text: String,
}

/// Decoder for `test_decoding` payloads
#[derive(Debug, Default)]
pub struct TestDecodingPlugin {
    options: Vec<StartOption>,
}

impl TestDecodingPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pass an extra plugin option, e.g. `include-xids` / `0`
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.push(StartOption::new(key, value));
        self
    }
}

impl DecoderPlugin for TestDecodingPlugin {
    type Event = TextMessage;

    fn output_plugin(&self) -> &'static str {
        "test_decoding"
    }

    fn start_options(&self) -> Vec<StartOption> {
        self.options.clone()
    }

    fn decode(&mut self, data: &XLogData) -> WalResult<Vec<TextMessage>> {
        Ok(vec![TextMessage {
            wal_start: data.wal_start,
            wal_end: data.wal_end,
            server_clock: data.server_clock,
            text: String::from_utf8_lossy(&data.payload).into_owned(),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn envelope(payload: &str) -> XLogData {
        XLogData {
            wal_start: "0/15E6C50".parse().unwrap(),
            wal_end: "0/15E6D00".parse().unwrap(),
            server_clock: 1,
            payload: Bytes::copy_from_slice(payload.as_bytes()),
        }
    }

    #[test]
    fn insert_transaction_round_trips_as_text() {
        let mut plugin = TestDecodingPlugin::new();
        let payloads = [
            "BEGIN 1234",
            "table public.t: INSERT: id[integer]:1 name[text]:'val1'",
            "COMMIT 1234",
        ];

        for payload in payloads {
            let events = plugin.decode(&envelope(payload)).unwrap();
            assert_eq!(events.len(), 1);
            assert_eq!(events[0].text, payload);
            assert_eq!(events[0].wal_start, "0/15E6C50".parse().unwrap());
            assert_eq!(events[0].wal_end, "0/15E6D00".parse().unwrap());
        }
    }

    #[test]
    fn extra_options_are_forwarded() {
        let plugin = TestDecodingPlugin::new()
            .with_option("include-xids", "0")
            .with_option("skip-empty-xacts", "1");
        let options = plugin.start_options();
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].key, "include-xids");
        assert_eq!(options[0].value.as_deref(), Some("0"));
        assert_eq!(plugin.output_plugin(), "test_decoding");
    }
}
