//! Protocol v3 message framing and replication wire messages
//!
//! Every backend message is a 1-byte ASCII tag followed by a big-endian
//! `i32` length that counts itself but not the tag. Inside `CopyBoth`, each
//! `CopyData` body carries one replication sub-message identified by its own
//! leading byte (`'w'` XLogData, `'k'` keepalive, `'r'` status update).
//!
//! <https://www.postgresql.org/docs/current/protocol-replication.html>

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::core::errors::{WalError, WalResult};
use crate::protocol::buffer::{PayloadReader, ReadBuffer, WriteBuffer};
use crate::utils::lsn::Lsn;
use crate::utils::timestamp::PgTimestamp;

/// Startup packet protocol version (3.0)
pub const PROTOCOL_VERSION: i32 = 196_608;

/// Backend message tags
pub mod backend {
    pub const AUTHENTICATION: u8 = b'R';
    pub const BACKEND_KEY_DATA: u8 = b'K';
    pub const PARAMETER_STATUS: u8 = b'S';
    pub const READY_FOR_QUERY: u8 = b'Z';
    pub const ERROR_RESPONSE: u8 = b'E';
    pub const NOTICE_RESPONSE: u8 = b'N';
    pub const ROW_DESCRIPTION: u8 = b'T';
    pub const DATA_ROW: u8 = b'D';
    pub const COMMAND_COMPLETE: u8 = b'C';
    pub const EMPTY_QUERY_RESPONSE: u8 = b'I';
    pub const COPY_BOTH_RESPONSE: u8 = b'W';
    pub const COPY_DATA: u8 = b'd';
    pub const COPY_DONE: u8 = b'c';
}

/// Authentication request sub-codes the shim understands
pub mod auth {
    pub const OK: i32 = 0;
    pub const CLEARTEXT_PASSWORD: i32 = 3;
    pub const MD5_PASSWORD: i32 = 5;
    pub const SASL: i32 = 10;
}

/// Replication sub-message tags inside `CopyData`
pub const XLOG_DATA_TAG: u8 = b'w';
pub const PRIMARY_KEEPALIVE_TAG: u8 = b'k';
pub const STANDBY_STATUS_UPDATE_TAG: u8 = b'r';
pub const HOT_STANDBY_FEEDBACK_TAG: u8 = b'h';

/// One framed backend message: tag plus body (length field stripped)
#[derive(Debug)]
pub struct BackendMessage {
    pub tag: u8,
    pub body: Bytes,
}

/// Read the next backend message envelope
pub async fn read_backend_message<R: AsyncRead + Unpin>(
    reader: &mut ReadBuffer<R>,
) -> WalResult<BackendMessage> {
    let tag = reader.read_u8().await?;
    let len = reader.read_i32().await?;
    if len < 4 {
        return Err(WalError::protocol(format!(
            "message {:?} claims length {len}",
            tag as char
        )));
    }
    let body = reader.read_bytes(len as usize - 4).await?;
    Ok(BackendMessage { tag, body })
}

// Frontend message encoders. All of these only fill the write buffer; the
// caller decides when to flush.

/// Startup packet: no tag, `i32` length, version, NUL-separated pairs
pub fn write_startup<W: AsyncWrite + Unpin>(writer: &mut WriteBuffer<W>, params: &[(&str, &str)]) {
    let mut len = 4 + 4 + 1;
    for (key, value) in params {
        len += key.len() + 1 + value.len() + 1;
    }
    writer.write_i32(len as i32);
    writer.write_i32(PROTOCOL_VERSION);
    for (key, value) in params {
        writer.write_cstring(key);
        writer.write_cstring(value);
    }
    writer.write_u8(0);
}

/// Simple `Query` message (`'Q'`)
pub fn write_query<W: AsyncWrite + Unpin>(writer: &mut WriteBuffer<W>, sql: &str) {
    writer.write_u8(b'Q');
    writer.write_i32((4 + sql.len() + 1) as i32);
    writer.write_cstring(sql);
}

/// `PasswordMessage` (`'p'`)
pub fn write_password<W: AsyncWrite + Unpin>(writer: &mut WriteBuffer<W>, password: &str) {
    writer.write_u8(b'p');
    writer.write_i32((4 + password.len() + 1) as i32);
    writer.write_cstring(password);
}

/// Frontend `CopyData` (`'d'`) wrapping one replication sub-message
pub fn write_copy_data<W: AsyncWrite + Unpin>(writer: &mut WriteBuffer<W>, body: &[u8]) {
    writer.write_u8(backend::COPY_DATA);
    writer.write_i32((4 + body.len()) as i32);
    writer.write_bytes(body);
}

/// Frontend `CopyDone` (`'c'`)
pub fn write_copy_done<W: AsyncWrite + Unpin>(writer: &mut WriteBuffer<W>) {
    writer.write_u8(backend::COPY_DONE);
    writer.write_i32(4);
}

/// `Terminate` (`'X'`)
pub fn write_terminate<W: AsyncWrite + Unpin>(writer: &mut WriteBuffer<W>) {
    writer.write_u8(b'X');
    writer.write_i32(4);
}

/// Fields of an `ErrorResponse` or `NoticeResponse`
#[derive(Debug, Clone, Default)]
pub struct ErrorFields {
    pub severity: String,
    pub code: String,
    pub message: String,
}

impl ErrorFields {
    /// Parse the field list: repeated `{type: u8, value: cstring}` pairs
    /// terminated by a zero byte.
    pub fn parse(body: &[u8]) -> WalResult<Self> {
        let mut reader = PayloadReader::new(body);
        let mut fields = ErrorFields::default();
        loop {
            let field_type = reader.read_u8()?;
            if field_type == 0 {
                break;
            }
            let value = reader.read_cstring()?;
            match field_type {
                b'S' => fields.severity = value,
                b'C' => fields.code = value,
                b'M' => fields.message = value,
                _ => {}
            }
        }
        Ok(fields)
    }

    pub fn into_error(self) -> WalError {
        WalError::Server {
            severity: self.severity,
            code: self.code,
            message: self.message,
        }
    }
}

/// `XLogData` (`'w'`): a WAL change plus the server's current WAL end
#[derive(Debug, Clone)]
pub struct XLogData {
    pub wal_start: Lsn,
    pub wal_end: Lsn,
    pub server_clock: PgTimestamp,
    /// Plugin payload; valid until the consumer advances the stream
    pub payload: Bytes,
}

impl XLogData {
    /// Parse from a `CopyData` body starting at the `'w'` tag
    pub fn parse(body: &Bytes) -> WalResult<Self> {
        if body.len() < 25 {
            return Err(WalError::protocol("XLogData shorter than its header"));
        }
        let mut reader = PayloadReader::new(body);
        reader.skip(1)?; // 'w'
        let wal_start = Lsn(reader.read_u64()?);
        let wal_end = Lsn(reader.read_u64()?);
        let server_clock = reader.read_i64()?;
        Ok(XLogData {
            wal_start,
            wal_end,
            server_clock,
            payload: body.slice(25..),
        })
    }
}

/// Primary keepalive (`'k'`)
#[derive(Debug, Clone, Copy)]
pub struct PrimaryKeepalive {
    pub wal_end: Lsn,
    pub server_clock: PgTimestamp,
    pub reply_requested: bool,
}

impl PrimaryKeepalive {
    /// Parse from a `CopyData` body starting at the `'k'` tag
    pub fn parse(body: &[u8]) -> WalResult<Self> {
        if body.len() < 18 {
            return Err(WalError::protocol("keepalive shorter than 18 bytes"));
        }
        let mut reader = PayloadReader::new(body);
        reader.skip(1)?; // 'k'
        let wal_end = Lsn(reader.read_u64()?);
        let server_clock = reader.read_i64()?;
        let reply_requested = reader.read_u8()? != 0;
        Ok(PrimaryKeepalive {
            wal_end,
            server_clock,
            reply_requested,
        })
    }
}

/// Standby status update (`'r'`), the feedback message sent to the server
#[derive(Debug, Clone, Copy)]
pub struct StandbyStatusUpdate {
    pub write_lsn: Lsn,
    pub flush_lsn: Lsn,
    pub apply_lsn: Lsn,
    pub client_clock: PgTimestamp,
    pub reply_requested: u8,
}

impl StandbyStatusUpdate {
    /// Encode the `CopyData` body: tag, three LSNs, clock, reply flag
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(34);
        body.push(STANDBY_STATUS_UPDATE_TAG);
        body.extend_from_slice(&self.write_lsn.0.to_be_bytes());
        body.extend_from_slice(&self.flush_lsn.0.to_be_bytes());
        body.extend_from_slice(&self.apply_lsn.0.to_be_bytes());
        body.extend_from_slice(&self.client_clock.to_be_bytes());
        body.push(self.reply_requested);
        body
    }

    /// Parse a body starting at the `'r'` tag (used by tests and tooling)
    pub fn parse(body: &[u8]) -> WalResult<Self> {
        if body.len() < 34 {
            return Err(WalError::protocol("status update shorter than 34 bytes"));
        }
        let mut reader = PayloadReader::new(body);
        reader.skip(1)?; // 'r'
        Ok(StandbyStatusUpdate {
            write_lsn: Lsn(reader.read_u64()?),
            flush_lsn: Lsn(reader.read_u64()?),
            apply_lsn: Lsn(reader.read_u64()?),
            client_clock: reader.read_i64()?,
            reply_requested: reader.read_u8()?,
        })
    }
}

/// Hot-standby feedback (`'h'`), the physical-replication companion of the
/// status update. Encode-only; the server never sends it.
#[derive(Debug, Clone, Copy)]
pub struct HotStandbyFeedback {
    pub client_clock: PgTimestamp,
    pub xmin: u32,
    pub epoch: u32,
    pub catalog_xmin: u32,
    pub catalog_epoch: u32,
}

impl HotStandbyFeedback {
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(25);
        body.push(HOT_STANDBY_FEEDBACK_TAG);
        body.extend_from_slice(&self.client_clock.to_be_bytes());
        body.extend_from_slice(&self.xmin.to_be_bytes());
        body.extend_from_slice(&self.epoch.to_be_bytes());
        body.extend_from_slice(&self.catalog_xmin.to_be_bytes());
        body.extend_from_slice(&self.catalog_epoch.to_be_bytes());
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn query_frame_round_trip() {
        let (client, server) = tokio::io::duplex(256);
        let mut writer = WriteBuffer::new(client);
        let mut reader = ReadBuffer::new(server);

        write_query(&mut writer, "IDENTIFY_SYSTEM");
        writer.flush().await.unwrap();

        let msg = read_backend_message(&mut reader).await.unwrap();
        assert_eq!(msg.tag, b'Q');
        assert_eq!(&msg.body[..], b"IDENTIFY_SYSTEM\0");
    }

    #[tokio::test]
    async fn startup_packet_layout() {
        let (client, server) = tokio::io::duplex(256);
        let mut writer = WriteBuffer::new(client);
        let mut reader = ReadBuffer::new(server);

        write_startup(&mut writer, &[("user", "alice"), ("replication", "database")]);
        writer.flush().await.unwrap();

        let len = reader.read_i32().await.unwrap();
        assert_eq!(reader.read_i32().await.unwrap(), PROTOCOL_VERSION);
        let rest = reader.read_bytes(len as usize - 8).await.unwrap();
        assert_eq!(&rest[..], b"user\0alice\0replication\0database\0\0");
    }

    #[test]
    fn error_fields_parse() {
        let body = b"SERROR\0C42601\0Msyntax error at or near \"TEMPORARY\"\0\0";
        let fields = ErrorFields::parse(body).unwrap();
        assert_eq!(fields.severity, "ERROR");
        assert_eq!(fields.code, "42601");
        assert!(fields.message.starts_with("syntax error"));
        assert_eq!(fields.into_error().sqlstate(), Some("42601"));
    }

    #[test]
    fn xlog_data_parse() {
        let mut body = vec![XLOG_DATA_TAG];
        body.extend_from_slice(&0x16_B374_D848u64.to_be_bytes());
        body.extend_from_slice(&0x16_B374_D900u64.to_be_bytes());
        body.extend_from_slice(&123_456i64.to_be_bytes());
        body.extend_from_slice(b"BEGIN 1234");

        let data = XLogData::parse(&Bytes::from(body)).unwrap();
        assert_eq!(data.wal_start, "16/B374D848".parse().unwrap());
        assert_eq!(data.wal_end, "16/B374D900".parse().unwrap());
        assert_eq!(data.server_clock, 123_456);
        assert_eq!(&data.payload[..], b"BEGIN 1234");
    }

    #[test]
    fn keepalive_parse() {
        let mut body = vec![PRIMARY_KEEPALIVE_TAG];
        body.extend_from_slice(&42u64.to_be_bytes());
        body.extend_from_slice(&7i64.to_be_bytes());
        body.push(1);

        let keepalive = PrimaryKeepalive::parse(&body).unwrap();
        assert_eq!(keepalive.wal_end, Lsn(42));
        assert_eq!(keepalive.server_clock, 7);
        assert!(keepalive.reply_requested);

        assert!(PrimaryKeepalive::parse(&body[..10]).is_err());
    }

    #[test]
    fn status_update_encode_layout() {
        let update = StandbyStatusUpdate {
            write_lsn: Lsn(0x10),
            flush_lsn: Lsn(0x0C),
            apply_lsn: Lsn(0x08),
            client_clock: 99,
            reply_requested: 0,
        };
        let body = update.encode();
        assert_eq!(body.len(), 34);
        assert_eq!(body[0], b'r');

        let parsed = StandbyStatusUpdate::parse(&body).unwrap();
        assert_eq!(parsed.write_lsn, Lsn(0x10));
        assert_eq!(parsed.flush_lsn, Lsn(0x0C));
        assert_eq!(parsed.apply_lsn, Lsn(0x08));
        assert_eq!(parsed.client_clock, 99);
        assert_eq!(parsed.reply_requested, 0);
    }

    #[test]
    fn hot_standby_feedback_layout() {
        let feedback = HotStandbyFeedback {
            client_clock: 1,
            xmin: 2,
            epoch: 3,
            catalog_xmin: 4,
            catalog_epoch: 5,
        };
        let body = feedback.encode();
        assert_eq!(body.len(), 25);
        assert_eq!(body[0], b'h');
    }
}
