//! Logical replication payload parsing
//!
//! Decodes the `pgoutput` v1 message formats carried inside `XLogData`
//! payloads, and provides the column-level tuple readers: a sequential
//! one-pass reader for large rows and a buffered random-access variant.
//!
//! <https://www.postgresql.org/docs/current/protocol-logicalrep-message-formats.html>

use bytes::Bytes;
use serde::{Serialize, Serializer};

use crate::core::errors::{WalError, WalResult};
use crate::protocol::buffer::PayloadReader;
use crate::utils::lsn::Lsn;
use crate::utils::timestamp::PgTimestamp;

/// One column value inside a replicated tuple
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TupleData {
    Null,
    /// The stored TOAST value did not change; the full value is not carried
    UnchangedToast,
    Text(Bytes),
    Binary(Bytes),
}

impl TupleData {
    pub fn is_null(&self) -> bool {
        matches!(self, TupleData::Null)
    }

    /// Text payload decoded under the session encoding, if this is text
    pub fn as_text(&self) -> Option<String> {
        match self {
            TupleData::Text(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            TupleData::Text(bytes) | TupleData::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }
}

impl Serialize for TupleData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TupleData::Null => serializer.serialize_unit_variant("TupleData", 0, "Null"),
            TupleData::UnchangedToast => {
                serializer.serialize_unit_variant("TupleData", 1, "UnchangedToast")
            }
            TupleData::Text(bytes) => serializer.serialize_newtype_variant(
                "TupleData",
                2,
                "Text",
                &String::from_utf8_lossy(bytes),
            ),
            TupleData::Binary(bytes) => {
                serializer.serialize_newtype_variant("TupleData", 3, "Binary", &bytes[..])
            }
        }
    }
}

/// Column metadata inside a `Relation` message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationColumn {
    /// Bit 0 set when the column is part of the replica identity key
    pub flags: u8,
    pub name: String,
    pub data_type_oid: u32,
    pub type_modifier: i32,
}

/// Table metadata announced before the first change touching it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relation {
    pub id: u32,
    pub namespace: String,
    pub name: String,
    pub replica_identity: u8,
    pub columns: Vec<RelationColumn>,
}

/// A data type announced by a `Type` message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeDescription {
    pub id: u32,
    pub namespace: String,
    pub name: String,
}

/// One decoded `pgoutput` v1 message.
///
/// Updates and deletes split by what the old image carries: a key-only
/// image (`'K'`), a full old row (`'O'`) or nothing.
#[derive(Debug, Clone, Serialize)]
pub enum PgOutputEvent {
    Begin {
        final_lsn: Lsn,
        commit_timestamp: PgTimestamp,
        xid: u32,
    },
    Commit {
        flags: u8,
        commit_lsn: Lsn,
        end_lsn: Lsn,
        commit_timestamp: PgTimestamp,
    },
    Origin {
        commit_lsn: Lsn,
        name: String,
    },
    Relation(Relation),
    Type(TypeDescription),
    Insert {
        relation_id: u32,
        new: Vec<TupleData>,
    },
    SimpleUpdate {
        relation_id: u32,
        new: Vec<TupleData>,
    },
    KeyUpdate {
        relation_id: u32,
        key: Vec<TupleData>,
        new: Vec<TupleData>,
    },
    FullUpdate {
        relation_id: u32,
        old: Vec<TupleData>,
        new: Vec<TupleData>,
    },
    KeyDelete {
        relation_id: u32,
        key: Vec<TupleData>,
    },
    FullDelete {
        relation_id: u32,
        old: Vec<TupleData>,
    },
    Truncate {
        /// Bit 0 = CASCADE, bit 1 = RESTART IDENTITY
        options: u8,
        relation_ids: Vec<u32>,
    },
}

impl PgOutputEvent {
    /// Relation referenced by this event, for cache lookups
    pub fn relation_id(&self) -> Option<u32> {
        match self {
            PgOutputEvent::Insert { relation_id, .. }
            | PgOutputEvent::SimpleUpdate { relation_id, .. }
            | PgOutputEvent::KeyUpdate { relation_id, .. }
            | PgOutputEvent::FullUpdate { relation_id, .. }
            | PgOutputEvent::KeyDelete { relation_id, .. }
            | PgOutputEvent::FullDelete { relation_id, .. } => Some(*relation_id),
            _ => None,
        }
    }
}

/// Parser for `pgoutput` v1 payloads
pub struct PgOutputParser;

impl PgOutputParser {
    /// Parse one `XLogData` payload into its typed event
    pub fn parse(payload: &[u8]) -> WalResult<PgOutputEvent> {
        let mut reader = PayloadReader::new(payload);
        let code = reader.read_u8()?;
        let event = match code {
            b'B' => Self::parse_begin(&mut reader)?,
            b'C' => Self::parse_commit(&mut reader)?,
            b'O' => Self::parse_origin(&mut reader)?,
            b'R' => Self::parse_relation(&mut reader)?,
            b'Y' => Self::parse_type(&mut reader)?,
            b'I' => Self::parse_insert(&mut reader)?,
            b'U' => Self::parse_update(&mut reader)?,
            b'D' => Self::parse_delete(&mut reader)?,
            b'T' => Self::parse_truncate(&mut reader)?,
            other => {
                return Err(WalError::protocol(format!(
                    "unknown pgoutput message code {:?}",
                    other as char
                )));
            }
        };
        Ok(event)
    }

    fn parse_begin(reader: &mut PayloadReader<'_>) -> WalResult<PgOutputEvent> {
        let final_lsn = Lsn(reader.read_u64()?);
        let commit_timestamp = reader.read_i64()?;
        let xid = reader.read_u32()?;
        Ok(PgOutputEvent::Begin {
            final_lsn,
            commit_timestamp,
            xid,
        })
    }

    fn parse_commit(reader: &mut PayloadReader<'_>) -> WalResult<PgOutputEvent> {
        let flags = reader.read_u8()?;
        let commit_lsn = Lsn(reader.read_u64()?);
        let end_lsn = Lsn(reader.read_u64()?);
        let commit_timestamp = reader.read_i64()?;
        Ok(PgOutputEvent::Commit {
            flags,
            commit_lsn,
            end_lsn,
            commit_timestamp,
        })
    }

    fn parse_origin(reader: &mut PayloadReader<'_>) -> WalResult<PgOutputEvent> {
        let commit_lsn = Lsn(reader.read_u64()?);
        let name = reader.read_cstring()?;
        Ok(PgOutputEvent::Origin { commit_lsn, name })
    }

    fn parse_relation(reader: &mut PayloadReader<'_>) -> WalResult<PgOutputEvent> {
        let id = reader.read_u32()?;
        let namespace = reader.read_cstring()?;
        let name = reader.read_cstring()?;
        let replica_identity = reader.read_u8()?;
        let column_count = reader.read_u16()?;

        let mut columns = Vec::with_capacity(column_count as usize);
        for _ in 0..column_count {
            let flags = reader.read_u8()?;
            let name = reader.read_cstring()?;
            let data_type_oid = reader.read_u32()?;
            let type_modifier = reader.read_i32()?;
            columns.push(RelationColumn {
                flags,
                name,
                data_type_oid,
                type_modifier,
            });
        }

        Ok(PgOutputEvent::Relation(Relation {
            id,
            namespace,
            name,
            replica_identity,
            columns,
        }))
    }

    fn parse_type(reader: &mut PayloadReader<'_>) -> WalResult<PgOutputEvent> {
        let id = reader.read_u32()?;
        let namespace = reader.read_cstring()?;
        let name = reader.read_cstring()?;
        Ok(PgOutputEvent::Type(TypeDescription {
            id,
            namespace,
            name,
        }))
    }

    fn parse_insert(reader: &mut PayloadReader<'_>) -> WalResult<PgOutputEvent> {
        let relation_id = reader.read_u32()?;
        let marker = reader.read_u8()?;
        if marker != b'N' {
            return Err(WalError::protocol(format!(
                "insert expects 'N' tuple marker, got {:?}",
                marker as char
            )));
        }
        let new = read_tuple(reader)?;
        Ok(PgOutputEvent::Insert { relation_id, new })
    }

    fn parse_update(reader: &mut PayloadReader<'_>) -> WalResult<PgOutputEvent> {
        let relation_id = reader.read_u32()?;
        let marker = reader.read_u8()?;
        match marker {
            b'K' | b'O' => {
                let old = read_tuple(reader)?;
                let next = reader.read_u8()?;
                if next != b'N' {
                    return Err(WalError::protocol(format!(
                        "update expects 'N' after old tuple, got {:?}",
                        next as char
                    )));
                }
                let new = read_tuple(reader)?;
                if marker == b'K' {
                    Ok(PgOutputEvent::KeyUpdate {
                        relation_id,
                        key: old,
                        new,
                    })
                } else {
                    Ok(PgOutputEvent::FullUpdate {
                        relation_id,
                        old,
                        new,
                    })
                }
            }
            b'N' => {
                let new = read_tuple(reader)?;
                Ok(PgOutputEvent::SimpleUpdate { relation_id, new })
            }
            other => Err(WalError::protocol(format!(
                "invalid update tuple marker {:?}",
                other as char
            ))),
        }
    }

    fn parse_delete(reader: &mut PayloadReader<'_>) -> WalResult<PgOutputEvent> {
        let relation_id = reader.read_u32()?;
        let marker = reader.read_u8()?;
        match marker {
            b'K' => {
                let key = read_tuple(reader)?;
                Ok(PgOutputEvent::KeyDelete { relation_id, key })
            }
            b'O' => {
                let old = read_tuple(reader)?;
                Ok(PgOutputEvent::FullDelete { relation_id, old })
            }
            other => Err(WalError::protocol(format!(
                "invalid delete tuple marker {:?}",
                other as char
            ))),
        }
    }

    fn parse_truncate(reader: &mut PayloadReader<'_>) -> WalResult<PgOutputEvent> {
        let relation_count = reader.read_u32()?;
        let options = reader.read_u8()?;
        let mut relation_ids = Vec::with_capacity(relation_count as usize);
        for _ in 0..relation_count {
            relation_ids.push(reader.read_u32()?);
        }
        Ok(PgOutputEvent::Truncate {
            options,
            relation_ids,
        })
    }
}

/// Read a full tuple eagerly
fn read_tuple(reader: &mut PayloadReader<'_>) -> WalResult<Vec<TupleData>> {
    let mut tuple_reader = TupleReader::new(reader)?;
    let mut columns = Vec::with_capacity(tuple_reader.column_count() as usize);
    while let Some(column) = tuple_reader.next_column()? {
        columns.push(column.into_data()?);
    }
    Ok(columns)
}

/// Sequential, one-pass reader over a tuple.
///
/// Each call to [`TupleReader::next_column`] invalidates nothing the caller
/// still holds (the payload stays in memory for the frame lifetime), but a
/// column value can only be extracted once; second reads fail with
/// `AlreadyConsumed`.
pub struct TupleReader<'r, 'a> {
    reader: &'r mut PayloadReader<'a>,
    column_count: u16,
    next_index: u16,
}

impl<'r, 'a> TupleReader<'r, 'a> {
    pub fn new(reader: &'r mut PayloadReader<'a>) -> WalResult<Self> {
        let column_count = reader.read_u16()?;
        Ok(Self {
            reader,
            column_count,
            next_index: 0,
        })
    }

    pub fn column_count(&self) -> u16 {
        self.column_count
    }

    /// Advance to the next column; `None` once the tuple is exhausted
    pub fn next_column(&mut self) -> WalResult<Option<Column<'a>>> {
        if self.next_index == self.column_count {
            return Ok(None);
        }
        self.next_index += 1;

        let kind = self.reader.read_u8()?;
        let bytes: &[u8] = match kind {
            b'n' | b'u' => &[],
            b't' | b'b' => {
                let len = self.reader.read_i32()?;
                if len < 0 {
                    return Err(WalError::protocol(format!(
                        "negative column length {len}"
                    )));
                }
                self.reader.read_bytes(len as usize)?
            }
            other => {
                return Err(WalError::protocol(format!(
                    "unknown tuple column kind {:?}",
                    other as char
                )));
            }
        };
        Ok(Some(Column {
            kind,
            bytes,
            consumed: false,
        }))
    }
}

/// Handle onto one column of a tuple
#[derive(Debug)]
pub struct Column<'a> {
    kind: u8,
    bytes: &'a [u8],
    consumed: bool,
}

impl<'a> Column<'a> {
    pub fn is_null(&self) -> bool {
        self.kind == b'n'
    }

    pub fn is_unchanged_toast(&self) -> bool {
        self.kind == b'u'
    }

    pub fn is_text(&self) -> bool {
        self.kind == b't'
    }

    pub fn is_binary(&self) -> bool {
        self.kind == b'b'
    }

    /// Value length in bytes; zero for null and unchanged-toast columns
    pub fn length(&self) -> usize {
        self.bytes.len()
    }

    fn consume(&mut self) -> WalResult<()> {
        if self.consumed {
            return Err(WalError::AlreadyConsumed);
        }
        self.consumed = true;
        Ok(())
    }

    /// Decode a text column
    pub fn read_text(&mut self) -> WalResult<String> {
        if !self.is_text() {
            return Err(WalError::invalid("column is not in text format"));
        }
        self.consume()?;
        Ok(String::from_utf8_lossy(self.bytes).into_owned())
    }

    /// Raw bytes of a text or binary column
    pub fn read_binary(&mut self) -> WalResult<Bytes> {
        if !(self.is_text() || self.is_binary()) {
            return Err(WalError::invalid("column carries no value"));
        }
        self.consume()?;
        Ok(Bytes::copy_from_slice(self.bytes))
    }

    /// Incremental reader over the column bytes.
    ///
    /// Consumes the column; the handle cannot be read again afterwards.
    pub fn open_stream(&mut self) -> WalResult<ColumnStream<'a>> {
        if !(self.is_text() || self.is_binary()) {
            return Err(WalError::invalid("column carries no value"));
        }
        self.consume()?;
        Ok(ColumnStream {
            bytes: self.bytes,
            position: 0,
        })
    }

    /// Convert into the owned representation, consuming the handle
    pub fn into_data(mut self) -> WalResult<TupleData> {
        self.consume()?;
        Ok(match self.kind {
            b'n' => TupleData::Null,
            b'u' => TupleData::UnchangedToast,
            b't' => TupleData::Text(Bytes::copy_from_slice(self.bytes)),
            _ => TupleData::Binary(Bytes::copy_from_slice(self.bytes)),
        })
    }
}

/// Byte stream over one column value
#[derive(Debug)]
pub struct ColumnStream<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl ColumnStream<'_> {
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }
}

impl std::io::Read for ColumnStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let take = self.remaining().min(buf.len());
        buf[..take].copy_from_slice(&self.bytes[self.position..self.position + take]);
        self.position += take;
        Ok(take)
    }
}

/// Random-access tuple: the whole row is materialized up front and columns
/// can be revisited freely, at the cost of the copy.
#[derive(Debug, Clone, Serialize)]
pub struct BufferedTuple {
    columns: Vec<TupleData>,
}

impl BufferedTuple {
    pub fn parse(reader: &mut PayloadReader<'_>) -> WalResult<Self> {
        Ok(Self {
            columns: read_tuple(reader)?,
        })
    }

    pub fn column(&self, index: usize) -> Option<&TupleData> {
        self.columns.get(index)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TupleData> {
        self.columns.iter()
    }

    pub fn into_columns(self) -> Vec<TupleData> {
        self.columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_cstring(buf: &mut Vec<u8>, s: &str) {
        buf.extend_from_slice(s.as_bytes());
        buf.push(0);
    }

    fn push_text_column(buf: &mut Vec<u8>, value: &str) {
        buf.push(b't');
        buf.extend_from_slice(&(value.len() as i32).to_be_bytes());
        buf.extend_from_slice(value.as_bytes());
    }

    /// Relation message for `public.t (id int4, name text)` with identity
    /// defaulting to the primary key on `id`.
    fn relation_payload() -> Vec<u8> {
        let mut buf = vec![b'R'];
        buf.extend_from_slice(&16385u32.to_be_bytes());
        push_cstring(&mut buf, "public");
        push_cstring(&mut buf, "t");
        buf.push(b'd');
        buf.extend_from_slice(&2u16.to_be_bytes());
        buf.push(1); // id is part of the key
        push_cstring(&mut buf, "id");
        buf.extend_from_slice(&23u32.to_be_bytes());
        buf.extend_from_slice(&(-1i32).to_be_bytes());
        buf.push(0);
        push_cstring(&mut buf, "name");
        buf.extend_from_slice(&25u32.to_be_bytes());
        buf.extend_from_slice(&(-1i32).to_be_bytes());
        buf
    }

    #[test]
    fn parses_begin_and_commit() {
        let mut begin = vec![b'B'];
        begin.extend_from_slice(&0x16_B374_D848u64.to_be_bytes());
        begin.extend_from_slice(&777i64.to_be_bytes());
        begin.extend_from_slice(&1234u32.to_be_bytes());
        match PgOutputParser::parse(&begin).unwrap() {
            PgOutputEvent::Begin {
                final_lsn,
                commit_timestamp,
                xid,
            } => {
                assert_eq!(final_lsn, "16/B374D848".parse().unwrap());
                assert_eq!(commit_timestamp, 777);
                assert_eq!(xid, 1234);
            }
            other => panic!("expected Begin, got {other:?}"),
        }

        let mut commit = vec![b'C', 0];
        commit.extend_from_slice(&100u64.to_be_bytes());
        commit.extend_from_slice(&200u64.to_be_bytes());
        commit.extend_from_slice(&777i64.to_be_bytes());
        match PgOutputParser::parse(&commit).unwrap() {
            PgOutputEvent::Commit {
                flags,
                commit_lsn,
                end_lsn,
                ..
            } => {
                assert_eq!(flags, 0);
                assert_eq!(commit_lsn, Lsn(100));
                assert_eq!(end_lsn, Lsn(200));
            }
            other => panic!("expected Commit, got {other:?}"),
        }
    }

    #[test]
    fn relation_then_insert_matches_column_count() {
        let relation = match PgOutputParser::parse(&relation_payload()).unwrap() {
            PgOutputEvent::Relation(rel) => rel,
            other => panic!("expected Relation, got {other:?}"),
        };
        assert_eq!(relation.id, 16385);
        assert_eq!(relation.namespace, "public");
        assert_eq!(relation.name, "t");
        assert_eq!(relation.replica_identity, b'd');
        assert_eq!(relation.columns.len(), 2);
        assert_eq!(relation.columns[0].name, "id");
        assert_eq!(relation.columns[0].flags, 1);
        assert_eq!(relation.columns[1].data_type_oid, 25);

        let mut insert = vec![b'I'];
        insert.extend_from_slice(&16385u32.to_be_bytes());
        insert.push(b'N');
        insert.extend_from_slice(&2u16.to_be_bytes());
        push_text_column(&mut insert, "1");
        push_text_column(&mut insert, "val1");

        match PgOutputParser::parse(&insert).unwrap() {
            PgOutputEvent::Insert { relation_id, new } => {
                assert_eq!(relation_id, relation.id);
                assert_eq!(new.len(), relation.columns.len());
                assert_eq!(new[0], TupleData::Text(Bytes::from_static(b"1")));
                assert_eq!(new[1].as_text().unwrap(), "val1");
            }
            other => panic!("expected Insert, got {other:?}"),
        }
    }

    #[test]
    fn simple_update_has_no_old_image() {
        let mut update = vec![b'U'];
        update.extend_from_slice(&16385u32.to_be_bytes());
        update.push(b'N');
        update.extend_from_slice(&2u16.to_be_bytes());
        push_text_column(&mut update, "1");
        push_text_column(&mut update, "val1");

        match PgOutputParser::parse(&update).unwrap() {
            PgOutputEvent::SimpleUpdate { new, .. } => {
                assert_eq!(new[0].as_text().unwrap(), "1");
                assert_eq!(new[1].as_text().unwrap(), "val1");
            }
            other => panic!("expected SimpleUpdate, got {other:?}"),
        }
    }

    #[test]
    fn key_update_carries_identity_columns() {
        // REPLICA IDENTITY USING INDEX on name: key image is [null, 'val']
        let mut update = vec![b'U'];
        update.extend_from_slice(&16385u32.to_be_bytes());
        update.push(b'K');
        update.extend_from_slice(&2u16.to_be_bytes());
        update.push(b'n');
        push_text_column(&mut update, "val");
        update.push(b'N');
        update.extend_from_slice(&2u16.to_be_bytes());
        push_text_column(&mut update, "1");
        push_text_column(&mut update, "val1");

        match PgOutputParser::parse(&update).unwrap() {
            PgOutputEvent::KeyUpdate { key, new, .. } => {
                assert_eq!(key[0], TupleData::Null);
                assert_eq!(key[1].as_text().unwrap(), "val");
                assert_eq!(new[0].as_text().unwrap(), "1");
                assert_eq!(new[1].as_text().unwrap(), "val1");
            }
            other => panic!("expected KeyUpdate, got {other:?}"),
        }
    }

    #[test]
    fn full_update_and_full_delete() {
        let mut update = vec![b'U'];
        update.extend_from_slice(&16385u32.to_be_bytes());
        update.push(b'O');
        update.extend_from_slice(&1u16.to_be_bytes());
        push_text_column(&mut update, "old");
        update.push(b'N');
        update.extend_from_slice(&1u16.to_be_bytes());
        push_text_column(&mut update, "new");

        match PgOutputParser::parse(&update).unwrap() {
            PgOutputEvent::FullUpdate { old, new, .. } => {
                assert_eq!(old[0].as_text().unwrap(), "old");
                assert_eq!(new[0].as_text().unwrap(), "new");
            }
            other => panic!("expected FullUpdate, got {other:?}"),
        }

        // REPLICA IDENTITY FULL delete of (1, 'val1')
        let mut delete = vec![b'D'];
        delete.extend_from_slice(&16385u32.to_be_bytes());
        delete.push(b'O');
        delete.extend_from_slice(&2u16.to_be_bytes());
        push_text_column(&mut delete, "1");
        push_text_column(&mut delete, "val1");

        match PgOutputParser::parse(&delete).unwrap() {
            PgOutputEvent::FullDelete { old, .. } => {
                assert_eq!(old[0].as_text().unwrap(), "1");
                assert_eq!(old[1].as_text().unwrap(), "val1");
            }
            other => panic!("expected FullDelete, got {other:?}"),
        }
    }

    #[test]
    fn key_delete_and_invalid_marker() {
        let mut delete = vec![b'D'];
        delete.extend_from_slice(&16385u32.to_be_bytes());
        delete.push(b'K');
        delete.extend_from_slice(&1u16.to_be_bytes());
        push_text_column(&mut delete, "1");

        match PgOutputParser::parse(&delete).unwrap() {
            PgOutputEvent::KeyDelete { key, .. } => {
                assert_eq!(key[0].as_text().unwrap(), "1");
            }
            other => panic!("expected KeyDelete, got {other:?}"),
        }

        let mut bad = vec![b'D'];
        bad.extend_from_slice(&16385u32.to_be_bytes());
        bad.push(b'N');
        assert!(PgOutputParser::parse(&bad).is_err());
    }

    #[test]
    fn truncate_restart_identity_cascade() {
        let mut truncate = vec![b'T'];
        truncate.extend_from_slice(&1u32.to_be_bytes());
        truncate.push(3); // CASCADE | RESTART IDENTITY
        truncate.extend_from_slice(&16385u32.to_be_bytes());

        match PgOutputParser::parse(&truncate).unwrap() {
            PgOutputEvent::Truncate {
                options,
                relation_ids,
            } => {
                assert_eq!(options, 3);
                assert_eq!(relation_ids, vec![16385]);
            }
            other => panic!("expected Truncate, got {other:?}"),
        }
    }

    #[test]
    fn origin_and_type_messages() {
        let mut origin = vec![b'O'];
        origin.extend_from_slice(&9u64.to_be_bytes());
        push_cstring(&mut origin, "origin_a");
        match PgOutputParser::parse(&origin).unwrap() {
            PgOutputEvent::Origin { commit_lsn, name } => {
                assert_eq!(commit_lsn, Lsn(9));
                assert_eq!(name, "origin_a");
            }
            other => panic!("expected Origin, got {other:?}"),
        }

        let mut ty = vec![b'Y'];
        ty.extend_from_slice(&600u32.to_be_bytes());
        push_cstring(&mut ty, "public");
        push_cstring(&mut ty, "color");
        match PgOutputParser::parse(&ty).unwrap() {
            PgOutputEvent::Type(desc) => {
                assert_eq!(desc.id, 600);
                assert_eq!(desc.name, "color");
            }
            other => panic!("expected Type, got {other:?}"),
        }
    }

    #[test]
    fn unknown_codes_are_fatal() {
        assert!(PgOutputParser::parse(b"Zxxxx").is_err());

        // unknown tuple kind 'x'
        let mut insert = vec![b'I'];
        insert.extend_from_slice(&16385u32.to_be_bytes());
        insert.push(b'N');
        insert.extend_from_slice(&1u16.to_be_bytes());
        insert.push(b'x');
        assert!(PgOutputParser::parse(&insert).is_err());
    }

    #[test]
    fn sequential_reader_consumes_once() {
        let mut tuple = Vec::new();
        tuple.extend_from_slice(&3u16.to_be_bytes());
        push_text_column(&mut tuple, "alpha");
        tuple.push(b'n');
        tuple.push(b'u');

        let mut payload = PayloadReader::new(&tuple);
        let mut reader = TupleReader::new(&mut payload).unwrap();
        assert_eq!(reader.column_count(), 3);

        let mut first = reader.next_column().unwrap().unwrap();
        assert!(first.is_text());
        assert_eq!(first.length(), 5);
        assert_eq!(first.read_text().unwrap(), "alpha");
        assert!(matches!(
            first.read_text().unwrap_err(),
            WalError::AlreadyConsumed
        ));

        let second = reader.next_column().unwrap().unwrap();
        assert!(second.is_null());
        let third = reader.next_column().unwrap().unwrap();
        assert!(third.is_unchanged_toast());
        assert!(reader.next_column().unwrap().is_none());
        assert_eq!(payload.remaining(), 0);
    }

    #[test]
    fn column_stream_reads_incrementally() {
        use std::io::Read;

        let mut tuple = Vec::new();
        tuple.extend_from_slice(&1u16.to_be_bytes());
        tuple.push(b'b');
        tuple.extend_from_slice(&4i32.to_be_bytes());
        tuple.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);

        let mut payload = PayloadReader::new(&tuple);
        let mut reader = TupleReader::new(&mut payload).unwrap();
        let mut column = reader.next_column().unwrap().unwrap();
        assert!(column.is_binary());

        let mut stream = column.open_stream().unwrap();
        let mut half = [0u8; 2];
        stream.read_exact(&mut half).unwrap();
        assert_eq!(half, [0xDE, 0xAD]);
        assert_eq!(stream.remaining(), 2);

        // stream is open, the handle itself is spent
        assert!(matches!(
            column.read_binary().unwrap_err(),
            WalError::AlreadyConsumed
        ));
    }

    #[test]
    fn buffered_tuple_allows_rereads() {
        let mut tuple = Vec::new();
        tuple.extend_from_slice(&2u16.to_be_bytes());
        push_text_column(&mut tuple, "1");
        push_text_column(&mut tuple, "val1");

        let mut payload = PayloadReader::new(&tuple);
        let buffered = BufferedTuple::parse(&mut payload).unwrap();
        assert_eq!(buffered.len(), 2);
        // any order, any number of times
        assert_eq!(buffered.column(1).unwrap().as_text().unwrap(), "val1");
        assert_eq!(buffered.column(0).unwrap().as_text().unwrap(), "1");
        assert_eq!(buffered.column(1).unwrap().as_text().unwrap(), "val1");
        assert!(buffered.column(2).is_none());
    }
}
