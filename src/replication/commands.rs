//! Replication commands over the simple-query protocol
//!
//! `IDENTIFY_SYSTEM`, `SHOW`, `CREATE_REPLICATION_SLOT`,
//! `DROP_REPLICATION_SLOT` and `TIMELINE_HISTORY` all run as plain `Query`
//! messages; the walsender answers with ordinary row sets. This module
//! drives that exchange and builds the command text, including the mapping
//! of `42601` syntax errors back to the version-gated option that caused
//! them on old servers.

use tracing::{debug, info};

use crate::core::errors::{SQLSTATE_SYNTAX_ERROR, WalError, WalResult};
use crate::protocol::buffer::PayloadReader;
use crate::protocol::messages::{self, ErrorFields, backend};
use crate::replication::session::ReplicationSession;
use crate::replication::slot::ReplicationSlotOptions;
use crate::utils::lsn::Lsn;

/// Result of one simple-query command
#[derive(Debug, Default)]
pub struct SimpleQueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
    pub command_tag: Option<String>,
}

/// Result of `IDENTIFY_SYSTEM`
#[derive(Debug, Clone)]
pub struct IdentifySystem {
    pub system_id: String,
    pub timeline: u32,
    pub xlogpos: Lsn,
    pub db_name: Option<String>,
}

/// Result of `TIMELINE_HISTORY`
#[derive(Debug, Clone)]
pub struct TimelineHistory {
    pub filename: String,
    pub content: String,
}

/// What kind of slot to create
#[derive(Debug, Clone)]
pub enum SlotKind {
    Physical,
    Logical { output_plugin: String },
}

/// How `CREATE_REPLICATION_SLOT` initializes its snapshot.
///
/// Omitted entirely when the caller wants the server default (`Export`);
/// that also keeps the command valid on pre-10 servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotInitMode {
    Export,
    Use,
    NoExport,
}

/// Options for `CREATE_REPLICATION_SLOT`
#[derive(Debug, Clone, Default)]
pub struct CreateSlotOptions {
    pub temporary: bool,
    /// Decode prepared transactions (logical slots, server 15+)
    pub two_phase: bool,
    /// Reserve WAL immediately (physical slots)
    pub reserve_wal: bool,
    pub snapshot_init_mode: Option<SnapshotInitMode>,
}

impl ReplicationSession {
    /// Run one command through the simple-query protocol.
    ///
    /// A server error is returned only after the exchange reached
    /// `ReadyForQuery`, so the session stays usable.
    pub async fn simple_query(&mut self, sql: &str) -> WalResult<SimpleQueryResult> {
        self.require_ready("simple query")?;
        debug!(%sql, "executing command");

        {
            let mut writer = self.writer.lock().await;
            messages::write_query(&mut writer, sql);
            writer.flush().await?;
        }

        let mut result = SimpleQueryResult::default();
        let mut server_error: Option<WalError> = None;

        loop {
            let msg = self.read_message().await?;
            match msg.tag {
                backend::ROW_DESCRIPTION => {
                    let mut reader = PayloadReader::new(&msg.body);
                    let count = reader.read_u16()?;
                    let mut columns = Vec::with_capacity(count as usize);
                    for _ in 0..count {
                        columns.push(reader.read_cstring()?);
                        reader.skip(4 + 2 + 4 + 2 + 4 + 2)?; // table oid..format code
                    }
                    result.columns = columns;
                }
                backend::DATA_ROW => {
                    let mut reader = PayloadReader::new(&msg.body);
                    let count = reader.read_u16()?;
                    let mut row = Vec::with_capacity(count as usize);
                    for _ in 0..count {
                        let len = reader.read_i32()?;
                        if len < 0 {
                            row.push(None);
                        } else {
                            let raw = reader.read_bytes(len as usize)?;
                            row.push(Some(String::from_utf8_lossy(raw).into_owned()));
                        }
                    }
                    result.rows.push(row);
                }
                backend::COMMAND_COMPLETE => {
                    let mut reader = PayloadReader::new(&msg.body);
                    result.command_tag = Some(reader.read_cstring()?);
                }
                backend::EMPTY_QUERY_RESPONSE => {}
                backend::READY_FOR_QUERY => break,
                backend::ERROR_RESPONSE => {
                    server_error = Some(ErrorFields::parse(&msg.body)?.into_error());
                }
                backend::NOTICE_RESPONSE => self.log_notice(&msg.body),
                backend::PARAMETER_STATUS => self.record_parameter(&msg.body)?,
                other => {
                    return self.fail(WalError::protocol(format!(
                        "unexpected message {:?} in simple query",
                        other as char
                    )));
                }
            }
        }

        match server_error {
            Some(err) => Err(err),
            None => Ok(result),
        }
    }

    /// `IDENTIFY_SYSTEM`: the server's identity, timeline and WAL position
    pub async fn identify_system(&mut self) -> WalResult<IdentifySystem> {
        let result = self.simple_query("IDENTIFY_SYSTEM").await?;
        parse_identify_system(&result)
    }

    /// `SHOW <name>`: read one server setting
    pub async fn show(&mut self, name: &str) -> WalResult<String> {
        if name.is_empty() {
            return Err(WalError::invalid("setting name must not be empty"));
        }
        let result = self.simple_query(&format!("SHOW {name}")).await?;
        result
            .rows
            .first()
            .and_then(|row| row.first())
            .and_then(Clone::clone)
            .ok_or_else(|| WalError::protocol(format!("SHOW {name} returned no value")))
    }

    /// `CREATE_REPLICATION_SLOT`.
    ///
    /// On servers older than 10, `TEMPORARY` and the non-default snapshot
    /// modes do not parse; the resulting syntax error is mapped to
    /// [`WalError::UnsupportedByServerVersion`] naming the option, and the
    /// session remains usable.
    pub async fn create_replication_slot(
        &mut self,
        name: &str,
        kind: SlotKind,
        options: CreateSlotOptions,
    ) -> WalResult<ReplicationSlotOptions> {
        let sql = build_create_slot_command(name, &kind, &options)?;
        info!(command = %sql, "creating replication slot");

        let server_version = self.server_version().map(str::to_string);
        match self.simple_query(&sql).await {
            Ok(result) => parse_create_slot_row(&result),
            Err(err) => Err(map_create_slot_error(
                err,
                &options,
                server_version.as_deref(),
            )),
        }
    }

    /// `DROP_REPLICATION_SLOT`; `wait` blocks until the slot is unused
    pub async fn drop_replication_slot(&mut self, name: &str, wait: bool) -> WalResult<()> {
        if name.is_empty() {
            return Err(WalError::invalid("slot name must not be empty"));
        }
        let mut sql = format!("DROP_REPLICATION_SLOT {}", quote_ident(name));
        if wait {
            sql.push_str(" WAIT");
        }
        info!(command = %sql, "dropping replication slot");
        self.simple_query(&sql).await.map(|_| ())
    }

    /// `TIMELINE_HISTORY <n>`: fetch one timeline history file
    pub async fn timeline_history(&mut self, timeline: u32) -> WalResult<TimelineHistory> {
        let result = self
            .simple_query(&format!("TIMELINE_HISTORY {timeline}"))
            .await?;
        let row = result
            .rows
            .first()
            .ok_or_else(|| WalError::protocol("TIMELINE_HISTORY returned no rows"))?;
        Ok(TimelineHistory {
            filename: required_field(row, 0, "filename")?,
            content: required_field(row, 1, "content")?,
        })
    }
}

fn required_field(row: &[Option<String>], index: usize, what: &str) -> WalResult<String> {
    row.get(index)
        .and_then(Clone::clone)
        .ok_or_else(|| WalError::protocol(format!("missing {what} in command result")))
}

pub(crate) fn parse_identify_system(result: &SimpleQueryResult) -> WalResult<IdentifySystem> {
    let row = result
        .rows
        .first()
        .ok_or_else(|| WalError::protocol("IDENTIFY_SYSTEM returned no rows"))?;
    let timeline = required_field(row, 1, "timeline")?;
    let xlogpos = required_field(row, 2, "xlogpos")?;
    Ok(IdentifySystem {
        system_id: required_field(row, 0, "systemid")?,
        timeline: timeline
            .parse()
            .map_err(|_| WalError::protocol(format!("bad timeline {timeline:?}")))?,
        xlogpos: xlogpos.parse()?,
        db_name: row.get(3).and_then(Clone::clone),
    })
}

pub(crate) fn parse_create_slot_row(
    result: &SimpleQueryResult,
) -> WalResult<ReplicationSlotOptions> {
    let row = result
        .rows
        .first()
        .ok_or_else(|| WalError::protocol("CREATE_REPLICATION_SLOT returned no rows"))?;
    let consistent_point = required_field(row, 1, "consistent_point")?;
    Ok(ReplicationSlotOptions {
        slot_name: required_field(row, 0, "slot_name")?,
        consistent_point: consistent_point.parse()?,
        snapshot_name: row.get(2).and_then(Clone::clone),
        output_plugin: row.get(3).and_then(Clone::clone),
    })
}

/// Build the `CREATE_REPLICATION_SLOT` command text.
///
/// The grammar is
/// `CREATE_REPLICATION_SLOT <name> [TEMPORARY]
///  {PHYSICAL [RESERVE_WAL] | LOGICAL <plugin> [TWO_PHASE]
///   [USE_SNAPSHOT|NOEXPORT_SNAPSHOT]}`;
/// the default snapshot mode is never spelled out.
pub(crate) fn build_create_slot_command(
    name: &str,
    kind: &SlotKind,
    options: &CreateSlotOptions,
) -> WalResult<String> {
    if name.is_empty() {
        return Err(WalError::invalid("slot name must not be empty"));
    }

    let mut sql = format!("CREATE_REPLICATION_SLOT {}", quote_ident(name));
    if options.temporary {
        sql.push_str(" TEMPORARY");
    }
    match kind {
        SlotKind::Physical => {
            if options.snapshot_init_mode.is_some() {
                return Err(WalError::invalid(
                    "snapshot modes apply to logical slots only",
                ));
            }
            if options.two_phase {
                return Err(WalError::invalid("TWO_PHASE applies to logical slots only"));
            }
            sql.push_str(" PHYSICAL");
            if options.reserve_wal {
                sql.push_str(" RESERVE_WAL");
            }
        }
        SlotKind::Logical { output_plugin } => {
            if output_plugin.is_empty() {
                return Err(WalError::invalid("output plugin must not be empty"));
            }
            if options.reserve_wal {
                return Err(WalError::invalid(
                    "RESERVE_WAL applies to physical slots only",
                ));
            }
            sql.push_str(&format!(" LOGICAL {output_plugin}"));
            if options.two_phase {
                sql.push_str(" TWO_PHASE");
            }
            match options.snapshot_init_mode {
                Some(SnapshotInitMode::Use) => sql.push_str(" USE_SNAPSHOT"),
                Some(SnapshotInitMode::NoExport) => sql.push_str(" NOEXPORT_SNAPSHOT"),
                // server default; omitted so pre-10 servers still parse it
                Some(SnapshotInitMode::Export) | None => {}
            }
        }
    }
    Ok(sql)
}

/// Turn the syntax error an old server raises for an unknown keyword into
/// a typed error naming the option the server cannot accept.
pub(crate) fn map_create_slot_error(
    err: WalError,
    options: &CreateSlotOptions,
    server_version: Option<&str>,
) -> WalError {
    if err.sqlstate() != Some(SQLSTATE_SYNTAX_ERROR) {
        return err;
    }
    let Some(version) = server_version else {
        return err;
    };
    let Some(major) = server_version_major(version) else {
        return err;
    };

    if major < 10 {
        if options.temporary {
            return WalError::UnsupportedByServerVersion {
                option: "TEMPORARY",
                server_version: version.to_string(),
            };
        }
        match options.snapshot_init_mode {
            Some(SnapshotInitMode::Use) => {
                return WalError::UnsupportedByServerVersion {
                    option: "USE_SNAPSHOT",
                    server_version: version.to_string(),
                };
            }
            Some(SnapshotInitMode::NoExport) => {
                return WalError::UnsupportedByServerVersion {
                    option: "NOEXPORT_SNAPSHOT",
                    server_version: version.to_string(),
                };
            }
            _ => {}
        }
    }
    if major < 15 && options.two_phase {
        return WalError::UnsupportedByServerVersion {
            option: "TWO_PHASE",
            server_version: version.to_string(),
        };
    }
    err
}

/// Leading major number of a `server_version` string; handles forms like
/// `9.6.24`, `16.2 (Debian 16.2-1.pgdg120+2)` and `13beta1`.
pub(crate) fn server_version_major(version: &str) -> Option<u32> {
    let digits: String = version.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Double-quote an identifier
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Single-quote a literal
pub(crate) fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
