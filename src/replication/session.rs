//! Replication session
//!
//! Owns the connection for its whole life: startup and authentication,
//! replication commands, and the `CopyBoth` streaming loop with its
//! keepalive writer.
//!
//! One task drives the read side. The keepalive timer is a second writer on
//! the same socket; both writers go through a mutex held only for the
//! duration of one small status message.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::AsyncWrite;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::config::{ConnectOptions, ReplicationMode, SessionConfig};
use crate::core::errors::{SQLSTATE_QUERY_CANCELED, WalError, WalResult};
use crate::protocol::buffer::{PayloadReader, ReadBuffer, WriteBuffer};
use crate::protocol::messages::{
    self, BackendMessage, ErrorFields, HotStandbyFeedback, PrimaryKeepalive, XLogData, auth,
    backend, read_backend_message,
};
use crate::replication::commands::{quote_ident, quote_literal};
use crate::replication::state::WalPositions;
use crate::utils::lsn::Lsn;

/// Connection lifecycle.
///
/// `Closed` is terminal; a session that hit a wire-level error cannot be
/// reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Connecting,
    Authenticating,
    Ready,
    Streaming,
    Draining,
}

/// One option in the `START_REPLICATION ... (...)` list.
///
/// Keys are emitted double-quoted, values single-quoted; an option without
/// a value is emitted as the bare quoted key.
#[derive(Debug, Clone)]
pub struct StartOption {
    pub key: String,
    pub value: Option<String>,
}

impl StartOption {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }

    pub fn flag(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum StartKind {
    Logical { options: Vec<StartOption> },
    Physical { timeline: Option<u32> },
}

/// A fully resolved `START_REPLICATION` command
#[derive(Debug, Clone)]
pub struct StartReplication {
    pub slot_name: Option<String>,
    pub wal_location: Lsn,
    pub kind: StartKind,
}

impl StartReplication {
    pub fn logical(
        slot_name: impl Into<String>,
        wal_location: Lsn,
        options: Vec<StartOption>,
    ) -> Self {
        Self {
            slot_name: Some(slot_name.into()),
            wal_location,
            kind: StartKind::Logical { options },
        }
    }

    pub fn physical(
        slot_name: Option<String>,
        wal_location: Lsn,
        timeline: Option<u32>,
    ) -> Self {
        Self {
            slot_name,
            wal_location,
            kind: StartKind::Physical { timeline },
        }
    }

    pub(crate) fn to_command(&self) -> WalResult<String> {
        let mut sql = String::from("START_REPLICATION");
        match &self.kind {
            StartKind::Logical { options } => {
                let slot = self
                    .slot_name
                    .as_deref()
                    .ok_or_else(|| WalError::invalid("logical replication requires a slot"))?;
                if slot.is_empty() {
                    return Err(WalError::invalid("slot name must not be empty"));
                }
                sql.push_str(&format!(" SLOT {} LOGICAL {}", quote_ident(slot), self.wal_location));
                if !options.is_empty() {
                    let rendered: Vec<String> = options
                        .iter()
                        .map(|opt| match &opt.value {
                            Some(value) => {
                                format!("{} {}", quote_ident(&opt.key), quote_literal(value))
                            }
                            None => quote_ident(&opt.key),
                        })
                        .collect();
                    sql.push_str(&format!(" ({})", rendered.join(", ")));
                }
            }
            StartKind::Physical { timeline } => {
                if let Some(slot) = self.slot_name.as_deref() {
                    if slot.is_empty() {
                        return Err(WalError::invalid("slot name must not be empty"));
                    }
                    sql.push_str(&format!(" SLOT {}", quote_ident(slot)));
                }
                sql.push_str(&format!(" PHYSICAL {}", self.wal_location));
                if let Some(timeline) = timeline {
                    sql.push_str(&format!(" TIMELINE {timeline}"));
                }
            }
        }
        Ok(sql)
    }
}

pub(crate) type SharedWriter = Arc<Mutex<WriteBuffer<OwnedWriteHalf>>>;

/// A replication-mode connection to one server
pub struct ReplicationSession {
    pub(crate) reader: ReadBuffer<OwnedReadHalf>,
    pub(crate) writer: SharedWriter,
    pub(crate) state: SessionState,
    config: SessionConfig,
    mode: ReplicationMode,
    parameters: HashMap<String, String>,
    backend_pid: Option<i32>,
    backend_secret: Option<i32>,
    positions: Arc<WalPositions>,
}

impl ReplicationSession {
    /// Open a replication-mode session.
    ///
    /// Drives the startup packet, the authentication exchange and the
    /// parameter pipeline through to `ReadyForQuery`. Cancelling the
    /// returned future mid-way abandons the connection.
    pub async fn connect(
        options: &ConnectOptions,
        mode: ReplicationMode,
        config: SessionConfig,
    ) -> WalResult<Self> {
        if mode == ReplicationMode::Logical && options.database.is_none() {
            return Err(WalError::invalid(
                "logical replication requires a database",
            ));
        }

        info!(host = %options.host, port = options.port, user = %options.user, "connecting");
        let stream = TcpStream::connect((options.host.as_str(), options.port)).await?;
        stream.set_nodelay(true)?;
        let (read_half, write_half) = stream.into_split();

        let mut session = Self {
            reader: ReadBuffer::new(read_half),
            writer: Arc::new(Mutex::new(WriteBuffer::new(write_half))),
            state: SessionState::Connecting,
            config,
            mode,
            parameters: HashMap::new(),
            backend_pid: None,
            backend_secret: None,
            positions: Arc::new(WalPositions::default()),
        };

        session.send_startup(options).await?;
        session.state = SessionState::Authenticating;
        session.authenticate(options.password.as_deref()).await?;
        session.state = SessionState::Ready;

        info!(
            server_version = session.parameter("server_version").unwrap_or("?"),
            "replication session ready"
        );
        Ok(session)
    }

    async fn send_startup(&mut self, options: &ConnectOptions) -> WalResult<()> {
        let mut params: Vec<(&str, &str)> = vec![("user", options.user.as_str())];
        if let Some(database) = options.database.as_deref() {
            params.push(("database", database));
        }
        params.push(("replication", self.mode.startup_value()));
        params.push(("client_encoding", self.config.client_encoding.as_str()));
        if let Some(name) = self.config.application_name.as_deref() {
            params.push(("application_name", name));
        }
        if let Some(extra) = options.options.as_deref() {
            params.push(("options", extra));
        }

        let mut writer = self.writer.lock().await;
        messages::write_startup(&mut writer, &params);
        writer.flush().await
    }

    /// Consume authentication requests, then the parameter pipeline, until
    /// `ReadyForQuery`. Only trust-style and cleartext-password exchanges
    /// are handled here; SCRAM and MD5 live behind the TLS/auth collaborator
    /// boundary.
    async fn authenticate(&mut self, password: Option<&str>) -> WalResult<()> {
        loop {
            let msg = self.read_message().await?;
            match msg.tag {
                backend::AUTHENTICATION => {
                    let mut reader = PayloadReader::new(&msg.body);
                    match reader.read_i32()? {
                        auth::OK => break,
                        auth::CLEARTEXT_PASSWORD => {
                            let password = password.ok_or_else(|| {
                                WalError::invalid("server requires a password")
                            })?;
                            let mut writer = self.writer.lock().await;
                            messages::write_password(&mut writer, password);
                            writer.flush().await?;
                        }
                        auth::MD5_PASSWORD => {
                            return self.fail(WalError::protocol(
                                "MD5 password authentication is not supported",
                            ));
                        }
                        auth::SASL => {
                            return self.fail(WalError::protocol(
                                "SASL authentication is not supported",
                            ));
                        }
                        code => {
                            return self.fail(WalError::protocol(format!(
                                "unknown authentication request {code}"
                            )));
                        }
                    }
                }
                backend::ERROR_RESPONSE => {
                    return self.fail(ErrorFields::parse(&msg.body)?.into_error());
                }
                backend::NOTICE_RESPONSE => self.log_notice(&msg.body),
                other => {
                    return self.fail(unexpected_tag("authentication", other));
                }
            }
        }

        loop {
            let msg = self.read_message().await?;
            match msg.tag {
                backend::PARAMETER_STATUS => self.record_parameter(&msg.body)?,
                backend::BACKEND_KEY_DATA => {
                    let mut reader = PayloadReader::new(&msg.body);
                    self.backend_pid = Some(reader.read_i32()?);
                    self.backend_secret = Some(reader.read_i32()?);
                }
                backend::READY_FOR_QUERY => return Ok(()),
                backend::ERROR_RESPONSE => {
                    return self.fail(ErrorFields::parse(&msg.body)?.into_error());
                }
                backend::NOTICE_RESPONSE => self.log_notice(&msg.body),
                other => return self.fail(unexpected_tag("startup", other)),
            }
        }
    }

    pub(crate) fn fail<T>(&mut self, err: WalError) -> WalResult<T> {
        self.state = SessionState::Closed;
        Err(err)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// A parameter the server reported during startup (or later), e.g.
    /// `server_version`, `integer_datetimes`, `client_encoding`,
    /// `DateStyle`, `TimeZone`.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    pub fn server_version(&self) -> Option<&str> {
        self.parameter("server_version")
    }

    /// Backend process id from `BackendKeyData`
    pub fn backend_pid(&self) -> Option<i32> {
        self.backend_pid
    }

    /// Cancellation secret from `BackendKeyData`
    pub fn backend_secret(&self) -> Option<i32> {
        self.backend_secret
    }

    /// WAL positions reported in feedback; shared with the keepalive task
    pub fn positions(&self) -> Arc<WalPositions> {
        Arc::clone(&self.positions)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub(crate) fn require_ready(&self, operation: &str) -> WalResult<()> {
        if self.state != SessionState::Ready {
            return Err(WalError::invalid(format!(
                "{operation} requires a ready session, state is {:?}",
                self.state
            )));
        }
        Ok(())
    }

    /// Read one framed message; wire-level failures close the session
    pub(crate) async fn read_message(&mut self) -> WalResult<BackendMessage> {
        match read_backend_message(&mut self.reader).await {
            Ok(msg) => Ok(msg),
            Err(err) => {
                self.state = SessionState::Closed;
                Err(err)
            }
        }
    }

    pub(crate) fn record_parameter(&mut self, body: &[u8]) -> WalResult<()> {
        let mut reader = PayloadReader::new(body);
        let name = reader.read_cstring()?;
        let value = reader.read_cstring()?;
        debug!(%name, %value, "parameter status");
        self.parameters.insert(name, value);
        Ok(())
    }

    pub(crate) fn log_notice(&self, body: &[u8]) {
        if let Ok(fields) = ErrorFields::parse(body) {
            debug!(severity = %fields.severity, message = %fields.message, "server notice");
        }
    }

    /// Issue `START_REPLICATION` and enter `CopyBoth`.
    ///
    /// At most one stream can exist per session; the exclusive borrow
    /// enforces it. Any response other than `CopyBothResponse` (or a server
    /// error) is a fatal protocol error.
    pub async fn start_replication(
        &mut self,
        command: StartReplication,
    ) -> WalResult<ReplicationStream<'_>> {
        self.require_ready("START_REPLICATION")?;
        let sql = command.to_command()?;
        info!(command = %sql, "starting replication");

        {
            let mut writer = self.writer.lock().await;
            messages::write_query(&mut writer, &sql);
            writer.flush().await?;
        }

        loop {
            let msg = self.read_message().await?;
            match msg.tag {
                backend::COPY_BOTH_RESPONSE => break,
                backend::ERROR_RESPONSE => {
                    let err = ErrorFields::parse(&msg.body)?.into_error();
                    self.drain_to_ready().await?;
                    return Err(err);
                }
                backend::NOTICE_RESPONSE => self.log_notice(&msg.body),
                backend::PARAMETER_STATUS => self.record_parameter(&msg.body)?,
                other => {
                    return self.fail(unexpected_tag("START_REPLICATION", other));
                }
            }
        }

        self.state = SessionState::Streaming;
        let keepalive = self.config.keepalive_on_idle.then(|| {
            spawn_keepalive(
                Arc::clone(&self.writer),
                Arc::clone(&self.positions),
                self.config.wal_receiver_status_interval(),
            )
        });

        Ok(ReplicationStream {
            session: self,
            keepalive,
            cancel: Arc::new(AtomicBool::new(false)),
            finished: false,
        })
    }

    /// Read messages until `ReadyForQuery`, discarding stragglers. Used on
    /// every path that leaves `CopyBoth` or recovers from a server error.
    pub(crate) async fn drain_to_ready(&mut self) -> WalResult<()> {
        loop {
            let msg = self.read_message().await?;
            match msg.tag {
                backend::READY_FOR_QUERY => {
                    self.state = SessionState::Ready;
                    return Ok(());
                }
                backend::COMMAND_COMPLETE
                | backend::COPY_DATA
                | backend::COPY_DONE
                | backend::EMPTY_QUERY_RESPONSE
                | backend::ROW_DESCRIPTION
                | backend::DATA_ROW => {}
                backend::PARAMETER_STATUS => self.record_parameter(&msg.body)?,
                backend::NOTICE_RESPONSE => self.log_notice(&msg.body),
                backend::ERROR_RESPONSE => {
                    // already on an ending path; note it and keep draining
                    if let Ok(fields) = ErrorFields::parse(&msg.body) {
                        warn!(code = %fields.code, message = %fields.message, "error while draining");
                    }
                }
                other => return self.fail(unexpected_tag("drain", other)),
            }
        }
    }

    /// Politely end the session. Sends `Terminate` and shuts the socket
    /// down; the session is unusable afterwards.
    pub async fn close(mut self) -> WalResult<()> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        self.state = SessionState::Closed;
        let mut writer = self.writer.lock().await;
        messages::write_terminate(&mut writer);
        writer.shutdown().await
    }
}

/// Requests cooperative cancellation of a running stream from another task.
///
/// Takes effect between message reads: the stream notices the flag, runs
/// the `CopyDone` handshake and surfaces [`WalError::Cancelled`] once.
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// The raw event stream produced by `START_REPLICATION`.
///
/// Yields `XLogData` envelopes until the consumer stops it or the server
/// ends the copy. Keepalives are answered inline; an envelope is never
/// surfaced before a requested reply has been written.
pub struct ReplicationStream<'a> {
    session: &'a mut ReplicationSession,
    keepalive: Option<JoinHandle<()>>,
    cancel: Arc<AtomicBool>,
    finished: bool,
}

impl ReplicationStream<'_> {
    /// Handle other tasks can use to request cancellation
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(Arc::clone(&self.cancel))
    }

    /// Next `XLogData` envelope, or `None` once the stream ended cleanly.
    ///
    /// A `ServerError` ends the stream but leaves the session ready again;
    /// SQLSTATE 57014 (query canceled) counts as a clean end. Wire-level
    /// errors close the session.
    pub async fn next_envelope(&mut self) -> WalResult<Option<XLogData>> {
        if self.finished {
            return Ok(None);
        }
        loop {
            if self.cancel.load(Ordering::SeqCst) {
                self.finish();
                info!("stream cancelled by consumer");
                self.shutdown_copy().await?;
                return Err(WalError::Cancelled);
            }
            let msg = match self.session.read_message().await {
                Ok(msg) => msg,
                Err(err) => {
                    self.finish();
                    return Err(err);
                }
            };
            match msg.tag {
                backend::COPY_DATA => {
                    let sub = match msg.body.first() {
                        Some(&sub) => sub,
                        None => {
                            self.finish();
                            return self.session.fail(WalError::protocol("empty CopyData"));
                        }
                    };
                    match sub {
                        messages::XLOG_DATA_TAG => {
                            let data = match XLogData::parse(&msg.body) {
                                Ok(data) => data,
                                Err(err) => {
                                    self.finish();
                                    return self.session.fail(err);
                                }
                            };
                            self.session.positions.observe(data.wal_start);
                            self.session.positions.observe(data.wal_end);
                            debug!(
                                wal_start = %data.wal_start,
                                wal_end = %data.wal_end,
                                len = data.payload.len(),
                                "XLogData"
                            );
                            return Ok(Some(data));
                        }
                        messages::PRIMARY_KEEPALIVE_TAG => {
                            let keepalive = match PrimaryKeepalive::parse(&msg.body) {
                                Ok(keepalive) => keepalive,
                                Err(err) => {
                                    self.finish();
                                    return self.session.fail(err);
                                }
                            };
                            self.session.positions.observe(keepalive.wal_end);
                            debug!(
                                wal_end = %keepalive.wal_end,
                                reply_requested = keepalive.reply_requested,
                                "keepalive"
                            );
                            if keepalive.reply_requested {
                                if let Err(err) =
                                    send_status(&self.session.writer, &self.session.positions, false)
                                        .await
                                {
                                    self.finish();
                                    return self.session.fail(err);
                                }
                            }
                        }
                        other => {
                            self.finish();
                            return self.session.fail(WalError::protocol(format!(
                                "unknown replication sub-message {:?}",
                                other as char
                            )));
                        }
                    }
                }
                backend::COPY_DONE => {
                    // server-initiated end: acknowledge, then drain out.
                    // The keepalive writer must not slip a CopyData in
                    // after our CopyDone.
                    self.stop_keepalive();
                    debug!("server ended the copy stream");
                    self.session.state = SessionState::Draining;
                    {
                        let mut writer = self.session.writer.lock().await;
                        messages::write_copy_done(&mut writer);
                        writer.flush().await?;
                    }
                    let drained = self.session.drain_to_ready().await;
                    self.finish();
                    drained?;
                    return Ok(None);
                }
                backend::ERROR_RESPONSE => {
                    self.stop_keepalive();
                    let err = ErrorFields::parse(&msg.body)?.into_error();
                    self.session.state = SessionState::Draining;
                    let drained = self.session.drain_to_ready().await;
                    self.finish();
                    drained?;
                    if err.sqlstate() == Some(SQLSTATE_QUERY_CANCELED) {
                        debug!("stream canceled by server, treating as end");
                        return Ok(None);
                    }
                    return Err(err);
                }
                backend::NOTICE_RESPONSE => self.session.log_notice(&msg.body),
                backend::PARAMETER_STATUS => self.session.record_parameter(&msg.body)?,
                other => {
                    self.finish();
                    return self.session.fail(unexpected_tag("CopyBoth", other));
                }
            }
        }
    }

    /// Report progress: WAL up to `lsn` has been handed to the consumer
    pub fn update_applied(&self, lsn: Lsn) {
        self.session.positions.advance_applied(lsn);
    }

    /// Report durability: WAL up to `lsn` survives a consumer crash. Never
    /// advanced automatically.
    pub fn update_flushed(&self, lsn: Lsn) {
        self.session.positions.advance_flushed(lsn);
    }

    /// Push a status update out immediately instead of waiting for the timer
    pub async fn send_status_update(&self) -> WalResult<()> {
        send_status(&self.session.writer, &self.session.positions, false).await
    }

    /// Send hot-standby feedback (physical replication only)
    pub async fn send_hot_standby_feedback(&self, feedback: HotStandbyFeedback) -> WalResult<()> {
        let body = feedback.encode();
        let mut writer = self.session.writer.lock().await;
        messages::write_copy_data(&mut writer, &body);
        writer.flush().await
    }

    /// Cooperatively end the stream: send `CopyDone`, discard whatever the
    /// server still had in flight, and return the session to `Ready`.
    pub async fn stop(mut self) -> WalResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finish();
        info!("stopping replication stream");
        self.shutdown_copy().await
    }

    /// The client half of leaving `CopyBoth`: commit progress, `CopyDone`,
    /// then drain until the server is back at `ReadyForQuery`.
    async fn shutdown_copy(&mut self) -> WalResult<()> {
        if let Err(err) = send_status(&self.session.writer, &self.session.positions, false).await {
            warn!(error = %err, "final status update failed");
        }
        {
            let mut writer = self.session.writer.lock().await;
            messages::write_copy_done(&mut writer);
            writer.flush().await?;
        }
        self.session.state = SessionState::Draining;

        loop {
            let msg = self.session.read_message().await?;
            match msg.tag {
                backend::COPY_DATA => {}
                backend::COPY_DONE | backend::COMMAND_COMPLETE => break,
                backend::NOTICE_RESPONSE => self.session.log_notice(&msg.body),
                backend::PARAMETER_STATUS => self.session.record_parameter(&msg.body)?,
                backend::ERROR_RESPONSE => {
                    let err = ErrorFields::parse(&msg.body)?.into_error();
                    self.session.drain_to_ready().await?;
                    if err.sqlstate() == Some(SQLSTATE_QUERY_CANCELED) {
                        return Ok(());
                    }
                    return Err(err);
                }
                other => return self.session.fail(unexpected_tag("drain", other)),
            }
        }

        self.session.drain_to_ready().await?;
        debug!("copy mode left, session ready");
        Ok(())
    }

    fn stop_keepalive(&mut self) {
        if let Some(handle) = self.keepalive.take() {
            handle.abort();
        }
    }

    /// Stop the keepalive writer and mark the stream ended
    fn finish(&mut self) {
        self.stop_keepalive();
        self.finished = true;
    }
}

impl Drop for ReplicationStream<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.keepalive.take() {
            handle.abort();
        }
        if !self.finished {
            // an async drain cannot run here; the connection is mid-copy
            // and no longer usable for commands
            self.session.state = SessionState::Closed;
            warn!("replication stream dropped without stop(); session closed");
        }
    }
}

fn unexpected_tag(context: &str, tag: u8) -> WalError {
    WalError::protocol(format!(
        "unexpected message {:?} during {context}",
        tag as char
    ))
}

/// Write one standby status update under the feedback mutex
pub(crate) async fn send_status<W: AsyncWrite + Unpin>(
    writer: &Mutex<WriteBuffer<W>>,
    positions: &WalPositions,
    reply_requested: bool,
) -> WalResult<()> {
    let update = positions.status_update(reply_requested);
    debug!(
        write_lsn = %update.write_lsn,
        flush_lsn = %update.flush_lsn,
        apply_lsn = %update.apply_lsn,
        "sending standby status update"
    );
    let body = update.encode();
    let mut writer = writer.lock().await;
    messages::write_copy_data(&mut writer, &body);
    writer.flush().await
}

/// Timer-driven feedback writer. First fires one full interval after the
/// stream starts, then keeps the server informed until aborted.
fn spawn_keepalive(
    writer: SharedWriter,
    positions: Arc<WalPositions>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(err) = send_status(&writer, &positions, false).await {
                warn!(error = %err, "keepalive status update failed");
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logical_start_command_quotes_options_in_order() {
        let command = StartReplication::logical(
            "my_slot",
            "0/1573178".parse().unwrap(),
            vec![
                StartOption::new("proto_version", "1"),
                StartOption::new("publication_names", "\"pub1\",\"pub2\""),
                StartOption::flag("binary"),
            ],
        );
        assert_eq!(
            command.to_command().unwrap(),
            "START_REPLICATION SLOT \"my_slot\" LOGICAL 0/1573178 \
             (\"proto_version\" '1', \"publication_names\" '\"pub1\",\"pub2\"', \"binary\")"
        );
    }

    #[test]
    fn logical_start_command_without_options() {
        let command = StartReplication::logical("s", Lsn(0), vec![]);
        assert_eq!(
            command.to_command().unwrap(),
            "START_REPLICATION SLOT \"s\" LOGICAL 0/0"
        );
    }

    #[test]
    fn physical_start_command_variants() {
        let bare = StartReplication::physical(None, "A/1".parse().unwrap(), None);
        assert_eq!(bare.to_command().unwrap(), "START_REPLICATION PHYSICAL A/1");

        let full = StartReplication::physical(
            Some("phys".to_string()),
            "A/1".parse().unwrap(),
            Some(3),
        );
        assert_eq!(
            full.to_command().unwrap(),
            "START_REPLICATION SLOT \"phys\" PHYSICAL A/1 TIMELINE 3"
        );
    }

    #[test]
    fn empty_slot_name_is_rejected() {
        let command = StartReplication::logical("", Lsn(0), vec![]);
        assert!(matches!(
            command.to_command().unwrap_err(),
            WalError::InvalidArgument { .. }
        ));
    }
}
