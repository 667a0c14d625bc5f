//! Replication slot handles
//!
//! A slot object is a lightweight binding of the slot metadata returned by
//! `CREATE_REPLICATION_SLOT`; it holds no socket state and borrows a
//! session only while starting a stream. The typed variants pair the slot
//! with a decoder and yield plugin events instead of raw envelopes.

use std::collections::VecDeque;

use serde::Serialize;

use crate::core::errors::WalResult;
use crate::plugins::{DecoderPlugin, PgOutputPlugin, TestDecodingPlugin};
use crate::replication::session::{
    ReplicationSession, ReplicationStream, StartOption, StartReplication,
};
use crate::utils::lsn::Lsn;

/// Metadata of a created replication slot.
///
/// `snapshot_name` is present only when the slot exported or kept its
/// snapshot at creation time.
#[derive(Debug, Clone, Serialize)]
pub struct ReplicationSlotOptions {
    pub slot_name: String,
    pub consistent_point: Lsn,
    pub snapshot_name: Option<String>,
    pub output_plugin: Option<String>,
}

impl ReplicationSlotOptions {
    /// Where to start streaming: the requested position, or the slot's
    /// consistent point when the caller passes none.
    pub fn start_lsn(&self, requested: Option<Lsn>) -> Lsn {
        requested.unwrap_or(self.consistent_point)
    }
}

/// Typed event stream over an active replication stream.
///
/// Feeds every envelope through the plugin decoder; decoder errors are
/// protocol errors and end the session like any other.
pub struct EventStream<'a, P: DecoderPlugin> {
    inner: ReplicationStream<'a>,
    plugin: P,
    pending: VecDeque<P::Event>,
}

impl<'a, P: DecoderPlugin> EventStream<'a, P> {
    /// Start a logical stream on `slot_name` with the plugin's options
    pub async fn start(
        session: &'a mut ReplicationSession,
        slot_name: &str,
        wal_location: Lsn,
        plugin: P,
    ) -> WalResult<Self> {
        let command =
            StartReplication::logical(slot_name, wal_location, plugin.start_options());
        let inner = session.start_replication(command).await?;
        Ok(Self {
            inner,
            plugin,
            pending: VecDeque::new(),
        })
    }

    /// Next decoded event, or `None` when the stream ended cleanly
    pub async fn next_event(&mut self) -> WalResult<Option<P::Event>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }
            match self.inner.next_envelope().await? {
                None => return Ok(None),
                Some(data) => self.pending.extend(self.plugin.decode(&data)?),
            }
        }
    }

    pub fn plugin(&self) -> &P {
        &self.plugin
    }

    /// Handle other tasks can use to request cancellation
    pub fn cancel_handle(&self) -> crate::replication::session::CancelHandle {
        self.inner.cancel_handle()
    }

    /// Report progress: WAL up to `lsn` has been handed to the consumer
    pub fn update_applied(&self, lsn: Lsn) {
        self.inner.update_applied(lsn);
    }

    /// Report durability: WAL up to `lsn` survives a consumer crash
    pub fn update_flushed(&self, lsn: Lsn) {
        self.inner.update_flushed(lsn);
    }

    /// Push a status update out immediately
    pub async fn send_status_update(&self) -> WalResult<()> {
        self.inner.send_status_update().await
    }

    /// Cooperatively end the stream and return the session to ready
    pub async fn stop(self) -> WalResult<()> {
        self.inner.stop().await
    }
}

/// A logical slot streamed without decoding: raw `XLogData` envelopes
#[derive(Debug, Clone)]
pub struct RawLogicalSlot {
    pub options: ReplicationSlotOptions,
}

impl RawLogicalSlot {
    pub fn new(options: ReplicationSlotOptions) -> Self {
        Self { options }
    }

    pub async fn start_replication<'a>(
        &self,
        session: &'a mut ReplicationSession,
        wal_location: Option<Lsn>,
        options: Vec<StartOption>,
    ) -> WalResult<ReplicationStream<'a>> {
        let command = StartReplication::logical(
            self.options.slot_name.clone(),
            self.options.start_lsn(wal_location),
            options,
        );
        session.start_replication(command).await
    }
}

/// A slot created with the `test_decoding` plugin, yielding text events
#[derive(Debug, Clone)]
pub struct TestDecodingSlot {
    pub options: ReplicationSlotOptions,
}

impl TestDecodingSlot {
    pub fn new(options: ReplicationSlotOptions) -> Self {
        Self { options }
    }

    pub async fn start_replication<'a>(
        &self,
        session: &'a mut ReplicationSession,
        wal_location: Option<Lsn>,
        plugin: TestDecodingPlugin,
    ) -> WalResult<EventStream<'a, TestDecodingPlugin>> {
        EventStream::start(
            session,
            &self.options.slot_name,
            self.options.start_lsn(wal_location),
            plugin,
        )
        .await
    }
}

/// A slot created with the `pgoutput` plugin, yielding typed v1 events
#[derive(Debug, Clone)]
pub struct PgOutputSlot {
    pub options: ReplicationSlotOptions,
}

impl PgOutputSlot {
    pub fn new(options: ReplicationSlotOptions) -> Self {
        Self { options }
    }

    /// Start streaming the given publications through this slot
    pub async fn start_replication<'a, I, S>(
        &self,
        session: &'a mut ReplicationSession,
        wal_location: Option<Lsn>,
        publications: I,
    ) -> WalResult<EventStream<'a, PgOutputPlugin>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let plugin = PgOutputPlugin::new(publications)?;
        EventStream::start(
            session,
            &self.options.slot_name,
            self.options.start_lsn(wal_location),
            plugin,
        )
        .await
    }
}
