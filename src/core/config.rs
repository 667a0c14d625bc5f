//! Session and connection configuration
//!
//! Connection-string parsing and multi-host failover live outside this
//! crate; callers hand over already-resolved endpoint parameters.

use std::time::Duration;

/// How the session announces itself in the startup packet.
///
/// Logical replication requires `replication=database` so the server binds
/// the walsender to a concrete database; physical streaming uses
/// `replication=true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicationMode {
    Logical,
    Physical,
}

impl ReplicationMode {
    pub(crate) fn startup_value(self) -> &'static str {
        match self {
            ReplicationMode::Logical => "database",
            ReplicationMode::Physical => "true",
        }
    }
}

/// Endpoint parameters for a single replication connection
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub database: Option<String>,
    /// Extra command-line options forwarded in the startup packet
    pub options: Option<String>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: None,
            database: None,
            options: None,
        }
    }
}

/// Knobs recognized by the replication session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    status_interval: Duration,
    /// Send periodic status updates even while no WAL arrives
    pub keepalive_on_idle: bool,
    pub client_encoding: String,
    pub application_name: Option<String>,
}

impl SessionConfig {
    /// Lower bound for the status interval; the server expects feedback at
    /// least this often before it considers a standby dead.
    pub const MIN_STATUS_INTERVAL: Duration = Duration::from_secs(1);

    /// Default `wal_receiver_status_interval`
    pub const DEFAULT_STATUS_INTERVAL: Duration = Duration::from_secs(10);

    /// Set the feedback interval, clamped to [`Self::MIN_STATUS_INTERVAL`]
    pub fn status_interval(mut self, interval: Duration) -> Self {
        self.status_interval = interval.max(Self::MIN_STATUS_INTERVAL);
        self
    }

    pub fn wal_receiver_status_interval(&self) -> Duration {
        self.status_interval
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            status_interval: Self::DEFAULT_STATUS_INTERVAL,
            keepalive_on_idle: true,
            client_encoding: "UTF8".to_string(),
            application_name: None,
        }
    }
}
