//! walsub CLI
//!
//! Connects in logical replication mode, verifies the server is configured
//! for logical decoding, then streams `pgoutput` changes for the requested
//! publications to stdout as JSON lines until ctrl-c.

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

use walsub::{
    ConnectOptions, CreateSlotOptions, PgOutputSlot, ReplicationMode, ReplicationSession,
    ReplicationSlotOptions, SessionConfig, SlotKind, WalError,
};

#[derive(Parser, Debug)]
#[command(
    name = "walsub",
    about = "Stream PostgreSQL logical replication changes to stdout",
    version
)]
struct Args {
    #[arg(long, default_value = "localhost")]
    host: String,

    #[arg(long, default_value_t = 5432)]
    port: u16,

    #[arg(long, default_value = "postgres")]
    user: String,

    /// Password; falls back to the PGPASSWORD environment variable
    #[arg(long)]
    password: Option<String>,

    /// Database to replicate from
    #[arg(long)]
    dbname: String,

    /// Replication slot name
    #[arg(long, default_value = "walsub")]
    slot: String,

    /// Publication to subscribe to (repeat for more than one)
    #[arg(long = "publication", required = true)]
    publications: Vec<String>,

    /// Create a temporary slot instead of using an existing one
    #[arg(long)]
    create_slot: bool,

    /// Feedback interval in seconds
    #[arg(long, default_value_t = 10)]
    status_interval: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(false).init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => {
            info!("walsub finished");
            Ok(())
        }
        Err(err) => {
            error!("walsub failed: {err:#}");
            Err(err)
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let password = args
        .password
        .clone()
        .or_else(|| std::env::var("PGPASSWORD").ok());
    let connect = ConnectOptions {
        host: args.host.clone(),
        port: args.port,
        user: args.user.clone(),
        password,
        database: Some(args.dbname.clone()),
        options: None,
    };
    let mut config =
        SessionConfig::default().status_interval(Duration::from_secs(args.status_interval));
    config.application_name = Some("walsub".to_string());

    let mut session =
        ReplicationSession::connect(&connect, ReplicationMode::Logical, config).await?;

    let wal_level = session.show("wal_level").await?;
    anyhow::ensure!(
        wal_level == "logical",
        "wal_level is {wal_level:?}; logical replication requires 'logical'"
    );

    let identity = session.identify_system().await?;
    info!(
        system_id = %identity.system_id,
        timeline = identity.timeline,
        xlogpos = %identity.xlogpos,
        "connected to primary"
    );

    let slot_options = if args.create_slot {
        session
            .create_replication_slot(
                &args.slot,
                SlotKind::Logical {
                    output_plugin: "pgoutput".to_string(),
                },
                CreateSlotOptions {
                    temporary: true,
                    ..Default::default()
                },
            )
            .await?
    } else {
        // existing slot: stream from the current end of WAL
        ReplicationSlotOptions {
            slot_name: args.slot.clone(),
            consistent_point: identity.xlogpos,
            snapshot_name: None,
            output_plugin: Some("pgoutput".to_string()),
        }
    };
    info!(
        slot = %slot_options.slot_name,
        consistent_point = %slot_options.consistent_point,
        "using replication slot"
    );

    let slot = PgOutputSlot::new(slot_options);
    let mut stream = slot
        .start_replication(&mut session, None, args.publications.clone())
        .await?;
    info!("streaming changes; press ctrl-c to stop");

    let cancel = stream.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            cancel.cancel();
        }
    });

    loop {
        match stream.next_event().await {
            Ok(Some(message)) => {
                println!("{}", serde_json::to_string(&message)?);
                // stdout is this tool's sink; printed means applied and durable
                stream.update_applied(message.wal_end);
                stream.update_flushed(message.wal_end);
            }
            Ok(None) => {
                info!("server ended the stream");
                break;
            }
            Err(WalError::Cancelled) => break,
            Err(err) => return Err(err.into()),
        }
    }

    stream.stop().await?;
    session.close().await?;
    Ok(())
}
