// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The server loop: builds the shared
//! [`context::ServerContext`] from configuration (recovering from disk
//! first), accepts connections up to `max_clients`, and runs the
//! background tasks — the sampled expiration sweeper, periodic `SAVE`,
//! and AOF rewrite-threshold checks — alongside them.

pub mod connection;
pub mod context;

use std::{sync::Arc, time::Duration};

use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::{cfg::config::Config, error::ServerError, persistence::aof::Aof, server::context::ServerContext, storage::database::Database};

/// How many candidates the sampled sweeper inspects per pass.
const SWEEP_SAMPLE_SIZE: usize = 20;
/// Baseline interval between sweeper passes; shortened adaptively when a
/// pass finds more than 25% of its sample expired.
const SWEEP_INTERVAL: Duration = Duration::from_millis(100);
const SWEEP_RESCHEDULE_INTERVAL: Duration = Duration::from_millis(10);
/// How often the AOF rewrite threshold is checked.
const REWRITE_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Loads the snapshot and replays the AOF on top of it, opens the AOF for new writes, and assembles the
/// context every connection will share.
pub async fn bootstrap(config: Config) -> Result<Arc<ServerContext>, ServerError> {
    let mut db = Database::new(config.databases, config.eviction_policy, config.max_memory);

    let rdb_path = std::path::PathBuf::from(&config.rdb_path);
    crate::persistence::rdb::load_from_path(&rdb_path, &mut db)?;

    let aof_path = std::path::PathBuf::from(&config.aof_path);
    if config.appendonly {
        crate::persistence::aof::replay(&aof_path, &mut db).await?;
    }

    let aof = Aof::open(&config).await?;
    Ok(Arc::new(ServerContext::new(config, db, aof)))
}

/// Binds the configured address and runs the accept loop until the
/// listener itself errors out (treated as fatal — the caller should exit).
/// Spawns the sweeper, periodic-save and AOF-rewrite-check background
/// tasks alongside it; they are daemon tasks with no explicit join since
/// the process exiting is the only shutdown path this server supports.
pub async fn run(ctx: Arc<ServerContext>) -> Result<(), ServerError> {
    let listener = TcpListener::bind(&ctx.config.bind).await?;
    info!(bind = %ctx.config.bind, "listening");
    serve(ctx, listener).await
}

/// Runs the background tasks and accept loop against an already-bound
/// listener. Split out from [`run`] so callers that need the OS-assigned
/// port of a `:0` bind (namely tests) can read it back before serving.
pub async fn serve(ctx: Arc<ServerContext>, listener: TcpListener) -> Result<(), ServerError> {
    tokio::spawn(sweeper_task(ctx.clone()));
    if ctx.config.save_interval_seconds > 0 {
        tokio::spawn(periodic_save_task(ctx.clone()));
    }
    if ctx.aof.is_some() {
        tokio::spawn(rewrite_check_task(ctx.clone()));
    }

    accept_loop(ctx, listener).await
}

async fn accept_loop(ctx: Arc<ServerContext>, listener: TcpListener) -> Result<(), ServerError> {
    loop {
        let (stream, peer) = listener.accept().await?;

        if !ctx.try_acquire_client_slot() {
            warn!(%peer, "rejecting connection: max clients reached");
            let mut framed = tokio_util::codec::Framed::new(stream, crate::resp::RespCodec::new());
            let _ = futures::SinkExt::send(
                &mut framed,
                crate::resp::RespValue::error("ERR max number of clients reached"),
            )
            .await;
            continue;
        }

        let conn_id = ctx.next_conn_id();
        let ctx = ctx.clone();
        tokio::spawn(async move {
            connection::handle(ctx, stream, conn_id).await;
        });
    }
}

/// Runs the sampled expiration sweeper: a fixed-size
/// sample every tick, rescheduling sooner when more than a quarter of the
/// sample had expired since that suggests the keyspace is still dirty.
async fn sweeper_task(ctx: Arc<ServerContext>) {
    loop {
        let reschedule_immediately = {
            let mut db = ctx.db.lock().await;
            db.sweep_all(SWEEP_SAMPLE_SIZE)
        };
        let delay = if reschedule_immediately { SWEEP_RESCHEDULE_INTERVAL } else { SWEEP_INTERVAL };
        tokio::time::sleep(delay).await;
    }
}

/// Periodic `BGSAVE`-equivalent: snapshots a cloned, point-in-time copy of
/// the keyspace off the command path.
async fn periodic_save_task(ctx: Arc<ServerContext>) {
    let interval = Duration::from_secs(ctx.config.save_interval_seconds);
    loop {
        tokio::time::sleep(interval).await;
        let snapshot = { ctx.db.lock().await.clone() };
        let path = std::path::PathBuf::from(&ctx.config.rdb_path);
        let result =
            tokio::task::spawn_blocking(move || crate::persistence::rdb::save_to_path(&snapshot, &path))
                .await;
        match result {
            Ok(Ok(())) => info!("periodic background save finished"),
            Ok(Err(e)) => warn!(error = %e, "periodic background save failed"),
            Err(e) => warn!(error = %e, "periodic background save task panicked"),
        }
    }
}

/// Checks the AOF growth thresholds and triggers a rewrite
/// when both are exceeded.
async fn rewrite_check_task(ctx: Arc<ServerContext>) {
    loop {
        tokio::time::sleep(REWRITE_CHECK_INTERVAL).await;
        let Some(aof) = &ctx.aof else { return };
        if !aof.should_rewrite(&ctx.config) {
            continue;
        }
        let snapshot = { ctx.db.lock().await.clone() };
        if let Err(e) = aof.rewrite(&snapshot).await {
            warn!(error = %e, "scheduled AOF rewrite failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::eviction::EvictionPolicy;

    #[tokio::test]
    async fn bootstrap_with_no_files_on_disk_starts_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config {
            databases: 4,
            rdb_path: dir.path().join("dump.rdb").to_string_lossy().into_owned(),
            appendonly: false,
            ..Config::default()
        };
        let ctx = bootstrap(config).await.expect("bootstrap");
        assert_eq!(ctx.db.lock().await.total_size(), 0);
    }

    #[tokio::test]
    async fn bootstrap_loads_an_existing_snapshot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let rdb_path = dir.path().join("dump.rdb");
        let mut seed = Database::new(4, EvictionPolicy::NoEviction, 0);
        seed.get_mut(0)
            .set(
                bytes::Bytes::from_static(b"k"),
                crate::storage::value::Value::new(
                    crate::storage::value::Payload::String(crate::storage::string::StringValue::new(
                        bytes::Bytes::from_static(b"v"),
                    )),
                    0,
                ),
            )
            .expect("set");
        crate::persistence::rdb::save_to_path(&seed, &rdb_path).expect("save");

        let config = Config {
            databases: 4,
            rdb_path: rdb_path.to_string_lossy().into_owned(),
            appendonly: false,
            ..Config::default()
        };
        let ctx = bootstrap(config).await.expect("bootstrap");
        assert_eq!(ctx.db.lock().await.get(0).size(), 1);
    }
}
