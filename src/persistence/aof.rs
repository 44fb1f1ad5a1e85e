// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The append-only command log: every successful write is
//! re-encoded as a RESP command array and appended after execution, so a
//! crash can be recovered from by replaying the log over a loaded snapshot.
//!
//! The three `appendfsync` policies trade latency for durability
//! differently: `Always` fsyncs inline on the write path before the client
//! sees a reply; `Everysec` hands the write off to a background task that
//! batches and fsyncs at most once a second; `No` never fsyncs explicitly,
//! leaving it to the kernel's own writeback.

use std::{
    path::{Path, PathBuf},
    sync::atomic::{AtomicI64, AtomicU64, Ordering},
    time::Duration,
};

use bytes::{Bytes, BytesMut};
use tokio::{
    io::{AsyncSeekExt, AsyncWriteExt},
    sync::{mpsc, oneshot},
};
use tokio_util::codec::Decoder;
use tracing::{info, warn};

use crate::{
    cfg::{config::Config, enums::FsyncPolicy},
    commands::{dispatch, to_command_array},
    error::ServerError,
    resp::{RespCodec, RespValue},
    storage::{database::Database, value::{Payload, Value}},
};

/// Bound on the in-flight append queue for the `Everysec`/`No` policies.
/// `append` blocks briefly on a full queue, then drops the command with a
/// warning rather than stalling the caller indefinitely.
const QUEUE_CAPACITY: usize = 4096;
const QUEUE_FULL_TIMEOUT: Duration = Duration::from_millis(50);

enum AofMsg {
    Append(Vec<u8>),
    Rewrite(Vec<u8>, oneshot::Sender<Result<(), ServerError>>),
}

enum AofInner {
    Always(tokio::sync::Mutex<tokio::fs::File>),
    Background { tx: mpsc::Sender<AofMsg> },
}

/// A handle to the open append-only file. One instance lives in the server
/// context for the whole process lifetime; `None` there means
/// `appendonly: false`.
pub struct Aof {
    path: PathBuf,
    inner: AofInner,
    /// Database index the last appended record was logged against; a
    /// changed index injects a `SELECT` record ahead of the command, the
    /// same way the source command stream would have switched it.
    last_logged_db: AtomicI64,
    /// Size in bytes of the file as of the last successful rewrite.
    base_size: AtomicU64,
    /// Bytes appended since that baseline; `base_size + written_since_base`
    /// approximates the current file size without a `stat` per write.
    written_since_base: AtomicU64,
}

impl Aof {
    /// Opens (creating if absent) the configured AOF file and, for
    /// `Everysec`/`No`, spawns the background writer task. Returns `None`
    /// when `appendonly` is disabled.
    pub async fn open(config: &Config) -> Result<Option<Self>, ServerError> {
        if !config.appendonly {
            return Ok(None);
        }
        let path = PathBuf::from(&config.aof_path);
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        let base_size = file.metadata().await.map(|m| m.len()).unwrap_or(0);

        let inner = match config.appendfsync {
            FsyncPolicy::Always => AofInner::Always(tokio::sync::Mutex::new(file)),
            FsyncPolicy::Everysec | FsyncPolicy::No => {
                let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
                tokio::spawn(background_writer(file, rx, config.appendfsync));
                AofInner::Background { tx }
            },
        };

        Ok(Some(Self {
            path,
            inner,
            last_logged_db: AtomicI64::new(-1),
            base_size: AtomicU64::new(base_size),
            written_since_base: AtomicU64::new(0),
        }))
    }

    /// Appends one already-executed write command, injecting a `SELECT`
    /// ahead of it if the database differs from the last logged record.
    /// On a full background queue the command is dropped (with a warning)
    /// rather than blocking the caller, which holds the database lock.
    pub async fn append(&self, db_index: usize, verb: &str, args: &[Bytes]) -> Result<(), ServerError> {
        let mut buf = Vec::new();
        if self.last_logged_db.load(Ordering::Relaxed) != db_index as i64 {
            let select = to_command_array("SELECT", &[Bytes::from(db_index.to_string())]);
            buf.extend_from_slice(&crate::resp::encode::encode_to_vec(&select));
        }
        let cmd = to_command_array(verb, args);
        buf.extend_from_slice(&crate::resp::encode::encode_to_vec(&cmd));
        let len = buf.len() as u64;

        match &self.inner {
            AofInner::Always(mutex) => {
                let mut file = mutex.lock().await;
                file.write_all(&buf).await?;
                file.sync_all().await?;
            },
            AofInner::Background { tx } => {
                if tx.try_send(AofMsg::Append(buf.clone())).is_err() {
                    match tokio::time::timeout(QUEUE_FULL_TIMEOUT, tx.send(AofMsg::Append(buf))).await
                    {
                        Ok(Ok(())) => {},
                        _ => {
                            warn!(command = verb, "AOF write queue full, dropping command");
                            return Ok(());
                        },
                    }
                }
            },
        }
        self.last_logged_db.store(db_index as i64, Ordering::Relaxed);
        self.written_since_base.fetch_add(len, Ordering::Relaxed);
        Ok(())
    }

    /// Whether the file has grown enough to justify a rewrite: both the minimum-size floor and the growth-percentage
    /// threshold over the last rewrite's baseline must be met.
    pub fn should_rewrite(&self, config: &Config) -> bool {
        let base = self.base_size.load(Ordering::Relaxed);
        let current = base + self.written_since_base.load(Ordering::Relaxed);
        current >= config.aof_rewrite_min_size
            && current >= base.saturating_mul(100 + config.aof_rewrite_percent) / 100
    }

    /// Replaces the file's contents with the minimal set of commands that
    /// reconstruct the current database, in place so any
    /// file handle held by the background writer stays valid.
    pub async fn rewrite(&self, db: &Database) -> Result<(), ServerError> {
        let commands = rewrite_commands(db);
        let mut bytes = Vec::new();
        for cmd in &commands {
            bytes.extend_from_slice(&crate::resp::encode::encode_to_vec(cmd));
        }
        let len = bytes.len() as u64;

        match &self.inner {
            AofInner::Always(mutex) => {
                let mut file = mutex.lock().await;
                file.set_len(0).await?;
                file.seek(std::io::SeekFrom::Start(0)).await?;
                file.write_all(&bytes).await?;
                file.sync_all().await?;
            },
            AofInner::Background { tx } => {
                let (reply_tx, reply_rx) = oneshot::channel();
                tx.send(AofMsg::Rewrite(bytes, reply_tx))
                    .await
                    .map_err(|_| ServerError::Io(anyhow::anyhow!("AOF writer task is gone")))?;
                reply_rx
                    .await
                    .map_err(|_| ServerError::Io(anyhow::anyhow!("AOF writer task dropped its reply")))??;
            },
        }
        self.base_size.store(len, Ordering::Relaxed);
        self.written_since_base.store(0, Ordering::Relaxed);
        self.last_logged_db.store(-1, Ordering::Relaxed);
        info!(bytes = len, path = %self.path.display(), "rewrote append-only file");
        Ok(())
    }
}

async fn background_writer(mut file: tokio::fs::File, mut rx: mpsc::Receiver<AofMsg>, policy: FsyncPolicy) {
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.tick().await; // the first tick fires immediately; skip it
    loop {
        tokio::select! {
            msg = rx.recv() => {
                match msg {
                    Some(AofMsg::Append(bytes)) => {
                        if let Err(e) = file.write_all(&bytes).await {
                            warn!(error = %e, "AOF background write failed");
                        }
                    },
                    Some(AofMsg::Rewrite(bytes, reply)) => {
                        let result = rewrite_in_place(&mut file, &bytes).await;
                        let _ = reply.send(result);
                    },
                    None => break,
                }
            },
            _ = ticker.tick(), if policy == FsyncPolicy::Everysec => {
                if let Err(e) = file.sync_all().await {
                    warn!(error = %e, "AOF fsync failed");
                }
            },
        }
    }
}

async fn rewrite_in_place(file: &mut tokio::fs::File, bytes: &[u8]) -> Result<(), ServerError> {
    file.set_len(0).await?;
    file.seek(std::io::SeekFrom::Start(0)).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    Ok(())
}

/// Builds the minimal command log that reconstructs `db` from empty:
/// one `SELECT` per non-empty database, then the
/// reconstruction commands for each key, then a `PEXPIREAT` for any key
/// carrying a TTL. A hash with several fields becomes one `HSET` per
/// field rather than a single multi-field call, since this server's `HSET`
/// only ever takes one field per invocation.
fn rewrite_commands(db: &Database) -> Vec<RespValue> {
    let mut out = Vec::new();
    for (index, ks) in db.iter().enumerate() {
        if ks.size() == 0 {
            continue;
        }
        out.push(to_command_array("SELECT", &[Bytes::from(index.to_string())]));
        for (key, value) in ks.iter() {
            out.extend(reconstruct(key, value));
        }
    }
    out
}

fn reconstruct(key: &Bytes, value: &Value) -> Vec<RespValue> {
    let mut cmds = Vec::new();
    match &value.payload {
        Payload::String(s) => {
            cmds.push(to_command_array("SET", &[key.clone(), s.get_bytes().clone()]));
        },
        Payload::List(l) => {
            let items = l.range_inclusive(0, -1);
            if !items.is_empty() {
                let mut args = vec![key.clone()];
                args.extend(items);
                cmds.push(to_command_array("RPUSH", &args));
            }
        },
        Payload::Hash(h) => {
            for (field, val) in h.get_all() {
                cmds.push(to_command_array("HSET", &[key.clone(), field.clone(), val.clone()]));
            }
        },
        Payload::Set(set) => {
            let members: Vec<Bytes> = set.members().cloned().collect();
            if !members.is_empty() {
                let mut args = vec![key.clone()];
                args.extend(members);
                cmds.push(to_command_array("SADD", &args));
            }
        },
        Payload::SortedSet(z) => {
            for (member, score) in z.range_by_rank(0, -1, false) {
                cmds.push(to_command_array("ZADD", &[
                    key.clone(),
                    Bytes::from(format_score(score)),
                    member,
                ]));
            }
        },
    }
    if let Some(at_ms) = value.expires_at_ms {
        cmds.push(to_command_array("PEXPIREAT", &[key.clone(), Bytes::from(at_ms.to_string())]));
    }
    cmds
}

fn format_score(score: f64) -> String {
    if score.fract() == 0.0 && score.is_finite() {
        format!("{}", score as i64)
    } else {
        format!("{score}")
    }
}

/// Replays an AOF file on top of an already-loaded (or empty) `Database`.
/// A truncated trailing record — the tail of a
/// write interrupted by a crash mid-append — is tolerated; any decode
/// failure before that point aborts recovery since the log's integrity
/// can no longer be trusted from there on.
pub async fn replay(path: &Path, db: &mut Database) -> Result<(), ServerError> {
    if !path.exists() {
        return Ok(());
    }
    let raw = tokio::fs::read(path).await?;
    let mut buf = BytesMut::from(&raw[..]);
    let mut codec = RespCodec::new();
    let mut db_index = 0usize;
    let mut applied = 0u64;

    loop {
        match codec.decode(&mut buf) {
            Ok(Some(value)) => {
                let Some((verb, args)) = value.into_command_parts() else {
                    return Err(ServerError::Io(anyhow::anyhow!(
                        "AOF contains a frame that is not a command array"
                    )));
                };
                apply_replayed(db, &mut db_index, &verb, &args)?;
                applied += 1;
            },
            Ok(None) => break,
            Err(e) => {
                return Err(ServerError::Io(anyhow::anyhow!("AOF decode error: {e}")));
            },
        }
    }
    info!(path = %path.display(), commands = applied, "replayed append-only file");
    Ok(())
}

fn apply_replayed(db: &mut Database, db_index: &mut usize, verb: &str, args: &[Bytes]) -> Result<(), ServerError> {
    if verb == "SELECT" {
        let idx = std::str::from_utf8(args.first().map(|b| b.as_ref()).unwrap_or(b""))
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .ok_or_else(|| ServerError::Io(anyhow::anyhow!("AOF SELECT with a non-numeric index")))?;
        if !db.is_valid_index(idx) {
            return Err(ServerError::Io(anyhow::anyhow!("AOF SELECT index out of range")));
        }
        *db_index = idx;
        return Ok(());
    }
    dispatch::apply_for_replay(db, *db_index, verb, args)
}
