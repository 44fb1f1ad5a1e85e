// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The command dispatcher: registry lookup, arity check,
//! `MULTI` queuing, pub/sub-mode restriction, then execution, in that
//! order. Also owns `EXEC`'s single-lock-acquisition semantics, the
//! persistence-triggering admin commands (`SAVE`/`BGSAVE`/`BGREWRITEAOF`),
//! and the write-command replay path the AOF recovery uses on startup.

use std::path::PathBuf;

use bytes::Bytes;
use tracing::{error, info};

use crate::{
    commands::{
        admin, connection::ConnectionState, hashes, keys, lists, pubsub_cmds, registry, sets,
        strings, transactions, zsets,
    },
    error::ServerError,
    pubsub::ConnId,
    resp::RespValue,
    server::context::ServerContext,
    storage::database::Database,
    txn::Txn,
};

/// Every command whose successful execution must be appended to the AOF
/// — anything that mutates keyspace state.
const WRITE_COMMANDS: &[&str] = &[
    "SET", "GETSET", "DEL", "EXPIRE", "PEXPIREAT", "PERSIST", "RENAME", "INCR", "DECR", "INCRBY",
    "APPEND", "LPUSH", "RPUSH", "LPUSHX", "RPUSHX", "LPOP", "RPOP", "LSET", "LTRIM", "HSET",
    "HDEL", "HINCRBY", "HSETNX", "SADD", "SREM", "SPOP", "SMOVE", "ZADD", "ZREM", "ZINCRBY",
    "FLUSHDB", "FLUSHALL",
];

fn is_write_command(verb: &str) -> bool {
    WRITE_COMMANDS.contains(&verb)
}

const TXN_CONTROL: &[&str] = &["MULTI", "EXEC", "DISCARD", "WATCH", "UNWATCH"];
const PUBSUB_ALLOWED_WHILE_SUBSCRIBED: &[&str] =
    &["SUBSCRIBE", "UNSUBSCRIBE", "PSUBSCRIBE", "PUNSUBSCRIBE", "PING", "QUIT"];

/// What a dispatched command produced: the reply to send, and whether the
/// connection should be closed afterwards (`QUIT`).
pub struct Outcome {
    pub reply: RespValue,
    pub close: bool,
}

fn ok_or_error(result: Result<RespValue, ServerError>) -> RespValue {
    result.unwrap_or_else(|e| RespValue::error(e.reply_line()))
}

/// Routes one already-parsed command: registry lookup and
/// arity check first (closing nothing — these are ordinary error replies),
/// then `MULTI` queuing, then the pub/sub-mode restriction, then execution.
pub async fn dispatch(
    ctx: &ServerContext,
    conn: &mut ConnectionState,
    txn: &mut Txn,
    conn_id: ConnId,
    verb: String,
    args: Vec<Bytes>,
) -> Outcome {
    let Some(spec) = registry::lookup(&verb) else {
        return Outcome {
            reply: RespValue::error(ServerError::UnknownCommand(verb.to_lowercase()).reply_line()),
            close: false,
        };
    };
    if !spec.arity_ok(args.len()) {
        return Outcome {
            reply: RespValue::error(ServerError::WrongArity(verb).reply_line()),
            close: false,
        };
    }

    if txn.is_queuing() && !TXN_CONTROL.contains(&verb.as_str()) {
        txn.enqueue(verb, args);
        return Outcome { reply: RespValue::SimpleString("QUEUED".to_string()), close: false };
    }

    if ctx.pubsub.is_subscribed(conn_id) && !PUBSUB_ALLOWED_WHILE_SUBSCRIBED.contains(&verb.as_str()) {
        return Outcome {
            reply: RespValue::error(ServerError::NotAllowedInSubscribe.reply_line()),
            close: false,
        };
    }

    let close = verb == "QUIT";
    let reply = execute(ctx, conn, txn, conn_id, &verb, args).await;
    Outcome { reply, close }
}

async fn execute(
    ctx: &ServerContext,
    conn: &mut ConnectionState,
    txn: &mut Txn,
    conn_id: ConnId,
    verb: &str,
    args: Vec<Bytes>,
) -> RespValue {
    match verb {
        "MULTI" => ok_or_error(transactions::multi(txn)),
        "DISCARD" => ok_or_error(transactions::discard(txn)),
        "WATCH" => {
            let db = ctx.db.lock().await;
            ok_or_error(transactions::watch(txn, db.get(conn.db_index), &args))
        },
        "UNWATCH" => ok_or_error(transactions::unwatch(txn)),
        "EXEC" => exec(ctx, conn, txn).await,
        "SUBSCRIBE" => ok_or_error(pubsub_cmds::subscribe(&ctx.pubsub, conn_id, &args)),
        "UNSUBSCRIBE" => ok_or_error(pubsub_cmds::unsubscribe(&ctx.pubsub, conn_id, &args)),
        "PSUBSCRIBE" => ok_or_error(pubsub_cmds::psubscribe(&ctx.pubsub, conn_id, &args)),
        "PUNSUBSCRIBE" => ok_or_error(pubsub_cmds::punsubscribe(&ctx.pubsub, conn_id, &args)),
        "PUBLISH" => ok_or_error(pubsub_cmds::publish(&ctx.pubsub, &args)),
        "CONFIG" => ok_or_error(admin::config_get(&ctx.config, &args)),
        "SAVE" => save(ctx).await,
        "BGSAVE" => bgsave(ctx).await,
        "BGREWRITEAOF" => bgrewriteaof(ctx).await,
        _ => run_locked(ctx, conn, verb, &args).await,
    }
}

/// `EXEC`: acquires the database lock once for the whole
/// queued batch so no other connection's writes can interleave, checks
/// every `WATCH`ed key's version before running anything, and — unlike a
/// normal command — never stops early: a failing queued command becomes an
/// error entry in the reply array while the rest still run.
async fn exec(ctx: &ServerContext, conn: &mut ConnectionState, txn: &mut Txn) -> RespValue {
    if !txn.is_queuing() {
        return RespValue::error(
            ServerError::StateError("EXEC without MULTI".to_string()).reply_line(),
        );
    }
    let mut db = ctx.db.lock().await;
    if txn.watches_broken(db.get(conn.db_index)) {
        txn.take_for_exec();
        return RespValue::null_array();
    }
    let queued = txn.take_for_exec().expect("confirmed queuing above");
    let mut replies = Vec::with_capacity(queued.len());
    for (verb, args) in queued {
        match run_one(&mut db, conn, &verb, &args) {
            Ok(reply) => {
                if is_write_command(&verb) {
                    append_to_aof(ctx, conn.db_index, &verb, &args).await;
                }
                replies.push(reply);
            },
            Err(e) => replies.push(RespValue::error(e.reply_line())),
        }
    }
    RespValue::array(replies)
}

async fn run_locked(
    ctx: &ServerContext,
    conn: &mut ConnectionState,
    verb: &str,
    args: &[Bytes],
) -> RespValue {
    let mut db = ctx.db.lock().await;
    match run_one(&mut db, conn, verb, args) {
        Ok(reply) => {
            if is_write_command(verb) {
                append_to_aof(ctx, conn.db_index, verb, args).await;
            }
            reply
        },
        Err(e) => RespValue::error(e.reply_line()),
    }
}

async fn append_to_aof(ctx: &ServerContext, db_index: usize, verb: &str, args: &[Bytes]) {
    if let Some(aof) = &ctx.aof {
        if let Err(e) = aof.append(db_index, verb, args).await {
            error!(error = %e, command = verb, "failed to append to AOF");
        }
    }
}

/// Executes one command against an already-locked [`Database`]. Every
/// command reachable from here produces a client reply; commands that need
/// more than the database (pub/sub, transactions, persistence, `CONFIG`)
/// are handled in [`execute`] before reaching this point.
fn run_one(
    db: &mut Database,
    conn: &mut ConnectionState,
    verb: &str,
    args: &[Bytes],
) -> Result<RespValue, ServerError> {
    match verb {
        "GET" => strings::get(db.get_mut(conn.db_index), args),
        "SET" => strings::set(db.get_mut(conn.db_index), args),
        "GETSET" => strings::getset(db.get_mut(conn.db_index), args),
        "INCR" => strings::incr(db.get_mut(conn.db_index), args),
        "DECR" => strings::decr(db.get_mut(conn.db_index), args),
        "INCRBY" => strings::incrby(db.get_mut(conn.db_index), args),
        "APPEND" => strings::append(db.get_mut(conn.db_index), args),
        "STRLEN" => strings::strlen(db.get_mut(conn.db_index), args),
        "DEL" => keys::del(db.get_mut(conn.db_index), args),
        "EXISTS" => keys::exists(db.get_mut(conn.db_index), args),
        "TYPE" => keys::type_of(db.get_mut(conn.db_index), args),
        "EXPIRE" => keys::expire(db.get_mut(conn.db_index), args),
        "PEXPIREAT" => keys::pexpireat(db.get_mut(conn.db_index), args),
        "TTL" => keys::ttl(db.get_mut(conn.db_index), args),
        "PTTL" => keys::pttl(db.get_mut(conn.db_index), args),
        "PERSIST" => keys::persist(db.get_mut(conn.db_index), args),
        "RENAME" => keys::rename(db.get_mut(conn.db_index), args),
        "KEYS" => keys::keys(db.get_mut(conn.db_index), args),
        "RANDOMKEY" => keys::randomkey(db.get_mut(conn.db_index), args),
        "LPUSH" => lists::lpush(db.get_mut(conn.db_index), args),
        "RPUSH" => lists::rpush(db.get_mut(conn.db_index), args),
        "LPUSHX" => lists::lpushx(db.get_mut(conn.db_index), args),
        "RPUSHX" => lists::rpushx(db.get_mut(conn.db_index), args),
        "LPOP" => lists::lpop(db.get_mut(conn.db_index), args),
        "RPOP" => lists::rpop(db.get_mut(conn.db_index), args),
        "LRANGE" => lists::lrange(db.get_mut(conn.db_index), args),
        "LLEN" => lists::llen(db.get_mut(conn.db_index), args),
        "LINDEX" => lists::lindex(db.get_mut(conn.db_index), args),
        "LSET" => lists::lset(db.get_mut(conn.db_index), args),
        "LTRIM" => lists::ltrim(db.get_mut(conn.db_index), args),
        "HSET" => hashes::hset(db.get_mut(conn.db_index), args),
        "HGET" => hashes::hget(db.get_mut(conn.db_index), args),
        "HDEL" => hashes::hdel(db.get_mut(conn.db_index), args),
        "HEXISTS" => hashes::hexists(db.get_mut(conn.db_index), args),
        "HLEN" => hashes::hlen(db.get_mut(conn.db_index), args),
        "HGETALL" => hashes::hgetall(db.get_mut(conn.db_index), args),
        "HKEYS" => hashes::hkeys(db.get_mut(conn.db_index), args),
        "HVALS" => hashes::hvals(db.get_mut(conn.db_index), args),
        "HINCRBY" => hashes::hincrby(db.get_mut(conn.db_index), args),
        "HSETNX" => hashes::hsetnx(db.get_mut(conn.db_index), args),
        "SADD" => sets::sadd(db.get_mut(conn.db_index), args),
        "SREM" => sets::srem(db.get_mut(conn.db_index), args),
        "SMEMBERS" => sets::smembers(db.get_mut(conn.db_index), args),
        "SISMEMBER" => sets::sismember(db.get_mut(conn.db_index), args),
        "SCARD" => sets::scard(db.get_mut(conn.db_index), args),
        "SRANDMEMBER" => sets::srandmember(db.get_mut(conn.db_index), args),
        "SPOP" => sets::spop(db.get_mut(conn.db_index), args),
        "SINTER" => sets::sinter(db.get_mut(conn.db_index), args),
        "SUNION" => sets::sunion(db.get_mut(conn.db_index), args),
        "SDIFF" => sets::sdiff(db.get_mut(conn.db_index), args),
        "SMOVE" => sets::smove(db.get_mut(conn.db_index), args),
        "ZADD" => zsets::zadd(db.get_mut(conn.db_index), args),
        "ZREM" => zsets::zrem(db.get_mut(conn.db_index), args),
        "ZSCORE" => zsets::zscore(db.get_mut(conn.db_index), args),
        "ZCARD" => zsets::zcard(db.get_mut(conn.db_index), args),
        "ZRANK" => zsets::zrank(db.get_mut(conn.db_index), args),
        "ZREVRANK" => zsets::zrevrank(db.get_mut(conn.db_index), args),
        "ZRANGE" => zsets::zrange(db.get_mut(conn.db_index), args),
        "ZREVRANGE" => zsets::zrevrange(db.get_mut(conn.db_index), args),
        "ZRANGEBYSCORE" => zsets::zrangebyscore(db.get_mut(conn.db_index), args),
        "ZCOUNT" => zsets::zcount(db.get_mut(conn.db_index), args),
        "ZINCRBY" => zsets::zincrby(db.get_mut(conn.db_index), args),
        "PING" => crate::commands::connection::ping(args),
        "ECHO" => crate::commands::connection::echo(args),
        "SELECT" => crate::commands::connection::select(conn, args),
        "QUIT" => Ok(RespValue::ok()),
        "FLUSHDB" => admin::flushdb(db.get_mut(conn.db_index), args),
        "FLUSHALL" => admin::flushall(db, args),
        "DBSIZE" => admin::dbsize(db.get(conn.db_index), args),
        "COMMAND" => admin::command(args),
        other => Err(ServerError::UnknownCommand(other.to_lowercase())),
    }
}

async fn save(ctx: &ServerContext) -> RespValue {
    let db = ctx.db.lock().await;
    match crate::persistence::rdb::save_to_path(&db, std::path::Path::new(&ctx.config.rdb_path)) {
        Ok(()) => RespValue::ok(),
        Err(e) => {
            error!(error = %e, "SAVE failed");
            RespValue::error(e.reply_line())
        },
    }
}

async fn bgsave(ctx: &ServerContext) -> RespValue {
    let snapshot = { ctx.db.lock().await.clone() };
    let path = PathBuf::from(&ctx.config.rdb_path);
    tokio::spawn(async move {
        let result = tokio::task::spawn_blocking(move || {
            crate::persistence::rdb::save_to_path(&snapshot, &path)
        })
        .await;
        match result {
            Ok(Ok(())) => info!("background save finished"),
            Ok(Err(e)) => error!(error = %e, "background save failed"),
            Err(e) => error!(error = %e, "background save task panicked"),
        }
    });
    RespValue::SimpleString("Background saving started".to_string())
}

async fn bgrewriteaof(ctx: &ServerContext) -> RespValue {
    let Some(aof) = &ctx.aof else {
        return RespValue::error(
            ServerError::StateError("AOF is not enabled".to_string()).reply_line(),
        );
    };
    let snapshot = { ctx.db.lock().await.clone() };
    match aof.rewrite(&snapshot).await {
        Ok(()) => RespValue::SimpleString("Background append only file rewriting started".to_string()),
        Err(e) => {
            error!(error = %e, "BGREWRITEAOF failed");
            RespValue::error(e.reply_line())
        },
    }
}

/// Re-applies one write command read back from the AOF. Only ever sees verbs from [`WRITE_COMMANDS`] — already
/// logged commands are trusted, so this skips the registry/arity/pub-sub
/// gating `dispatch` performs on live traffic.
pub fn apply_for_replay(
    db: &mut Database,
    db_index: usize,
    verb: &str,
    args: &[Bytes],
) -> Result<(), ServerError> {
    let result = match verb {
        "SET" => strings::set(db.get_mut(db_index), args).map(|_| ()),
        "GETSET" => strings::getset(db.get_mut(db_index), args).map(|_| ()),
        "DEL" => keys::del(db.get_mut(db_index), args).map(|_| ()),
        "EXPIRE" => keys::expire(db.get_mut(db_index), args).map(|_| ()),
        "PEXPIREAT" => keys::pexpireat(db.get_mut(db_index), args).map(|_| ()),
        "PERSIST" => keys::persist(db.get_mut(db_index), args).map(|_| ()),
        "RENAME" => keys::rename(db.get_mut(db_index), args).map(|_| ()),
        "INCR" => strings::incr(db.get_mut(db_index), args).map(|_| ()),
        "DECR" => strings::decr(db.get_mut(db_index), args).map(|_| ()),
        "INCRBY" => strings::incrby(db.get_mut(db_index), args).map(|_| ()),
        "APPEND" => strings::append(db.get_mut(db_index), args).map(|_| ()),
        "LPUSH" => lists::lpush(db.get_mut(db_index), args).map(|_| ()),
        "RPUSH" => lists::rpush(db.get_mut(db_index), args).map(|_| ()),
        "LPUSHX" => lists::lpushx(db.get_mut(db_index), args).map(|_| ()),
        "RPUSHX" => lists::rpushx(db.get_mut(db_index), args).map(|_| ()),
        "LPOP" => lists::lpop(db.get_mut(db_index), args).map(|_| ()),
        "RPOP" => lists::rpop(db.get_mut(db_index), args).map(|_| ()),
        "LSET" => lists::lset(db.get_mut(db_index), args).map(|_| ()),
        "LTRIM" => lists::ltrim(db.get_mut(db_index), args).map(|_| ()),
        "HSET" => hashes::hset(db.get_mut(db_index), args).map(|_| ()),
        "HDEL" => hashes::hdel(db.get_mut(db_index), args).map(|_| ()),
        "HINCRBY" => hashes::hincrby(db.get_mut(db_index), args).map(|_| ()),
        "HSETNX" => hashes::hsetnx(db.get_mut(db_index), args).map(|_| ()),
        "SADD" => sets::sadd(db.get_mut(db_index), args).map(|_| ()),
        "SREM" => sets::srem(db.get_mut(db_index), args).map(|_| ()),
        "SPOP" => sets::spop(db.get_mut(db_index), args).map(|_| ()),
        "SMOVE" => sets::smove(db.get_mut(db_index), args).map(|_| ()),
        "ZADD" => zsets::zadd(db.get_mut(db_index), args).map(|_| ()),
        "ZREM" => zsets::zrem(db.get_mut(db_index), args).map(|_| ()),
        "ZINCRBY" => zsets::zincrby(db.get_mut(db_index), args).map(|_| ()),
        "FLUSHDB" => admin::flushdb(db.get_mut(db_index), args).map(|_| ()),
        "FLUSHALL" => admin::flushall(db, args).map(|_| ()),
        other => {
            return Err(ServerError::Io(anyhow::anyhow!(
                "AOF contains unsupported command '{other}'"
            )));
        },
    };
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cfg::config::Config,
        storage::{eviction::EvictionPolicy, value::Payload},
    };

    fn test_ctx() -> ServerContext {
        let config = Config { databases: 4, ..Config::default() };
        ServerContext::new(config, Database::new(4, EvictionPolicy::NoEviction, 0), None)
    }

    #[tokio::test]
    async fn set_then_get_round_trips_through_dispatch() {
        let ctx = test_ctx();
        let mut conn = ConnectionState::new(4);
        let mut txn = Txn::new();
        let outcome = dispatch(&ctx, &mut conn, &mut txn, 1, "SET".to_string(), vec![
            Bytes::from_static(b"k"),
            Bytes::from_static(b"v"),
        ])
        .await;
        assert_eq!(outcome.reply, RespValue::ok());
        assert!(!outcome.close);

        let outcome =
            dispatch(&ctx, &mut conn, &mut txn, 1, "GET".to_string(), vec![Bytes::from_static(b"k")])
                .await;
        assert_eq!(outcome.reply, RespValue::bulk(Bytes::from_static(b"v")));
    }

    #[tokio::test]
    async fn unknown_command_is_an_error_reply() {
        let ctx = test_ctx();
        let mut conn = ConnectionState::new(4);
        let mut txn = Txn::new();
        let outcome = dispatch(&ctx, &mut conn, &mut txn, 1, "NOPE".to_string(), vec![]).await;
        assert!(matches!(outcome.reply, RespValue::Error(_)));
    }

    #[tokio::test]
    async fn multi_queues_then_exec_runs_batch_atomically() {
        let ctx = test_ctx();
        let mut conn = ConnectionState::new(4);
        let mut txn = Txn::new();
        dispatch(&ctx, &mut conn, &mut txn, 1, "MULTI".to_string(), vec![]).await;
        let queued = dispatch(&ctx, &mut conn, &mut txn, 1, "SET".to_string(), vec![
            Bytes::from_static(b"k"),
            Bytes::from_static(b"v"),
        ])
        .await;
        assert_eq!(queued.reply, RespValue::SimpleString("QUEUED".to_string()));
        let outcome = dispatch(&ctx, &mut conn, &mut txn, 1, "EXEC".to_string(), vec![]).await;
        assert_eq!(outcome.reply, RespValue::array(vec![RespValue::ok()]));
    }

    #[tokio::test]
    async fn exec_without_multi_errors() {
        let ctx = test_ctx();
        let mut conn = ConnectionState::new(4);
        let mut txn = Txn::new();
        let outcome = dispatch(&ctx, &mut conn, &mut txn, 1, "EXEC".to_string(), vec![]).await;
        assert!(matches!(outcome.reply, RespValue::Error(_)));
    }

    #[tokio::test]
    async fn watch_broken_by_concurrent_write_aborts_exec() {
        let ctx = test_ctx();
        let mut conn = ConnectionState::new(4);
        let mut txn = Txn::new();
        dispatch(&ctx, &mut conn, &mut txn, 1, "WATCH".to_string(), vec![Bytes::from_static(b"k")])
            .await;
        // Another connection writes the watched key before EXEC.
        {
            let mut db = ctx.db.lock().await;
            db.get_mut(0)
                .set(
                    Bytes::from_static(b"k"),
                    crate::storage::value::Value::new(
                        Payload::String(crate::storage::string::StringValue::new(Bytes::from_static(
                            b"x",
                        ))),
                        0,
                    ),
                )
                .expect("set");
        }
        dispatch(&ctx, &mut conn, &mut txn, 1, "MULTI".to_string(), vec![]).await;
        dispatch(&ctx, &mut conn, &mut txn, 1, "GET".to_string(), vec![Bytes::from_static(b"k")])
            .await;
        let outcome = dispatch(&ctx, &mut conn, &mut txn, 1, "EXEC".to_string(), vec![]).await;
        assert_eq!(outcome.reply, RespValue::null_array());
    }

    #[tokio::test]
    async fn quit_closes_the_connection() {
        let ctx = test_ctx();
        let mut conn = ConnectionState::new(4);
        let mut txn = Txn::new();
        let outcome = dispatch(&ctx, &mut conn, &mut txn, 1, "QUIT".to_string(), vec![]).await;
        assert!(outcome.close);
    }

    #[tokio::test]
    async fn subscribed_connection_rejects_ordinary_commands() {
        let ctx = test_ctx();
        let mut conn = ConnectionState::new(4);
        let mut txn = Txn::new();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        ctx.pubsub.register_connection(1, tx);
        dispatch(&ctx, &mut conn, &mut txn, 1, "SUBSCRIBE".to_string(), vec![Bytes::from_static(
            b"ch",
        )])
        .await;
        let outcome = dispatch(&ctx, &mut conn, &mut txn, 1, "GET".to_string(), vec![Bytes::from_static(
            b"k",
        )])
        .await;
        assert!(matches!(outcome.reply, RespValue::Error(_)));
    }
}
