// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Keyspace-wide administrative commands: `FLUSHDB`,
//! `FLUSHALL`, `DBSIZE`, plus the supplemented `COMMAND`/`CONFIG`
//! introspection pair. `SAVE`/`BGSAVE`/`BGREWRITEAOF` need the persistence
//! handles in the server context rather than a bare `Database`, so they are
//! dispatched directly from [`crate::commands::dispatch`].

use bytes::Bytes;

use crate::{
    cfg::config::Config, commands::registry, error::ServerError, resp::RespValue,
    storage::{database::Database, keyspace::Keyspace},
};

pub fn flushdb(ks: &mut Keyspace, _args: &[Bytes]) -> Result<RespValue, ServerError> {
    ks.flush();
    Ok(RespValue::ok())
}

pub fn flushall(db: &mut Database, _args: &[Bytes]) -> Result<RespValue, ServerError> {
    db.flush_all();
    Ok(RespValue::ok())
}

pub fn dbsize(ks: &Keyspace, _args: &[Bytes]) -> Result<RespValue, ServerError> {
    Ok(RespValue::Integer(ks.size() as i64))
}

/// `COMMAND [COUNT]` — only the `COUNT` form is meaningful for a headless
/// server; the bare form reports the same count (there is no full command
/// introspection table to walk).
pub fn command(_args: &[Bytes]) -> Result<RespValue, ServerError> {
    Ok(RespValue::Integer(registry::count() as i64))
}

/// `CONFIG GET <parameter>` — read-only introspection of a handful of
/// commonly inspected server settings.
pub fn config_get(config: &Config, args: &[Bytes]) -> Result<RespValue, ServerError> {
    let sub = String::from_utf8_lossy(&args[0]).to_ascii_uppercase();
    if sub != "GET" {
        return Err(ServerError::SyntaxError);
    }
    let param = args.get(1).ok_or_else(|| ServerError::WrongArity("CONFIG".to_string()))?;
    let name = String::from_utf8_lossy(param).to_ascii_lowercase();
    let value = match name.as_str() {
        "maxmemory" => Some(config.max_memory.to_string()),
        "databases" => Some(config.databases.to_string()),
        "maxclients" => Some(config.max_clients.to_string()),
        "appendonly" => Some(config.appendonly.to_string()),
        "appendfsync" => Some(config.appendfsync.to_string()),
        "maxmemory-policy" => Some(format!("{:?}", config.eviction_policy).to_ascii_lowercase()),
        _ => None,
    };
    match value {
        Some(v) => Ok(RespValue::array(vec![
            RespValue::bulk(Bytes::copy_from_slice(name.as_bytes())),
            RespValue::bulk(Bytes::from(v)),
        ])),
        None => Ok(RespValue::array(Vec::new())),
    }
}
