// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Per-connection commands: `PING`, `ECHO`, `SELECT`. `QUIT`
//! is handled directly by the connection loop since it closes the socket
//! rather than producing an ordinary reply.

use bytes::Bytes;

use crate::{commands::parse_usize, error::ServerError, resp::RespValue};

/// The handful of fields that live with a connection rather than with a
/// database: which database it is currently addressing. Subscriptions and
/// the in-flight transaction live alongside this in the connection loop,
/// not here, since they need access to the pub/sub and transaction engines.
pub struct ConnectionState {
    pub db_index: usize,
    database_count: usize,
}

impl ConnectionState {
    pub fn new(database_count: usize) -> Self {
        Self { db_index: 0, database_count }
    }
}

pub fn ping(args: &[Bytes]) -> Result<RespValue, ServerError> {
    match args.first() {
        Some(msg) => Ok(RespValue::bulk(msg.clone())),
        None => Ok(RespValue::SimpleString("PONG".to_string())),
    }
}

pub fn echo(args: &[Bytes]) -> Result<RespValue, ServerError> {
    Ok(RespValue::bulk(args[0].clone()))
}

pub fn select(state: &mut ConnectionState, args: &[Bytes]) -> Result<RespValue, ServerError> {
    let index = parse_usize(&args[0])?;
    if index >= state.database_count {
        return Err(ServerError::StateError("DB index is out of range".to_string()));
    }
    state.db_index = index;
    Ok(RespValue::ok())
}
