// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Command registry and handlers: one module per
//! category, each exposing pure `handler(ctx-slice, args) -> Reply`
//! functions with no transport coupling.

pub mod admin;
pub mod connection;
pub mod dispatch;
pub mod hashes;
pub mod keys;
pub mod lists;
pub mod pubsub_cmds;
pub mod registry;
pub mod sets;
pub mod strings;
pub mod transactions;
pub mod zsets;

use bytes::Bytes;

use crate::error::ServerError;

pub fn parse_i64(arg: &[u8]) -> Result<i64, ServerError> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(ServerError::NotAnInteger)
}

pub fn parse_f64(arg: &[u8]) -> Result<f64, ServerError> {
    let v = std::str::from_utf8(arg)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or(ServerError::NotAFloat)?;
    if v.is_nan() {
        return Err(ServerError::NotAFloat);
    }
    Ok(v)
}

pub fn parse_usize(arg: &[u8]) -> Result<usize, ServerError> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or(ServerError::NotAnInteger)
}

/// Collects the payload of a mutating command into its AOF/rewrite form: a
/// RESP array of bulk strings, verb first.
pub fn to_command_array(verb: &str, args: &[Bytes]) -> crate::resp::RespValue {
    let mut items = vec![crate::resp::RespValue::bulk(Bytes::copy_from_slice(
        verb.as_bytes(),
    ))];
    items.extend(args.iter().cloned().map(crate::resp::RespValue::bulk));
    crate::resp::RespValue::array(items)
}
