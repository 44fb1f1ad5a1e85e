// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! String commands: `GET`, `SET`, `GETSET`, `INCR`,
//! `DECR`, `INCRBY`, `APPEND`, `STRLEN`.

use bytes::Bytes;

use crate::{
    commands::parse_i64,
    error::ServerError,
    resp::RespValue,
    storage::{
        keyspace::{Keyspace, now_ms},
        string::StringValue,
        value::{Payload, Value},
    },
};

fn as_string(value: &Value) -> Result<&StringValue, ServerError> {
    match &value.payload {
        Payload::String(s) => Ok(s),
        _ => Err(ServerError::WrongType),
    }
}

fn as_string_mut(value: &mut Value) -> Result<&mut StringValue, ServerError> {
    match &mut value.payload {
        Payload::String(s) => Ok(s),
        _ => Err(ServerError::WrongType),
    }
}

pub fn get(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    match ks.get(&args[0]) {
        Some(v) => Ok(RespValue::bulk(as_string(v)?.get_bytes().clone())),
        None => Ok(RespValue::null_bulk()),
    }
}

enum Expiry {
    None,
    ExSeconds(i64),
    PxMillis(i64),
}

enum Precondition {
    None,
    Nx,
    Xx,
}

/// `SET key value [EX seconds|PX ms] [NX|XX]`.
pub fn set(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    let key = &args[0];
    let value = &args[1];

    let mut expiry = Expiry::None;
    let mut precondition = Precondition::None;
    let mut i = 2;
    while i < args.len() {
        let opt = String::from_utf8_lossy(&args[i]).to_ascii_uppercase();
        match opt.as_str() {
            "EX" => {
                i += 1;
                let secs = args.get(i).ok_or(ServerError::SyntaxError)?;
                expiry = Expiry::ExSeconds(parse_i64(secs)?);
            },
            "PX" => {
                i += 1;
                let ms = args.get(i).ok_or(ServerError::SyntaxError)?;
                expiry = Expiry::PxMillis(parse_i64(ms)?);
            },
            "NX" => precondition = Precondition::Nx,
            "XX" => precondition = Precondition::Xx,
            _ => return Err(ServerError::SyntaxError),
        }
        i += 1;
    }

    let exists = ks.exists(std::slice::from_ref(key)) == 1;
    match precondition {
        Precondition::Nx if exists => return Ok(RespValue::null_bulk()),
        Precondition::Xx if !exists => return Ok(RespValue::null_bulk()),
        _ => {},
    }

    let now = now_ms();
    let mut new_value = Value::new(Payload::String(StringValue::new(value.clone())), now);
    new_value.expires_at_ms = match expiry {
        Expiry::None => None,
        Expiry::ExSeconds(s) => Some(now.saturating_add(s.saturating_mul(1000))),
        Expiry::PxMillis(ms) => Some(now.saturating_add(ms)),
    };
    ks.set(key.clone(), new_value)?;
    Ok(RespValue::ok())
}

/// Atomically sets `key` to a new value and returns its previous contents
/// (or null bulk if it had none). A natural companion of `SET`/`GET`.
pub fn getset(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    let key = &args[0];
    let old = match ks.get(key) {
        Some(v) => Some(as_string(v)?.get_bytes().clone()),
        None => None,
    };
    ks.set(
        key.clone(),
        Value::new(Payload::String(StringValue::new(args[1].clone())), now_ms()),
    )?;
    match old {
        Some(b) => Ok(RespValue::bulk(b)),
        None => Ok(RespValue::null_bulk()),
    }
}

fn incr_by(ks: &mut Keyspace, key: &Bytes, delta: i64) -> Result<RespValue, ServerError> {
    let value = ks.get_or_create_mut(key, || {
        Payload::String(StringValue::new(Bytes::from_static(b"0")))
    })?;
    let next = as_string_mut(value)?.incr_by(delta)?;
    ks.mark_written(key);
    Ok(RespValue::Integer(next))
}

pub fn incr(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    incr_by(ks, &args[0], 1)
}

pub fn decr(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    incr_by(ks, &args[0], -1)
}

pub fn incrby(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    let delta = parse_i64(&args[1])?;
    incr_by(ks, &args[0], delta)
}

pub fn append(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    let key = &args[0];
    let value = ks.get_or_create_mut(key, || Payload::String(StringValue::new(Bytes::new())))?;
    let len = as_string_mut(value)?.append(&args[1]);
    ks.mark_written(key);
    Ok(RespValue::Integer(len as i64))
}

pub fn strlen(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    match ks.get(&args[0]) {
        Some(v) => Ok(RespValue::Integer(as_string(v)?.strlen() as i64)),
        None => Ok(RespValue::Integer(0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::eviction::EvictionPolicy;

    #[test]
    fn set_then_get_round_trips() {
        let mut ks = Keyspace::new(EvictionPolicy::NoEviction, 0);
        set(&mut ks, &[Bytes::from_static(b"k"), Bytes::from_static(b"v")]).expect("set");
        assert_eq!(
            get(&mut ks, &[Bytes::from_static(b"k")]).expect("get"),
            RespValue::bulk(Bytes::from_static(b"v"))
        );
    }

    #[test]
    fn set_nx_rejects_when_key_exists() {
        let mut ks = Keyspace::new(EvictionPolicy::NoEviction, 0);
        set(&mut ks, &[Bytes::from_static(b"k"), Bytes::from_static(b"v")]).expect("set");
        let reply = set(&mut ks, &[
            Bytes::from_static(b"k"),
            Bytes::from_static(b"v2"),
            Bytes::from_static(b"NX"),
        ])
        .expect("set nx");
        assert_eq!(reply, RespValue::null_bulk());
    }

    #[test]
    fn incr_creates_key_at_zero_then_increments() {
        let mut ks = Keyspace::new(EvictionPolicy::NoEviction, 0);
        let reply = incr(&mut ks, &[Bytes::from_static(b"c")]).expect("incr");
        assert_eq!(reply, RespValue::Integer(1));
    }

    #[test]
    fn incr_on_non_integer_string_errors() {
        let mut ks = Keyspace::new(EvictionPolicy::NoEviction, 0);
        set(&mut ks, &[Bytes::from_static(b"k"), Bytes::from_static(b"abc")]).expect("set");
        assert!(matches!(
            incr(&mut ks, &[Bytes::from_static(b"k")]),
            Err(ServerError::NotAnInteger)
        ));
    }

    #[test]
    fn getset_returns_previous_value() {
        let mut ks = Keyspace::new(EvictionPolicy::NoEviction, 0);
        set(&mut ks, &[Bytes::from_static(b"k"), Bytes::from_static(b"old")]).expect("set");
        let reply =
            getset(&mut ks, &[Bytes::from_static(b"k"), Bytes::from_static(b"new")]).expect("getset");
        assert_eq!(reply, RespValue::bulk(Bytes::from_static(b"old")));
    }
}
