// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Generic key-space commands: `DEL`, `EXISTS`, `TYPE`,
//! `EXPIRE`, `PEXPIREAT`, `TTL`, `PTTL`, `PERSIST`, `RENAME`, `KEYS`,
//! `RANDOMKEY`.

use bytes::Bytes;

use crate::{
    commands::parse_i64,
    error::ServerError,
    resp::RespValue,
    storage::keyspace::{Keyspace, now_ms},
};

pub fn del(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    Ok(RespValue::Integer(ks.del(args) as i64))
}

pub fn exists(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    Ok(RespValue::Integer(ks.exists(args) as i64))
}

pub fn type_of(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    match ks.type_name(&args[0]) {
        Some(name) => Ok(RespValue::SimpleString(name.to_string())),
        None => Ok(RespValue::SimpleString("none".to_string())),
    }
}

/// `EXPIRE key seconds` — relative TTL.
pub fn expire(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    let seconds = parse_i64(&args[1])?;
    let at_ms = now_ms().saturating_add(seconds.saturating_mul(1000));
    Ok(RespValue::Integer(ks.expire_absolute_ms(&args[0], at_ms) as i64))
}

pub fn pexpireat(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    let at_ms = parse_i64(&args[1])?;
    Ok(RespValue::Integer(ks.expire_absolute_ms(&args[0], at_ms) as i64))
}

pub fn ttl(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    let ms = ks.ttl_ms(&args[0]);
    Ok(RespValue::Integer(if ms < 0 { ms } else { ms / 1000 }))
}

pub fn pttl(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    Ok(RespValue::Integer(ks.ttl_ms(&args[0])))
}

pub fn persist(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    Ok(RespValue::Integer(ks.persist(&args[0]) as i64))
}

pub fn rename(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    ks.rename(&args[0], &args[1])?;
    Ok(RespValue::ok())
}

pub fn keys(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    let matches = ks.keys_matching(&args[0]);
    Ok(RespValue::array(
        matches.into_iter().map(RespValue::bulk).collect(),
    ))
}

pub fn randomkey(ks: &mut Keyspace, _args: &[Bytes]) -> Result<RespValue, ServerError> {
    match ks.random_key() {
        Some(k) => Ok(RespValue::bulk(k)),
        None => Ok(RespValue::null_bulk()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{
        eviction::EvictionPolicy,
        string::StringValue,
        value::{Payload, Value},
    };

    fn ks_with(key: &str, val: &str) -> Keyspace {
        let mut ks = Keyspace::new(EvictionPolicy::NoEviction, 0);
        ks.set(
            Bytes::copy_from_slice(key.as_bytes()),
            Value::new(
                Payload::String(StringValue::new(Bytes::copy_from_slice(val.as_bytes()))),
                now_ms(),
            ),
        )
        .expect("set");
        ks
    }

    #[test]
    fn del_reports_removed_count() {
        let mut ks = ks_with("k", "v");
        let reply = del(&mut ks, &[Bytes::from_static(b"k"), Bytes::from_static(b"missing")])
            .expect("del");
        assert_eq!(reply, RespValue::Integer(1));
    }

    #[test]
    fn expire_then_ttl_round_trips_within_a_second() {
        let mut ks = ks_with("k", "v");
        expire(&mut ks, &[Bytes::from_static(b"k"), Bytes::from_static(b"100")]).expect("expire");
        let reply = ttl(&mut ks, &[Bytes::from_static(b"k")]).expect("ttl");
        match reply {
            RespValue::Integer(secs) => assert!((99..=100).contains(&secs)),
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[test]
    fn type_of_absent_key_is_none() {
        let mut ks = Keyspace::new(EvictionPolicy::NoEviction, 0);
        let reply = type_of(&mut ks, &[Bytes::from_static(b"missing")]).expect("type");
        assert_eq!(reply, RespValue::SimpleString("none".to_string()));
    }
}
