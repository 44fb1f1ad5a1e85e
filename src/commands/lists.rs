// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! List commands.

use bytes::Bytes;

use crate::{
    commands::parse_i64,
    error::ServerError,
    resp::RespValue,
    storage::{
        keyspace::Keyspace,
        list::ListValue,
        value::{Payload, Value},
    },
};

fn as_list(value: &Value) -> Result<&ListValue, ServerError> {
    match &value.payload {
        Payload::List(l) => Ok(l),
        _ => Err(ServerError::WrongType),
    }
}

fn as_list_mut(value: &mut Value) -> Result<&mut ListValue, ServerError> {
    match &mut value.payload {
        Payload::List(l) => Ok(l),
        _ => Err(ServerError::WrongType),
    }
}

fn push(
    ks: &mut Keyspace,
    args: &[Bytes],
    front: bool,
    only_if_exists: bool,
) -> Result<RespValue, ServerError> {
    let key = &args[0];
    let values = &args[1..];

    if only_if_exists && ks.exists(std::slice::from_ref(key)) == 0 {
        return Ok(RespValue::Integer(0));
    }

    let value = ks.get_or_create_mut(key, || Payload::List(ListValue::new()))?;
    let list = as_list_mut(value)?;
    if front {
        list.push_front(values.iter().cloned());
    } else {
        list.push_back(values.iter().cloned());
    }
    let len = list.len();
    ks.mark_written(key);
    Ok(RespValue::Integer(len as i64))
}

pub fn lpush(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    push(ks, args, true, false)
}

pub fn rpush(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    push(ks, args, false, false)
}

pub fn lpushx(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    push(ks, args, true, true)
}

pub fn rpushx(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    push(ks, args, false, true)
}

fn pop(ks: &mut Keyspace, args: &[Bytes], front: bool) -> Result<RespValue, ServerError> {
    let key = &args[0];
    let Some(value) = ks.get_mut_for_write(key) else {
        return Ok(RespValue::null_bulk());
    };
    let list = as_list_mut(value)?;
    let popped = if front { list.pop_front() } else { list.pop_back() };
    ks.mark_written(key);
    ks.delete_if_empty_collection(key);
    match popped {
        Some(v) => Ok(RespValue::bulk(v)),
        None => Ok(RespValue::null_bulk()),
    }
}

pub fn lpop(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    pop(ks, args, true)
}

pub fn rpop(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    pop(ks, args, false)
}

pub fn lrange(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    let start = parse_i64(&args[1])?;
    let stop = parse_i64(&args[2])?;
    match ks.get(&args[0]) {
        Some(v) => Ok(RespValue::array(
            as_list(v)?.range_inclusive(start, stop).into_iter().map(RespValue::bulk).collect(),
        )),
        None => Ok(RespValue::array(Vec::new())),
    }
}

pub fn llen(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    match ks.get(&args[0]) {
        Some(v) => Ok(RespValue::Integer(as_list(v)?.len() as i64)),
        None => Ok(RespValue::Integer(0)),
    }
}

pub fn lindex(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    let idx = parse_i64(&args[1])?;
    match ks.get(&args[0]) {
        Some(v) => match as_list(v)?.index(idx) {
            Some(b) => Ok(RespValue::bulk(b.clone())),
            None => Ok(RespValue::null_bulk()),
        },
        None => Ok(RespValue::null_bulk()),
    }
}

pub fn lset(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    let key = &args[0];
    let idx = parse_i64(&args[1])?;
    let Some(value) = ks.get_mut_for_write(key) else {
        return Err(ServerError::StateError("no such key".to_string()));
    };
    if !as_list_mut(value)?.set(idx, args[2].clone()) {
        return Err(ServerError::StateError("index out of range".to_string()));
    }
    ks.mark_written(key);
    Ok(RespValue::ok())
}

pub fn ltrim(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    let key = &args[0];
    let start = parse_i64(&args[1])?;
    let stop = parse_i64(&args[2])?;
    if let Some(value) = ks.get_mut_for_write(key) {
        as_list_mut(value)?.trim(start, stop);
        ks.mark_written(key);
        ks.delete_if_empty_collection(key);
    }
    Ok(RespValue::ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::eviction::EvictionPolicy;

    #[test]
    fn rpush_then_lrange_preserves_order() {
        let mut ks = Keyspace::new(EvictionPolicy::NoEviction, 0);
        rpush(&mut ks, &[Bytes::from_static(b"l"), Bytes::from_static(b"a"), Bytes::from_static(b"b")])
            .expect("rpush");
        let reply = lrange(&mut ks, &[
            Bytes::from_static(b"l"),
            Bytes::from_static(b"0"),
            Bytes::from_static(b"-1"),
        ])
        .expect("lrange");
        assert_eq!(
            reply,
            RespValue::array(vec![
                RespValue::bulk(Bytes::from_static(b"a")),
                RespValue::bulk(Bytes::from_static(b"b"))
            ])
        );
    }

    #[test]
    fn lpushx_is_noop_on_missing_key() {
        let mut ks = Keyspace::new(EvictionPolicy::NoEviction, 0);
        let reply = lpushx(&mut ks, &[Bytes::from_static(b"l"), Bytes::from_static(b"a")])
            .expect("lpushx");
        assert_eq!(reply, RespValue::Integer(0));
        assert_eq!(llen(&mut ks, &[Bytes::from_static(b"l")]).expect("llen"), RespValue::Integer(0));
    }

    #[test]
    fn popping_to_empty_deletes_the_key() {
        let mut ks = Keyspace::new(EvictionPolicy::NoEviction, 0);
        rpush(&mut ks, &[Bytes::from_static(b"l"), Bytes::from_static(b"a")]).expect("rpush");
        pop(&mut ks, &[Bytes::from_static(b"l")], false).expect("rpop");
        assert_eq!(ks.exists(&[Bytes::from_static(b"l")]), 0);
    }
}
