// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Hash commands.

use bytes::Bytes;

use crate::{
    commands::parse_i64,
    error::ServerError,
    resp::RespValue,
    storage::{
        hash::HashValue,
        keyspace::Keyspace,
        value::{Payload, Value},
    },
};

fn as_hash(value: &Value) -> Result<&HashValue, ServerError> {
    match &value.payload {
        Payload::Hash(h) => Ok(h),
        _ => Err(ServerError::WrongType),
    }
}

fn as_hash_mut(value: &mut Value) -> Result<&mut HashValue, ServerError> {
    match &mut value.payload {
        Payload::Hash(h) => Ok(h),
        _ => Err(ServerError::WrongType),
    }
}

pub fn hset(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    let key = &args[0];
    let value = ks.get_or_create_mut(key, || Payload::Hash(HashValue::new()))?;
    let is_new = as_hash_mut(value)?.set(args[1].clone(), args[2].clone());
    ks.mark_written(key);
    Ok(RespValue::Integer(is_new as i64))
}

pub fn hget(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    match ks.get(&args[0]) {
        Some(v) => match as_hash(v)?.get(&args[1]) {
            Some(b) => Ok(RespValue::bulk(b.clone())),
            None => Ok(RespValue::null_bulk()),
        },
        None => Ok(RespValue::null_bulk()),
    }
}

pub fn hdel(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    let key = &args[0];
    let Some(value) = ks.get_mut_for_write(key) else {
        return Ok(RespValue::Integer(0));
    };
    let removed = as_hash_mut(value)?.del(&args[1..]);
    ks.mark_written(key);
    ks.delete_if_empty_collection(key);
    Ok(RespValue::Integer(removed as i64))
}

pub fn hexists(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    match ks.get(&args[0]) {
        Some(v) => Ok(RespValue::Integer(as_hash(v)?.exists(&args[1]) as i64)),
        None => Ok(RespValue::Integer(0)),
    }
}

pub fn hlen(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    match ks.get(&args[0]) {
        Some(v) => Ok(RespValue::Integer(as_hash(v)?.len() as i64)),
        None => Ok(RespValue::Integer(0)),
    }
}

pub fn hgetall(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    match ks.get(&args[0]) {
        Some(v) => {
            let mut items = Vec::new();
            for (field, value) in as_hash(v)?.get_all() {
                items.push(RespValue::bulk(field.clone()));
                items.push(RespValue::bulk(value.clone()));
            }
            Ok(RespValue::array(items))
        },
        None => Ok(RespValue::array(Vec::new())),
    }
}

pub fn hkeys(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    match ks.get(&args[0]) {
        Some(v) => Ok(RespValue::array(
            as_hash(v)?.keys().cloned().map(RespValue::bulk).collect(),
        )),
        None => Ok(RespValue::array(Vec::new())),
    }
}

pub fn hvals(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    match ks.get(&args[0]) {
        Some(v) => Ok(RespValue::array(
            as_hash(v)?.values().cloned().map(RespValue::bulk).collect(),
        )),
        None => Ok(RespValue::array(Vec::new())),
    }
}

pub fn hincrby(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    let key = &args[0];
    let delta = parse_i64(&args[2])?;
    let value = ks.get_or_create_mut(key, || Payload::Hash(HashValue::new()))?;
    let next = as_hash_mut(value)?.incr_by(&args[1], delta)?;
    ks.mark_written(key);
    Ok(RespValue::Integer(next))
}

pub fn hsetnx(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    let key = &args[0];
    let value = ks.get_or_create_mut(key, || Payload::Hash(HashValue::new()))?;
    let set = as_hash_mut(value)?.set_if_absent(args[1].clone(), args[2].clone());
    ks.mark_written(key);
    Ok(RespValue::Integer(set as i64))
}
