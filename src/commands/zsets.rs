// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Sorted set commands.

use bytes::Bytes;

use crate::{
    commands::{parse_f64, parse_i64},
    error::ServerError,
    resp::RespValue,
    storage::{
        keyspace::Keyspace,
        value::{Payload, Value},
        zset::{AddOutcome, SortedSetValue},
    },
};

fn as_zset(value: &Value) -> Result<&SortedSetValue, ServerError> {
    match &value.payload {
        Payload::SortedSet(z) => Ok(z),
        _ => Err(ServerError::WrongType),
    }
}

fn as_zset_mut(value: &mut Value) -> Result<&mut SortedSetValue, ServerError> {
    match &mut value.payload {
        Payload::SortedSet(z) => Ok(z),
        _ => Err(ServerError::WrongType),
    }
}

/// `ZADD key score member [score member ...]`.
pub fn zadd(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    let key = &args[0];
    let pairs = &args[1..];
    if pairs.is_empty() || pairs.len() % 2 != 0 {
        return Err(ServerError::WrongArity("ZADD".to_string()));
    }

    let value = ks.get_or_create_mut(key, || Payload::SortedSet(SortedSetValue::new()))?;
    let zset = as_zset_mut(value)?;
    let mut added = 0i64;
    for pair in pairs.chunks(2) {
        let score = parse_f64(&pair[0])?;
        if let AddOutcome::Added = zset.add(score, pair[1].clone())? {
            added += 1;
        }
    }
    ks.mark_written(key);
    Ok(RespValue::Integer(added))
}

pub fn zrem(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    let key = &args[0];
    let Some(value) = ks.get_mut_for_write(key) else {
        return Ok(RespValue::Integer(0));
    };
    let removed = as_zset_mut(value)?.rem(&args[1..]);
    ks.mark_written(key);
    ks.delete_if_empty_collection(key);
    Ok(RespValue::Integer(removed as i64))
}

pub fn zscore(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    match ks.get(&args[0]) {
        Some(v) => match as_zset(v)?.score(&args[1]) {
            Some(s) => Ok(RespValue::bulk(Bytes::from(format_score(s)))),
            None => Ok(RespValue::null_bulk()),
        },
        None => Ok(RespValue::null_bulk()),
    }
}

pub fn zcard(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    match ks.get(&args[0]) {
        Some(v) => Ok(RespValue::Integer(as_zset(v)?.len() as i64)),
        None => Ok(RespValue::Integer(0)),
    }
}

fn rank(ks: &mut Keyspace, args: &[Bytes], reverse: bool) -> Result<RespValue, ServerError> {
    match ks.get(&args[0]) {
        Some(v) => match as_zset(v)?.rank(&args[1], reverse) {
            Some(r) => Ok(RespValue::Integer(r as i64)),
            None => Ok(RespValue::null_bulk()),
        },
        None => Ok(RespValue::null_bulk()),
    }
}

pub fn zrank(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    rank(ks, args, false)
}

pub fn zrevrank(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    rank(ks, args, true)
}

fn range_reply(items: Vec<(Bytes, f64)>, with_scores: bool) -> RespValue {
    let mut out = Vec::with_capacity(items.len() * if with_scores { 2 } else { 1 });
    for (member, score) in items {
        out.push(RespValue::bulk(member));
        if with_scores {
            out.push(RespValue::bulk(Bytes::from(format_score(score))));
        }
    }
    RespValue::array(out)
}

fn range(ks: &mut Keyspace, args: &[Bytes], reverse: bool) -> Result<RespValue, ServerError> {
    let start = parse_i64(&args[1])?;
    let stop = parse_i64(&args[2])?;
    let with_scores = match args.get(3) {
        Some(opt) => {
            if opt.eq_ignore_ascii_case(b"WITHSCORES") {
                true
            } else {
                return Err(ServerError::SyntaxError);
            }
        },
        None => false,
    };
    match ks.get(&args[0]) {
        Some(v) => Ok(range_reply(as_zset(v)?.range_by_rank(start, stop, reverse), with_scores)),
        None => Ok(RespValue::array(Vec::new())),
    }
}

pub fn zrange(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    range(ks, args, false)
}

pub fn zrevrange(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    range(ks, args, true)
}

pub fn zrangebyscore(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    let min = parse_f64(&args[1])?;
    let max = parse_f64(&args[2])?;
    match ks.get(&args[0]) {
        Some(v) => Ok(range_reply(as_zset(v)?.range_by_score(min, max), false)),
        None => Ok(RespValue::array(Vec::new())),
    }
}

pub fn zcount(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    let min = parse_f64(&args[1])?;
    let max = parse_f64(&args[2])?;
    match ks.get(&args[0]) {
        Some(v) => Ok(RespValue::Integer(as_zset(v)?.count_by_score(min, max) as i64)),
        None => Ok(RespValue::Integer(0)),
    }
}

pub fn zincrby(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    let key = &args[0];
    let delta = parse_f64(&args[1])?;
    let value = ks.get_or_create_mut(key, || Payload::SortedSet(SortedSetValue::new()))?;
    let next = as_zset_mut(value)?.incr_by(args[2].clone(), delta)?;
    ks.mark_written(key);
    Ok(RespValue::bulk(Bytes::from(format_score(next))))
}

/// Formats a score the way RESP bulk replies carry floats: integral values
/// drop the fractional part, matching what `ZSCORE`/`ZINCRBY` clients expect.
fn format_score(score: f64) -> String {
    if score.fract() == 0.0 && score.is_finite() {
        format!("{}", score as i64)
    } else {
        format!("{score}")
    }
}
