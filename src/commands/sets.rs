// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Set commands.

use bytes::Bytes;

use crate::{
    commands::parse_usize,
    error::ServerError,
    resp::RespValue,
    storage::{
        keyspace::Keyspace,
        set::SetValue,
        value::{Payload, Value},
    },
};

fn as_set(value: &Value) -> Result<&SetValue, ServerError> {
    match &value.payload {
        Payload::Set(s) => Ok(s),
        _ => Err(ServerError::WrongType),
    }
}

fn as_set_mut(value: &mut Value) -> Result<&mut SetValue, ServerError> {
    match &mut value.payload {
        Payload::Set(s) => Ok(s),
        _ => Err(ServerError::WrongType),
    }
}

fn empty_set() -> SetValue {
    SetValue::new()
}

pub fn sadd(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    let key = &args[0];
    let value = ks.get_or_create_mut(key, || Payload::Set(empty_set()))?;
    let added = as_set_mut(value)?.add(args[1..].iter().cloned());
    ks.mark_written(key);
    Ok(RespValue::Integer(added as i64))
}

pub fn srem(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    let key = &args[0];
    let Some(value) = ks.get_mut_for_write(key) else {
        return Ok(RespValue::Integer(0));
    };
    let removed = as_set_mut(value)?.rem(&args[1..]);
    ks.mark_written(key);
    ks.delete_if_empty_collection(key);
    Ok(RespValue::Integer(removed as i64))
}

pub fn smembers(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    match ks.get(&args[0]) {
        Some(v) => Ok(RespValue::array(
            as_set(v)?.members().cloned().map(RespValue::bulk).collect(),
        )),
        None => Ok(RespValue::array(Vec::new())),
    }
}

pub fn sismember(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    match ks.get(&args[0]) {
        Some(v) => Ok(RespValue::Integer(as_set(v)?.contains(&args[1]) as i64)),
        None => Ok(RespValue::Integer(0)),
    }
}

pub fn scard(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    match ks.get(&args[0]) {
        Some(v) => Ok(RespValue::Integer(as_set(v)?.card() as i64)),
        None => Ok(RespValue::Integer(0)),
    }
}

pub fn srandmember(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    let n = if args.len() > 1 { parse_usize(&args[1])? } else { 1 };
    match ks.get(&args[0]) {
        Some(v) => {
            let sample = as_set(v)?.random_sample(n);
            if args.len() > 1 {
                Ok(RespValue::array(sample.into_iter().map(RespValue::bulk).collect()))
            } else {
                match sample.into_iter().next() {
                    Some(m) => Ok(RespValue::bulk(m)),
                    None => Ok(RespValue::null_bulk()),
                }
            }
        },
        None if args.len() > 1 => Ok(RespValue::array(Vec::new())),
        None => Ok(RespValue::null_bulk()),
    }
}

pub fn spop(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    let key = &args[0];
    let Some(value) = ks.get_mut_for_write(key) else {
        return Ok(RespValue::null_bulk());
    };
    let popped = as_set_mut(value)?.pop_random();
    ks.mark_written(key);
    ks.delete_if_empty_collection(key);
    match popped {
        Some(m) => Ok(RespValue::bulk(m)),
        None => Ok(RespValue::null_bulk()),
    }
}

fn combine(
    ks: &mut Keyspace,
    args: &[Bytes],
    op: impl Fn(&SetValue, &SetValue) -> Vec<Bytes>,
) -> Result<RespValue, ServerError> {
    let a = match ks.get(&args[0]) {
        Some(v) => as_set(v)?.clone(),
        None => empty_set(),
    };
    let b = match ks.get(&args[1]) {
        Some(v) => as_set(v)?.clone(),
        None => empty_set(),
    };
    Ok(RespValue::array(op(&a, &b).into_iter().map(RespValue::bulk).collect()))
}

pub fn sinter(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    combine(ks, args, |a, b| a.inter(b))
}

pub fn sunion(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    combine(ks, args, |a, b| a.union(b))
}

pub fn sdiff(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    combine(ks, args, |a, b| a.diff(b))
}

pub fn smove(ks: &mut Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    let (src, dst, member) = (&args[0], &args[1], &args[2]);
    let removed = match ks.get_mut_for_write(src) {
        Some(v) => as_set_mut(v)?.rem(std::slice::from_ref(member)) == 1,
        None => false,
    };
    if !removed {
        return Ok(RespValue::Integer(0));
    }
    ks.mark_written(src);
    ks.delete_if_empty_collection(src);

    let dst_value = ks.get_or_create_mut(dst, || Payload::Set(empty_set()))?;
    as_set_mut(dst_value)?.add([member.clone()]);
    ks.mark_written(dst);
    Ok(RespValue::Integer(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::eviction::EvictionPolicy;

    #[test]
    fn sadd_reports_new_members_and_scard_matches() {
        let mut ks = Keyspace::new(EvictionPolicy::NoEviction, 0);
        let r1 = sadd(&mut ks, &[
            Bytes::from_static(b"s"),
            Bytes::from_static(b"a"),
            Bytes::from_static(b"b"),
            Bytes::from_static(b"c"),
        ])
        .expect("sadd");
        assert_eq!(r1, RespValue::Integer(3));
        let r2 = sadd(&mut ks, &[Bytes::from_static(b"s"), Bytes::from_static(b"b")]).expect("sadd");
        assert_eq!(r2, RespValue::Integer(0));
        assert_eq!(
            scard(&mut ks, &[Bytes::from_static(b"s")]).expect("scard"),
            RespValue::Integer(3)
        );
    }

    #[test]
    fn smove_transfers_membership() {
        let mut ks = Keyspace::new(EvictionPolicy::NoEviction, 0);
        sadd(&mut ks, &[Bytes::from_static(b"a"), Bytes::from_static(b"x")]).expect("sadd");
        let moved = smove(&mut ks, &[
            Bytes::from_static(b"a"),
            Bytes::from_static(b"b"),
            Bytes::from_static(b"x"),
        ])
        .expect("smove");
        assert_eq!(moved, RespValue::Integer(1));
        assert_eq!(sismember(&mut ks, &[Bytes::from_static(b"a"), Bytes::from_static(b"x")]).expect("sismember"), RespValue::Integer(0));
        assert_eq!(sismember(&mut ks, &[Bytes::from_static(b"b"), Bytes::from_static(b"x")]).expect("sismember"), RespValue::Integer(1));
    }
}
