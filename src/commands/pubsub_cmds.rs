// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! `SUBSCRIBE`/`UNSUBSCRIBE`/`PSUBSCRIBE`/`PUNSUBSCRIBE`/`PUBLISH`.
//! Each subscribe/unsubscribe variant replies once per
//! channel or pattern named.

use bytes::Bytes;

use crate::{
    error::ServerError,
    pubsub::{ConnId, PubSub, SubAck},
    resp::RespValue,
};

fn ack_frame(ack: SubAck) -> RespValue {
    RespValue::array(vec![
        RespValue::bulk(Bytes::from_static(ack.kind.as_bytes())),
        RespValue::bulk(ack.name),
        RespValue::Integer(ack.remaining as i64),
    ])
}

pub fn subscribe(ps: &PubSub, conn: ConnId, args: &[Bytes]) -> Result<RespValue, ServerError> {
    Ok(RespValue::array(
        args.iter().map(|ch| ack_frame(ps.subscribe(conn, ch.clone()))).collect(),
    ))
}

pub fn psubscribe(ps: &PubSub, conn: ConnId, args: &[Bytes]) -> Result<RespValue, ServerError> {
    Ok(RespValue::array(
        args.iter().map(|p| ack_frame(ps.psubscribe(conn, p.clone()))).collect(),
    ))
}

pub fn unsubscribe(ps: &PubSub, conn: ConnId, args: &[Bytes]) -> Result<RespValue, ServerError> {
    let targets: Vec<Bytes> = if args.is_empty() { ps.channels_of(conn) } else { args.to_vec() };
    if targets.is_empty() {
        return Ok(RespValue::array(vec![ack_frame(SubAck {
            kind: "unsubscribe",
            name: Bytes::new(),
            remaining: ps.subscription_count(conn),
        })]));
    }
    Ok(RespValue::array(
        targets.iter().map(|ch| ack_frame(ps.unsubscribe(conn, ch))).collect(),
    ))
}

pub fn punsubscribe(ps: &PubSub, conn: ConnId, args: &[Bytes]) -> Result<RespValue, ServerError> {
    let targets: Vec<Bytes> = if args.is_empty() { ps.patterns_of(conn) } else { args.to_vec() };
    if targets.is_empty() {
        return Ok(RespValue::array(vec![ack_frame(SubAck {
            kind: "punsubscribe",
            name: Bytes::new(),
            remaining: ps.subscription_count(conn),
        })]));
    }
    Ok(RespValue::array(
        targets.iter().map(|p| ack_frame(ps.punsubscribe(conn, p))).collect(),
    ))
}

pub fn publish(ps: &PubSub, args: &[Bytes]) -> Result<RespValue, ServerError> {
    let delivered = ps.publish(&args[0], &args[1]);
    Ok(RespValue::Integer(delivered))
}
