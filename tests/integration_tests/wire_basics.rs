// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use respdb::resp::RespValue;

use super::common::{bulk, start_server};

#[tokio::test]
async fn ping_replies_pong() {
    let server = start_server().await;
    let mut client = server.connect().await;

    assert_eq!(client.cmd("PING", &[]).await, RespValue::SimpleString("PONG".to_string()));
}

#[tokio::test]
async fn set_get_roundtrip() {
    let server = start_server().await;
    let mut client = server.connect().await;

    assert_eq!(client.cmd("SET", &["greeting", "hello"]).await, RespValue::ok());
    assert_eq!(client.cmd("GET", &["greeting"]).await, bulk("hello"));
    assert_eq!(client.cmd("GET", &["missing"]).await, RespValue::null_bulk());
}

#[tokio::test]
async fn incr_chain_and_type_error() {
    let server = start_server().await;
    let mut client = server.connect().await;

    assert_eq!(client.cmd("INCR", &["counter"]).await, RespValue::Integer(1));
    assert_eq!(client.cmd("INCRBY", &["counter", "41"]).await, RespValue::Integer(42));

    client.cmd("SET", &["notanumber", "abc"]).await;
    assert_eq!(client.cmd("INCR", &["notanumber"]).await, RespValue::error("ERR value is not an integer or out of range"));
}

#[tokio::test]
async fn expire_then_ttl_and_lazy_expiry() {
    let server = start_server().await;
    let mut client = server.connect().await;

    client.cmd("SET", &["k", "v"]).await;
    assert_eq!(client.cmd("EXPIRE", &["k", "100"]).await, RespValue::Integer(1));
    match client.cmd("TTL", &["k"]).await {
        RespValue::Integer(ttl) => assert!(ttl > 0 && ttl <= 100),
        other => panic!("expected integer TTL, got {other:?}"),
    }

    assert_eq!(client.cmd("EXPIRE", &["k", "0"]).await, RespValue::Integer(1));
    assert_eq!(client.cmd("GET", &["k"]).await, RespValue::null_bulk());
    assert_eq!(client.cmd("EXISTS", &["k"]).await, RespValue::Integer(0));
}

#[tokio::test]
async fn set_add_and_cardinality() {
    let server = start_server().await;
    let mut client = server.connect().await;

    assert_eq!(client.cmd("SADD", &["s", "a", "b", "a"]).await, RespValue::Integer(2));
    assert_eq!(client.cmd("SCARD", &["s"]).await, RespValue::Integer(2));
    assert_eq!(client.cmd("SISMEMBER", &["s", "a"]).await, RespValue::Integer(1));
    assert_eq!(client.cmd("SISMEMBER", &["s", "z"]).await, RespValue::Integer(0));
}

#[tokio::test]
async fn zadd_and_zrange_withscores() {
    let server = start_server().await;
    let mut client = server.connect().await;

    client.cmd("ZADD", &["leaderboard", "1", "alice", "2", "bob"]).await;
    let reply = client.cmd("ZRANGE", &["leaderboard", "0", "-1", "WITHSCORES"]).await;
    assert_eq!(
        reply,
        RespValue::array(vec![bulk("alice"), bulk("1"), bulk("bob"), bulk("2")])
    );
}

#[tokio::test]
async fn unknown_command_is_an_error() {
    let server = start_server().await;
    let mut client = server.connect().await;

    match client.cmd("FROBNICATE", &["x"]).await {
        RespValue::Error(msg) => assert!(msg.starts_with("ERR unknown command")),
        other => panic!("expected an error reply, got {other:?}"),
    }
}

#[tokio::test]
async fn wrong_arity_is_an_error() {
    let server = start_server().await;
    let mut client = server.connect().await;

    match client.cmd("GET", &[]).await {
        RespValue::Error(msg) => assert!(msg.contains("wrong number of arguments")),
        other => panic!("expected an error reply, got {other:?}"),
    }
}
