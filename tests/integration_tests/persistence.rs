// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use respdb::resp::RespValue;

use super::common::{bulk, start_server_with};

#[tokio::test]
async fn save_then_restart_recovers_the_snapshot() {
    let server = start_server_with(|_| {}).await;
    let mut client = server.connect().await;
    client.cmd("SET", &["durable", "yes"]).await;
    assert_eq!(client.cmd("SAVE", &[]).await, RespValue::ok());

    let restarted = server.restart().await;
    let mut client = restarted.connect().await;
    assert_eq!(client.cmd("GET", &["durable"]).await, bulk("yes"));
}

#[tokio::test]
async fn appendonly_replays_writes_after_restart() {
    let server = start_server_with(|cfg| cfg.appendonly = true).await;
    let mut client = server.connect().await;
    client.cmd("SET", &["k1", "v1"]).await;
    client.cmd("INCR", &["counter"]).await;
    client.cmd("INCR", &["counter"]).await;

    // give the AOF writer a moment to flush the appended commands.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let restarted = server.restart().await;
    let mut client = restarted.connect().await;
    assert_eq!(client.cmd("GET", &["k1"]).await, bulk("v1"));
    assert_eq!(client.cmd("GET", &["counter"]).await, bulk("2"));
}

#[tokio::test]
async fn bgrewriteaof_without_appendonly_is_an_error() {
    let server = start_server_with(|_| {}).await;
    let mut client = server.connect().await;

    match client.cmd("BGREWRITEAOF", &[]).await {
        RespValue::Error(msg) => assert!(msg.contains("AOF is not enabled")),
        other => panic!("expected an error, got {other:?}"),
    }
}
