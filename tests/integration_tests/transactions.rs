// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use respdb::resp::RespValue;

use super::common::{bulk, start_server};

#[tokio::test]
async fn multi_queues_then_exec_runs_in_order() {
    let server = start_server().await;
    let mut client = server.connect().await;

    assert_eq!(client.cmd("MULTI", &[]).await, RespValue::ok());
    assert_eq!(client.cmd("SET", &["a", "1"]).await, RespValue::SimpleString("QUEUED".to_string()));
    assert_eq!(client.cmd("INCR", &["a"]).await, RespValue::SimpleString("QUEUED".to_string()));

    let exec_reply = client.cmd("EXEC", &[]).await;
    assert_eq!(exec_reply, RespValue::array(vec![RespValue::ok(), RespValue::Integer(2)]));
    assert_eq!(client.cmd("GET", &["a"]).await, bulk("2"));
}

#[tokio::test]
async fn exec_without_multi_is_an_error() {
    let server = start_server().await;
    let mut client = server.connect().await;

    match client.cmd("EXEC", &[]).await {
        RespValue::Error(msg) => assert!(msg.contains("EXEC without MULTI")),
        other => panic!("expected an error, got {other:?}"),
    }
}

#[tokio::test]
async fn watch_aborts_exec_when_key_changes_from_another_connection() {
    let server = start_server().await;
    let mut watcher = server.connect().await;
    let mut other = server.connect().await;

    watcher.cmd("SET", &["balance", "100"]).await;
    watcher.cmd("WATCH", &["balance"]).await;
    watcher.cmd("MULTI", &[]).await;
    watcher.cmd("GET", &["balance"]).await;

    other.cmd("SET", &["balance", "999"]).await;

    assert_eq!(watcher.cmd("EXEC", &[]).await, RespValue::null_array());
    assert_eq!(watcher.cmd("GET", &["balance"]).await, bulk("999"));
}

#[tokio::test]
async fn discard_drops_the_queued_batch() {
    let server = start_server().await;
    let mut client = server.connect().await;

    client.cmd("MULTI", &[]).await;
    client.cmd("SET", &["k", "v"]).await;
    assert_eq!(client.cmd("DISCARD", &[]).await, RespValue::ok());
    assert_eq!(client.cmd("GET", &["k"]).await, RespValue::null_bulk());
}

#[tokio::test]
async fn a_failing_queued_command_becomes_an_error_entry_but_others_still_run() {
    let server = start_server().await;
    let mut client = server.connect().await;

    client.cmd("SET", &["s", "not-a-number"]).await;
    client.cmd("MULTI", &[]).await;
    client.cmd("INCR", &["s"]).await;
    client.cmd("SET", &["t", "ok"]).await;

    let exec_reply = client.cmd("EXEC", &[]).await;
    match exec_reply {
        RespValue::Array(Some(items)) => {
            assert_eq!(items.len(), 2);
            assert!(matches!(&items[0], RespValue::Error(_)));
            assert_eq!(items[1], RespValue::ok());
        },
        other => panic!("expected a two-element array, got {other:?}"),
    }
    assert_eq!(client.cmd("GET", &["t"]).await, bulk("ok"));
}
