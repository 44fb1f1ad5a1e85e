// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use respdb::resp::RespValue;

use super::common::{bulk, start_server};

#[tokio::test]
async fn subscribe_receives_published_message() {
    let server = start_server().await;
    let mut subscriber = server.connect().await;
    let mut publisher = server.connect().await;

    let ack = subscriber.cmd("SUBSCRIBE", &["news"]).await;
    assert_eq!(
        ack,
        RespValue::array(vec![RespValue::array(vec![bulk("subscribe"), bulk("news"), RespValue::Integer(1)])])
    );

    assert_eq!(publisher.cmd("PUBLISH", &["news", "hello"]).await, RespValue::Integer(1));

    let delivered = subscriber.read().await;
    assert_eq!(
        delivered,
        RespValue::array(vec![bulk("message"), bulk("news"), bulk("hello")])
    );
}

#[tokio::test]
async fn psubscribe_matches_glob_pattern() {
    let server = start_server().await;
    let mut subscriber = server.connect().await;
    let mut publisher = server.connect().await;

    subscriber.cmd("PSUBSCRIBE", &["news.*"]).await;
    assert_eq!(publisher.cmd("PUBLISH", &["news.sports", "goal"]).await, RespValue::Integer(1));

    let delivered = subscriber.read().await;
    assert_eq!(
        delivered,
        RespValue::array(vec![bulk("pmessage"), bulk("news.*"), bulk("news.sports"), bulk("goal")])
    );
}

#[tokio::test]
async fn publish_with_no_subscribers_delivers_to_nobody() {
    let server = start_server().await;
    let mut publisher = server.connect().await;

    assert_eq!(publisher.cmd("PUBLISH", &["quiet", "anyone?"]).await, RespValue::Integer(0));
}
