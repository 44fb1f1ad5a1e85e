// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The pub/sub engine: channel and glob-pattern fan-out.
//! State is read and written from every connection concurrently, so it
//! lives behind concurrent maps (`dashmap`) rather than the
//! single-writer discipline that governs keyspace mutation.

use std::collections::HashSet;

use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::mpsc::UnboundedSender;

use crate::{resp::RespValue, storage::glob::glob_match};

pub type ConnId = u64;

/// One subscribe/unsubscribe acknowledgement: `kind` is
/// `subscribe`/`unsubscribe`/`psubscribe`/`punsubscribe`.
pub struct SubAck {
    pub kind: &'static str,
    pub name: Bytes,
    pub remaining: usize,
}

#[derive(Default)]
pub struct PubSub {
    channels: DashMap<Bytes, HashSet<ConnId>>,
    patterns: DashMap<Bytes, HashSet<ConnId>>,
    conn_channels: DashMap<ConnId, HashSet<Bytes>>,
    conn_patterns: DashMap<ConnId, HashSet<Bytes>>,
    senders: DashMap<ConnId, UnboundedSender<RespValue>>,
}

impl PubSub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the outbound frame sender for a connection; must be
    /// called once a connection is accepted, before it can subscribe.
    pub fn register_connection(&self, conn: ConnId, sender: UnboundedSender<RespValue>) {
        self.senders.insert(conn, sender);
    }

    pub fn subscription_count(&self, conn: ConnId) -> usize {
        let channels = self.conn_channels.get(&conn).map(|s| s.len()).unwrap_or(0);
        let patterns = self.conn_patterns.get(&conn).map(|s| s.len()).unwrap_or(0);
        channels + patterns
    }

    pub fn is_subscribed(&self, conn: ConnId) -> bool {
        self.subscription_count(conn) > 0
    }

    pub fn subscribe(&self, conn: ConnId, channel: Bytes) -> SubAck {
        self.channels.entry(channel.clone()).or_default().insert(conn);
        self.conn_channels.entry(conn).or_default().insert(channel.clone());
        SubAck {
            kind: "subscribe",
            name: channel,
            remaining: self.subscription_count(conn),
        }
    }

    pub fn psubscribe(&self, conn: ConnId, pattern: Bytes) -> SubAck {
        self.patterns.entry(pattern.clone()).or_default().insert(conn);
        self.conn_patterns.entry(conn).or_default().insert(pattern.clone());
        SubAck {
            kind: "psubscribe",
            name: pattern,
            remaining: self.subscription_count(conn),
        }
    }

    pub fn unsubscribe(&self, conn: ConnId, channel: &[u8]) -> SubAck {
        if let Some(mut subs) = self.channels.get_mut(channel) {
            subs.remove(&conn);
        }
        if let Some(mut mine) = self.conn_channels.get_mut(&conn) {
            mine.remove(channel);
        }
        SubAck {
            kind: "unsubscribe",
            name: Bytes::copy_from_slice(channel),
            remaining: self.subscription_count(conn),
        }
    }

    pub fn punsubscribe(&self, conn: ConnId, pattern: &[u8]) -> SubAck {
        if let Some(mut subs) = self.patterns.get_mut(pattern) {
            subs.remove(&conn);
        }
        if let Some(mut mine) = self.conn_patterns.get_mut(&conn) {
            mine.remove(pattern);
        }
        SubAck {
            kind: "punsubscribe",
            name: Bytes::copy_from_slice(pattern),
            remaining: self.subscription_count(conn),
        }
    }

    /// All channels this connection currently holds, for a no-argument
    /// `UNSUBSCRIBE`.
    pub fn channels_of(&self, conn: ConnId) -> Vec<Bytes> {
        self.conn_channels
            .get(&conn)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn patterns_of(&self, conn: ConnId) -> Vec<Bytes> {
        self.conn_patterns
            .get(&conn)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Delivers `payload` on `channel` to every direct subscriber and every
    /// pattern subscriber whose glob matches. Returns the total delivery
    /// count.
    pub fn publish(&self, channel: &[u8], payload: &Bytes) -> i64 {
        let mut delivered = 0i64;

        if let Some(subs) = self.channels.get(channel) {
            for &conn in subs.iter() {
                if self.send(conn, RespValue::array(vec![
                    RespValue::bulk(Bytes::from_static(b"message")),
                    RespValue::bulk(Bytes::copy_from_slice(channel)),
                    RespValue::bulk(payload.clone()),
                ])) {
                    delivered += 1;
                }
            }
        }

        for entry in self.patterns.iter() {
            let pattern = entry.key();
            if !glob_match(pattern, channel) {
                continue;
            }
            for &conn in entry.value().iter() {
                if self.send(conn, RespValue::array(vec![
                    RespValue::bulk(Bytes::from_static(b"pmessage")),
                    RespValue::bulk(pattern.clone()),
                    RespValue::bulk(Bytes::copy_from_slice(channel)),
                    RespValue::bulk(payload.clone()),
                ])) {
                    delivered += 1;
                }
            }
        }

        delivered
    }

    fn send(&self, conn: ConnId, frame: RespValue) -> bool {
        match self.senders.get(&conn) {
            Some(tx) => tx.send(frame).is_ok(),
            None => false,
        }
    }

    /// Unconditional cleanup on connection close.
    pub fn disconnect(&self, conn: ConnId) {
        if let Some((_, channels)) = self.conn_channels.remove(&conn) {
            for channel in channels {
                if let Some(mut subs) = self.channels.get_mut(&channel) {
                    subs.remove(&conn);
                }
            }
        }
        if let Some((_, patterns)) = self.conn_patterns.remove(&conn) {
            for pattern in patterns {
                if let Some(mut subs) = self.patterns.get_mut(&pattern) {
                    subs.remove(&conn);
                }
            }
        }
        self.senders.remove(&conn);
    }
}
