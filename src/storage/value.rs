// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The tagged-union value type stored behind every key.

use crate::storage::{
    hash::HashValue, list::ListValue, set::SetValue, string::StringValue,
    zset::SortedSetValue,
};

/// One of the five typed payloads a key can hold.
#[derive(Debug, Clone)]
pub enum Payload {
    String(StringValue),
    List(ListValue),
    Hash(HashValue),
    Set(SetValue),
    SortedSet(SortedSetValue),
}

impl Payload {
    pub fn type_name(&self) -> &'static str {
        match self {
            Payload::String(_) => "string",
            Payload::List(_) => "list",
            Payload::Hash(_) => "hash",
            Payload::Set(_) => "set",
            Payload::SortedSet(_) => "zset",
        }
    }

    /// A payload is "empty" when it is a collection container with no
    /// elements. Strings are never considered empty by this rule — only
    /// collection containers are deleted on going empty.
    pub fn is_empty_collection(&self) -> bool {
        match self {
            Payload::String(_) => false,
            Payload::List(l) => l.len() == 0,
            Payload::Hash(h) => h.len() == 0,
            Payload::Set(s) => s.is_empty(),
            Payload::SortedSet(z) => z.len() == 0,
        }
    }
}

/// A value: its typed payload plus the bookkeeping the keyspace and
/// eviction policies need.
#[derive(Debug, Clone)]
pub struct Value {
    pub payload: Payload,
    pub created_at_ms: i64,
    pub last_access_ms: i64,
    pub access_count: u64,
    /// Absolute expiration in epoch milliseconds. `None` = persistent.
    pub expires_at_ms: Option<i64>,
}

impl Value {
    pub fn new(payload: Payload, now_ms: i64) -> Self {
        Self {
            payload,
            created_at_ms: now_ms,
            last_access_ms: now_ms,
            access_count: 0,
            expires_at_ms: None,
        }
    }

    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        matches!(self.expires_at_ms, Some(t) if now_ms > t)
    }

    pub fn touch(&mut self, now_ms: i64) {
        self.last_access_ms = now_ms;
        self.access_count = self.access_count.saturating_add(1);
    }
}
