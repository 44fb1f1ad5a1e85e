// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Eviction policies. Selection runs inline on the write
//! path, before install, and is bounded by the size of the candidate set
//! handed to it rather than by scanning the full keyspace from scratch.

use bytes::Bytes;
use rand::seq::IteratorRandom;

use crate::storage::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// Reject writes with an out-of-memory error when over budget.
    NoEviction,
    /// Evict the key with the oldest `last_access_ms`.
    Lru,
    /// Evict the key with the lowest `access_count`, oldest first on ties.
    Lfu,
    /// Evict an arbitrary key.
    Random,
    /// Evict the key with the smallest remaining time-to-live. Only
    /// considers keys that actually carry an expiration.
    Ttl,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        EvictionPolicy::NoEviction
    }
}

/// Picks a single eviction victim from `candidates` per `policy`.
/// `candidates` should be the full keyspace for `Lru`/`Lfu`/`Random`, and
/// only the expiring-keys subset for `Ttl` or the full keyspace (others)").
pub fn pick_victim<'a>(
    policy: EvictionPolicy,
    candidates: impl Iterator<Item = (&'a Bytes, &'a Value)>,
) -> Option<Bytes> {
    match policy {
        EvictionPolicy::NoEviction => None,
        EvictionPolicy::Lru => candidates
            .min_by_key(|(_, v)| v.last_access_ms)
            .map(|(k, _)| k.clone()),
        EvictionPolicy::Lfu => candidates
            .min_by_key(|(_, v)| (v.access_count, v.last_access_ms))
            .map(|(k, _)| k.clone()),
        EvictionPolicy::Random => {
            let mut rng = rand::rng();
            candidates.choose(&mut rng).map(|(k, _)| k.clone())
        },
        EvictionPolicy::Ttl => candidates
            .min_by_key(|(_, v)| v.expires_at_ms.unwrap_or(i64::MAX))
            .map(|(k, _)| k.clone()),
    }
}
