// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! One logical database: the key→value map, the expiration
//! index, and per-key versions. Every mutating path funnels through here so
//! the "every write bumps the per-key version" invariant
//! cannot be bypassed.

use std::{
    collections::{HashMap, HashSet},
    time::{SystemTime, UNIX_EPOCH},
};

use bytes::Bytes;
use tracing::{debug, warn};

use crate::{
    error::ServerError,
    storage::{
        eviction::{self, EvictionPolicy},
        glob::glob_match,
        value::{Payload, Value},
    },
};

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the epoch")
        .as_millis() as i64
}

#[derive(Debug, Default, Clone, Copy)]
pub struct KeyspaceStats {
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
}

/// Approximate resident size of a value, used for `max_memory` accounting.
/// Not byte-exact; good enough to make eviction decisions directional.
fn approx_size(key: &[u8], value: &Value) -> usize {
    let payload_size = match &value.payload {
        Payload::String(s) => s.strlen(),
        Payload::List(l) => l.len() * 16,
        Payload::Hash(h) => h.len() * 32,
        Payload::Set(s) => s.card() * 16,
        Payload::SortedSet(z) => z.len() * 24,
    };
    key.len() + payload_size + 64
}

#[derive(Clone)]
pub struct Keyspace {
    map: HashMap<Bytes, Value>,
    /// Monotone per-key version. Never removed on delete — an absent
    /// key's last known version is still needed so a WATCH recorded
    /// before a delete correctly observes a mismatch at EXEC time.
    versions: HashMap<Bytes, u64>,
    expiring: HashSet<Bytes>,
    stats: KeyspaceStats,
    eviction_policy: EvictionPolicy,
    max_memory: usize,
    used_memory: usize,
}

impl Keyspace {
    pub fn new(eviction_policy: EvictionPolicy, max_memory: usize) -> Self {
        Self {
            map: HashMap::new(),
            versions: HashMap::new(),
            expiring: HashSet::new(),
            stats: KeyspaceStats::default(),
            eviction_policy,
            max_memory,
            used_memory: 0,
        }
    }

    fn bump_version(&mut self, key: &[u8]) -> u64 {
        let entry = self.versions.entry(Bytes::copy_from_slice(key)).or_insert(0);
        *entry += 1;
        *entry
    }

    /// The version WATCH should record / compare against. Keys never
    /// touched report version 0.
    pub fn version(&self, key: &[u8]) -> u64 {
        self.versions.get(key).copied().unwrap_or(0)
    }

    fn remove_internal(&mut self, key: &[u8]) -> Option<Value> {
        let removed = self.map.remove(key);
        if let Some(v) = &removed {
            self.used_memory = self.used_memory.saturating_sub(approx_size(key, v));
            self.expiring.remove(key);
        }
        removed
    }

    fn expire_if_needed(&mut self, key: &[u8], now_ms: i64) -> bool {
        let expired = matches!(self.map.get(key), Some(v) if v.is_expired_at(now_ms));
        if expired {
            self.remove_internal(key);
            self.bump_version(key);
            self.stats.expired += 1;
            debug!(key = %String::from_utf8_lossy(key), "lazily expired key");
        }
        expired
    }

    /// Read-path lookup: absent/expired report as absent; an expired key is
    /// deleted synchronously. Records an access on hit.
    pub fn get(&mut self, key: &[u8]) -> Option<&Value> {
        let now = now_ms();
        self.expire_if_needed(key, now);
        match self.map.get_mut(key) {
            Some(v) => {
                v.touch(now);
                self.stats.hits += 1;
                Some(&*v)
            },
            None => {
                self.stats.misses += 1;
                None
            },
        }
    }

    /// Write-path lookup: same expiry semantics as `get`, but does not bump
    /// the version itself — callers that obtain a mutable reference are
    /// always about to mutate, so they must call `mark_written` once done.
    pub fn get_mut_for_write(&mut self, key: &[u8]) -> Option<&mut Value> {
        let now = now_ms();
        self.expire_if_needed(key, now);
        self.map.get_mut(key)
    }

    /// Records that `key` was mutated in place (its payload changed via a
    /// reference from `get_mut_for_write`), bumping its version and
    /// refreshing the memory accounting.
    pub fn mark_written(&mut self, key: &[u8]) {
        if let Some(v) = self.map.get(key) {
            self.used_memory = approx_size(key, v).max(self.used_memory);
        }
        self.bump_version(key);
    }

    /// Gets the current value for `key`, creating it via `default` first if
    /// absent (respecting eviction/OOM policy for the new entry). Does not
    /// itself bump the version — same contract as `get_mut_for_write`,
    /// since a caller may still fail a type check on an existing value
    /// (e.g. `ZADD` against a key holding a list) after this returns, and a
    /// failed command must not bump the key's WATCH version. Callers must
    /// call `mark_written` once a mutation actually lands.
    pub fn get_or_create_mut(
        &mut self,
        key: &[u8],
        default: impl FnOnce() -> Payload,
    ) -> Result<&mut Value, ServerError> {
        let now = now_ms();
        self.expire_if_needed(key, now);
        if !self.map.contains_key(key) {
            let value = Value::new(default(), now);
            self.ensure_capacity(approx_size(key, &value))?;
            self.used_memory += approx_size(key, &value);
            self.map.insert(Bytes::copy_from_slice(key), value);
        }
        Ok(self.map.get_mut(key).expect("just inserted or already present"))
    }

    /// Installs `value` wholesale (the `SET`-family contract): replaces any
    /// existing payload/expiration and runs eviction first if over budget.
    pub fn set(&mut self, key: Bytes, value: Value) -> Result<(), ServerError> {
        let incoming = approx_size(&key, &value);
        self.ensure_capacity(incoming)?;
        if let Some(old) = self.map.get(&key) {
            self.used_memory = self.used_memory.saturating_sub(approx_size(&key, old));
        }
        if value.expires_at_ms.is_some() {
            self.expiring.insert(key.clone());
        } else {
            self.expiring.remove(&key);
        }
        self.used_memory += incoming;
        self.bump_version(&key);
        self.map.insert(key, value);
        Ok(())
    }

    /// Deletes the collection-typed value at `key` if it has gone empty —
    /// keys never point to empty collections. No-op (and no version
    /// bump) if the value is still non-empty.
    pub fn delete_if_empty_collection(&mut self, key: &[u8]) {
        let is_empty = matches!(self.map.get(key), Some(v) if v.payload.is_empty_collection());
        if is_empty {
            self.remove_internal(key);
            self.bump_version(key);
        }
    }

    pub fn del(&mut self, keys: &[Bytes]) -> usize {
        let now = now_ms();
        let mut count = 0;
        for key in keys {
            self.expire_if_needed(key, now);
            if self.remove_internal(key).is_some() {
                self.bump_version(key);
                count += 1;
            }
        }
        count
    }

    pub fn exists(&mut self, keys: &[Bytes]) -> usize {
        let now = now_ms();
        keys.iter()
            .filter(|k| {
                self.expire_if_needed(k, now);
                self.map.contains_key(k.as_ref())
            })
            .count()
    }

    pub fn type_name(&mut self, key: &[u8]) -> Option<&'static str> {
        self.get(key).map(|v| v.payload.type_name())
    }

    /// `-2` absent, `-1` persistent, else an absolute epoch-ms expiration.
    pub fn expire_absolute_ms(&mut self, key: &[u8], at_ms: i64) -> bool {
        let now = now_ms();
        self.expire_if_needed(key, now);
        if !self.map.contains_key(key) {
            return false;
        }
        if at_ms <= now {
            self.remove_internal(key);
            self.bump_version(key);
            return true;
        }
        if let Some(v) = self.map.get_mut(key) {
            v.expires_at_ms = Some(at_ms);
        }
        self.expiring.insert(Bytes::copy_from_slice(key));
        self.bump_version(key);
        true
    }

    pub fn persist(&mut self, key: &[u8]) -> bool {
        let now = now_ms();
        self.expire_if_needed(key, now);
        match self.map.get_mut(key) {
            Some(v) if v.expires_at_ms.is_some() => {
                v.expires_at_ms = None;
                self.expiring.remove(key);
                self.bump_version(key);
                true
            },
            _ => false,
        }
    }

    /// `-2` absent, `-1` persistent, otherwise remaining milliseconds.
    pub fn ttl_ms(&mut self, key: &[u8]) -> i64 {
        let now = now_ms();
        self.expire_if_needed(key, now);
        match self.map.get(key) {
            None => -2,
            Some(Value { expires_at_ms: None, .. }) => -1,
            Some(Value { expires_at_ms: Some(t), .. }) => (t - now).max(0),
        }
    }

    pub fn keys_matching(&mut self, pattern: &[u8]) -> Vec<Bytes> {
        let now = now_ms();
        let expired: Vec<Bytes> = self
            .map
            .iter()
            .filter(|(_, v)| v.is_expired_at(now))
            .map(|(k, _)| k.clone())
            .collect();
        for k in &expired {
            self.expire_if_needed(k, now);
        }
        self.map
            .keys()
            .filter(|k| glob_match(pattern, k))
            .cloned()
            .collect()
    }

    pub fn random_key(&mut self) -> Option<Bytes> {
        use rand::seq::IteratorRandom;
        let now = now_ms();
        let expired: Vec<Bytes> = self
            .map
            .iter()
            .filter(|(_, v)| v.is_expired_at(now))
            .map(|(k, _)| k.clone())
            .collect();
        for k in &expired {
            self.expire_if_needed(k, now);
        }
        let mut rng = rand::rng();
        self.map.keys().choose(&mut rng).cloned()
    }

    /// Renames `old` to `new`, preserving any expiration.
    pub fn rename(&mut self, old: &[u8], new: &[u8]) -> Result<(), ServerError> {
        let now = now_ms();
        self.expire_if_needed(old, now);
        let Some(value) = self.remove_internal(old) else {
            return Err(ServerError::StateError("no such key".to_string()));
        };
        self.bump_version(old);
        let new_key = Bytes::copy_from_slice(new);
        if value.expires_at_ms.is_some() {
            self.expiring.insert(new_key.clone());
        } else {
            self.expiring.remove(&new_key);
        }
        self.used_memory += approx_size(&new_key, &value);
        self.bump_version(&new_key);
        self.map.insert(new_key, value);
        Ok(())
    }

    pub fn flush(&mut self) {
        for key in self.map.keys().cloned().collect::<Vec<_>>() {
            self.bump_version(&key);
        }
        self.map.clear();
        self.expiring.clear();
        self.used_memory = 0;
    }

    pub fn size(&self) -> usize {
        self.map.len()
    }

    /// Number of keys currently carrying a TTL, as reported by the RDB
    /// snapshot's `RESIZEDB` opcode.
    pub fn expiring_count(&self) -> usize {
        self.expiring.len()
    }

    pub fn stats(&self) -> KeyspaceStats {
        self.stats
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Bytes, &Value)> {
        self.map.iter()
    }

    /// Runs one sampled sweep pass: samples up to
    /// `sample_size` candidates from the expiring index, deletes any that
    /// have expired, and reports how many were sampled/expired so the
    /// caller can decide whether to reschedule immediately (>25% expired).
    pub fn sweep_sample(&mut self, sample_size: usize) -> (usize, usize) {
        use rand::seq::IteratorRandom;
        let now = now_ms();
        let mut rng = rand::rng();
        let sample: Vec<Bytes> = self
            .expiring
            .iter()
            .choose_multiple(&mut rng, sample_size)
            .into_iter()
            .cloned()
            .collect();
        let sampled = sample.len();
        let mut expired = 0;
        for key in sample {
            if self.expire_if_needed(&key, now) {
                expired += 1;
            } else {
                // No longer expiring (e.g. persisted concurrently) — drop
                // it from the index so future samples don't keep hitting it.
                if !matches!(self.map.get(&key).and_then(|v| v.expires_at_ms), Some(_)) {
                    self.expiring.remove(&key);
                }
            }
        }
        (sampled, expired)
    }

    fn ensure_capacity(&mut self, incoming: usize) -> Result<(), ServerError> {
        if self.max_memory == 0 {
            return Ok(());
        }
        let mut guard = 0usize;
        while self.used_memory + incoming > self.max_memory {
            guard += 1;
            if guard > self.map.len() + 1 {
                break;
            }
            let victim = match self.eviction_policy {
                EvictionPolicy::Ttl => {
                    let candidates: Vec<(&Bytes, &Value)> = self
                        .expiring
                        .iter()
                        .filter_map(|k| self.map.get_key_value(k))
                        .collect();
                    eviction::pick_victim(self.eviction_policy, candidates.into_iter())
                },
                _ => eviction::pick_victim(self.eviction_policy, self.map.iter()),
            };
            match victim {
                Some(key) => {
                    warn!(
                        key = %String::from_utf8_lossy(&key),
                        policy = ?self.eviction_policy,
                        "evicting key under memory pressure"
                    );
                    self.remove_internal(&key);
                    self.bump_version(&key);
                },
                None => return Err(ServerError::OutOfMemory),
            }
        }
        Ok(())
    }
}
