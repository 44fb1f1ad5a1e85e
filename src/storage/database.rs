// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The database manager: a fixed-size array of independent
//! keyspaces addressed by `SELECT`, plus the handful of operations that
//! span every keyspace (`FLUSHALL`, total key count).

use crate::storage::{eviction::EvictionPolicy, keyspace::Keyspace};

#[derive(Clone)]
pub struct Database {
    keyspaces: Vec<Keyspace>,
}

impl Database {
    /// Builds `count` independent keyspaces, each with the same eviction
    /// policy and an equal share of `max_memory` (0 = unbounded).
    pub fn new(count: usize, eviction_policy: EvictionPolicy, max_memory: usize) -> Self {
        assert!(count > 0, "a server needs at least one database");
        let per_db_budget = if max_memory == 0 { 0 } else { max_memory / count };
        let keyspaces = (0..count)
            .map(|_| Keyspace::new(eviction_policy, per_db_budget))
            .collect();
        Self { keyspaces }
    }

    pub fn count(&self) -> usize {
        self.keyspaces.len()
    }

    /// Validates a `SELECT` index against the configured database count.
    pub fn is_valid_index(&self, index: usize) -> bool {
        index < self.keyspaces.len()
    }

    pub fn get(&self, index: usize) -> &Keyspace {
        &self.keyspaces[index]
    }

    pub fn get_mut(&mut self, index: usize) -> &mut Keyspace {
        &mut self.keyspaces[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Keyspace> {
        self.keyspaces.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Keyspace> {
        self.keyspaces.iter_mut()
    }

    pub fn flush_all(&mut self) {
        for ks in &mut self.keyspaces {
            ks.flush();
        }
    }

    pub fn total_size(&self) -> usize {
        self.keyspaces.iter().map(|ks| ks.size()).sum()
    }

    /// Runs one sampled sweep pass over every keyspace,
    /// rescheduling the caller immediately if any keyspace cleared more
    /// than 25% of its sample, since that suggests more expired keys
    /// remain.
    pub fn sweep_all(&mut self, sample_size: usize) -> bool {
        let mut reschedule_immediately = false;
        for ks in &mut self.keyspaces {
            let (sampled, expired) = ks.sweep_sample(sample_size);
            if sampled > 0 && expired * 4 > sampled {
                reschedule_immediately = true;
            }
        }
        reschedule_immediately
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sixteen_databases_are_independent() {
        let mut db = Database::new(16, EvictionPolicy::NoEviction, 0);
        assert_eq!(db.count(), 16);
        assert!(db.is_valid_index(15));
        assert!(!db.is_valid_index(16));
        db.get_mut(0).set(
            bytes::Bytes::from_static(b"k"),
            crate::storage::value::Value::new(
                crate::storage::value::Payload::String(
                    crate::storage::string::StringValue::new(bytes::Bytes::from_static(b"v")),
                ),
                0,
            ),
        ).expect("set");
        assert_eq!(db.get_mut(0).size(), 1);
        assert_eq!(db.get_mut(1).size(), 0);
    }

    #[test]
    fn flush_all_clears_every_keyspace() {
        let mut db = Database::new(4, EvictionPolicy::NoEviction, 0);
        for i in 0..4 {
            db.get_mut(i).set(
                bytes::Bytes::from_static(b"k"),
                crate::storage::value::Value::new(
                    crate::storage::value::Payload::String(
                        crate::storage::string::StringValue::new(bytes::Bytes::from_static(b"v")),
                    ),
                    0,
                ),
            ).expect("set");
        }
        assert_eq!(db.total_size(), 4);
        db.flush_all();
        assert_eq!(db.total_size(), 0);
    }
}
