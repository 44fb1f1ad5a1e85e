// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The shared state every connection task reaches into: the database, the
//! pub/sub engine, the optional AOF handle, and the connection-count gate
//! that enforces `max_clients`.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tokio::sync::Mutex;

use crate::{
    cfg::config::Config, persistence::aof::Aof, pubsub::PubSub, storage::database::Database,
};

/// Everything a connection needs that outlives it. One instance is built
/// at startup and shared behind an `Arc` with every connection task.
pub struct ServerContext {
    pub config: Config,
    pub db: Mutex<Database>,
    pub pubsub: PubSub,
    pub aof: Option<Aof>,
    next_conn_id: AtomicU64,
    client_count: AtomicUsize,
}

impl ServerContext {
    pub fn new(config: Config, db: Database, aof: Option<Aof>) -> Self {
        Self {
            config,
            db: Mutex::new(db),
            pubsub: PubSub::new(),
            aof,
            next_conn_id: AtomicU64::new(1),
            client_count: AtomicUsize::new(0),
        }
    }

    pub fn next_conn_id(&self) -> u64 {
        self.next_conn_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Reserves a client slot if `max_clients` isn't already reached.
    /// Returns `false` when the connection should be rejected.
    pub fn try_acquire_client_slot(&self) -> bool {
        loop {
            let current = self.client_count.load(Ordering::Relaxed);
            if current >= self.config.max_clients {
                return false;
            }
            if self
                .client_count
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
        }
    }

    pub fn release_client_slot(&self) {
        self.client_count.fetch_sub(1, Ordering::Release);
    }

    pub fn client_count(&self) -> usize {
        self.client_count.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::eviction::EvictionPolicy;

    #[test]
    fn client_slots_are_capped_at_max_clients() {
        let config = Config { max_clients: 1, ..Config::default() };
        let ctx = ServerContext::new(config, Database::new(1, EvictionPolicy::NoEviction, 0), None);
        assert!(ctx.try_acquire_client_slot());
        assert!(!ctx.try_acquire_client_slot());
        ctx.release_client_slot();
        assert!(ctx.try_acquire_client_slot());
    }

    #[test]
    fn connection_ids_are_distinct_and_increasing() {
        let ctx = ServerContext::new(
            Config::default(),
            Database::new(1, EvictionPolicy::NoEviction, 0),
            None,
        );
        let a = ctx.next_conn_id();
        let b = ctx.next_conn_id();
        assert!(b > a);
    }
}
