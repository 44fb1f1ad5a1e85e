// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The transaction engine: a per-connection queuing state
//! machine plus WATCH-based optimistic concurrency control. Isolation
//! comes from the server holding the selected database's lock for the
//! whole `EXEC` batch; this module only tracks state, it does
//! not itself synchronize anything.

use bytes::Bytes;

use crate::storage::keyspace::Keyspace;

/// A connection's transaction state. `NONE` is the initial and resting
/// state; `QUEUING` holds the pending command array built up since
/// `MULTI`.
#[derive(Debug, Default)]
pub enum TxnState {
    #[default]
    None,
    Queuing {
        queued: Vec<(String, Vec<Bytes>)>,
    },
}

/// Per-connection transaction bookkeeping: the queue state plus any
/// outstanding `WATCH`es.
#[derive(Debug, Default)]
pub struct Txn {
    state: TxnState,
    /// Keys watched since the last `WATCH`/`UNWATCH`/`EXEC`/`DISCARD`,
    /// paired with the version observed at `WATCH` time.
    watches: Vec<(Bytes, u64)>,
}

impl Txn {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_queuing(&self) -> bool {
        matches!(self.state, TxnState::Queuing { .. })
    }

    /// Enters `QUEUING`. Returns `false` if already queuing (nested
    /// `MULTI` is an error).
    pub fn begin(&mut self) -> bool {
        if self.is_queuing() {
            return false;
        }
        self.state = TxnState::Queuing { queued: Vec::new() };
        true
    }

    /// Appends a command to the pending queue. Caller must have already
    /// confirmed `is_queuing()`.
    pub fn enqueue(&mut self, verb: String, args: Vec<Bytes>) {
        if let TxnState::Queuing { queued } = &mut self.state {
            queued.push((verb, args));
        }
    }

    /// Leaves `QUEUING` without executing anything, releasing watches.
    /// Returns `false` if not currently queuing.
    pub fn discard(&mut self) -> bool {
        if !self.is_queuing() {
            return false;
        }
        self.state = TxnState::None;
        self.watches.clear();
        true
    }

    /// Takes the queued commands out of `QUEUING`, returning to `NONE` and
    /// releasing watches. Returns `None` if not currently queuing.
    pub fn take_for_exec(&mut self) -> Option<Vec<(String, Vec<Bytes>)>> {
        let TxnState::Queuing { .. } = &self.state else {
            return None;
        };
        let TxnState::Queuing { queued } = std::mem::take(&mut self.state) else {
            unreachable!()
        };
        self.watches.clear();
        Some(queued)
    }

    /// Records the current version of `key` as watched. A no-op while
    /// queuing; callers must reject `WATCH` inside `MULTI` before calling.
    pub fn watch(&mut self, key: Bytes, version: u64) {
        self.watches.push((key, version));
    }

    pub fn unwatch(&mut self) {
        self.watches.clear();
    }

    pub fn has_watches(&self) -> bool {
        !self.watches.is_empty()
    }

    /// The abort condition at `EXEC`: any watched key's
    /// current version differs from the one recorded at `WATCH` time.
    pub fn watches_broken(&self, keyspace: &Keyspace) -> bool {
        self.watches
            .iter()
            .any(|(key, recorded)| keyspace.version(key) != *recorded)
    }
}
