// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The command registry: canonical name, argument-count
//! bounds (excluding the verb itself), and a case-insensitive lookup.
//! The registry only settles "does this command exist and how many
//! arguments does it take" — dispatch owns execution.

/// `max_args == -1` means unbounded.
pub struct CommandSpec {
    pub name: &'static str,
    pub min_args: i64,
    pub max_args: i64,
}

/// Every supported command, including the write-only-if-exists and
/// read-only-introspection additions alongside the core surface. Kept as
/// a flat table (rather than per-category tables) since dispatch needs
/// one global arity check regardless of category.
pub static COMMAND_TABLE: &[CommandSpec] = &[
    // Keyed / generic
    CommandSpec { name: "GET", min_args: 1, max_args: 1 },
    CommandSpec { name: "SET", min_args: 2, max_args: 6 },
    CommandSpec { name: "GETSET", min_args: 2, max_args: 2 },
    CommandSpec { name: "DEL", min_args: 1, max_args: -1 },
    CommandSpec { name: "EXISTS", min_args: 1, max_args: -1 },
    CommandSpec { name: "TYPE", min_args: 1, max_args: 1 },
    CommandSpec { name: "EXPIRE", min_args: 2, max_args: 2 },
    CommandSpec { name: "PEXPIREAT", min_args: 2, max_args: 2 },
    CommandSpec { name: "TTL", min_args: 1, max_args: 1 },
    CommandSpec { name: "PTTL", min_args: 1, max_args: 1 },
    CommandSpec { name: "PERSIST", min_args: 1, max_args: 1 },
    CommandSpec { name: "RENAME", min_args: 2, max_args: 2 },
    CommandSpec { name: "KEYS", min_args: 1, max_args: 1 },
    CommandSpec { name: "RANDOMKEY", min_args: 0, max_args: 0 },
    // Strings
    CommandSpec { name: "INCR", min_args: 1, max_args: 1 },
    CommandSpec { name: "DECR", min_args: 1, max_args: 1 },
    CommandSpec { name: "INCRBY", min_args: 2, max_args: 2 },
    CommandSpec { name: "APPEND", min_args: 2, max_args: 2 },
    CommandSpec { name: "STRLEN", min_args: 1, max_args: 1 },
    // Lists
    CommandSpec { name: "LPUSH", min_args: 2, max_args: -1 },
    CommandSpec { name: "RPUSH", min_args: 2, max_args: -1 },
    CommandSpec { name: "LPUSHX", min_args: 2, max_args: -1 },
    CommandSpec { name: "RPUSHX", min_args: 2, max_args: -1 },
    CommandSpec { name: "LPOP", min_args: 1, max_args: 1 },
    CommandSpec { name: "RPOP", min_args: 1, max_args: 1 },
    CommandSpec { name: "LRANGE", min_args: 3, max_args: 3 },
    CommandSpec { name: "LLEN", min_args: 1, max_args: 1 },
    CommandSpec { name: "LINDEX", min_args: 2, max_args: 2 },
    CommandSpec { name: "LSET", min_args: 3, max_args: 3 },
    CommandSpec { name: "LTRIM", min_args: 3, max_args: 3 },
    // Hashes
    CommandSpec { name: "HSET", min_args: 3, max_args: 3 },
    CommandSpec { name: "HGET", min_args: 2, max_args: 2 },
    CommandSpec { name: "HDEL", min_args: 2, max_args: -1 },
    CommandSpec { name: "HEXISTS", min_args: 2, max_args: 2 },
    CommandSpec { name: "HLEN", min_args: 1, max_args: 1 },
    CommandSpec { name: "HGETALL", min_args: 1, max_args: 1 },
    CommandSpec { name: "HKEYS", min_args: 1, max_args: 1 },
    CommandSpec { name: "HVALS", min_args: 1, max_args: 1 },
    CommandSpec { name: "HINCRBY", min_args: 3, max_args: 3 },
    CommandSpec { name: "HSETNX", min_args: 3, max_args: 3 },
    // Sets
    CommandSpec { name: "SADD", min_args: 2, max_args: -1 },
    CommandSpec { name: "SREM", min_args: 2, max_args: -1 },
    CommandSpec { name: "SMEMBERS", min_args: 1, max_args: 1 },
    CommandSpec { name: "SISMEMBER", min_args: 2, max_args: 2 },
    CommandSpec { name: "SCARD", min_args: 1, max_args: 1 },
    CommandSpec { name: "SRANDMEMBER", min_args: 1, max_args: 2 },
    CommandSpec { name: "SPOP", min_args: 1, max_args: 1 },
    CommandSpec { name: "SINTER", min_args: 2, max_args: 2 },
    CommandSpec { name: "SUNION", min_args: 2, max_args: 2 },
    CommandSpec { name: "SDIFF", min_args: 2, max_args: 2 },
    CommandSpec { name: "SMOVE", min_args: 3, max_args: 3 },
    // Sorted sets
    CommandSpec { name: "ZADD", min_args: 3, max_args: -1 },
    CommandSpec { name: "ZREM", min_args: 2, max_args: -1 },
    CommandSpec { name: "ZSCORE", min_args: 2, max_args: 2 },
    CommandSpec { name: "ZCARD", min_args: 1, max_args: 1 },
    CommandSpec { name: "ZRANK", min_args: 2, max_args: 2 },
    CommandSpec { name: "ZREVRANK", min_args: 2, max_args: 2 },
    CommandSpec { name: "ZRANGE", min_args: 3, max_args: 4 },
    CommandSpec { name: "ZREVRANGE", min_args: 3, max_args: 4 },
    CommandSpec { name: "ZRANGEBYSCORE", min_args: 3, max_args: 3 },
    CommandSpec { name: "ZCOUNT", min_args: 3, max_args: 3 },
    CommandSpec { name: "ZINCRBY", min_args: 3, max_args: 3 },
    // Connection
    CommandSpec { name: "PING", min_args: 0, max_args: 1 },
    CommandSpec { name: "ECHO", min_args: 1, max_args: 1 },
    CommandSpec { name: "SELECT", min_args: 1, max_args: 1 },
    CommandSpec { name: "QUIT", min_args: 0, max_args: 0 },
    // Transactions
    CommandSpec { name: "MULTI", min_args: 0, max_args: 0 },
    CommandSpec { name: "EXEC", min_args: 0, max_args: 0 },
    CommandSpec { name: "DISCARD", min_args: 0, max_args: 0 },
    CommandSpec { name: "WATCH", min_args: 1, max_args: -1 },
    CommandSpec { name: "UNWATCH", min_args: 0, max_args: 0 },
    // Pub/Sub
    CommandSpec { name: "SUBSCRIBE", min_args: 1, max_args: -1 },
    CommandSpec { name: "UNSUBSCRIBE", min_args: 0, max_args: -1 },
    CommandSpec { name: "PSUBSCRIBE", min_args: 1, max_args: -1 },
    CommandSpec { name: "PUNSUBSCRIBE", min_args: 0, max_args: -1 },
    CommandSpec { name: "PUBLISH", min_args: 2, max_args: 2 },
    // Persistence / admin
    CommandSpec { name: "SAVE", min_args: 0, max_args: 0 },
    CommandSpec { name: "BGSAVE", min_args: 0, max_args: 0 },
    CommandSpec { name: "BGREWRITEAOF", min_args: 0, max_args: 0 },
    CommandSpec { name: "FLUSHDB", min_args: 0, max_args: 0 },
    CommandSpec { name: "FLUSHALL", min_args: 0, max_args: 0 },
    CommandSpec { name: "DBSIZE", min_args: 0, max_args: 0 },
    CommandSpec { name: "COMMAND", min_args: 0, max_args: 1 },
    CommandSpec { name: "CONFIG", min_args: 1, max_args: 2 },
];

pub fn lookup(name: &str) -> Option<&'static CommandSpec> {
    COMMAND_TABLE.iter().find(|c| c.name == name)
}

pub fn count() -> usize {
    COMMAND_TABLE.len()
}

impl CommandSpec {
    pub fn arity_ok(&self, nargs: usize) -> bool {
        let nargs = nargs as i64;
        nargs >= self.min_args && (self.max_args < 0 || nargs <= self.max_args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive_via_dispatch_normalization() {
        // Registry itself stores upper-case names; callers are expected to
        // upper-case before lookup (RespValue::into_command_parts does).
        assert!(lookup("GET").is_some());
        assert!(lookup("get").is_none());
    }

    #[test]
    fn arity_bounds_are_enforced() {
        let get = lookup("GET").expect("GET registered");
        assert!(get.arity_ok(1));
        assert!(!get.arity_ok(0));
        assert!(!get.arity_ok(2));

        let del = lookup("DEL").expect("DEL registered");
        assert!(del.arity_ok(1));
        assert!(del.arity_ok(100));
    }

    #[test]
    fn count_matches_table_length() {
        assert_eq!(count(), COMMAND_TABLE.len());
    }
}
