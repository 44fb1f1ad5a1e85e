// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::{cfg::enums::FsyncPolicy, storage::eviction::EvictionPolicy};

/// Server-wide configuration: everything read
/// once at startup and handed to the server context.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    /// `host:port` to bind the listener on.
    pub bind: String,
    /// Number of logical databases; `SELECT` ranges over `0..databases`.
    pub databases: usize,
    /// Active-connection ceiling; beyond it new connections
    /// are rejected.
    pub max_clients: usize,
    /// Soft memory budget in bytes across all databases combined. `0`
    /// means unlimited.
    pub max_memory: usize,
    pub eviction_policy: EvictionPolicy,
    /// Whether the append-only log is enabled at all.
    pub appendonly: bool,
    pub appendfsync: FsyncPolicy,
    pub aof_path: String,
    pub rdb_path: String,
    /// Interval between periodic background snapshots. `0` disables it.
    pub save_interval_seconds: u64,
    /// AOF rewrite never triggers below this file size, in bytes.
    pub aof_rewrite_min_size: u64,
    /// AOF rewrite triggers once the file has grown by this percentage
    /// over the size recorded at the last rewrite.
    pub aof_rewrite_percent: u64,
    /// Connections idle (no command) for longer than this are closed.
    /// `0` disables idle timeouts.
    pub idle_timeout_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:6379".to_string(),
            databases: 16,
            max_clients: 10_000,
            max_memory: 0,
            eviction_policy: EvictionPolicy::NoEviction,
            appendonly: false,
            appendfsync: FsyncPolicy::Everysec,
            aof_path: "appendonly.aof".to_string(),
            rdb_path: "dump.rdb".to_string(),
            save_interval_seconds: 0,
            aof_rewrite_min_size: 64 * 1024 * 1024,
            aof_rewrite_percent: 100,
            idle_timeout_seconds: 0,
        }
    }
}

impl Config {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        let mut cfg: Config =
            serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates invariants and normalizes derived fields.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(!self.bind.is_empty(), "bind must not be empty");
        ensure!(
            self.bind.parse::<std::net::SocketAddr>().is_ok(),
            "bind must be a host:port socket address, got '{}'",
            self.bind
        );
        ensure!(self.databases >= 1, "databases must be >= 1");
        ensure!(self.max_clients >= 1, "max_clients must be >= 1");

        if self.appendonly {
            ensure!(
                !self.aof_path.is_empty(),
                "aof_path is required when appendonly is enabled"
            );
        }
        ensure!(!self.rdb_path.is_empty(), "rdb_path must not be empty");

        // A rewrite trigger below zero bytes or 0% growth is nonsensical;
        // normalize to the documented defaults rather than reject outright.
        if self.aof_rewrite_min_size == 0 {
            self.aof_rewrite_min_size = Config::default().aof_rewrite_min_size;
        }
        if self.aof_rewrite_percent == 0 {
            self.aof_rewrite_percent = Config::default().aof_rewrite_percent;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        let mut cfg = Config::default();
        assert!(cfg.validate_and_normalize().is_ok());
    }

    #[test]
    fn rejects_malformed_bind_address() {
        let mut cfg = Config {
            bind: "not-an-address".to_string(),
            ..Config::default()
        };
        assert!(cfg.validate_and_normalize().is_err());
    }

    #[test]
    fn appendonly_requires_a_path() {
        let mut cfg = Config {
            appendonly: true,
            aof_path: String::new(),
            ..Config::default()
        };
        assert!(cfg.validate_and_normalize().is_err());
    }
}
