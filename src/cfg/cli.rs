// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

use crate::cfg::config::Config;

/// Command-line surface for the server binary. Overrides of the same name
/// take precedence over both the config file and the environment, so a
/// container can be fully configured with neither a mounted file nor
/// env vars if it only needs to change the bind address.
#[derive(Parser, Debug)]
#[command(name = "respdb-server", about = "In-memory RESP key/value server")]
pub struct Cli {
    /// Path to a YAML configuration file.
    #[arg(long, env = "RESPDB_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the YAML logger configuration (level, output target,
    /// optional file rotation).
    #[arg(long, env = "RESPDB_LOGGER_CONFIG", default_value = "config/logger.yaml")]
    pub logger_config: PathBuf,

    /// Overrides `bind` (host:port).
    #[arg(long, env = "RESPDB_BIND")]
    pub bind: Option<String>,

    /// Overrides only the port of `bind`, keeping the configured host.
    #[arg(long, env = "RESPDB_PORT")]
    pub port: Option<u16>,
}

impl Cli {
    /// Resolves the final configuration: load the file if given (falling
    /// back to built-in defaults otherwise), then apply CLI/env overrides.
    pub fn resolve_config(&self) -> Result<Config> {
        let mut cfg = match &self.config {
            Some(path) => Config::load_from_file(resolve_config_path(path)?)?,
            None => Config::default(),
        };

        if let Some(bind) = &self.bind {
            cfg.bind = bind.clone();
        } else if let Some(port) = self.port {
            let host = cfg
                .bind
                .rsplit_once(':')
                .map(|(host, _)| host.to_string())
                .unwrap_or_else(|| "0.0.0.0".to_string());
            cfg.bind = format!("{host}:{port}");
        }

        cfg.validate_and_normalize()?;
        Ok(cfg)
    }
}

pub fn resolve_config_path(rel: &Path) -> Result<PathBuf> {
    let abs = if rel.is_absolute() {
        rel.to_path_buf()
    } else {
        std::env::current_dir()
            .context("cannot get current working dir")?
            .join(rel)
    };

    abs.canonicalize()
        .with_context(|| format!("failed to canonicalize path {abs:?}"))
}
