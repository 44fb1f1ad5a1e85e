// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::{Context, Result};
use clap::Parser;
use respdb::{cfg::{cli::Cli, logger::init_logger}, server};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let logger_config_path = cli.logger_config.to_string_lossy().into_owned();
    let _logger_guard = init_logger(&logger_config_path).context("failed to initialize logger")?;

    let config = cli.resolve_config().context("failed to resolve configuration")?;
    info!(bind = %config.bind, databases = config.databases, "starting respdb-server");

    let ctx = server::bootstrap(config).await.context("failed to bootstrap server context")?;

    if let Err(e) = server::run(ctx).await {
        error!(error = %e, "server loop exited with an error");
        return Err(e.into());
    }

    Ok(())
}
