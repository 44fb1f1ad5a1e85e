// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! `respdb`: an in-memory RESP1/RESP2-compatible key/value database
//! server. See `server::bootstrap` and `server::run` for the
//! entrypoint the binary in `main.rs` drives.

pub mod cfg;
pub mod commands;
pub mod error;
pub mod persistence;
pub mod pubsub;
pub mod resp;
pub mod server;
pub mod storage;
pub mod txn;
