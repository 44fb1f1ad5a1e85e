// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Shared scaffolding for the wire-level tests: boots a real
//! `respdb-server` on an OS-assigned loopback port and gives each test a
//! thin RESP client over a live `TcpStream`.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use respdb::{
    cfg::config::Config,
    commands::to_command_array,
    resp::{RespCodec, RespValue},
    server,
};
use tempfile::TempDir;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;

/// A running server instance plus the temp directory backing its
/// snapshot/AOF files, kept alive for the lifetime of the test.
pub struct TestServer {
    pub addr: std::net::SocketAddr,
    config: Config,
    _dir: TempDir,
}

impl TestServer {
    pub async fn connect(&self) -> Client {
        let stream = TcpStream::connect(self.addr).await.expect("connect");
        Client { framed: Framed::new(stream, RespCodec::new()) }
    }

    /// Re-bootstraps a fresh `ServerContext` from the same on-disk
    /// snapshot/AOF files (recovery order: load snapshot, replay AOF) and
    /// serves it on a new ephemeral port, simulating a process restart
    /// without tearing down the temp directory.
    pub async fn restart(self) -> TestServer {
        let ctx = server::bootstrap(self.config.clone()).await.expect("bootstrap on restart");
        let listener = TcpListener::bind(&ctx.config.bind).await.expect("bind");
        let addr = listener.local_addr().expect("local_addr");
        tokio::spawn(async move {
            let _ = server::serve(ctx, listener).await;
        });
        TestServer { addr, config: self.config, _dir: self._dir }
    }
}

/// Starts a server with an isolated config (unique temp dir, ephemeral
/// port) and leaves it running in a background task for the test's
/// duration.
pub async fn start_server() -> TestServer {
    start_server_with(|_| {}).await
}

/// Same as [`start_server`] but lets the caller tweak the config before
/// bootstrap, e.g. to turn on `appendonly`.
pub async fn start_server_with(customize: impl FnOnce(&mut Config)) -> TestServer {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = Config {
        bind: "127.0.0.1:0".to_string(),
        databases: 4,
        rdb_path: dir.path().join("dump.rdb").to_string_lossy().into_owned(),
        aof_path: dir.path().join("appendonly.aof").to_string_lossy().into_owned(),
        save_interval_seconds: 0,
        ..Config::default()
    };
    customize(&mut config);

    let ctx = server::bootstrap(config.clone()).await.expect("bootstrap");
    let listener = TcpListener::bind(&ctx.config.bind).await.expect("bind");
    let addr = listener.local_addr().expect("local_addr");

    tokio::spawn(async move {
        let _ = server::serve(ctx, listener).await;
    });

    TestServer { addr, config, _dir: dir }
}

pub struct Client {
    framed: Framed<TcpStream, RespCodec>,
}

impl Client {
    /// Sends a command built from plain string args and waits for the
    /// single reply frame.
    pub async fn cmd(&mut self, verb: &str, args: &[&str]) -> RespValue {
        let args: Vec<Bytes> = args.iter().map(|a| Bytes::copy_from_slice(a.as_bytes())).collect();
        self.framed.send(to_command_array(verb, &args)).await.expect("send");
        self.framed.next().await.expect("connection closed").expect("decode")
    }

    /// Reads the next frame without sending anything, used for pub/sub
    /// push messages that arrive unprompted.
    pub async fn read(&mut self) -> RespValue {
        self.framed.next().await.expect("connection closed").expect("decode")
    }
}

pub fn bulk(s: &str) -> RespValue {
    RespValue::bulk(Bytes::copy_from_slice(s.as_bytes()))
}
