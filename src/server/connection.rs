// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The per-connection task: reads commands off a framed TCP stream,
//! dispatches them, and writes replies back, while a second outbound path
//! delivers pub/sub messages published by other connections.

use std::{sync::Arc, time::Duration};

use futures::StreamExt;
use tokio::{net::TcpStream, sync::mpsc};
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use crate::{
    commands::{connection::ConnectionState, dispatch},
    resp::{RespCodec, RespValue},
    server::context::ServerContext,
    txn::Txn,
};

/// Drives one accepted connection until it disconnects or is closed by
/// `QUIT`. Registers an outbound pub/sub sender for its lifetime and
/// cleans up every subscription on exit regardless of how the loop ends.
pub async fn handle(ctx: Arc<ServerContext>, stream: TcpStream, conn_id: u64) {
    let _ = stream.set_nodelay(true);
    let mut framed = Framed::new(stream, RespCodec::new());
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<RespValue>();
    ctx.pubsub.register_connection(conn_id, out_tx);

    let mut conn = ConnectionState::new(ctx.config.databases);
    let mut txn = Txn::new();
    let idle_timeout = if ctx.config.idle_timeout_seconds > 0 {
        Some(Duration::from_secs(ctx.config.idle_timeout_seconds))
    } else {
        None
    };

    loop {
        let next_frame = read_with_timeout(&mut framed, idle_timeout);
        tokio::select! {
            biased;

            frame = next_frame => {
                match frame {
                    Some(Ok(Some(value))) => {
                        let Some((verb, args)) = value.into_command_parts() else {
                            let _ = framed
                                .send(RespValue::error("ERR Protocol error: expected command array"))
                                .await;
                            break;
                        };
                        let outcome =
                            dispatch::dispatch(&ctx, &mut conn, &mut txn, conn_id, verb, args).await;
                        if framed.send(outcome.reply).await.is_err() {
                            break;
                        }
                        if outcome.close {
                            break;
                        }
                    },
                    Some(Ok(None)) => break, // client closed cleanly
                    Some(Err(e)) => {
                        warn!(error = %e, conn_id, "connection closed on protocol error");
                        let _ = framed.send(RespValue::error(e.reply_line())).await;
                        break;
                    },
                    None => {
                        debug!(conn_id, "closing idle connection");
                        break;
                    },
                }
            },

            published = out_rx.recv() => {
                match published {
                    Some(frame) => {
                        if framed.send(frame).await.is_err() {
                            break;
                        }
                    },
                    None => break,
                }
            },
        }
    }

    ctx.pubsub.disconnect(conn_id);
    ctx.release_client_slot();
    info!(conn_id, "connection closed");
}

type FramedRead = Framed<TcpStream, RespCodec>;

/// Reads the next frame, bounded by the configured idle timeout. `None`
/// means the timeout elapsed with no frame; a successful read with no
/// queued data yet is represented by the inner `Option` from
/// [`futures::StreamExt::next`].
async fn read_with_timeout(
    framed: &mut FramedRead,
    idle_timeout: Option<Duration>,
) -> Option<Result<Option<RespValue>, crate::error::ServerError>> {
    let next = framed.next();
    match idle_timeout {
        Some(d) => match tokio::time::timeout(d, next).await {
            Ok(item) => Some(transpose(item)),
            Err(_) => None,
        },
        None => Some(transpose(next.await)),
    }
}

fn transpose(
    item: Option<Result<RespValue, crate::error::ServerError>>,
) -> Result<Option<RespValue>, crate::error::ServerError> {
    match item {
        Some(Ok(v)) => Ok(Some(v)),
        Some(Err(e)) => Err(e),
        None => Ok(None),
    }
}
