// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The error taxonomy every command handler and wire-facing component
//! returns through. Each variant knows how to render itself as the exact
//! RESP error line a client sees; nothing downstream needs to pattern-match
//! on message text.

use std::fmt;

use thiserror::Error;

/// A failure surfaced to a connected client, or one that closes the
/// connection outright (`Protocol`).
#[derive(Debug, Error)]
pub enum ServerError {
    /// Malformed framing on the wire. The connection is closed after this
    /// is reported; there is no recovering mid-stream.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The first element of the command array names a verb absent from the
    /// registry.
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    /// Argument count outside `[min, max]` for the matched command.
    #[error("wrong number of arguments for '{0}' command")]
    WrongArity(String),

    /// Operation applied to a key whose stored payload is a different
    /// container type.
    #[error(
        "WRONGTYPE Operation against a key holding the wrong kind of value"
    )]
    WrongType,

    /// An argument expected to parse as a base-10 signed integer did not.
    #[error("value is not an integer or out of range")]
    NotAnInteger,

    /// An argument expected to parse as an IEEE-754 float did not.
    #[error("value is not a valid float")]
    NotAFloat,

    /// An INCR/INCRBY/HINCRBY would overflow the 64-bit signed range.
    #[error("increment or decrement would overflow")]
    IntegerOverflow,

    /// Arguments are the right count but an unrecognized combination or
    /// modifier (e.g. both `NX` and `XX` on `SET`).
    #[error("syntax error")]
    SyntaxError,

    /// `EXEC` without `MULTI`, nested `MULTI`, `WATCH` inside `MULTI`, or
    /// similar out-of-order transaction-control usage.
    #[error("{0}")]
    StateError(String),

    /// A command is not allowed while the connection has active pub/sub
    /// subscriptions.
    #[error(
        "only (P|S)SUBSCRIBE / (P|S)UNSUBSCRIBE / PING / QUIT / RESET are allowed in this context"
    )]
    NotAllowedInSubscribe,

    /// Write rejected under `NO_EVICTION` because it would exceed
    /// `max_memory`.
    #[error("OOM command not allowed when used memory > 'maxmemory'")]
    OutOfMemory,

    /// Disk I/O failed while loading/saving a snapshot or appending to the
    /// AOF. Wraps the underlying cause for the log line; the client only
    /// ever sees the generic text.
    #[error("I/O error: {0}")]
    Io(#[source] anyhow::Error),

    /// Anything unexpected. Never leaks its contents to the client; logged
    /// in full at the call site before being downgraded.
    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

impl ServerError {
    /// Renders the RESP `-KIND message\r\n` line for this failure.
    pub fn reply_line(&self) -> String {
        match self {
            ServerError::Protocol(msg) => format!("ERR Protocol error: {msg}"),
            ServerError::UnknownCommand(name) => {
                format!("ERR unknown command '{name}'")
            },
            ServerError::WrongArity(name) => {
                format!("ERR wrong number of arguments for '{name}' command")
            },
            ServerError::WrongType => self.to_string(),
            ServerError::NotAnInteger => format!("ERR {self}"),
            ServerError::NotAFloat => format!("ERR {self}"),
            ServerError::IntegerOverflow => format!("ERR {self}"),
            ServerError::SyntaxError => format!("ERR {self}"),
            ServerError::StateError(msg) => format!("ERR {msg}"),
            ServerError::NotAllowedInSubscribe => format!("ERR {self}"),
            ServerError::OutOfMemory => self.to_string(),
            ServerError::Io(_) => "ERR internal error".to_string(),
            ServerError::Internal(_) => "ERR internal error".to_string(),
        }
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(e: anyhow::Error) -> Self {
        ServerError::Internal(e)
    }
}

impl From<std::io::Error> for ServerError {
    fn from(e: std::io::Error) -> Self {
        ServerError::Io(anyhow::Error::new(e))
    }
}

/// Narrow helper so call sites can write `.map_err(protocol_error)?`
/// without importing `ServerError` everywhere.
pub fn protocol_error(msg: impl fmt::Display) -> ServerError {
    ServerError::Protocol(msg.to_string())
}
