// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The RESP value model shared by decoding and encoding.
//!
//! A single type represents both what a client can send (in practice always
//! `Array(BulkString...)`) and everything a server can reply with, mirroring
//! how the wire format itself makes no syntactic distinction between request
//! and reply frames.

use bytes::Bytes;

/// Hard cap on a single bulk string payload.
pub const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// Arrays only ever nest one level deep for commands; this bounds recursive
/// parsing so a malicious/garbled stream cannot blow the stack.
pub const MAX_NESTING_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    /// `+OK\r\n` — payload must never contain a bare CR or LF.
    SimpleString(String),
    /// `-ERR message\r\n` — same CRLF restriction as `SimpleString`.
    Error(String),
    /// `:123\r\n`
    Integer(i64),
    /// `$3\r\nfoo\r\n`, or `None` for the null bulk string (`$-1\r\n`).
    BulkString(Option<Bytes>),
    /// `*2\r\n...\r\n`, or `None` for the null array (`*-1\r\n`).
    Array(Option<Vec<RespValue>>),
}

impl RespValue {
    pub fn ok() -> Self {
        RespValue::SimpleString("OK".to_string())
    }

    pub fn null_bulk() -> Self {
        RespValue::BulkString(None)
    }

    pub fn null_array() -> Self {
        RespValue::Array(None)
    }

    pub fn bulk(bytes: impl Into<Bytes>) -> Self {
        RespValue::BulkString(Some(bytes.into()))
    }

    pub fn array(items: Vec<RespValue>) -> Self {
        RespValue::Array(Some(items))
    }

    pub fn error(msg: impl Into<String>) -> Self {
        RespValue::Error(msg.into())
    }

    /// Interprets this value as a command: a non-empty array of bulk
    /// strings. Returns the verb (upper-cased) and the raw argument bytes.
    pub fn into_command_parts(self) -> Option<(String, Vec<Bytes>)> {
        let Some(items) = (match self {
            RespValue::Array(items) => items,
            _ => return None,
        }) else {
            return None;
        };
        if items.is_empty() {
            return None;
        }
        let mut iter = items.into_iter();
        let verb = match iter.next()? {
            RespValue::BulkString(Some(b)) => {
                String::from_utf8_lossy(&b).to_ascii_uppercase()
            },
            _ => return None,
        };
        let mut args = Vec::new();
        for item in iter {
            match item {
                RespValue::BulkString(Some(b)) => args.push(b),
                _ => return None,
            }
        }
        Some((verb, args))
    }
}
