// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! RESP frame decoding.
//!
//! [`RespCodec`] implements [`tokio_util::codec::Decoder`] so a connection
//! can be wrapped in a [`tokio_util::codec::Framed`]: partial input is left
//! untouched in the buffer (`Ok(None)`) and framing restarts cleanly on the
//! next `read()`, so a frame split across TCP segments never corrupts
//! later parsing.

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::Decoder;

use crate::{
    error::{ServerError, protocol_error},
    resp::types::{MAX_BULK_LEN, MAX_NESTING_DEPTH, RespValue},
};

#[derive(Debug, Default)]
pub struct RespCodec {
    _private: (),
}

impl RespCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for RespCodec {
    type Error = ServerError;
    type Item = RespValue;

    fn decode(
        &mut self,
        src: &mut BytesMut,
    ) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        // Inline commands: a line of space-separated tokens with no type
        // prefix, terminated by CRLF or bare LF. Only attempted when the
        // stream doesn't open with a RESP type byte.
        if !matches!(src[0], b'+' | b'-' | b':' | b'$' | b'*') {
            return decode_inline(src);
        }

        match parse_value_at(src, 0, 0) {
            Ok(Some((value, consumed))) => {
                src.advance(consumed);
                Ok(Some(value))
            },
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn decode_inline(
    src: &mut BytesMut,
) -> Result<Option<RespValue>, ServerError> {
    let Some(pos) = find_crlf_or_lf(src) else {
        if src.len() > MAX_BULK_LEN as usize {
            return Err(protocol_error("inline request too long"));
        }
        return Ok(None);
    };
    let (line, consumed) = pos;
    let text = std::str::from_utf8(&src[..line])
        .map_err(|_| protocol_error("invalid UTF-8 in inline command"))?;
    let parts: Vec<RespValue> = text
        .split_whitespace()
        .map(|tok| RespValue::bulk(Bytes::copy_from_slice(tok.as_bytes())))
        .collect();
    src.advance(consumed);
    if parts.is_empty() {
        return Ok(Some(RespValue::Array(Some(Vec::new()))));
    }
    Ok(Some(RespValue::array(parts)))
}

/// Returns `(line_len_without_terminator, total_consumed_including_terminator)`.
fn find_crlf_or_lf(buf: &[u8]) -> Option<(usize, usize)> {
    for i in 0..buf.len() {
        if buf[i] == b'\n' {
            if i > 0 && buf[i - 1] == b'\r' {
                return Some((i - 1, i + 1));
            }
            return Some((i, i + 1));
        }
    }
    None
}

/// Finds a CRLF-terminated line starting at `buf[start..]`. Returns the
/// index of the `\r` (relative to `start`) and the number of bytes
/// including the trailing `\r\n`, or `None` if the terminator hasn't
/// arrived yet.
fn find_line(buf: &[u8], start: usize) -> Option<(usize, usize)> {
    let slice = &buf[start..];
    let mut i = 0;
    while i + 1 < slice.len() {
        if slice[i] == b'\r' && slice[i + 1] == b'\n' {
            return Some((i, i + 2));
        }
        i += 1;
    }
    None
}

/// Parses one RESP value from `buf[offset..]`. Returns `Ok(None)` if the
/// buffer doesn't yet contain a complete value (restartable on next read),
/// or the parsed value plus the number of bytes consumed starting at
/// `offset`.
fn parse_value_at(
    buf: &[u8],
    offset: usize,
    depth: usize,
) -> Result<Option<(RespValue, usize)>, ServerError> {
    if depth > MAX_NESTING_DEPTH {
        return Err(protocol_error("max array nesting depth exceeded"));
    }
    if offset >= buf.len() {
        return Ok(None);
    }
    let prefix = buf[offset];
    match prefix {
        b'+' | b'-' | b':' => {
            let Some((line_len, total)) = find_line(buf, offset + 1) else {
                return Ok(None);
            };
            let text = std::str::from_utf8(&buf[offset + 1..offset + 1 + line_len])
                .map_err(|_| protocol_error("invalid UTF-8 in simple line"))?;
            let value = match prefix {
                b'+' => RespValue::SimpleString(text.to_string()),
                b'-' => RespValue::Error(text.to_string()),
                b':' => RespValue::Integer(
                    text.parse::<i64>()
                        .map_err(|_| protocol_error("invalid integer"))?,
                ),
                _ => unreachable!(),
            };
            Ok(Some((value, 1 + total)))
        },
        b'$' => {
            let Some((line_len, hdr_total)) = find_line(buf, offset + 1) else {
                return Ok(None);
            };
            let len_text = std::str::from_utf8(&buf[offset + 1..offset + 1 + line_len])
                .map_err(|_| protocol_error("invalid bulk length"))?;
            let len: i64 = len_text
                .parse()
                .map_err(|_| protocol_error("invalid bulk length"))?;
            if len == -1 {
                return Ok(Some((
                    RespValue::BulkString(None),
                    1 + hdr_total,
                )));
            }
            if len < 0 {
                return Err(protocol_error("negative bulk length"));
            }
            if len > MAX_BULK_LEN {
                return Err(protocol_error("bulk string exceeds maximum length"));
            }
            let body_start = offset + 1 + hdr_total;
            let body_end = body_start + len as usize;
            let needed_end = body_end + 2;
            if buf.len() < needed_end {
                return Ok(None);
            }
            if &buf[body_end..needed_end] != b"\r\n" {
                return Err(protocol_error("bulk string missing CRLF terminator"));
            }
            let data = Bytes::copy_from_slice(&buf[body_start..body_end]);
            Ok(Some((
                RespValue::BulkString(Some(data)),
                needed_end - offset,
            )))
        },
        b'*' => {
            let Some((line_len, hdr_total)) = find_line(buf, offset + 1) else {
                return Ok(None);
            };
            let len_text = std::str::from_utf8(&buf[offset + 1..offset + 1 + line_len])
                .map_err(|_| protocol_error("invalid array length"))?;
            let len: i64 = len_text
                .parse()
                .map_err(|_| protocol_error("invalid array length"))?;
            if len == -1 {
                return Ok(Some((
                    RespValue::Array(None),
                    1 + hdr_total,
                )));
            }
            if len < 0 {
                return Err(protocol_error("negative array length"));
            }
            let mut consumed = 1 + hdr_total;
            let mut items = Vec::with_capacity(len.min(1024) as usize);
            for _ in 0..len {
                match parse_value_at(buf, offset + consumed, depth + 1)? {
                    Some((value, item_len)) => {
                        items.push(value);
                        consumed += item_len;
                    },
                    None => return Ok(None),
                }
            }
            Ok(Some((RespValue::array(items), consumed)))
        },
        other => Err(protocol_error(format!(
            "unexpected type byte '{}'",
            other as char
        ))),
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;

    fn decode_all(input: &[u8]) -> Vec<RespValue> {
        let mut codec = RespCodec::new();
        let mut buf = BytesMut::from(input);
        let mut out = Vec::new();
        while let Some(v) = codec.decode(&mut buf).expect("decode") {
            out.push(v);
        }
        out
    }

    #[test]
    fn decodes_simple_string() {
        let vals = decode_all(b"+OK\r\n");
        assert_eq!(vals, vec![RespValue::SimpleString("OK".into())]);
    }

    #[test]
    fn decodes_ping_array() {
        let vals = decode_all(b"*1\r\n$4\r\nPING\r\n");
        assert_eq!(
            vals,
            vec![RespValue::array(vec![RespValue::bulk(
                Bytes::from_static(b"PING")
            )])]
        );
    }

    #[test]
    fn partial_input_yields_nothing_until_complete() {
        let mut codec = RespCodec::new();
        let mut buf = BytesMut::from(&b"*1\r\n$4\r\nPI"[..]);
        assert_eq!(codec.decode(&mut buf).expect("decode"), None);
        buf.extend_from_slice(b"NG\r\n");
        let v = codec.decode(&mut buf).expect("decode").expect("value");
        assert_eq!(
            v,
            RespValue::array(vec![RespValue::bulk(Bytes::from_static(b"PING"))])
        );
    }

    #[test]
    fn rejects_oversized_bulk_string() {
        let mut codec = RespCodec::new();
        let mut buf = BytesMut::from(&b"$536870913\r\n"[..]);
        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn rejects_bad_negative_length() {
        let mut codec = RespCodec::new();
        let mut buf = BytesMut::from(&b"$-2\r\n"[..]);
        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn null_bulk_and_null_array() {
        let vals = decode_all(b"$-1\r\n*-1\r\n");
        assert_eq!(
            vals,
            vec![RespValue::BulkString(None), RespValue::Array(None)]
        );
    }

    #[test]
    fn decodes_inline_command() {
        let vals = decode_all(b"PING\r\n");
        assert_eq!(
            vals,
            vec![RespValue::array(vec![RespValue::bulk(Bytes::from_static(
                b"PING"
            ))])]
        );
    }
}
