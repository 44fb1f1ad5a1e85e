// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! RESP reply serialization, the write side of [`super::decode::RespCodec`].

use bytes::BytesMut;
use tokio_util::codec::Encoder;

use crate::{error::ServerError, resp::types::RespValue};

use super::decode::RespCodec;

impl Encoder<RespValue> for RespCodec {
    type Error = ServerError;

    fn encode(
        &mut self,
        item: RespValue,
        dst: &mut BytesMut,
    ) -> Result<(), Self::Error> {
        write_value(&item, dst)
    }
}

fn write_value(value: &RespValue, dst: &mut BytesMut) -> Result<(), ServerError> {
    match value {
        RespValue::SimpleString(s) => {
            reject_crlf(s)?;
            dst.extend_from_slice(b"+");
            dst.extend_from_slice(s.as_bytes());
            dst.extend_from_slice(b"\r\n");
        },
        RespValue::Error(s) => {
            reject_crlf(s)?;
            dst.extend_from_slice(b"-");
            dst.extend_from_slice(s.as_bytes());
            dst.extend_from_slice(b"\r\n");
        },
        RespValue::Integer(i) => {
            dst.extend_from_slice(b":");
            dst.extend_from_slice(i.to_string().as_bytes());
            dst.extend_from_slice(b"\r\n");
        },
        RespValue::BulkString(None) => {
            dst.extend_from_slice(b"$-1\r\n");
        },
        RespValue::BulkString(Some(bytes)) => {
            dst.extend_from_slice(b"$");
            dst.extend_from_slice(bytes.len().to_string().as_bytes());
            dst.extend_from_slice(b"\r\n");
            dst.extend_from_slice(bytes);
            dst.extend_from_slice(b"\r\n");
        },
        RespValue::Array(None) => {
            dst.extend_from_slice(b"*-1\r\n");
        },
        RespValue::Array(Some(items)) => {
            dst.extend_from_slice(b"*");
            dst.extend_from_slice(items.len().to_string().as_bytes());
            dst.extend_from_slice(b"\r\n");
            for item in items {
                write_value(item, dst)?;
            }
        },
    }
    Ok(())
}

fn reject_crlf(s: &str) -> Result<(), ServerError> {
    if s.contains('\r') || s.contains('\n') {
        return Err(ServerError::Protocol(
            "simple string / error payload must not contain CR or LF".into(),
        ));
    }
    Ok(())
}

/// Encodes a value into a standalone byte buffer. Used by the AOF writer,
/// which appends raw RESP-encoded command arrays rather than streaming them
/// through a connection's `Framed`.
pub fn encode_to_vec(value: &RespValue) -> Vec<u8> {
    let mut buf = BytesMut::new();
    write_value(value, &mut buf).expect("constructed values never contain CRLF");
    buf.to_vec()
}

#[cfg(test)]
mod tests {
    use bytes::{Bytes, BytesMut};

    use super::*;

    fn encode(value: RespValue) -> Vec<u8> {
        let mut codec = RespCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(value, &mut buf).expect("encode");
        buf.to_vec()
    }

    #[test]
    fn encodes_ok() {
        assert_eq!(encode(RespValue::ok()), b"+OK\r\n");
    }

    #[test]
    fn encodes_bulk_string() {
        assert_eq!(
            encode(RespValue::bulk(Bytes::from_static(b"bar"))),
            b"$3\r\nbar\r\n"
        );
    }

    #[test]
    fn encodes_null_bulk_and_array() {
        assert_eq!(encode(RespValue::null_bulk()), b"$-1\r\n");
        assert_eq!(encode(RespValue::null_array()), b"*-1\r\n");
    }

    #[test]
    fn encodes_nested_array() {
        let value = RespValue::array(vec![
            RespValue::Integer(1),
            RespValue::bulk(Bytes::from_static(b"a")),
        ]);
        assert_eq!(encode(value), b"*2\r\n:1\r\n$1\r\na\r\n");
    }

    #[test]
    fn rejects_crlf_in_simple_string() {
        let mut codec = RespCodec::new();
        let mut buf = BytesMut::new();
        let res = codec.encode(RespValue::SimpleString("a\r\nb".into()), &mut buf);
        assert!(res.is_err());
    }

    #[test]
    fn round_trip_through_codec() {
        use super::super::decode::RespCodec as DecCodec;
        use tokio_util::codec::Decoder;

        let original = RespValue::array(vec![
            RespValue::bulk(Bytes::from_static(b"SET")),
            RespValue::bulk(Bytes::from_static(b"foo")),
            RespValue::bulk(Bytes::from_static(b"bar")),
        ]);
        let bytes = encode(original.clone());
        let mut buf = BytesMut::from(&bytes[..]);
        let mut codec = DecCodec::new();
        let decoded = codec.decode(&mut buf).expect("decode").expect("value");
        assert_eq!(decoded, original);
    }
}
