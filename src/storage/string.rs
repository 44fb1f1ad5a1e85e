// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The String container: a raw byte sequence that, when its
//! contents parse as a canonical signed 64-bit integer, supports atomic
//! INCR/DECR.

use bytes::Bytes;

use crate::error::ServerError;

#[derive(Debug, Clone)]
pub struct StringValue {
    bytes: Bytes,
}

impl StringValue {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn get_bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn set_bytes(&mut self, bytes: impl Into<Bytes>) {
        self.bytes = bytes.into();
    }

    pub fn strlen(&self) -> usize {
        self.bytes.len()
    }

    pub fn append(&mut self, suffix: &[u8]) -> usize {
        let mut buf = Vec::with_capacity(self.bytes.len() + suffix.len());
        buf.extend_from_slice(&self.bytes);
        buf.extend_from_slice(suffix);
        self.bytes = Bytes::from(buf);
        self.bytes.len()
    }

    /// Parses the current contents as a canonical `i64` (no leading zeros
    /// other than a bare "0", optional leading '-', no whitespace).
    pub fn as_i64(&self) -> Result<i64, ServerError> {
        parse_canonical_i64(&self.bytes).ok_or(ServerError::NotAnInteger)
    }

    /// Adds `delta` to the current integer contents, failing on overflow or
    /// if the current contents are not a canonical integer.
    pub fn incr_by(&mut self, delta: i64) -> Result<i64, ServerError> {
        let current = self.as_i64()?;
        let next = current
            .checked_add(delta)
            .ok_or(ServerError::IntegerOverflow)?;
        self.bytes = Bytes::from(next.to_string().into_bytes());
        Ok(next)
    }
}

fn parse_canonical_i64(bytes: &[u8]) -> Option<i64> {
    let s = std::str::from_utf8(bytes).ok()?;
    if s.is_empty() {
        return None;
    }
    let (neg, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    if neg && digits == "0" {
        // "-0" is not canonical.
        return None;
    }
    s.parse::<i64>().ok()
}
