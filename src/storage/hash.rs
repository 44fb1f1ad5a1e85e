// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The Hash container: a field→value mapping with no
//! ordering guarantee.

use std::collections::HashMap;

use bytes::Bytes;

use crate::error::ServerError;

#[derive(Debug, Clone, Default)]
pub struct HashValue {
    fields: HashMap<Bytes, Bytes>,
}

impl HashValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns `true` if the field was newly created (as opposed to
    /// overwritten).
    pub fn set(&mut self, field: Bytes, value: Bytes) -> bool {
        self.fields.insert(field, value).is_none()
    }

    /// Sets `field` only if absent. Returns `true` if the field was set.
    pub fn set_if_absent(&mut self, field: Bytes, value: Bytes) -> bool {
        if self.fields.contains_key(&field) {
            false
        } else {
            self.fields.insert(field, value);
            true
        }
    }

    pub fn get(&self, field: &[u8]) -> Option<&Bytes> {
        self.fields.get(field)
    }

    pub fn exists(&self, field: &[u8]) -> bool {
        self.fields.contains_key(field)
    }

    /// Removes the given fields, returning the number actually removed.
    pub fn del(&mut self, fields: &[Bytes]) -> usize {
        fields
            .iter()
            .filter(|f| self.fields.remove(f.as_ref()).is_some())
            .count()
    }

    pub fn get_all(&self) -> impl Iterator<Item = (&Bytes, &Bytes)> {
        self.fields.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Bytes> {
        self.fields.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &Bytes> {
        self.fields.values()
    }

    /// Adds `delta` to the field's integer value, creating the field at 0
    /// first if absent. A non-canonical existing value is always an error,
    /// never a silent zero.
    pub fn incr_by(&mut self, field: &[u8], delta: i64) -> Result<i64, ServerError> {
        let current = match self.fields.get(field) {
            Some(v) => parse_i64(v).ok_or(ServerError::NotAnInteger)?,
            None => 0,
        };
        let next = current
            .checked_add(delta)
            .ok_or(ServerError::IntegerOverflow)?;
        self.fields
            .insert(Bytes::copy_from_slice(field), Bytes::from(next.to_string()));
        Ok(next)
    }
}

fn parse_i64(bytes: &[u8]) -> Option<i64> {
    std::str::from_utf8(bytes).ok()?.parse::<i64>().ok()
}
