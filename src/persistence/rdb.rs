// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The point-in-time snapshot format: a compact binary
//! encoding of every non-empty database, written atomically (temp file then
//! rename) and checked on load with a trailing CRC-64.
//!
//! Layout: `REDIS` + 4-digit version, zero or more `AUX` key/value records,
//! then per non-empty database a `SELECTDB` + `RESIZEDB` pair followed by
//! its keys, then `EOF` and an 8-byte CRC-64 covering everything before it.
//! Lengths use a variable-width encoding keyed off the top two bits of the
//! leading byte: `00` inline 6-bit, `01` 14-bit, `10` a following 32-bit
//! big-endian word; `11` is reserved and rejected on read.

use std::path::Path;

use bytes::Bytes;
use crc::{Crc, CRC_64_XZ};
use tracing::{info, warn};

use crate::{
    error::ServerError,
    storage::{
        database::Database,
        hash::HashValue,
        keyspace::now_ms,
        list::ListValue,
        set::SetValue,
        string::StringValue,
        value::{Payload, Value},
        zset::SortedSetValue,
    },
};

const MAGIC: &[u8; 5] = b"REDIS";
const VERSION: &[u8; 4] = b"0001";

const OP_AUX: u8 = 0xFA;
const OP_RESIZEDB: u8 = 0xFB;
const OP_EXPIRETIME_MS: u8 = 0xFD;
const OP_SELECTDB: u8 = 0xFE;
const OP_EOF: u8 = 0xFF;

const TYPE_STRING: u8 = 0;
const TYPE_LIST: u8 = 1;
const TYPE_HASH: u8 = 2;
const TYPE_SET: u8 = 3;
const TYPE_ZSET: u8 = 4;

const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_XZ);

fn write_length(buf: &mut Vec<u8>, len: u64) {
    if len <= 0x3F {
        buf.push(len as u8);
    } else if len <= 0x3FFF {
        buf.push(0x40 | ((len >> 8) as u8));
        buf.push((len & 0xFF) as u8);
    } else {
        buf.push(0x80);
        buf.extend_from_slice(&(len as u32).to_be_bytes());
    }
}

fn write_bytes(buf: &mut Vec<u8>, data: &[u8]) {
    write_length(buf, data.len() as u64);
    buf.extend_from_slice(data);
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn byte(&mut self) -> Result<u8, ServerError> {
        let b = *self
            .data
            .get(self.pos)
            .ok_or_else(|| corrupt("unexpected end of snapshot"))?;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ServerError> {
        let end = self.pos.checked_add(n).ok_or_else(|| corrupt("length overflow"))?;
        let slice = self.data.get(self.pos..end).ok_or_else(|| corrupt("truncated record"))?;
        self.pos = end;
        Ok(slice)
    }

    fn length(&mut self) -> Result<u64, ServerError> {
        let first = self.byte()?;
        match first >> 6 {
            0b00 => Ok((first & 0x3F) as u64),
            0b01 => {
                let low = self.byte()?;
                Ok((((first & 0x3F) as u64) << 8) | low as u64)
            },
            0b10 => {
                let bytes = self.take(4)?;
                Ok(u32::from_be_bytes(bytes.try_into().expect("len 4")) as u64)
            },
            _ => Err(corrupt("reserved length encoding")),
        }
    }

    fn bytes(&mut self) -> Result<Bytes, ServerError> {
        let len = self.length()? as usize;
        Ok(Bytes::copy_from_slice(self.take(len)?))
    }

    fn i64_be(&mut self) -> Result<i64, ServerError> {
        Ok(i64::from_be_bytes(self.take(8)?.try_into().expect("len 8")))
    }

    fn f64_be(&mut self) -> Result<f64, ServerError> {
        Ok(f64::from_be_bytes(self.take(8)?.try_into().expect("len 8")))
    }
}

fn corrupt(msg: &str) -> ServerError {
    ServerError::Io(anyhow::anyhow!("corrupt snapshot: {msg}"))
}

/// Serializes every non-empty database into the binary snapshot format.
/// Takes `&Database` rather than owning it so a caller doing a background
/// save can hand over a cloned, point-in-time copy without holding any lock
/// while this runs.
pub fn encode(db: &Database) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(VERSION);

    write_aux(&mut buf, b"respdb-ver", env!("CARGO_PKG_VERSION").as_bytes());
    write_aux(&mut buf, b"ctime", now_ms().to_string().as_bytes());

    for (index, ks) in db.iter().enumerate() {
        if ks.size() == 0 {
            continue;
        }
        buf.push(OP_SELECTDB);
        write_length(&mut buf, index as u64);
        buf.push(OP_RESIZEDB);
        write_length(&mut buf, ks.size() as u64);
        write_length(&mut buf, ks.expiring_count() as u64);

        for (key, value) in ks.iter() {
            write_key_record(&mut buf, key, value);
        }
    }

    buf.push(OP_EOF);
    let checksum = CRC64.checksum(&buf);
    buf.extend_from_slice(&checksum.to_be_bytes());
    buf
}

fn write_aux(buf: &mut Vec<u8>, key: &[u8], value: &[u8]) {
    buf.push(OP_AUX);
    write_bytes(buf, key);
    write_bytes(buf, value);
}

fn write_key_record(buf: &mut Vec<u8>, key: &Bytes, value: &Value) {
    if let Some(at_ms) = value.expires_at_ms {
        buf.push(OP_EXPIRETIME_MS);
        buf.extend_from_slice(&at_ms.to_be_bytes());
    }
    match &value.payload {
        Payload::String(s) => {
            buf.push(TYPE_STRING);
            write_bytes(buf, key);
            write_bytes(buf, s.get_bytes());
        },
        Payload::List(l) => {
            buf.push(TYPE_LIST);
            write_bytes(buf, key);
            let items = l.range_inclusive(0, -1);
            write_length(buf, items.len() as u64);
            for item in items {
                write_bytes(buf, &item);
            }
        },
        Payload::Hash(h) => {
            buf.push(TYPE_HASH);
            write_bytes(buf, key);
            let pairs: Vec<_> = h.get_all().collect();
            write_length(buf, pairs.len() as u64);
            for (field, val) in pairs {
                write_bytes(buf, field);
                write_bytes(buf, val);
            }
        },
        Payload::Set(s) => {
            buf.push(TYPE_SET);
            write_bytes(buf, key);
            let members: Vec<_> = s.members().collect();
            write_length(buf, members.len() as u64);
            for member in members {
                write_bytes(buf, member);
            }
        },
        Payload::SortedSet(z) => {
            buf.push(TYPE_ZSET);
            write_bytes(buf, key);
            let members = z.range_by_rank(0, -1, false);
            write_length(buf, members.len() as u64);
            for (member, score) in members {
                write_bytes(buf, &member);
                buf.extend_from_slice(&score.to_be_bytes());
            }
        },
    }
}

/// Loads a snapshot written by [`encode`] into `db`, replacing its current
/// contents database-by-database as each `SELECTDB` is seen. Every database
/// not mentioned in the snapshot is left as-is (empty, on a fresh start).
pub fn decode(data: &[u8], db: &mut Database) -> Result<(), ServerError> {
    if data.len() < 9 + 8 {
        return Err(corrupt("file too small"));
    }
    let (body, trailer) = data.split_at(data.len() - 8);
    let expected = u64::from_be_bytes(trailer.try_into().expect("len 8"));
    let actual = CRC64.checksum(body);
    if expected != actual {
        return Err(corrupt("checksum mismatch"));
    }

    let mut r = Reader::new(body);
    let magic = r.take(5)?;
    if magic != MAGIC {
        return Err(corrupt("bad magic"));
    }
    let _version = r.take(4)?;

    let mut current_index: Option<usize> = None;
    loop {
        let opcode = r.byte()?;
        match opcode {
            OP_AUX => {
                let _k = r.bytes()?;
                let _v = r.bytes()?;
            },
            OP_SELECTDB => {
                let idx = r.length()? as usize;
                if !db.is_valid_index(idx) {
                    return Err(corrupt("SELECTDB index out of range"));
                }
                db.get_mut(idx).flush();
                current_index = Some(idx);
            },
            OP_RESIZEDB => {
                let _keys = r.length()?;
                let _expiring = r.length()?;
            },
            OP_EXPIRETIME_MS | TYPE_STRING | TYPE_LIST | TYPE_HASH | TYPE_SET | TYPE_ZSET => {
                let Some(idx) = current_index else {
                    return Err(corrupt("key record before SELECTDB"));
                };
                let expires_at_ms = if opcode == OP_EXPIRETIME_MS {
                    let at_ms = r.i64_be()?;
                    Some((r.byte()?, at_ms))
                } else {
                    None
                };
                let (type_tag, expires_at_ms) = match expires_at_ms {
                    Some((tag, at_ms)) => (tag, Some(at_ms)),
                    None => (opcode, None),
                };
                read_key_record(&mut r, type_tag, expires_at_ms, db.get_mut(idx))?;
            },
            OP_EOF => break,
            _ => return Err(corrupt("unknown opcode")),
        }
    }
    Ok(())
}

fn read_key_record(
    r: &mut Reader<'_>,
    type_tag: u8,
    expires_at_ms: Option<i64>,
    ks: &mut crate::storage::keyspace::Keyspace,
) -> Result<(), ServerError> {
    let key = r.bytes()?;
    let now = now_ms();
    let payload = match type_tag {
        TYPE_STRING => Payload::String(StringValue::new(r.bytes()?)),
        TYPE_LIST => {
            let n = r.length()?;
            let mut list = ListValue::new();
            let items: Result<Vec<Bytes>, ServerError> = (0..n).map(|_| r.bytes()).collect();
            list.push_back(items?.into_iter());
            Payload::List(list)
        },
        TYPE_HASH => {
            let n = r.length()?;
            let mut hash = HashValue::new();
            for _ in 0..n {
                let field = r.bytes()?;
                let value = r.bytes()?;
                hash.set(field, value);
            }
            Payload::Hash(hash)
        },
        TYPE_SET => {
            let n = r.length()?;
            let mut set = SetValue::new();
            let members: Result<Vec<Bytes>, ServerError> = (0..n).map(|_| r.bytes()).collect();
            set.add(members?.into_iter());
            Payload::Set(set)
        },
        TYPE_ZSET => {
            let n = r.length()?;
            let mut zset = SortedSetValue::new();
            for _ in 0..n {
                let member = r.bytes()?;
                let score = r.f64_be()?;
                zset.add(score, member)?;
            }
            Payload::SortedSet(zset)
        },
        _ => return Err(corrupt("unknown value type")),
    };
    let mut value = Value::new(payload, now);
    value.expires_at_ms = expires_at_ms;
    ks.set(key, value)?;
    Ok(())
}

/// Writes `db`'s snapshot to `path` atomically: the encoded bytes land in a
/// sibling temp file first, which is then renamed into place so a reader (or
/// a crash mid-write) never observes a half-written snapshot.
pub fn save_to_path(db: &Database, path: &Path) -> Result<(), ServerError> {
    let bytes = encode(db);
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, &bytes)?;
    std::fs::rename(&tmp_path, path)?;
    info!(path = %path.display(), bytes = bytes.len(), "wrote snapshot");
    Ok(())
}

/// Loads `path` into `db` if it exists; a missing file is not an error (a
/// fresh server has nothing to recover).
pub fn load_from_path(path: &Path, db: &mut Database) -> Result<(), ServerError> {
    if !path.exists() {
        return Ok(());
    }
    let bytes = std::fs::read(path)?;
    match decode(&bytes, db) {
        Ok(()) => {
            info!(path = %path.display(), keys = db.total_size(), "loaded snapshot");
            Ok(())
        },
        Err(e) => {
            warn!(path = %path.display(), error = %e, "snapshot failed to load");
            Err(e)
        },
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::storage::eviction::EvictionPolicy;

    fn sample_db() -> Database {
        let mut db = Database::new(2, EvictionPolicy::NoEviction, 0);
        db.get_mut(0)
            .set(
                Bytes::from_static(b"greeting"),
                Value::new(Payload::String(StringValue::new(Bytes::from_static(b"hi"))), 0),
            )
            .expect("set");
        let mut list = ListValue::new();
        list.push_back([Bytes::from_static(b"a"), Bytes::from_static(b"b")].into_iter());
        db.get_mut(0)
            .set(Bytes::from_static(b"mylist"), Value::new(Payload::List(list), 0))
            .expect("set");
        let mut zset = SortedSetValue::new();
        zset.add(1.5, Bytes::from_static(b"m")).expect("add");
        db.get_mut(1)
            .set(Bytes::from_static(b"myzset"), Value::new(Payload::SortedSet(zset), 0))
            .expect("set");
        db
    }

    #[test]
    fn round_trips_every_container_type() {
        let db = sample_db();
        let bytes = encode(&db);
        let mut loaded = Database::new(2, EvictionPolicy::NoEviction, 0);
        decode(&bytes, &mut loaded).expect("decode");
        assert_eq!(loaded.get_mut(0).size(), 2);
        assert_eq!(loaded.get_mut(1).size(), 1);
    }

    #[test]
    fn expiration_survives_round_trip() {
        let mut db = Database::new(1, EvictionPolicy::NoEviction, 0);
        let at_ms = now_ms() + 60_000;
        db.get_mut(0)
            .set(
                Bytes::from_static(b"k"),
                Value::new(Payload::String(StringValue::new(Bytes::from_static(b"v"))), 0),
            )
            .expect("set");
        db.get_mut(0).expire_absolute_ms(b"k", at_ms);
        let bytes = encode(&db);
        let mut loaded = Database::new(1, EvictionPolicy::NoEviction, 0);
        decode(&bytes, &mut loaded).expect("decode");
        let ttl = loaded.get_mut(0).ttl_ms(b"k");
        assert!(ttl > 0 && ttl <= 60_000);
    }

    #[test]
    fn tampered_checksum_is_rejected() {
        let db = sample_db();
        let mut bytes = encode(&db);
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let mut loaded = Database::new(2, EvictionPolicy::NoEviction, 0);
        assert!(decode(&bytes, &mut loaded).is_err());
    }

    #[test]
    fn empty_database_round_trips_to_nothing() {
        let db = Database::new(4, EvictionPolicy::NoEviction, 0);
        let bytes = encode(&db);
        let mut loaded = Database::new(4, EvictionPolicy::NoEviction, 0);
        decode(&bytes, &mut loaded).expect("decode");
        assert_eq!(loaded.total_size(), 0);
    }
}
