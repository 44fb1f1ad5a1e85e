// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! `MULTI`/`DISCARD`/`WATCH`/`UNWATCH`. `EXEC` is not here:
//! replaying the queued commands needs the dispatcher itself, so it is
//! handled directly in [`crate::commands::dispatch`].

use bytes::Bytes;

use crate::{error::ServerError, resp::RespValue, storage::keyspace::Keyspace, txn::Txn};

pub fn multi(txn: &mut Txn) -> Result<RespValue, ServerError> {
    if txn.begin() {
        Ok(RespValue::ok())
    } else {
        Err(ServerError::StateError("MULTI calls can not be nested".to_string()))
    }
}

pub fn discard(txn: &mut Txn) -> Result<RespValue, ServerError> {
    if txn.discard() {
        Ok(RespValue::ok())
    } else {
        Err(ServerError::StateError("DISCARD without MULTI".to_string()))
    }
}

pub fn watch(txn: &mut Txn, ks: &Keyspace, args: &[Bytes]) -> Result<RespValue, ServerError> {
    if txn.is_queuing() {
        return Err(ServerError::StateError("WATCH inside MULTI is not allowed".to_string()));
    }
    for key in args {
        txn.watch(key.clone(), ks.version(key));
    }
    Ok(RespValue::ok())
}

pub fn unwatch(txn: &mut Txn) -> Result<RespValue, ServerError> {
    txn.unwatch();
    Ok(RespValue::ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::eviction::EvictionPolicy;

    #[test]
    fn multi_then_multi_again_errors() {
        let mut txn = Txn::new();
        multi(&mut txn).expect("first multi");
        assert!(matches!(multi(&mut txn), Err(ServerError::StateError(_))));
    }

    #[test]
    fn discard_without_multi_errors() {
        let mut txn = Txn::new();
        assert!(matches!(discard(&mut txn), Err(ServerError::StateError(_))));
    }

    #[test]
    fn watch_inside_multi_is_rejected() {
        let ks = Keyspace::new(EvictionPolicy::NoEviction, 0);
        let mut txn = Txn::new();
        multi(&mut txn).expect("multi");
        let result = watch(&mut txn, &ks, &[Bytes::from_static(b"k")]);
        assert!(matches!(result, Err(ServerError::StateError(_))));
    }
}
