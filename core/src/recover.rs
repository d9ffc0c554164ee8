// Copyright (c) 2024-2025 The Tapmint Project

//! Recovery-id resolution
//!
//! The chip does not deliver a recovery id with its signature; the host
//! derives it by trying all four candidates against the key read from the
//! chip in the same session. The result is never cached across sessions.

use crate::{codec, curve, Error, FieldElement, PubKey65};

/// Find the recovery id in `0..=3` whose recovered key equals
/// `expected_pubkey`.
///
/// `s` must already be low-S normalized. Short-circuits on the first match;
/// key comparison is constant time.
pub fn resolve_recovery_id(
    msg_hash: &[u8; 32],
    r: &FieldElement,
    s: &FieldElement,
    expected_pubkey: &PubKey65,
) -> Result<u8, Error> {
    for rid in 0u8..=3 {
        let candidate = match curve::recover(msg_hash, r, s, rid) {
            Some(k) => k,
            None => continue,
        };

        if codec::const_eq(&candidate, expected_pubkey) {
            return Ok(rid);
        }
    }

    Err(Error::NoRecoveryMatch)
}
