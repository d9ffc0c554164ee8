// Copyright (c) 2024-2025 The Tapmint Project

//! secp256k1 shaping: low-S normalization, public-key recovery, key
//! validation
//!
//! The contract's verifier recovers the signer from `(hash, r, s, rid)` with
//! the same primitive used here; host and chain must agree bit-for-bit, so
//! recovery delegates to the curve implementation rather than reimplementing
//! point math.

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use k256::FieldBytes;

use crate::{Error, FieldElement, PubKey65};

/// secp256k1 group order n, big-endian
pub const CURVE_ORDER: FieldElement = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xfe, 0xba, 0xae, 0xdc, 0xe6, 0xaf, 0x48, 0xa0, 0x3b, 0xbf, 0xd2, 0x5e, 0x8c, 0xd0, 0x36,
    0x41, 0x41,
];

/// n / 2, big-endian
pub const HALF_CURVE_ORDER: FieldElement = [
    0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0x5d, 0x57, 0x6e, 0x73, 0x57, 0xa4, 0x50, 0x1d, 0xdf, 0xe9, 0x2f, 0x46, 0x68, 0x1b,
    0x20, 0xa0,
];

/// Map an S component into the low half of the scalar field.
///
/// Returns `n - s` when `s > n/2`, otherwise `s` unchanged. Comparison is
/// big-endian lexicographic; subtraction runs right-to-left with borrow.
pub fn normalize_s(s: &FieldElement) -> FieldElement {
    if !is_high(s) {
        return *s;
    }

    // s' = n - s
    let mut out = [0u8; 32];
    let mut borrow = 0u16;
    for i in (0..32).rev() {
        let minuend = CURVE_ORDER[i] as u16;
        let subtrahend = s[i] as u16 + borrow;

        if minuend >= subtrahend {
            out[i] = (minuend - subtrahend) as u8;
            borrow = 0;
        } else {
            out[i] = (256 + minuend - subtrahend) as u8;
            borrow = 1;
        }
    }

    out
}

/// Whether `s > n/2` (big-endian lexicographic compare)
fn is_high(s: &FieldElement) -> bool {
    for i in 0..32 {
        if s[i] > HALF_CURVE_ORDER[i] {
            return true;
        }
        if s[i] < HALF_CURVE_ORDER[i] {
            return false;
        }
    }

    // s == n/2 is low
    false
}

/// Recover the uncompressed public key that produced `(r, s)` over
/// `msg_hash` with recovery id `rid`.
///
/// Returns `None` for out-of-range scalars, rid > 3, or any degenerate
/// input the curve rejects.
pub fn recover(
    msg_hash: &[u8; 32],
    r: &FieldElement,
    s: &FieldElement,
    rid: u8,
) -> Option<PubKey65> {
    let rec_id = RecoveryId::from_byte(rid)?;

    let sig = Signature::from_scalars(FieldBytes::from(*r), FieldBytes::from(*s)).ok()?;

    let key = VerifyingKey::recover_from_prehash(msg_hash, &sig, rec_id).ok()?;

    let point = key.to_encoded_point(false);
    let bytes = point.as_bytes();
    debug_assert_eq!(bytes.len(), 65);

    let mut out = [0u8; 65];
    out.copy_from_slice(bytes);
    Some(out)
}

/// Validate a 65-byte uncompressed public key and return it as an array
pub fn validate_pubkey(bytes: &[u8]) -> Result<PubKey65, Error> {
    if bytes.len() != 65 {
        return Err(Error::PublicKeyLength);
    }
    if bytes[0] != 0x04 {
        return Err(Error::PublicKeyPrefix);
    }

    // Reject coordinates that are not on the curve
    if VerifyingKey::from_sec1_bytes(bytes).is_err() {
        return Err(Error::PublicKeyInvalid);
    }

    let mut out = [0u8; 65];
    out.copy_from_slice(bytes);
    Ok(out)
}
