// Copyright (c) 2024-2025 The Tapmint Project

//! Hex / byte codec helpers
//!
//! Policy: input may carry a `0x` / `0X` prefix; an odd digit count after
//! stripping is a hard error (no nibble padding), as is any non-hex
//! character.

use subtle::ConstantTimeEq;

use crate::Error;

/// Decode a hex string, accepting an optional `0x` prefix
pub fn decode_hex(s: &str) -> Result<Vec<u8>, Error> {
    let s = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);

    hex::decode(s).map_err(|e| match e {
        hex::FromHexError::OddLength => Error::OddHexLength,
        _ => Error::InvalidHexCharacter,
    })
}

/// Encode bytes as lowercase hex (no prefix)
pub fn encode_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Constant-time equality on byte strings.
///
/// Length is compared first in variable time; contents are compared in
/// constant time. Used for field elements and recovered keys.
pub fn const_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

/// Big-endian byte encoding of a u32
pub fn be_u32_to_bytes(x: u32) -> [u8; 4] {
    x.to_be_bytes()
}
