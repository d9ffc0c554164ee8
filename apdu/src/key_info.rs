// Copyright (c) 2024-2025 The Tapmint Project

//! Key info APDU, for fetching chip counters and the key's public point

use crate::{be_u32, ApduError, ChipRequest, ChipResponse, Instruction};

/// Request counters and public key for a key index.
///
/// ## Encoding:
/// ```text
/// 00 16 <key_index> 00 00
/// ```
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GetKeyInfo {
    /// Chip key slot (1-based on production chips)
    pub key_index: u8,
}

impl GetKeyInfo {
    /// Create a new [GetKeyInfo] APDU
    pub fn new(key_index: u8) -> Self {
        Self { key_index }
    }
}

impl ChipRequest for GetKeyInfo {
    const INS: Instruction = Instruction::GetKeyInfo;

    fn p1(&self) -> u8 {
        self.key_index
    }
}

/// Key info response body.
///
/// Counters are monotone and maintained by the chip; they are informational
/// on the host side. Some chip variants omit the leading `0x04` of the
/// uncompressed point, which is detected and restored here.
///
/// ## Encoding:
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                   GLOBAL_COUNTER (big-endian)                 |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                    KEY_COUNTER (big-endian)                   |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |      0x04     |                                               |
/// +-+-+-+-+-+-+-+-+                                               +
/// /                     X || Y (64 bytes)                         /
/// |                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct ChipAuthRecord {
    /// Signatures issued across all keys
    pub global_counter: u32,
    /// Signatures issued by this key
    pub key_counter: u32,
    /// Uncompressed secp256k1 public key, `0x04 || X || Y`
    pub public_key: [u8; 65],
}

impl ChipResponse for ChipAuthRecord {
    fn parse(body: &[u8]) -> Result<Self, ApduError> {
        let global_counter = be_u32(body, 0)?;
        let key_counter = be_u32(body, 4)?;

        let key = &body[8..];

        let mut public_key = [0u8; 65];
        match key.len() {
            // Full uncompressed point
            65 => {
                if key[0] != 0x04 {
                    return Err(ApduError::InvalidEncoding);
                }
                public_key.copy_from_slice(key);
            }
            // Prefix omitted by the chip variant, restore it
            64 => {
                public_key[0] = 0x04;
                public_key[1..].copy_from_slice(key);
            }
            _ => return Err(ApduError::InvalidLength),
        }

        Ok(Self {
            global_counter,
            key_counter,
            public_key,
        })
    }
}
