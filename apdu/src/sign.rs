// Copyright (c) 2024-2025 The Tapmint Project

//! Signature APDUs

use crate::{be_u32, ApduError, ChipRequest, ChipResponse, Instruction};

/// Request an ECDSA signature over a 32-byte hash with the key at an index.
///
/// The hash length is fixed; the command handler enforces it before the
/// request is framed. The chip returns the signature DER-encoded, it is never
/// parsed at this layer.
///
/// ## Encoding:
/// ```text
/// 00 18 <key_index> 00 20 <msg_hash (32 bytes)> 00
/// ```
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GenerateSignature {
    /// Chip key slot
    pub key_index: u8,
    /// SHA-256 digest to sign
    pub msg_hash: [u8; 32],
}

impl GenerateSignature {
    /// Create a new [GenerateSignature] APDU
    pub fn new(key_index: u8, msg_hash: [u8; 32]) -> Self {
        Self {
            key_index,
            msg_hash,
        }
    }
}

impl ChipRequest for GenerateSignature {
    const INS: Instruction = Instruction::GenerateSignature;

    fn p1(&self) -> u8 {
        self.key_index
    }

    fn data(&self) -> Vec<u8> {
        self.msg_hash.to_vec()
    }
}

/// Signature response body.
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
/// |                                                               |
/// /                  DER SIGNATURE (variable)                     /
/// |                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct SignatureRecord {
    /// Signatures issued across all keys
    pub global_counter: u32,
    /// Signatures issued by this key
    pub key_counter: u32,
    /// Raw DER-encoded ECDSA signature
    pub der: Vec<u8>,
}

impl ChipResponse for SignatureRecord {
    fn parse(body: &[u8]) -> Result<Self, ApduError> {
        let global_counter = be_u32(body, 0)?;
        let key_counter = be_u32(body, 4)?;

        let der = body[8..].to_vec();
        if der.is_empty() {
            return Err(ApduError::InvalidLength);
        }

        Ok(Self {
            global_counter,
            key_counter,
            der,
        })
    }
}
