// Copyright (c) 2024-2025 The Tapmint Project

//! Key generation APDU

use crate::{ApduError, ChipRequest, ChipResponse, Instruction};

/// Generate a new secp256k1 keypair in the next free slot.
///
/// The chip assigns indices sequentially; the command handler loops this
/// request until the requested slot exists. A `0x6a84` status word means the
/// key store is exhausted.
///
/// ## Encoding:
/// ```text
/// 00 02 00 00 00
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct GenerateKey;

impl ChipRequest for GenerateKey {
    const INS: Instruction = Instruction::GenerateKey;
}

/// Key generation response body: the index of the newly created key.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GeneratedKey {
    pub key_index: u8,
}

impl ChipResponse for GeneratedKey {
    fn parse(body: &[u8]) -> Result<Self, ApduError> {
        if body.len() != 1 {
            return Err(ApduError::InvalidLength);
        }

        Ok(Self { key_index: body[0] })
    }
}
