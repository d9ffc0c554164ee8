// Copyright (c) 2024-2025 The Tapmint Project

//! Protocol / APDU definitions for contactless security chip communication
//!
//! This module provides the ISO-7816-4 command and response shapes used to
//! drive a Blockchain Security 2Go family chip: application selection, key
//! info and generation, and signature requests.
//!
//! Commands are framed as `CLA INS P1 P2 [Lc DATA] [Le]` with short-form
//! lengths; every response carries a two-byte trailing status word. Counter
//! fields in response bodies are big-endian, matching the chip.

pub mod generate_key;
pub mod key_info;
pub mod select;
pub mod sign;
pub mod status;

pub use status::StatusWord;

/// Chip APDU class byte (inter-industry, no secure messaging)
pub const CHIP_CLA: u8 = 0x00;

/// Application identifier for the chip's signing applet (13 bytes)
pub const CHIP_AID: [u8; 13] = [
    0xd2, 0x76, 0x00, 0x00, 0x04, 0x15, 0x02, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01,
];

/// Maximum data field length for a short-form APDU
pub const MAX_APDU_DATA: usize = 255;

/// Chip APDU instruction codes
#[derive(Copy, Clone, Debug, PartialEq)]
#[repr(u8)]
pub enum Instruction {
    /// Select the signing applet by AID
    Select = 0xa4,

    /// Generate a new secp256k1 keypair, returning its index
    GenerateKey = 0x02,

    /// Fetch counters and public key for a key index
    GetKeyInfo = 0x16,

    /// Sign a 32-byte hash with the key at an index
    GenerateSignature = 0x18,
}

/// APDU encode / decode errors
#[derive(Copy, Clone, Debug, PartialEq, thiserror::Error)]
pub enum ApduError {
    /// Command data field exceeds the short-form limit
    #[error("APDU data field too long")]
    DataTooLong,

    /// Response shorter than the trailing status word
    #[error("response truncated (no status word)")]
    ResponseTooShort,

    /// Response body length does not match the expected layout
    #[error("invalid response length")]
    InvalidLength,

    /// Response body malformed (bad tag or field value)
    #[error("invalid response encoding")]
    InvalidEncoding,
}

/// A framed ISO-7816-4 command APDU
#[derive(Clone, Debug, PartialEq)]
pub struct CommandApdu {
    pub cla: u8,
    pub ins: u8,
    pub p1: u8,
    pub p2: u8,
    pub data: Vec<u8>,
    pub le: Option<u8>,
}

impl CommandApdu {
    /// Serialize the command to wire bytes
    pub fn encode(&self) -> Result<Vec<u8>, ApduError> {
        if self.data.len() > MAX_APDU_DATA {
            return Err(ApduError::DataTooLong);
        }

        let mut out = Vec::with_capacity(6 + self.data.len());

        // Header
        out.extend_from_slice(&[self.cla, self.ins, self.p1, self.p2]);

        // Lc + data field
        if !self.data.is_empty() {
            out.push(self.data.len() as u8);
            out.extend_from_slice(&self.data);
        }

        // Le
        if let Some(le) = self.le {
            out.push(le);
        }

        Ok(out)
    }
}

/// Chip request trait, implemented by each command type
pub trait ChipRequest {
    /// Instruction code for this request
    const INS: Instruction;

    /// P1 parameter byte
    fn p1(&self) -> u8 {
        0x00
    }

    /// P2 parameter byte
    fn p2(&self) -> u8 {
        0x00
    }

    /// Command data field
    fn data(&self) -> Vec<u8> {
        Vec::new()
    }

    /// Expected-length byte (0x00 requests up to 256 bytes)
    fn le(&self) -> Option<u8> {
        Some(0x00)
    }

    /// Frame the request into a [CommandApdu]
    fn apdu(&self) -> CommandApdu {
        CommandApdu {
            cla: CHIP_CLA,
            ins: Self::INS as u8,
            p1: self.p1(),
            p2: self.p2(),
            data: self.data(),
            le: self.le(),
        }
    }
}

/// Chip response trait, parsed from a response body (status word removed)
pub trait ChipResponse: Sized {
    /// Parse a response body
    fn parse(body: &[u8]) -> Result<Self, ApduError>;
}

/// Split a raw response into body and trailing status word
pub fn split_response(wire: &[u8]) -> Result<(&[u8], StatusWord), ApduError> {
    if wire.len() < 2 {
        return Err(ApduError::ResponseTooShort);
    }

    let (body, sw) = wire.split_at(wire.len() - 2);

    Ok((body, StatusWord::from_bytes(sw[0], sw[1])))
}

/// Helper to read a big-endian u32 at an offset
pub(crate) fn be_u32(buff: &[u8], index: usize) -> Result<u32, ApduError> {
    let b: [u8; 4] = buff
        .get(index..index + 4)
        .and_then(|v| v.try_into().ok())
        .ok_or(ApduError::InvalidLength)?;

    Ok(u32::from_be_bytes(b))
}
