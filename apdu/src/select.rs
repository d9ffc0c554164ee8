// Copyright (c) 2024-2025 The Tapmint Project

//! Applet selection APDU

use crate::{ChipRequest, ChipResponse, ApduError, Instruction, CHIP_AID};

/// Select the signing applet by its fixed 13-byte AID.
///
/// Must be issued once per chip session before any other command, and again
/// before a signature request when the chip has been re-fielded.
///
/// ## Encoding:
/// ```text
/// 00 A4 04 00 0D <AID (13 bytes)> 00
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct SelectApp;

impl ChipRequest for SelectApp {
    const INS: Instruction = Instruction::Select;

    fn p1(&self) -> u8 {
        // Select by DF name
        0x04
    }

    fn data(&self) -> Vec<u8> {
        CHIP_AID.to_vec()
    }
}

/// Select response; the applet returns no mandatory body, any FCI bytes are
/// ignored.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SelectResp;

impl ChipResponse for SelectResp {
    fn parse(_body: &[u8]) -> Result<Self, ApduError> {
        Ok(SelectResp)
    }
}
