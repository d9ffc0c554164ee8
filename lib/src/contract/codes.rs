// Copyright (c) 2024-2025 The Tapmint Project

//! Contract error codes
//!
//! The collection contract reports failures as numeric contract error
//! codes; simulation surfaces them inside the diagnostic string as
//! `Error(Contract, #NNN)`. The UI distinguishes cases by code.

/// `token_id` does not exist
pub const NON_EXISTENT_TOKEN: u32 = 200;

/// Caller does not own the token being transferred
pub const INCORRECT_OWNER: u32 = 201;

/// All token ids are in use
pub const TOKEN_IDS_DEPLETED: u32 = 206;

/// The chip key was already minted
pub const TOKEN_ALREADY_MINTED: u32 = 210;

/// The replay nonce did not advance
pub const STALE_NONCE: u32 = 211;

/// The token was already claimed
pub const TOKEN_ALREADY_CLAIMED: u32 = 212;

/// Signature recovery did not produce the expected key
pub const INVALID_SIGNATURE: u32 = 214;

/// The token exists but has not been claimed yet
pub const TOKEN_NOT_CLAIMED: u32 = 215;

/// The chip key has never been seen by the contract
pub const UNKNOWN_PUBLIC_KEY: u32 = 216;

/// Short label for a known contract error code
pub fn describe(code: u32) -> &'static str {
    match code {
        NON_EXISTENT_TOKEN => "token does not exist",
        INCORRECT_OWNER => "incorrect owner",
        TOKEN_IDS_DEPLETED => "token ids depleted",
        TOKEN_ALREADY_MINTED => "already minted",
        STALE_NONCE => "stale nonce",
        TOKEN_ALREADY_CLAIMED => "already claimed",
        INVALID_SIGNATURE => "invalid signature",
        TOKEN_NOT_CLAIMED => "not claimed yet",
        UNKNOWN_PUBLIC_KEY => "unknown public key",
        _ => "contract error",
    }
}

/// Extract a contract error code from a simulation / execution diagnostic.
///
/// Looks for the `Error(Contract, #NNN)` shape the host environment embeds
/// in failure strings.
pub fn extract_contract_code(diag: &str) -> Option<u32> {
    const MARKER: &str = "Error(Contract, #";

    let start = diag.find(MARKER)? + MARKER.len();
    let rest = &diag[start..];
    let end = rest.find(')')?;

    rest[..end].parse().ok()
}
