// Copyright (c) 2024-2025 The Tapmint Project

//! Deterministic auth-message construction
//!
//! The contract reconstructs the exact same octet string from its typed
//! arguments, so the layout is fixed-prefix concatenation with no
//! delimiters:
//!
//! ```text
//! SHA256(network_passphrase) || contract_id(32) || function_name || json(args) || nonce_be32
//! ```
//!
//! Only `function_name` and the JSON body vary in length; the function name
//! is a lowercase ASCII literal from a closed set and the JSON body is the
//! minimal array-of-strings form, so the message is collision free.

use sha2::{Digest, Sha256};

use crate::{codec, Error};

/// Contract functions that accept a chip-signed message
#[derive(Copy, Clone, Debug, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Function {
    Mint,
    Claim,
    Transfer,
}

impl Function {
    /// Lowercase wire name, as signed and as invoked
    pub fn as_str(&self) -> &'static str {
        match self {
            Function::Mint => "mint",
            Function::Claim => "claim",
            Function::Transfer => "transfer",
        }
    }
}

/// A constructed auth message and its SHA-256 hash (what the chip signs)
#[derive(Clone, Debug, PartialEq)]
pub struct AuthMessage {
    pub message: Vec<u8>,
    pub hash: [u8; 32],
}

/// Build the auth message for one operation.
///
/// `contract_id` is the canonical 32-byte contract-id hash in hex; `args` is
/// the flat ordered argument list (address strings and decimal-string
/// integers) exactly as the contract will see it.
pub fn build_auth_message(
    contract_id: &str,
    function: Function,
    args: &[String],
    nonce: u32,
    network_passphrase: &str,
) -> Result<AuthMessage, Error> {
    let network_hash = Sha256::digest(network_passphrase.as_bytes());

    let cid = codec::decode_hex(contract_id)?;
    if cid.len() != 32 {
        return Err(Error::ContractIdLength);
    }

    let json = serde_json::to_vec(args).map_err(|_| Error::ArgEncoding)?;

    let mut message =
        Vec::with_capacity(32 + 32 + function.as_str().len() + json.len() + 4);
    message.extend_from_slice(&network_hash);
    message.extend_from_slice(&cid);
    message.extend_from_slice(function.as_str().as_bytes());
    message.extend_from_slice(&json);
    message.extend_from_slice(&codec::be_u32_to_bytes(nonce));

    let hash = Sha256::digest(&message).into();

    Ok(AuthMessage { message, hash })
}
