// Copyright (c) 2024-2025 The Tapmint Project

//! Platform-independent logic for chip-authorized NFT operations.
//!
//! Everything here is pure and I/O free: hex / byte codecs, secp256k1
//! signature shaping (low-S normalization, public-key recovery), DER
//! signature parsing, deterministic auth-message construction, and the
//! recovery-id search. The host library drives chips and contracts; this
//! crate decides what the bytes mean.

pub mod codec;
pub mod curve;
pub mod der;
pub mod recover;
pub mod sep53;

mod error;
pub use error::Error;

/// Uncompressed secp256k1 public key, `0x04 || X || Y`
pub type PubKey65 = [u8; 65];

/// Big-endian scalar field element
pub type FieldElement = [u8; 32];
