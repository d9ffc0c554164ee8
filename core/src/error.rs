// Copyright (c) 2024-2025 The Tapmint Project

/// Errors for pure signature / message shaping operations
#[derive(Copy, Clone, Debug, PartialEq, thiserror::Error)]
pub enum Error {
    /// Odd number of hex digits after the optional `0x` prefix
    #[error("odd-length hex input")]
    OddHexLength,

    /// Character outside `[0-9a-fA-F]`
    #[error("invalid hex character")]
    InvalidHexCharacter,

    /// DER signature does not start with a SEQUENCE tag
    #[error("DER: expected SEQUENCE tag")]
    DerOuterTag,

    /// DER component does not start with an INTEGER tag
    #[error("DER: expected INTEGER tag")]
    DerIntegerTag,

    /// DER length field malformed or overruns the input
    #[error("DER: bad length")]
    DerLength,

    /// R or S longer than 32 bytes after stripping padding
    #[error("DER: integer exceeds 32 bytes")]
    DerIntegerTooLong,

    /// Bytes remain after the S component
    #[error("DER: trailing bytes")]
    DerTrailingBytes,

    /// Contract id does not decode to exactly 32 bytes
    #[error("contract id must be 32 bytes")]
    ContractIdLength,

    /// Argument list failed to JSON-encode
    #[error("argument encoding failed")]
    ArgEncoding,

    /// Public key is not 65 bytes
    #[error("public key must be 65 bytes")]
    PublicKeyLength,

    /// Public key does not carry the uncompressed-point prefix
    #[error("public key missing 0x04 prefix")]
    PublicKeyPrefix,

    /// Public key bytes are not a valid curve point
    #[error("public key not on curve")]
    PublicKeyInvalid,

    /// No recovery id in 0..=3 reproduces the expected key
    #[error("signature does not match chip key")]
    NoRecoveryMatch,
}
