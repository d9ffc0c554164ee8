// Copyright (c) 2024-2025 The Tapmint Project

//! DER ECDSA signature parsing
//!
//! Accepts `0x30 LEN 0x02 RLEN R 0x02 SLEN S` with short- or long-form
//! lengths (up to 4 length bytes). Leading `0x00` padding on R and S is
//! stripped and the components are left-padded to exactly 32 bytes.
//!
//! The parser returns only `(r, s)`; the recovery id is derived separately
//! by the resolver, never assumed here.

use crate::{Error, FieldElement};

/// Parse a DER-encoded ECDSA signature into 32-byte `(r, s)` components
pub fn parse_signature(der: &[u8]) -> Result<(FieldElement, FieldElement), Error> {
    let mut index = 0;

    // Outer SEQUENCE tag
    if der.first() != Some(&0x30) {
        return Err(Error::DerOuterTag);
    }
    index += 1;

    let (seq_len, n) = read_length(&der[index..])?;
    index += n;

    // The sequence must cover the remaining input exactly
    if der.len() - index != seq_len {
        return Err(if der.len() - index < seq_len {
            Error::DerLength
        } else {
            Error::DerTrailingBytes
        });
    }

    let (r, n) = read_integer(&der[index..])?;
    index += n;

    let (s, n) = read_integer(&der[index..])?;
    index += n;

    if index != der.len() {
        return Err(Error::DerTrailingBytes);
    }

    Ok((r, s))
}

/// Read a DER length field, short or long form (max 4 length bytes)
fn read_length(buff: &[u8]) -> Result<(usize, usize), Error> {
    let first = *buff.first().ok_or(Error::DerLength)?;

    // Short form
    if first < 0x80 {
        return Ok((first as usize, 1));
    }

    let count = (first & 0x7f) as usize;
    if count == 0 || count > 4 || buff.len() < 1 + count {
        return Err(Error::DerLength);
    }

    let mut len = 0usize;
    for b in &buff[1..1 + count] {
        len = (len << 8) | *b as usize;
    }

    Ok((len, 1 + count))
}

/// Read one INTEGER component, strip padding, left-pad to 32 bytes
fn read_integer(buff: &[u8]) -> Result<(FieldElement, usize), Error> {
    let mut index = 0;

    if buff.first() != Some(&0x02) {
        return Err(Error::DerIntegerTag);
    }
    index += 1;

    let (len, n) = read_length(&buff[index..])?;
    index += n;

    let body = buff.get(index..index + len).ok_or(Error::DerLength)?;
    index += len;

    // Strip leading zero padding
    let mut value = body;
    while value.len() > 1 && value[0] == 0x00 {
        value = &value[1..];
    }

    if value.len() > 32 {
        return Err(Error::DerIntegerTooLong);
    }

    let mut out = [0u8; 32];
    out[32 - value.len()..].copy_from_slice(value);

    Ok((out, index))
}
