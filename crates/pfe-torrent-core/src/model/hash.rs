//! Content-addressed transfer identifiers and their text encodings.
//!
//! Engines speak hex; human-facing links use RFC 4648 base32 because it is
//! shorter and case-insensitive.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::EncodingError;

/// Length in bytes of a transfer info hash.
pub const HASH_LEN: usize = 20;

const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Info hash identifying a transfer's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; HASH_LEN]);

impl ContentHash {
    /// Wrap raw hash bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }

    /// Borrow the raw hash bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Decode a 40-character hex string.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError::Hex`] when the input is not exactly
    /// [`HASH_LEN`] hex-encoded bytes.
    pub fn from_hex(value: &str) -> Result<Self, EncodingError> {
        let mut bytes = [0_u8; HASH_LEN];
        hex::decode_to_slice(value.trim(), &mut bytes)
            .map_err(|source| EncodingError::Hex { source })?;
        Ok(Self(bytes))
    }

    /// Lowercase hex rendering, as used by torrent engines.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Decode a base32 string. Case is ignored and trailing `=` padding is
    /// accepted.
    ///
    /// # Errors
    ///
    /// Returns an [`EncodingError`] for characters outside the alphabet or a
    /// payload that does not decode to [`HASH_LEN`] bytes.
    pub fn from_base32(value: &str) -> Result<Self, EncodingError> {
        let decoded = decode_base32(value.trim())?;
        let bytes: [u8; HASH_LEN] =
            decoded
                .as_slice()
                .try_into()
                .map_err(|_| EncodingError::Length {
                    expected: HASH_LEN,
                    actual: decoded.len(),
                })?;
        Ok(Self(bytes))
    }

    /// Uppercase base32 rendering used for shareable links.
    #[must_use]
    pub fn to_base32(&self) -> String {
        encode_base32(&self.0)
    }
}

impl Display for ContentHash {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.to_base32())
    }
}

impl FromStr for ContentHash {
    type Err = EncodingError;

    /// Accepts either the 40-character hex form or the base32 form.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.len() == HASH_LEN * 2 && trimmed.bytes().all(|b| b.is_ascii_hexdigit()) {
            Self::from_hex(trimmed)
        } else {
            Self::from_base32(trimmed)
        }
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_hex(&text).map_err(serde::de::Error::custom)
    }
}

fn encode_base32(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len().div_ceil(5) * 8);
    let mut buffer: u32 = 0;
    let mut bits: u32 = 0;
    for &byte in bytes {
        buffer = (buffer << 8) | u32::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(base32_symbol(buffer >> bits));
        }
        buffer &= (1 << bits) - 1;
    }
    if bits > 0 {
        out.push(base32_symbol(buffer << (5 - bits)));
    }
    while out.len() % 8 != 0 {
        out.push('=');
    }
    out
}

fn base32_symbol(index: u32) -> char {
    char::from(BASE32_ALPHABET[(index & 0x1f) as usize])
}

fn decode_base32(value: &str) -> Result<Vec<u8>, EncodingError> {
    let mut out = Vec::with_capacity(value.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits: u32 = 0;
    for (position, character) in value.trim_end_matches('=').chars().enumerate() {
        let digit = base32_value(character)
            .ok_or(EncodingError::Base32Character {
                character,
                position,
            })?;
        buffer = (buffer << 5) | u32::from(digit);
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push(((buffer >> bits) & 0xff) as u8);
            buffer &= (1 << bits) - 1;
        }
    }
    Ok(out)
}

const fn base32_value(character: char) -> Option<u8> {
    match character {
        'A'..='Z' => Some(character as u8 - b'A'),
        'a'..='z' => Some(character as u8 - b'a'),
        '2'..='7' => Some(character as u8 - b'2' + 26),
        _ => None,
    }
}
