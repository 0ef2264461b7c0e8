//! Key id and key encodings.
//!
//! Key servers, manifests and license servers all disagree on how a 16 byte
//! key id is spelled. This module converts between the three forms in use:
//!
//! - hex, dash-stripped: `00112233445566778899aabbccddeeff`
//! - uuid, dashed: `00112233-4455-6677-8899-aabbccddeeff`
//! - base64: `ABEiM0RVZneImaq7zN3u/w==`

use crate::{Error, Result};
use base64::Engine;
use std::{fmt, str::FromStr};

/// A 16 byte content key id.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct KeyId(pub [u8; 16]);

impl KeyId {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(Self(to_16_bytes("key id", bytes)?))
    }

    /// Parse a key id from hex (with or without dashes).
    pub fn from_hex(value: &str) -> Result<Self> {
        let value = value.trim().replace('-', "");

        if value.len() != 32 {
            return Err(Error::format(
                "key id",
                format!("expected 32 hex chars, got {}", value.len()),
            ));
        }

        let bytes = hex::decode(&value).map_err(|x| Error::format("key id", x.to_string()))?;
        Self::from_bytes(&bytes)
    }

    pub fn from_base64(value: &str) -> Result<Self> {
        Ok(Self(decode_base64_16(value)?))
    }

    /// Parse a key id given as hex, dashed uuid or base64.
    pub fn parse(value: &str) -> Result<Self> {
        Self::from_hex(value).or_else(|_| Self::from_base64(value))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// 32 lowercase hex chars.
    pub fn hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Canonical lowercase 8-4-4-4-12 form.
    pub fn uuid(&self) -> String {
        let value = self.hex();
        format!(
            "{}-{}-{}-{}-{}",
            &value[..8],
            &value[8..12],
            &value[12..16],
            &value[16..20],
            &value[20..]
        )
    }

    pub fn base64(&self) -> String {
        encode_base64(self.0)
    }

    /// Key id bytes in the little-endian GUID layout used by PlayReady.
    ///
    /// The first three groups (4, 2 and 2 bytes) are byte swapped, the
    /// remaining 8 bytes are kept as they are.
    pub fn guid_le_bytes(&self) -> [u8; 16] {
        let mut bytes = self.0;
        bytes[..4].reverse();
        bytes[4..6].reverse();
        bytes[6..8].reverse();
        bytes
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uuid())
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyId({})", self.uuid())
    }
}

impl FromStr for KeyId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<[u8; 16]> for KeyId {
    fn from(value: [u8; 16]) -> Self {
        Self(value)
    }
}

/// Normalize a key id to 32 lowercase hex chars.
pub fn hex_dashless(key_id: &str) -> Result<String> {
    Ok(KeyId::from_hex(key_id)?.hex())
}

/// Normalize a key id to its canonical dashed uuid form.
pub fn uuid_dashed(key_id: &str) -> Result<String> {
    Ok(KeyId::from_hex(key_id)?.uuid())
}

pub fn encode_base64<T: AsRef<[u8]>>(input: T) -> String {
    base64::engine::general_purpose::STANDARD.encode(input)
}

/// Decode base64 that must hold exactly 16 bytes (key ids, keys and ivs).
pub fn decode_base64_16(input: &str) -> Result<[u8; 16]> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(input.trim())
        .map_err(|x| Error::format("base64", x.to_string()))?;
    to_16_bytes("base64", &bytes)
}

/// Decode hex that must hold exactly 16 bytes.
pub fn decode_hex_16(input: &str) -> Result<[u8; 16]> {
    let bytes = hex::decode(input.trim()).map_err(|x| Error::format("hex", x.to_string()))?;
    to_16_bytes("hex", &bytes)
}

fn to_16_bytes(what: &'static str, bytes: &[u8]) -> Result<[u8; 16]> {
    bytes.try_into().map_err(|_| {
        Error::format(
            what,
            format!("expected 16 bytes, got {} bytes", bytes.len()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guid_le_bytes() {
        let kid = KeyId::from_hex("00112233445566778899aabbccddeeff").unwrap();
        assert_eq!(
            hex::encode(kid.guid_le_bytes()),
            "33221100554477668899aabbccddeeff"
        );
    }

    #[test]
    fn test_from_hex_wrong_length() {
        let result = KeyId::from_hex("0011");
        assert!(matches!(result, Err(Error::Format { .. })));
    }

    #[test]
    fn test_parse_accepts_all_forms() {
        let expected = KeyId::from_hex("00112233445566778899aabbccddeeff").unwrap();
        assert_eq!(KeyId::parse("00112233-4455-6677-8899-AABBCCDDEEFF").unwrap(), expected);
        assert_eq!(KeyId::parse("ABEiM0RVZneImaq7zN3u/w==").unwrap(), expected);
    }
}
