//! # TLV Unit
//!
//! A single `[tag:1][length:2, big-endian][value:length]` unit.
//!
//! Any 3-byte pattern is a valid header, so decoding a buffer can only fail
//! because it is too short; the caller is expected to buffer more bytes and
//! retry. Values are never inspected here.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{constants, ProtocolError, Result};

/// Size of the tag + length header.
pub const HEADER_LEN: usize = 3;

/// Largest value a single unit can carry.
pub const MAX_VALUE_LEN: usize = u16::MAX as usize;

/// Wire tags understood by the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Tag {
    HelloRequest = 0,
    UuidClient = 1,
    UuidPartie = 2,
    Signature = 3,
    String = 11,
    Int = 12,
    ByteData = 13,
    GameRequest = 30,
    ActionRequest = 40,
    BoardRequest = 50,
    HelloResponse = 100,
    GameResponse = 130,
    ActionResponse = 140,
    BoardResponse = 150,
    LobbyRequest = 169,
    LobbyResponse = 170,
    JoinLobbyRequest = 178,
}

impl Tag {
    /// Map a raw tag byte to a known tag.
    pub fn from_byte(byte: u8) -> Option<Self> {
        let tag = match byte {
            0 => Tag::HelloRequest,
            1 => Tag::UuidClient,
            2 => Tag::UuidPartie,
            3 => Tag::Signature,
            11 => Tag::String,
            12 => Tag::Int,
            13 => Tag::ByteData,
            30 => Tag::GameRequest,
            40 => Tag::ActionRequest,
            50 => Tag::BoardRequest,
            100 => Tag::HelloResponse,
            130 => Tag::GameResponse,
            140 => Tag::ActionResponse,
            150 => Tag::BoardResponse,
            169 => Tag::LobbyRequest,
            170 => Tag::LobbyResponse,
            178 => Tag::JoinLobbyRequest,
            _ => return None,
        };
        Some(tag)
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl From<Tag> for u8 {
    fn from(tag: Tag) -> Self {
        tag as u8
    }
}

/// Human readable name for a raw tag byte (used in logs).
pub fn tag_name(byte: u8) -> String {
    match Tag::from_byte(byte) {
        Some(tag) => format!("{tag:?}"),
        None => format!("Unknown({byte})"),
    }
}

/// One decoded TLV unit.
///
/// Construction validates the value length, so a `Tlv` can always be
/// re-encoded without error.
#[derive(Clone, PartialEq, Eq)]
pub struct Tlv {
    tag: u8,
    value: Bytes,
}

impl Tlv {
    /// Build a unit, failing with `LengthOverflow` for values over 65535 bytes.
    pub fn new(tag: impl Into<u8>, value: impl Into<Bytes>) -> Result<Self> {
        let value = value.into();
        if value.len() > MAX_VALUE_LEN {
            return Err(ProtocolError::LengthOverflow(value.len()));
        }
        Ok(Self {
            tag: tag.into(),
            value,
        })
    }

    /// Shorthand for UTF-8 text values.
    pub fn text(tag: impl Into<u8>, value: &str) -> Result<Self> {
        Self::new(tag, Bytes::copy_from_slice(value.as_bytes()))
    }

    pub fn tag(&self) -> u8 {
        self.tag
    }

    /// The tag, if it is one the relay knows.
    pub fn known_tag(&self) -> Option<Tag> {
        Tag::from_byte(self.tag)
    }

    pub fn value(&self) -> &Bytes {
        &self.value
    }

    /// Value interpreted as UTF-8.
    pub fn as_str(&self) -> Result<&str> {
        std::str::from_utf8(&self.value)
            .map_err(|_| ProtocolError::FormatError(constants::ERR_INVALID_UTF8.into()))
    }

    /// Number of bytes this unit occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.value.len()
    }

    /// Append the wire form to `dst`.
    pub fn write_to(&self, dst: &mut BytesMut) {
        dst.reserve(self.encoded_len());
        dst.put_u8(self.tag);
        dst.put_u16(self.value.len() as u16);
        dst.extend_from_slice(&self.value);
    }

    /// Wire form as an owned buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.write_to(&mut buf);
        buf.freeze()
    }
}

impl fmt::Debug for Tlv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tlv")
            .field("tag", &tag_name(self.tag))
            .field("len", &self.value.len())
            .finish()
    }
}

/// Encode a single unit.
pub fn encode(tag: impl Into<u8>, value: &[u8]) -> Result<Vec<u8>> {
    if value.len() > MAX_VALUE_LEN {
        return Err(ProtocolError::LengthOverflow(value.len()));
    }
    let mut out = Vec::with_capacity(HEADER_LEN + value.len());
    out.push(tag.into());
    out.extend_from_slice(&(value.len() as u16).to_be_bytes());
    out.extend_from_slice(value);
    Ok(out)
}

/// Concatenate the wire forms of `units` (used for nested values).
pub fn concat(units: &[Tlv]) -> Bytes {
    let mut buf = BytesMut::with_capacity(units.iter().map(Tlv::encoded_len).sum());
    for unit in units {
        unit.write_to(&mut buf);
    }
    buf.freeze()
}

/// Split a buffer that must hold whole units only.
pub fn split(mut buf: &[u8]) -> Result<Vec<Tlv>> {
    let mut units = Vec::new();
    while !buf.is_empty() {
        let (tag, value, consumed) = decode(buf)?;
        units.push(Tlv::new(tag, Bytes::copy_from_slice(value))?);
        buf = &buf[consumed..];
    }
    Ok(units)
}

/// Decode the unit at the start of `buf`.
///
/// Returns `(tag, value, bytes_consumed)`. A short buffer yields
/// `InsufficientData`; nothing is consumed in that case.
pub fn decode(buf: &[u8]) -> Result<(u8, &[u8], usize)> {
    let (tag, len) = peek_header(buf)?;
    let total = HEADER_LEN + len;
    if buf.len() < total {
        return Err(ProtocolError::InsufficientData {
            needed: total,
            available: buf.len(),
        });
    }
    Ok((tag, &buf[HEADER_LEN..total], total))
}

/// Read the tag and declared length without requiring the value.
pub fn peek_header(buf: &[u8]) -> Result<(u8, usize)> {
    if buf.len() < HEADER_LEN {
        return Err(ProtocolError::InsufficientData {
            needed: HEADER_LEN,
            available: buf.len(),
        });
    }
    let header: [u8; HEADER_LEN] = buf[..HEADER_LEN]
        .try_into()
        .map_err(|_| ProtocolError::MalformedHeader)?;
    let len = u16::from_be_bytes([header[1], header[2]]) as usize;
    Ok((header[0], len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let bytes = encode(Tag::String, b"Alice").unwrap();
        assert_eq!(bytes, vec![11, 0, 5, b'A', b'l', b'i', b'c', b'e']);
    }

    #[test]
    fn test_decode_reports_consumed() {
        let mut bytes = encode(Tag::Int, b"500").unwrap();
        bytes.extend_from_slice(&[0xFF, 0xFF]);

        let (tag, value, consumed) = decode(&bytes).unwrap();
        assert_eq!(tag, 12);
        assert_eq!(value, b"500");
        assert_eq!(consumed, 6);
    }

    #[test]
    fn test_short_header_is_incomplete() {
        for len in 0..HEADER_LEN {
            let err = decode(&[0u8; 3][..len]).unwrap_err();
            assert!(err.is_incomplete(), "prefix {len} should be incomplete");
        }
    }

    #[test]
    fn test_short_value_is_incomplete() {
        let bytes = encode(Tag::ByteData, &[7u8; 10]).unwrap();
        match decode(&bytes[..8]) {
            Err(ProtocolError::InsufficientData { needed, available }) => {
                assert_eq!(needed, 13);
                assert_eq!(available, 8);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_length_overflow() {
        let value = vec![0u8; MAX_VALUE_LEN + 1];
        assert!(matches!(
            encode(Tag::ByteData, &value),
            Err(ProtocolError::LengthOverflow(65536))
        ));
        assert!(Tlv::new(Tag::ByteData, value).is_err());
        assert!(encode(Tag::ByteData, &vec![0u8; MAX_VALUE_LEN]).is_ok());
    }

    #[test]
    fn test_concat_and_split() {
        let units = vec![
            Tlv::text(Tag::String, "ok").unwrap(),
            Tlv::text(Tag::String, "").unwrap(),
        ];
        let nested = concat(&units);
        assert_eq!(nested.as_ref(), &[11, 0, 2, b'o', b'k', 11, 0, 0]);
        assert_eq!(split(&nested).unwrap(), units);
        assert!(split(&nested[..4]).unwrap_err().is_incomplete());
    }

    #[test]
    fn test_tag_mapping() {
        assert_eq!(Tag::from_byte(178), Some(Tag::JoinLobbyRequest));
        assert_eq!(Tag::from_byte(99), None);
        assert_eq!(u8::from(Tag::LobbyResponse), 170);
        assert_eq!(tag_name(99), "Unknown(99)");
    }

    #[test]
    fn test_tlv_to_bytes_matches_encode() {
        let tlv = Tlv::text(Tag::String, "Lobby-Alice").unwrap();
        assert_eq!(
            tlv.to_bytes().as_ref(),
            encode(Tag::String, b"Lobby-Alice").unwrap().as_slice()
        );
        assert_eq!(tlv.encoded_len(), 14);
        assert_eq!(tlv.as_str().unwrap(), "Lobby-Alice");
    }
}
