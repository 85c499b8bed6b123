//! Handshake (HelloRequest) parsing and bearer signature minting.
//!
//! The hello is the only request whose signature unit is not checked: the
//! client has no signature yet and may send a blank one. The hash is still
//! verified. On success the server mints a fresh 256-bit token that the
//! client must echo in the signature unit of every later request.

use rand::RngCore;
use tracing::{debug, instrument};

use crate::core::tlv::{Tag, Tlv};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::envelope;
use crate::protocol::message::{Message, RequestKind};

/// Size of a minted signature before hex encoding.
pub const SIGNATURE_BYTES: usize = 32;

/// Identity fields announced by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelloRequest {
    pub first_name: String,
    pub last_name: String,
    pub status: String,
    pub level: u32,
}

impl HelloRequest {
    /// Decode and hash-check a hello message.
    #[instrument(level = "debug", skip(message))]
    pub fn parse(message: &Message) -> Result<Self> {
        if message.kind() != RequestKind::Hello {
            return Err(ProtocolError::UnexpectedTag {
                position: 0,
                expected: Tag::HelloRequest.as_byte(),
                found: message.units()[0].tag(),
            });
        }

        let first_name = message.expect(1, Tag::String)?.as_str()?.to_owned();
        let last_name = message.expect(2, Tag::String)?.as_str()?.to_owned();
        let status = message.expect(3, Tag::String)?.as_str()?.to_owned();
        let level = message
            .expect(4, Tag::Int)?
            .as_str()?
            .parse::<u32>()
            .map_err(|_| ProtocolError::FormatError(constants::ERR_INVALID_LEVEL.into()))?;

        envelope::verify_hash(message)?;

        debug!(%first_name, %last_name, level, "hello accepted");
        Ok(Self {
            first_name,
            last_name,
            status,
            level,
        })
    }

    /// Payload units for this hello, without the trailer.
    pub fn to_payload(&self) -> Result<Vec<Tlv>> {
        Ok(vec![
            Tlv::text(Tag::HelloRequest, "")?,
            Tlv::text(Tag::String, &self.first_name)?,
            Tlv::text(Tag::String, &self.last_name)?,
            Tlv::text(Tag::String, &self.status)?,
            Tlv::text(Tag::Int, &self.level.to_string())?,
        ])
    }
}

/// Generate a fresh bearer signature: 32 random bytes as lowercase hex.
pub fn mint_signature() -> String {
    let mut raw = [0u8; SIGNATURE_BYTES];
    rand::rng().fill_bytes(&mut raw);
    hex::encode(raw)
}

/// Shortened form of a signature for logs.
pub fn redact(signature: &str) -> &str {
    signature.get(..8).unwrap_or(signature)
}
