//! # Integrity Envelope
//!
//! Every request ends with two `ByteData` units:
//!
//! ```text
//! [payload units...] [ByteData signature] [ByteData hex(sha256(payload || signature unit))]
//! ```
//!
//! The signature is the bearer token issued at handshake, carried verbatim.
//! The hash covers the encoded bytes of every preceding unit, the signature
//! unit included. Both comparisons run in constant time.

use bytes::{Bytes, BytesMut};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::core::tlv::{Tag, Tlv};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::message::Message;

/// Lowercase hex SHA-256 of `covered`.
pub fn compute_hash(covered: &[u8]) -> String {
    hex::encode(Sha256::digest(covered))
}

/// Append the signature and hash units to `payload`.
pub fn seal(payload: &[Tlv], signature: &str) -> Result<Vec<Tlv>> {
    let signature_unit = Tlv::text(Tag::ByteData, signature)?;

    let mut covered = BytesMut::new();
    for unit in payload {
        unit.write_to(&mut covered);
    }
    signature_unit.write_to(&mut covered);
    let hash_unit = Tlv::text(Tag::ByteData, &compute_hash(&covered))?;

    let mut units = Vec::with_capacity(payload.len() + 2);
    units.extend_from_slice(payload);
    units.push(signature_unit);
    units.push(hash_unit);
    Ok(units)
}

/// [`seal`] and encode the whole message into one buffer.
pub fn seal_to_bytes(payload: &[Tlv], signature: &str) -> Result<Bytes> {
    let units = seal(payload, signature)?;
    let mut buf = BytesMut::with_capacity(units.iter().map(Tlv::encoded_len).sum());
    for unit in &units {
        unit.write_to(&mut buf);
    }
    Ok(buf.freeze())
}

/// Check the trailer tags and the hash. The signature is not compared.
pub fn verify_hash(message: &Message) -> Result<()> {
    let payload_len = message.payload().len();
    message.expect(payload_len, Tag::ByteData)?;
    let received = message.expect(payload_len + 1, Tag::ByteData)?;

    let expected = compute_hash(&message.signed_bytes());
    let received = received.value().to_ascii_lowercase();
    if !bool::from(expected.as_bytes().ct_eq(&received)) {
        debug!(kind = ?message.kind(), "hash mismatch");
        return Err(ProtocolError::IntegrityError(
            constants::ERR_HASH_MISMATCH.into(),
        ));
    }
    Ok(())
}

/// Full check: hash, then the bearer signature against the issued one.
pub fn verify(message: &Message, issued_signature: &str) -> Result<()> {
    verify_hash(message)?;

    let presented = message.signature_unit().value();
    if !bool::from(presented[..].ct_eq(issued_signature.as_bytes())) {
        debug!(kind = ?message.kind(), "signature mismatch");
        return Err(ProtocolError::IntegrityError(
            constants::ERR_SIGNATURE_MISMATCH.into(),
        ));
    }
    Ok(())
}
