//! # Frame Reassembly
//!
//! Stream transports deliver arbitrary chunks, so [`TlvCodec`] keeps the
//! residual bytes between reads (via `tokio_util::codec::FramedRead`) and
//! yields a unit each time one is complete.
//!
//! Datagram transports deliver whole packets; [`decode_datagram`] walks a
//! packet unit by unit since one packet usually carries a full message.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::core::tlv::{self, Tlv, HEADER_LEN};
use crate::error::{constants, ProtocolError, Result};

/// Stream codec for TLV units.
#[derive(Debug, Default, Clone, Copy)]
pub struct TlvCodec;

impl Decoder for TlvCodec {
    type Item = Tlv;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Tlv>> {
        let (tag, len) = match tlv::peek_header(src) {
            Ok(header) => header,
            Err(e) if e.is_incomplete() => return Ok(None),
            Err(e) => return Err(e),
        };

        let total = HEADER_LEN + len;
        if src.len() < total {
            // Reserve up front so the next read lands in one allocation
            src.reserve(total - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(total);
        frame.advance(HEADER_LEN);
        Tlv::new(tag, frame.freeze()).map(Some)
    }
}

impl Encoder<Tlv> for TlvCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Tlv, dst: &mut BytesMut) -> Result<()> {
        item.write_to(dst);
        Ok(())
    }
}

/// Split one datagram into its units.
///
/// A packet must end on a unit boundary; trailing bytes that do not form a
/// complete unit reject the whole packet with a `FormatError`.
pub fn decode_datagram(packet: &[u8]) -> Result<Vec<Tlv>> {
    tlv::split(packet).map_err(|e| {
        if e.is_incomplete() {
            ProtocolError::FormatError(constants::ERR_TRAILING_BYTES.into())
        } else {
            e
        }
    })
}
