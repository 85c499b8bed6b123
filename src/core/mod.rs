//! # Core Wire Components
//!
//! Low-level TLV handling: single-unit encoding/decoding and reassembly of
//! units from stream and datagram transports.
//!
//! ## Components
//! - **Tlv**: one tag-length-value unit and the wire tag table
//! - **Codec**: tokio codec for framing over byte streams, datagram splitting
//!
//! ## Wire Format
//! ```text
//! [Tag(1)] [Length(2, big-endian)] [Value(Length)]
//! ```
//!
//! ## Notes
//! - Maximum value size is 65535 bytes (the length field is 16 bits)
//! - Any 3-byte header is valid; a short buffer only means "wait for more"

pub mod codec;
pub mod tlv;
