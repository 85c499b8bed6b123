//! # Protocol Layer
//!
//! Everything between decoded TLV units and registry operations.
//!
//! ## Components
//! - **Message**: groups units into requests by the leading tag's schema
//! - **Envelope**: signature + hash trailer, sealing and verification
//! - **Handshake**: HelloRequest parsing and bearer signature minting
//! - **Dispatcher**: fixed tag-to-handler table over injected registries
//! - **Request**: client-side builders and response decoding
//!
//! ## Request flow
//! ```text
//! units -> MessageAssembler -> Dispatcher::handle -> envelope::verify -> registry -> response unit
//! ```

pub mod dispatcher;
pub mod envelope;
pub mod handshake;
pub mod message;
pub mod request;

#[cfg(test)]
mod tests;

pub use dispatcher::Dispatcher;
pub use message::{Message, MessageAssembler, RequestKind};
