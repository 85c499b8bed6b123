//! # Service Layer
//!
//! Client-side access to a running relay.
//!
//! ## Components
//! - **RelayClient**: async TCP client holding the issued signature

pub mod client;

pub use client::RelayClient;
