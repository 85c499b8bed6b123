//! # Utility Modules
//!
//! Supporting utilities shared by the server and the dispatcher.
//!
//! ## Components
//! - **Crypto**: XChaCha20-Poly1305 for encrypted move fields
//! - **Logging**: `tracing-subscriber` setup from [`crate::config::LoggingConfig`]
//! - **Metrics**: Thread-safe relay counters
//!
//! ## Security
//! - Nonces come from the OS RNG (getrandom)
//! - Keys are only ever read from configuration

pub mod crypto;
pub mod logging;
pub mod metrics;

pub use crypto::MoveCipher;
pub use metrics::{Metrics, MetricsSnapshot};
