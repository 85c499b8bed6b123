//! # Error Types
//!
//! Error handling for the relay protocol.
//!
//! This module defines every error variant that can occur while framing,
//! authenticating and dispatching requests, from low-level I/O errors to
//! matchmaking rule violations.
//!
//! ## Error Categories
//! - **Framing**: `InsufficientData` (wait for more bytes), `MalformedHeader`,
//!   `LengthOverflow`, `FormatError`
//! - **Integrity**: hash or bearer-signature mismatch, unknown peer
//! - **Protocol**: a unit carries the wrong tag for its position
//! - **Domain**: lobby and game rule violations, carried as [`DomainError`]
//! - **Runtime**: I/O, transport, configuration, lock poisoning, cipher failures
//!
//! Only domain errors are turned into responses. Everything else is logged at
//! the connection level and the offending frame is dropped.
//!
//! ## Example Usage
//! ```rust
//! use game_relay::error::{DomainError, ProtocolError, Result};
//!
//! fn reject(lobby: &str) -> Result<()> {
//!     Err(DomainError::LobbyNotFound(lobby.to_string()).into())
//! }
//!
//! match reject("Lobby-Alice") {
//!     Err(ProtocolError::Domain(e)) => assert_eq!(e.code(), "lobby-not-found"),
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

use std::io;
use thiserror::Error;
use uuid::Uuid;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Integrity errors
    pub const ERR_HASH_MISMATCH: &str = "Message hash does not match its content";
    pub const ERR_SIGNATURE_MISMATCH: &str = "Bearer signature does not match the issued one";
    pub const ERR_UNKNOWN_PEER: &str = "No handshake on record for this peer";

    /// Framing errors
    pub const ERR_TRAILING_BYTES: &str = "Datagram ends with an incomplete TLV unit";
    pub const ERR_TRUNCATED_MESSAGE: &str = "Datagram ends inside a message";
    pub const ERR_INVALID_LEVEL: &str = "Level is not a decimal integer";
    pub const ERR_INVALID_UTF8: &str = "Text field is not valid UTF-8";
    pub const ERR_INVALID_GAME_ID: &str = "Game id is neither 16 raw bytes nor a textual UUID";
    pub const ERR_ENCRYPTED_MOVE_WITHOUT_KEY: &str =
        "Encrypted move received but no move key is configured";

    /// Connection errors
    pub const ERR_CONNECTION_CLOSED: &str = "Connection closed";

    /// Synchronization errors
    pub const ERR_LOCK_POISONED: &str = "Synchronization primitive poisoned";
}

/// Matchmaking and game rule violations.
///
/// These are the only errors a handler answers with a response; each variant
/// maps to a stable wire code via [`DomainError::code`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Lobby {0} already exists")]
    LobbyExists(String),

    #[error("Lobby {0} does not exist")]
    LobbyNotFound(String),

    #[error("Lobby {0} is locked")]
    LobbyLocked(String),

    #[error("Lobby {0} is full")]
    LobbyFull(String),

    #[error("Player {player} is already in lobby {lobby}")]
    PlayerAlreadyJoined { lobby: String, player: String },

    #[error("No game session with id {0}")]
    SessionNotFound(Uuid),

    #[error("Illegal move: {0}")]
    IllegalMove(String),
}

impl DomainError {
    /// Stable error code sent to clients.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::LobbyExists(_) => "lobby-exists",
            DomainError::LobbyNotFound(_) => "lobby-not-found",
            DomainError::LobbyLocked(_) => "lobby-locked",
            DomainError::LobbyFull(_) => "lobby-full",
            DomainError::PlayerAlreadyJoined { .. } => "player-already-joined",
            DomainError::SessionNotFound(_) => "session-not-found",
            DomainError::IllegalMove(_) => "illegal-move",
        }
    }
}

// ProtocolError is the primary error type for all relay operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Insufficient data: need {needed} bytes, have {available}")]
    InsufficientData { needed: usize, available: usize },

    #[error("Malformed TLV header")]
    MalformedHeader,

    #[error("TLV value too large: {0} bytes (maximum 65535)")]
    LengthOverflow(usize),

    #[error("Format error: {0}")]
    FormatError(String),

    #[error("Integrity error: {0}")]
    IntegrityError(String),

    #[error("Unexpected tag at position {position}: expected {expected}, found {found}")]
    UnexpectedTag {
        position: usize,
        expected: u8,
        found: u8,
    },

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("{}", constants::ERR_CONNECTION_CLOSED)]
    ConnectionClosed,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("{}", constants::ERR_LOCK_POISONED)]
    LockPoisoned,

    #[error("Encryption failed")]
    EncryptionFailure,

    #[error("Decryption failed")]
    DecryptionFailure,
}

impl ProtocolError {
    /// Whether the caller should buffer more bytes and retry.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, ProtocolError::InsufficientData { .. })
    }
}

impl<T> From<std::sync::PoisonError<T>> for ProtocolError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        ProtocolError::LockPoisoned
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
