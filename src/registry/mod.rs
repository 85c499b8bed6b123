//! # Registries
//!
//! Shared matchmaking state, injected into the dispatcher.
//!
//! ## Components
//! - **SessionRegistry**: peer key to client record (handshake results)
//! - **GameRegistry**: lobby names and game ids to game sessions
//!
//! Each registry holds a single `RwLock`. No registry lock is held while the
//! rule engine runs.

pub mod game;
pub mod session;

pub use game::{GameRegistry, MoveResult, SessionInfo, DEFAULT_MAX_PLAYERS};
pub use session::{ClientRecord, SessionRegistry};
