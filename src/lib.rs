//! # game-relay
//!
//! Relay server for two-player turn-based games over a TLV wire protocol,
//! carried on TCP or UDP.
//!
//! ## Layers
//! - **core**: TLV units and stream/datagram reassembly
//! - **protocol**: message assembly, integrity envelope, handshake, dispatch
//! - **registry**: client records, lobbies and games
//! - **engine**: rule engine trait and the default chess engine
//! - **transport**: TCP, UDP and in-memory reply paths
//! - **server**: listeners, per-connection loops, cooperative shutdown
//! - **service**: async TCP client
//!
//! ## Example
//! ```rust,no_run
//! use game_relay::config::RelayConfig;
//! use game_relay::engine::ChessEngine;
//! use game_relay::server::RelayServer;
//!
//! # async fn start() -> game_relay::error::Result<()> {
//! let config = RelayConfig::default();
//! let server = RelayServer::bind(&config, ChessEngine).await?;
//! let shutdown = server.shutdown_token();
//! tokio::spawn(async move {
//!     let _ = tokio::signal::ctrl_c().await;
//!     shutdown.cancel();
//! });
//! server.run().await
//! # }
//! ```

pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod service;
pub mod transport;
pub mod utils;

pub use error::{ProtocolError, Result};
