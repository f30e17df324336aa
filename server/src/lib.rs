//! # Coin Rush Server Library
//!
//! Authoritative server for a two-player coin collecting session. It owns the
//! canonical world, runs the lobby, and streams snapshots to every connected
//! client, with an artificial delay injected on both the inbound and the
//! outbound path to emulate a slow network.
//!
//! ## Task Layout
//!
//! ### Session (`session`)
//! A single task exclusively owns the world, the lobby state machine, the
//! roster of connected players and the inbound delay queue. Every other task
//! talks to it over channels, so there is no shared mutable game state.
//!
//! ### Connections (`network`)
//! One ingestion task per accepted TCP connection. It asks the session for a
//! seat, then forwards each read (stamped with its arrival time) until the
//! peer closes the stream.
//!
//! ### Outbound Sender (`outbound`)
//! Owns the write half of every connection and the outbound delay queue.
//! It sleeps until the next record is due, writes it, and reports failed
//! writes back to the session as disconnects.
//!
//! ## Round Lifecycle
//!
//! The lobby starts in `Waiting` and polls about once a second. When the
//! required number of players is seated it flips to `Running`, broadcasts
//! `START`, and ticks at the simulation rate: due commands are applied with
//! a coin check after each move, then one snapshot is scheduled for every
//! player. When a player leaves, in-flight commands and snapshots are
//! discarded, the world is reset, and `RESET` is broadcast.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let server = Server::bind(ServerConfig::default()).await?;
//!     server.run().await
//! }
//! ```

pub mod client_manager;
pub mod config;
pub mod game;
pub mod lobby;
pub mod network;
pub mod outbound;
pub mod session;

pub use config::ServerConfig;
pub use network::Server;
