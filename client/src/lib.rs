//! # Coin Rush Client Library
//!
//! Thin client for the coin collecting session. It never simulates the
//! world: it sends raw direction commands and renders the server's
//! snapshots slightly in the past, interpolating between them.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! Bounded snapshot history, message handling for `START`/`RESET`, and the
//! interpolator that produces the displayed state for a render time.
//!
//! ### Network Module (`network`)
//! TCP connection with a receive task that reassembles newline-delimited
//! records, and an input sender task that holds each command back by the
//! simulated latency.
//!
//! ### Input Module (`input`)
//! Arrow/WASD polling; every held direction yields one command per frame.
//!
//! ### Rendering Module (`rendering`)
//! macroquad drawing of the coin, the players with their scores, and a HUD.
//!
//! ## Timing
//!
//! The world is drawn at `now - (latency + interpolation_offset)`. With the
//! defaults that is 300ms behind the wall clock, enough to usually have a
//! snapshot on each side of the render time.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::{ClientConfig, ClientGameState, NetworkClient};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::default();
//! let mut network = NetworkClient::connect(&config).await?;
//! let mut game = ClientGameState::new(&config);
//!
//! for message in network.receive_updates() {
//!     game.handle_message(message);
//! }
//! let display = game.interpolate(shared::now_secs());
//! println!("{} players visible", display.players.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod game;
pub mod input;
pub mod network;
pub mod rendering;

pub use config::ClientConfig;
pub use game::{ClientGameState, DisplayState, SnapshotHistory};
pub use network::NetworkClient;
