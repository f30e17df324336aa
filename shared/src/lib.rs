//! Types and rules shared by the coin rush server and client.
//!
//! Holds the world constants, the tunable [`WorldConfig`], the time-ordered
//! [`DelayQueue`] used to fake network latency on both ends, and the wire
//! protocol spoken between them.

pub mod delay_queue;
pub mod protocol;

pub use delay_queue::DelayQueue;
pub use protocol::{
    Coin, Command, LineBuffer, PlayerId, PlayerState, ProtocolError, ServerMessage, Snapshot,
};

use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const MAP_SIZE: f32 = 800.0;
pub const PLAYER_SPEED: f32 = 5.0;
pub const PLAYER_RADIUS: f32 = 20.0;
pub const COIN_RADIUS: f32 = 15.0;
pub const COIN_MARGIN: f32 = 50.0;
pub const REQUIRED_PLAYERS: usize = 2;
pub const TICK_RATE: u32 = 60;
pub const HISTORY_CAPACITY: usize = 20;

pub const DEFAULT_PORT: u16 = 5555;
pub const DEFAULT_LATENCY: Duration = Duration::from_millis(200);
pub const DEFAULT_INTERPOLATION_OFFSET: Duration = Duration::from_millis(100);

/// Spawn point every player returns to when a round is reset.
pub const RESET_SPAWN: (f32, f32) = (100.0, 100.0);

/// Per-slot spawn point and color, in join order.
pub const SLOT_SPAWNS: [(f32, f32); 2] = [(100.0, 100.0), (600.0, 600.0)];
pub const SLOT_COLORS: [[u8; 3]; 2] = [[0, 255, 0], [0, 0, 255]];

/// Geometry and movement rules of the world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldConfig {
    pub map_size: f32,
    pub player_radius: f32,
    pub coin_radius: f32,
    pub player_step: f32,
    /// Distance from the map edge the coin never spawns inside.
    pub coin_margin: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            map_size: MAP_SIZE,
            player_radius: PLAYER_RADIUS,
            coin_radius: COIN_RADIUS,
            player_step: PLAYER_SPEED,
            coin_margin: COIN_MARGIN,
        }
    }
}

impl WorldConfig {
    /// Distance below which a player picks up the coin.
    pub fn pickup_distance(&self) -> f32 {
        self.player_radius + self.coin_radius
    }

    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(0.0, self.map_size)
    }
}

/// Returns the spawn point and color for a join-order slot.
///
/// Slots past the configured table reuse the last entry.
pub fn slot_appearance(slot: usize) -> ((f32, f32), [u8; 3]) {
    let index = slot.min(SLOT_SPAWNS.len() - 1);
    (SLOT_SPAWNS[index], SLOT_COLORS[index])
}

/// Wall clock reading in seconds, as stamped on every snapshot.
pub fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs_f64()
}
