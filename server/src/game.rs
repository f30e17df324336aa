//! Authoritative world: player positions, scores and the coin.

use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{
    slot_appearance, Coin, Command, PlayerId, PlayerState, Snapshot, WorldConfig, RESET_SPAWN,
};
use std::collections::HashMap;

/// Result of applying one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Moved,
    Scored,
    /// The sender left before its delayed command came due.
    UnknownPlayer,
}

#[derive(Debug, Clone)]
pub struct GameState {
    pub players: HashMap<PlayerId, PlayerState>,
    pub coin: Coin,
    config: WorldConfig,
    rng: StdRng,
}

impl GameState {
    pub fn new(config: WorldConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Builds a world whose coin placement follows the given generator.
    pub fn with_rng(config: WorldConfig, rng: StdRng) -> Self {
        Self {
            players: HashMap::new(),
            coin: Coin {
                x: config.map_size * 0.5,
                y: config.map_size * 0.375,
            },
            config,
            rng,
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn add_player(&mut self, id: PlayerId, slot: usize) {
        let ((x, y), color) = slot_appearance(slot);
        let player = PlayerState::new(self.config.clamp(x), self.config.clamp(y), color);

        info!("Added player {} in slot {} at ({}, {})", id, slot, player.x, player.y);
        self.players.insert(id, player);
    }

    pub fn remove_player(&mut self, id: &PlayerId) -> bool {
        let removed = self.players.remove(id).is_some();
        if removed {
            info!("Removed player {}", id);
        }
        removed
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Moves a player one step and checks the coin against its new position.
    pub fn apply_command(&mut self, id: PlayerId, command: Command) -> CommandOutcome {
        let step = self.config.player_step;
        let Some(player) = self.players.get_mut(&id) else {
            return CommandOutcome::UnknownPlayer;
        };

        let (dx, dy) = command.direction();
        player.x = self.config.clamp(player.x + dx * step);
        player.y = self.config.clamp(player.y + dy * step);

        if self.resolve_collision(id) {
            CommandOutcome::Scored
        } else {
            CommandOutcome::Moved
        }
    }

    /// Awards the coin to `id` if it touches it, then moves the coin.
    ///
    /// Checked per mover against the coin's current position, so a later
    /// mover in the same tick already sees a coin relocated by an earlier one.
    pub fn resolve_collision(&mut self, id: PlayerId) -> bool {
        let reach = self.config.pickup_distance();
        let coin = self.coin;
        let Some(player) = self.players.get_mut(&id) else {
            return false;
        };

        let dx = player.x - coin.x;
        let dy = player.y - coin.y;
        if (dx * dx + dy * dy).sqrt() >= reach {
            return false;
        }

        player.score += 1;
        info!("Player {} scored! New score: {}", id, player.score);
        self.relocate_coin();
        true
    }

    fn relocate_coin(&mut self) {
        let low = self.config.coin_margin.min(self.config.map_size * 0.5);
        let high = (self.config.map_size - self.config.coin_margin).max(low);

        self.coin = Coin {
            x: self.rng.gen_range(low..=high).round(),
            y: self.rng.gen_range(low..=high).round(),
        };
    }

    pub fn snapshot(&self, timestamp: f64) -> Snapshot {
        Snapshot {
            timestamp,
            players: self.players.iter().map(|(id, p)| (*id, *p)).collect(),
            coin: self.coin,
        }
    }

    /// Sends every player back to the reset spawn with a zero score.
    pub fn reset(&mut self) {
        let (x, y) = RESET_SPAWN;
        for player in self.players.values_mut() {
            player.x = x;
            player.y = y;
            player.score = 0;
        }
    }
}
