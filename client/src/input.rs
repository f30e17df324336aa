//! Keyboard polling

use macroquad::prelude::*;
use shared::Command;

/// Held keys observed in one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeldKeys {
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
}

impl HeldKeys {
    /// Samples arrow keys and WASD.
    pub fn poll() -> Self {
        Self {
            left: is_key_down(KeyCode::Left) || is_key_down(KeyCode::A),
            right: is_key_down(KeyCode::Right) || is_key_down(KeyCode::D),
            up: is_key_down(KeyCode::Up) || is_key_down(KeyCode::W),
            down: is_key_down(KeyCode::Down) || is_key_down(KeyCode::S),
        }
    }

    /// One command per held direction, every frame, in L R U D order.
    pub fn commands(self) -> Vec<Command> {
        [
            (self.left, Command::Left),
            (self.right, Command::Right),
            (self.up, Command::Up),
            (self.down, Command::Down),
        ]
        .into_iter()
        .filter_map(|(held, command)| held.then_some(command))
        .collect()
    }
}

pub struct InputManager {
    commands_sent: u64,
}

impl InputManager {
    pub fn new() -> Self {
        Self { commands_sent: 0 }
    }

    /// Commands for the keys held this frame.
    pub fn update(&mut self) -> Vec<Command> {
        let commands = HeldKeys::poll().commands();
        self.commands_sent += commands.len() as u64;
        commands
    }

    pub fn commands_sent(&self) -> u64 {
        self.commands_sent
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}
