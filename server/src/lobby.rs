//! Lobby state machine deciding when the world simulates.

use log::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobbyState {
    Waiting,
    Running,
}

/// Edge reported by [`Lobby::update`]; never repeated while the state holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobbyTransition {
    Started,
    Reset,
}

#[derive(Debug)]
pub struct Lobby {
    state: LobbyState,
    required_players: usize,
}

impl Lobby {
    pub fn new(required_players: usize) -> Self {
        Self {
            state: LobbyState::Waiting,
            required_players,
        }
    }

    pub fn state(&self) -> LobbyState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == LobbyState::Running
    }

    pub fn required_players(&self) -> usize {
        self.required_players
    }

    /// Re-evaluates the lobby against the current number of active players.
    pub fn update(&mut self, active_players: usize) -> Option<LobbyTransition> {
        match self.state {
            LobbyState::Waiting if active_players >= self.required_players => {
                info!("Lobby full ({} players), starting game", active_players);
                self.state = LobbyState::Running;
                Some(LobbyTransition::Started)
            }
            LobbyState::Running if active_players < self.required_players => {
                info!(
                    "Player count dropped to {}, resetting to lobby",
                    active_players
                );
                self.state = LobbyState::Waiting;
                Some(LobbyTransition::Reset)
            }
            _ => None,
        }
    }
}
