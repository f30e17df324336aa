//! Client-side snapshot history and interpolation.
//!
//! The client never simulates. It keeps the most recent server snapshots and
//! renders the world at `now - (latency + interpolation offset)`, blending
//! the two snapshots that straddle that instant.

use crate::config::ClientConfig;
use log::{debug, info};
use shared::{Coin, PlayerId, PlayerState, ServerMessage, Snapshot};
use std::collections::{BTreeMap, VecDeque};

/// Where the coin is drawn before the first snapshot: off screen.
pub const HIDDEN_COIN: Coin = Coin {
    x: -100.0,
    y: -100.0,
};

/// What the renderer draws this frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayState {
    pub players: BTreeMap<PlayerId, PlayerState>,
    pub coin: Coin,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            players: BTreeMap::new(),
            coin: HIDDEN_COIN,
        }
    }
}

/// Bounded, arrival-ordered snapshot history. The oldest entry is evicted first.
#[derive(Debug)]
pub struct SnapshotHistory {
    snapshots: VecDeque<Snapshot>,
    capacity: usize,
}

impl SnapshotHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            snapshots: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, snapshot: Snapshot) {
        self.snapshots.push_back(snapshot);
        while self.snapshots.len() > self.capacity {
            self.snapshots.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.snapshots.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.snapshots.iter()
    }

    /// Earliest adjacent pair with `prev.timestamp <= t <= next.timestamp`.
    pub fn bracketing(&self, render_time: f64) -> Option<(&Snapshot, &Snapshot)> {
        self.snapshots
            .iter()
            .zip(self.snapshots.iter().skip(1))
            .find(|(prev, next)| prev.timestamp <= render_time && render_time <= next.timestamp)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Everything the render loop knows about the world.
///
/// Owned by the render loop alone; the network task hands over decoded
/// messages through a channel, so a reset can never land halfway through
/// an interpolation.
pub struct ClientGameState {
    history: SnapshotHistory,
    display: DisplayState,
    render_delay: f64,
    round_started: bool,
    updates_received: u64,
}

impl ClientGameState {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            history: SnapshotHistory::new(config.history_capacity),
            display: DisplayState::default(),
            render_delay: config.render_delay(),
            round_started: false,
            updates_received: 0,
        }
    }

    pub fn history(&self) -> &SnapshotHistory {
        &self.history
    }

    pub fn display(&self) -> &DisplayState {
        &self.display
    }

    pub fn round_started(&self) -> bool {
        self.round_started
    }

    pub fn updates_received(&self) -> u64 {
        self.updates_received
    }

    pub fn handle_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Update(snapshot) => {
                self.updates_received += 1;
                self.history.push(snapshot);
            }
            ServerMessage::SystemStart => {
                info!("==================== GAME STARTED! ====================");
                self.round_started = true;
            }
            ServerMessage::SystemReset => {
                info!("Round reset, waiting for players");
                self.history.clear();
                self.display = DisplayState::default();
                self.round_started = false;
            }
            ServerMessage::Unknown => {
                debug!("Ignoring record of unknown type");
            }
        }
    }

    /// Updates the displayed state for wall clock `now` (seconds).
    pub fn interpolate(&mut self, now: f64) -> &DisplayState {
        self.interpolate_at(now - self.render_delay)
    }

    /// Updates the displayed state for an explicit render time.
    ///
    /// Without a bracketing pair the latest snapshot is shown as is; with an
    /// empty history the previous display is kept.
    pub fn interpolate_at(&mut self, render_time: f64) -> &DisplayState {
        if let Some((prev, next)) = self.history.bracketing(render_time) {
            self.display = blend(prev, next, render_time);
        } else if let Some(latest) = self.history.latest() {
            self.display = DisplayState {
                players: latest.players.clone(),
                coin: latest.coin,
            };
        }
        &self.display
    }
}

fn blend(prev: &Snapshot, next: &Snapshot, render_time: f64) -> DisplayState {
    let span = next.timestamp - prev.timestamp;
    let ratio = if span > 0.0 {
        ((render_time - prev.timestamp) / span) as f32
    } else {
        0.0
    };

    let mut players = BTreeMap::new();
    for (id, to) in &next.players {
        let state = match prev.players.get(id) {
            Some(from) => PlayerState {
                x: from.x + (to.x - from.x) * ratio,
                y: from.y + (to.y - from.y) * ratio,
                ..*to
            },
            // Joined between the two snapshots.
            None => *to,
        };
        players.insert(*id, state);
    }
    for (id, from) in &prev.players {
        // Left between the two snapshots: frozen at last known position.
        players.entry(*id).or_insert(*from);
    }

    DisplayState {
        players,
        // The coin teleports when collected, so it is never blended.
        coin: next.coin,
    }
}
