//! The session task: sole owner of the world, the lobby, the roster and the
//! inbound delay queue.
//!
//! Connection tasks and the outbound sender only talk to it through
//! [`NetworkEvent`]s, and it only talks to connections through
//! [`OutboundMessage`]s, so no game state is ever shared between tasks.

use crate::client_manager::ClientManager;
use crate::config::ServerConfig;
use crate::game::{CommandOutcome, GameState};
use crate::lobby::{Lobby, LobbyState, LobbyTransition};
use crate::network::{NetworkEvent, OutboundMessage};
use log::{debug, error, info, trace, warn};
use shared::{now_secs, Command, DelayQueue, PlayerId, ServerMessage};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Interval, MissedTickBehavior};

pub struct Session {
    config: ServerConfig,
    game: GameState,
    lobby: Lobby,
    clients: ClientManager,
    inbound: DelayQueue<(PlayerId, Command)>,
    outbound_tx: mpsc::UnboundedSender<OutboundMessage>,
    tick: u64,
    last_timestamp: f64,
}

impl Session {
    pub fn new(config: ServerConfig, outbound_tx: mpsc::UnboundedSender<OutboundMessage>) -> Self {
        let game = GameState::new(config.world);
        Self::with_game(config, game, outbound_tx)
    }

    /// Builds a session around an existing world, e.g. one with a seeded RNG.
    pub fn with_game(
        config: ServerConfig,
        game: GameState,
        outbound_tx: mpsc::UnboundedSender<OutboundMessage>,
    ) -> Self {
        Self {
            lobby: Lobby::new(config.required_players),
            clients: ClientManager::new(config.required_players),
            inbound: DelayQueue::new(),
            config,
            game,
            outbound_tx,
            tick: 0,
            last_timestamp: 0.0,
        }
    }

    pub fn game(&self) -> &GameState {
        &self.game
    }

    pub fn lobby_state(&self) -> LobbyState {
        self.lobby.state()
    }

    pub fn pending_commands(&self) -> usize {
        self.inbound.len()
    }

    fn period(&self) -> Duration {
        if self.lobby.is_running() {
            self.config.tick_interval()
        } else {
            self.config.lobby_poll_interval
        }
    }

    fn ticker(period: Duration) -> Interval {
        let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    }

    /// Runs until every event sender is dropped.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<NetworkEvent>) {
        info!(
            "Session waiting for {} players",
            self.lobby.required_players()
        );
        let mut ticker = Self::ticker(self.period());

        loop {
            let was_running = self.lobby.is_running();

            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        info!("Event channel closed, session stopping");
                        break;
                    }
                },
                _ = ticker.tick() => {
                    self.tick(Instant::now(), now_secs());
                }
            }

            if self.lobby.is_running() != was_running {
                ticker = Self::ticker(self.period());
            }
        }
    }

    pub fn handle_event(&mut self, event: NetworkEvent) {
        match event {
            NetworkEvent::Join {
                addr,
                writer,
                reply,
            } => {
                let Some((id, slot)) = self.clients.add_client(addr) else {
                    warn!("Rejecting connection from {}: session full", addr);
                    let _ = reply.send(None);
                    return;
                };

                self.game.add_player(id, slot);
                // Register before replying so any later broadcast reaches this writer.
                self.send(OutboundMessage::Register { id, writer });

                if reply.send(Some(id)).is_err() {
                    warn!("Connection task for {} vanished during join", id);
                    self.remove(id);
                }
            }
            NetworkEvent::Input {
                id,
                bytes,
                received_at,
            } => {
                if !self.lobby.is_running() {
                    trace!("Ignoring {} bytes from {} while waiting", bytes.len(), id);
                    return;
                }
                if !self.clients.contains(&id) {
                    return;
                }

                let release_at = received_at + self.config.latency;
                for command in Command::parse_bytes(&bytes) {
                    self.inbound.schedule_at((id, command), release_at);
                }
            }
            NetworkEvent::Leave { id } => self.remove(id),
        }
    }

    /// Drops a player. A departure during a round voids it on the spot, so a
    /// join landing before the next tick cannot mask the reset.
    fn remove(&mut self, id: PlayerId) {
        if self.clients.remove_client(&id).is_none() {
            return;
        }
        self.game.remove_player(&id);
        self.inbound.retain(|(from, _)| *from != id);
        self.send(OutboundMessage::Unregister { id });

        if self.lobby.update(self.clients.len()) == Some(LobbyTransition::Reset) {
            self.reset_round();
        }
    }

    /// Discards in-flight traffic, resets the world and tells the survivors.
    fn reset_round(&mut self) {
        self.inbound.clear();
        self.send(OutboundMessage::Clear);
        self.game.reset();
        self.broadcast(ServerMessage::SystemReset);
    }

    /// One simulation step: lobby check, due commands, snapshot.
    pub fn tick(&mut self, now: Instant, timestamp: f64) {
        match self.lobby.update(self.clients.len()) {
            Some(LobbyTransition::Started) => {
                self.broadcast(ServerMessage::SystemStart);
            }
            Some(LobbyTransition::Reset) => {
                self.reset_round();
                return;
            }
            None => {}
        }

        if !self.lobby.is_running() {
            return;
        }

        for (id, command) in self.inbound.drain(now) {
            if self.game.apply_command(id, command) == CommandOutcome::UnknownPlayer {
                warn!("Dropping {:?} from departed player {}", command, id);
            }
        }

        // Wall clock can step backwards; snapshots must not.
        let timestamp = timestamp.max(self.last_timestamp);
        self.last_timestamp = timestamp;

        let frame: Arc<str> = match ServerMessage::Update(self.game.snapshot(timestamp)).encode() {
            Ok(line) => line.into(),
            Err(e) => {
                error!("Failed to encode snapshot: {}", e);
                return;
            }
        };

        let release_at = now + self.config.latency;
        for to in self.clients.ids() {
            self.send(OutboundMessage::Schedule {
                to,
                release_at,
                frame: Arc::clone(&frame),
            });
        }

        self.tick += 1;
        if self.tick % self.config.tick_rate.max(1) as u64 == 0 {
            debug!(
                "Tick {}: {} players, {} commands in flight",
                self.tick,
                self.clients.len(),
                self.inbound.len()
            );
        }
    }

    fn broadcast(&self, message: ServerMessage) {
        match message.encode() {
            Ok(line) => self.send(OutboundMessage::Broadcast { frame: line.into() }),
            Err(e) => error!("Failed to encode {:?}: {}", message, e),
        }
    }

    fn send(&self, message: OutboundMessage) {
        if self.outbound_tx.send(message).is_err() {
            error!("Outbound sender is gone");
        }
    }
}
