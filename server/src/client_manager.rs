//! Bookkeeping for accepted connections.
//!
//! Hands out player identities and join-order slots and enforces the lobby
//! capacity. Identities come from a counter and are never reused, so a
//! reconnect from the same address is a new player.

use log::info;
use shared::PlayerId;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

/// A connection that holds a seat in the session.
#[derive(Debug)]
pub struct Client {
    pub id: PlayerId,
    /// Join-order seat, decides spawn point and color.
    pub slot: usize,
    pub addr: SocketAddr,
    pub connected_at: Instant,
}

impl Client {
    pub fn new(id: PlayerId, slot: usize, addr: SocketAddr) -> Self {
        Self {
            id,
            slot,
            addr,
            connected_at: Instant::now(),
        }
    }
}

pub struct ClientManager {
    clients: HashMap<PlayerId, Client>,
    next_client_id: u32,
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Seats a new connection in the lowest free slot.
    ///
    /// Returns `None` once every seat is taken.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<(PlayerId, usize)> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let slot = (0..self.max_clients)
            .find(|slot| !self.clients.values().any(|c| c.slot == *slot))?;

        let id = PlayerId(self.next_client_id);
        self.next_client_id += 1;

        info!("Client {} connected from {} (slot {})", id, addr, slot);
        self.clients.insert(id, Client::new(id, slot, addr));

        Some((id, slot))
    }

    pub fn remove_client(&mut self, id: &PlayerId) -> Option<Client> {
        let client = self.clients.remove(id)?;
        info!(
            "Client {} disconnected after {:.1}s",
            client.id,
            client.connected_at.elapsed().as_secs_f32()
        );
        Some(client)
    }

    pub fn contains(&self, id: &PlayerId) -> bool {
        self.clients.contains_key(id)
    }

    pub fn ids(&self) -> Vec<PlayerId> {
        let mut ids: Vec<PlayerId> = self.clients.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
