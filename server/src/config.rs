use shared::{WorldConfig, DEFAULT_LATENCY, DEFAULT_PORT, REQUIRED_PLAYERS, TICK_RATE};
use std::time::Duration;

/// Runtime settings of a server session.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Simulated one-way latency, applied to inbound commands and outbound snapshots.
    pub latency: Duration,
    pub tick_rate: u32,
    /// Lobby size; also the number of connections accepted at once.
    pub required_players: usize,
    /// How often the lobby is re-evaluated while waiting for players.
    pub lobby_poll_interval: Duration,
    pub world: WorldConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            latency: DEFAULT_LATENCY,
            tick_rate: TICK_RATE,
            required_players: REQUIRED_PLAYERS,
            lobby_poll_interval: Duration::from_secs(1),
            world: WorldConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 5555);
        assert_eq!(config.latency, Duration::from_millis(200));
        assert_eq!(config.required_players, 2);
        assert_eq!(config.lobby_poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_tick_interval() {
        let mut config = ServerConfig::default();
        assert_eq!(config.tick_interval().as_micros(), 16_666);

        config.tick_rate = 0;
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
    }
}
