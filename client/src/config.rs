use shared::{DEFAULT_INTERPOLATION_OFFSET, DEFAULT_LATENCY, DEFAULT_PORT, HISTORY_CAPACITY};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// `host:port` of the server.
    pub server: String,
    /// Simulated latency added to sent input, and the first term of the render delay.
    pub latency: Duration,
    /// Extra render delay so two bracketing snapshots are usually available.
    pub interpolation_offset: Duration,
    pub history_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: format!("127.0.0.1:{}", DEFAULT_PORT),
            latency: DEFAULT_LATENCY,
            interpolation_offset: DEFAULT_INTERPOLATION_OFFSET,
            history_capacity: HISTORY_CAPACITY,
        }
    }
}

impl ClientConfig {
    /// How far behind the wall clock the world is rendered, in seconds.
    pub fn render_delay(&self) -> f64 {
        (self.latency + self.interpolation_offset).as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.server, "127.0.0.1:5555");
        assert_eq!(config.history_capacity, 20);
        assert_approx_eq!(config.render_delay(), 0.3, 1e-9);
    }
}
