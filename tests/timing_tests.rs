//! Timing tests for the simulated latency paths
//!
//! Wall-clock measurements use generous upper bounds; only the lower bounds
//! (nothing arrives before its delay) are strict.

use client::network::NetworkClient;
use client::{ClientConfig, ClientGameState};
use server::{Server, ServerConfig};
use shared::{Command, DelayQueue, ServerMessage};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// DELAY QUEUE ORDERING
mod delay_queue_tests {
    use super::*;

    /// Drains never reorder, even when later entries carry shorter delays.
    #[test]
    fn drain_preserves_enqueue_order() {
        let mut queue = DelayQueue::new();
        let start = Instant::now();
        let delays = [30u64, 5, 50, 0, 20, 45, 10, 60, 1, 35];

        for (i, delay) in delays.iter().enumerate() {
            queue.schedule_at(i, start + Duration::from_millis(*delay));
        }

        let mut drained = Vec::new();
        for step in 0..=60 {
            drained.extend(queue.drain(start + Duration::from_millis(step)));
        }

        assert_eq!(drained, (0..delays.len()).collect::<Vec<_>>());
        assert!(queue.is_empty());
    }

    /// Nothing is released before its own deadline.
    #[test]
    fn nothing_released_early() {
        let mut queue = DelayQueue::new();
        let start = Instant::now();
        queue.schedule_at("a", start + Duration::from_millis(100));
        queue.schedule_at("b", start + Duration::from_millis(200));

        assert!(queue.drain(start + Duration::from_millis(99)).is_empty());
        assert_eq!(queue.drain(start + Duration::from_millis(100)), vec!["a"]);
        assert!(queue.drain(start + Duration::from_millis(199)).is_empty());
        assert_eq!(queue.drain(start + Duration::from_millis(200)), vec!["b"]);
    }
}

/// END-TO-END LATENCY
mod latency_tests {
    use super::*;

    /// The first snapshot trails START by at least the configured latency.
    #[tokio::test]
    async fn snapshots_are_held_back_by_latency() {
        let latency = Duration::from_millis(100);
        let config = ServerConfig {
            port: 0,
            latency,
            lobby_poll_interval: Duration::from_millis(20),
            ..ServerConfig::default()
        };
        let server = Server::bind(config).await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());

        let first = TcpStream::connect(addr).await.unwrap();
        let _second = TcpStream::connect(addr).await.unwrap();
        let mut lines = BufReader::new(first).lines();

        let start_line = timeout(Duration::from_secs(3), lines.next_line())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let started = Instant::now();
        assert_eq!(
            ServerMessage::decode(&start_line).unwrap(),
            ServerMessage::SystemStart
        );

        let update_line = timeout(Duration::from_secs(3), lines.next_line())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let waited = started.elapsed();
        assert!(matches!(
            ServerMessage::decode(&update_line).unwrap(),
            ServerMessage::Update(_)
        ));

        // START went out immediately, the snapshot from the same tick did not.
        assert!(waited >= latency - Duration::from_millis(10));
        assert!(waited < Duration::from_secs(2));
    }

    /// Client input reaches the socket only after the send latency.
    #[tokio::test]
    async fn client_input_is_held_back() {
        let (client_side, mut server_side) = tokio::io::duplex(256);
        let (reader, writer) = tokio::io::split(client_side);
        let latency = Duration::from_millis(80);
        let network = NetworkClient::spawn(reader, writer, latency);

        let sent = Instant::now();
        network.send_input(Command::Up);

        let mut byte = [0u8; 1];
        timeout(Duration::from_secs(2), server_side.read_exact(&mut byte))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(byte[0], b'U');
        assert!(sent.elapsed() >= latency);

        server_side.shutdown().await.unwrap();
    }
}

/// RENDER DELAY
mod render_delay_tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::{Coin, PlayerId, PlayerState, Snapshot};

    fn at(timestamp: f64, x: f32) -> ServerMessage {
        ServerMessage::Update(Snapshot {
            timestamp,
            players: [(PlayerId(1), PlayerState::new(x, 100.0, [0, 255, 0]))]
                .into_iter()
                .collect(),
            coin: Coin { x: 400.0, y: 300.0 },
        })
    }

    /// A 60 Hz stream rendered 300ms late lands between the right pair.
    #[test]
    fn render_time_trails_wall_clock() {
        let config = ClientConfig::default();
        let mut game = ClientGameState::new(&config);
        let tick = 1.0 / 60.0;

        for i in 0..20 {
            game.handle_message(at(1000.0 + i as f64 * tick, 100.0 + i as f32 * 5.0));
        }

        // Renders at 1000.0 + 10.5 ticks.
        let now = 1000.0 + 10.5 * tick + config.render_delay();
        let x = game.interpolate(now).players[&PlayerId(1)].x;
        assert_approx_eq!(x, 152.5, 1e-2);
    }

    /// Shrinking the offset moves the render time forward.
    #[test]
    fn offset_changes_render_time() {
        let slow = ClientConfig::default();
        let fast = ClientConfig {
            interpolation_offset: Duration::ZERO,
            ..ClientConfig::default()
        };
        let mut slow_game = ClientGameState::new(&slow);
        let mut fast_game = ClientGameState::new(&fast);

        for game in [&mut slow_game, &mut fast_game] {
            game.handle_message(at(0.0, 0.0));
            game.handle_message(at(1.0, 100.0));
        }

        let now = 0.7;
        let slow_x = slow_game.interpolate(now).players[&PlayerId(1)].x;
        let fast_x = fast_game.interpolate(now).players[&PlayerId(1)].x;
        assert_approx_eq!(slow_x, 40.0, 1e-3);
        assert_approx_eq!(fast_x, 50.0, 1e-3);
    }
}
