use clap::Parser;
use log::info;
use server::{Server, ServerConfig};
use shared::WorldConfig;
use std::time::Duration;

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "5555")]
    port: u16,
    /// Simulated one-way latency in milliseconds, applied in both directions
    #[clap(short, long, default_value = "200")]
    latency_ms: u64,
    /// Tick rate (updates per second)
    #[clap(short, long, default_value = "60")]
    tick_rate: u32,
    /// Players needed before a round starts
    #[clap(long, default_value = "2")]
    required_players: usize,
    /// Lobby poll interval in milliseconds while waiting for players
    #[clap(long, default_value = "1000")]
    lobby_poll_ms: u64,
    /// Edge length of the square map
    #[clap(long, default_value = "800")]
    map_size: f32,
    /// Player collision radius
    #[clap(long, default_value = "20")]
    player_radius: f32,
    /// Coin collision radius
    #[clap(long, default_value = "15")]
    coin_radius: f32,
    /// Distance moved per command
    #[clap(long, default_value = "5")]
    player_step: f32,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            host: self.host,
            port: self.port,
            latency: Duration::from_millis(self.latency_ms),
            tick_rate: self.tick_rate,
            required_players: self.required_players,
            lobby_poll_interval: Duration::from_millis(self.lobby_poll_ms),
            world: WorldConfig {
                map_size: self.map_size,
                player_radius: self.player_radius,
                coin_radius: self.coin_radius,
                player_step: self.player_step,
                ..WorldConfig::default()
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = Args::parse().into_config();
    info!(
        "Simulated latency {}ms, {} Hz tick",
        config.latency.as_millis(),
        config.tick_rate
    );

    let server = Server::bind(config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
