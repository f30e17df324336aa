use clap::Parser;
use client::game::ClientGameState;
use client::input::InputManager;
use client::rendering::{HudInfo, Renderer};
use client::{ClientConfig, NetworkClient};
use log::{error, info};
use macroquad::prelude::*;
use shared::{now_secs, COIN_RADIUS, MAP_SIZE};
use std::time::Duration;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server address to connect to
    #[clap(short = 's', long, default_value = "127.0.0.1:5555")]
    server: String,

    /// Simulated send latency in milliseconds, also part of the render delay
    #[clap(short = 'l', long, default_value = "200")]
    latency_ms: u64,

    /// Extra render delay in milliseconds
    #[clap(short = 'i', long, default_value = "100")]
    interpolation_offset_ms: u64,

    /// Number of snapshots kept for interpolation
    #[clap(long, default_value = "20")]
    history: usize,
}

impl Args {
    fn into_config(self) -> ClientConfig {
        ClientConfig {
            server: self.server,
            latency: Duration::from_millis(self.latency_ms),
            interpolation_offset: Duration::from_millis(self.interpolation_offset_ms),
            history_capacity: self.history,
        }
    }
}

fn window_conf() -> Conf {
    Conf {
        window_title: "Coin Rush".to_owned(),
        window_width: MAP_SIZE as i32,
        window_height: MAP_SIZE as i32,
        window_resizable: false,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = Args::parse().into_config();
    info!("Simulating {}ms latency", config.latency.as_millis());
    info!("Controls: arrow keys or WASD to move, Escape to quit");

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    let mut network = match runtime.block_on(NetworkClient::connect(&config)) {
        Ok(network) => network,
        Err(e) => {
            error!("Failed to connect to {}: {}", config.server, e);
            std::process::exit(1);
        }
    };

    let mut game = ClientGameState::new(&config);
    let mut input = InputManager::new();
    let renderer = Renderer::new(COIN_RADIUS);

    loop {
        if is_key_pressed(KeyCode::Escape) {
            break;
        }

        for command in input.update() {
            network.send_input(command);
        }

        for message in network.receive_updates() {
            game.handle_message(message);
        }

        let hud = HudInfo {
            latency_ms: config.latency.as_millis(),
            connected: network.is_connected(),
            round_started: game.round_started(),
            snapshots: game.history().len(),
        };
        renderer.render(game.interpolate(now_secs()), &hud);

        next_frame().await;
    }

    info!("Shutting down after {} commands", input.commands_sent());
    drop(network);
    runtime.shutdown_timeout(Duration::from_millis(100));
}
