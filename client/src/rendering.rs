use crate::game::DisplayState;
use macroquad::prelude::*;
use shared::PLAYER_RADIUS;

const BACKGROUND: Color = Color::new(30.0 / 255.0, 30.0 / 255.0, 30.0 / 255.0, 1.0);
const COIN_COLOR: Color = Color::new(1.0, 215.0 / 255.0, 0.0, 1.0);

#[derive(Debug, Clone)]
pub struct HudInfo {
    pub latency_ms: u128,
    pub connected: bool,
    pub round_started: bool,
    pub snapshots: usize,
}

pub struct Renderer {
    coin_radius: f32,
    player_half: f32,
}

impl Renderer {
    pub fn new(coin_radius: f32) -> Self {
        Renderer {
            coin_radius,
            player_half: PLAYER_RADIUS,
        }
    }

    pub fn render(&self, display: &DisplayState, hud: &HudInfo) {
        clear_background(BACKGROUND);

        draw_circle(display.coin.x, display.coin.y, self.coin_radius, COIN_COLOR);

        for (id, player) in &display.players {
            let [r, g, b] = player.color;
            let left = player.x - self.player_half;
            let top = player.y - self.player_half;
            let size = self.player_half * 2.0;

            draw_rectangle(left, top, size, size, Color::from_rgba(r, g, b, 255));

            let label = format!("{}: {}", id, player.score);
            draw_text(&label, left, top - 6.0, 20.0, WHITE);
        }

        self.draw_hud(hud);
    }

    fn draw_hud(&self, hud: &HudInfo) {
        let latency = format!("Simulated Latency: {}ms", hud.latency_ms);
        draw_text(&latency, 10.0, 20.0, 20.0, WHITE);

        let (status, color) = match (hud.connected, hud.round_started) {
            (false, _) => ("DISCONNECTED", RED),
            (true, false) => ("WAITING FOR PLAYERS", YELLOW),
            (true, true) => ("GAME STARTED", GREEN),
        };
        draw_text(status, 10.0, 42.0, 20.0, color);

        let buffered = format!("{} snapshots buffered", hud.snapshots);
        draw_text(&buffered, 10.0, 62.0, 16.0, GRAY);
    }
}
