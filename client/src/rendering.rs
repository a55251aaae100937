use crate::game::{ClientGameState, RenderPlayer};
use macroquad::prelude::*;
use shared::{Platform, RoomPhase, PLAYER_HEIGHT, PLAYER_RADIUS, WORLD_WIDTH};

/// Vertical extent of the world that is always kept on screen.
pub const VIEW_HEIGHT: f32 = 800.0;

/// Maps ground-up world coordinates onto the top-down screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scale: f32,
    pub offset_x: f32,
    pub screen_height: f32,
}

impl Viewport {
    /// Largest uniform scale that fits the world width and view height.
    pub fn fit(screen_width: f32, screen_height: f32) -> Self {
        let scale = (screen_width / WORLD_WIDTH).min(screen_height / VIEW_HEIGHT);
        Self {
            scale,
            offset_x: (screen_width - WORLD_WIDTH * scale) / 2.0,
            screen_height,
        }
    }

    pub fn to_screen(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.offset_x + x * self.scale,
            self.screen_height - y * self.scale,
        )
    }

    pub fn length(&self, world: f32) -> f32 {
        world * self.scale
    }
}

/// Debug and status values shown next to the world.
#[derive(Debug, Clone)]
pub struct HudConfig {
    pub prediction_enabled: bool,
    pub reconciliation_enabled: bool,
    pub interpolation_enabled: bool,
    pub connected: bool,
    pub ping_ms: u64,
    pub fake_ping_ms: u64,
    pub status: Option<String>,
    pub now_ms: u64,
}

/// Whole seconds shown for a remaining duration, rounded up.
pub fn countdown_seconds(remaining_ms: u64) -> u64 {
    remaining_ms.div_ceil(1000)
}

/// `m:ss.t` text for the game timer.
pub fn format_game_time(remaining_ms: u64) -> String {
    let tenths = remaining_ms / 100;
    format!("{}:{:02}.{}", tenths / 600, (tenths / 10) % 60, tenths % 10)
}

pub struct Renderer;

impl Renderer {
    pub fn new() -> Self {
        Renderer
    }

    pub fn render(&mut self, game: &ClientGameState, players: &[RenderPlayer], hud: &HudConfig) {
        clear_background(Color::from_rgba(135, 206, 235, 255));
        let viewport = Viewport::fit(screen_width(), screen_height());

        if let Some(snapshot) = game.snapshot() {
            for platform in &snapshot.platforms {
                self.draw_platform(&viewport, platform);
            }
        }

        for player in players {
            self.draw_player(&viewport, player);
        }

        self.draw_room_info(game, hud);
        self.draw_debug(game, hud);
        self.draw_overlays(game, hud);
    }

    fn draw_platform(&self, viewport: &Viewport, platform: &Platform) {
        let (x, y) = viewport.to_screen(platform.x, platform.top());
        draw_rectangle(
            x,
            y,
            viewport.length(platform.w),
            viewport.length(platform.h),
            Color::from_rgba(76, 175, 80, 255),
        );
    }

    fn draw_player(&self, viewport: &Viewport, player: &RenderPlayer) {
        let (cx, cy) = viewport.to_screen(player.x, player.y + PLAYER_RADIUS);
        let radius = viewport.length(PLAYER_RADIUS);

        let color = if player.is_tagger {
            Color::from_rgba(255, 61, 0, 255)
        } else if player.is_local {
            Color::from_rgba(33, 150, 243, 255)
        } else {
            WHITE
        };
        draw_circle(cx, cy, radius, color);
        draw_circle_lines(cx, cy, radius, 1.5, BLACK);

        // Facing indicator
        let eye_x = cx + f32::from(player.dir) * radius * 0.5;
        draw_circle(eye_x, cy - radius * 0.2, radius * 0.15, BLACK);

        let (_, name_y) = viewport.to_screen(player.x, player.y + PLAYER_HEIGHT + 6.0);
        let size = measure_text(&player.name, None, 16, 1.0);
        draw_text(&player.name, cx - size.width / 2.0, name_y, 16.0, BLACK);

        if player.is_tagger {
            let (_, it_y) = viewport.to_screen(player.x, player.y - 14.0);
            draw_text("IT", cx - 6.0, it_y, 16.0, Color::from_rgba(255, 235, 59, 255));
        }
    }

    fn draw_room_info(&self, game: &ClientGameState, hud: &HudConfig) {
        let x = screen_width() - 220.0;
        let mut y = 20.0;

        if let Some(code) = &game.room_code {
            draw_text(&format!("Room: {}", code), x, y, 20.0, BLACK);
            y += 20.0;
        }
        draw_text(&format!("State: {}", game.phase()), x, y, 16.0, BLACK);
        y += 18.0;

        if let Some(snapshot) = game.snapshot() {
            for player in &snapshot.players {
                let mut line = player.name.clone();
                if snapshot.leader_id == Some(player.id) {
                    line.push_str(" (leader)");
                }
                if Some(player.id) == game.client_id {
                    line.push_str(" *");
                }
                draw_text(&line, x, y, 16.0, DARKGRAY);
                y += 16.0;
            }
        }

        if let Some(status) = &hud.status {
            draw_text(status, x, y + 8.0, 16.0, RED);
        }
    }

    fn draw_debug(&self, game: &ClientGameState, hud: &HudConfig) {
        let y_start = 10.0;
        let indicator_size = 12.0;
        let spacing = 25.0;

        let features = [
            ("P", hud.prediction_enabled),
            ("R", hud.reconciliation_enabled),
            ("I", hud.interpolation_enabled),
        ];

        for (i, (label, enabled)) in features.iter().enumerate() {
            let x = 10.0 + (i as f32) * spacing;
            let color = if *enabled { GREEN } else { RED };

            draw_rectangle(x, y_start, indicator_size, indicator_size, color);
            draw_rectangle_lines(x, y_start, indicator_size, indicator_size, 1.0, BLACK);
            draw_text(label, x + 3.0, y_start + indicator_size + 12.0, 12.0, BLACK);
        }

        let connection_color = if hud.connected { GREEN } else { RED };
        draw_rectangle(10.0, y_start + 35.0, 8.0, 8.0, connection_color);
        draw_text("CON", 20.0, y_start + 35.0 + 8.0, 12.0, BLACK);

        let ping_y = y_start + 50.0;
        let total_ping = hud.ping_ms + hud.fake_ping_ms;
        let ping_bars = (total_ping / 20).min(10) as i32;
        for i in 0..10i32 {
            let bar_color = if i < ping_bars {
                if total_ping < 50 {
                    GREEN
                } else if total_ping < 100 {
                    YELLOW
                } else {
                    RED
                }
            } else {
                Color::from_rgba(51, 51, 51, 255)
            };
            draw_rectangle(10.0 + (i as f32) * 3.0, ping_y, 2.0, 8.0, bar_color);
        }
        draw_text(&format!("{}ms", total_ping), 45.0, ping_y + 8.0, 12.0, BLACK);
        draw_text(
            &format!("delay {}ms", game.interpolation_delay_ms()),
            10.0,
            ping_y + 22.0,
            12.0,
            BLACK,
        );
    }

    fn draw_overlays(&self, game: &ClientGameState, hud: &HudConfig) {
        let center_x = screen_width() / 2.0;
        let center_y = screen_height() / 2.0;
        let snapshot = game.snapshot();

        match game.phase() {
            RoomPhase::Waiting | RoomPhase::Ended if game.is_leader() => {
                let hint = "Press Enter to start";
                let size = measure_text(hint, None, 24, 1.0);
                draw_text(hint, center_x - size.width / 2.0, 40.0, 24.0, BLACK);
            }
            RoomPhase::Countdown => {
                let remaining = snapshot.map_or(0, |s| s.countdown_remaining_ms);
                let text = countdown_seconds(remaining).to_string();
                let size = measure_text(&text, None, 160, 1.0);
                draw_text(&text, center_x - size.width / 2.0, center_y, 160.0, BLACK);
                let ready = format!("Get Ready! Tagger: {}", game.tagger_name().unwrap_or(""));
                let size = measure_text(&ready, None, 32, 1.0);
                draw_text(
                    &ready,
                    center_x - size.width / 2.0,
                    center_y + 50.0,
                    32.0,
                    Color::from_rgba(255, 152, 0, 255),
                );
            }
            RoomPhase::Running => {
                let remaining = snapshot.map_or(0, |s| s.game_remaining_ms);
                draw_text(
                    &format!("Time: {}", format_game_time(remaining)),
                    center_x - 60.0,
                    30.0,
                    24.0,
                    BLACK,
                );
                draw_text(
                    &format!("Tagger: {}", game.tagger_name().unwrap_or("")),
                    center_x - 60.0,
                    54.0,
                    20.0,
                    Color::from_rgba(255, 61, 0, 255),
                );
            }
            _ => {}
        }

        if game.phase() == RoomPhase::Ended {
            let mut y = center_y - 60.0;
            draw_text("Game Over", center_x - 80.0, y, 40.0, BLACK);
            y += 36.0;
            for (rank, player) in game.results().iter().enumerate() {
                let line = format!(
                    "{}. {}  {:.1}s as tagger",
                    rank + 1,
                    player.name,
                    player.tagged_ms as f32 / 1000.0
                );
                draw_text(&line, center_x - 120.0, y, 22.0, BLACK);
                y += 24.0;
            }
        }

        if game.tag_flash_active(hud.now_ms) {
            let size = measure_text("TAG!", None, 72, 1.0);
            draw_text(
                "TAG!",
                center_x - size.width / 2.0,
                center_y - 120.0,
                72.0,
                Color::from_rgba(255, 152, 0, 255),
            );
        }
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}
