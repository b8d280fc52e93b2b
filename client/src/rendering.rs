use crate::game::ClientGameState;
use crate::interpolation::{Easing, RenderedEntity};
use crate::network_quality::{NetworkQuality, ADAPTIVE_MAX_MS};
use macroquad::prelude::*;
use shared::{Obstacle, PlayerSnapshot, PowerUpKind};

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub easing: Easing,
    pub show_graph: bool,
    pub fps: i32,
}

pub struct Renderer {
    width: f32,
    height: f32,
}

/// Parses "#rrggbb", falling back to white.
pub fn parse_hex_color(hex: &str) -> Color {
    let digits = hex.trim_start_matches('#');
    if digits.len() != 6 {
        return WHITE;
    }
    match u32::from_str_radix(digits, 16) {
        Ok(rgb) => Color::from_rgba((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8, 255),
        Err(_) => WHITE,
    }
}

/// Top-left of the view so that `focus` sits in the middle, kept inside the world.
pub fn camera_origin(focus: (f32, f32), view: (f32, f32), world: (f32, f32)) -> (f32, f32) {
    let axis = |focus: f32, view: f32, world: f32| {
        if world <= view {
            (world - view) / 2.0
        } else {
            (focus - view / 2.0).clamp(0.0, world - view)
        }
    };
    (axis(focus.0, view.0, world.0), axis(focus.1, view.1, world.1))
}

impl Renderer {
    pub fn new(width: usize, height: usize) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Renderer {
            width: width as f32,
            height: height as f32,
        })
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
    }

    pub fn render(&mut self, state: &ClientGameState, entities: &[RenderedEntity], now: f64, ui: UiConfig) {
        clear_background(Color::from_rgba(26, 26, 26, 255));

        let Some(snapshot) = state.snapshot() else {
            self.draw_centered(&status_text(state), 24.0);
            return;
        };

        let local_id = state.local_player_id();
        let focus = local_id
            .and_then(|id| entities.iter().find(|e| e.id == id))
            .map(|e| (e.x, e.y))
            .unwrap_or((snapshot.game_width / 2.0, snapshot.game_height / 2.0));
        let (ox, oy) = camera_origin(
            focus,
            (self.width, self.height),
            (snapshot.game_width, snapshot.game_height),
        );

        self.draw_arena(snapshot.game_width, snapshot.game_height, ox, oy);

        for obstacle in &snapshot.obstacles {
            self.draw_obstacle(obstacle, ox, oy);
        }
        for star in &snapshot.stars {
            draw_poly(star.x - ox, star.y - oy, 5, star.radius, star.rotation.to_degrees(), GOLD);
        }
        for power_up in &snapshot.power_ups {
            let color = match power_up.kind {
                PowerUpKind::Speed => Color::from_rgba(0, 200, 255, 255),
                PowerUpKind::Shrink => Color::from_rgba(180, 90, 255, 255),
                PowerUpKind::Transparency => Color::from_rgba(220, 220, 220, 160),
            };
            draw_circle(power_up.x - ox, power_up.y - oy, power_up.radius, color);
            draw_circle_lines(power_up.x - ox, power_up.y - oy, power_up.radius, 2.0, WHITE);
        }
        for orb in &snapshot.stun_orbs {
            let pulse = 0.5 + 0.5 * orb.electric_phase.sin();
            let glow = Color::new(0.4, 0.7, 1.0, 0.3 + 0.4 * pulse);
            draw_circle(orb.x - ox, orb.y - oy, orb.radius + 4.0 * pulse, glow);
            draw_circle(orb.x - ox, orb.y - oy, orb.radius * 0.6, SKYBLUE);
        }

        for explosion in state.explosions() {
            let progress = explosion.progress(now);
            let color = Color::new(0.5, 0.8, 1.0, 1.0 - progress);
            draw_circle_lines(
                explosion.x - ox,
                explosion.y - oy,
                explosion.radius * progress.max(0.1),
                3.0,
                color,
            );
        }

        for entity in entities {
            if let Some(player) = snapshot.player(entity.id) {
                self.draw_player(entity, player, Some(entity.id) == local_id, ox, oy);
            }
        }

        self.draw_hud(state, &ui);
        if ui.show_graph {
            self.draw_quality_graph(state.engine().quality());
        }
        if let Some(reason) = state.last_game_end() {
            self.draw_centered(reason, 28.0);
        }
    }

    fn draw_arena(&self, width: f32, height: f32, ox: f32, oy: f32) {
        draw_rectangle(-ox, -oy, width, height, Color::from_rgba(40, 44, 52, 255));
        let grid = 100.0;
        let mut x = 0.0;
        while x <= width {
            draw_line(x - ox, -oy, x - ox, height - oy, 1.0, Color::from_rgba(55, 60, 70, 255));
            x += grid;
        }
        let mut y = 0.0;
        while y <= height {
            draw_line(-ox, y - oy, width - ox, y - oy, 1.0, Color::from_rgba(55, 60, 70, 255));
            y += grid;
        }
        draw_rectangle_lines(-ox, -oy, width, height, 3.0, GRAY);
    }

    fn draw_obstacle(&self, obstacle: &Obstacle, ox: f32, oy: f32) {
        let fill = Color::from_rgba(68, 68, 68, 255);
        match *obstacle {
            Obstacle::Rectangle {
                x,
                y,
                width,
                height,
            } => {
                draw_rectangle(x - ox, y - oy, width, height, fill);
                draw_rectangle_lines(x - ox, y - oy, width, height, 2.0, DARKGRAY);
            }
            Obstacle::Circle { x, y, radius } => {
                draw_circle(x - ox, y - oy, radius, fill);
                draw_circle_lines(x - ox, y - oy, radius, 2.0, DARKGRAY);
            }
        }
    }

    fn draw_player(
        &self,
        entity: &RenderedEntity,
        player: &PlayerSnapshot,
        is_local: bool,
        ox: f32,
        oy: f32,
    ) {
        let x = entity.x - ox;
        let y = entity.y - oy;
        let radius = entity.flags.radius;

        let mut color = parse_hex_color(&player.color);
        if entity.flags.is_transparent {
            color.a = 0.35;
        }
        if entity.flags.is_stunned {
            color = Color::new(color.r * 0.5, color.g * 0.5, color.b * 0.5, color.a);
        }

        if entity.flags.is_performing_stun_pulse {
            draw_circle_lines(x, y, shared::STUN_PULSE_RADIUS, 2.0, SKYBLUE);
        }

        draw_circle(x, y, radius, color);
        let outline = if entity.flags.is_it {
            RED
        } else if is_local {
            GREEN
        } else {
            WHITE
        };
        draw_circle_lines(x, y, radius, if entity.flags.is_it { 4.0 } else { 2.0 }, outline);

        let label = if entity.flags.is_it {
            format!("{} (IT)", player.name)
        } else {
            player.name.clone()
        };
        let dims = measure_text(&label, None, 16, 1.0);
        draw_text(&label, x - dims.width / 2.0, y - radius - 6.0, 16.0, WHITE);

        if entity.flags.is_stunned {
            draw_text("zz", x + radius * 0.5, y - radius * 0.5, 18.0, YELLOW);
        }
    }

    fn draw_hud(&self, state: &ClientGameState, ui: &UiConfig) {
        let mut y = 20.0;
        if let Some(snapshot) = state.snapshot() {
            let timer = if snapshot.game_active {
                format!("{}:{:02}", snapshot.time_remaining / 60, snapshot.time_remaining % 60)
            } else {
                "Waiting for players".to_string()
            };
            draw_text(&timer, 10.0, y, 22.0, WHITE);
            y += 22.0;
        }
        if let Some(it) = state.it_player() {
            draw_text(&format!("IT: {}", it.name), 10.0, y, 18.0, RED);
            y += 20.0;
        }
        if let Some(me) = state.local_player() {
            draw_text(&format!("Score: {}", me.score), 10.0, y, 18.0, GREEN);
            y += 20.0;
        }

        let quality = state.engine().quality();
        let stats = format!(
            "buffer {:.0}ms  jitter {:.1}ms  {:?}  {} fps",
            quality.buffer_time(),
            quality.jitter(),
            ui.easing,
            ui.fps
        );
        draw_text(&stats, 10.0, self.height - 10.0, 14.0, LIGHTGRAY);

        let mut ly = 20.0;
        for player in state.leaderboard().iter().take(5) {
            let line = format!("{:<12} {:>5}", player.name, player.score);
            let dims = measure_text(&line, None, 16, 1.0);
            draw_text(&line, self.width - dims.width - 10.0, ly, 16.0, WHITE);
            ly += 18.0;
        }

        for event in state.events() {
            draw_text(&event.text, 10.0, y, 16.0, YELLOW);
            y += 18.0;
        }
    }

    fn draw_quality_graph(&self, quality: &NetworkQuality) {
        let graph_width = 240.0;
        let graph_height = 80.0;
        let x0 = self.width - graph_width - 10.0;
        let y0 = self.height - graph_height - 30.0;

        draw_rectangle(x0, y0, graph_width, graph_height, Color::new(0.0, 0.0, 0.0, 0.6));
        draw_rectangle_lines(x0, y0, graph_width, graph_height, 1.0, GRAY);

        let samples: Vec<_> = quality.history().collect();
        if samples.len() < 2 {
            return;
        }
        let step = graph_width / (samples.len() - 1) as f32;
        let scale = |ms: f64| y0 + graph_height - (ms / ADAPTIVE_MAX_MS).min(1.0) as f32 * graph_height;

        for (i, pair) in samples.windows(2).enumerate() {
            let xa = x0 + i as f32 * step;
            let xb = xa + step;
            draw_line(xa, scale(pair[0].buffer_ms), xb, scale(pair[1].buffer_ms), 1.5, GREEN);
            draw_line(xa, scale(pair[0].jitter_ms), xb, scale(pair[1].jitter_ms), 1.0, ORANGE);
        }
        draw_text("buffer", x0 + 4.0, y0 + 12.0, 12.0, GREEN);
        draw_text("jitter", x0 + 50.0, y0 + 12.0, 12.0, ORANGE);
    }

    fn draw_centered(&self, text: &str, size: f32) {
        let dims = measure_text(text, None, size as u16, 1.0);
        draw_text(
            text,
            (self.width - dims.width) / 2.0,
            self.height / 2.0,
            size,
            WHITE,
        );
    }
}

fn status_text(state: &ClientGameState) -> String {
    match state.status() {
        crate::game::ConnectionStatus::Rejected(reason) => format!("Join rejected: {}", reason),
        _ => "Connecting...".to_string(),
    }
}
