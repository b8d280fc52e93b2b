use serde::{Deserialize, Serialize};

pub mod protocol;

pub use protocol::{
    decode_client, decode_server, encode_client, encode_server, ClientMessage, Envelope,
    ProtocolError, ScoreReason, ServerMessage, PROTOCOL_VERSION,
};

pub type PlayerId = u32;

pub const WORLD_WIDTH: f32 = 2000.0;
pub const WORLD_HEIGHT: f32 = 2000.0;
pub const PLAYER_RADIUS: f32 = 20.0;
pub const PLAYER_SPEED: f32 = 200.0;
pub const IT_SPEED_MULTIPLIER: f32 = 1.3;
pub const DEFAULT_SIGHT_RANGE: f32 = 400.0;

pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 10;
pub const MAX_NAME_LEN: usize = 20;

pub const TAG_POINTS: u32 = 100;
pub const STAR_POINTS: u32 = 25;
pub const IT_STAR_POINTS: u32 = 50;
pub const TAG_COOLDOWN_MS: u64 = 1000;

pub const STUN_PULSE_RADIUS: f32 = 80.0;
pub const STUN_DURATION_MS: u64 = 3000;
pub const STUN_PULSE_DURATION_MS: u64 = 1000;

pub const SPEED_BOOST_MULTIPLIER: f32 = 1.5;
pub const SPEED_BOOST_MS: u64 = 5000;
pub const SHRINK_FACTOR: f32 = 0.7;
pub const SHRINK_MS: u64 = 8000;
pub const TRANSPARENCY_MS: u64 = 5000;

/// Direction vectors longer than this are treated as tampered and renormalized.
pub const MAX_INPUT_MAGNITUDE: f32 = 1.1;
/// Allowed slack between expected and applied displacement.
pub const MOVEMENT_TOLERANCE: f32 = 1.1;
pub const MIN_INPUT_INTERVAL_MS: u64 = 16;
pub const MAX_INPUTS_PER_SECOND: u32 = 35;

pub const INACTIVITY_TIMEOUT_MS: u64 = 30_000;
pub const NO_INPUT_GRACE_MS: u64 = 5_000;
pub const INACTIVITY_SWEEP_INTERVAL_MS: u64 = 5_000;
pub const GAME_DURATION_MS: u64 = 180_000;

pub const POWER_UP_RADIUS: f32 = 20.0;
pub const STAR_RADIUS: f32 = 18.0;
pub const STUN_ORB_RADIUS: f32 = 20.0;
pub const POWER_UP_RESPAWN_MS: u64 = 10_000;
pub const STAR_RESPAWN_MS: u64 = 5_000;
pub const STUN_ORB_RESPAWN_MS: u64 = 15_000;

pub const OBSTACLE_COUNT: usize = 12;
pub const POWER_UP_COUNT: usize = 4;
pub const STAR_COUNT: usize = 8;
pub const STUN_ORB_COUNT: usize = 2;

/// Radians per second.
pub const STAR_ROTATION_SPEED: f32 = 2.0;
/// Radians per second, wraps at 2π.
pub const STUN_ORB_PHASE_SPEED: f32 = 6.0;

pub const SERVER_TICK_MS: u64 = 16;
pub const BROADCAST_TICK_MS: u64 = 33;
pub const MAX_DELTA_SECS: f32 = 0.05;

/// Largest payload a single UDP datagram can carry.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Directional intent as sent by a client every input frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InputState {
    #[serde(default)]
    pub up: bool,
    #[serde(default)]
    pub down: bool,
    #[serde(default)]
    pub left: bool,
    #[serde(default)]
    pub right: bool,
    #[serde(default)]
    pub is_touch_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub touch_x: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub touch_y: Option<f32>,
    pub timestamp: u64,
}

impl InputState {
    pub fn idle(timestamp: u64) -> Self {
        Self {
            up: false,
            down: false,
            left: false,
            right: false,
            is_touch_active: false,
            touch_x: None,
            touch_y: None,
            timestamp,
        }
    }

    pub fn touch(x: f32, y: f32, timestamp: u64) -> Self {
        Self {
            is_touch_active: true,
            touch_x: Some(x),
            touch_y: Some(y),
            ..Self::idle(timestamp)
        }
    }

    pub fn is_idle(&self) -> bool {
        !self.up && !self.down && !self.left && !self.right && !self.is_touch_active
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PowerUpKind {
    Speed,
    Shrink,
    Transparency,
}

/// Static world geometry. Rectangles are anchored at their top-left corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Obstacle {
    Rectangle {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
    Circle {
        x: f32,
        y: f32,
        radius: f32,
    },
}

impl Obstacle {
    /// True when a circle at (cx, cy) with radius `r` overlaps this obstacle.
    pub fn intersects_circle(&self, cx: f32, cy: f32, r: f32) -> bool {
        match *self {
            Obstacle::Rectangle {
                x,
                y,
                width,
                height,
            } => {
                let nearest_x = cx.max(x).min(x + width);
                let nearest_y = cy.max(y).min(y + height);
                let dx = cx - nearest_x;
                let dy = cy - nearest_y;
                dx * dx + dy * dy < r * r
            }
            Obstacle::Circle { x, y, radius } => circles_overlap(cx, cy, r, x, y, radius),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub color: String,
    pub is_it: bool,
    #[serde(rename = "isAI")]
    pub is_ai: bool,
    pub is_stunned: bool,
    pub is_transparent: bool,
    pub is_performing_stun_pulse: bool,
    pub score: u32,
    pub tags: u32,
    pub sight_range: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerUpSnapshot {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub kind: PowerUpKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StarSnapshot {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub rotation: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StunOrbSnapshot {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub electric_phase: f32,
}

/// Full world state broadcast every network tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub tick: u32,
    pub timestamp: u64,
    pub players: Vec<PlayerSnapshot>,
    pub game_active: bool,
    /// Seconds left in the current round, 0 while idle.
    pub time_remaining: u64,
    pub game_width: f32,
    pub game_height: f32,
    pub obstacles: Vec<Obstacle>,
    pub power_ups: Vec<PowerUpSnapshot>,
    pub stars: Vec<StarSnapshot>,
    pub stun_orbs: Vec<StunOrbSnapshot>,
}

impl GameSnapshot {
    pub fn player(&self, id: PlayerId) -> Option<&PlayerSnapshot> {
        self.players.iter().find(|p| p.id == id)
    }
}

pub fn distance(ax: f32, ay: f32, bx: f32, by: f32) -> f32 {
    let dx = bx - ax;
    let dy = by - ay;
    (dx * dx + dy * dy).sqrt()
}

pub fn circles_overlap(ax: f32, ay: f32, ar: f32, bx: f32, by: f32, br: f32) -> bool {
    let combined = ar + br;
    let dx = bx - ax;
    let dy = by - ay;
    dx * dx + dy * dy < combined * combined
}

/// Reduces snapshot precision to one decimal place.
pub fn round_tenth(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_input_state_idle() {
        let input = InputState::idle(42);
        assert!(input.is_idle());
        assert_eq!(input.timestamp, 42);
        assert_eq!(input.touch_x, None);
    }

    #[test]
    fn test_input_state_touch() {
        let input = InputState::touch(0.5, -0.5, 7);
        assert!(!input.is_idle());
        assert!(input.is_touch_active);
        assert_eq!(input.touch_x, Some(0.5));
        assert_eq!(input.touch_y, Some(-0.5));
    }

    #[test]
    fn test_input_state_json_shape() {
        let json = r#"{"up":true,"down":false,"left":false,"right":true,"isTouchActive":false,"timestamp":1000}"#;
        let input: InputState = serde_json::from_str(json).unwrap();
        assert!(input.up);
        assert!(input.right);
        assert!(!input.is_touch_active);
        assert_eq!(input.timestamp, 1000);
    }

    #[test]
    fn test_input_state_rejects_unknown_fields() {
        let json = r#"{"up":true,"timestamp":1000,"speed":9000}"#;
        let result: Result<InputState, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_input_state_rejects_wrong_types() {
        let json = r#"{"up":"yes","timestamp":1000}"#;
        let result: Result<InputState, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_rectangle_intersects_circle() {
        let rect = Obstacle::Rectangle {
            x: 100.0,
            y: 100.0,
            width: 50.0,
            height: 50.0,
        };
        assert!(rect.intersects_circle(125.0, 125.0, 5.0));
        assert!(rect.intersects_circle(90.0, 125.0, 20.0));
        assert!(!rect.intersects_circle(60.0, 125.0, 20.0));
        // Corner distance is sqrt(200) ~ 14.1
        assert!(!rect.intersects_circle(90.0, 90.0, 14.0));
        assert!(rect.intersects_circle(90.0, 90.0, 15.0));
    }

    #[test]
    fn test_circle_obstacle_intersects_circle() {
        let circle = Obstacle::Circle {
            x: 0.0,
            y: 0.0,
            radius: 10.0,
        };
        assert!(circle.intersects_circle(15.0, 0.0, 10.0));
        assert!(!circle.intersects_circle(20.0, 0.0, 10.0));
    }

    #[test]
    fn test_obstacle_json_tag() {
        let circle = Obstacle::Circle {
            x: 1.0,
            y: 2.0,
            radius: 3.0,
        };
        let value = serde_json::to_value(&circle).unwrap();
        assert_eq!(value["type"], "circle");
        assert_eq!(value["radius"], 3.0);
    }

    #[test]
    fn test_distance() {
        assert_approx_eq!(distance(0.0, 0.0, 3.0, 4.0), 5.0, 1e-6);
        assert_approx_eq!(distance(100.0, 100.0, 105.0, 105.0), 7.071, 1e-3);
    }

    #[test]
    fn test_circles_overlap_exact_touch() {
        assert!(!circles_overlap(0.0, 0.0, 10.0, 20.0, 0.0, 10.0));
        assert!(circles_overlap(0.0, 0.0, 10.0, 19.9, 0.0, 10.0));
    }

    #[test]
    fn test_round_tenth() {
        assert_approx_eq!(round_tenth(12.345), 12.3, 1e-4);
        assert_approx_eq!(round_tenth(-0.06), -0.1, 1e-4);
    }

    #[test]
    fn test_player_snapshot_field_names() {
        let snapshot = PlayerSnapshot {
            id: 1,
            name: "a".into(),
            x: 1.0,
            y: 2.0,
            radius: PLAYER_RADIUS,
            color: "#ff0000".into(),
            is_it: true,
            is_ai: false,
            is_stunned: false,
            is_transparent: false,
            is_performing_stun_pulse: false,
            score: 0,
            tags: 0,
            sight_range: DEFAULT_SIGHT_RANGE,
        };
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["isIt"], true);
        assert_eq!(value["isAI"], false);
        assert_eq!(value["sightRange"], 400.0);
    }
}
