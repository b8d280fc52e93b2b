//! Server-side entities owned by the game state.

use shared::{
    round_tenth, InputState, PlayerId, PlayerSnapshot, PowerUpKind, PowerUpSnapshot,
    StarSnapshot, StunOrbSnapshot, DEFAULT_SIGHT_RANGE, IT_SPEED_MULTIPLIER, PLAYER_RADIUS,
    PLAYER_SPEED, STUN_PULSE_DURATION_MS,
};

const PALETTE: [&str; 8] = [
    "#4a90e2", "#e94e77", "#50e3c2", "#9b59b6", "#f5a623", "#1abc9c", "#e67e22", "#f8e71c",
];

/// Deterministic color per player id.
pub fn player_color(id: PlayerId) -> String {
    PALETTE[(id as usize) % PALETTE.len()].to_string()
}

#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub base_radius: f32,
    pub radius: f32,
    pub base_speed: f32,
    pub speed: f32,
    pub color: String,
    pub is_it: bool,
    pub is_ai: bool,
    pub is_stunned: bool,
    pub stun_end_time: u64,
    pub is_transparent: bool,
    pub transparency_end_time: u64,
    pub speed_boost_end_time: u64,
    pub shrink_end_time: u64,
    pub score: u32,
    pub tags: u32,
    pub sight_range: f32,
    pub joined_at: u64,
    /// Last time the player actually changed position.
    pub last_movement: u64,
    /// Latest admitted intent; applied every tick until replaced.
    pub input: Option<InputState>,
    pub last_input_update: Option<u64>,
    /// While `now` is below this the player can neither be caught nor tag.
    pub catch_cooldown_until: u64,
    pub is_performing_stun_pulse: bool,
    pub stun_pulse_start_time: u64,
    pub stun_pulse_duration: u64,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>, x: f32, y: f32, now: u64) -> Self {
        Self {
            id,
            name: name.into(),
            x,
            y,
            base_radius: PLAYER_RADIUS,
            radius: PLAYER_RADIUS,
            base_speed: PLAYER_SPEED,
            speed: PLAYER_SPEED,
            color: player_color(id),
            is_it: false,
            is_ai: false,
            is_stunned: false,
            stun_end_time: 0,
            is_transparent: false,
            transparency_end_time: 0,
            speed_boost_end_time: 0,
            shrink_end_time: 0,
            score: 0,
            tags: 0,
            sight_range: DEFAULT_SIGHT_RANGE,
            joined_at: now,
            last_movement: now,
            input: None,
            last_input_update: None,
            catch_cooldown_until: 0,
            is_performing_stun_pulse: false,
            stun_pulse_start_time: 0,
            stun_pulse_duration: STUN_PULSE_DURATION_MS,
        }
    }

    pub fn new_ai(id: PlayerId, name: impl Into<String>, x: f32, y: f32, now: u64) -> Self {
        Self {
            is_ai: true,
            ..Self::new(id, name, x, y, now)
        }
    }

    /// Speed including the IT bonus.
    pub fn effective_speed(&self) -> f32 {
        if self.is_it {
            self.speed * IT_SPEED_MULTIPLIER
        } else {
            self.speed
        }
    }

    pub fn is_catchable(&self, now: u64) -> bool {
        now >= self.catch_cooldown_until && !self.is_transparent
    }

    pub fn clamp_to_bounds(&mut self, width: f32, height: f32) {
        self.x = clamp_axis(self.x, self.radius, width);
        self.y = clamp_axis(self.y, self.radius, height);
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            id: self.id,
            name: self.name.clone(),
            x: round_tenth(self.x),
            y: round_tenth(self.y),
            radius: round_tenth(self.radius),
            color: self.color.clone(),
            is_it: self.is_it,
            is_ai: self.is_ai,
            is_stunned: self.is_stunned,
            is_transparent: self.is_transparent,
            is_performing_stun_pulse: self.is_performing_stun_pulse,
            score: self.score,
            tags: self.tags,
            sight_range: self.sight_range,
        }
    }
}

/// Clamps a coordinate to `[radius, dimension - radius]`.
pub fn clamp_axis(value: f32, radius: f32, dimension: f32) -> f32 {
    let max = (dimension - radius).max(radius);
    value.max(radius).min(max)
}

/// Anything a player can pick up by touching it.
pub trait Collectible {
    fn id(&self) -> u32;
    fn position(&self) -> (f32, f32);
    fn radius(&self) -> f32;
    fn is_active(&self) -> bool;
    fn set_active(&mut self, active: bool);
    fn relocate(&mut self, x: f32, y: f32);
}

macro_rules! impl_collectible {
    ($ty:ty) => {
        impl Collectible for $ty {
            fn id(&self) -> u32 {
                self.id
            }
            fn position(&self) -> (f32, f32) {
                (self.x, self.y)
            }
            fn radius(&self) -> f32 {
                self.radius
            }
            fn is_active(&self) -> bool {
                self.active
            }
            fn set_active(&mut self, active: bool) {
                self.active = active;
            }
            fn relocate(&mut self, x: f32, y: f32) {
                self.x = x;
                self.y = y;
            }
        }
    };
}

#[derive(Debug, Clone)]
pub struct PowerUp {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub kind: PowerUpKind,
    pub active: bool,
}

impl PowerUp {
    pub fn snapshot(&self) -> PowerUpSnapshot {
        PowerUpSnapshot {
            id: self.id,
            x: round_tenth(self.x),
            y: round_tenth(self.y),
            radius: self.radius,
            kind: self.kind,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Star {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub rotation: f32,
    pub active: bool,
}

impl Star {
    pub fn snapshot(&self) -> StarSnapshot {
        StarSnapshot {
            id: self.id,
            x: round_tenth(self.x),
            y: round_tenth(self.y),
            radius: self.radius,
            rotation: round_tenth(self.rotation),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StunOrb {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub electric_phase: f32,
    pub active: bool,
}

impl StunOrb {
    pub fn snapshot(&self) -> StunOrbSnapshot {
        StunOrbSnapshot {
            id: self.id,
            x: round_tenth(self.x),
            y: round_tenth(self.y),
            radius: self.radius,
            electric_phase: round_tenth(self.electric_phase),
        }
    }
}

impl_collectible!(PowerUp);
impl_collectible!(Star);
impl_collectible!(StunOrb);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_creation() {
        let player = Player::new(1, "alice", 100.0, 200.0, 5_000);
        assert_eq!(player.id, 1);
        assert_eq!(player.x, 100.0);
        assert_eq!(player.y, 200.0);
        assert_eq!(player.radius, PLAYER_RADIUS);
        assert_eq!(player.joined_at, 5_000);
        assert!(!player.is_it);
        assert!(!player.is_ai);
        assert!(player.input.is_none());
    }

    #[test]
    fn test_ai_player_flag() {
        let bot = Player::new_ai(9, "bot", 0.0, 0.0, 0);
        assert!(bot.is_ai);
    }

    #[test]
    fn test_effective_speed_for_it() {
        let mut player = Player::new(1, "a", 0.0, 0.0, 0);
        assert_eq!(player.effective_speed(), PLAYER_SPEED);
        player.is_it = true;
        assert!((player.effective_speed() - PLAYER_SPEED * IT_SPEED_MULTIPLIER).abs() < 1e-3);
    }

    #[test]
    fn test_catchable_respects_cooldown_and_transparency() {
        let mut player = Player::new(1, "a", 0.0, 0.0, 0);
        assert!(player.is_catchable(0));

        player.catch_cooldown_until = 1_000;
        assert!(!player.is_catchable(999));
        assert!(player.is_catchable(1_000));

        player.is_transparent = true;
        assert!(!player.is_catchable(2_000));
    }

    #[test]
    fn test_clamp_to_bounds() {
        let mut player = Player::new(1, "a", -50.0, 5_000.0, 0);
        player.clamp_to_bounds(800.0, 600.0);
        assert_eq!(player.x, PLAYER_RADIUS);
        assert_eq!(player.y, 600.0 - PLAYER_RADIUS);
    }

    #[test]
    fn test_player_color_is_stable() {
        assert_eq!(player_color(3), player_color(3));
        assert_eq!(player_color(0), player_color(8));
    }

    #[test]
    fn test_snapshot_rounds_position() {
        let player = Player::new(1, "a", 10.04, 20.06, 0);
        let snapshot = player.snapshot();
        assert!((snapshot.x - 10.0).abs() < 1e-4);
        assert!((snapshot.y - 20.1).abs() < 1e-4);
    }

    #[test]
    fn test_collectible_trait() {
        let mut star = Star {
            id: 4,
            x: 1.0,
            y: 2.0,
            radius: 10.0,
            rotation: 0.0,
            active: true,
        };
        assert_eq!(star.id(), 4);
        assert_eq!(star.position(), (1.0, 2.0));

        star.set_active(false);
        star.relocate(5.0, 6.0);
        assert!(!star.is_active());
        assert_eq!(star.position(), (5.0, 6.0));
    }
}
