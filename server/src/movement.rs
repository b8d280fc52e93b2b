//! Turns a buffered input into a bounded, collision-resolved move.

use crate::anticheat::{clamp_displacement, validate_direction, CheatViolation};
use crate::entity::clamp_axis;
use crate::game::GameState;
use log::{debug, warn};
use shared::{InputState, PlayerId, MAX_DELTA_SECS, MOVEMENT_TOLERANCE};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MoveOutcome {
    pub moved: bool,
    /// Tag and pickup checks are only worth running after a move.
    pub check_events: bool,
    pub violations: Vec<CheatViolation>,
}

/// Raw direction for an input: touch vector if active, otherwise keys.
///
/// Keyboard diagonals are normalized here so they never trip the magnitude check.
pub fn direction_from_input(input: &InputState) -> (f32, f32) {
    if input.is_touch_active {
        if let (Some(x), Some(y)) = (input.touch_x, input.touch_y) {
            return (x, y);
        }
        return (0.0, 0.0);
    }

    let axis = |neg: bool, pos: bool| match (neg, pos) {
        (true, false) => -1.0,
        (false, true) => 1.0,
        _ => 0.0,
    };
    let x: f32 = axis(input.left, input.right);
    let y: f32 = axis(input.up, input.down);

    if x != 0.0 && y != 0.0 {
        let inv = std::f32::consts::FRAC_1_SQRT_2;
        (x * inv, y * inv)
    } else {
        (x, y)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MovementEngine;

impl MovementEngine {
    pub fn new() -> Self {
        Self
    }

    /// Advances one player by `dt` seconds using their buffered input.
    pub fn advance(&self, state: &mut GameState, player_id: PlayerId, dt: f32) -> MoveOutcome {
        let mut outcome = MoveOutcome::default();
        let dt = dt.clamp(0.0, MAX_DELTA_SECS);

        let (x, y, radius, speed, input) = match state.player(player_id) {
            Some(p) if !p.is_stunned => match &p.input {
                Some(input) => (p.x, p.y, p.radius, p.effective_speed(), input.clone()),
                None => return outcome,
            },
            _ => return outcome,
        };

        let (raw_x, raw_y) = direction_from_input(&input);
        if raw_x == 0.0 && raw_y == 0.0 {
            return outcome;
        }

        let direction = validate_direction(raw_x, raw_y);
        if let Some(violation) = direction.violation {
            warn!("Player {}: {}", player_id, violation);
            outcome.violations.push(violation);
        }
        let (dir_x, dir_y) = direction.value;

        let expected = speed * dt;
        let displacement = clamp_displacement(
            dir_x * expected,
            dir_y * expected,
            expected * MOVEMENT_TOLERANCE,
        );
        if let Some(violation) = displacement.violation {
            warn!("Player {}: {}", player_id, violation);
            outcome.violations.push(violation);
        }
        let (dx, dy) = displacement.value;

        let target_x = clamp_axis(x + dx, radius, state.width());
        let target_y = clamp_axis(y + dy, radius, state.height());

        let resolved = if !state.collides_with_obstacle(target_x, target_y, radius) {
            Some((target_x, target_y))
        } else if !state.collides_with_obstacle(target_x, y, radius) {
            Some((target_x, y))
        } else if !state.collides_with_obstacle(x, target_y, radius) {
            Some((x, target_y))
        } else {
            debug!("Player {} blocked by obstacle", player_id);
            None
        };

        if let Some((new_x, new_y)) = resolved {
            outcome.moved = state.set_player_position(player_id, new_x, new_y);
            outcome.check_events = outcome.moved;
        }
        outcome
    }
}
