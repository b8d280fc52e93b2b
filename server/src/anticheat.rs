//! Input sanity checks applied before and during movement.
//!
//! Nothing here disconnects a player. Over-long direction vectors and
//! displacements are corrected in place, and inputs arriving too fast are
//! dropped at admission.

use log::debug;
use shared::{PlayerId, MAX_INPUTS_PER_SECOND, MAX_INPUT_MAGNITUDE, MIN_INPUT_INTERVAL_MS};
use std::collections::{HashMap, VecDeque};

const RATE_WINDOW_MS: u64 = 1000;

/// Corrections made to a player's movement.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CheatViolation {
    #[error("Input direction magnitude {0:.3} exceeds tolerance")]
    ExcessiveDirection(f32),
    #[error("Displacement {actual:.2} exceeds allowed {allowed:.2}")]
    ExcessiveDisplacement { actual: f32, allowed: f32 },
    #[error("NaN or Infinity in input direction")]
    InvalidFloats,
}

/// Reasons an input was discarded at admission.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RateLimitViolation {
    #[error("Input arrived {0}ms after the previous one")]
    TooFrequent(u64),
    #[error("Input rate exceeded: {0} inputs in the last second")]
    InputRateExceeded(usize),
}

/// A corrected value plus what, if anything, was wrong with the original.
#[derive(Debug, Clone, PartialEq)]
pub struct Correction<T> {
    pub value: T,
    pub violation: Option<CheatViolation>,
}

impl<T> Correction<T> {
    fn clean(value: T) -> Self {
        Self {
            value,
            violation: None,
        }
    }
}

/// Rescales a direction longer than the tolerance back to unit length.
///
/// Vectors within the tolerance pass through untouched.
pub fn validate_direction(x: f32, y: f32) -> Correction<(f32, f32)> {
    if !x.is_finite() || !y.is_finite() {
        return Correction {
            value: (0.0, 0.0),
            violation: Some(CheatViolation::InvalidFloats),
        };
    }

    let magnitude = (x * x + y * y).sqrt();
    if magnitude > MAX_INPUT_MAGNITUDE {
        Correction {
            value: (x / magnitude, y / magnitude),
            violation: Some(CheatViolation::ExcessiveDirection(magnitude)),
        }
    } else {
        Correction::clean((x, y))
    }
}

/// Shortens a displacement to `max_distance`, keeping its angle.
pub fn clamp_displacement(dx: f32, dy: f32, max_distance: f32) -> Correction<(f32, f32)> {
    let actual = (dx * dx + dy * dy).sqrt();
    if actual > max_distance && actual > 0.0 {
        let scale = max_distance / actual;
        Correction {
            value: (dx * scale, dy * scale),
            violation: Some(CheatViolation::ExcessiveDisplacement {
                actual,
                allowed: max_distance,
            }),
        }
    } else {
        Correction::clean((dx, dy))
    }
}

/// Sliding-window input limits for one player.
#[derive(Debug, Default)]
pub struct PlayerRateLimits {
    last_input_at: Option<u64>,
    admitted: VecDeque<u64>,
}

impl PlayerRateLimits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits an input received at `now`, or reports why it is dropped.
    ///
    /// Dropped inputs do not count against the window.
    pub fn check_input(&mut self, now: u64) -> Result<(), RateLimitViolation> {
        if let Some(last) = self.last_input_at {
            let elapsed = now.saturating_sub(last);
            if elapsed < MIN_INPUT_INTERVAL_MS {
                return Err(RateLimitViolation::TooFrequent(elapsed));
            }
        }

        while let Some(&oldest) = self.admitted.front() {
            if now.saturating_sub(oldest) >= RATE_WINDOW_MS {
                self.admitted.pop_front();
            } else {
                break;
            }
        }

        if self.admitted.len() >= MAX_INPUTS_PER_SECOND as usize {
            return Err(RateLimitViolation::InputRateExceeded(self.admitted.len() + 1));
        }

        self.admitted.push_back(now);
        self.last_input_at = Some(now);
        Ok(())
    }
}

/// Rate limiter for every connected player.
#[derive(Debug, Default)]
pub struct RateLimiterManager {
    players: HashMap<PlayerId, PlayerRateLimits>,
}

impl RateLimiterManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_player(&mut self, player_id: PlayerId) {
        self.players.insert(player_id, PlayerRateLimits::new());
    }

    pub fn unregister_player(&mut self, player_id: PlayerId) {
        if self.players.remove(&player_id).is_some() {
            debug!("Dropped rate limits for player {}", player_id);
        }
    }

    pub fn check_input(&mut self, player_id: PlayerId, now: u64) -> Result<(), RateLimitViolation> {
        match self.players.get_mut(&player_id) {
            Some(limits) => limits.check_input(now),
            // Unknown players are rejected elsewhere
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_direction_within_tolerance_untouched() {
        let result = validate_direction(1.05, 0.0);
        assert_eq!(result.value, (1.05, 0.0));
        assert!(result.violation.is_none());
    }

    #[test]
    fn test_oversized_direction_rescaled_to_unit() {
        let result = validate_direction(2.0, 0.0);
        assert_approx_eq!(result.value.0, 1.0, 1e-6);
        assert_approx_eq!(result.value.1, 0.0, 1e-6);
        assert!(matches!(
            result.violation,
            Some(CheatViolation::ExcessiveDirection(m)) if (m - 2.0).abs() < 1e-6
        ));
    }

    #[test]
    fn test_non_finite_direction_zeroed() {
        let result = validate_direction(f32::NAN, 1.0);
        assert_eq!(result.value, (0.0, 0.0));
        assert_eq!(result.violation, Some(CheatViolation::InvalidFloats));
    }

    #[test]
    fn test_clamp_displacement_preserves_angle() {
        let result = clamp_displacement(30.0, 40.0, 10.0);
        let (dx, dy) = result.value;
        assert_approx_eq!(dx, 6.0, 1e-4);
        assert_approx_eq!(dy, 8.0, 1e-4);
        assert!(result.violation.is_some());

        let ok = clamp_displacement(3.0, 4.0, 10.0);
        assert_eq!(ok.value, (3.0, 4.0));
        assert!(ok.violation.is_none());
    }

    #[test]
    fn test_rate_limit_min_interval() {
        let mut limits = PlayerRateLimits::new();
        assert!(limits.check_input(1_000).is_ok());
        assert_eq!(
            limits.check_input(1_010),
            Err(RateLimitViolation::TooFrequent(10))
        );
        assert!(limits.check_input(1_016).is_ok());
        assert_eq!(limits.admitted.len(), 2);
    }

    #[test]
    fn test_rate_limit_window_cap() {
        let mut limits = PlayerRateLimits::new();
        let mut now = 0;
        let mut accepted = 0;
        for _ in 0..60 {
            if limits.check_input(now).is_ok() {
                accepted += 1;
            }
            now += MIN_INPUT_INTERVAL_MS;
        }
        // 60 inputs at 16 ms span 960 ms, all inside one window
        assert_eq!(accepted, MAX_INPUTS_PER_SECOND);
    }

    #[test]
    fn test_rate_limit_window_slides() {
        let mut limits = PlayerRateLimits::new();
        for i in 0..MAX_INPUTS_PER_SECOND as u64 {
            assert!(limits.check_input(i * 20).is_ok());
        }
        assert!(limits.check_input(MAX_INPUTS_PER_SECOND as u64 * 20).is_err());
        // First sample (t=0) leaves the window at t=1000
        assert!(limits.check_input(1_000).is_ok());
    }

    #[test]
    fn test_manager_register_unregister() {
        let mut manager = RateLimiterManager::new();
        manager.register_player(1);
        assert!(manager.players.contains_key(&1));
        assert!(manager.check_input(1, 0).is_ok());
        assert!(manager.check_input(1, 5).is_err());

        manager.unregister_player(1);
        assert!(!manager.players.contains_key(&1));
        assert!(manager.check_input(1, 6).is_ok());
    }
}
