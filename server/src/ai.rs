//! Decision function for server-driven bots.
//!
//! Bots produce the same [`InputState`] a touch client would send, so they go
//! through the regular movement pipeline.

use crate::game::GameState;
use log::debug;
use shared::{distance, InputState, PlayerId};
use std::collections::HashMap;

/// Distance at which a runner starts fleeing the IT player.
pub const FLEE_RADIUS: f32 = 300.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiBehavior {
    /// IT bot closing in on a catchable player
    Chase,
    /// Runner moving away from the IT player
    Flee,
    /// Runner heading for the nearest star
    Collect,
    Idle,
}

#[derive(Debug, Clone)]
pub struct AiState {
    pub behavior: AiBehavior,
    pub target: Option<(f32, f32)>,
}

impl Default for AiState {
    fn default() -> Self {
        Self {
            behavior: AiBehavior::Idle,
            target: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct AiController {
    states: HashMap<PlayerId, AiState>,
}

impl AiController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_bot(&mut self, player_id: PlayerId) {
        self.states.insert(player_id, AiState::default());
    }

    pub fn unregister_bot(&mut self, player_id: PlayerId) {
        self.states.remove(&player_id);
    }

    pub fn bot_ids(&self) -> Vec<PlayerId> {
        let mut ids: Vec<PlayerId> = self.states.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Chooses the bot's next input. `None` for unknown or removed bots.
    pub fn decide(&mut self, state: &GameState, bot_id: PlayerId, now: u64) -> Option<InputState> {
        let ai_state = self.states.get_mut(&bot_id)?;
        let bot = state.player(bot_id)?;

        let (behavior, target) = if bot.is_it {
            let prey = state
                .players()
                .filter(|p| p.id != bot_id && p.is_catchable(now))
                .min_by(|a, b| {
                    distance(bot.x, bot.y, a.x, a.y).total_cmp(&distance(bot.x, bot.y, b.x, b.y))
                });
            match prey {
                Some(p) => (AiBehavior::Chase, Some((p.x, p.y))),
                None => (AiBehavior::Idle, None),
            }
        } else {
            let threat = state
                .players()
                .find(|p| p.is_it && p.id != bot_id)
                .filter(|it| distance(bot.x, bot.y, it.x, it.y) < FLEE_RADIUS);

            if let Some(it) = threat {
                // Aim at the point mirrored through the bot, away from IT
                (AiBehavior::Flee, Some((2.0 * bot.x - it.x, 2.0 * bot.y - it.y)))
            } else {
                let star = state.stars().iter().filter(|s| s.active).min_by(|a, b| {
                    distance(bot.x, bot.y, a.x, a.y).total_cmp(&distance(bot.x, bot.y, b.x, b.y))
                });
                match star {
                    Some(s) => (AiBehavior::Collect, Some((s.x, s.y))),
                    None => (AiBehavior::Idle, None),
                }
            }
        };

        if ai_state.behavior != behavior {
            debug!("Bot {} switched to {:?}", bot_id, behavior);
        }
        ai_state.behavior = behavior;
        ai_state.target = target;

        let input = match target {
            Some((tx, ty)) => {
                let (dx, dy) = (tx - bot.x, ty - bot.y);
                let len = (dx * dx + dy * dy).sqrt();
                if len < 1.0 {
                    InputState::idle(now)
                } else {
                    InputState::touch(dx / len, dy / len, now)
                }
            }
            None => InputState::idle(now),
        };
        Some(input)
    }
}
