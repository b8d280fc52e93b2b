//! Client view of the match: the latest authoritative snapshot, the
//! reconstruction buffers and a short feed of recent events for the HUD.

use crate::interpolation::{ReconstructionEngine, RenderedEntity};
use log::{info, warn};
use shared::{GameSnapshot, PlayerId, PlayerSnapshot, ServerMessage, STUN_PULSE_DURATION_MS};
use std::collections::VecDeque;

/// How long a feed line stays on screen
pub const EVENT_LIFETIME_MS: f64 = 4_000.0;
const MAX_EVENTS: usize = 6;

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    Connecting,
    Joined(PlayerId),
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedEvent {
    pub text: String,
    pub at: f64,
}

/// Expanding ring drawn where a stun pulse went off
#[derive(Debug, Clone, PartialEq)]
pub struct Explosion {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub started: f64,
}

impl Explosion {
    /// 0.0 when it starts, 1.0 once it has faded
    pub fn progress(&self, now: f64) -> f32 {
        ((now - self.started) / STUN_PULSE_DURATION_MS as f64).clamp(0.0, 1.0) as f32
    }
}

pub struct ClientGameState {
    status: ConnectionStatus,
    latest: Option<GameSnapshot>,
    engine: ReconstructionEngine,
    events: VecDeque<FeedEvent>,
    explosions: Vec<Explosion>,
    last_game_end: Option<String>,
}

impl ClientGameState {
    pub fn new() -> Self {
        Self::with_engine(ReconstructionEngine::new())
    }

    pub fn with_engine(engine: ReconstructionEngine) -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            latest: None,
            engine,
            events: VecDeque::new(),
            explosions: Vec::new(),
            last_game_end: None,
        }
    }

    /// Applies one server message received at `now` (client ms).
    pub fn apply_server_message(&mut self, message: ServerMessage, now: f64) {
        match message {
            ServerMessage::GameJoined {
                player_id,
                game_state,
            } => {
                info!("Joined as player {}", player_id);
                self.status = ConnectionStatus::Joined(player_id);
                self.engine.clear();
                self.apply_snapshot(game_state, now);
            }
            ServerMessage::GameState(snapshot) => self.apply_snapshot(snapshot, now),
            ServerMessage::PlayerTagged { tagger, tagged, .. } => {
                let text = format!("{} tagged {}", self.name_of(tagger), self.name_of(tagged));
                self.push_event(text, now);
            }
            ServerMessage::ScoreUpdate {
                player_name,
                change,
                ..
            } => {
                self.push_event(format!("{} {:+}", player_name, change), now);
            }
            ServerMessage::StarCollected { .. } | ServerMessage::PowerUpCollected { .. } => {}
            ServerMessage::StunOrbCollected {
                player_id, granted, ..
            } => {
                if !granted {
                    let text = format!("{} wasted a stun orb", self.name_of(player_id));
                    self.push_event(text, now);
                }
            }
            ServerMessage::StunOrbExplosion {
                explosion_x,
                explosion_y,
                explosion_radius,
                ..
            } => {
                self.explosions.push(Explosion {
                    x: explosion_x,
                    y: explosion_y,
                    radius: explosion_radius,
                    started: now,
                });
            }
            ServerMessage::StunPulseActivated {
                it_player_name,
                affected_players,
            } => {
                let text = format!(
                    "{} stunned {} player(s)",
                    it_player_name,
                    affected_players.len()
                );
                self.push_event(text, now);
            }
            ServerMessage::GameEnd { reason } => {
                info!("Game ended: {}", reason);
                self.push_event(reason.clone(), now);
                self.last_game_end = Some(reason);
            }
            ServerMessage::JoinError { message } => {
                warn!("Join rejected: {}", message);
                self.status = ConnectionStatus::Rejected(message);
            }
        }
    }

    fn apply_snapshot(&mut self, snapshot: GameSnapshot, now: f64) {
        if snapshot.game_active {
            self.last_game_end = None;
        }
        self.engine.ingest_snapshot(&snapshot, now);
        self.latest = Some(snapshot);
    }

    fn push_event(&mut self, text: String, at: f64) {
        self.events.push_back(FeedEvent { text, at });
        while self.events.len() > MAX_EVENTS {
            self.events.pop_front();
        }
    }

    fn name_of(&self, id: PlayerId) -> String {
        self.player(id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| format!("Player {}", id))
    }

    /// Drops feed lines and explosions that have run their course.
    pub fn prune(&mut self, now: f64) {
        self.events.retain(|e| now - e.at < EVENT_LIFETIME_MS);
        self.explosions.retain(|e| e.progress(now) < 1.0);
    }

    /// Reconstructed positions for this frame
    pub fn render_entities(&self, now: f64) -> Vec<RenderedEntity> {
        self.engine.render(now)
    }

    pub fn status(&self) -> &ConnectionStatus {
        &self.status
    }

    pub fn local_player_id(&self) -> Option<PlayerId> {
        match self.status {
            ConnectionStatus::Joined(id) => Some(id),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> Option<&GameSnapshot> {
        self.latest.as_ref()
    }

    pub fn player(&self, id: PlayerId) -> Option<&PlayerSnapshot> {
        self.latest.as_ref()?.player(id)
    }

    pub fn local_player(&self) -> Option<&PlayerSnapshot> {
        self.player(self.local_player_id()?)
    }

    pub fn it_player(&self) -> Option<&PlayerSnapshot> {
        self.latest.as_ref()?.players.iter().find(|p| p.is_it)
    }

    /// Players ordered by score, best first
    pub fn leaderboard(&self) -> Vec<&PlayerSnapshot> {
        let mut players: Vec<&PlayerSnapshot> = match &self.latest {
            Some(snapshot) => snapshot.players.iter().collect(),
            None => Vec::new(),
        };
        players.sort_by(|a, b| b.score.cmp(&a.score).then(a.id.cmp(&b.id)));
        players
    }

    pub fn events(&self) -> impl Iterator<Item = &FeedEvent> {
        self.events.iter()
    }

    pub fn explosions(&self) -> &[Explosion] {
        &self.explosions
    }

    pub fn last_game_end(&self) -> Option<&str> {
        self.last_game_end.as_deref()
    }

    pub fn engine(&self) -> &ReconstructionEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut ReconstructionEngine {
        &mut self.engine
    }
}

impl Default for ClientGameState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::ScoreReason;

    fn player(id: PlayerId, name: &str, score: u32, is_it: bool) -> PlayerSnapshot {
        PlayerSnapshot {
            id,
            name: name.into(),
            x: 100.0,
            y: 100.0,
            radius: shared::PLAYER_RADIUS,
            color: "#ffffff".into(),
            is_it,
            is_ai: false,
            is_stunned: false,
            is_transparent: false,
            is_performing_stun_pulse: false,
            score,
            tags: 0,
            sight_range: shared::DEFAULT_SIGHT_RANGE,
        }
    }

    fn snapshot(players: Vec<PlayerSnapshot>, game_active: bool) -> GameSnapshot {
        GameSnapshot {
            tick: 1,
            timestamp: 0,
            players,
            game_active,
            time_remaining: 100,
            game_width: shared::WORLD_WIDTH,
            game_height: shared::WORLD_HEIGHT,
            obstacles: Vec::new(),
            power_ups: Vec::new(),
            stars: Vec::new(),
            stun_orbs: Vec::new(),
        }
    }

    #[test]
    fn test_game_joined_sets_local_player() {
        let mut state = ClientGameState::new();
        assert_eq!(state.status(), &ConnectionStatus::Connecting);

        state.apply_server_message(
            ServerMessage::GameJoined {
                player_id: 2,
                game_state: snapshot(vec![player(1, "a", 0, true), player(2, "b", 0, false)], true),
            },
            0.0,
        );

        assert_eq!(state.local_player_id(), Some(2));
        assert_eq!(state.local_player().unwrap().name, "b");
        assert_eq!(state.it_player().unwrap().id, 1);
        assert_eq!(state.render_entities(0.0).len(), 2);
    }

    #[test]
    fn test_join_error_marks_rejected() {
        let mut state = ClientGameState::new();
        state.apply_server_message(
            ServerMessage::JoinError {
                message: "Game is full".into(),
            },
            0.0,
        );
        assert_eq!(
            state.status(),
            &ConnectionStatus::Rejected("Game is full".into())
        );
        assert_eq!(state.local_player_id(), None);
    }

    #[test]
    fn test_events_feed_and_prune() {
        let mut state = ClientGameState::new();
        state.apply_server_message(
            ServerMessage::GameState(snapshot(
                vec![player(1, "alice", 0, true), player(2, "bob", 0, false)],
                true,
            )),
            0.0,
        );
        state.apply_server_message(
            ServerMessage::PlayerTagged {
                tagger: 1,
                tagged: 2,
                new_it: 1,
            },
            10.0,
        );
        state.apply_server_message(
            ServerMessage::ScoreUpdate {
                player_id: 1,
                player_name: "alice".into(),
                score: 100,
                change: 100,
                reason: ScoreReason::Tag,
            },
            10.0,
        );

        let texts: Vec<&str> = state.events().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["alice tagged bob", "alice +100"]);

        state.prune(10.0 + EVENT_LIFETIME_MS);
        assert_eq!(state.events().count(), 0);
    }

    #[test]
    fn test_explosion_lifecycle() {
        let mut state = ClientGameState::new();
        state.apply_server_message(
            ServerMessage::StunOrbExplosion {
                it_player_id: 1,
                explosion_x: 10.0,
                explosion_y: 20.0,
                explosion_radius: shared::STUN_PULSE_RADIUS,
                stun_duration: shared::STUN_DURATION_MS,
                affected_players: vec![2],
            },
            0.0,
        );
        assert_eq!(state.explosions().len(), 1);
        assert!(state.explosions()[0].progress(500.0) > 0.4);

        state.prune(STUN_PULSE_DURATION_MS as f64);
        assert!(state.explosions().is_empty());
    }

    #[test]
    fn test_game_end_cleared_by_active_snapshot() {
        let mut state = ClientGameState::new();
        state.apply_server_message(
            ServerMessage::GameEnd {
                reason: "Not enough players".into(),
            },
            0.0,
        );
        assert_eq!(state.last_game_end(), Some("Not enough players"));

        state.apply_server_message(
            ServerMessage::GameState(snapshot(vec![player(1, "a", 0, false)], false)),
            10.0,
        );
        assert!(state.last_game_end().is_some());

        state.apply_server_message(
            ServerMessage::GameState(snapshot(
                vec![player(1, "a", 0, true), player(2, "b", 0, false)],
                true,
            )),
            20.0,
        );
        assert!(state.last_game_end().is_none());
    }

    #[test]
    fn test_leaderboard_order() {
        let mut state = ClientGameState::new();
        state.apply_server_message(
            ServerMessage::GameState(snapshot(
                vec![
                    player(1, "a", 25, true),
                    player(2, "b", 150, false),
                    player(3, "c", 25, false),
                ],
                true,
            )),
            0.0,
        );
        let order: Vec<PlayerId> = state.leaderboard().iter().map(|p| p.id).collect();
        assert_eq!(order, vec![2, 1, 3]);
    }
}
