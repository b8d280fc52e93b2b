//! Tick orchestration.
//!
//! [`GameLoop`] serializes every mutation of the [`GameState`]: join, input and
//! leave handlers run to completion between ticks, and each tick advances
//! movement, resolves events and decides what to broadcast. It performs no I/O;
//! the network layer delivers the [`Outbound`] messages it returns.

use crate::ai::AiController;
use crate::anticheat::RateLimiterManager;
use crate::client_manager::{Client, ClientManager};
use crate::clock::SharedClock;
use crate::entity::Player;
use crate::game::GameState;
use crate::movement::MovementEngine;
use log::{debug, info, warn};
use shared::{
    distance, ClientMessage, InputState, PlayerId, ScoreReason, ServerMessage,
    INACTIVITY_SWEEP_INTERVAL_MS, MAX_DELTA_SECS, MAX_NAME_LEN, STUN_DURATION_MS,
    STUN_PULSE_RADIUS, TAG_POINTS,
};
use std::net::SocketAddr;

pub const NOT_ENOUGH_PLAYERS: &str = "Not enough players";

#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Deliver to one address only
    Send {
        addr: SocketAddr,
        message: ServerMessage,
    },
    /// Deliver to every connected client
    Broadcast(ServerMessage),
}

pub struct GameLoop {
    state: GameState,
    clients: ClientManager,
    rate_limiter: RateLimiterManager,
    movement: MovementEngine,
    ai: AiController,
    clock: SharedClock,
    broadcast_interval_ms: u64,
    last_tick_at: u64,
    last_broadcast_at: Option<u64>,
    last_sweep_at: u64,
    tagged_this_tick: bool,
}

impl GameLoop {
    pub fn new(state: GameState, clock: SharedClock, broadcast_interval_ms: u64) -> Self {
        let now = clock.now_ms();
        let max_clients = state.config().max_players;
        Self {
            state,
            clients: ClientManager::new(max_clients),
            rate_limiter: RateLimiterManager::new(),
            movement: MovementEngine::new(),
            ai: AiController::new(),
            clock,
            broadcast_interval_ms,
            last_tick_at: now,
            last_broadcast_at: None,
            last_sweep_at: now,
            tagged_this_tick: false,
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Direct store access for embedding and tests.
    pub fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    pub fn clients(&self) -> &ClientManager {
        &self.clients
    }

    pub fn ai(&self) -> &AiController {
        &self.ai
    }

    pub fn client_addrs(&self) -> Vec<SocketAddr> {
        self.clients
            .get_client_addrs()
            .into_iter()
            .map(|(_, addr)| addr)
            .collect()
    }

    /// Adds up to `count` bots, stopping early if the roster fills up.
    pub fn spawn_ai_players(&mut self, count: usize) -> Vec<PlayerId> {
        let mut spawned = Vec::new();
        for i in 0..count {
            if self.state.is_full() {
                warn!("Roster full, spawned only {} of {} AI players", i, count);
                break;
            }
            let id = self.state.allocate_player_id();
            let (x, y) = self.state.find_safe_spawn_position();
            let player = Player::new_ai(id, format!("Bot {}", i + 1), x, y, self.clock.now_ms());
            if self.state.add_player(player) {
                self.ai.register_bot(id);
                spawned.push(id);
            }
        }
        spawned
    }

    /// Dispatches one decoded datagram.
    pub fn handle_message(&mut self, addr: SocketAddr, message: ClientMessage) -> Vec<Outbound> {
        match message {
            ClientMessage::PlayerJoin { name } => self.handle_join(addr, &name),
            ClientMessage::PlayerInput { input_state } => {
                self.handle_input(addr, input_state);
                Vec::new()
            }
            ClientMessage::PlayerLeave => self.handle_leave(addr),
        }
    }

    pub fn handle_join(&mut self, addr: SocketAddr, name: &str) -> Vec<Outbound> {
        let mut out = Vec::new();

        if let Some(existing) = self.clients.find_client_by_addr(addr) {
            info!("Removing existing player {} from {} before rejoin", existing, addr);
            out.extend(self.drop_player(existing));
        }

        let name = match validate_name(name) {
            Ok(name) => name,
            Err(message) => {
                warn!("Rejected join from {}: {}", addr, message);
                out.push(join_error(addr, message));
                return out;
            }
        };

        if self.state.is_full() {
            warn!("Rejected join from {}: game is full", addr);
            out.push(join_error(addr, "Game is full".to_string()));
            return out;
        }

        let now = self.clock.now_ms();
        let id = self.state.allocate_player_id();
        let (x, y) = self.state.find_safe_spawn_position();
        if !self.clients.add_client(Client::new(id, addr, name.clone(), now)) {
            warn!("Rejected join from {}: no client slot for player {}", addr, id);
            out.push(join_error(addr, "Game is full".to_string()));
            return out;
        }
        if !self.state.add_player(Player::new(id, name, x, y, now)) {
            self.clients.remove_client(&id);
            out.push(join_error(addr, "Game is full".to_string()));
            return out;
        }
        self.rate_limiter.register_player(id);

        out.push(Outbound::Send {
            addr,
            message: ServerMessage::GameJoined {
                player_id: id,
                game_state: self.state.snapshot(),
            },
        });
        out
    }

    /// Admits an input if the sender is known and within its rate limits.
    pub fn handle_input(&mut self, addr: SocketAddr, input: InputState) -> bool {
        let now = self.clock.now_ms();
        let id = match self.clients.touch(addr, now) {
            Some(id) => id,
            None => {
                debug!("Input from unknown address {}", addr);
                return false;
            }
        };

        if let Err(violation) = self.rate_limiter.check_input(id, now) {
            debug!("Dropped input from player {}: {}", id, violation);
            return false;
        }
        self.state.set_player_input(id, input)
    }

    pub fn handle_leave(&mut self, addr: SocketAddr) -> Vec<Outbound> {
        match self.clients.find_client_by_addr(addr) {
            Some(id) => self.drop_player(id),
            None => Vec::new(),
        }
    }

    /// Removes a player from every subsystem and repairs the IT role.
    fn drop_player(&mut self, id: PlayerId) -> Vec<Outbound> {
        let was_active = self.state.is_active();

        self.clients.remove_client(&id);
        self.rate_limiter.unregister_player(id);
        self.ai.unregister_bot(id);
        if !self.state.remove_player(id) {
            return Vec::new();
        }
        self.state.ensure_it_player();

        if was_active && !self.state.is_active() {
            vec![Outbound::Broadcast(ServerMessage::GameEnd {
                reason: NOT_ENOUGH_PLAYERS.to_string(),
            })]
        } else {
            Vec::new()
        }
    }

    /// Runs one simulation step.
    pub fn tick(&mut self) -> Vec<Outbound> {
        let now = self.clock.now_ms();
        let elapsed = now.saturating_sub(self.last_tick_at) as f32 / 1000.0;
        self.last_tick_at = now;
        let dt = if elapsed > MAX_DELTA_SECS {
            debug!(
                "Large delta time detected ({:.3}s), capping to {:.3}s",
                elapsed, MAX_DELTA_SECS
            );
            MAX_DELTA_SECS
        } else {
            elapsed
        };

        self.state.tick = self.state.tick.wrapping_add(1);
        self.tagged_this_tick = false;
        let mut out = Vec::new();

        for id in self.clients.check_timeouts(now) {
            info!("Player {} timed out", id);
            out.extend(self.drop_player(id));
        }

        let humans: Vec<PlayerId> = self
            .state
            .players()
            .filter(|p| !p.is_ai && p.input.is_some())
            .map(|p| p.id)
            .collect();
        for id in humans {
            let outcome = self.movement.advance(&mut self.state, id, dt);
            if outcome.check_events {
                self.process_events(id, &mut out);
            }
        }

        for bot in self.ai.bot_ids() {
            if let Some(input) = self.ai.decide(&self.state, bot, now) {
                self.state.set_player_input(bot, input);
                let outcome = self.movement.advance(&mut self.state, bot, dt);
                if outcome.check_events {
                    self.process_events(bot, &mut out);
                }
            }
        }

        if now.saturating_sub(self.last_sweep_at) >= INACTIVITY_SWEEP_INTERVAL_MS {
            self.last_sweep_at = now;
            for id in self.state.inactive_players(now) {
                info!("Removing inactive player {}", id);
                out.extend(self.drop_player(id));
            }
            self.state.ensure_it_player();
        }

        self.state.update_timers(now);
        self.state.update_animations(dt);
        self.state.process_respawns(now);

        if self.state.is_active() {
            self.state.ensure_it_player();
        }

        if self.state.round_expired(now) {
            let result = self.state.restart_round(now);
            let reason = match result.winner {
                Some((_, name, score)) => format!("Time's up! {} wins with {} points", name, score),
                None => "Time's up!".to_string(),
            };
            out.push(Outbound::Broadcast(ServerMessage::GameEnd { reason }));
        }

        let broadcast_due = self
            .last_broadcast_at
            .map_or(true, |last| now.saturating_sub(last) >= self.broadcast_interval_ms);
        if broadcast_due {
            self.last_broadcast_at = Some(now);
            if !self.clients.is_empty() {
                out.push(Outbound::Broadcast(ServerMessage::GameState(
                    self.state.snapshot(),
                )));
            }
        }

        if self.state.tick % 60 == 0 {
            debug!(
                "Tick {}: {} players ({} clients, {} bots), active={}, IT={:?}",
                self.state.tick,
                self.state.player_count(),
                self.clients.len(),
                self.ai.len(),
                self.state.is_active(),
                self.state.it_player()
            );
        }

        out
    }

    /// Tag and pickup checks for a player that just moved.
    fn process_events(&mut self, id: PlayerId, out: &mut Vec<Outbound>) {
        if !self.state.is_active() {
            return;
        }

        if !self.tagged_this_tick {
            if let Some((tagger, tagged)) = self.try_tag(id) {
                self.tagged_this_tick = true;
                out.push(Outbound::Broadcast(ServerMessage::PlayerTagged {
                    tagger,
                    tagged,
                    new_it: tagged,
                }));
                if let Some(player) = self.state.player(tagger) {
                    out.push(Outbound::Broadcast(ServerMessage::ScoreUpdate {
                        player_id: tagger,
                        player_name: player.name.clone(),
                        score: player.score,
                        change: TAG_POINTS as i64,
                        reason: ScoreReason::Tag,
                    }));
                }
            }
        }

        if let Some(pickup) = self.state.check_star_collision(id) {
            out.push(Outbound::Broadcast(ServerMessage::StarCollected {
                player_id: id,
                star_id: pickup.star_id,
                points: pickup.points,
            }));
            if let Some(player) = self.state.player(id) {
                out.push(Outbound::Broadcast(ServerMessage::ScoreUpdate {
                    player_id: id,
                    player_name: player.name.clone(),
                    score: player.score,
                    change: pickup.points as i64,
                    reason: ScoreReason::Star,
                }));
            }
        }

        if let Some(pickup) = self.state.check_power_up_collision(id) {
            out.push(Outbound::Broadcast(ServerMessage::PowerUpCollected {
                player_id: id,
                power_up_id: pickup.power_up_id,
                kind: pickup.kind,
            }));
        }

        if let Some(pickup) = self.state.check_stun_orb_collision(id) {
            out.push(Outbound::Broadcast(ServerMessage::StunOrbCollected {
                player_id: id,
                orb_id: pickup.orb_id,
                granted: pickup.granted,
            }));
            if pickup.granted {
                self.fire_stun_pulse(id, out);
            }
        }
    }

    /// IT tags the nearest reachable player; a runner gets tagged if IT is touching it.
    fn try_tag(&mut self, id: PlayerId) -> Option<(PlayerId, PlayerId)> {
        let player = self.state.player(id)?;
        if player.is_it {
            let (x, y) = (player.x, player.y);
            let mut candidates: Vec<(f32, PlayerId)> = self
                .state
                .players()
                .filter(|p| p.id != id)
                .map(|p| (distance(x, y, p.x, p.y), p.id))
                .collect();
            candidates.sort_by(|a, b| a.0.total_cmp(&b.0));
            candidates
                .into_iter()
                .map(|(_, target)| target)
                .find(|&target| self.state.tag_player(id, target))
                .map(|target| (id, target))
        } else {
            let it = self.state.it_player()?;
            self.state.tag_player(it, id).then_some((it, id))
        }
    }

    fn fire_stun_pulse(&mut self, it_id: PlayerId, out: &mut Vec<Outbound>) {
        let (x, y, name) = match self.state.player(it_id) {
            Some(p) => (p.x, p.y, p.name.clone()),
            None => return,
        };
        let affected = self.state.execute_stun_pulse(it_id);

        out.push(Outbound::Broadcast(ServerMessage::StunOrbExplosion {
            it_player_id: it_id,
            explosion_x: x,
            explosion_y: y,
            explosion_radius: STUN_PULSE_RADIUS,
            stun_duration: STUN_DURATION_MS,
            affected_players: affected.clone(),
        }));
        out.push(Outbound::Broadcast(ServerMessage::StunPulseActivated {
            it_player_name: name,
            affected_players: affected,
        }));
    }
}

/// Trims a display name and checks its length in characters.
pub fn validate_name(raw: &str) -> Result<String, String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err("Name is required".to_string());
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(format!("Name must be at most {} characters", MAX_NAME_LEN));
    }
    Ok(name.to_string())
}

fn join_error(addr: SocketAddr, message: String) -> Outbound {
    Outbound::Send {
        addr,
        message: ServerMessage::JoinError { message },
    }
}
