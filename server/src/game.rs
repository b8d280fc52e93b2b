//! Authoritative entity store.
//!
//! [`GameState`] owns every player, obstacle and collectible. The game loop
//! mutates it only through the named operations below, each of which keeps the
//! structural invariants intact:
//!
//! - while the game is active exactly one player is IT
//! - every player stays inside `[radius, dimension - radius]`
//! - scores never go negative
//! - an IT player performs at most one stun pulse at a time
//! - the roster never exceeds `max_players`, and the game flips between idle
//!   and active when the roster crosses `min_players`
//!
//! Operations are total: unknown ids yield `false` or `None`.

use crate::clock::SharedClock;
use crate::entity::{clamp_axis, Collectible, Player, PowerUp, Star, StunOrb};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use shared::{
    distance, GameSnapshot, InputState, Obstacle, PlayerId, PowerUpKind, GAME_DURATION_MS,
    INACTIVITY_TIMEOUT_MS, IT_STAR_POINTS, MAX_PLAYERS, MIN_PLAYERS, NO_INPUT_GRACE_MS,
    OBSTACLE_COUNT, PLAYER_RADIUS, POWER_UP_COUNT, POWER_UP_RADIUS, POWER_UP_RESPAWN_MS,
    SHRINK_FACTOR, SHRINK_MS, SPEED_BOOST_MS, SPEED_BOOST_MULTIPLIER, STAR_COUNT, STAR_POINTS,
    STAR_RADIUS, STAR_RESPAWN_MS, STAR_ROTATION_SPEED, STUN_DURATION_MS, STUN_ORB_COUNT,
    STUN_ORB_PHASE_SPEED, STUN_ORB_RADIUS, STUN_ORB_RESPAWN_MS, STUN_PULSE_RADIUS,
    TAG_COOLDOWN_MS, TAG_POINTS, TRANSPARENCY_MS, WORLD_HEIGHT, WORLD_WIDTH,
};
use std::collections::BTreeMap;
use std::f32::consts::TAU;

const MAX_SPAWN_ATTEMPTS: usize = 100;
/// Extra clearance kept between a spawn point and obstacles or players.
const SPAWN_MARGIN: f32 = 10.0;
/// Finest grid spacing tried by the fallback scan
const MIN_SCAN_STEP: f32 = 1.0;

#[derive(Debug, Clone)]
pub struct GameConfig {
    pub width: f32,
    pub height: f32,
    pub min_players: usize,
    pub max_players: usize,
    pub game_duration_ms: u64,
    pub obstacle_count: usize,
    pub power_up_count: usize,
    pub star_count: usize,
    pub stun_orb_count: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            width: WORLD_WIDTH,
            height: WORLD_HEIGHT,
            min_players: MIN_PLAYERS,
            max_players: MAX_PLAYERS,
            game_duration_ms: GAME_DURATION_MS,
            obstacle_count: OBSTACLE_COUNT,
            power_up_count: POWER_UP_COUNT,
            star_count: STAR_COUNT,
            stun_orb_count: STUN_ORB_COUNT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectibleKind {
    PowerUp,
    Star,
    StunOrb,
}

impl CollectibleKind {
    fn respawn_interval(self) -> u64 {
        match self {
            CollectibleKind::PowerUp => POWER_UP_RESPAWN_MS,
            CollectibleKind::Star => STAR_RESPAWN_MS,
            CollectibleKind::StunOrb => STUN_ORB_RESPAWN_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RespawnTimer {
    pub kind: CollectibleKind,
    pub id: u32,
    pub respawn_at: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerUpPickup {
    pub power_up_id: u32,
    pub kind: PowerUpKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StarPickup {
    pub star_id: u32,
    pub points: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StunOrbPickup {
    pub orb_id: u32,
    /// Whether the collector gained the stun pulse.
    pub granted: bool,
}

/// Winner of a finished round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundResult {
    pub winner: Option<(PlayerId, String, u32)>,
}

pub struct GameState {
    pub tick: u32,
    players: BTreeMap<PlayerId, Player>,
    obstacles: Vec<Obstacle>,
    power_ups: Vec<PowerUp>,
    stars: Vec<Star>,
    stun_orbs: Vec<StunOrb>,
    respawns: Vec<RespawnTimer>,
    game_active: bool,
    game_start_time: u64,
    next_player_id: PlayerId,
    config: GameConfig,
    clock: SharedClock,
    rng: StdRng,
}

impl GameState {
    /// Creates a store with a freshly generated world.
    pub fn new(config: GameConfig, clock: SharedClock, rng: StdRng) -> Self {
        let mut state = Self::empty(config, clock, rng);
        state.generate_world();
        state
    }

    /// Creates a store with no obstacles or collectibles.
    pub fn empty(config: GameConfig, clock: SharedClock, rng: StdRng) -> Self {
        Self {
            tick: 0,
            players: BTreeMap::new(),
            obstacles: Vec::new(),
            power_ups: Vec::new(),
            stars: Vec::new(),
            stun_orbs: Vec::new(),
            respawns: Vec::new(),
            game_active: false,
            game_start_time: 0,
            next_player_id: 1,
            config,
            clock,
            rng,
        }
    }

    fn generate_world(&mut self) {
        for _ in 0..self.config.obstacle_count {
            let obstacle = if self.rng.gen_bool(0.5) {
                let width = self.rng.gen_range(60.0..200.0);
                let height = self.rng.gen_range(60.0..200.0);
                Obstacle::Rectangle {
                    x: self.rng.gen_range(100.0..(self.config.width - 100.0 - width).max(101.0)),
                    y: self.rng.gen_range(100.0..(self.config.height - 100.0 - height).max(101.0)),
                    width,
                    height,
                }
            } else {
                let radius = self.rng.gen_range(30.0..80.0);
                Obstacle::Circle {
                    x: self.random_coord(radius + 100.0, self.config.width),
                    y: self.random_coord(radius + 100.0, self.config.height),
                    radius,
                }
            };
            self.obstacles.push(obstacle);
        }

        let kinds = [
            PowerUpKind::Speed,
            PowerUpKind::Shrink,
            PowerUpKind::Transparency,
        ];
        for i in 0..self.config.power_up_count {
            let (x, y) = self.find_safe_power_up_position();
            self.add_power_up(x, y, kinds[i % kinds.len()]);
        }
        for _ in 0..self.config.star_count {
            let (x, y) = self.find_safe_star_position();
            self.add_star(x, y);
        }
        for _ in 0..self.config.stun_orb_count {
            let (x, y) = self.find_safe_stun_orb_position();
            self.add_stun_orb(x, y);
        }

        info!(
            "Generated world {}x{}: {} obstacles, {} power-ups, {} stars, {} stun orbs",
            self.config.width,
            self.config.height,
            self.obstacles.len(),
            self.power_ups.len(),
            self.stars.len(),
            self.stun_orbs.len()
        );
    }

    pub fn now(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn width(&self) -> f32 {
        self.config.width
    }

    pub fn height(&self) -> f32 {
        self.config.height
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn is_active(&self) -> bool {
        self.game_active
    }

    pub fn game_start_time(&self) -> u64 {
        self.game_start_time
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.config.max_players
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.players.keys().copied().collect()
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    pub fn power_ups(&self) -> &[PowerUp] {
        &self.power_ups
    }

    pub fn stars(&self) -> &[Star] {
        &self.stars
    }

    pub fn stun_orbs(&self) -> &[StunOrb] {
        &self.stun_orbs
    }

    pub fn it_player(&self) -> Option<PlayerId> {
        self.players.values().find(|p| p.is_it).map(|p| p.id)
    }

    pub fn allocate_player_id(&mut self) -> PlayerId {
        let id = self.next_player_id;
        self.next_player_id += 1;
        id
    }

    pub fn add_obstacle(&mut self, obstacle: Obstacle) {
        self.obstacles.push(obstacle);
    }

    pub fn add_power_up(&mut self, x: f32, y: f32, kind: PowerUpKind) -> u32 {
        let id = self.power_ups.len() as u32 + 1;
        self.power_ups.push(PowerUp {
            id,
            x,
            y,
            radius: POWER_UP_RADIUS,
            kind,
            active: true,
        });
        id
    }

    pub fn add_star(&mut self, x: f32, y: f32) -> u32 {
        let id = self.stars.len() as u32 + 1;
        self.stars.push(Star {
            id,
            x,
            y,
            radius: STAR_RADIUS,
            rotation: 0.0,
            active: true,
        });
        id
    }

    pub fn add_stun_orb(&mut self, x: f32, y: f32) -> u32 {
        let id = self.stun_orbs.len() as u32 + 1;
        self.stun_orbs.push(StunOrb {
            id,
            x,
            y,
            radius: STUN_ORB_RADIUS,
            electric_phase: 0.0,
            active: true,
        });
        id
    }

    /// True when a circle at (x, y) overlaps any obstacle.
    pub fn collides_with_obstacle(&self, x: f32, y: f32, radius: f32) -> bool {
        self.obstacles
            .iter()
            .any(|o| o.intersects_circle(x, y, radius))
    }

    /// Inserts a player. Fails when the roster is full.
    pub fn add_player(&mut self, mut player: Player) -> bool {
        if self.is_full() || self.players.contains_key(&player.id) {
            return false;
        }

        player.is_it = self.players.is_empty();
        player.clamp_to_bounds(self.config.width, self.config.height);
        if player.id >= self.next_player_id {
            self.next_player_id = player.id + 1;
        }

        info!(
            "Added player {} ({}) at ({:.1}, {:.1}){}",
            player.id,
            player.name,
            player.x,
            player.y,
            if player.is_it { " as IT" } else { "" }
        );
        self.players.insert(player.id, player);

        if !self.game_active && self.players.len() >= self.config.min_players {
            self.start_game();
        }
        true
    }

    /// Removes a player, handing IT to a random survivor if needed.
    pub fn remove_player(&mut self, id: PlayerId) -> bool {
        let removed = match self.players.remove(&id) {
            Some(player) => player,
            None => return false,
        };
        info!("Removed player {} ({})", removed.id, removed.name);

        if removed.is_it && !self.players.is_empty() {
            let ids = self.player_ids();
            if let Some(&new_it) = ids.choose(&mut self.rng) {
                if let Some(player) = self.players.get_mut(&new_it) {
                    player.is_it = true;
                    info!("Player {} is now IT after {} left", new_it, id);
                }
            }
        }

        if self.game_active && self.players.len() < self.config.min_players {
            self.game_active = false;
            info!(
                "Game stopped: {} player(s) below minimum of {}",
                self.players.len(),
                self.config.min_players
            );
        }
        true
    }

    fn start_game(&mut self) {
        self.game_active = true;
        self.game_start_time = self.now();
        self.ensure_it_player();
        info!("Game started with {} players", self.players.len());
    }

    /// Repairs the single-IT invariant and returns the IT player.
    ///
    /// No IT: a random player is chosen. Several: the lowest id keeps the role.
    pub fn ensure_it_player(&mut self) -> Option<PlayerId> {
        if self.players.is_empty() {
            return None;
        }

        let its: Vec<PlayerId> = self
            .players
            .values()
            .filter(|p| p.is_it)
            .map(|p| p.id)
            .collect();

        match its.len() {
            0 => {
                let ids = self.player_ids();
                let chosen = *ids.choose(&mut self.rng)?;
                if let Some(player) = self.players.get_mut(&chosen) {
                    player.is_it = true;
                }
                info!("No IT player, assigned player {}", chosen);
                Some(chosen)
            }
            1 => Some(its[0]),
            _ => {
                let keep = its[0];
                for id in &its[1..] {
                    if let Some(player) = self.players.get_mut(id) {
                        player.is_it = false;
                    }
                }
                info!("Multiple IT players, kept player {}", keep);
                Some(keep)
            }
        }
    }

    /// Attempts a tag. On success roles swap and the tagger scores.
    pub fn tag_player(&mut self, tagger_id: PlayerId, target_id: PlayerId) -> bool {
        if tagger_id == target_id {
            return false;
        }
        let now = self.now();
        let (tagger, target) = match (self.players.get(&tagger_id), self.players.get(&target_id)) {
            (Some(tagger), Some(target)) => (tagger, target),
            _ => return false,
        };

        if !tagger.is_it || now < tagger.catch_cooldown_until || !target.is_catchable(now) {
            return false;
        }
        if distance(tagger.x, tagger.y, target.x, target.y) > tagger.radius + target.radius {
            return false;
        }

        if let Some(tagger) = self.players.get_mut(&tagger_id) {
            tagger.is_it = false;
            tagger.tags += 1;
        }
        if let Some(target) = self.players.get_mut(&target_id) {
            target.is_it = true;
            target.catch_cooldown_until = now + TAG_COOLDOWN_MS;
        }
        self.adjust_score(tagger_id, TAG_POINTS as i64);

        info!("Player {} tagged player {}", tagger_id, target_id);
        true
    }

    /// Adds `delta` to a score, flooring at zero. Returns the new score.
    pub fn adjust_score(&mut self, id: PlayerId, delta: i64) -> Option<u32> {
        let player = self.players.get_mut(&id)?;
        let updated = (player.score as i64 + delta).clamp(0, u32::MAX as i64);
        player.score = updated as u32;
        Some(player.score)
    }

    /// Stores the latest intent for a player.
    ///
    /// Only a change of intent counts as activity; repeated keep-alive copies
    /// of the same state do not reset the inactivity timer.
    pub fn set_player_input(&mut self, id: PlayerId, input: InputState) -> bool {
        let now = self.now();
        let player = match self.players.get_mut(&id) {
            Some(player) => player,
            None => return false,
        };

        let changed = match &player.input {
            Some(previous) => !same_intent(previous, &input),
            None => true,
        };
        if changed {
            player.last_input_update = Some(now);
        }
        player.input = Some(input);
        true
    }

    /// Moves a player, clamped to the world bounds. Returns whether it moved.
    pub fn set_player_position(&mut self, id: PlayerId, x: f32, y: f32) -> bool {
        let now = self.now();
        let (width, height) = (self.config.width, self.config.height);
        let player = match self.players.get_mut(&id) {
            Some(player) => player,
            None => return false,
        };

        let new_x = clamp_axis(x, player.radius, width);
        let new_y = clamp_axis(y, player.radius, height);
        let moved = (new_x - player.x).abs() > f32::EPSILON || (new_y - player.y).abs() > f32::EPSILON;
        player.x = new_x;
        player.y = new_y;
        if moved {
            player.last_movement = now;
        }
        moved
    }

    fn touched<T: Collectible>(items: &[T], x: f32, y: f32) -> Option<usize> {
        items.iter().position(|item| {
            let (ix, iy) = item.position();
            item.is_active() && distance(x, y, ix, iy) <= item.radius()
        })
    }

    fn schedule_respawn(&mut self, kind: CollectibleKind, id: u32, now: u64) {
        self.respawns.push(RespawnTimer {
            kind,
            id,
            respawn_at: now + kind.respawn_interval(),
        });
    }

    pub fn check_power_up_collision(&mut self, player_id: PlayerId) -> Option<PowerUpPickup> {
        let now = self.now();
        let (x, y) = self.player(player_id).map(|p| (p.x, p.y))?;
        let index = Self::touched(&self.power_ups, x, y)?;

        let power_up = &mut self.power_ups[index];
        power_up.active = false;
        let pickup = PowerUpPickup {
            power_up_id: power_up.id,
            kind: power_up.kind,
        };
        self.schedule_respawn(CollectibleKind::PowerUp, pickup.power_up_id, now);
        self.apply_power_up(player_id, pickup.kind, now);

        debug!(
            "Player {} collected power-up {} ({:?})",
            player_id, pickup.power_up_id, pickup.kind
        );
        Some(pickup)
    }

    fn apply_power_up(&mut self, player_id: PlayerId, kind: PowerUpKind, now: u64) {
        let player = match self.players.get_mut(&player_id) {
            Some(player) => player,
            None => return,
        };
        match kind {
            PowerUpKind::Speed => {
                player.speed = player.base_speed * SPEED_BOOST_MULTIPLIER;
                player.speed_boost_end_time = now + SPEED_BOOST_MS;
            }
            PowerUpKind::Shrink => {
                player.radius = player.base_radius * SHRINK_FACTOR;
                player.shrink_end_time = now + SHRINK_MS;
            }
            PowerUpKind::Transparency => {
                player.is_transparent = true;
                player.transparency_end_time = now + TRANSPARENCY_MS;
            }
        }
    }

    pub fn check_star_collision(&mut self, player_id: PlayerId) -> Option<StarPickup> {
        let now = self.now();
        let (x, y, is_it) = self.player(player_id).map(|p| (p.x, p.y, p.is_it))?;
        let index = Self::touched(&self.stars, x, y)?;

        self.stars[index].active = false;
        let star_id = self.stars[index].id;
        self.schedule_respawn(CollectibleKind::Star, star_id, now);

        let points = if is_it { IT_STAR_POINTS } else { STAR_POINTS };
        self.adjust_score(player_id, points as i64);

        debug!("Player {} collected star {} (+{})", player_id, star_id, points);
        Some(StarPickup { star_id, points })
    }

    pub fn check_stun_orb_collision(&mut self, player_id: PlayerId) -> Option<StunOrbPickup> {
        let (x, y) = self.player(player_id).map(|p| (p.x, p.y))?;
        let index = Self::touched(&self.stun_orbs, x, y)?;
        let orb_id = self.stun_orbs[index].id;
        let granted = self.collect_stun_orb(player_id, orb_id);
        Some(StunOrbPickup { orb_id, granted })
    }

    /// Consumes an orb. Only an IT player not already pulsing gains the pulse.
    pub fn collect_stun_orb(&mut self, player_id: PlayerId, orb_id: u32) -> bool {
        let now = self.now();
        if !self.players.contains_key(&player_id) {
            return false;
        }
        let orb = match self
            .stun_orbs
            .iter_mut()
            .find(|o| o.id == orb_id && o.active)
        {
            Some(orb) => orb,
            None => return false,
        };
        orb.active = false;
        self.schedule_respawn(CollectibleKind::StunOrb, orb_id, now);

        let player = match self.players.get_mut(&player_id) {
            Some(player) => player,
            None => return false,
        };
        if !player.is_it || player.is_performing_stun_pulse {
            debug!("Player {} consumed stun orb {} without effect", player_id, orb_id);
            return false;
        }

        player.is_performing_stun_pulse = true;
        player.stun_pulse_start_time = now;
        info!("IT player {} charged a stun pulse", player_id);
        true
    }

    /// Stuns every other player within the pulse radius of the IT player.
    pub fn execute_stun_pulse(&mut self, it_id: PlayerId) -> Vec<PlayerId> {
        let now = self.now();
        let (cx, cy) = match self.players.get(&it_id) {
            Some(p) if p.is_it => (p.x, p.y),
            _ => return Vec::new(),
        };

        let mut affected = Vec::new();
        for player in self.players.values_mut() {
            if player.id == it_id {
                continue;
            }
            if distance(cx, cy, player.x, player.y) <= STUN_PULSE_RADIUS {
                player.is_stunned = true;
                player.stun_end_time = now + STUN_DURATION_MS;
                affected.push(player.id);
            }
        }

        info!("Stun pulse from {} hit {} player(s)", it_id, affected.len());
        affected
    }

    /// Clears expired stuns, effects and finished stun pulses.
    pub fn update_timers(&mut self, now: u64) {
        let obstacles = &self.obstacles;
        for player in self.players.values_mut() {
            if player.is_stunned && now >= player.stun_end_time {
                player.is_stunned = false;
            }
            if player.is_transparent && now >= player.transparency_end_time {
                player.is_transparent = false;
            }
            if player.speed != player.base_speed && now >= player.speed_boost_end_time {
                player.speed = player.base_speed;
            }
            // Growing back inside an obstacle would trap the player, so wait until clear.
            if player.radius != player.base_radius
                && now >= player.shrink_end_time
                && !obstacles
                    .iter()
                    .any(|o| o.intersects_circle(player.x, player.y, player.base_radius))
            {
                player.radius = player.base_radius;
                player.clamp_to_bounds(self.config.width, self.config.height);
            }
            if player.is_performing_stun_pulse
                && now >= player.stun_pulse_start_time + player.stun_pulse_duration
            {
                player.is_performing_stun_pulse = false;
            }
        }
    }

    /// Reactivates collectibles whose respawn time has come.
    pub fn process_respawns(&mut self, now: u64) -> usize {
        let (due, pending): (Vec<RespawnTimer>, Vec<RespawnTimer>) = std::mem::take(&mut self.respawns)
            .into_iter()
            .partition(|t| t.respawn_at <= now);
        self.respawns = pending;

        for timer in &due {
            match timer.kind {
                CollectibleKind::PowerUp => {
                    let (x, y) = self.find_safe_power_up_position();
                    respawn(&mut self.power_ups, timer.id, x, y);
                }
                CollectibleKind::Star => {
                    let (x, y) = self.find_safe_star_position();
                    respawn(&mut self.stars, timer.id, x, y);
                }
                CollectibleKind::StunOrb => {
                    let (x, y) = self.find_safe_stun_orb_position();
                    respawn(&mut self.stun_orbs, timer.id, x, y);
                }
            }
        }
        due.len()
    }

    /// Advances star rotation and stun-orb phase, both wrapping at 2π.
    pub fn update_animations(&mut self, dt: f32) {
        for star in &mut self.stars {
            star.rotation = (star.rotation + STAR_ROTATION_SPEED * dt) % TAU;
        }
        for orb in &mut self.stun_orbs {
            orb.electric_phase = (orb.electric_phase + STUN_ORB_PHASE_SPEED * dt) % TAU;
        }
    }

    /// Human players that should be swept for inactivity.
    pub fn inactive_players(&self, now: u64) -> Vec<PlayerId> {
        self.players
            .values()
            .filter(|p| !p.is_ai)
            .filter(|p| match p.last_input_update {
                None => now.saturating_sub(p.joined_at) > NO_INPUT_GRACE_MS,
                Some(last_input) => {
                    let last_activity = last_input.max(p.last_movement);
                    now.saturating_sub(last_activity) > INACTIVITY_TIMEOUT_MS
                }
            })
            .map(|p| p.id)
            .collect()
    }

    /// Seconds left in the round, 0 while idle.
    pub fn time_remaining(&self, now: u64) -> u64 {
        if !self.game_active {
            return 0;
        }
        let elapsed = now.saturating_sub(self.game_start_time);
        let remaining = self.config.game_duration_ms.saturating_sub(elapsed);
        (remaining + 999) / 1000
    }

    pub fn round_expired(&self, now: u64) -> bool {
        self.game_active && now.saturating_sub(self.game_start_time) >= self.config.game_duration_ms
    }

    /// Closes the current round: reports the leader, resets scores, restarts the clock.
    pub fn restart_round(&mut self, now: u64) -> RoundResult {
        let winner = self
            .players
            .values()
            .max_by(|a, b| a.score.cmp(&b.score).then(b.id.cmp(&a.id)))
            .map(|p| (p.id, p.name.clone(), p.score));

        for player in self.players.values_mut() {
            player.score = 0;
            player.tags = 0;
        }
        self.game_start_time = now;
        info!("Round over, winner: {:?}", winner);
        RoundResult { winner }
    }

    fn random_coord(&mut self, margin: f32, dimension: f32) -> f32 {
        if dimension <= margin * 2.0 {
            dimension / 2.0
        } else {
            self.rng.gen_range(margin..(dimension - margin))
        }
    }

    /// Rejection-samples a point clear of obstacles (and optionally players).
    fn find_safe_position(&mut self, radius: f32, avoid_players: bool) -> (f32, f32) {
        let clearance = radius + SPAWN_MARGIN;
        for _ in 0..MAX_SPAWN_ATTEMPTS {
            let x = self.random_coord(radius, self.config.width);
            let y = self.random_coord(radius, self.config.height);

            if self.collides_with_obstacle(x, y, clearance) {
                continue;
            }
            if avoid_players
                && self
                    .players
                    .values()
                    .any(|p| distance(x, y, p.x, p.y) < clearance + p.radius)
            {
                continue;
            }
            return (x, y);
        }

        debug!("No safe position after {} attempts, scanning grid", MAX_SPAWN_ATTEMPTS);
        self.scan_for_free_position(radius)
    }

    /// Deterministic fallback: first grid point free of obstacles, halving the
    /// grid spacing down to a pixel before giving up.
    fn scan_for_free_position(&self, radius: f32) -> (f32, f32) {
        let mut step = (radius * 2.0).max(MIN_SCAN_STEP);
        while step >= MIN_SCAN_STEP {
            let mut y = radius;
            while y <= self.config.height - radius {
                let mut x = radius;
                while x <= self.config.width - radius {
                    if !self.collides_with_obstacle(x, y, radius) {
                        return (x, y);
                    }
                    x += step;
                }
                y += step;
            }
            debug!("Grid scan at {:.1}px found nothing, refining", step);
            step /= 2.0;
        }

        let centre = (self.config.width / 2.0, self.config.height / 2.0);
        warn!(
            "No obstacle-free position for radius {:.1}, falling back to ({:.1}, {:.1})",
            radius, centre.0, centre.1
        );
        centre
    }

    pub fn find_safe_spawn_position(&mut self) -> (f32, f32) {
        self.find_safe_position(PLAYER_RADIUS, true)
    }

    pub fn find_safe_star_position(&mut self) -> (f32, f32) {
        self.find_safe_position(STAR_RADIUS, true)
    }

    pub fn find_safe_stun_orb_position(&mut self) -> (f32, f32) {
        self.find_safe_position(STUN_ORB_RADIUS, true)
    }

    pub fn find_safe_power_up_position(&mut self) -> (f32, f32) {
        self.find_safe_position(POWER_UP_RADIUS, true)
    }

    /// Wire snapshot: active collectibles only, reduced precision.
    pub fn snapshot(&self) -> GameSnapshot {
        let now = self.now();
        GameSnapshot {
            tick: self.tick,
            timestamp: now,
            players: self.players.values().map(Player::snapshot).collect(),
            game_active: self.game_active,
            time_remaining: self.time_remaining(now),
            game_width: self.config.width,
            game_height: self.config.height,
            obstacles: self.obstacles.clone(),
            power_ups: self
                .power_ups
                .iter()
                .filter(|p| p.active)
                .map(PowerUp::snapshot)
                .collect(),
            stars: self
                .stars
                .iter()
                .filter(|s| s.active)
                .map(Star::snapshot)
                .collect(),
            stun_orbs: self
                .stun_orbs
                .iter()
                .filter(|o| o.active)
                .map(StunOrb::snapshot)
                .collect(),
        }
    }
}

fn same_intent(a: &InputState, b: &InputState) -> bool {
    a.up == b.up
        && a.down == b.down
        && a.left == b.left
        && a.right == b.right
        && a.is_touch_active == b.is_touch_active
        && a.touch_x == b.touch_x
        && a.touch_y == b.touch_y
}

fn respawn<T: Collectible>(items: &mut [T], id: u32, x: f32, y: f32) {
    if let Some(item) = items.iter_mut().find(|item| item.id() == id) {
        item.relocate(x, y);
        item.set_active(true);
    }
}
