//! Performance benchmarks for critical game systems

use client::interpolation::{Easing, ReconstructionEngine};
use client::network_quality::NetworkQuality;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use server::anticheat::RateLimiterManager;
use server::clock::{ManualClock, SharedClock};
use server::game::{GameConfig, GameState};
use server::game_loop::GameLoop;
use server::movement::MovementEngine;
use shared::{
    decode_server, encode_server, GameSnapshot, InputState, PlayerSnapshot, ServerMessage,
    MAX_PLAYERS,
};
use std::time::Instant;

fn full_arena() -> (GameLoop, std::sync::Arc<ManualClock>) {
    let clock = ManualClock::new(0);
    let shared_clock: SharedClock = clock.clone();
    let state = GameState::new(
        GameConfig::default(),
        shared_clock.clone(),
        StdRng::seed_from_u64(99),
    );
    let mut game = GameLoop::new(state, shared_clock, shared::BROADCAST_TICK_MS);
    game.spawn_ai_players(MAX_PLAYERS);
    (game, clock)
}

fn synthetic_snapshot(players: usize, offset: f32, timestamp: u64) -> GameSnapshot {
    GameSnapshot {
        tick: 0,
        timestamp,
        players: (1..=players as u32)
            .map(|id| PlayerSnapshot {
                id,
                name: format!("Bot {}", id),
                x: 100.0 + id as f32 * 50.0 + offset,
                y: 300.0 + offset,
                radius: shared::PLAYER_RADIUS,
                color: "#ff6b6b".into(),
                is_it: id == 1,
                is_ai: true,
                is_stunned: false,
                is_transparent: false,
                is_performing_stun_pulse: false,
                score: 0,
                tags: 0,
                sight_range: shared::DEFAULT_SIGHT_RANGE,
            })
            .collect(),
        game_active: true,
        time_remaining: 180,
        game_width: shared::WORLD_WIDTH,
        game_height: shared::WORLD_HEIGHT,
        obstacles: Vec::new(),
        power_ups: Vec::new(),
        stars: Vec::new(),
        stun_orbs: Vec::new(),
    }
}

/// Benchmarks full server ticks with a full roster of bots
#[test]
fn benchmark_server_tick() {
    let (mut game, clock) = full_arena();
    assert_eq!(game.state().player_count(), MAX_PLAYERS);

    let iterations = 1_000;
    let start = Instant::now();

    for _ in 0..iterations {
        clock.advance(shared::SERVER_TICK_MS);
        let _ = game.tick();
    }

    let duration = start.elapsed();
    println!(
        "Server tick: {} ticks in {:?} ({:.2} μs/tick)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // A 16ms budget per tick leaves plenty of headroom at this scale
    assert!(duration.as_millis() < 2_000);
}

/// Benchmarks movement with obstacle resolution
#[test]
fn benchmark_movement_engine() {
    let (mut game, _clock) = full_arena();
    let engine = MovementEngine::new();
    let ids = game.state().player_ids();
    for (i, id) in ids.iter().enumerate() {
        let angle = i as f32;
        game.state_mut()
            .set_player_input(*id, InputState::touch(angle.cos(), angle.sin(), 0));
    }

    let iterations = 10_000;
    let start = Instant::now();

    for i in 0..iterations {
        let id = ids[i % ids.len()];
        let _ = engine.advance(game.state_mut(), id, 1.0 / 60.0);
    }

    let duration = start.elapsed();
    println!(
        "Movement: {} moves in {:?} ({:.2} ns/move)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 1_000);
}

/// Benchmarks snapshot serialization at full roster
#[test]
fn benchmark_snapshot_serialization() {
    let (game, _clock) = full_arena();
    let message = ServerMessage::GameState(game.state().snapshot());

    let iterations = 1_000;
    let start = Instant::now();
    let mut bytes = 0;

    for _ in 0..iterations {
        let encoded = encode_server(&message).unwrap();
        bytes = encoded.len();
        let _ = decode_server(&encoded).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Snapshot codec: {} round trips of {} bytes in {:?} ({:.2} μs/iter)",
        iterations,
        bytes,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(bytes < shared::MAX_DATAGRAM_SIZE);
    assert!(duration.as_millis() < 3_000);
}

/// Benchmarks the rate limiter under a flood of inputs
#[test]
fn stress_test_rate_limiter() {
    let mut limiter = RateLimiterManager::new();
    for id in 1..=MAX_PLAYERS as u32 {
        limiter.register_player(id);
    }

    let iterations = 100_000u64;
    let start = Instant::now();
    let mut accepted = 0;

    for i in 0..iterations {
        let id = (i % MAX_PLAYERS as u64) as u32 + 1;
        if limiter.check_input(id, i / 2).is_ok() {
            accepted += 1;
        }
    }

    let duration = start.elapsed();
    println!(
        "Rate limiter: {} checks in {:?}, {} accepted",
        iterations, duration, accepted
    );

    // 50 simulated seconds, at most 35 inputs per player per second
    assert!(accepted <= 50 * 35 * MAX_PLAYERS as u64 + 35 * MAX_PLAYERS as u64);
    assert!(duration.as_millis() < 1_000);
}

/// Benchmarks reconstruction: snapshot ingestion plus per-frame rendering
#[test]
fn benchmark_client_reconstruction() {
    let mut engine = ReconstructionEngine::with_easing(Easing::Smoothstep);
    let mut rng = StdRng::seed_from_u64(5);

    let snapshots = 1_000;
    let start = Instant::now();
    let mut arrival = 0.0;
    let mut rendered = 0;

    for i in 0..snapshots {
        arrival += 33.0 + rng.gen_range(-8.0..8.0);
        engine.ingest_snapshot(
            &synthetic_snapshot(MAX_PLAYERS, i as f32, i as u64 * 33),
            arrival,
        );
        // Two frames per snapshot at 60fps
        for frame in 0..2 {
            rendered += engine.render(arrival + frame as f64 * 16.0).len();
        }
    }

    let duration = start.elapsed();
    println!(
        "Reconstruction: {} snapshots, {} entity frames in {:?}",
        snapshots, rendered, duration
    );

    assert_eq!(rendered, snapshots * 2 * MAX_PLAYERS);
    assert!(engine.quality().buffer_time() >= 50.0);
    assert!(duration.as_millis() < 1_000);
}

/// Benchmarks jitter estimation
#[test]
fn benchmark_network_quality_updates() {
    let mut quality = NetworkQuality::new();
    let iterations = 100_000;
    let start = Instant::now();

    for i in 0..iterations {
        quality.record_arrival(i as f64 * 33.0);
    }

    let duration = start.elapsed();
    println!(
        "Network quality: {} arrivals in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 1_000);
}
