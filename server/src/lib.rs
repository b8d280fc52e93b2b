//! # Tag Arena Server Library
//!
//! Authoritative server for a real-time multiplayer tag game. One player is
//! "IT" and chases the others across a bounded arena littered with obstacles,
//! power-ups, stars and stun orbs. The server owns the canonical world; clients
//! only send directional intent and render the snapshots they receive.
//!
//! ## Architecture
//!
//! ### Single-Owner Simulation
//! All world mutation happens on one task. Datagrams are decoded on a receiver
//! task and forwarded over a channel, then applied between fixed simulation
//! ticks, so no locks guard the game state.
//!
//! ### Pure Game Loop
//! [`game_loop::GameLoop`] never touches a socket. Every operation returns the
//! messages it wants delivered, which keeps the whole rule set testable with a
//! manual clock.
//!
//! ### Anti-Cheat
//! Inputs are rate limited per player and movement is recomputed on the
//! server. Oversized direction vectors and impossible displacements are
//! corrected and logged rather than trusted.
//!
//! ## Module Organization
//!
//! - `clock`: wall and manual time sources
//! - `entity`: players and collectibles
//! - `game`: the entity store and every rule that mutates it
//! - `movement`: per-tick displacement with obstacle sliding
//! - `anticheat`: input validation and rate limiting
//! - `ai`: server-driven bots
//! - `client_manager`: address bookkeeping for humans
//! - `game_loop`: tick orchestration and message handling
//! - `network`: UDP transport
//! - `config`: validated server settings
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         ai_players: 2,
//!         ..Default::default()
//!     };
//!
//!     let mut server = Server::new(&config).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod ai;
pub mod anticheat;
pub mod client_manager;
pub mod clock;
pub mod config;
pub mod entity;
pub mod game;
pub mod game_loop;
pub mod movement;
pub mod network;
