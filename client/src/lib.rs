//! # Tag Arena Client Library
//!
//! Thin client for the tag arena server. It sends directional intent and draws
//! whatever the server says is true; all game rules live on the server.
//!
//! ## Reconstruction Instead of Prediction
//! Snapshots arrive at the broadcast rate with irregular spacing. Rather than
//! simulate locally, the client renders every entity a little in the past and
//! interpolates between buffered snapshots. The render delay adapts to
//! measured jitter: a steady link keeps it short, a bursty one stretches it.
//! When no newer snapshot exists the last velocity is projected forward for a
//! bounded horizon.
//!
//! ## Module Organization
//!
//! - `network_quality`: arrival jitter, stability and the adaptive delay
//! - `interpolation`: per-entity sample buffers and the reconstruction engine
//! - `game`: client match state fed by server messages
//! - `input`: keyboard and drag capture, paced for the server rate limiter
//! - `network`: UDP connection on its own thread
//! - `rendering`: macroquad drawing
//!
//! ## Usage Example
//!
//! ```rust
//! use client::game::ClientGameState;
//! use shared::ServerMessage;
//!
//! let mut state = ClientGameState::new();
//! state.apply_server_message(
//!     ServerMessage::GameEnd {
//!         reason: "Not enough players".into(),
//!     },
//!     0.0,
//! );
//! assert_eq!(state.last_game_end(), Some("Not enough players"));
//! assert!(state.render_entities(16.0).is_empty());
//! ```

pub mod game;
pub mod input;
pub mod interpolation;
pub mod network;
pub mod network_quality;
pub mod rendering;
