//! # Tag Game Client Library
//!
//! Client-side implementation of the multiplayer platformer tag game: input
//! capture, network communication, local prediction, remote interpolation and
//! rendering.
//!
//! ## Architecture Overview
//!
//! The server is authoritative, so everything here exists to hide latency while
//! staying faithful to what the server reports.
//!
//! ### Client-Side Prediction
//! The local player is simulated every frame with the same
//! [`shared::Body::step`] the server runs. Prediction stays off until the player
//! first moves or jumps, so an idle client simply mirrors the server.
//!
//! ### Soft Reconciliation
//! When a snapshot arrives the predicted position is compared with the
//! authoritative one. Differences inside a small dead zone are ignored; larger
//! ones are closed by a fixed fraction per snapshot instead of snapping, which
//! hides jitter while bounding drift. The vertical dead zone is wider because jump
//! timing makes vertical error noisier.
//!
//! ### Remote Interpolation
//! Other players are drawn a fixed delay behind the newest snapshot, linearly
//! interpolated between the two samples that bracket the render time. This trades
//! a constant 110 ms of visual lag for smooth motion at a 20 Hz broadcast rate.
//!
//! ## Module Organization
//!
//! - `prediction`: local predictor and reconciliation tuning
//! - `interpolation`: per-player position histories
//! - `game`: snapshot and event handling, render list, results
//! - `input`: key sampling, jump edges, sequencing, debug toggles
//! - `network`: socket thread and the frame loop
//! - `rendering`: macroquad drawing and HUD
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::{Client, ClientOptions};
//! use client::prediction::ReconcileConfig;
//!
//! #[macroquad::main("Tag")]
//! async fn main() {
//!     let options = ClientOptions {
//!         name: "Ada".to_string(),
//!         join_code: None,
//!         fake_ping_ms: 0,
//!         interpolation_delay_ms: 110,
//!         reconcile: ReconcileConfig::default(),
//!     };
//!     let mut client = Client::new("127.0.0.1:8080", options).expect("client setup");
//!     client.run().await.expect("client loop");
//! }
//! ```
//!
//! Keys 1, 2 and 3 toggle prediction, reconciliation and interpolation at run
//! time so their effect can be compared side by side.

pub mod game;
pub mod input;
pub mod interpolation;
pub mod network;
pub mod prediction;
pub mod rendering;
