//! # Tag Game Server Library
//!
//! Authoritative server for the multiplayer platformer tag game. It owns every
//! room's canonical state, applies client inputs, runs the shared physics step at
//! a fixed tick rate and broadcasts throttled snapshots to room members.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Each room advances its players with [`shared::Body::step`], the same function
//! clients use for prediction. Tag transfers, the countdown and the game timer are
//! decided here only; clients render whatever the server reports.
//!
//! ### Rooms
//! Players create rooms identified by a six character code and share that code
//! with friends. The first player in a room leads it and is the only one who can
//! start a game. A room moves through `waiting`, `countdown`, `running` and
//! `ended`, and can be restarted from `ended`.
//!
//! ### State Broadcasting
//! The simulation ticks at 60 Hz by default, while snapshots are sent at most
//! every 50 ms. Each snapshot carries the last input sequence processed for every
//! player so clients can reconcile their predictions.
//!
//! ## Architecture Design
//!
//! ### Single Owner Event Loop
//! All room state is owned by one loop task. Packet handling and ticks are
//! interleaved with `tokio::select!`, so rooms never need locking.
//!
//! ### UDP-Based Communication
//! Packets are bincode-encoded [`shared::Packet`] values over UDP. Inputs carry
//! full level state plus latched edges, so a lost input is covered by the next one.
//!
//! ## Module Organization
//!
//! - `config`: command line configuration and per-room tuning
//! - `error`: errors returned by room requests
//! - `tag`: proximity test and the pairwise tag-back cooldown
//! - `game`: players and the room state machine
//! - `registry`: room directory, code generation and membership
//! - `client_manager`: connected endpoints and timeouts
//! - `network`: sockets, channels and the main loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use clap::Parser;
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::parse();
//!     let mut server = Server::new(&config).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! The server runs three internal tasks next to the main loop:
//! - **Network Receiver**: decodes incoming datagrams
//! - **Network Sender**: serializes and sends outgoing packets
//! - **Timeout Checker**: drops clients that have been silent too long

pub mod client_manager;
pub mod config;
pub mod error;
pub mod game;
pub mod network;
pub mod registry;
pub mod tag;
