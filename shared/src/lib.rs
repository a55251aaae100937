//! Types and simulation code linked into both the server and the client.
//!
//! Everything that has to produce identical results on both machines lives here:
//! the tuning constants, the platform layout, the per-player simulation step and
//! the wire protocol.

pub mod physics;
pub mod protocol;

pub use physics::{default_platforms, Body, InputFlags, Platform};
pub use protocol::{InputCommand, Packet, PlayerView, RoomPhase, Snapshot};

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Horizontal speed in units per second.
pub const BASE_SPEED: f32 = 220.0;
/// Speed multiplier applied while a player is the tagger.
pub const TAGGER_SPEED_MULT: f32 = 1.08;
/// Initial upward velocity of a jump, units per second.
pub const JUMP_VELOCITY: f32 = 720.0;
/// Downward acceleration, units per second squared.
pub const GRAVITY: f32 = 1400.0;
pub const PLAYER_HEIGHT: f32 = 36.0;
/// Half-width used for horizontal platform overlap.
pub const PLAYER_RADIUS: f32 = PLAYER_HEIGHT / 2.0;

/// Seconds after a jump starts during which holding jump reduces gravity.
pub const JUMP_SUSTAIN: f64 = 0.140;
pub const JUMP_LOW_GRAVITY_FACTOR: f32 = 0.55;
/// Velocity multiplier applied when jump is released while still rising.
pub const JUMP_SHORT_HOP_FACTOR: f32 = 0.35;
/// Grace period after walking off a ledge during which a jump still succeeds.
pub const COYOTE_TIME: f64 = 0.080;
/// How long an early jump press is remembered while airborne.
pub const JUMP_BUFFER: f64 = 0.090;

pub const WORLD_WIDTH: f32 = 1600.0;
/// Upper bound on a single simulation step, in seconds.
pub const MAX_STEP_DT: f32 = 0.05;

/// Main platform surface height and horizontal spawn range.
pub const SPAWN_Y: f32 = 270.0;
pub const SPAWN_X_START: f32 = 400.0;
pub const SPAWN_X_SPACING: f32 = 120.0;
pub const SPAWN_SLOTS: usize = 7;

pub const MAX_NAME_LEN: usize = 16;

/// Bumped whenever the wire format changes.
pub const PROTOCOL_VERSION: u32 = 1;
/// Receive buffer size on both ends.
pub const MAX_PACKET_SIZE: usize = 8192;

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

/// Spawn position for the n-th player slot of a room.
pub fn spawn_point(slot: usize) -> (f32, f32) {
    let x = SPAWN_X_START + (slot % SPAWN_SLOTS) as f32 * SPAWN_X_SPACING;
    (x, SPAWN_Y)
}
