//! Runtime configuration for the server binary and the rooms it hosts.

use clap::Parser;
use std::time::Duration;

/// Command line arguments of the server.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ServerConfig {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Simulation ticks per second
    #[arg(short, long, default_value = "60")]
    pub tick_rate: u32,

    /// Snapshot broadcasts per second
    #[arg(short, long, default_value = "20")]
    pub broadcast_rate: u32,

    /// Maximum number of connected clients
    #[arg(short, long, default_value = "64")]
    pub max_clients: usize,

    /// Seconds of silence before a client is dropped
    #[arg(long, default_value = "5")]
    pub client_timeout_secs: u64,

    /// Pre-game countdown in milliseconds
    #[arg(long, default_value = "3000")]
    pub countdown_ms: u64,

    /// Game length in milliseconds
    #[arg(long, default_value = "120000")]
    pub game_duration_ms: u64,

    /// Distance at which the tagger tags another player
    #[arg(long, default_value = "40")]
    pub tag_radius: f32,

    /// Milliseconds before the same pair of players can tag each other again
    #[arg(long, default_value = "2000")]
    pub tag_cooldown_ms: u64,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate.max(1)))
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client_timeout_secs)
    }

    pub fn room_config(&self) -> RoomConfig {
        RoomConfig {
            countdown_ms: self.countdown_ms,
            game_duration_ms: self.game_duration_ms,
            broadcast_interval_ms: 1000 / u64::from(self.broadcast_rate.max(1)),
            tag_radius: self.tag_radius,
            tag_cooldown_ms: self.tag_cooldown_ms,
        }
    }
}

/// Timing and tagging parameters of a room.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomConfig {
    pub countdown_ms: u64,
    pub game_duration_ms: u64,
    /// Minimum time between two snapshots.
    pub broadcast_interval_ms: u64,
    pub tag_radius: f32,
    pub tag_cooldown_ms: u64,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            countdown_ms: 3000,
            game_duration_ms: 120_000,
            broadcast_interval_ms: 50,
            tag_radius: 40.0,
            tag_cooldown_ms: 2000,
        }
    }
}
