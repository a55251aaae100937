//! Wire messages exchanged between clients and the server.

use crate::physics::{InputFlags, Platform};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle phase of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RoomPhase {
    #[default]
    Waiting,
    Countdown,
    Running,
    Ended,
}

impl RoomPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomPhase::Waiting => "waiting",
            RoomPhase::Countdown => "countdown",
            RoomPhase::Running => "running",
            RoomPhase::Ended => "ended",
        }
    }
}

impl fmt::Display for RoomPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input message sent by a client.
///
/// Every field is optional; absent fields leave the server's previous value in
/// place. `jump_pressed` and `jump_released` mean "at least one edge happened since
/// the last message" and can only set the latched flag, never clear it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputCommand {
    pub left: Option<bool>,
    pub right: Option<bool>,
    pub jump_held: Option<bool>,
    pub jump_pressed: Option<bool>,
    pub jump_released: Option<bool>,
    pub sequence: Option<u32>,
}

impl InputCommand {
    /// Builds a fully populated command from local flags.
    pub fn from_flags(flags: &InputFlags, sequence: u32) -> Self {
        Self {
            left: Some(flags.left),
            right: Some(flags.right),
            jump_held: Some(flags.jump_held),
            jump_pressed: Some(flags.jump_pressed),
            jump_released: Some(flags.jump_released),
            sequence: Some(sequence),
        }
    }

    /// Writes the present fields into `flags`.
    pub fn apply_to(&self, flags: &mut InputFlags) {
        if let Some(left) = self.left {
            flags.left = left;
        }
        if let Some(right) = self.right {
            flags.right = right;
        }
        if let Some(held) = self.jump_held {
            flags.jump_held = held;
        }
        if self.jump_pressed == Some(true) {
            flags.jump_pressed = true;
        }
        if self.jump_released == Some(true) {
            flags.jump_released = true;
        }
    }
}

/// Public view of one player inside a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: u32,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub dir: i8,
    pub is_tagger: bool,
    pub vx: f32,
    pub vy: f32,
    pub last_processed_sequence: u32,
    /// Total time spent as the tagger this game.
    pub tagged_ms: u64,
}

/// Authoritative room state broadcast to every member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub server_time: u64,
    pub state: RoomPhase,
    pub countdown_remaining_ms: u64,
    pub game_remaining_ms: u64,
    pub players: Vec<PlayerView>,
    pub tagger_id: Option<u32>,
    pub platforms: Vec<Platform>,
    pub leader_id: Option<u32>,
}

impl Snapshot {
    pub fn player(&self, id: u32) -> Option<&PlayerView> {
        self.players.iter().find(|p| p.id == id)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    // Client to server
    Connect {
        client_version: u32,
    },
    CreateRoom {
        name: String,
    },
    JoinRoom {
        code: String,
        name: String,
    },
    StartGame {
        code: String,
    },
    Input(InputCommand),
    Ping {
        client_time: u64,
    },
    Disconnect,

    // Server to client
    Connected {
        client_id: u32,
    },
    RoomJoined {
        code: String,
    },
    Rejected {
        reason: String,
    },
    State(Snapshot),
    Tagged {
        tagger_id: u32,
    },
    PlayerLeft {
        id: u32,
    },
    LeaderChanged {
        leader_id: u32,
    },
    Pong {
        client_time: u64,
    },
    Disconnected {
        reason: String,
    },
}
