//! Room directory: creates rooms, routes players to them and ticks them all.

use crate::config::RoomConfig;
use crate::error::RoomError;
use crate::game::{Room, RoomEvent};
use log::info;
use rand::Rng;
use shared::{InputCommand, Snapshot};
use std::collections::HashMap;

/// Characters used in room codes. Visually ambiguous glyphs are left out.
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
pub const ROOM_CODE_LEN: usize = 6;

/// Output of a room for one tick or one membership change.
#[derive(Debug, Clone)]
pub struct RoomUpdate {
    pub code: String,
    /// Players currently in the room.
    pub recipients: Vec<u32>,
    pub snapshot: Option<Snapshot>,
    pub events: Vec<RoomEvent>,
}

/// Every live room, keyed by code, plus the player to room index.
#[derive(Debug)]
pub struct RoomRegistry {
    rooms: HashMap<String, Room>,
    membership: HashMap<u32, String>,
    config: RoomConfig,
}

impl RoomRegistry {
    pub fn new(config: RoomConfig) -> Self {
        Self {
            rooms: HashMap::new(),
            membership: HashMap::new(),
            config,
        }
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn room(&self, code: &str) -> Option<&Room> {
        self.rooms.get(code)
    }

    pub fn room_of(&self, player_id: u32) -> Option<&str> {
        self.membership.get(&player_id).map(String::as_str)
    }

    pub fn members(&self, code: &str) -> Vec<u32> {
        self.rooms
            .get(code)
            .map(Room::member_ids)
            .unwrap_or_default()
    }

    fn generate_code<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        loop {
            let code: String = (0..ROOM_CODE_LEN)
                .map(|_| ROOM_CODE_ALPHABET[rng.gen_range(0..ROOM_CODE_ALPHABET.len())] as char)
                .collect();
            if !self.rooms.contains_key(&code) {
                return code;
            }
        }
    }

    /// Creates a room led by `player_id` and returns its code. A player already
    /// in a room leaves it first; the returned update carries that departure.
    pub fn create_room<R: Rng + ?Sized>(
        &mut self,
        player_id: u32,
        name: &str,
        now: u64,
        rng: &mut R,
    ) -> (String, Option<RoomUpdate>) {
        let left = self.remove_player(player_id);

        let code = self.generate_code(rng);
        let mut room = Room::new(code.clone(), self.config.clone(), now);
        room.add_player(player_id, name);
        self.rooms.insert(code.clone(), room);
        self.membership.insert(player_id, code.clone());

        info!("Room {} created by player {}", code, player_id);
        (code, left)
    }

    /// Adds `player_id` to an existing room. Codes are matched case-insensitively.
    pub fn join_room(
        &mut self,
        player_id: u32,
        code: &str,
        name: &str,
    ) -> Result<(String, Option<RoomUpdate>), RoomError> {
        let code = code.trim().to_ascii_uppercase();
        if !self.rooms.contains_key(&code) {
            return Err(RoomError::NotFound(code));
        }

        let left = if self.room_of(player_id) == Some(code.as_str()) {
            None
        } else {
            self.remove_player(player_id)
        };

        let room = self
            .rooms
            .get_mut(&code)
            .ok_or_else(|| RoomError::NotFound(code.clone()))?;
        if room.player(player_id).is_none() {
            room.add_player(player_id, name);
        }
        self.membership.insert(player_id, code.clone());
        Ok((code, left))
    }

    pub fn start_game<R: Rng + ?Sized>(
        &mut self,
        player_id: u32,
        code: &str,
        now: u64,
        rng: &mut R,
    ) -> Result<(), RoomError> {
        let code = code.trim().to_ascii_uppercase();
        let room = self
            .rooms
            .get_mut(&code)
            .ok_or(RoomError::NotFound(code.clone()))?;
        room.start_countdown(player_id, now, rng)
    }

    /// Routes an input message to the sender's room. Returns false when the
    /// player is in no room or the message was stale.
    pub fn apply_input(&mut self, player_id: u32, command: &InputCommand) -> bool {
        let Some(code) = self.membership.get(&player_id) else {
            return false;
        };
        match self.rooms.get_mut(code) {
            Some(room) => room.apply_input(player_id, command),
            None => false,
        }
    }

    /// Takes a player out of their room, deleting the room if it is left empty.
    pub fn remove_player(&mut self, player_id: u32) -> Option<RoomUpdate> {
        let code = self.membership.remove(&player_id)?;
        let room = self.rooms.get_mut(&code)?;
        room.remove_player(player_id);

        if room.is_empty() {
            self.rooms.remove(&code);
            info!("Room {} closed", code);
            return None;
        }

        Some(RoomUpdate {
            code,
            recipients: room.member_ids(),
            snapshot: None,
            events: room.drain_events(),
        })
    }

    /// Ticks every room and collects what each one has to send.
    pub fn tick(&mut self, now: u64) -> Vec<RoomUpdate> {
        self.rooms
            .values_mut()
            .filter_map(|room| {
                let snapshot = room.tick(now);
                let events = room.drain_events();
                if snapshot.is_none() && events.is_empty() {
                    return None;
                }
                Some(RoomUpdate {
                    code: room.code().to_string(),
                    recipients: room.member_ids(),
                    snapshot,
                    events,
                })
            })
            .collect()
    }
}
