//! Authoritative room simulation: players, the room state machine and the tick.

use crate::config::RoomConfig;
use crate::error::RoomError;
use crate::tag::{within_tag_radius, TagCooldowns};
use log::{debug, info};
use rand::seq::IteratorRandom;
use rand::Rng;
use shared::{
    default_platforms, spawn_point, Body, InputCommand, InputFlags, Packet, Platform, PlayerView,
    RoomPhase, Snapshot, MAX_NAME_LEN,
};
use std::collections::BTreeMap;

/// A connected player as the server sees it.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: u32,
    pub name: String,
    pub body: Body,
    pub input: InputFlags,
    pub is_tagger: bool,
    /// Spawn slot assigned on join.
    pub slot: usize,
    pub last_received_sequence: u32,
    pub last_processed_sequence: u32,
    pub tagged_ms: u64,
}

impl Player {
    pub fn new(id: u32, name: &str, slot: usize) -> Self {
        let (x, y) = spawn_point(slot);
        Self {
            id,
            name: sanitize_name(name),
            body: Body::new(x, y),
            input: InputFlags::default(),
            is_tagger: false,
            slot,
            last_received_sequence: 0,
            last_processed_sequence: 0,
            tagged_ms: 0,
        }
    }

    pub fn view(&self) -> PlayerView {
        PlayerView {
            id: self.id,
            name: self.name.clone(),
            x: self.body.x,
            y: self.body.y,
            dir: self.body.dir,
            is_tagger: self.is_tagger,
            vx: self.body.vx,
            vy: self.body.vy,
            last_processed_sequence: self.last_processed_sequence,
            tagged_ms: self.tagged_ms,
        }
    }

    /// Applies an input message. Returns false when the message is stale.
    pub fn apply_input(&mut self, command: &InputCommand) -> bool {
        if let Some(sequence) = command.sequence {
            if sequence <= self.last_received_sequence {
                return false;
            }
            self.last_received_sequence = sequence;
        }
        command.apply_to(&mut self.input);
        true
    }
}

fn sanitize_name(name: &str) -> String {
    let trimmed: String = name.trim().chars().take(MAX_NAME_LEN).collect();
    if trimmed.is_empty() {
        "Player".to_string()
    } else {
        trimmed
    }
}

/// Notifications a room emits to its members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    Tagged { tagger_id: u32 },
    PlayerLeft { id: u32 },
    LeaderChanged { leader_id: u32 },
}

impl RoomEvent {
    pub fn to_packet(&self) -> Packet {
        match *self {
            RoomEvent::Tagged { tagger_id } => Packet::Tagged { tagger_id },
            RoomEvent::PlayerLeft { id } => Packet::PlayerLeft { id },
            RoomEvent::LeaderChanged { leader_id } => Packet::LeaderChanged { leader_id },
        }
    }
}

/// One game room. Owns its players exclusively; all mutation goes through the
/// methods below, called from the server's single loop task.
#[derive(Debug)]
pub struct Room {
    code: String,
    config: RoomConfig,
    phase: RoomPhase,
    players: BTreeMap<u32, Player>,
    platforms: Vec<Platform>,
    leader_id: Option<u32>,
    tagger_id: Option<u32>,
    countdown_started_at: Option<u64>,
    game_started_at: Option<u64>,
    cooldowns: TagCooldowns,
    last_tick: u64,
    last_broadcast: Option<u64>,
    events: Vec<RoomEvent>,
}

impl Room {
    pub fn new(code: String, config: RoomConfig, now: u64) -> Self {
        Self {
            code,
            config,
            phase: RoomPhase::Waiting,
            players: BTreeMap::new(),
            platforms: default_platforms(),
            leader_id: None,
            tagger_id: None,
            countdown_started_at: None,
            game_started_at: None,
            cooldowns: TagCooldowns::new(),
            last_tick: now,
            last_broadcast: None,
            events: Vec::new(),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    pub fn leader_id(&self) -> Option<u32> {
        self.leader_id
    }

    pub fn tagger_id(&self) -> Option<u32> {
        self.tagger_id
    }

    pub fn player(&self, id: u32) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn member_ids(&self) -> Vec<u32> {
        self.players.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn platforms(&self) -> &[Platform] {
        &self.platforms
    }

    /// Adds a player at the next free spawn slot. The first player becomes leader.
    pub fn add_player(&mut self, id: u32, name: &str) {
        let slot = (0..)
            .find(|slot| self.players.values().all(|p| p.slot != *slot))
            .unwrap_or(0);
        let player = Player::new(id, name, slot);
        info!(
            "Room {}: player {} ({}) joined at ({}, {})",
            self.code, id, player.name, player.body.x, player.body.y
        );
        self.players.insert(id, player);

        if self.leader_id.is_none() {
            self.leader_id = Some(id);
        }
    }

    /// Removes a player, ending a running game that drops below two players and
    /// handing leadership and the tagger role to remaining players.
    pub fn remove_player(&mut self, id: u32) -> bool {
        if self.players.remove(&id).is_none() {
            return false;
        }
        info!("Room {}: player {} left", self.code, id);
        self.cooldowns.forget_player(id);
        self.events.push(RoomEvent::PlayerLeft { id });

        if self.players.len() < 2 && self.phase == RoomPhase::Running {
            self.end_game();
        }

        if self.leader_id == Some(id) {
            self.leader_id = self.players.keys().next().copied();
            if let Some(leader_id) = self.leader_id {
                info!("Room {}: leadership passed to {}", self.code, leader_id);
                self.events.push(RoomEvent::LeaderChanged { leader_id });
            }
        }

        if self.tagger_id == Some(id) {
            self.tagger_id = None;
            let in_game = matches!(self.phase, RoomPhase::Countdown | RoomPhase::Running);
            if in_game {
                if let Some(next) = self.players.values_mut().next() {
                    next.is_tagger = true;
                    self.tagger_id = Some(next.id);
                    self.events.push(RoomEvent::Tagged { tagger_id: next.id });
                }
            }
        }

        true
    }

    /// Applies an input message from a member. Stale sequences are dropped.
    pub fn apply_input(&mut self, id: u32, command: &InputCommand) -> bool {
        match self.players.get_mut(&id) {
            Some(player) => player.apply_input(command),
            None => false,
        }
    }

    /// Leader request to start a game.
    ///
    /// Fewer than two players, or a game already counting down or running, make
    /// this a silent no-op.
    pub fn start_countdown<R: Rng + ?Sized>(
        &mut self,
        requester: u32,
        now: u64,
        rng: &mut R,
    ) -> Result<(), RoomError> {
        if self.leader_id != Some(requester) {
            return Err(RoomError::NotAuthorized);
        }
        if !matches!(self.phase, RoomPhase::Waiting | RoomPhase::Ended) {
            return Ok(());
        }
        if self.players.len() < 2 {
            debug!("Room {}: start ignored, not enough players", self.code);
            return Ok(());
        }

        self.phase = RoomPhase::Countdown;
        self.countdown_started_at = Some(now);
        self.game_started_at = None;
        self.cooldowns.clear();

        for player in self.players.values_mut() {
            player.is_tagger = false;
            player.tagged_ms = 0;
            let (x, y) = spawn_point(player.slot);
            player.body.respawn(x, y);
        }

        self.tagger_id = self.players.keys().copied().choose(rng);
        if let Some(player) = self.tagger_id.and_then(|id| self.players.get_mut(&id)) {
            player.is_tagger = true;
        }

        info!(
            "Room {}: countdown started, tagger is {:?}",
            self.code, self.tagger_id
        );
        Ok(())
    }

    fn start_game(&mut self, now: u64) {
        self.phase = RoomPhase::Running;
        self.game_started_at = Some(now);
        info!("Room {}: game running", self.code);
    }

    fn end_game(&mut self) {
        if self.phase == RoomPhase::Ended {
            return;
        }
        self.phase = RoomPhase::Ended;
        info!("Room {}: game ended", self.code);
    }

    /// Advances the room to `now` (milliseconds). Returns a snapshot when the
    /// broadcast interval has elapsed.
    pub fn tick(&mut self, now: u64) -> Option<Snapshot> {
        let elapsed_ms = now.saturating_sub(self.last_tick);
        let dt = elapsed_ms as f32 / 1000.0;
        self.last_tick = now;

        if self.phase == RoomPhase::Countdown {
            let started = self.countdown_started_at.unwrap_or(now);
            if now.saturating_sub(started) >= self.config.countdown_ms {
                self.start_game(now);
            }
        }

        if self.phase == RoomPhase::Running {
            let started = self.game_started_at.unwrap_or(now);
            if now.saturating_sub(started) >= self.config.game_duration_ms {
                self.end_game();
            } else if let Some(tagger) = self.tagger_id.and_then(|id| self.players.get_mut(&id)) {
                tagger.tagged_ms += elapsed_ms.min(now.saturating_sub(started));
            }
        }

        self.update_physics(dt);
        self.process_tagging(now);

        let due = self
            .last_broadcast
            .map_or(true, |at| now.saturating_sub(at) > self.config.broadcast_interval_ms);
        if due {
            self.last_broadcast = Some(now);
            Some(self.snapshot(now))
        } else {
            None
        }
    }

    fn update_physics(&mut self, dt: f32) {
        let frozen = self.phase == RoomPhase::Countdown;

        for player in self.players.values_mut() {
            if frozen {
                player.body.freeze();
                player.input.clear_edges();
            } else {
                player
                    .body
                    .step(&mut player.input, player.is_tagger, dt, &self.platforms);
            }
            player.last_processed_sequence = player.last_received_sequence;
        }
    }

    /// Transfers the tagger role to at most one player within reach whose pair
    /// cooldown with the tagger has elapsed.
    fn process_tagging(&mut self, now: u64) {
        if self.phase != RoomPhase::Running {
            return;
        }
        let Some(tagger_id) = self.tagger_id else {
            return;
        };
        let Some(tagger) = self.players.get(&tagger_id) else {
            return;
        };

        let target = self
            .players
            .values()
            .filter(|p| p.id != tagger_id)
            .filter(|p| within_tag_radius(&tagger.body, &p.body, self.config.tag_radius))
            .find(|p| {
                self.cooldowns
                    .is_ready(tagger_id, p.id, now, self.config.tag_cooldown_ms)
            })
            .map(|p| p.id);

        if let Some(target) = target {
            self.transfer_tag(tagger_id, target, now);
        }
    }

    fn transfer_tag(&mut self, from: u32, to: u32, now: u64) {
        if let Some(old) = self.players.get_mut(&from) {
            old.is_tagger = false;
        }
        if let Some(new) = self.players.get_mut(&to) {
            new.is_tagger = true;
        }
        self.tagger_id = Some(to);
        self.cooldowns.record(from, to, now);
        self.events.push(RoomEvent::Tagged { tagger_id: to });
        info!("Room {}: {} tagged {}", self.code, from, to);
    }

    /// Builds the broadcast payload for `now`.
    pub fn snapshot(&self, now: u64) -> Snapshot {
        let countdown_remaining_ms = match (self.phase, self.countdown_started_at) {
            (RoomPhase::Countdown, Some(at)) => self
                .config
                .countdown_ms
                .saturating_sub(now.saturating_sub(at)),
            _ => 0,
        };
        let game_remaining_ms = match (self.phase, self.game_started_at) {
            (RoomPhase::Running, Some(at)) => self
                .config
                .game_duration_ms
                .saturating_sub(now.saturating_sub(at)),
            _ => 0,
        };

        Snapshot {
            server_time: now,
            state: self.phase,
            countdown_remaining_ms,
            game_remaining_ms,
            players: self.players.values().map(Player::view).collect(),
            tagger_id: self.tagger_id,
            platforms: self.platforms.clone(),
            leader_id: self.leader_id,
        }
    }

    /// Takes the notifications produced since the last call.
    pub fn drain_events(&mut self) -> Vec<RoomEvent> {
        std::mem::take(&mut self.events)
    }
}
