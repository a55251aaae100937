use crate::interpolation::RemoteInterpolator;
use crate::prediction::{Predictor, ReconcileConfig};
use log::{debug, info};
use shared::{InputFlags, PlayerView, RoomPhase, Snapshot};

/// How long the "TAG!" banner stays up, in milliseconds.
pub const TAG_FLASH_MS: u64 = 600;

/// A player as it should be drawn this frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPlayer {
    pub id: u32,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub dir: i8,
    pub is_tagger: bool,
    pub is_local: bool,
}

/// Everything the client knows about its room: the latest snapshot, the local
/// prediction and the remote histories.
pub struct ClientGameState {
    pub client_id: Option<u32>,
    pub room_code: Option<String>,
    snapshot: Option<Snapshot>,
    predictor: Predictor,
    interpolator: RemoteInterpolator,
    tag_flash_until: Option<u64>,
}

impl ClientGameState {
    pub fn new(reconcile: ReconcileConfig, interpolation_delay_ms: u64) -> Self {
        Self {
            client_id: None,
            room_code: None,
            snapshot: None,
            predictor: Predictor::new(reconcile),
            interpolator: RemoteInterpolator::new(interpolation_delay_ms),
            tag_flash_until: None,
        }
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    pub fn predictor(&self) -> &Predictor {
        &self.predictor
    }

    pub fn interpolation_delay_ms(&self) -> u64 {
        self.interpolator.delay_ms()
    }

    pub fn phase(&self) -> RoomPhase {
        self.snapshot.as_ref().map_or(RoomPhase::Waiting, |s| s.state)
    }

    pub fn is_leader(&self) -> bool {
        match (&self.snapshot, self.client_id) {
            (Some(snapshot), Some(id)) => snapshot.leader_id == Some(id),
            _ => false,
        }
    }

    pub fn player(&self, id: u32) -> Option<&PlayerView> {
        self.snapshot.as_ref().and_then(|s| s.player(id))
    }

    pub fn tagger_name(&self) -> Option<&str> {
        let snapshot = self.snapshot.as_ref()?;
        let tagger = snapshot.tagger_id?;
        snapshot.player(tagger).map(|p| p.name.as_str())
    }

    /// Called when the server confirms a room. Any previous room's state is dropped.
    pub fn enter_room(&mut self, code: String) {
        info!("Joined room {}", code);
        self.room_code = Some(code);
        self.snapshot = None;
        self.interpolator.clear();
        self.predictor.reset();
        self.tag_flash_until = None;
    }

    pub fn apply_snapshot(&mut self, snapshot: Snapshot, reconciliation_enabled: bool) {
        if let Some(latest) = &self.snapshot {
            if snapshot.server_time < latest.server_time {
                debug!("Dropping out-of-order snapshot {}", snapshot.server_time);
                return;
            }
        }

        if let Some(local) = self.client_id.and_then(|id| snapshot.player(id)) {
            self.predictor.reconcile(local, reconciliation_enabled);
        }
        self.interpolator.push_snapshot(&snapshot, self.client_id);
        self.snapshot = Some(snapshot);
    }

    pub fn apply_tag(&mut self, tagger_id: u32, now_ms: u64) {
        if let Some(snapshot) = self.snapshot.as_mut() {
            snapshot.tagger_id = Some(tagger_id);
            for player in &mut snapshot.players {
                player.is_tagger = player.id == tagger_id;
            }
        }
        self.tag_flash_until = Some(now_ms + TAG_FLASH_MS);
    }

    pub fn remove_player(&mut self, id: u32) {
        self.interpolator.remove(id);
        if let Some(snapshot) = self.snapshot.as_mut() {
            snapshot.players.retain(|p| p.id != id);
            if snapshot.tagger_id == Some(id) {
                snapshot.tagger_id = None;
            }
        }
    }

    pub fn set_leader(&mut self, leader_id: u32) {
        if let Some(snapshot) = self.snapshot.as_mut() {
            snapshot.leader_id = Some(leader_id);
        }
    }

    pub fn tag_flash_active(&self, now_ms: u64) -> bool {
        self.tag_flash_until.is_some_and(|until| now_ms < until)
    }

    pub fn record_input(&mut self, flags: &InputFlags) {
        self.predictor.record_input(flags);
    }

    /// Advances local prediction by one frame.
    pub fn update(&mut self, dt: f32, prediction_enabled: bool) {
        if !prediction_enabled {
            self.predictor.reset();
            return;
        }
        match &self.snapshot {
            Some(snapshot) if snapshot.state == RoomPhase::Countdown => self.predictor.freeze(),
            Some(snapshot) => self.predictor.predict(dt, &snapshot.platforms),
            None => {}
        }
    }

    /// Players to draw this frame. Remote players without enough history are
    /// left out while interpolating.
    pub fn render_players(&self, interpolation_enabled: bool) -> Vec<RenderPlayer> {
        let Some(snapshot) = &self.snapshot else {
            return Vec::new();
        };
        let render_time = self.interpolator.render_time();

        let mut players: Vec<RenderPlayer> = snapshot
            .players
            .iter()
            .filter_map(|player| {
                let is_local = Some(player.id) == self.client_id;
                let latest_tagger = snapshot.tagger_id == Some(player.id);
                let (x, y, dir, is_tagger) = if is_local {
                    let body = self.predictor.body();
                    (body.x, body.y, body.dir, latest_tagger)
                } else if interpolation_enabled {
                    let remote = self.interpolator.sample(player.id, render_time)?;
                    (remote.x, remote.y, remote.dir, remote.is_tagger)
                } else {
                    (player.x, player.y, player.dir, latest_tagger)
                };

                Some(RenderPlayer {
                    id: player.id,
                    name: player.name.clone(),
                    x,
                    y,
                    dir,
                    is_tagger,
                    is_local,
                })
            })
            .collect();

        // Local player last so it is drawn on top.
        players.sort_by_key(|p| p.is_local);
        players
    }

    /// Players ordered by time spent as tagger, least first.
    pub fn results(&self) -> Vec<PlayerView> {
        let mut players = self
            .snapshot
            .as_ref()
            .map(|s| s.players.clone())
            .unwrap_or_default();
        players.sort_by_key(|p| (p.tagged_ms, p.id));
        players
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::default_platforms;

    const LOCAL: u32 = 1;

    fn view(id: u32, x: f32) -> PlayerView {
        PlayerView {
            id,
            name: format!("p{}", id),
            x,
            y: 270.0,
            dir: 1,
            is_tagger: false,
            vx: 0.0,
            vy: 0.0,
            last_processed_sequence: 0,
            tagged_ms: 0,
        }
    }

    fn snapshot(server_time: u64, state: RoomPhase, players: Vec<PlayerView>) -> Snapshot {
        Snapshot {
            server_time,
            state,
            countdown_remaining_ms: 0,
            game_remaining_ms: 0,
            players,
            tagger_id: None,
            platforms: default_platforms(),
            leader_id: Some(LOCAL),
        }
    }

    fn state() -> ClientGameState {
        let mut state = ClientGameState::new(ReconcileConfig::default(), 110);
        state.client_id = Some(LOCAL);
        state.enter_room("ABCDEF".to_string());
        state
    }

    #[test]
    fn test_snapshot_positions_local_player() {
        let mut state = state();
        state.apply_snapshot(
            snapshot(1000, RoomPhase::Waiting, vec![view(1, 400.0), view(2, 520.0)]),
            true,
        );

        let local = state
            .render_players(true)
            .into_iter()
            .find(|p| p.is_local)
            .unwrap();
        assert_eq!(local.x, 400.0);
        assert!(state.is_leader());
        assert_eq!(state.phase(), RoomPhase::Waiting);
    }

    #[test]
    fn test_remote_hidden_until_two_samples() {
        let mut state = state();
        state.apply_snapshot(
            snapshot(1000, RoomPhase::Running, vec![view(1, 400.0), view(2, 500.0)]),
            true,
        );
        assert_eq!(state.render_players(true).len(), 1);
        assert_eq!(state.render_players(false).len(), 2);

        state.apply_snapshot(
            snapshot(1050, RoomPhase::Running, vec![view(1, 400.0), view(2, 600.0)]),
            true,
        );
        let remote = state
            .render_players(true)
            .into_iter()
            .find(|p| p.id == 2)
            .unwrap();
        // Render time 940 is before the first sample.
        assert_approx_eq!(remote.x, 500.0, 1e-4);
    }

    #[test]
    fn test_local_player_rendered_last() {
        let mut state = state();
        for t in [1000, 1050] {
            state.apply_snapshot(
                snapshot(t, RoomPhase::Running, vec![view(1, 400.0), view(2, 500.0)]),
                true,
            );
        }
        let players = state.render_players(true);
        assert!(players.last().unwrap().is_local);
    }

    #[test]
    fn test_remote_facing_lags_with_position() {
        let mut state = state();
        let mut turned = view(2, 540.0);
        turned.dir = -1;
        turned.is_tagger = true;
        let frames = [view(2, 500.0), view(2, 510.0), view(2, 520.0), turned];
        for (i, remote) in frames.into_iter().enumerate() {
            let players = vec![view(1, 400.0), remote];
            let mut snap = snapshot(1000 + i as u64 * 50, RoomPhase::Running, players);
            snap.tagger_id = snap.players.iter().find(|p| p.is_tagger).map(|p| p.id);
            state.apply_snapshot(snap, true);
        }

        // Render time 1040 sits between the first two samples.
        let remote = state
            .render_players(true)
            .into_iter()
            .find(|p| p.id == 2)
            .unwrap();
        assert_approx_eq!(remote.x, 508.0, 1e-4);
        assert_eq!(remote.dir, 1);
        assert!(!remote.is_tagger);

        let latest = state
            .render_players(false)
            .into_iter()
            .find(|p| p.id == 2)
            .unwrap();
        assert_eq!(latest.dir, -1);
        assert!(latest.is_tagger);
    }

    #[test]
    fn test_prediction_moves_local_player() {
        let mut state = state();
        state.apply_snapshot(
            snapshot(1000, RoomPhase::Running, vec![view(1, 400.0)]),
            true,
        );
        state.record_input(&InputFlags {
            right: true,
            ..InputFlags::default()
        });
        state.update(1.0 / 60.0, true);

        assert!(state.predictor().is_active());
        assert!(state.predictor().body().x > 400.0);
    }

    #[test]
    fn test_countdown_freezes_prediction() {
        let mut state = state();
        state.apply_snapshot(
            snapshot(1000, RoomPhase::Countdown, vec![view(1, 400.0)]),
            true,
        );
        state.record_input(&InputFlags {
            right: true,
            ..InputFlags::default()
        });
        state.update(1.0 / 60.0, true);

        assert_eq!(state.predictor().body().x, 400.0);
    }

    #[test]
    fn test_prediction_disabled_follows_server() {
        let mut state = state();
        state.apply_snapshot(
            snapshot(1000, RoomPhase::Running, vec![view(1, 400.0)]),
            true,
        );
        state.record_input(&InputFlags {
            right: true,
            ..InputFlags::default()
        });
        state.update(1.0 / 60.0, false);
        state.apply_snapshot(
            snapshot(1050, RoomPhase::Running, vec![view(1, 403.0)]),
            true,
        );

        assert!(!state.predictor().is_active());
        assert_eq!(state.predictor().body().x, 403.0);
    }

    #[test]
    fn test_out_of_order_snapshot_ignored() {
        let mut state = state();
        state.apply_snapshot(
            snapshot(1050, RoomPhase::Running, vec![view(1, 400.0)]),
            true,
        );
        state.apply_snapshot(snapshot(1000, RoomPhase::Ended, vec![view(1, 400.0)]), true);
        assert_eq!(state.phase(), RoomPhase::Running);
    }

    #[test]
    fn test_tag_event_updates_tagger_and_flash() {
        let mut state = state();
        state.apply_snapshot(
            snapshot(1000, RoomPhase::Running, vec![view(1, 400.0), view(2, 500.0)]),
            true,
        );

        state.apply_tag(2, 5000);

        assert_eq!(state.tagger_name(), Some("p2"));
        assert!(state.player(2).unwrap().is_tagger);
        assert!(state.tag_flash_active(5000 + TAG_FLASH_MS - 1));
        assert!(!state.tag_flash_active(5000 + TAG_FLASH_MS));
    }

    #[test]
    fn test_player_left_purges_history() {
        let mut state = state();
        for t in [1000, 1050] {
            state.apply_snapshot(
                snapshot(t, RoomPhase::Running, vec![view(1, 400.0), view(2, 500.0)]),
                true,
            );
        }
        state.remove_player(2);
        state.set_leader(1);

        assert!(state.player(2).is_none());
        assert_eq!(state.render_players(true).len(), 1);
        assert_eq!(state.render_players(false).len(), 1);
    }

    #[test]
    fn test_results_order_by_tagged_time() {
        let mut state = state();
        let mut a = view(1, 400.0);
        a.tagged_ms = 5000;
        let mut b = view(2, 500.0);
        b.tagged_ms = 1000;
        state.apply_snapshot(snapshot(1000, RoomPhase::Ended, vec![a, b]), true);

        let ids: Vec<u32> = state.results().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }
}
