//! Local player prediction with soft reconciliation against server snapshots.

use shared::{Body, InputFlags, Platform, PlayerView};

/// Tuning for how predicted state is pulled toward authoritative state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconcileConfig {
    /// Horizontal divergence tolerated without correction.
    pub dead_zone_x: f32,
    /// Vertical divergence tolerated without correction. Jump timing makes
    /// vertical error noisier, so this is larger than `dead_zone_x`.
    pub dead_zone_y: f32,
    /// Fraction of the gap closed per snapshot.
    pub blend: f32,
    /// Divergence beyond which the local body is moved outright, e.g. after a
    /// respawn.
    pub snap_distance: f32,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            dead_zone_x: 6.0,
            dead_zone_y: 12.0,
            blend: 0.3,
            snap_distance: 200.0,
        }
    }
}

/// Predicted state of the local player.
///
/// Prediction stays off until the player first moves or jumps; until then every
/// snapshot is copied verbatim.
#[derive(Debug, Clone)]
pub struct Predictor {
    body: Body,
    flags: InputFlags,
    is_tagger: bool,
    active: bool,
    config: ReconcileConfig,
}

impl Predictor {
    pub fn new(config: ReconcileConfig) -> Self {
        Self {
            body: Body::new(0.0, 0.0),
            flags: InputFlags::default(),
            is_tagger: false,
            active: false,
            config,
        }
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    #[cfg(test)]
    fn is_tagger(&self) -> bool {
        self.is_tagger
    }

    /// Drops back to the inactive state; the next snapshot is copied verbatim.
    pub fn reset(&mut self) {
        self.active = false;
        self.flags = InputFlags::default();
        let (x, y) = (self.body.x, self.body.y);
        self.body.respawn(x, y);
    }

    /// Latches the flags sampled this frame. The first movement or jump input
    /// turns prediction on.
    pub fn record_input(&mut self, flags: &InputFlags) {
        self.flags.latch(flags);
        if !self.active && flags.has_movement() {
            self.active = true;
        }
    }

    /// Runs one simulation step on the local body when prediction is active.
    pub fn predict(&mut self, dt: f32, platforms: &[Platform]) {
        if !self.active {
            self.flags.clear_edges();
            return;
        }
        self.body
            .step(&mut self.flags, self.is_tagger, dt, platforms);
    }

    /// Holds the body still, mirroring the server during a countdown.
    pub fn freeze(&mut self) {
        self.body.freeze();
        self.flags.clear_edges();
    }

    /// Folds the authoritative view of the local player into the prediction.
    ///
    /// Inactive prediction copies the server state. Active prediction nudges each
    /// axis by `blend` of the gap once the gap leaves its dead zone; with
    /// `correct` off, the prediction is left to drift.
    pub fn reconcile(&mut self, authoritative: &PlayerView, correct: bool) {
        self.is_tagger = authoritative.is_tagger;

        let dx = authoritative.x - self.body.x;
        let dy = authoritative.y - self.body.y;
        let far = dx * dx + dy * dy > self.config.snap_distance * self.config.snap_distance;

        if !self.active || far {
            self.snap_to(authoritative);
            return;
        }
        if !correct {
            return;
        }

        if dx.abs() > self.config.dead_zone_x {
            self.body.x += dx * self.config.blend;
        }
        if dy.abs() > self.config.dead_zone_y {
            self.body.y += dy * self.config.blend;
            if authoritative.vy != 0.0 {
                self.body.vy = authoritative.vy;
            }
        }
    }

    /// Jump state from the local timeline is discarded along with the position.
    fn snap_to(&mut self, authoritative: &PlayerView) {
        self.body.respawn(authoritative.x, authoritative.y);
        self.body.vx = authoritative.vx;
        self.body.vy = authoritative.vy;
        self.body.dir = authoritative.dir;
    }
}
