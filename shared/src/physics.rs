//! Per-player platformer simulation shared by the server and client prediction.
//!
//! [`Body::step`] is the single source of truth for movement. It depends only on
//! the body, its input flags, `dt` and the platform list, so running it with the
//! same arguments on two machines yields the same trajectory.

use crate::{
    BASE_SPEED, COYOTE_TIME, GRAVITY, JUMP_BUFFER, JUMP_LOW_GRAVITY_FACTOR, JUMP_SHORT_HOP_FACTOR,
    JUMP_SUSTAIN, JUMP_VELOCITY, MAX_STEP_DT, PLAYER_HEIGHT, PLAYER_RADIUS, TAGGER_SPEED_MULT,
    WORLD_WIDTH,
};
use serde::{Deserialize, Serialize};

/// Static axis-aligned platform. `y` is the underside, `y + h` the walkable top.
/// Positive y is up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Platform {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Height at which feet rest when standing on the platform.
    pub fn top(&self) -> f32 {
        self.y + self.h
    }

    pub fn underside(&self) -> f32 {
        self.y
    }

    /// True when a player centred at `x` horizontally overlaps the platform span.
    pub fn overlaps_x(&self, x: f32) -> bool {
        x + PLAYER_RADIUS > self.x && x - PLAYER_RADIUS < self.x + self.w
    }
}

/// The level every room is created with: ground, the main spawn platform and three
/// upper ledges.
pub fn default_platforms() -> Vec<Platform> {
    vec![
        Platform::new(0.0, 0.0, 1600.0, 40.0),
        Platform::new(300.0, 240.0, 1000.0, 30.0),
        Platform::new(100.0, 420.0, 400.0, 24.0),
        Platform::new(1100.0, 420.0, 400.0, 24.0),
        Platform::new(600.0, 560.0, 400.0, 24.0),
    ]
}

/// Input state consumed by one simulation step.
///
/// `left`, `right` and `jump_held` are levels. `jump_pressed` and `jump_released`
/// are edges: once set they stay set until a step consumes them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputFlags {
    pub left: bool,
    pub right: bool,
    pub jump_held: bool,
    pub jump_pressed: bool,
    pub jump_released: bool,
}

impl InputFlags {
    /// Merges newer flags into this set. Levels are overwritten, edges are OR'd.
    pub fn latch(&mut self, newer: &InputFlags) {
        self.left = newer.left;
        self.right = newer.right;
        self.jump_held = newer.jump_held;
        self.jump_pressed |= newer.jump_pressed;
        self.jump_released |= newer.jump_released;
    }

    pub fn clear_edges(&mut self) {
        self.jump_pressed = false;
        self.jump_released = false;
    }

    pub fn has_movement(&self) -> bool {
        self.left || self.right || self.jump_held || self.jump_pressed
    }
}

/// Kinematic and jump state of one player.
///
/// Times are seconds on the body's own simulation clock, which advances by the
/// clamped `dt` of every step.
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    /// Facing direction, -1 or 1.
    pub dir: i8,
    pub grounded: bool,
    pub clock: f64,
    pub jump_start: Option<f64>,
    pub can_variable_jump: bool,
    pub last_grounded: f64,
    pub buffered_jump: Option<f64>,
}

impl Body {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            dir: 1,
            grounded: false,
            clock: 0.0,
            jump_start: None,
            can_variable_jump: false,
            last_grounded: f64::NEG_INFINITY,
            buffered_jump: None,
        }
    }

    /// Moves the body to `(x, y)` and clears all motion and jump state.
    pub fn respawn(&mut self, x: f32, y: f32) {
        let clock = self.clock;
        *self = Body::new(x, y);
        self.clock = clock;
    }

    /// Stops all motion without integrating; used while a room counts down.
    pub fn freeze(&mut self) {
        self.vx = 0.0;
        self.vy = 0.0;
    }

    /// Whether a jump may start now: on the ground, or inside the coyote window
    /// after walking (not jumping) off a ledge.
    pub fn can_jump(&self, now: f64) -> bool {
        if self.grounded {
            return true;
        }
        let left_ground_by_walking = self.jump_start.map_or(true, |t| t < self.last_grounded);
        left_ground_by_walking && now - self.last_grounded <= COYOTE_TIME
    }

    fn start_jump(&mut self, now: f64) {
        self.vy = JUMP_VELOCITY;
        self.jump_start = Some(now);
        self.can_variable_jump = true;
        self.grounded = false;
        self.buffered_jump = None;
    }

    /// Advances the body by `dt` seconds.
    ///
    /// Edge flags in `input` are cleared once used.
    pub fn step(&mut self, input: &mut InputFlags, is_tagger: bool, dt: f32, platforms: &[Platform]) {
        let dt = dt.clamp(0.0, MAX_STEP_DT);
        self.clock += f64::from(dt);
        let now = self.clock;

        let speed = if is_tagger {
            BASE_SPEED * TAGGER_SPEED_MULT
        } else {
            BASE_SPEED
        };
        let mut vx = 0.0;
        if input.left {
            vx -= speed;
            self.dir = -1;
        }
        if input.right {
            vx += speed;
            self.dir = 1;
        }
        self.vx = vx;

        // Sampled before collision clears the flag, this is what coyote time reads.
        if self.grounded {
            self.last_grounded = now;
        }

        if input.jump_pressed {
            if self.can_jump(now) {
                self.start_jump(now);
            } else {
                self.buffered_jump = Some(now);
            }
        }

        if let Some(pressed_at) = self.buffered_jump {
            if now - pressed_at > JUMP_BUFFER {
                self.buffered_jump = None;
            } else if self.can_jump(now) {
                self.start_jump(now);
            }
        }

        self.apply_gravity(input, now, dt);

        let prev_y = self.y;
        let prev_vy = self.vy;
        self.x += self.vx * dt;
        self.y += self.vy * dt;
        self.x = self.x.clamp(0.0, WORLD_WIDTH);

        self.resolve_platforms(prev_y, prev_vy, platforms);

        input.clear_edges();
    }

    fn apply_gravity(&mut self, input: &InputFlags, now: f64, dt: f32) {
        if self.vy > 0.0 && self.can_variable_jump {
            let elapsed = now - self.jump_start.unwrap_or(now);
            if input.jump_released {
                self.vy *= JUMP_SHORT_HOP_FACTOR;
                self.can_variable_jump = false;
            } else if input.jump_held && elapsed <= JUMP_SUSTAIN {
                self.vy -= GRAVITY * JUMP_LOW_GRAVITY_FACTOR * dt;
            } else {
                self.vy -= GRAVITY * dt;
                self.can_variable_jump = false;
            }
        } else {
            self.vy -= GRAVITY * dt;
            if self.vy <= 0.0 {
                self.can_variable_jump = false;
            }
        }
    }

    /// Swept landing and ceiling tests against every platform, using the position
    /// and velocity from before integration.
    fn resolve_platforms(&mut self, prev_y: f32, prev_vy: f32, platforms: &[Platform]) {
        self.grounded = false;

        for platform in platforms {
            if !platform.overlaps_x(self.x) {
                continue;
            }

            let top = platform.top();
            if prev_vy <= 0.0 && prev_y >= top && self.y < top {
                self.y = top;
                self.vy = 0.0;
                self.grounded = true;
                self.can_variable_jump = false;
                break;
            }

            let underside = platform.underside();
            let head_prev = prev_y + PLAYER_HEIGHT;
            let head_now = self.y + PLAYER_HEIGHT;
            if prev_vy > 0.0 && head_prev <= underside && head_now > underside {
                self.y = underside - PLAYER_HEIGHT;
                self.vy = 0.0;
                self.can_variable_jump = false;
            }
        }
    }
}
