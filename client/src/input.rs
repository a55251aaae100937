//! Client input management with sequencing and change detection

use macroquad::prelude::*;
use shared::{InputCommand, InputFlags};
use std::time::{Duration, Instant};

/// Longest gap between two input messages while connected.
pub const INPUT_KEEPALIVE: Duration = Duration::from_millis(16);

/// Raw key state of one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeySample {
    pub left: bool,
    pub right: bool,
    pub jump: bool,
    pub toggle_prediction: bool,
    pub toggle_reconciliation: bool,
    pub toggle_interpolation: bool,
    pub start: bool,
}

impl KeySample {
    /// Reads the keyboard. Supports both WASD and arrow keys.
    pub fn capture() -> Self {
        Self {
            left: is_key_down(KeyCode::A) || is_key_down(KeyCode::Left),
            right: is_key_down(KeyCode::D) || is_key_down(KeyCode::Right),
            jump: is_key_down(KeyCode::Space)
                || is_key_down(KeyCode::W)
                || is_key_down(KeyCode::Up),
            toggle_prediction: is_key_down(KeyCode::Key1),
            toggle_reconciliation: is_key_down(KeyCode::Key2),
            toggle_interpolation: is_key_down(KeyCode::Key3),
            start: is_key_down(KeyCode::Enter),
        }
    }
}

/// Control keys pressed this frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Toggles {
    pub prediction: bool,
    pub reconciliation: bool,
    pub interpolation: bool,
    pub start: bool,
}

/// What one frame of input produced.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameInput {
    pub toggles: Toggles,
    /// Flags for local prediction, including this frame's jump edges.
    pub flags: InputFlags,
    /// Message to send, if any.
    pub command: Option<InputCommand>,
}

/// Turns per-frame key samples into jump edges, toggles and sequenced input
/// messages
pub struct InputManager {
    next_sequence: u32,
    last_sent_flags: Option<InputFlags>,
    last_input_sent: Option<Instant>,
    prev: KeySample,
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            next_sequence: 1,
            last_sent_flags: None,
            last_input_sent: None,
            prev: KeySample::default(),
        }
    }

    /// Sequence number the next message will carry.
    #[cfg(test)]
    fn next_sequence(&self) -> u32 {
        self.next_sequence
    }

    /// Processes one frame. A message is produced when a level changed, a jump
    /// edge happened, or the keep-alive interval elapsed.
    pub fn update(&mut self, keys: KeySample, now: Instant) -> FrameInput {
        let toggles = Toggles {
            prediction: keys.toggle_prediction && !self.prev.toggle_prediction,
            reconciliation: keys.toggle_reconciliation && !self.prev.toggle_reconciliation,
            interpolation: keys.toggle_interpolation && !self.prev.toggle_interpolation,
            start: keys.start && !self.prev.start,
        };

        let flags = InputFlags {
            left: keys.left,
            right: keys.right,
            jump_held: keys.jump,
            jump_pressed: keys.jump && !self.prev.jump,
            jump_released: !keys.jump && self.prev.jump,
        };
        self.prev = keys;

        let levels_changed = self.last_sent_flags.map_or(true, |sent| {
            sent.left != flags.left || sent.right != flags.right || sent.jump_held != flags.jump_held
        });
        let has_edge = flags.jump_pressed || flags.jump_released;
        let keepalive_due = self
            .last_input_sent
            .map_or(true, |at| now.duration_since(at) >= INPUT_KEEPALIVE);

        let command = if levels_changed || has_edge || keepalive_due {
            let command = InputCommand::from_flags(&flags, self.next_sequence);
            self.next_sequence += 1;
            self.last_sent_flags = Some(flags);
            self.last_input_sent = Some(now);
            Some(command)
        } else {
            None
        };

        FrameInput {
            toggles,
            flags,
            command,
        }
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}
