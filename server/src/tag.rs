//! Proximity tagging and the pairwise tag-back cooldown.

use shared::Body;
use std::collections::HashMap;

/// Last tag time of every unordered pair of players.
///
/// Keying on the pair, rather than on the newly tagged player, stops two players
/// from tagging each other back and forth while leaving both free to tag anyone
/// else straight away.
#[derive(Debug, Default, Clone)]
pub struct TagCooldowns {
    last_tag: HashMap<(u32, u32), u64>,
}

impl TagCooldowns {
    pub fn new() -> Self {
        Self::default()
    }

    fn pair_key(a: u32, b: u32) -> (u32, u32) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    /// True when `a` and `b` have never tagged each other, or did so at least
    /// `cooldown_ms` ago.
    pub fn is_ready(&self, a: u32, b: u32, now: u64, cooldown_ms: u64) -> bool {
        match self.last_tag.get(&Self::pair_key(a, b)) {
            Some(&at) => now.saturating_sub(at) >= cooldown_ms,
            None => true,
        }
    }

    pub fn record(&mut self, a: u32, b: u32, now: u64) {
        self.last_tag.insert(Self::pair_key(a, b), now);
    }

    /// Drops every entry involving `id`.
    pub fn forget_player(&mut self, id: u32) {
        self.last_tag.retain(|&(a, b), _| a != id && b != id);
    }

    pub fn clear(&mut self) {
        self.last_tag.clear();
    }

    pub fn len(&self) -> usize {
        self.last_tag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_tag.is_empty()
    }
}

/// Squared distance check between two player positions.
pub fn within_tag_radius(a: &Body, b: &Body, radius: f32) -> bool {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    dx * dx + dy * dy < radius * radius
}
