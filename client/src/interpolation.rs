//! Delayed, linearly interpolated rendering of remote players.

use shared::Snapshot;
use std::collections::{HashMap, VecDeque};

/// How far behind the newest snapshot remote players are drawn.
pub const INTERPOLATION_DELAY_MS: u64 = 110;
/// Samples kept per remote player.
pub const MAX_HISTORY: usize = 30;

/// One authoritative position of a remote player.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteSample {
    pub server_time: u64,
    pub x: f32,
    pub y: f32,
    pub dir: i8,
    pub is_tagger: bool,
}

/// Per-player position histories keyed to server time.
#[derive(Debug, Clone)]
pub struct RemoteInterpolator {
    histories: HashMap<u32, VecDeque<RemoteSample>>,
    delay_ms: u64,
    latest_server_time: u64,
}

impl RemoteInterpolator {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            histories: HashMap::new(),
            delay_ms,
            latest_server_time: 0,
        }
    }

    pub fn delay_ms(&self) -> u64 {
        self.delay_ms
    }

    /// Appends a sample. Samples not newer than the player's last one are dropped.
    pub fn push(&mut self, id: u32, sample: RemoteSample) {
        self.latest_server_time = self.latest_server_time.max(sample.server_time);

        let history = self.histories.entry(id).or_default();
        if history
            .back()
            .is_some_and(|last| last.server_time >= sample.server_time)
        {
            return;
        }
        history.push_back(sample);
        while history.len() > MAX_HISTORY {
            history.pop_front();
        }
    }

    /// Records every remote player of a snapshot and forgets players that are no
    /// longer in it.
    pub fn push_snapshot(&mut self, snapshot: &Snapshot, local_id: Option<u32>) {
        self.histories
            .retain(|id, _| snapshot.players.iter().any(|p| p.id == *id));

        for player in snapshot.players.iter().filter(|p| Some(p.id) != local_id) {
            self.push(
                player.id,
                RemoteSample {
                    server_time: snapshot.server_time,
                    x: player.x,
                    y: player.y,
                    dir: player.dir,
                    is_tagger: player.is_tagger,
                },
            );
        }
    }

    pub fn remove(&mut self, id: u32) {
        self.histories.remove(&id);
    }

    pub fn clear(&mut self) {
        self.histories.clear();
        self.latest_server_time = 0;
    }

    #[cfg(test)]
    fn history_len(&self, id: u32) -> usize {
        self.histories.get(&id).map_or(0, VecDeque::len)
    }

    /// Newest server time seen minus the interpolation delay.
    pub fn render_time(&self) -> u64 {
        self.latest_server_time.saturating_sub(self.delay_ms)
    }

    #[cfg(test)]
    fn latest(&self, id: u32) -> Option<&RemoteSample> {
        self.histories.get(&id).and_then(|h| h.back())
    }

    /// State of `id` at `render_time`, or None with fewer than two samples.
    ///
    /// Position is interpolated between the bracketing samples; facing and tagger
    /// status come from whichever of the two is nearer in time.
    pub fn sample(&self, id: u32, render_time: u64) -> Option<RemoteSample> {
        let history = self.histories.get(&id)?;
        if history.len() < 2 {
            return None;
        }

        let mut a = history.front()?;
        let mut b = history.back()?;
        for (older, newer) in history.iter().zip(history.iter().skip(1)) {
            if older.server_time <= render_time && newer.server_time >= render_time {
                a = older;
                b = newer;
                break;
            }
        }

        let span = b.server_time.saturating_sub(a.server_time).max(1) as f64;
        let t = ((render_time as f64 - a.server_time as f64) / span).clamp(0.0, 1.0) as f32;
        let nearer = if t < 0.5 { a } else { b };

        Some(RemoteSample {
            server_time: render_time,
            x: a.x + (b.x - a.x) * t,
            y: a.y + (b.y - a.y) * t,
            dir: nearer.dir,
            is_tagger: nearer.is_tagger,
        })
    }
}

impl Default for RemoteInterpolator {
    fn default() -> Self {
        Self::new(INTERPOLATION_DELAY_MS)
    }
}
