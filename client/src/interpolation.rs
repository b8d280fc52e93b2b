//! Client-side reconstruction of entity motion from server snapshots.
//!
//! Snapshots arrive at the broadcast rate, irregularly, and sometimes not at
//! all. Every entity keeps a short history of positions stamped with the
//! server's send time mapped onto the local clock, so snapshots drained in the
//! same frame keep their original spacing. Each frame renders the world
//! slightly in the past so there is usually a pair of samples to blend
//! between. When the stream runs dry the last known velocity is projected
//! forward for a bounded horizon.
//!
//! The local player goes through the same path. There is no prediction, so
//! the rendered position is always one the server produced.

use crate::network_quality::NetworkQuality;
use log::debug;
use shared::{distance, GameSnapshot, PlayerId, PlayerSnapshot};
use std::collections::{HashMap, VecDeque};

/// Samples kept per entity
pub const BUFFER_CAPACITY: usize = 12;
/// Longest projection past the newest sample
pub const MAX_EXTRAPOLATION_MS: f64 = 150.0;
/// A jump larger than this between consecutive samples is a respawn, not motion
pub const TELEPORT_THRESHOLD: f32 = 150.0;
/// Fraction of a late arrival folded into the server clock offset
const OFFSET_DRIFT: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Easing {
    #[default]
    Linear,
    Smoothstep,
}

impl Easing {
    /// Maps `t` in [0, 1] onto [0, 1].
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::Smoothstep => t * t * (3.0 - 2.0 * t),
        }
    }
}

/// Visual state carried alongside each position
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EntityFlags {
    pub radius: f32,
    pub is_it: bool,
    pub is_stunned: bool,
    pub is_transparent: bool,
    pub is_performing_stun_pulse: bool,
}

impl From<&PlayerSnapshot> for EntityFlags {
    fn from(player: &PlayerSnapshot) -> Self {
        Self {
            radius: player.radius,
            is_it: player.is_it,
            is_stunned: player.is_stunned,
            is_transparent: player.is_transparent,
            is_performing_stun_pulse: player.is_performing_stun_pulse,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub x: f32,
    pub y: f32,
    /// Server send time on the local clock, in ms
    pub timestamp: f64,
    pub flags: EntityFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleSource {
    Interpolated,
    Extrapolated,
    /// Render time outside what the buffer can reconstruct
    Held,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedEntity {
    pub id: PlayerId,
    pub x: f32,
    pub y: f32,
    pub flags: EntityFlags,
    pub source: SampleSource,
}

/// Blends two samples at `render_time`. The result always lies on the segment between them.
pub fn interpolate(before: &Sample, after: &Sample, render_time: f64, easing: Easing) -> (f32, f32) {
    let span = after.timestamp - before.timestamp;
    let t = if span > 0.0 {
        (render_time - before.timestamp) / span
    } else {
        1.0
    };
    let t = easing.apply(t) as f32;
    (
        before.x + (after.x - before.x) * t,
        before.y + (after.y - before.y) * t,
    )
}

/// Projects the velocity between `prev` and `last` forward, at most `MAX_EXTRAPOLATION_MS`.
pub fn extrapolate(prev: &Sample, last: &Sample, render_time: f64) -> (f32, f32) {
    let dt = last.timestamp - prev.timestamp;
    if dt <= 0.0 {
        return (last.x, last.y);
    }
    let vx = f64::from(last.x - prev.x) / dt;
    let vy = f64::from(last.y - prev.y) / dt;
    let horizon = (render_time - last.timestamp).clamp(0.0, MAX_EXTRAPOLATION_MS);
    (
        last.x + (vx * horizon) as f32,
        last.y + (vy * horizon) as f32,
    )
}

#[derive(Debug, Clone, Default)]
pub struct EntityBuffer {
    samples: VecDeque<Sample>,
}

impl EntityBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a sample, replacing the newest one when both share a timestamp.
    /// Returns true when the jump from the previous one reset the buffer.
    pub fn push(&mut self, sample: Sample, teleport_threshold: f32) -> bool {
        if let Some(last) = self.samples.back() {
            if sample.timestamp < last.timestamp {
                return false;
            }
            if sample.timestamp == last.timestamp {
                self.samples.pop_back();
            }
        }

        let mut teleported = false;
        if let Some(last) = self.samples.back() {
            if distance(last.x, last.y, sample.x, sample.y) > teleport_threshold {
                self.samples.clear();
                teleported = true;
            }
        }

        self.samples.push_back(sample);
        while self.samples.len() > BUFFER_CAPACITY {
            self.samples.pop_front();
        }
        teleported
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    pub fn position_at(
        &self,
        render_time: f64,
        easing: Easing,
    ) -> Option<(f32, f32, EntityFlags, SampleSource)> {
        let oldest = self.samples.front()?;
        if render_time < oldest.timestamp {
            return Some((oldest.x, oldest.y, oldest.flags, SampleSource::Held));
        }

        let after_index = self
            .samples
            .iter()
            .position(|s| s.timestamp > render_time);

        match after_index {
            Some(i) if i > 0 => {
                let before = &self.samples[i - 1];
                let after = &self.samples[i];
                let (x, y) = interpolate(before, after, render_time, easing);
                let span = after.timestamp - before.timestamp;
                let nearer = if span > 0.0 && (render_time - before.timestamp) / span < 0.5 {
                    before
                } else {
                    after
                };
                Some((x, y, nearer.flags, SampleSource::Interpolated))
            }
            // Unreachable for i == 0 given the oldest check, kept total
            Some(_) => Some((oldest.x, oldest.y, oldest.flags, SampleSource::Held)),
            None => {
                let len = self.samples.len();
                let last = &self.samples[len - 1];
                if len < 2 {
                    return Some((last.x, last.y, last.flags, SampleSource::Held));
                }
                let prev = &self.samples[len - 2];
                let (x, y) = extrapolate(prev, last, render_time);
                Some((x, y, last.flags, SampleSource::Extrapolated))
            }
        }
    }
}

/// Per-entity buffers plus the adaptive render delay.
pub struct ReconstructionEngine {
    buffers: HashMap<PlayerId, EntityBuffer>,
    quality: NetworkQuality,
    easing: Easing,
    teleport_threshold: f32,
    /// Smoothed `local - server` time, tracking the fastest recent delivery
    clock_offset: Option<f64>,
    last_server_time: Option<u64>,
    last_sample_time: f64,
}

impl ReconstructionEngine {
    pub fn new() -> Self {
        Self {
            buffers: HashMap::new(),
            quality: NetworkQuality::new(),
            easing: Easing::default(),
            teleport_threshold: TELEPORT_THRESHOLD,
            clock_offset: None,
            last_server_time: None,
            last_sample_time: f64::NEG_INFINITY,
        }
    }

    pub fn with_easing(easing: Easing) -> Self {
        Self {
            easing,
            ..Self::new()
        }
    }

    pub fn easing(&self) -> Easing {
        self.easing
    }

    pub fn set_easing(&mut self, easing: Easing) {
        self.easing = easing;
    }

    pub fn quality(&self) -> &NetworkQuality {
        &self.quality
    }

    pub fn render_time(&self, now: f64) -> f64 {
        now - self.quality.buffer_time()
    }

    /// Maps a server timestamp onto the local clock.
    ///
    /// The offset snaps down to any faster delivery and drifts up slowly on
    /// late ones, so a delayed snapshot keeps its place between its neighbours.
    /// Mapped times never run backwards and never exceed `now`.
    fn local_time_of(&mut self, server_time: u64, now: f64) -> f64 {
        if self.last_server_time == Some(server_time) {
            return self.last_sample_time;
        }

        let raw = now - server_time as f64;
        let offset = match self.clock_offset {
            Some(offset) if raw >= offset => offset + (raw - offset) * OFFSET_DRIFT,
            _ => raw,
        };
        self.clock_offset = Some(offset);

        let mapped = (server_time as f64 + offset).max(self.last_sample_time);
        self.last_sample_time = mapped;
        mapped
    }

    /// Folds a snapshot that arrived at `now` into the buffers.
    ///
    /// Entities absent from the snapshot are dropped so a departed player
    /// never lingers on screen. Snapshots older than one already applied are
    /// ignored.
    pub fn ingest_snapshot(&mut self, snapshot: &GameSnapshot, now: f64) {
        if let Some(last) = self.last_server_time {
            if snapshot.timestamp < last {
                debug!(
                    "Ignoring out-of-order snapshot {} (latest {})",
                    snapshot.timestamp, last
                );
                return;
            }
        }

        let repeated = self.last_server_time == Some(snapshot.timestamp);
        let sample_time = self.local_time_of(snapshot.timestamp, now);
        self.last_server_time = Some(snapshot.timestamp);
        if !repeated {
            self.quality.record_arrival(now);
        }

        let before = self.buffers.len();
        self.buffers
            .retain(|id, _| snapshot.players.iter().any(|p| p.id == *id));
        if self.buffers.len() < before {
            debug!("Dropped {} departed entities", before - self.buffers.len());
        }

        for player in &snapshot.players {
            let sample = Sample {
                x: player.x,
                y: player.y,
                timestamp: sample_time,
                flags: EntityFlags::from(player),
            };
            let threshold = self.teleport_threshold;
            let buffer = self.buffers.entry(player.id).or_default();
            if buffer.push(sample, threshold) {
                debug!("Entity {} teleported, buffer reset", player.id);
            }
        }
    }

    pub fn position_of(&self, id: PlayerId, now: f64) -> Option<RenderedEntity> {
        let render_time = self.render_time(now);
        let (x, y, flags, source) = self.buffers.get(&id)?.position_at(render_time, self.easing)?;
        Some(RenderedEntity {
            id,
            x,
            y,
            flags,
            source,
        })
    }

    /// Positions for every known entity, ordered by id.
    pub fn render(&self, now: f64) -> Vec<RenderedEntity> {
        let mut ids: Vec<PlayerId> = self.buffers.keys().copied().collect();
        ids.sort_unstable();
        ids.into_iter()
            .filter_map(|id| self.position_of(id, now))
            .collect()
    }

    pub fn entity_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.buffers.contains_key(&id)
    }

    pub fn buffered_samples(&self, id: PlayerId) -> usize {
        self.buffers.get(&id).map_or(0, EntityBuffer::len)
    }

    pub fn clear(&mut self) {
        self.buffers.clear();
        self.quality.reset();
        self.clock_offset = None;
        self.last_server_time = None;
        self.last_sample_time = f64::NEG_INFINITY;
    }
}

impl Default for ReconstructionEngine {
    fn default() -> Self {
        Self::new()
    }
}
