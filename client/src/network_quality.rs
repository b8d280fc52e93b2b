//! Snapshot arrival statistics and the adaptive render delay derived from them

use std::collections::VecDeque;

/// Arrival intervals kept for jitter estimation
pub const INTERVAL_WINDOW: usize = 20;
pub const DEFAULT_BUFFER_MS: f64 = 100.0;
pub const ADAPTIVE_MIN_MS: f64 = 50.0;
pub const ADAPTIVE_MAX_MS: f64 = 250.0;

const JITTER_WEIGHT: f64 = 2.0;
const STABILITY_BONUS_MS: f64 = 30.0;
const SMOOTHING: f64 = 0.1;
/// Samples retained for the on-screen graph
const HISTORY_LEN: usize = 120;

/// One point on the quality graph
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualitySample {
    pub jitter_ms: f64,
    pub buffer_ms: f64,
}

/// Tracks how regularly snapshots arrive and picks a render delay to match.
///
/// A steady stream keeps the delay near the minimum; bursty delivery pushes it
/// up so the interpolator still finds two samples to blend between.
#[derive(Debug, Clone)]
pub struct NetworkQuality {
    intervals: VecDeque<f64>,
    last_arrival: Option<f64>,
    buffer_time: f64,
    history: VecDeque<QualitySample>,
}

impl NetworkQuality {
    pub fn new() -> Self {
        Self {
            intervals: VecDeque::with_capacity(INTERVAL_WINDOW),
            last_arrival: None,
            buffer_time: DEFAULT_BUFFER_MS,
            history: VecDeque::with_capacity(HISTORY_LEN),
        }
    }

    /// Records a snapshot arriving at `now` (client ms) and nudges the delay.
    pub fn record_arrival(&mut self, now: f64) {
        if let Some(last) = self.last_arrival {
            let interval = now - last;
            // Messages drained in the same frame are one delivery
            if interval == 0.0 {
                return;
            }
            if interval > 0.0 {
                self.intervals.push_back(interval);
                while self.intervals.len() > INTERVAL_WINDOW {
                    self.intervals.pop_front();
                }
            }
        }
        self.last_arrival = Some(now);

        let target = self.target_buffer_time();
        self.buffer_time += (target - self.buffer_time) * SMOOTHING;
        self.buffer_time = self.buffer_time.clamp(ADAPTIVE_MIN_MS, ADAPTIVE_MAX_MS);

        self.history.push_back(QualitySample {
            jitter_ms: self.jitter(),
            buffer_ms: self.buffer_time,
        });
        while self.history.len() > HISTORY_LEN {
            self.history.pop_front();
        }
    }

    pub fn mean_interval(&self) -> f64 {
        if self.intervals.is_empty() {
            return 0.0;
        }
        self.intervals.iter().sum::<f64>() / self.intervals.len() as f64
    }

    /// Standard deviation of the arrival intervals
    pub fn jitter(&self) -> f64 {
        if self.intervals.len() < 2 {
            return 0.0;
        }
        let mean = self.mean_interval();
        let variance = self
            .intervals
            .iter()
            .map(|i| (i - mean) * (i - mean))
            .sum::<f64>()
            / self.intervals.len() as f64;
        variance.sqrt()
    }

    /// 1.0 for perfectly regular delivery, falling toward 0.0 as jitter approaches the mean
    pub fn stability(&self) -> f64 {
        let mean = self.mean_interval();
        if mean <= 0.0 {
            return 1.0;
        }
        (1.0 - self.jitter() / mean).clamp(0.0, 1.0)
    }

    pub fn target_buffer_time(&self) -> f64 {
        (DEFAULT_BUFFER_MS + JITTER_WEIGHT * self.jitter() - STABILITY_BONUS_MS * self.stability())
            .clamp(ADAPTIVE_MIN_MS, ADAPTIVE_MAX_MS)
    }

    pub fn buffer_time(&self) -> f64 {
        self.buffer_time
    }

    pub fn sample_count(&self) -> usize {
        self.intervals.len()
    }

    pub fn history(&self) -> impl Iterator<Item = &QualitySample> {
        self.history.iter()
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for NetworkQuality {
    fn default() -> Self {
        Self::new()
    }
}
