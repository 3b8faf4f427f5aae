//! Online nearest-neighbor lane predictor
//!
//! A tiny k-NN over recent spawn decisions. Each sample maps the features of
//! one spawn (lane, gap since the spawn before it, speed) to the lane chosen
//! by the spawn that followed. It only nudges lane choice and feeds the HUD
//! accuracy readout; it never touches the difficulty ramp.

use std::collections::VecDeque;

/// Normalized feature vector: `[lane, time gap, speed]`, each in [0, 1]
pub type Features = [f32; 3];

/// Gap (ms) at which the time feature saturates
pub const GAP_FEATURE_CAP_MS: u64 = 2000;
/// Speed at which the speed feature saturates
pub const SPEED_FEATURE_CAP: f32 = 10.0;

/// Build the feature vector for a spawn context
pub fn features(prev_lane: usize, lanes: usize, gap_ms: u64, speed: f32) -> Features {
    let lane_span = lanes.saturating_sub(1).max(1) as f32;
    [
        prev_lane as f32 / lane_span,
        gap_ms.min(GAP_FEATURE_CAP_MS) as f32 / GAP_FEATURE_CAP_MS as f32,
        speed.min(SPEED_FEATURE_CAP) / SPEED_FEATURE_CAP,
    ]
}

#[derive(Debug, Clone)]
struct Sample {
    features: Features,
    label: usize,
}

/// Bounded k-nearest-neighbor classifier
#[derive(Debug, Clone)]
pub struct AdaptivePredictor {
    k: usize,
    capacity: usize,
    samples: VecDeque<Sample>,
}

impl AdaptivePredictor {
    pub fn new(k: usize, capacity: usize) -> Self {
        Self {
            k: k.max(1),
            capacity: capacity.max(1),
            samples: VecDeque::with_capacity(capacity.min(1024)),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Add a sample, evicting the oldest once over capacity
    pub fn train(&mut self, features: Features, label: usize) {
        self.samples.push_back(Sample { features, label });
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// Majority label among the k nearest samples.
    ///
    /// Returns `None` with no training data. Ties go to the tied label whose
    /// closest sample is nearest.
    pub fn predict(&self, features: &Features) -> Option<usize> {
        if self.samples.is_empty() {
            return None;
        }

        let mut by_distance: Vec<(f32, usize)> = self
            .samples
            .iter()
            .map(|s| (distance(&s.features, features), s.label))
            .collect();
        // Stable sort keeps insertion order among equal distances
        by_distance.sort_by(|a, b| a.0.total_cmp(&b.0));

        // (label, votes), in order of each label's first (= nearest) appearance
        let mut votes: Vec<(usize, usize)> = Vec::with_capacity(self.k);
        for &(_, label) in by_distance.iter().take(self.k) {
            match votes.iter_mut().find(|(l, _)| *l == label) {
                Some(entry) => entry.1 += 1,
                None => votes.push((label, 1)),
            }
        }

        let best = votes.iter().map(|(_, n)| *n).max()?;
        votes.into_iter().find(|(_, n)| *n == best).map(|(label, _)| label)
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

fn distance(a: &Features, b: &Features) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Running prediction accuracy for the HUD
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PredictionStats {
    /// Predictions consulted (adopted or not)
    pub consulted: u32,
    /// Consulted predictions that matched the lane actually chosen
    pub correct: u32,
    /// Most recent prediction
    pub last: Option<usize>,
}

impl PredictionStats {
    pub fn record(&mut self, predicted: usize, chosen: usize) {
        self.consulted += 1;
        if predicted == chosen {
            self.correct += 1;
        }
        self.last = Some(predicted);
    }

    /// Accuracy in percent, `None` before the first prediction
    pub fn accuracy_pct(&self) -> Option<f32> {
        (self.consulted > 0).then(|| self.correct as f32 / self.consulted as f32 * 100.0)
    }

    /// HUD line, lanes shown 1-based
    pub fn readout(&self) -> String {
        match (self.last, self.accuracy_pct()) {
            (Some(lane), Some(acc)) => {
                format!("AI predicted last: Lane {} | Acc: {:.1}%", lane + 1, acc)
            }
            _ => "AI: N/A".to_string(),
        }
    }
}
