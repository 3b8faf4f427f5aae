//! Difficulty presets and gameplay tuning
//!
//! Everything here is fixed at launch; a run never changes its tuning.

use serde::{Deserialize, Serialize};

/// Difficulty preset selected at launch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Normal,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Normal => "normal",
            Difficulty::Hard => "hard",
        }
    }

    /// Parse a dashboard mode string. Anything that isn't "hard" plays normal.
    pub fn from_mode(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "hard" => Difficulty::Hard,
            _ => Difficulty::Normal,
        }
    }

    /// Tuning table for this preset
    pub fn tuning(&self) -> Tuning {
        let base = Tuning::default();
        match self {
            Difficulty::Normal => base,
            Difficulty::Hard => Tuning {
                min_spawn_interval_ms: 450,
                spawn_decrease_ms: 6,
                speed_start: 1.9,
                speed_increment: 0.008,
                ..base
            },
        }
    }
}

/// Spawn pacing, spacing and predictor parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tuning {
    // === Difficulty ramp ===
    /// Starting gap between spawn attempts (ms)
    pub spawn_interval_start_ms: u64,
    /// Floor for the spawn interval (ms)
    pub min_spawn_interval_ms: u64,
    /// Interval shrink per successful spawn (ms)
    pub spawn_decrease_ms: u64,
    /// Starting obstacle speed (pixels/tick)
    pub speed_start: f32,
    /// Speed gain per successful spawn
    pub speed_increment: f32,
    /// Speed ceiling
    pub speed_max: f32,

    // === Fairness spacing ===
    /// A lane is blocked while any obstacle in it is above this row
    pub min_vertical_gap: f32,
    /// Minimum time between two spawns in the same lane (ms)
    pub min_lane_gap_ms: u64,

    // === Lane pairing ===
    /// Spawns before the active pair rotates
    pub pair_duration_spawns: u32,
    /// Hard cap on live obstacles
    pub max_obstacles: usize,

    // === Predictor ===
    pub k_neighbors: usize,
    pub predictor_capacity: usize,
    /// Chance an eligible predicted lane is adopted
    pub prediction_adopt_chance: f64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            spawn_interval_start_ms: 1700,
            min_spawn_interval_ms: 600,
            spawn_decrease_ms: 5,
            speed_start: 1.6,
            speed_increment: 0.007,
            speed_max: crate::consts::MAX_OBSTACLE_SPEED,

            min_vertical_gap: 600.0,
            min_lane_gap_ms: 2000,

            pair_duration_spawns: 4,
            max_obstacles: 6,

            k_neighbors: 3,
            predictor_capacity: 900,
            prediction_adopt_chance: 0.45,
        }
    }
}
