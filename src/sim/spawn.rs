//! Obstacle spawn scheduling
//!
//! Decides when and where new cars appear:
//! - At most one attempt per `spawn_interval`, which shrinks with every spawn
//! - Only lanes of the active adjacent pair are eligible
//! - A lane is skipped while a car in it is still near the top, or while it
//!   was used too recently, so the player always has room to switch lanes
//! - Successful spawns drive the difficulty ramp (speed up, interval down)

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use super::predictor::{self, AdaptivePredictor, PredictionStats};
use super::state::{LanePair, Obstacle};
use crate::settings::Tuning;

/// Outcome of a successful spawn decision
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnDecision {
    pub lane: usize,
    /// Baseline speed the new car gets
    pub speed: f32,
    pub at_ms: u64,
    /// Lane the predictor suggested, if it was consulted
    pub predicted: Option<usize>,
    /// Active pair when the decision was made
    pub pair: LanePair,
}

/// Spawn timing, lane pairing and difficulty ramp for one run
#[derive(Debug, Clone)]
pub struct SpawnScheduler {
    lanes: usize,
    tuning: Tuning,
    /// Current gap between attempts (ms)
    spawn_interval_ms: u64,
    /// Current baseline obstacle speed
    speed: f32,
    last_attempt_ms: u64,
    lane_last_spawn_ms: Vec<Option<u64>>,
    active_pair: Option<LanePair>,
    pair_spawns_left: u32,
    /// Lane of the previous spawn within the current pair window
    last_lane_in_pair: Option<usize>,
    /// (lane, time) of the previous spawn this run
    prev_spawn: Option<(usize, u64)>,
    predictor: AdaptivePredictor,
    stats: PredictionStats,
    total_spawned: u32,
}

impl SpawnScheduler {
    pub fn new(lanes: usize, tuning: &Tuning) -> Self {
        Self {
            lanes,
            tuning: tuning.clone(),
            spawn_interval_ms: tuning.spawn_interval_start_ms,
            speed: tuning.speed_start.min(tuning.speed_max),
            last_attempt_ms: 0,
            lane_last_spawn_ms: vec![None; lanes],
            active_pair: None,
            pair_spawns_left: 0,
            last_lane_in_pair: None,
            prev_spawn: None,
            predictor: AdaptivePredictor::new(tuning.k_neighbors, tuning.predictor_capacity),
            stats: PredictionStats::default(),
            total_spawned: 0,
        }
    }

    pub fn spawn_interval_ms(&self) -> u64 {
        self.spawn_interval_ms
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn active_pair(&self) -> Option<LanePair> {
        self.active_pair
    }

    pub fn stats(&self) -> &PredictionStats {
        &self.stats
    }

    pub fn predictor(&self) -> &AdaptivePredictor {
        &self.predictor
    }

    pub fn total_spawned(&self) -> u32 {
        self.total_spawned
    }

    /// Pick a fresh pair once the current one has used up its spawns
    fn rotate_pair_if_spent(&mut self, rng: &mut impl Rng) -> LanePair {
        match self.active_pair {
            Some(pair) if self.pair_spawns_left > 0 => pair,
            _ => {
                let pair = LanePair::random(self.lanes, rng);
                self.active_pair = Some(pair);
                self.pair_spawns_left = self.tuning.pair_duration_spawns;
                self.last_lane_in_pair = None;
                pair
            }
        }
    }

    /// Lanes of `pair` that pass both spacing rules at `now_ms`
    pub fn eligible_lanes(&self, pair: LanePair, now_ms: u64, obstacles: &[Obstacle]) -> Vec<usize> {
        pair.lanes()
            .into_iter()
            .filter(|&lane| {
                let blocked_by_vertical = obstacles
                    .iter()
                    .any(|ob| ob.lane == lane && ob.y < self.tuning.min_vertical_gap);
                let time_ok = self.lane_last_spawn_ms[lane]
                    .is_none_or(|t| now_ms.saturating_sub(t) >= self.tuning.min_lane_gap_ms);
                !blocked_by_vertical && time_ok
            })
            .collect()
    }

    /// Run one scheduling step. Returns the spawn to perform, if any.
    ///
    /// The caller creates the obstacle with `decision.speed`; the ramp has
    /// already advanced past it when this returns.
    pub fn update(
        &mut self,
        now_ms: u64,
        obstacles: &[Obstacle],
        rng: &mut impl Rng,
    ) -> Option<SpawnDecision> {
        let pair = self.rotate_pair_if_spent(rng);

        if now_ms.saturating_sub(self.last_attempt_ms) < self.spawn_interval_ms {
            return None;
        }
        self.last_attempt_ms = now_ms;

        if obstacles.len() >= self.tuning.max_obstacles {
            return None;
        }

        let candidates = self.eligible_lanes(pair, now_ms, obstacles);
        if candidates.is_empty() {
            return None;
        }

        // Variety: steer away from the lane the pair used last
        let mut lane = match self.last_lane_in_pair {
            Some(last) if candidates.contains(&last) => candidates
                .iter()
                .copied()
                .find(|&l| l != last)
                .unwrap_or(last),
            _ => *candidates.choose(rng)?,
        };

        let mut consulted = None;
        if let Some((prev_lane, prev_ms)) = self.prev_spawn {
            let feats =
                predictor::features(prev_lane, self.lanes, now_ms.saturating_sub(prev_ms), self.speed);
            if let Some(predicted) = self.predictor.predict(&feats) {
                if candidates.contains(&predicted)
                    && rng.random::<f64>() < self.tuning.prediction_adopt_chance
                {
                    lane = predicted;
                }
                consulted = Some(predicted);
            }
            self.predictor.train(feats, lane);
        }
        if let Some(predicted) = consulted {
            self.stats.record(predicted, lane);
        }

        let decision = SpawnDecision {
            lane,
            speed: self.speed,
            at_ms: now_ms,
            predicted: consulted,
            pair,
        };

        self.lane_last_spawn_ms[lane] = Some(now_ms);
        self.last_lane_in_pair = Some(lane);
        self.prev_spawn = Some((lane, now_ms));
        self.pair_spawns_left = self.pair_spawns_left.saturating_sub(1);
        self.total_spawned += 1;
        self.advance_ramp();

        Some(decision)
    }

    /// One step of the difficulty ramp
    fn advance_ramp(&mut self) {
        self.spawn_interval_ms = self
            .spawn_interval_ms
            .saturating_sub(self.tuning.spawn_decrease_ms)
            .max(self.tuning.min_spawn_interval_ms);
        self.speed = (self.speed + self.tuning.speed_increment).min(self.tuning.speed_max);
    }
}
