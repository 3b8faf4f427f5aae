//! Game state and core simulation types
//!
//! Run-scoped state lives in [`GameState`]; `reset` wipes it for a fresh run
//! while keeping per-process settings (lanes, tuning, RNG stream, car color).

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::collision::Rect;
use super::spawn::SpawnScheduler;
use crate::color::Rgb;
use crate::consts::*;
use crate::settings::Tuning;
use crate::{lane_left, lane_width};

/// Current phase of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    /// Active gameplay
    Running,
    /// Player crashed; waiting for a restart request
    GameOver,
}

/// Two adjacent lanes currently allowed to receive spawns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanePair {
    /// Lower lane index; the pair is `(low, low + 1)`
    low: usize,
}

impl LanePair {
    /// Pair starting at `low`. Returns `None` if `low + 1` is not a lane.
    pub fn new(low: usize, lanes: usize) -> Option<Self> {
        (low + 1 < lanes).then_some(Self { low })
    }

    /// Uniformly random adjacent pair
    pub fn random(lanes: usize, rng: &mut impl Rng) -> Self {
        let pairs = lanes.saturating_sub(1).max(1);
        Self {
            low: rng.random_range(0..pairs),
        }
    }

    pub fn lanes(&self) -> [usize; 2] {
        [self.low, self.low + 1]
    }

    pub fn contains(&self, lane: usize) -> bool {
        lane == self.low || lane == self.low + 1
    }
}

/// The player's car
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    /// Lane the car counts as being in (updates once a slide completes)
    pub logical_lane: usize,
    /// Lane the car is sliding toward
    pub target_lane: usize,
    pub current_x: f32,
    pub target_x: f32,
    pub width: f32,
}

impl Player {
    /// Car parked in the middle lane
    pub fn new(lanes: usize) -> Self {
        let width = lane_width(lanes) - PLAYER_WIDTH_OFFSET;
        let lane = lanes / 2;
        let x = lane_left(lane, lanes, width);
        Self {
            logical_lane: lane,
            target_lane: lane,
            current_x: x,
            target_x: x,
            width,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.current_x, PLAYER_Y, self.width, PLAYER_HEIGHT)
    }

    /// True until the slide has landed and the lane change is committed
    pub fn is_sliding(&self) -> bool {
        self.logical_lane != self.target_lane || (self.target_x - self.current_x).abs() > 2.0
    }

    /// Start a slide one lane left (`-1`) or right (`+1`).
    ///
    /// Ignored while a slide is in progress or at the road edge.
    pub fn request_lane_change(&mut self, delta: i32, lanes: usize) -> bool {
        if self.is_sliding() {
            return false;
        }
        let new_lane = (self.logical_lane as i64 + delta as i64).clamp(0, lanes as i64 - 1) as usize;
        if new_lane == self.logical_lane {
            return false;
        }
        self.target_lane = new_lane;
        self.target_x = lane_left(new_lane, lanes, self.width);
        true
    }

    /// Ease toward the target; faster when far away, snaps when close.
    /// The lane is committed on the same update that lands the car.
    pub fn update(&mut self) {
        let dx = self.target_x - self.current_x;
        if dx.abs() >= 0.5 {
            let step = dx.abs().min(PLAYER_SLIDE_SPEED * (1.0 + dx.abs() / 100.0));
            self.current_x += step.copysign(dx);
        }
        if (self.target_x - self.current_x).abs() < 0.5 {
            self.current_x = self.target_x;
            self.logical_lane = self.target_lane;
        }
    }
}

/// An oncoming car
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Obstacle {
    pub id: u32,
    pub lane: usize,
    pub x: f32,
    /// Top edge; grows as the car approaches the player
    pub y: f32,
    pub width: f32,
    /// Pixels per tick, fixed at spawn from the ramp baseline
    pub speed: f32,
    /// Game time (ms) the car was spawned
    pub spawned_at_ms: u64,
}

impl Obstacle {
    pub fn new(id: u32, lane: usize, lanes: usize, speed: f32, spawned_at_ms: u64) -> Self {
        let width = lane_width(lanes) - OBSTACLE_WIDTH_OFFSET;
        Self {
            id,
            lane,
            x: lane_left(lane, lanes, width),
            y: OBSTACLE_SPAWN_Y,
            width,
            speed,
            spawned_at_ms,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, OBSTACLE_HEIGHT)
    }

    pub fn advance(&mut self) {
        self.y += self.speed;
    }

    /// Past the bottom edge (scored)
    pub fn is_cleared(&self) -> bool {
        self.y > OBSTACLE_DESPAWN_Y
    }
}

/// Complete simulation state for one game process
#[derive(Debug, Clone)]
pub struct GameState {
    /// Process seed for reproducibility
    pub seed: u64,
    pub lanes: usize,
    pub tuning: Tuning,
    pub rng: Pcg32,
    pub phase: RunPhase,
    /// Ticks since the run started
    pub time_ticks: u64,
    /// Obstacles passed this run
    pub score: u32,
    pub player: Player,
    /// Live obstacles, in spawn order
    pub obstacles: Vec<Obstacle>,
    pub scheduler: SpawnScheduler,
    /// Car color; survives resets
    pub color: Rgb,
    /// Completed runs in this process
    pub runs_finished: u32,
    next_id: u32,
}

impl GameState {
    pub fn new(seed: u64, lanes: usize, tuning: Tuning, color: Rgb) -> Self {
        let lanes = lanes.clamp(MIN_LANES, MAX_LANES);
        Self {
            seed,
            lanes,
            rng: Pcg32::seed_from_u64(seed),
            phase: RunPhase::Running,
            time_ticks: 0,
            score: 0,
            player: Player::new(lanes),
            obstacles: Vec::new(),
            scheduler: SpawnScheduler::new(lanes, &tuning),
            tuning,
            color,
            runs_finished: 0,
            next_id: 1,
        }
    }

    /// Game time of the current run in milliseconds
    pub fn now_ms(&self) -> u64 {
        (self.time_ticks as f64 * TICK_MS) as u64
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Start a fresh run in place. Color, lanes, tuning and the RNG stream carry over.
    pub fn reset(&mut self) {
        self.phase = RunPhase::Running;
        self.time_ticks = 0;
        self.score = 0;
        self.player = Player::new(self.lanes);
        self.obstacles.clear();
        self.scheduler = SpawnScheduler::new(self.lanes, &self.tuning);
        self.next_id = 1;
    }
}
