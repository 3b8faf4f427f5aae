//! Demo driver - steers the car without a human
//!
//! Looks at the cars bearing down on the current lane and slides to the
//! neighbor with the most room. After a crash it waits a moment and asks for
//! a new run, so an unattended game keeps cycling runs (and scores).

use crate::consts::*;
use crate::game::{InputEvent, InputSource};
use crate::sim::{GameState, RunPhase};

/// How far ahead (pixels above the player) a car counts as a threat
const LOOKAHEAD: f32 = 260.0;
/// Ticks to show the game-over state before restarting (2 s)
const RESTART_AFTER_TICKS: u32 = 2 * TICK_RATE;

#[derive(Debug, Clone, Default)]
pub struct Autopilot {
    game_over_ticks: u32,
}

impl Autopilot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Top edge of the nearest car still above the player's rear bumper
    fn nearest_threat(state: &GameState, lane: usize) -> Option<f32> {
        state
            .obstacles
            .iter()
            .filter(|ob| ob.lane == lane && ob.y < PLAYER_Y + PLAYER_HEIGHT)
            .map(|ob| ob.y)
            .max_by(|a, b| a.total_cmp(b))
    }

    /// Free road ahead in `lane`, in pixels (bigger is safer)
    fn clearance(state: &GameState, lane: usize) -> f32 {
        match Self::nearest_threat(state, lane) {
            Some(y) => PLAYER_Y - (y + OBSTACLE_HEIGHT),
            None => f32::INFINITY,
        }
    }

    fn steer(&self, state: &GameState) -> Option<InputEvent> {
        let player = &state.player;
        if player.is_sliding() {
            return None;
        }
        let lane = player.logical_lane;
        let here = Self::clearance(state, lane);
        if here > LOOKAHEAD {
            return None;
        }

        let mut best: Option<(f32, InputEvent)> = None;
        if lane > 0 {
            best = Some((Self::clearance(state, lane - 1), InputEvent::SteerLeft));
        }
        if lane + 1 < state.lanes {
            let right = Self::clearance(state, lane + 1);
            if best.is_none_or(|(left, _)| right > left) {
                best = Some((right, InputEvent::SteerRight));
            }
        }

        // A neighbor that is itself occupied at our row is worse than braving it out
        best.filter(|(room, _)| *room > here && *room > 0.0)
            .map(|(_, event)| event)
    }
}

impl InputSource for Autopilot {
    fn poll(&mut self, state: &GameState) -> Vec<InputEvent> {
        if state.phase == RunPhase::GameOver {
            self.game_over_ticks += 1;
            if self.game_over_ticks >= RESTART_AFTER_TICKS {
                self.game_over_ticks = 0;
                return vec![InputEvent::Restart];
            }
            return Vec::new();
        }
        self.game_over_ticks = 0;
        self.steer(state).into_iter().collect()
    }
}
