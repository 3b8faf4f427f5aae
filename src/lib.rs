//! Asphalt Rush - A lane-dodging arcade game with a control dashboard
//!
//! Core modules:
//! - `sim`: Deterministic simulation (spawning, prediction, collisions, run state)
//! - `game`: Fixed-tick driver wiring input, presenter and control plane around `sim`
//! - `client`: Game-side calls to the dashboard (color pull, score push)
//! - `orchestrator`: Dashboard process (launch/stop the game, logs, HTTP surface)
//! - `protocol`: Message schemas shared by both processes
//! - `settings`: Difficulty presets and gameplay tuning

pub mod audio;
pub mod autopilot;
pub mod client;
pub mod color;
pub mod game;
pub mod orchestrator;
pub mod protocol;
pub mod settings;
pub mod sim;

pub use color::Rgb;
pub use settings::{Difficulty, Tuning};

/// Game configuration constants
pub mod consts {
    /// Fixed simulation rate (ticks per second)
    pub const TICK_RATE: u32 = 60;
    /// Milliseconds of game time per tick
    pub const TICK_MS: f64 = 1000.0 / TICK_RATE as f64;
    /// Maximum ticks to catch up per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;

    /// World dimensions (pixels)
    pub const WORLD_WIDTH: f32 = 480.0;
    pub const WORLD_HEIGHT: f32 = 640.0;

    /// Lane count bounds
    pub const MIN_LANES: usize = 2;
    pub const MAX_LANES: usize = 6;
    pub const DEFAULT_LANES: usize = 3;

    /// Player car - fixed row near the bottom
    pub const PLAYER_Y: f32 = WORLD_HEIGHT - 140.0;
    pub const PLAYER_HEIGHT: f32 = 56.0;
    /// Player width = lane width - offset
    pub const PLAYER_WIDTH_OFFSET: f32 = 24.0;
    /// Base horizontal slide speed (pixels/tick), scaled up with distance
    pub const PLAYER_SLIDE_SPEED: f32 = 22.0;

    /// Obstacle cars
    pub const OBSTACLE_HEIGHT: f32 = 52.0;
    pub const OBSTACLE_WIDTH_OFFSET: f32 = 30.0;
    /// Spawn row, above the visible area so the player gets extra warning
    pub const OBSTACLE_SPAWN_Y: f32 = -160.0;
    /// Obstacles past this row are cleared and scored
    pub const OBSTACLE_DESPAWN_Y: f32 = WORLD_HEIGHT + 80.0;
    /// Speed ceiling (pixels/tick). Must stay below PLAYER_HEIGHT + OBSTACLE_HEIGHT
    /// so an obstacle can never step over the player between two ticks.
    pub const MAX_OBSTACLE_SPEED: f32 = 12.0;

    /// Game-over screen time before a new run starts on its own
    pub const GAME_OVER_HOLD_MS: u64 = 3000;

    /// Dashboard color poll cadence (wall clock, independent of tick rate)
    pub const COLOR_POLL_INTERVAL_MS: u64 = 900;
    /// Outbound call budgets
    pub const COLOR_PULL_TIMEOUT_MS: u64 = 600;
    pub const SCORE_PUSH_TIMEOUT_MS: u64 = 900;

    /// Default car color (Teal Dark)
    pub const DEFAULT_CAR_HEX: &str = "#0f766e";
    pub const DEFAULT_CAR_NAME: &str = "Teal Dark";
}

/// Clamp a requested lane count into the supported range
#[inline]
pub fn clamp_lanes(requested: i64) -> usize {
    requested.clamp(consts::MIN_LANES as i64, consts::MAX_LANES as i64) as usize
}

/// Width of one lane for the given lane count (integer pixels, like the road art)
#[inline]
pub fn lane_width(lanes: usize) -> f32 {
    (consts::WORLD_WIDTH as u32 / lanes.max(1) as u32) as f32
}

/// Left edge of a body of `body_width` centered in `lane`
#[inline]
pub fn lane_left(lane: usize, lanes: usize, body_width: f32) -> f32 {
    let lw = lane_width(lanes);
    lane as f32 * lw + ((lw - body_width) / 2.0).floor()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_lanes() {
        assert_eq!(clamp_lanes(0), 2);
        assert_eq!(clamp_lanes(3), 3);
        assert_eq!(clamp_lanes(99), 6);
        assert_eq!(clamp_lanes(-4), 2);
    }

    #[test]
    fn test_speed_ceiling_below_overlap_window() {
        assert!(consts::MAX_OBSTACLE_SPEED < consts::PLAYER_HEIGHT + consts::OBSTACLE_HEIGHT);
    }

    #[test]
    fn test_lane_left_centers_body() {
        // 3 lanes -> 160px lanes, 136px player
        let x = lane_left(1, 3, 136.0);
        assert_eq!(x, 160.0 + 12.0);
    }
}
