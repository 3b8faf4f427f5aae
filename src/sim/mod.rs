//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Game time derived from the tick counter, never the wall clock
//! - No rendering, audio or network dependencies

pub mod collision;
pub mod predictor;
pub mod spawn;
pub mod state;
pub mod tick;

pub use collision::Rect;
pub use predictor::{AdaptivePredictor, Features, PredictionStats};
pub use spawn::{SpawnDecision, SpawnScheduler};
pub use state::{GameState, LanePair, Obstacle, Player, RunPhase};
pub use tick::{RunReport, TickInput, TickOutcome, tick};
