//! Fixed timestep simulation tick
//!
//! Core game loop step: spawn, move, score, slide, collide.

use super::spawn::SpawnDecision;
use super::state::{GameState, Obstacle, RunPhase};

/// Input commands for a single tick (deterministic)
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Lane change request: -1 left, +1 right
    pub steer: Option<i32>,
    /// Throw away the current run and start over
    pub restart: bool,
}

/// Final result of a run, handed to the control plane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub score: u32,
    pub lanes: usize,
}

/// What happened during a tick
#[derive(Debug, Clone, Default)]
pub struct TickOutcome {
    /// Spawn performed this tick
    pub spawned: Option<SpawnDecision>,
    /// Obstacles cleared (and scored) this tick
    pub cleared: u32,
    /// Set on the tick the player crashes
    pub run_ended: Option<RunReport>,
    /// A restart request reset the run this tick
    pub restarted: bool,
}

/// Advance the game state by one fixed timestep
pub fn tick(state: &mut GameState, input: &TickInput) -> TickOutcome {
    let mut outcome = TickOutcome::default();

    if input.restart {
        state.reset();
        outcome.restarted = true;
        return outcome;
    }

    // Nothing moves until the player asks for a new run
    if state.phase == RunPhase::GameOver {
        return outcome;
    }

    state.time_ticks += 1;
    let now_ms = state.now_ms();

    if let Some(delta) = input.steer {
        state.player.request_lane_change(delta, state.lanes);
    }

    // Spawn
    if let Some(decision) = state.scheduler.update(now_ms, &state.obstacles, &mut state.rng) {
        let id = state.next_entity_id();
        state
            .obstacles
            .push(Obstacle::new(id, decision.lane, state.lanes, decision.speed, now_ms));
        outcome.spawned = Some(decision);
    }

    // Move and score
    for ob in &mut state.obstacles {
        ob.advance();
    }
    let before = state.obstacles.len();
    state.obstacles.retain(|ob| !ob.is_cleared());
    outcome.cleared = (before - state.obstacles.len()) as u32;
    state.score += outcome.cleared;

    state.player.update();

    // Collide
    let player_rect = state.player.rect();
    if state.obstacles.iter().any(|ob| ob.rect().overlaps(&player_rect)) {
        state.phase = RunPhase::GameOver;
        state.runs_finished += 1;
        log::info!(
            "Run over: score={} lanes={} spawned={}",
            state.score,
            state.lanes,
            state.scheduler.total_spawned()
        );
        outcome.run_ended = Some(RunReport {
            score: state.score,
            lanes: state.lanes,
        });
    }

    outcome
}
