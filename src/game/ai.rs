//! Server-side opponent for practice matches
//!
//! Drives player two's handle by easing it toward a target chosen from the
//! puck position. Works in player one's frame: player two owns the top half.

use crate::game::constants::ai::*;
use crate::game::constants::board::HANDLE_RADIUS;
use crate::game::space::Position;
use crate::game::state::{BoardState, PlayerSlot};

/// What the opponent is doing this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiBehavior {
    /// Puck is off the board, drift back to the home spot
    Recover,
    /// Puck is in our half, go after it
    Attack,
    /// Puck is in the other half, guard the goal while tracking x
    Defend,
}

/// Pick a behavior from the puck position
pub fn decide_behavior(board: &BoardState) -> AiBehavior {
    let puck = &board.puck;
    if puck.is_off_board() {
        AiBehavior::Recover
    } else if puck.position().y < ATTACK_THRESHOLD_Y {
        AiBehavior::Attack
    } else {
        AiBehavior::Defend
    }
}

fn target_for(behavior: AiBehavior, puck: Position) -> Position {
    match behavior {
        // Not clamped: home spot is inside bounds
        AiBehavior::Recover => Position::new(0.5, DEFENSIVE_Y),
        AiBehavior::Attack => Position::new(
            puck.x.clamp(MIN_X, MAX_X),
            // stay a little goal-side of the puck
            (puck.y - HANDLE_RADIUS.y).clamp(MIN_Y, MAX_Y),
        ),
        AiBehavior::Defend => Position::new(puck.x.clamp(MIN_X, MAX_X), DEFENSIVE_Y),
    }
}

/// Move player two's handle one step toward its target.
///
/// Writes through the handle's input cell, like a network client would.
pub fn update_ai(board: &BoardState) -> AiBehavior {
    let behavior = decide_behavior(board);
    let handle = board.handle(PlayerSlot::PlayerTwo);
    let current = handle.position();
    let target = target_for(behavior, board.puck.position());

    handle.set_position(Position::new(
        current.x + (target.x - current.x) * LERP_SPEED,
        current.y + (target.y - current.y) * LERP_SPEED,
    ));

    behavior
}
