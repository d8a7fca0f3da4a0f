//! Fixed-rate match simulation
//!
//! `GameLoop` is the synchronous core: one call to [`GameLoop::tick`] advances
//! the match by exactly one step. Scheduling lives in [`crate::game::engine`].

use smallvec::SmallVec;
use std::time::Duration;
use tracing::debug;

use crate::game::collision::{self, Collision, Resolution};
use crate::game::constants::timing::{MATCH_DURATION_SECS, PUCK_RESPAWN_SECS, TICK_RATE};
use crate::game::space::Position;
use crate::game::state::{BoardState, PlayerSlot};
use crate::net::protocol::BroadcastFrame;

/// Game loop configuration
#[derive(Debug, Clone)]
pub struct GameLoopConfig {
    pub tick_rate: u32,
    pub match_duration: Duration,
    pub respawn_delay: Duration,
    /// Player two's handle is driven by the server
    pub ai_opponent: bool,
}

impl Default for GameLoopConfig {
    fn default() -> Self {
        Self {
            tick_rate: TICK_RATE,
            match_duration: Duration::from_secs(MATCH_DURATION_SECS),
            respawn_delay: Duration::from_secs(PUCK_RESPAWN_SECS),
            ai_opponent: false,
        }
    }
}

impl GameLoopConfig {
    pub fn tick_duration(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / self.tick_rate.max(1) as u64)
    }

    fn ticks_for(&self, duration: Duration) -> u64 {
        (duration.as_secs_f64() * self.tick_rate as f64).round() as u64
    }

    pub fn match_ticks(&self) -> u64 {
        self.ticks_for(self.match_duration)
    }

    pub fn respawn_ticks(&self) -> u64 {
        self.ticks_for(self.respawn_delay).max(1)
    }
}

/// Events produced by a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameLoopEvent {
    GoalScored { scorer: PlayerSlot },
    /// Match clock ran out; the board has been reset and the loop is done
    Completed,
}

/// Loop phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    Armed,
    Ticking,
    Completed,
}

/// A scored puck waiting to come back
#[derive(Debug, Clone, Copy)]
struct PendingRespawn {
    remaining_ticks: u64,
    target: Position,
}

/// Result of one tick
#[derive(Debug, Default)]
pub struct TickOutput {
    pub events: SmallVec<[GameLoopEvent; 2]>,
    /// Frames for player one and player two, in that order
    pub frames: Option<[BroadcastFrame; 2]>,
}

impl TickOutput {
    pub fn is_completed(&self) -> bool {
        self.events.contains(&GameLoopEvent::Completed)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("non-finite board state after tick {tick} ({collision:?})")]
    NonFinite { tick: u64, collision: Collision },
    #[error("tick called on a completed loop")]
    AlreadyCompleted,
}

/// Single-match simulation
pub struct GameLoop {
    board: BoardState,
    config: GameLoopConfig,
    phase: LoopPhase,
    tick: u64,
    remaining_ticks: u64,
    respawn: Option<PendingRespawn>,
}

impl GameLoop {
    pub fn new(mut board: BoardState, config: GameLoopConfig) -> Self {
        // a pending respawn does not outlive the run that scheduled it
        if board.puck.is_off_board() {
            board.reset();
        }
        let remaining_ticks = config.match_ticks();
        Self {
            board,
            config,
            phase: LoopPhase::Armed,
            tick: 0,
            remaining_ticks,
            respawn: None,
        }
    }

    pub fn config(&self) -> &GameLoopConfig {
        &self.config
    }

    pub fn board(&self) -> &BoardState {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut BoardState {
        &mut self.board
    }

    /// Hand the board back, e.g. when the runner stops
    pub fn into_board(self) -> BoardState {
        self.board
    }

    pub fn phase(&self) -> LoopPhase {
        self.phase
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn remaining_ticks(&self) -> u64 {
        self.remaining_ticks
    }

    /// Whole seconds left on the clock, rounded up
    pub fn remaining_seconds(&self) -> f64 {
        self.remaining_ticks.div_ceil(self.config.tick_rate.max(1) as u64) as f64
    }

    pub fn respawn_pending(&self) -> bool {
        self.respawn.is_some()
    }

    /// Run one tick
    pub fn tick(&mut self) -> Result<TickOutput, SimulationError> {
        let mut output = TickOutput::default();

        match self.phase {
            LoopPhase::Completed => return Err(SimulationError::AlreadyCompleted),
            LoopPhase::Armed => self.phase = LoopPhase::Ticking,
            LoopPhase::Ticking => {}
        }

        // 1. match clock
        if self.remaining_ticks == 0 {
            self.board.reset();
            self.respawn = None;
            self.phase = LoopPhase::Completed;
            output.events.push(GameLoopEvent::Completed);
            return Ok(output);
        }
        self.remaining_ticks -= 1;
        self.tick += 1;

        // 2. respawn countdown
        if let Some(pending) = self.respawn.as_mut() {
            pending.remaining_ticks = pending.remaining_ticks.saturating_sub(1);
            if pending.remaining_ticks == 0 {
                let target = pending.target;
                self.respawn = None;
                self.board.puck.set_position(target);
                debug!(tick = self.tick, "Puck respawned at ({:.2}, {:.2})", target.x, target.y);
            }
        }

        // 3. server-driven opponent
        #[cfg(feature = "ai_opponent")]
        if self.config.ai_opponent {
            crate::game::ai::update_ai(&self.board);
        }

        // 4-6. physics
        self.board.puck.tick();
        let collision = collision::detect(&self.board);
        if let Resolution::Goal { scorer } = collision::resolve(collision, &mut self.board) {
            self.respawn = Some(PendingRespawn {
                remaining_ticks: self.config.respawn_ticks(),
                target: scorer.opponent().puck_start(),
            });
            output.events.push(GameLoopEvent::GoalScored { scorer });
        }

        // 7. derived handle velocity
        self.board.update_handle_velocities();

        if !self.board.is_finite() {
            return Err(SimulationError::NonFinite {
                tick: self.tick,
                collision,
            });
        }

        // 8. per-player frames
        let remaining = self.remaining_seconds();
        output.frames = Some([
            BroadcastFrame::for_player(PlayerSlot::PlayerOne, &self.board, remaining),
            BroadcastFrame::for_player(PlayerSlot::PlayerTwo, &self.board, remaining),
        ]);

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::constants::board::{
        HANDLE_START_P1, HANDLE_START_P2, PUCK_RADIUS, PUCK_START_P1, PUCK_START_P2,
    };
    use crate::util::vec2::Vec2;

    fn short_config(match_secs: u64) -> GameLoopConfig {
        GameLoopConfig {
            match_duration: Duration::from_secs(match_secs),
            ..Default::default()
        }
    }

    fn loop_with_centered_puck() -> GameLoop {
        let mut board = BoardState::new();
        board.puck.set_position(Position::new(0.5, 0.5));
        GameLoop::new(board, GameLoopConfig::default())
    }

    #[test]
    fn test_config_ticks() {
        let config = GameLoopConfig::default();
        assert_eq!(config.match_ticks(), 1000);
        assert_eq!(config.respawn_ticks(), 50);
        assert_eq!(config.tick_duration(), Duration::from_millis(20));
    }

    #[test]
    fn test_quiet_first_tick() {
        let mut game_loop = loop_with_centered_puck();

        let output = game_loop.tick().unwrap();

        assert!(output.events.is_empty());
        assert_eq!(game_loop.board().puck.position(), Position::new(0.5, 0.5));
        assert_eq!(game_loop.phase(), LoopPhase::Ticking);

        let [p1, p2] = output.frames.unwrap();
        assert_eq!(p1.opponent, HANDLE_START_P2);
        assert_eq!(p2.opponent, HANDLE_START_P1.mirror());
        assert_eq!(p1.puck, Position::new(0.5, 0.5));
        assert_eq!(p1.remaining_seconds, 20.0);
    }

    #[test]
    fn test_corner_injection_resolves_to_bottom_wall() {
        let mut game_loop = loop_with_centered_puck();
        game_loop.tick().unwrap();

        let r = PUCK_RADIUS;
        game_loop
            .board_mut()
            .puck
            .set_position(Position::new(1.0 + r.x, 1.0 + r.y));
        let collision = collision::detect(game_loop.board());
        assert_eq!(collision, Collision::BottomWall);

        collision::resolve(collision, game_loop.board_mut());
        assert_eq!(game_loop.board().puck.position().y, 1.0 - r.y);
    }

    #[test]
    fn test_new_run_with_scored_puck_starts_from_kick_off() {
        let mut board = BoardState::new();
        board.puck.place_off_board();

        let game = GameLoop::new(board, GameLoopConfig::default());

        assert!(!game.respawn_pending());
        assert!(!game.board().puck.is_off_board());
        assert_eq!(game.board().puck.position(), PUCK_START_P2);
        assert_eq!(game.board().handle(PlayerSlot::PlayerOne).position(), HANDLE_START_P1);
    }

    #[test]
    fn test_goal_then_respawn() {
        let mut board = BoardState::new();
        // heading into player one's goal
        board.puck.set_position(Position::new(0.5, 1.0));
        board.puck.set_velocity(Vec2::new(0.0, 0.04));
        let mut game_loop = GameLoop::new(board, GameLoopConfig::default());

        let output = game_loop.tick().unwrap();
        assert_eq!(
            output.events.as_slice(),
            &[GameLoopEvent::GoalScored { scorer: PlayerSlot::PlayerTwo }]
        );
        assert!(game_loop.board().puck.is_off_board());
        assert!(game_loop.respawn_pending());

        for _ in 0..49 {
            let output = game_loop.tick().unwrap();
            assert!(output.events.is_empty());
            assert!(game_loop.board().puck.is_off_board());
        }

        game_loop.tick().unwrap();
        // player one conceded, so the puck comes back on their side
        assert_eq!(game_loop.board().puck.position(), PUCK_START_P1);
        assert!(!game_loop.respawn_pending());
    }

    #[test]
    fn test_player_one_goal_respawns_on_player_two_side() {
        let mut board = BoardState::new();
        board.puck.set_position(Position::new(0.5, 0.0));
        board.puck.set_velocity(Vec2::new(0.0, -0.04));
        let mut game_loop = GameLoop::new(board, GameLoopConfig::default());

        let output = game_loop.tick().unwrap();
        assert_eq!(
            output.events.as_slice(),
            &[GameLoopEvent::GoalScored { scorer: PlayerSlot::PlayerOne }]
        );

        for _ in 0..50 {
            game_loop.tick().unwrap();
        }
        assert_eq!(game_loop.board().puck.position(), PUCK_START_P2);
    }

    #[test]
    fn test_completes_after_duration() {
        let mut game_loop = GameLoop::new(BoardState::new(), short_config(1));

        for _ in 0..50 {
            let output = game_loop.tick().unwrap();
            assert!(!output.is_completed());
        }
        assert_eq!(game_loop.remaining_ticks(), 0);

        let output = game_loop.tick().unwrap();
        assert!(output.is_completed());
        assert!(output.frames.is_none());
        assert_eq!(game_loop.phase(), LoopPhase::Completed);
        assert_eq!(game_loop.board().reset_count(), 1);
        assert_eq!(game_loop.board().puck.position(), PUCK_START_P2);
        assert_eq!(
            game_loop.board().handle(PlayerSlot::PlayerTwo).position(),
            HANDLE_START_P2
        );

        assert!(matches!(
            game_loop.tick(),
            Err(SimulationError::AlreadyCompleted)
        ));
    }

    #[test]
    fn test_remaining_seconds_counts_down() {
        let mut game_loop = GameLoop::new(BoardState::new(), short_config(2));
        let output = game_loop.tick().unwrap();
        assert_eq!(output.frames.unwrap()[0].remaining_seconds, 2.0);

        for _ in 0..50 {
            game_loop.tick().unwrap();
        }
        // 49 ticks left
        assert_eq!(game_loop.remaining_seconds(), 1.0);
    }

    #[test]
    fn test_handle_velocity_derived_each_tick() {
        let mut game_loop = loop_with_centered_puck();
        game_loop
            .board()
            .handle(PlayerSlot::PlayerOne)
            .set_position(Position::new(0.55, 0.85));

        game_loop.tick().unwrap();

        let v = game_loop.board().handle(PlayerSlot::PlayerOne).velocity();
        assert!(v.approx_eq(Vec2::new(0.05, 0.05), 1e-12));
    }

    #[test]
    fn test_non_finite_input_fails_tick() {
        let mut game_loop = loop_with_centered_puck();
        game_loop
            .board()
            .handle(PlayerSlot::PlayerOne)
            .set_position(Position::new(f64::NAN, 0.8));

        assert!(matches!(
            game_loop.tick(),
            Err(SimulationError::NonFinite { .. })
        ));
    }

    #[cfg(feature = "ai_opponent")]
    #[test]
    fn test_ai_drives_player_two() {
        let mut board = BoardState::new();
        board.puck.set_position(Position::new(0.2, 0.7));
        let config = GameLoopConfig {
            ai_opponent: true,
            ..Default::default()
        };
        let mut game_loop = GameLoop::new(board, config);

        game_loop.tick().unwrap();

        let p = game_loop.board().handle(PlayerSlot::PlayerTwo).position();
        assert!(p.x < HANDLE_START_P2.x);
    }
}
