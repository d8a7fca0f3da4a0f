use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::game::engine::{EventSender, FrameSink, MatchEngine};
use crate::game::game_loop::GameLoopConfig;
use crate::game::match_result::{determine_result, MatchResult, PlayerScore};
use crate::game::space::Position;
use crate::game::state::{MatchId, PlayerId, PlayerSlot};
use crate::lobby::lifecycle::{MatchState, TransitionError};
use crate::lobby::player::LobbyPlayer;

/// One match: two seats, a lifecycle state and the engine that runs it
pub struct GameRoom {
    pub id: MatchId,
    pub created_at: Instant,
    state: MatchState,
    players: [Option<LobbyPlayer>; 2],
    engine: MatchEngine,
}

impl GameRoom {
    /// Create a room with `creator` in the player-one seat.
    ///
    /// With `config.ai_opponent` the player-two seat is filled by the server.
    pub fn new(
        id: MatchId,
        creator_id: PlayerId,
        creator_name: String,
        config: GameLoopConfig,
        events: EventSender,
        sink: Arc<dyn FrameSink>,
    ) -> Self {
        let opponent = config
            .ai_opponent
            .then(|| LobbyPlayer::bot(PlayerSlot::PlayerTwo));

        Self {
            id,
            created_at: Instant::now(),
            state: MatchState::Lobby,
            players: [
                Some(LobbyPlayer::new(creator_id, creator_name, PlayerSlot::PlayerOne)),
                opponent,
            ],
            engine: MatchEngine::new(id, config, events, sink),
        }
    }

    pub fn id(&self) -> MatchId {
        self.id
    }

    pub fn state(&self) -> MatchState {
        self.state
    }

    pub fn is_practice(&self) -> bool {
        self.engine.config().ai_opponent
    }

    pub fn is_running(&self) -> bool {
        self.engine.is_running()
    }

    pub fn engine(&self) -> &MatchEngine {
        &self.engine
    }

    /// Whether `run` is the engine run currently in play
    pub fn is_current_run(&self, run: u64) -> bool {
        self.engine.active_run() == Some(run)
    }

    pub fn player_count(&self) -> usize {
        self.players.iter().flatten().count()
    }

    pub fn is_full(&self) -> bool {
        self.players.iter().all(Option::is_some)
    }

    /// Open for a new player to join
    pub fn is_joinable(&self) -> bool {
        self.state == MatchState::Lobby && !self.is_full()
    }

    pub fn player(&self, slot: PlayerSlot) -> Option<&LobbyPlayer> {
        self.players[slot.index()].as_ref()
    }

    pub fn players(&self) -> impl Iterator<Item = &LobbyPlayer> {
        self.players.iter().flatten()
    }

    pub fn slot_of(&self, player_id: PlayerId) -> Option<PlayerSlot> {
        self.players().find(|p| p.id == player_id).map(|p| p.slot)
    }

    /// Seat a player in the free slot
    pub fn add_player(
        &mut self,
        player_id: PlayerId,
        name: String,
    ) -> Result<PlayerSlot, RoomError> {
        if self.state != MatchState::Lobby {
            return Err(RoomError::GameInProgress);
        }

        let slot = PlayerSlot::ALL
            .into_iter()
            .find(|slot| self.players[slot.index()].is_none())
            .ok_or(RoomError::RoomFull)?;

        self.players[slot.index()] = Some(LobbyPlayer::new(player_id, name, slot));
        Ok(slot)
    }

    pub fn remove_player(&mut self, slot: PlayerSlot) -> Option<LobbyPlayer> {
        self.players[slot.index()].take()
    }

    /// Toggle a player's ready flag; returns the new value
    pub fn toggle_ready(&mut self, slot: PlayerSlot) -> Result<bool, RoomError> {
        let player = self.players[slot.index()]
            .as_mut()
            .ok_or(RoomError::PlayerNotFound)?;
        Ok(player.toggle_ready())
    }

    pub fn set_ready(&mut self, slot: PlayerSlot, ready: bool) -> Result<(), RoomError> {
        let player = self.players[slot.index()]
            .as_mut()
            .ok_or(RoomError::PlayerNotFound)?;
        player.set_ready(ready);
        Ok(())
    }

    /// Both seats taken and both players ready
    pub fn all_players_ready(&self) -> bool {
        self.players
            .iter()
            .all(|p| p.as_ref().is_some_and(|p| p.is_ready))
    }

    fn transition(&mut self, next: MatchState) -> Result<(), TransitionError> {
        self.state.check_transition(next)?;
        debug!(match_id = %self.id, "Match {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }

    /// Lobby -> Running once everyone is ready
    pub async fn start_match(&mut self) -> Result<(), RoomError> {
        if !self.all_players_ready() {
            return Err(RoomError::NotReady);
        }
        self.transition(MatchState::Running)?;
        self.engine.start().await;
        info!(match_id = %self.id, "Match started");
        Ok(())
    }

    /// Running -> Running with a fresh clock, score and board
    pub async fn restart_match(&mut self) -> Result<(), RoomError> {
        if self.state != MatchState::Running {
            return Err(RoomError::NotRunning);
        }
        self.transition(MatchState::Running)?;
        for player in self.players.iter_mut().flatten() {
            player.score = 0;
        }
        self.engine.stop().await;
        self.engine.reset_board();
        self.engine.start().await;
        info!(match_id = %self.id, "Match restarted");
        Ok(())
    }

    /// Running -> Lobby after the clock ran out. Players go back to not-ready.
    pub async fn complete_match(&mut self) -> Result<MatchResult, RoomError> {
        self.transition(MatchState::Lobby)?;
        self.engine.stop().await;

        let result = self.result();
        self.reset_players();
        info!(match_id = %self.id, "{}", result);
        Ok(result)
    }

    /// Running -> Lobby without a result, e.g. the guest walked out mid-match
    pub async fn return_to_lobby(&mut self) -> Result<(), RoomError> {
        if self.state == MatchState::Running {
            self.transition(MatchState::Lobby)?;
            self.engine.stop().await;
            self.engine.reset_board();
        }
        self.reset_players();
        Ok(())
    }

    /// Any -> Terminated. The room is dead after this.
    pub async fn terminate(&mut self) -> Result<(), RoomError> {
        self.transition(MatchState::Terminated)?;
        self.engine.stop().await;
        self.reset_players();
        info!(match_id = %self.id, "Match terminated");
        Ok(())
    }

    /// Stop everything after a failure, whatever state the room is in
    pub async fn abort(&mut self) {
        self.engine.stop().await;
        if self.state.is_valid_next_state(MatchState::Terminated) {
            self.state = MatchState::Terminated;
        }
        self.reset_players();
    }

    /// Forward a client's handle position. Player two reports in their own
    /// (rotated) frame, so it is mirrored here.
    pub fn update_handle(&self, slot: PlayerSlot, position: Position) -> bool {
        if self.state != MatchState::Running {
            return false;
        }
        if self.player(slot).map_or(true, |p| p.is_bot) {
            return false;
        }

        let position = match slot {
            PlayerSlot::PlayerOne => position,
            PlayerSlot::PlayerTwo => position.mirror(),
        };
        self.engine.update_handle(slot, position);
        true
    }

    /// Credit a goal; returns the scorer's new total
    pub fn record_goal(&mut self, scorer: PlayerSlot) -> Option<u32> {
        let player = self.players[scorer.index()].as_mut()?;
        player.score += 1;
        Some(player.score)
    }

    pub fn scores(&self) -> [u32; 2] {
        PlayerSlot::ALL.map(|slot| self.player(slot).map_or(0, |p| p.score))
    }

    pub fn result(&self) -> MatchResult {
        determine_result(self.players().map(|p| PlayerScore {
            slot: p.slot,
            name: p.name.clone(),
            goals: p.score,
        }))
    }

    fn reset_players(&mut self) {
        for player in self.players.iter_mut().flatten() {
            player.reset_for_lobby();
        }
    }

    /// Get room age
    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }
}

/// Room errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RoomError {
    #[error("Room is full")]
    RoomFull,
    #[error("Game already in progress")]
    GameInProgress,
    #[error("Not all players are ready")]
    NotReady,
    #[error("Match is not running")]
    NotRunning,
    #[error("Player not found")]
    PlayerNotFound,
    #[error(transparent)]
    Transition(#[from] TransitionError),
}
