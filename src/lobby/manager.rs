use hashbrown::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::game::engine::{EventReceiver, EventSender, FrameSink, MatchEvent, MatchNotice};
use crate::game::game_loop::GameLoopConfig;
use crate::game::space::Position;
use crate::game::state::{MatchId, PlayerId, PlayerSlot};
use crate::lobby::lifecycle::MatchState;
use crate::lobby::room::{GameRoom, RoomError};

/// Registry of live matches. A match is inserted when its creator opens it
/// and removed when it is terminated.
pub struct LobbyManager {
    rooms: HashMap<MatchId, GameRoom>,
    player_rooms: HashMap<PlayerId, (MatchId, PlayerSlot)>,
    max_rooms: usize,
    config: GameLoopConfig,
    practice_enabled: bool,
    events: EventSender,
    sink: Arc<dyn FrameSink>,
}

impl LobbyManager {
    pub fn new(
        max_rooms: usize,
        config: GameLoopConfig,
        events: EventSender,
        sink: Arc<dyn FrameSink>,
    ) -> Self {
        Self {
            rooms: HashMap::new(),
            player_rooms: HashMap::new(),
            max_rooms,
            config,
            practice_enabled: cfg!(feature = "ai_opponent"),
            events,
            sink,
        }
    }

    /// Allow or refuse practice matches against the server
    pub fn with_practice(mut self, enabled: bool) -> Self {
        self.practice_enabled = enabled && cfg!(feature = "ai_opponent");
        self
    }

    fn open_room(
        &mut self,
        player_id: PlayerId,
        name: String,
        ai_opponent: bool,
    ) -> Result<MatchId, ManagerError> {
        if self.player_rooms.contains_key(&player_id) {
            return Err(ManagerError::AlreadyInRoom);
        }
        if self.rooms.len() >= self.max_rooms {
            return Err(ManagerError::TooManyRooms);
        }

        let match_id = Uuid::new_v4();
        let config = GameLoopConfig {
            ai_opponent,
            ..self.config.clone()
        };
        let room = GameRoom::new(
            match_id,
            player_id,
            name,
            config,
            self.events.clone(),
            Arc::clone(&self.sink),
        );

        self.rooms.insert(match_id, room);
        self.player_rooms
            .insert(player_id, (match_id, PlayerSlot::PlayerOne));
        info!(%match_id, practice = ai_opponent, "Match created ({} active)", self.rooms.len());

        Ok(match_id)
    }

    /// Open a new match with `player_id` as its creator (player one)
    pub fn create_room(
        &mut self,
        player_id: PlayerId,
        name: String,
    ) -> Result<MatchId, ManagerError> {
        self.open_room(player_id, name, false)
    }

    /// Open a match against the server-driven opponent
    pub fn create_practice_room(
        &mut self,
        player_id: PlayerId,
        name: String,
    ) -> Result<MatchId, ManagerError> {
        if !self.practice_enabled {
            return Err(ManagerError::PracticeDisabled);
        }
        self.open_room(player_id, name, true)
    }

    /// Take the free seat in an existing match
    pub fn join_room(
        &mut self,
        match_id: MatchId,
        player_id: PlayerId,
        name: String,
    ) -> Result<PlayerSlot, ManagerError> {
        if self.player_rooms.contains_key(&player_id) {
            return Err(ManagerError::AlreadyInRoom);
        }

        let room = self
            .rooms
            .get_mut(&match_id)
            .ok_or(ManagerError::RoomNotFound)?;

        let slot = room.add_player(player_id, name)?;
        self.player_rooms.insert(player_id, (match_id, slot));
        debug!(%match_id, "Player {} joined as {}", player_id, slot);

        Ok(slot)
    }

    /// Join any open match, or create one
    pub fn find_or_create_room(
        &mut self,
        player_id: PlayerId,
        name: String,
    ) -> Result<(MatchId, PlayerSlot), ManagerError> {
        let open = self
            .rooms
            .values()
            .find(|room| room.is_joinable())
            .map(|room| room.id());

        match open {
            Some(match_id) => {
                let slot = self.join_room(match_id, player_id, name)?;
                Ok((match_id, slot))
            }
            None => {
                let match_id = self.create_room(player_id, name)?;
                Ok((match_id, PlayerSlot::PlayerOne))
            }
        }
    }

    /// Leave the current match. The creator leaving ends the match for good;
    /// the guest leaving sends the match back to the lobby.
    pub async fn leave_room(&mut self, player_id: PlayerId) -> Result<(), ManagerError> {
        let (match_id, slot) = self
            .player_rooms
            .remove(&player_id)
            .ok_or(ManagerError::NotInRoom)?;

        let Some(room) = self.rooms.get_mut(&match_id) else {
            return Ok(());
        };

        match slot {
            PlayerSlot::PlayerOne => {
                if let Err(e) = room.terminate().await {
                    warn!(%match_id, "Terminating on creator leave: {}", e);
                }
                self.remove_room(match_id);
            }
            PlayerSlot::PlayerTwo => {
                room.return_to_lobby().await?;
                room.remove_player(slot);
                debug!(%match_id, "Player {} left", player_id);
            }
        }

        Ok(())
    }

    /// Set a player's ready flag. Starts the match once both seats are ready.
    ///
    /// Returns whether the match was started by this call.
    pub async fn set_ready(
        &mut self,
        player_id: PlayerId,
        ready: bool,
    ) -> Result<bool, ManagerError> {
        let (match_id, slot) = self.player_location(player_id)?;
        let room = self
            .rooms
            .get_mut(&match_id)
            .ok_or(ManagerError::RoomNotFound)?;

        room.set_ready(slot, ready)?;
        Self::maybe_start(room).await
    }

    /// Flip a player's ready flag; returns the new value
    pub async fn toggle_ready(&mut self, player_id: PlayerId) -> Result<bool, ManagerError> {
        let (match_id, slot) = self.player_location(player_id)?;
        let room = self
            .rooms
            .get_mut(&match_id)
            .ok_or(ManagerError::RoomNotFound)?;

        let ready = room.toggle_ready(slot)?;
        Self::maybe_start(room).await?;
        Ok(ready)
    }

    async fn maybe_start(room: &mut GameRoom) -> Result<bool, ManagerError> {
        if room.state() == MatchState::Lobby && room.all_players_ready() {
            room.start_match().await?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Restart a running match from zero
    pub async fn restart_match(&mut self, match_id: MatchId) -> Result<(), ManagerError> {
        let room = self
            .rooms
            .get_mut(&match_id)
            .ok_or(ManagerError::RoomNotFound)?;
        room.restart_match().await?;
        Ok(())
    }

    /// Forward a handle position from a connection bound to `(match_id, slot)`.
    ///
    /// Returns `false` if the update was dropped.
    pub fn update_handle(&self, match_id: MatchId, slot: PlayerSlot, position: Position) -> bool {
        self.rooms
            .get(&match_id)
            .is_some_and(|room| room.update_handle(slot, position))
    }

    /// React to a notification from a match loop. Notices from a run that
    /// has since been stopped or replaced are dropped.
    pub async fn handle_event(&mut self, notice: MatchNotice) {
        let MatchNotice {
            match_id,
            run,
            event,
        } = notice;
        let Some(room) = self.rooms.get_mut(&match_id) else {
            debug!(%match_id, "Event for unknown match dropped: {:?}", event);
            return;
        };
        if !room.is_current_run(run) {
            debug!(%match_id, run, "Event from a finished run dropped: {:?}", event);
            return;
        }

        let failed = match event {
            MatchEvent::GoalScored(scorer) => {
                if let Some(score) = room.record_goal(scorer) {
                    let [one, two] = room.scores();
                    info!(
                        %match_id,
                        "Goal for {} ({} total), score {}-{}", scorer, score, one, two
                    );
                }
                None
            }
            MatchEvent::Completed => match room.complete_match().await {
                Ok(_) => None,
                Err(e) => Some(e.to_string()),
            },
            MatchEvent::Failed(reason) => Some(reason),
        };

        if let Some(reason) = failed {
            error!(%match_id, "Tearing down match: {}", reason);
            self.teardown(match_id).await;
        }
    }

    /// Stop and drop a match after a fatal error; its players go back to having no match
    pub async fn teardown(&mut self, match_id: MatchId) {
        if let Some(mut room) = self.remove_room(match_id) {
            room.abort().await;
        }
    }

    /// Remove a match from the registry along with its players' seats
    pub fn remove_room(&mut self, match_id: MatchId) -> Option<GameRoom> {
        let room = self.rooms.remove(&match_id)?;
        for player in room.players() {
            self.player_rooms.remove(&player.id);
        }
        info!(%match_id, "Match removed ({} active)", self.rooms.len());
        Some(room)
    }

    fn player_location(&self, player_id: PlayerId) -> Result<(MatchId, PlayerSlot), ManagerError> {
        self.player_rooms
            .get(&player_id)
            .copied()
            .ok_or(ManagerError::NotInRoom)
    }

    pub fn get_room(&self, match_id: MatchId) -> Option<&GameRoom> {
        self.rooms.get(&match_id)
    }

    pub fn has_room(&self, match_id: MatchId) -> bool {
        self.rooms.contains_key(&match_id)
    }

    pub fn get_player_room(&self, player_id: PlayerId) -> Option<MatchId> {
        self.player_rooms.get(&player_id).map(|(id, _)| *id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn total_player_count(&self) -> usize {
        self.player_rooms.len()
    }

    /// Summary of every match, for logging and admin views
    pub fn list_rooms(&self) -> Vec<RoomInfo> {
        self.rooms
            .values()
            .map(|room| RoomInfo {
                id: room.id(),
                player_count: room.player_count(),
                state: room.state(),
                practice: room.is_practice(),
                scores: room.scores(),
            })
            .collect()
    }

    /// Stop every match and clear the registry
    pub async fn shutdown_all_rooms(&mut self) {
        info!("Shutting down {} matches", self.rooms.len());
        for room in self.rooms.values_mut() {
            room.abort().await;
        }
        self.rooms.clear();
        self.player_rooms.clear();
    }
}

/// Room information for listing
#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub id: MatchId,
    pub player_count: usize,
    pub state: MatchState,
    pub practice: bool,
    pub scores: [u32; 2],
}

/// Manager errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ManagerError {
    #[error("Too many rooms")]
    TooManyRooms,
    #[error("Room not found")]
    RoomNotFound,
    #[error("Already in a room")]
    AlreadyInRoom,
    #[error("Not in a room")]
    NotInRoom,
    #[error("Practice matches are disabled")]
    PracticeDisabled,
    #[error("Room error: {0}")]
    Room(#[from] RoomError),
}

/// Feed match events into the manager until every sender is gone
pub async fn run_event_pump(lobby: Arc<RwLock<LobbyManager>>, mut events: EventReceiver) {
    while let Some(notice) = events.recv().await {
        lobby.write().await.handle_event(notice).await;
    }
    debug!("Match event pump stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::engine::NullSink;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn manager_with(max_rooms: usize, match_ms: u64) -> (LobbyManager, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let config = GameLoopConfig {
            tick_rate: 200,
            match_duration: Duration::from_millis(match_ms),
            ..Default::default()
        };
        (LobbyManager::new(max_rooms, config, tx, Arc::new(NullSink)), rx)
    }

    fn manager(max_rooms: usize) -> LobbyManager {
        manager_with(max_rooms, 60_000).0
    }

    #[test]
    fn test_create_room() {
        let mut manager = manager(10);
        let alice = Uuid::new_v4();

        let match_id = manager.create_room(alice, "alice".to_string()).unwrap();

        assert!(manager.has_room(match_id));
        assert_eq!(manager.get_player_room(alice), Some(match_id));
        assert_eq!(manager.room_count(), 1);
    }

    #[test]
    fn test_max_rooms() {
        let mut manager = manager(2);

        manager.create_room(Uuid::new_v4(), "a".to_string()).unwrap();
        manager.create_room(Uuid::new_v4(), "b".to_string()).unwrap();

        let result = manager.create_room(Uuid::new_v4(), "c".to_string());
        assert_eq!(result, Err(ManagerError::TooManyRooms));
    }

    #[test]
    fn test_cannot_be_in_two_rooms() {
        let mut manager = manager(10);
        let alice = Uuid::new_v4();
        let first = manager.create_room(alice, "alice".to_string()).unwrap();
        let other = manager.create_room(Uuid::new_v4(), "bob".to_string()).unwrap();

        assert_eq!(
            manager.create_room(alice, "alice".to_string()),
            Err(ManagerError::AlreadyInRoom)
        );
        assert_eq!(
            manager.join_room(other, alice, "alice".to_string()),
            Err(ManagerError::AlreadyInRoom)
        );
        assert_eq!(manager.get_player_room(alice), Some(first));
    }

    #[test]
    fn test_join_unknown_room() {
        let mut manager = manager(10);
        let result = manager.join_room(Uuid::new_v4(), Uuid::new_v4(), "x".to_string());
        assert_eq!(result, Err(ManagerError::RoomNotFound));
    }

    #[test]
    fn test_find_or_create_pairs_players() {
        let mut manager = manager(10);

        let (first, slot_a) = manager
            .find_or_create_room(Uuid::new_v4(), "alice".to_string())
            .unwrap();
        let (second, slot_b) = manager
            .find_or_create_room(Uuid::new_v4(), "bob".to_string())
            .unwrap();
        let (third, _) = manager
            .find_or_create_room(Uuid::new_v4(), "carol".to_string())
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(slot_a, PlayerSlot::PlayerOne);
        assert_eq!(slot_b, PlayerSlot::PlayerTwo);
        assert_ne!(first, third);
        assert_eq!(manager.total_player_count(), 3);
    }

    #[tokio::test]
    async fn test_ready_up_starts_match() {
        let mut manager = manager(10);
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let (match_id, _) = manager.find_or_create_room(alice, "alice".to_string()).unwrap();
        manager.find_or_create_room(bob, "bob".to_string()).unwrap();

        assert!(!manager.set_ready(alice, true).await.unwrap());
        assert!(manager.set_ready(bob, true).await.unwrap());

        let room = manager.get_room(match_id).unwrap();
        assert_eq!(room.state(), MatchState::Running);
        assert!(manager.update_handle(match_id, PlayerSlot::PlayerOne, Position::new(0.5, 0.9)));

        manager.shutdown_all_rooms().await;
        assert_eq!(manager.room_count(), 0);
    }

    #[tokio::test]
    async fn test_creator_leaving_terminates() {
        let mut manager = manager(10);
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let (match_id, _) = manager.find_or_create_room(alice, "alice".to_string()).unwrap();
        manager.find_or_create_room(bob, "bob".to_string()).unwrap();
        manager.set_ready(alice, true).await.unwrap();
        manager.set_ready(bob, true).await.unwrap();

        manager.leave_room(alice).await.unwrap();

        assert!(!manager.has_room(match_id));
        assert_eq!(manager.get_player_room(bob), None);
        assert_eq!(manager.total_player_count(), 0);
    }

    #[tokio::test]
    async fn test_guest_leaving_returns_to_lobby() {
        let mut manager = manager(10);
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let (match_id, _) = manager.find_or_create_room(alice, "alice".to_string()).unwrap();
        manager.find_or_create_room(bob, "bob".to_string()).unwrap();
        manager.set_ready(alice, true).await.unwrap();
        manager.set_ready(bob, true).await.unwrap();

        manager.leave_room(bob).await.unwrap();

        let room = manager.get_room(match_id).unwrap();
        assert_eq!(room.state(), MatchState::Lobby);
        assert!(!room.is_running());
        assert!(room.is_joinable());
        assert_eq!(manager.leave_room(bob).await, Err(ManagerError::NotInRoom));
    }

    /// Wrap `event` as if it came from the room's current run
    fn current(manager: &LobbyManager, match_id: MatchId, event: MatchEvent) -> MatchNotice {
        let run = manager
            .get_room(match_id)
            .and_then(|room| room.engine().active_run())
            .unwrap();
        MatchNotice {
            match_id,
            run,
            event,
        }
    }

    async fn running_match(manager: &mut LobbyManager) -> (MatchId, PlayerId, PlayerId) {
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let (match_id, _) = manager.find_or_create_room(alice, "alice".to_string()).unwrap();
        manager.find_or_create_room(bob, "bob".to_string()).unwrap();
        manager.set_ready(alice, true).await.unwrap();
        manager.set_ready(bob, true).await.unwrap();
        (match_id, alice, bob)
    }

    #[tokio::test]
    async fn test_goal_and_completion_events() {
        let mut manager = manager(10);
        let (match_id, _, _) = running_match(&mut manager).await;

        // puck crossing player one's line scores for player two
        let goal = current(&manager, match_id, MatchEvent::GoalScored(PlayerSlot::PlayerTwo));
        manager.handle_event(goal).await;
        assert_eq!(manager.get_room(match_id).unwrap().scores(), [0, 1]);

        let completed = current(&manager, match_id, MatchEvent::Completed);
        manager.handle_event(completed).await;

        let room = manager.get_room(match_id).unwrap();
        assert_eq!(room.state(), MatchState::Lobby);
        assert_eq!(room.scores(), [0, 0]);
        assert!(!room.all_players_ready());
    }

    #[tokio::test]
    async fn test_failure_tears_down() {
        let mut manager = manager(10);
        let (match_id, alice, bob) = running_match(&mut manager).await;

        let failed = current(&manager, match_id, MatchEvent::Failed("boom".to_string()));
        manager.handle_event(failed).await;

        assert!(!manager.has_room(match_id));
        assert_eq!(manager.get_player_room(alice), None);
        assert_eq!(manager.get_player_room(bob), None);
    }

    #[tokio::test]
    async fn test_completion_after_guest_left_keeps_room() {
        let mut manager = manager(10);
        let (match_id, alice, bob) = running_match(&mut manager).await;
        let finished = current(&manager, match_id, MatchEvent::Completed);

        // the loop reported completion just before bob's leave stopped it
        manager.leave_room(bob).await.unwrap();
        manager.handle_event(finished).await;

        let room = manager.get_room(match_id).unwrap();
        assert_eq!(room.state(), MatchState::Lobby);
        assert_eq!(room.slot_of(alice), Some(PlayerSlot::PlayerOne));
        assert_eq!(manager.get_player_room(alice), Some(match_id));
    }

    #[tokio::test]
    async fn test_goal_from_previous_run_not_counted() {
        let mut manager = manager(10);
        let (match_id, _, _) = running_match(&mut manager).await;
        let late_goal = current(&manager, match_id, MatchEvent::GoalScored(PlayerSlot::PlayerOne));

        manager.restart_match(match_id).await.unwrap();
        manager.handle_event(late_goal).await;

        let room = manager.get_room(match_id).unwrap();
        assert!(room.is_running());
        assert_eq!(room.scores(), [0, 0]);
    }

    #[tokio::test]
    async fn test_failure_from_stopped_run_ignored() {
        let mut manager = manager(10);
        let (match_id, _, _) = running_match(&mut manager).await;
        let failed = current(&manager, match_id, MatchEvent::Failed("boom".to_string()));

        manager.restart_match(match_id).await.unwrap();
        manager.handle_event(failed).await;

        assert!(manager.has_room(match_id));
        assert!(manager.get_room(match_id).unwrap().is_running());
    }

    #[tokio::test]
    async fn test_event_for_idle_room_ignored() {
        let mut manager = manager(10);
        let match_id = manager.create_room(Uuid::new_v4(), "alice".to_string()).unwrap();

        // no run has been started, so no notice can be current
        let notice = MatchNotice {
            match_id,
            run: 1,
            event: MatchEvent::Completed,
        };
        manager.handle_event(notice).await;

        assert!(manager.has_room(match_id));
        assert_eq!(manager.get_room(match_id).unwrap().state(), MatchState::Lobby);
    }

    #[cfg(feature = "ai_opponent")]
    #[tokio::test]
    async fn test_practice_match_starts_with_one_ready() {
        let mut manager = manager(10);
        let alice = Uuid::new_v4();
        let match_id = manager
            .create_practice_room(alice, "alice".to_string())
            .unwrap();

        assert!(manager.set_ready(alice, true).await.unwrap());
        assert!(manager.get_room(match_id).unwrap().is_running());
        // the bot seat is not a registered player
        assert_eq!(manager.total_player_count(), 1);

        manager.shutdown_all_rooms().await;
    }

    #[test]
    fn test_practice_can_be_disabled() {
        let mut manager = manager(10).with_practice(false);
        assert_eq!(
            manager.create_practice_room(Uuid::new_v4(), "alice".to_string()),
            Err(ManagerError::PracticeDisabled)
        );
    }

    #[tokio::test]
    async fn test_event_pump_completes_match() {
        let (manager, rx) = manager_with(10, 50);
        let lobby = Arc::new(RwLock::new(manager));
        let pump = tokio::spawn(run_event_pump(Arc::clone(&lobby), rx));

        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let match_id = {
            let mut lobby = lobby.write().await;
            let (match_id, _) = lobby.find_or_create_room(alice, "alice".to_string()).unwrap();
            lobby.find_or_create_room(bob, "bob".to_string()).unwrap();
            lobby.set_ready(alice, true).await.unwrap();
            lobby.set_ready(bob, true).await.unwrap();
            match_id
        };

        let mut back_in_lobby = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let lobby = lobby.read().await;
            if lobby.get_room(match_id).map(|r| r.state()) == Some(MatchState::Lobby) {
                back_in_lobby = true;
                break;
            }
        }
        assert!(back_in_lobby);

        lobby.write().await.shutdown_all_rooms().await;
        pump.abort();
    }

    #[test]
    fn test_list_rooms() {
        let mut manager = manager(10);
        manager.create_room(Uuid::new_v4(), "a".to_string()).unwrap();
        manager.create_room(Uuid::new_v4(), "b".to_string()).unwrap();

        let rooms = manager.list_rooms();
        assert_eq!(rooms.len(), 2);
        assert!(rooms.iter().all(|r| r.state == MatchState::Lobby && r.player_count == 1));
    }
}
