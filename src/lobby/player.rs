use crate::game::state::{PlayerId, PlayerSlot};

/// A seated player. Lives as long as they hold a slot in a room.
#[derive(Debug, Clone)]
pub struct LobbyPlayer {
    pub id: PlayerId,
    pub name: String,
    pub slot: PlayerSlot,
    pub is_ready: bool,
    pub is_bot: bool,
    pub score: u32,
}

impl LobbyPlayer {
    pub fn new(id: PlayerId, name: String, slot: PlayerSlot) -> Self {
        Self {
            id,
            name,
            slot,
            is_ready: false,
            is_bot: false,
            score: 0,
        }
    }

    /// Server-driven opponent. Always ready.
    pub fn bot(slot: PlayerSlot) -> Self {
        Self {
            id: PlayerId::new_v4(),
            name: "Computer".to_string(),
            slot,
            is_ready: true,
            is_bot: true,
            score: 0,
        }
    }

    pub fn set_ready(&mut self, ready: bool) {
        // bots never un-ready
        self.is_ready = ready || self.is_bot;
    }

    pub fn toggle_ready(&mut self) -> bool {
        self.set_ready(!self.is_ready);
        self.is_ready
    }

    /// Back to pre-match: not ready, no goals
    pub fn reset_for_lobby(&mut self) {
        self.set_ready(false);
        self.score = 0;
    }
}
