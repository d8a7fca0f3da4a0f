use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::bodies::{Handle, HandlePosition, Puck};
use crate::game::constants::board::{
    HANDLE_START_P1, HANDLE_START_P2, PUCK_START_P1, PUCK_START_P2,
};
use crate::game::space::Position;
use crate::util::vec2::Vec2;

pub type MatchId = Uuid;
pub type PlayerId = Uuid;

/// One of the two seats in a match. Player one defends the bottom goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerSlot {
    PlayerOne,
    PlayerTwo,
}

impl PlayerSlot {
    pub const ALL: [PlayerSlot; 2] = [PlayerSlot::PlayerOne, PlayerSlot::PlayerTwo];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            PlayerSlot::PlayerOne => 0,
            PlayerSlot::PlayerTwo => 1,
        }
    }

    #[inline]
    pub fn opponent(self) -> Self {
        match self {
            PlayerSlot::PlayerOne => PlayerSlot::PlayerTwo,
            PlayerSlot::PlayerTwo => PlayerSlot::PlayerOne,
        }
    }

    pub fn handle_start(self) -> Position {
        match self {
            PlayerSlot::PlayerOne => HANDLE_START_P1,
            PlayerSlot::PlayerTwo => HANDLE_START_P2,
        }
    }

    /// Where the puck is served from when this player takes the kick-off
    pub fn puck_start(self) -> Position {
        match self {
            PlayerSlot::PlayerOne => PUCK_START_P1,
            PlayerSlot::PlayerTwo => PUCK_START_P2,
        }
    }
}

impl fmt::Display for PlayerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerSlot::PlayerOne => f.write_str("player-1"),
            PlayerSlot::PlayerTwo => f.write_str("player-2"),
        }
    }
}

impl FromStr for PlayerSlot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "player-1" | "1" => Ok(PlayerSlot::PlayerOne),
            "player-2" | "2" => Ok(PlayerSlot::PlayerTwo),
            other => Err(format!("unknown player slot '{}'", other)),
        }
    }
}

/// Everything the simulation owns for one match
#[derive(Debug)]
pub struct BoardState {
    pub puck: Puck,
    handles: [Handle; 2],
    /// Incremented on every reset; its parity picks the kick-off side
    resets: u64,
}

impl BoardState {
    pub fn new() -> Self {
        Self {
            puck: Puck::new(PUCK_START_P1),
            handles: [
                Handle::new(HANDLE_START_P1),
                Handle::new(HANDLE_START_P2),
            ],
            resets: 0,
        }
    }

    #[inline]
    pub fn handle(&self, slot: PlayerSlot) -> &Handle {
        &self.handles[slot.index()]
    }

    #[inline]
    pub fn handle_mut(&mut self, slot: PlayerSlot) -> &mut Handle {
        &mut self.handles[slot.index()]
    }

    /// Shared input cells, indexed by `PlayerSlot::index`
    pub fn inputs(&self) -> [Arc<HandlePosition>; 2] {
        [self.handles[0].input(), self.handles[1].input()]
    }

    pub fn reset_count(&self) -> u64 {
        self.resets
    }

    /// Put everything back at its start position, alternating the kick-off side
    pub fn reset(&mut self) {
        self.resets += 1;
        let kick_off = if self.resets % 2 == 1 {
            PlayerSlot::PlayerTwo
        } else {
            PlayerSlot::PlayerOne
        };

        self.puck.set_position(kick_off.puck_start());
        self.puck.set_velocity(Vec2::ZERO);
        self.puck.reset_friction();

        for slot in PlayerSlot::ALL {
            self.handles[slot.index()].reset_to(slot.handle_start());
        }
    }

    /// Update every handle's derived velocity from this tick's input
    pub fn update_handle_velocities(&mut self) {
        for handle in &mut self.handles {
            handle.update_velocity();
        }
    }

    /// All simulated values are finite numbers
    pub fn is_finite(&self) -> bool {
        self.puck.position().is_finite()
            && self.puck.velocity().is_finite()
            && self
                .handles
                .iter()
                .all(|h| h.position().is_finite() && h.velocity().is_finite())
    }
}

impl Default for BoardState {
    fn default() -> Self {
        Self::new()
    }
}
