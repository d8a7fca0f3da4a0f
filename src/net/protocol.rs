//! Wire messages
//!
//! A connection opens with one JSON control message each way, then switches to
//! fixed-size binary frames: 16-byte handle updates in, 40-byte board frames out.

use serde::{Deserialize, Serialize};

use crate::game::constants::net::{BROADCAST_FRAME_BYTES, HANDLE_UPDATE_BYTES};
use crate::game::space::Position;
use crate::game::state::{BoardState, MatchId, PlayerId, PlayerSlot};
use crate::net::framing::{FrameBuilder, FrameReader};

/// First message sent by a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientHello {
    /// Attach to a seat in an existing match (roster handled elsewhere)
    Bind { match_id: MatchId, slot: PlayerSlot },
    /// Join any open match, or create one
    QuickPlay {
        username: String,
        /// Play against the server instead of waiting for a human
        #[serde(default)]
        practice: bool,
    },
}

/// Server reply to [`ClientHello`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerHello {
    Welcome {
        match_id: MatchId,
        slot: PlayerSlot,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        player_id: Option<PlayerId>,
    },
    Rejected { reason: String },
}

/// Per-recipient board view for one tick.
///
/// Positions are in the recipient's own frame: player two sees the board
/// rotated so their handle is at the bottom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BroadcastFrame {
    pub opponent: Position,
    pub puck: Position,
    pub remaining_seconds: f64,
}

impl BroadcastFrame {
    pub fn for_player(slot: PlayerSlot, board: &BoardState, remaining_seconds: f64) -> Self {
        let opponent = board.handle(slot.opponent()).position();
        let puck = board.puck.position();
        match slot {
            PlayerSlot::PlayerOne => Self {
                opponent,
                puck,
                remaining_seconds,
            },
            PlayerSlot::PlayerTwo => Self {
                opponent: opponent.mirror(),
                puck: puck.mirror(),
                remaining_seconds,
            },
        }
    }

    /// `opponentX, opponentY, puckX, puckY, remainingSeconds` as little-endian f64
    pub fn encode(&self) -> [u8; BROADCAST_FRAME_BYTES] {
        FrameBuilder::<BROADCAST_FRAME_BYTES>::new()
            .write_f64(self.opponent.x)
            .write_f64(self.opponent.y)
            .write_f64(self.puck.x)
            .write_f64(self.puck.y)
            .write_f64(self.remaining_seconds)
            .build()
    }

    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = FrameReader::new(data);
        let mut read = || -> Option<Self> {
            Some(Self {
                opponent: Position::new(reader.read_f64()?, reader.read_f64()?),
                puck: Position::new(reader.read_f64()?, reader.read_f64()?),
                remaining_seconds: reader.read_f64()?,
            })
        };
        read().ok_or(ProtocolError::TooShort {
            expected: BROADCAST_FRAME_BYTES,
            actual: data.len(),
        })
    }
}

/// Client-reported handle position, in the sender's own frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandleUpdate {
    pub position: Position,
}

impl HandleUpdate {
    pub fn encode(&self) -> [u8; HANDLE_UPDATE_BYTES] {
        FrameBuilder::<HANDLE_UPDATE_BYTES>::new()
            .write_f64(self.position.x)
            .write_f64(self.position.y)
            .build()
    }

    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = FrameReader::new(data);
        let (Some(x), Some(y)) = (reader.read_f64(), reader.read_f64()) else {
            return Err(ProtocolError::TooShort {
                expected: HANDLE_UPDATE_BYTES,
                actual: data.len(),
            });
        };

        let position = Position::new(x, y);
        if !position.is_finite() {
            return Err(ProtocolError::NonFinite);
        }
        Ok(Self { position })
    }
}

/// Encode a control message
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, EncodeError> {
    serde_json::to_vec(message).map_err(|e| EncodeError(e.to_string()))
}

/// Decode a control message
pub fn decode<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, DecodeError> {
    serde_json::from_slice(data).map_err(|e| DecodeError(e.to_string()))
}

#[derive(Debug, thiserror::Error)]
#[error("Encode error: {0}")]
pub struct EncodeError(String);

#[derive(Debug, thiserror::Error)]
#[error("Decode error: {0}")]
pub struct DecodeError(String);

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProtocolError {
    #[error("frame too short: {actual} bytes (need {expected})")]
    TooShort { expected: usize, actual: usize },
    #[error("non-finite coordinate")]
    NonFinite,
}
