//! Match bookkeeping
//!
//! Seats, ready flags and scores per match, the lifecycle state machine, and
//! the registry of live matches.

pub mod lifecycle;
pub mod manager;
pub mod player;
pub mod room;
