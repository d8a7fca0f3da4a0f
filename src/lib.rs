//! Air Hockey Match Server Library
//!
//! An authoritative two-player air-hockey server. Each match runs a fixed-rate
//! physics loop on its own task and streams per-player board frames over TCP.
//!
//! # Features
//!
//! - `ai_opponent` - Server-driven opponent for practice matches (enabled by default)

pub mod config;
pub mod game;
pub mod lobby;
pub mod net;
pub mod util;
