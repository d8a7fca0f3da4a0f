/// Board geometry. Based on the canvas coordinate system: origin top-left, x and y in [0, 1].
/// Must be kept in sync with the client renderer.
pub mod board {
    use crate::game::space::{Position, Radius};

    /// Board width divided by board height
    pub const ASPECT_RATIO: f64 = 0.625;
    /// Half-width of the goal mouth around x = 0.5
    pub const GOAL_WIDTH: f64 = 0.15 - 0.03;
    /// Centre of the board
    pub const CENTER: Position = Position::new(0.5, 0.5);
    /// Where a scored puck waits until it respawns
    pub const OFF_BOARD: Position = Position::new(-1.0, -1.0);

    pub const PUCK_RADIUS: Radius = Radius::from_width(0.06);
    pub const HANDLE_RADIUS: Radius = Radius::from_width(0.09);

    pub const HANDLE_START_P1: Position = Position::new(0.5, 0.8);
    pub const HANDLE_START_P2: Position = Position::new(0.5, 0.2);
    pub const PUCK_START_P1: Position = Position::new(0.5, 0.6);
    pub const PUCK_START_P2: Position = Position::new(0.5, 0.4);
}

/// Physics constants. Speeds are per-tick displacements in normalized units.
pub mod physics {
    use super::timing::TICK_RATE;

    /// Maximum puck speed magnitude
    pub const MAX_SPEED: f64 = TICK_RATE as f64 / 1200.0;
    /// Multiplicative damping applied to puck velocity every tick
    pub const FRICTION: f64 = 0.995;
    /// Velocity components below this snap to exactly zero
    pub const STOP_THRESHOLD: f64 = 1e-4;
    /// Fraction of normal velocity kept after a wall bounce
    pub const WALL_RESTITUTION: f64 = 0.85;
    /// Fraction of normal relative velocity kept after a handle strike
    pub const HANDLE_RESTITUTION: f64 = 0.9;
    /// Speed given to a puck that came to rest against a wall
    pub const WALL_RECOVERY_SPEED: f64 = 0.002;
    /// Tolerance for "resting on a wall" checks
    pub const EDGE_EPSILON: f64 = 1e-9;
    /// Extra clearance when separating the puck from a handle
    pub const SEPARATION_SLOP: f64 = 1e-6;
}

/// Tick timing
pub mod timing {
    /// Server tick rate in Hz
    pub const TICK_RATE: u32 = 50;
    /// Default match length in seconds
    pub const MATCH_DURATION_SECS: u64 = 20;
    /// Delay between a goal and the puck reappearing, in seconds
    pub const PUCK_RESPAWN_SECS: u64 = 1;
}

/// AI opponent tuning
#[cfg(feature = "ai_opponent")]
pub mod ai {
    use super::board::HANDLE_RADIUS;

    /// Resting y when the puck is in the opponent's half
    pub const DEFENSIVE_Y: f64 = 0.15;
    /// The AI attacks while the puck is above this y
    pub const ATTACK_THRESHOLD_Y: f64 = 0.45;
    /// Fraction of the distance to the target covered each tick
    pub const LERP_SPEED: f64 = 0.12;
    pub const MIN_X: f64 = HANDLE_RADIUS.x;
    pub const MAX_X: f64 = 1.0 - HANDLE_RADIUS.x;
    pub const MIN_Y: f64 = HANDLE_RADIUS.y;
    pub const MAX_Y: f64 = 0.48;
}

/// Networking constants
pub mod net {
    /// Maximum framed message size
    pub const MAX_MESSAGE_SIZE: usize = 4096;
    /// Server → client frame: five little-endian f64
    pub const BROADCAST_FRAME_BYTES: usize = 5 * 8;
    /// Client → server frame: two little-endian f64
    pub const HANDLE_UPDATE_BYTES: usize = 2 * 8;
    /// Outbound frames buffered per connection before frames are dropped
    pub const OUTBOUND_QUEUE: usize = 32;
}
