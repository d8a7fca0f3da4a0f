//! Dynamic bodies: the simulated puck and the externally driven handles

use std::sync::Arc;

use parking_lot::RwLock;

use crate::game::constants::board::{HANDLE_RADIUS, OFF_BOARD, PUCK_RADIUS};
use crate::game::constants::physics::{
    EDGE_EPSILON, FRICTION, MAX_SPEED, STOP_THRESHOLD, WALL_RECOVERY_SPEED,
};
use crate::game::space::{Position, Radius};
use crate::util::vec2::Vec2;

/// The free-moving disc. Fully simulated by the match loop.
#[derive(Debug, Clone)]
pub struct Puck {
    position: Position,
    radius: Radius,
    velocity: Vec2,
    /// Ticks since the last handle strike. Reset on impact.
    friction_ticks: u64,
}

impl Puck {
    pub fn new(position: Position) -> Self {
        Self::with_radius(position, PUCK_RADIUS)
    }

    pub fn with_radius(position: Position, radius: Radius) -> Self {
        Self {
            position,
            radius,
            velocity: Vec2::ZERO,
            friction_ticks: 0,
        }
    }

    #[inline]
    pub fn position(&self) -> Position {
        self.position
    }

    pub fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    #[inline]
    pub fn radius(&self) -> Radius {
        self.radius
    }

    #[inline]
    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    /// Set velocity, scaling it down to `MAX_SPEED` magnitude if needed
    pub fn set_velocity(&mut self, velocity: Vec2) {
        self.velocity = velocity.clamp_length(MAX_SPEED);
    }

    pub fn friction_ticks(&self) -> u64 {
        self.friction_ticks
    }

    pub fn reset_friction(&mut self) {
        self.friction_ticks = 0;
    }

    pub fn is_off_board(&self) -> bool {
        self.position == OFF_BOARD
    }

    /// Park the puck off the board with no velocity (after a goal)
    pub fn place_off_board(&mut self) {
        self.position = OFF_BOARD;
        self.velocity = Vec2::ZERO;
    }

    /// Advance one tick: integrate, damp, then nudge a resting puck off any wall it sits on
    pub fn tick(&mut self) {
        if self.is_off_board() {
            return;
        }

        self.position = self.position.offset(self.velocity);
        self.apply_friction();
        self.recover_from_walls();
        self.friction_ticks = self.friction_ticks.saturating_add(1);
    }

    fn apply_friction(&mut self) {
        let mut v = self.velocity * FRICTION;
        if v.x.abs() < STOP_THRESHOLD {
            v.x = 0.0;
        }
        if v.y.abs() < STOP_THRESHOLD {
            v.y = 0.0;
        }
        self.velocity = v;
    }

    /// A puck stopped by friction while touching a wall would stay wedged there forever
    fn recover_from_walls(&mut self) {
        let p = self.position;
        let r = self.radius;

        if self.velocity.x == 0.0 {
            if p.x - r.x <= EDGE_EPSILON {
                self.velocity.x = WALL_RECOVERY_SPEED;
            } else if p.x + r.x >= 1.0 - EDGE_EPSILON {
                self.velocity.x = -WALL_RECOVERY_SPEED;
            }
        }

        if self.velocity.y == 0.0 {
            if p.y - r.y <= EDGE_EPSILON {
                self.velocity.y = WALL_RECOVERY_SPEED;
            } else if p.y + r.y >= 1.0 - EDGE_EPSILON {
                self.velocity.y = -WALL_RECOVERY_SPEED;
            }
        }
    }
}

/// Authoritative handle position, written by input handlers and read by the match loop.
///
/// The whole `Position` is swapped under a lock, so a tick never observes a torn value.
#[derive(Debug)]
pub struct HandlePosition(RwLock<Position>);

impl HandlePosition {
    pub fn new(position: Position) -> Self {
        Self(RwLock::new(position))
    }

    #[inline]
    pub fn load(&self) -> Position {
        *self.0.read()
    }

    #[inline]
    pub fn store(&self, position: Position) {
        *self.0.write() = position;
    }
}

/// A player-controlled paddle.
///
/// Position is set from outside; velocity is derived once per tick from the position delta.
#[derive(Debug)]
pub struct Handle {
    position: Arc<HandlePosition>,
    previous: Position,
    velocity: Vec2,
    radius: Radius,
}

impl Handle {
    pub fn new(position: Position) -> Self {
        Self {
            position: Arc::new(HandlePosition::new(position)),
            previous: position,
            velocity: Vec2::ZERO,
            radius: HANDLE_RADIUS,
        }
    }

    /// Shared input cell for this handle
    pub fn input(&self) -> Arc<HandlePosition> {
        Arc::clone(&self.position)
    }

    #[inline]
    pub fn position(&self) -> Position {
        self.position.load()
    }

    pub fn set_position(&self, position: Position) {
        self.position.store(position);
    }

    #[inline]
    pub fn previous_position(&self) -> Position {
        self.previous
    }

    #[inline]
    pub fn radius(&self) -> Radius {
        self.radius
    }

    /// Velocity derived at the end of the previous tick
    #[inline]
    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    /// Displacement covered since the last tick boundary (not yet folded into `velocity`)
    #[inline]
    pub fn sweep(&self) -> Vec2 {
        self.position().delta_from(self.previous)
    }

    /// Recompute velocity from the last position seen this tick and roll the
    /// previous position forward
    pub fn update_velocity(&mut self) {
        let current = self.position.load();
        self.velocity = current.delta_from(self.previous);
        self.previous = current;
    }

    /// Teleport to `position` without producing a phantom sweep or velocity spike
    pub fn reset_to(&mut self, position: Position) {
        self.position.store(position);
        self.previous = position;
        self.velocity = Vec2::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELTA: f64 = 1e-10;

    fn puck_at_center() -> Puck {
        Puck::new(Position::new(0.5, 0.5))
    }

    #[test]
    fn test_speed_clamped_by_magnitude() {
        let mut puck = puck_at_center();
        puck.set_velocity(Vec2::new(999.0, 999.0));

        let v = puck.velocity();
        assert!((v.length() - MAX_SPEED).abs() < DELTA);
        assert!((v.x - v.y).abs() < DELTA);
    }

    #[test]
    fn test_speed_clamp_preserves_direction() {
        let mut puck = puck_at_center();
        let requested = Vec2::new(-3.0, 7.0);
        puck.set_velocity(requested);

        let v = puck.velocity();
        assert!((v.length() - MAX_SPEED).abs() < DELTA);
        // positive scalar multiple of the request
        let k = v.x / requested.x;
        assert!(k > 0.0);
        assert!((v.y - requested.y * k).abs() < DELTA);
    }

    #[test]
    fn test_speed_below_cap_unchanged() {
        let mut puck = puck_at_center();
        let low = Vec2::new(MAX_SPEED / 4.0, MAX_SPEED / 4.0);
        puck.set_velocity(low);
        assert_eq!(puck.velocity(), low);
    }

    #[test]
    fn test_tick_moves_by_velocity() {
        let mut puck = puck_at_center();
        puck.set_velocity(Vec2::new(0.01, 0.02));

        puck.tick();

        assert!((puck.position().x - 0.51).abs() < 1e-9);
        assert!((puck.position().y - 0.52).abs() < 1e-9);
    }

    #[test]
    fn test_stationary_puck_stays_put() {
        let mut puck = puck_at_center();
        puck.tick();
        assert_eq!(puck.position(), Position::new(0.5, 0.5));
        assert_eq!(puck.velocity(), Vec2::ZERO);
    }

    #[test]
    fn test_constant_damping_ratio() {
        let mut puck = puck_at_center();
        puck.set_velocity(Vec2::new(0.01, 0.0));

        puck.tick();
        let first = puck.velocity().x;
        puck.tick();
        let second = puck.velocity().x;

        assert!((second / first - FRICTION).abs() < 1e-9);
    }

    #[test]
    fn test_friction_snaps_to_zero() {
        let mut puck = puck_at_center();
        puck.set_velocity(Vec2::new(0.001, -0.001));

        for _ in 0..2000 {
            puck.tick();
        }

        assert_eq!(puck.velocity(), Vec2::ZERO);
    }

    #[test]
    fn test_resting_on_left_wall_recovers() {
        let r = PUCK_RADIUS;
        let mut puck = Puck::new(Position::new(r.x, 0.5));

        puck.tick();

        assert_eq!(puck.velocity().x, WALL_RECOVERY_SPEED);
        assert_eq!(puck.velocity().y, 0.0);
    }

    #[test]
    fn test_resting_on_bottom_wall_recovers_upwards() {
        let r = PUCK_RADIUS;
        let mut puck = Puck::new(Position::new(0.1, 1.0 - r.y));

        puck.tick();

        assert_eq!(puck.velocity().y, -WALL_RECOVERY_SPEED);
    }

    #[test]
    fn test_off_board_puck_is_frozen() {
        let mut puck = puck_at_center();
        puck.place_off_board();

        puck.tick();

        assert!(puck.is_off_board());
        assert_eq!(puck.velocity(), Vec2::ZERO);
    }

    #[test]
    fn test_friction_ticks_reset() {
        let mut puck = puck_at_center();
        puck.tick();
        puck.tick();
        assert_eq!(puck.friction_ticks(), 2);
        puck.reset_friction();
        assert_eq!(puck.friction_ticks(), 0);
    }

    #[test]
    fn test_handle_velocity_is_position_delta() {
        let mut handle = Handle::new(Position::new(0.5, 0.8));
        handle.set_position(Position::new(0.52, 0.75));

        handle.update_velocity();

        assert!(handle.velocity().approx_eq(Vec2::new(0.02, -0.05), DELTA));
        assert_eq!(handle.previous_position(), Position::new(0.52, 0.75));
    }

    #[test]
    fn test_handle_coalesces_writes_between_ticks() {
        let mut handle = Handle::new(Position::new(0.5, 0.8));
        handle.set_position(Position::new(0.1, 0.1));
        handle.set_position(Position::new(0.9, 0.9));
        handle.set_position(Position::new(0.6, 0.8));

        handle.update_velocity();

        assert!(handle.velocity().approx_eq(Vec2::new(0.1, 0.0), DELTA));
    }

    #[test]
    fn test_handle_input_shares_position() {
        let handle = Handle::new(Position::new(0.5, 0.8));
        let input = handle.input();
        input.store(Position::new(0.3, 0.7));
        assert_eq!(handle.position(), Position::new(0.3, 0.7));
    }

    #[test]
    fn test_handle_reset_clears_sweep() {
        let mut handle = Handle::new(Position::new(0.5, 0.8));
        handle.set_position(Position::new(0.1, 0.6));
        handle.update_velocity();

        handle.reset_to(Position::new(0.5, 0.8));

        assert_eq!(handle.sweep(), Vec2::ZERO);
        assert_eq!(handle.velocity(), Vec2::ZERO);
    }
}
