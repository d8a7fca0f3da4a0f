//! Per-tick collision detection and resolution
//!
//! Detection is priority-ordered and returns at most one [`Collision`] per tick.
//! All distance and angle math happens in physical space (see [`crate::game::space`]).

use crate::game::constants::board::{CENTER, GOAL_WIDTH};
use crate::game::constants::physics::{HANDLE_RESTITUTION, SEPARATION_SLOP, WALL_RESTITUTION};
use crate::game::space::{velocity_to_normalized, velocity_to_physical, Position};
use crate::game::state::{BoardState, PlayerSlot};
use crate::util::vec2::Vec2;

/// The single collision found in a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collision {
    None,
    LeftWall,
    RightWall,
    TopWall,
    BottomWall,
    P1Handle,
    P2Handle,
    /// Puck crossed player one's (bottom) goal line
    P1Goal,
    /// Puck crossed player two's (top) goal line
    P2Goal,
}

impl Collision {
    /// The player credited with a goal, if this collision is one
    pub fn scorer(self) -> Option<PlayerSlot> {
        match self {
            Collision::P1Goal => Some(PlayerSlot::PlayerTwo),
            Collision::P2Goal => Some(PlayerSlot::PlayerOne),
            _ => None,
        }
    }
}

/// Outcome of resolving a collision that the caller must act on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Nothing,
    Goal { scorer: PlayerSlot },
}

#[inline]
fn in_goal_mouth(x: f64) -> bool {
    x >= CENTER.x - GOAL_WIDTH && x <= CENTER.x + GOAL_WIDTH
}

/// Find the collision for this tick, first match wins
pub fn detect(board: &BoardState) -> Collision {
    let puck = &board.puck;
    if puck.is_off_board() {
        return Collision::None;
    }

    let p = puck.position();
    let r = puck.radius();
    let goal_mouth = in_goal_mouth(p.x);

    if p.y - r.y > 1.0 {
        return if goal_mouth { Collision::P1Goal } else { Collision::BottomWall };
    }
    if p.y + r.y < 0.0 {
        return if goal_mouth { Collision::P2Goal } else { Collision::TopWall };
    }

    if !goal_mouth {
        if p.y - r.y <= 0.0 {
            return Collision::TopWall;
        }
        if p.y + r.y >= 1.0 {
            return Collision::BottomWall;
        }
    }

    if p.x - r.x <= 0.0 {
        return Collision::LeftWall;
    }
    if p.x + r.x >= 1.0 {
        return Collision::RightWall;
    }

    for (slot, collision) in [
        (PlayerSlot::PlayerOne, Collision::P1Handle),
        (PlayerSlot::PlayerTwo, Collision::P2Handle),
    ] {
        let handle = board.handle(slot);
        let reach = r.physical() + handle.radius().physical();
        if segment_hits_circle(
            handle.previous_position().to_physical(),
            handle.position().to_physical(),
            p.to_physical(),
            reach,
        ) {
            return collision;
        }
    }

    Collision::None
}

/// Apply the physical response for `collision`
pub fn resolve(collision: Collision, board: &mut BoardState) -> Resolution {
    match collision {
        Collision::None => Resolution::Nothing,
        Collision::LeftWall
        | Collision::RightWall
        | Collision::TopWall
        | Collision::BottomWall => {
            bounce_off_wall(collision, board);
            Resolution::Nothing
        }
        Collision::P1Goal | Collision::P2Goal => {
            board.puck.place_off_board();
            match collision.scorer() {
                Some(scorer) => Resolution::Goal { scorer },
                None => Resolution::Nothing,
            }
        }
        Collision::P1Handle => {
            strike(PlayerSlot::PlayerOne, board);
            Resolution::Nothing
        }
        Collision::P2Handle => {
            strike(PlayerSlot::PlayerTwo, board);
            Resolution::Nothing
        }
    }
}

fn bounce_off_wall(wall: Collision, board: &mut BoardState) {
    let puck = &mut board.puck;
    let r = puck.radius();
    let mut p = puck.position();
    let mut v = puck.velocity();

    // Only reflect a component heading into the wall; a puck already leaving keeps going
    match wall {
        Collision::LeftWall => {
            p.x = r.x;
            if v.x < 0.0 {
                v.x = -v.x * WALL_RESTITUTION;
            }
        }
        Collision::RightWall => {
            p.x = 1.0 - r.x;
            if v.x > 0.0 {
                v.x = -v.x * WALL_RESTITUTION;
            }
        }
        Collision::TopWall => {
            p.y = r.y;
            if v.y < 0.0 {
                v.y = -v.y * WALL_RESTITUTION;
            }
        }
        Collision::BottomWall => {
            p.y = 1.0 - r.y;
            if v.y > 0.0 {
                v.y = -v.y * WALL_RESTITUTION;
            }
        }
        _ => return,
    }

    puck.set_position(p);
    puck.set_velocity(v);
}

/// Handle strike: impulse along the first-contact normal, then separate
fn strike(slot: PlayerSlot, board: &mut BoardState) {
    let handle = board.handle(slot);
    let start = handle.previous_position().to_physical();
    let end = handle.position().to_physical();
    let sweep = end - start;
    let handle_velocity = velocity_to_physical(handle.sweep());
    let reach = board.puck.radius().physical() + handle.radius().physical();

    let mut puck_pos = board.puck.position().to_physical();
    let mut puck_vel = velocity_to_physical(board.puck.velocity());

    let contact = first_contact(start, end, puck_pos, reach);
    let normal = (puck_pos - contact)
        .normalize_with_length()
        .or_else(|| sweep.normalize_with_length())
        .map(|(n, _)| n)
        .unwrap_or(match slot {
            PlayerSlot::PlayerOne => Vec2::UP,
            PlayerSlot::PlayerTwo => Vec2::DOWN,
        });

    let approach = (puck_vel - handle_velocity).dot(normal);
    if approach < 0.0 {
        puck_vel -= normal * ((1.0 + HANDLE_RESTITUTION) * approach);
    }

    let overlap = reach - (puck_pos - end).dot(normal);
    if overlap > 0.0 {
        puck_pos += normal * (overlap + SEPARATION_SLOP);
    }

    let puck = &mut board.puck;
    puck.set_position(Position::from_physical(puck_pos));
    puck.set_velocity(velocity_to_normalized(puck_vel));
    puck.reset_friction();
}

/// Closest point to `p` on the segment `a`–`b`
pub fn closest_point_on_segment(a: Vec2, b: Vec2, p: Vec2) -> Vec2 {
    let ab = b - a;
    let len_sq = ab.length_sq();
    if len_sq <= f64::EPSILON {
        return a;
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

/// Whether the segment `a`–`b` passes within `radius` of `center`
pub fn segment_hits_circle(a: Vec2, b: Vec2, center: Vec2, radius: f64) -> bool {
    closest_point_on_segment(a, b, center).distance_to(center) <= radius
}

/// Earliest point along `a`–`b` that lies on or inside the circle
///
/// Solves `|a + t(b - a) - center|² = radius²` for the smaller root. A segment
/// that starts inside the circle contacts at `a`; a zero-length segment at `a`;
/// a negative discriminant falls back to the closest point on the segment.
pub fn first_contact(a: Vec2, b: Vec2, center: Vec2, radius: f64) -> Vec2 {
    let d = b - a;
    let f = a - center;

    let qa = d.length_sq();
    if qa <= f64::EPSILON {
        return a;
    }
    let qc = f.length_sq() - radius * radius;
    if qc <= 0.0 {
        return a;
    }
    let qb = 2.0 * f.dot(d);

    let disc = qb * qb - 4.0 * qa * qc;
    if disc < 0.0 {
        return closest_point_on_segment(a, b, center);
    }

    let t = ((-qb - disc.sqrt()) / (2.0 * qa)).clamp(0.0, 1.0);
    a + d * t
}
