//! Match simulation: board geometry, physics, collision and the tick loop

#[cfg(feature = "ai_opponent")]
pub mod ai;
pub mod bodies;
pub mod collision;
pub mod constants;
pub mod engine;
pub mod game_loop;
pub mod match_result;
pub mod space;
pub mod state;
