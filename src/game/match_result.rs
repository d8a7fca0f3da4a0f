//! Final score of a match

use std::fmt;

use crate::game::state::PlayerSlot;

/// One player's line in the result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerScore {
    pub slot: PlayerSlot,
    pub name: String,
    pub goals: u32,
}

/// Match result information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// `None` on a draw
    pub winner: Option<PlayerSlot>,
    /// Ordered by slot
    pub scores: Vec<PlayerScore>,
}

impl MatchResult {
    pub fn winner_name(&self) -> Option<&str> {
        let winner = self.winner?;
        self.scores
            .iter()
            .find(|s| s.slot == winner)
            .map(|s| s.name.as_str())
    }

    pub fn is_draw(&self) -> bool {
        self.winner.is_none()
    }
}

impl fmt::Display for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Result:")?;
        for (i, score) in self.scores.iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{}{}: {}", sep, score.name, score.goals)?;
        }
        match self.winner_name() {
            Some(name) => write!(f, " ({} wins)", name),
            None => f.write_str(" (draw)"),
        }
    }
}

/// Determine the result from each seated player's goals
pub fn determine_result(scores: impl IntoIterator<Item = PlayerScore>) -> MatchResult {
    let mut scores: Vec<PlayerScore> = scores.into_iter().collect();
    scores.sort_by_key(|s| s.slot.index());

    let best = scores.iter().map(|s| s.goals).max();
    let mut leaders = scores.iter().filter(|s| Some(s.goals) == best);

    let winner = match (leaders.next(), leaders.next()) {
        (Some(only), None) => Some(only.slot),
        _ => None,
    };

    MatchResult { winner, scores }
}
