//! Per-move search budgets.
//!
//! The time manager turns the configured management mode and the resources
//! left for the game into the allowance of a single search, then charges the
//! search's actual usage back against the game's resources.

use std::fmt;
use std::time::Duration;

use crate::board::Board;
use crate::constants::{
    MIN_PLAYOUT_MOVES_BUDGET, MIN_TIME_BUDGET, PLAYOUT_MOVES_PER_GAME, PLAYOUTS_PER_MOVE,
    RESOURCES_PART, TIME_PER_GAME,
};

/// What limits a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeManagement {
    /// A fixed number of playouts for every move.
    PlayoutsPerMove = 0,
    /// A quota of simulated moves shared by the whole game.
    PlayoutMovesPerGame = 1,
    /// A wall-clock allowance shared by the whole game.
    Time = 2,
}

impl TimeManagement {
    /// Mode for a numeric selector, as used by the text protocol.
    pub fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(Self::PlayoutsPerMove),
            1 => Some(Self::PlayoutMovesPerGame),
            2 => Some(Self::Time),
            _ => None,
        }
    }
}

impl fmt::Display for TimeManagement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlayoutsPerMove => write!(f, "playouts per move"),
            Self::PlayoutMovesPerGame => write!(f, "playout moves per game"),
            Self::Time => write!(f, "time"),
        }
    }
}

/// Allowance for one search. Always strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Budget {
    Playouts(u64),
    PlayoutMoves(u64),
    Time(Duration),
}

/// Resources a search actually used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub playouts: u64,
    pub playout_moves: u64,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct TimeManager {
    pub management: TimeManagement,
    pub playouts_per_move: u64,
    pub playout_moves_left: u64,
    pub time_left: Duration,
    /// Share of the remaining per-move estimate a move may spend.
    pub resources_part: f64,
}

impl Default for TimeManager {
    fn default() -> Self {
        Self::new(RESOURCES_PART)
    }
}

impl TimeManager {
    pub fn new(resources_part: f64) -> Self {
        Self {
            management: TimeManagement::PlayoutsPerMove,
            playouts_per_move: PLAYOUTS_PER_MOVE,
            playout_moves_left: PLAYOUT_MOVES_PER_GAME,
            time_left: TIME_PER_GAME,
            resources_part,
        }
    }

    /// Restore the per-game resources for a new game.
    pub fn reset(&mut self) {
        self.playout_moves_left = PLAYOUT_MOVES_PER_GAME;
        self.time_left = TIME_PER_GAME;
    }

    /// Allowance for the next move on `board`.
    pub fn budget(&self, board: &Board) -> Budget {
        let moves = remaining_moves(board);
        match self.management {
            TimeManagement::PlayoutsPerMove => Budget::Playouts(self.playouts_per_move.max(1)),
            TimeManagement::PlayoutMovesPerGame => Budget::PlayoutMoves(
                (self.playout_moves_left / moves).max(MIN_PLAYOUT_MOVES_BUDGET),
            ),
            TimeManagement::Time => {
                let part = if self.resources_part.is_finite() {
                    self.resources_part.clamp(0.0, 1.0)
                } else {
                    RESOURCES_PART
                };
                let share = self.time_left.mul_f64(part) / moves as u32;
                Budget::Time(share.max(MIN_TIME_BUDGET))
            }
        }
    }

    /// Charge a finished search against the game's resources.
    pub fn consume(&mut self, usage: Usage) {
        match self.management {
            TimeManagement::PlayoutsPerMove => {}
            TimeManagement::PlayoutMovesPerGame => {
                self.playout_moves_left =
                    self.playout_moves_left.saturating_sub(usage.playout_moves);
            }
            TimeManagement::Time => {
                self.time_left = self.time_left.saturating_sub(usage.elapsed);
            }
        }
    }
}

/// Estimated moves the player to move still has to make.
fn remaining_moves(board: &Board) -> u64 {
    ((board.empties().len() as u64 + 1) / 2).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Location;
    use crate::constants::CELLS;

    #[test]
    fn test_playouts_per_move_is_exact() {
        let mut tm = TimeManager::default();
        tm.playouts_per_move = 123;
        let board = Board::new();
        assert_eq!(tm.budget(&board), Budget::Playouts(123));
        tm.consume(Usage {
            playouts: 123,
            playout_moves: 5000,
            elapsed: Duration::from_secs(1),
        });
        assert_eq!(tm.budget(&board), Budget::Playouts(123));
        tm.playouts_per_move = 0;
        assert_eq!(tm.budget(&board), Budget::Playouts(1));
    }

    #[test]
    fn test_playout_moves_split_over_remaining_moves() {
        let mut tm = TimeManager::default();
        tm.management = TimeManagement::PlayoutMovesPerGame;
        tm.playout_moves_left = 1_000_000;
        let board = Board::new();
        let moves = (CELLS as u64 + 1) / 2;
        assert_eq!(tm.budget(&board), Budget::PlayoutMoves(1_000_000 / moves));

        tm.consume(Usage {
            playout_moves: 2_000_000,
            ..Usage::default()
        });
        assert_eq!(tm.playout_moves_left, 0);
        assert_eq!(
            tm.budget(&board),
            Budget::PlayoutMoves(MIN_PLAYOUT_MOVES_BUDGET)
        );
    }

    #[test]
    fn test_time_budget_is_positive() {
        let mut tm = TimeManager::new(0.5);
        tm.management = TimeManagement::Time;
        tm.time_left = Duration::from_secs(100);
        let mut board = Board::new();
        let Budget::Time(first) = tm.budget(&board) else {
            panic!("expected a time budget");
        };
        assert!(first > Duration::ZERO);
        assert!(first <= Duration::from_secs(50));

        // Fewer moves left: a larger share per move.
        for loc in Location::all().take(CELLS / 2) {
            board.play_stone(loc, board.to_move());
        }
        let Budget::Time(later) = tm.budget(&board) else {
            panic!("expected a time budget");
        };
        assert!(later > first);

        tm.consume(Usage {
            elapsed: Duration::from_secs(1000),
            ..Usage::default()
        });
        assert_eq!(tm.time_left, Duration::ZERO);
        assert_eq!(tm.budget(&board), Budget::Time(MIN_TIME_BUDGET));
    }

    #[test]
    fn test_non_finite_resources_part_uses_default() {
        let mut board = Board::new();
        board.play_stone(Location::center(), board.to_move());
        let mut expected = TimeManager::default();
        expected.management = TimeManagement::Time;
        for part in [f64::NAN, f64::INFINITY] {
            let mut tm = TimeManager::new(part);
            tm.management = TimeManagement::Time;
            assert_eq!(tm.budget(&board), expected.budget(&board));
        }
    }

    #[test]
    fn test_mode_selector() {
        assert_eq!(
            TimeManagement::from_index(1),
            Some(TimeManagement::PlayoutMovesPerGame)
        );
        assert_eq!(TimeManagement::from_index(3), None);
        assert_eq!(TimeManagement::Time.to_string(), "time");
    }
}
