//! Monte Carlo playouts (random game simulation).
//!
//! A playout alternates moves from a leaf position until one side connects
//! its edges (or, with win detection off, until the board is full) and
//! reports the winner. Random choice is overlaid with heuristics, each
//! controlled by a [`Toggles`] switch:
//! - bridge defense: an intrusion into a bridge is answered at once
//! - local patterns: ring-pattern replies around the last move
//! - bridge avoidance: no random moves into one's own bridge carriers
//! - win detection: stop at the first connection
//!
//! The policy is pure given the board, the toggles and the RNG stream.

use fastrand::Rng;

use crate::board::{Board, Location, Move, Player};
use crate::config::Toggles;
use crate::patterns::pattern_moves;

/// Perform a playout on `board`, appending every move to `played`.
///
/// Returns the winner. A full Hex board always has exactly one winner, so
/// `None` only comes back for positions that were never playable.
pub fn playout(
    board: &mut Board,
    toggles: &Toggles,
    rng: &mut Rng,
    played: &mut Vec<Move>,
) -> Option<Player> {
    let mut candidates = Vec::with_capacity(6);

    while !board.empties().is_empty() {
        if toggles.detect_wins && board.is_finished() {
            break;
        }
        let player = board.to_move();
        let loc = choose_move(board, toggles, rng, &mut candidates);
        board.play_stone(loc, player);
        played.push(Move::new(player, loc));
    }

    debug_assert!(board.winner().is_some(), "playout ended without a winner");
    board.winner()
}

/// Pick the next move for the player to move. The board must have an empty
/// cell.
pub fn choose_move(
    board: &Board,
    toggles: &Toggles,
    rng: &mut Rng,
    candidates: &mut Vec<Location>,
) -> Location {
    if toggles.defending_bridges {
        let defenses = board.bridge_defenses();
        if !defenses.is_empty() {
            return defenses[rng.usize(..defenses.len())];
        }
    }

    if toggles.patterns {
        pattern_moves(board, candidates);
        if !candidates.is_empty() {
            return candidates[rng.usize(..candidates.len())];
        }
    }

    random_move(board, toggles.avoiding_bridges, rng)
}

/// Random draws tried before falling back to an exact pick among the cells
/// that are not own carriers.
const AVOID_TRIES: usize = 8;

/// Uniformly random empty cell, skipping own bridge carriers when `avoid` is
/// set and some other cell is available.
fn random_move(board: &Board, avoid: bool, rng: &mut Rng) -> Location {
    let empties = board.empties();
    if !avoid {
        return empties[rng.usize(..empties.len())];
    }

    let player = board.to_move();
    for _ in 0..AVOID_TRIES {
        let loc = empties[rng.usize(..empties.len())];
        if !board.is_carrier(loc, player) {
            return loc;
        }
    }
    let free = empties
        .iter()
        .filter(|&&loc| !board.is_carrier(loc, player))
        .count();
    if free == 0 {
        return empties[rng.usize(..empties.len())];
    }
    let k = rng.usize(..free);
    empties
        .iter()
        .copied()
        .filter(|&loc| !board.is_carrier(loc, player))
        .nth(k)
        .unwrap_or(empties[0])
}
