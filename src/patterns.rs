//! Local ring patterns for playout move generation.
//!
//! A pattern describes the six cells around an empty candidate cell, in the
//! cyclic neighbour order of [`DELTA`](crate::constants::DELTA). The ring is
//! encoded into a 12-bit code (2 bits per cell), and every code matching a
//! pattern is stored in a 4096-bit lookup table (`RINGSET`).
//!
//! Patterns are enumerated over all six rotations, the reflection and the
//! colour swap, so a single source string covers both attacker and defender.
//!
//! A padding cell reads as a stone of the player owning that edge, so edge
//! templates match the same patterns as bridges between two stones.

use std::sync::OnceLock;

use crate::board::{Board, Cell, Location, Player, edge_owner, step};

/// Ring pattern sources. Each character is one neighbour:
/// - X: player to move
/// - O: opponent
/// - .: empty
/// - x: not X (O, . or #)
/// - o: not O (X, . or #)
/// - ?: anything
/// - #: beyond a corner, owned by neither player
const RING_SRC: &[&str] = &[
    // bridge or edge template intrusion: the candidate is the remaining
    // carrier
    "XOX???",
];

static RINGSET: OnceLock<[u8; 512]> = OnceLock::new();

/// Check whether the ring around `loc` matches any pattern.
#[inline]
pub fn ring_match(board: &Board, loc: Location) -> bool {
    let ringset = RINGSET.get_or_init(make_ringset);
    let code = ring_code(board, loc, board.to_move());
    ringset[(code >> 3) as usize] & (1 << (code & 7)) != 0
}

/// Empty neighbours of the last move that match a pattern.
pub fn pattern_moves(board: &Board, out: &mut Vec<Location>) {
    out.clear();
    let Some(last) = board.last_move() else {
        return;
    };
    out.extend(
        last.location
            .neighbors()
            .filter(|&n| board.is_empty(n) && ring_match(board, n)),
    );
}

/// Initialize the pattern table.
///
/// Called automatically on first use of [`ring_match`].
pub fn init_patterns() {
    RINGSET.get_or_init(make_ringset);
}

/// Encode the six neighbours of `loc` as seen by `player`.
fn ring_code(board: &Board, loc: Location, player: Player) -> u16 {
    let mut code = 0u16;
    for d in 0..6 {
        let index = step(loc.index(), d);
        let c = match board.cell_at(index) {
            Cell::Out => match edge_owner(index) {
                Some(owner) if owner == player => b'X',
                Some(_) => b'O',
                None => b'#',
            },
            Cell::Empty => b'.',
            c if c.player() == Some(player) => b'X',
            _ => b'O',
        };
        code |= cell_code(c) << (2 * d);
    }
    code
}

fn make_ringset() -> [u8; 512] {
    let mut ringset = [0u8; 512];
    for src in RING_SRC {
        let src: [u8; 6] = match src.as_bytes().try_into() {
            Ok(s) => s,
            Err(_) => continue,
        };
        enumerate_symmetries(src, &mut ringset);
    }
    ringset
}

/// Add every rotation, reflection and colour swap of a pattern.
fn enumerate_symmetries(src: [u8; 6], ringset: &mut [u8; 512]) {
    let mut reflected = src;
    reflected.reverse();
    for base in [src, reflected] {
        for r in 0..6 {
            let mut rotated = base;
            rotated.rotate_left(r);
            wildexp(&rotated, 0, ringset);
            wildexp(&swapcolor(rotated), 0, ringset);
        }
    }
}

/// Expand wildcards and add all matching rings to the set.
fn wildexp(src: &[u8; 6], i: usize, ringset: &mut [u8; 512]) {
    if i == 6 {
        let code = compute_code(src);
        ringset[(code >> 3) as usize] |= 1 << (code & 7);
        return;
    }
    let choices: &[u8] = match src[i] {
        b'?' => b"XO.#",
        b'x' => b"O.#",
        b'o' => b"X.#",
        _ => {
            wildexp(src, i + 1, ringset);
            return;
        }
    };
    for &c in choices {
        let mut next = *src;
        next[i] = c;
        wildexp(&next, i + 1, ringset);
    }
}

fn compute_code(src: &[u8; 6]) -> u16 {
    src.iter()
        .enumerate()
        .fold(0, |code, (d, &c)| code | cell_code(c) << (2 * d))
}

/// Two-bit cell encoding: O = 0, X = 1, . = 2, # = 3.
fn cell_code(c: u8) -> u16 {
    match c {
        b'O' => 0,
        b'X' => 1,
        b'.' => 2,
        _ => 3,
    }
}

fn swapcolor(mut src: [u8; 6]) -> [u8; 6] {
    for c in src.iter_mut() {
        *c = match *c {
            b'X' => b'O',
            b'O' => b'X',
            b'x' => b'o',
            b'o' => b'x',
            other => other,
        };
    }
    src
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(row: usize, col: usize) -> Location {
        Location::new(row, col).unwrap()
    }

    #[test]
    fn test_make_ringset() {
        let ringset = make_ringset();
        let count: usize = ringset.iter().map(|b| b.count_ones() as usize).sum();
        assert!(count > 0, "Pattern set should have some patterns");
        assert!(count < 4096, "Patterns should not match every ring");
    }

    #[test]
    fn test_compute_code_empty() {
        // 2 (empty) in every slot
        assert_eq!(compute_code(b"......"), 0b1010_1010_1010);
    }

    #[test]
    fn test_empty_ring_does_not_match() {
        let board = Board::new();
        assert!(!ring_match(&board, Location::center()));
    }

    #[test]
    fn test_bridge_save_matches() {
        let mut board = Board::new();
        board.play_stone(loc(4, 4), Player::Black);
        board.play_stone(loc(2, 5), Player::Black);
        board.play_stone(loc(3, 4), Player::White);
        // Black to move: (3, 5) saves the bridge
        assert!(ring_match(&board, loc(3, 5)));
        let mut moves = Vec::new();
        pattern_moves(&board, &mut moves);
        assert!(moves.contains(&loc(3, 5)), "got {moves:?}");
    }

    #[test]
    fn test_edge_template_matches() {
        let mut board = Board::new();
        board.play_stone(loc(1, 4), Player::Black);
        board.play_stone(loc(0, 5), Player::White);
        assert!(ring_match(&board, loc(0, 4)));

        let mut board = Board::new();
        board.play_stone(loc(1, 4), Player::Black);
        board.play_stone(loc(0, 4), Player::White);
        assert!(ring_match(&board, loc(0, 5)));
    }

    #[test]
    fn test_edge_template_needs_own_edge() {
        // Black's second-column stone next to White's edge is no template.
        let mut board = Board::new();
        board.play_stone(loc(4, 1), Player::Black);
        board.play_stone(loc(4, 0), Player::White);
        assert_eq!(board.to_move(), Player::Black);
        assert!(!ring_match(&board, loc(5, 0)));

        // The same shape for White, on White's edge, is one.
        let mut board = Board::new();
        board.play_stone(loc(4, 1), Player::White);
        board.play_stone(loc(4, 0), Player::Black);
        assert_eq!(board.to_move(), Player::White);
        assert!(ring_match(&board, loc(5, 0)));
    }

    #[test]
    fn test_no_last_move_no_patterns() {
        let board = Board::new();
        let mut moves = vec![Location::center()];
        pattern_moves(&board, &mut moves);
        assert!(moves.is_empty());
    }
}
