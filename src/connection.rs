//! Flood-fill connection distances.
//!
//! For each player a 0-1 breadth-first search runs from each of their edges.
//! Own stones cost nothing to cross, empty cells cost one move, opponent
//! stones block. The sum of both distances tells how many moves a connection
//! through a cell still needs, which drives three expansion heuristics:
//! - flood fill: cells on no possible connection of either player are dead
//! - single shortest: cells on one shortest connection get a prior bonus
//! - all shortest: cells on any shortest connection get a prior bonus

use std::collections::VecDeque;

use crate::board::{Board, Cell, Location, Player};
use crate::constants::{BOARDSIZE, N};

/// Distance marker for cells no path can reach.
pub const UNREACHABLE: u16 = u16::MAX;

const NO_PREV: u16 = u16::MAX;

/// Result of one flood from an edge: distances plus the shortest-path tree.
struct Flood {
    dist: [u16; BOARDSIZE],
    prev: [u16; BOARDSIZE],
}

/// Edge-to-cell distances for one player.
pub struct Distances {
    player: Player,
    a: Flood,
    b: Flood,
    shortest: Option<u16>,
}

impl Distances {
    /// Run both floods for `player` on `board`.
    pub fn compute(board: &Board, player: Player) -> Self {
        let edge = |first: bool| -> Vec<Location> {
            let line = if first { 0 } else { N - 1 };
            (0..N)
                .filter_map(|i| match player {
                    Player::Black => Location::new(line, i),
                    Player::White => Location::new(i, line),
                })
                .collect()
        };
        let a = flood(board, player, &edge(true));
        let b = flood(board, player, &edge(false));
        let mut dists = Self {
            player,
            a,
            b,
            shortest: None,
        };
        dists.shortest = Location::all().filter_map(|loc| dists.through(board, loc)).min();
        dists
    }

    /// Empty cells the shortest connection still needs, if any connection
    /// exists. Zero means the player is already connected.
    pub fn shortest(&self) -> Option<u16> {
        self.shortest
    }

    /// Whether some connection of this player can pass through `loc`.
    pub fn reachable(&self, loc: Location) -> bool {
        self.a.dist[loc.index()] != UNREACHABLE && self.b.dist[loc.index()] != UNREACHABLE
    }

    /// Whether `loc` is an empty cell on one of the shortest connections.
    pub fn on_shortest(&self, board: &Board, loc: Location) -> bool {
        board.is_empty(loc) && self.shortest.is_some() && self.through(board, loc) == self.shortest
    }

    /// Empty cells of one shortest connection.
    pub fn single_path(&self, board: &Board) -> Vec<Location> {
        let Some(start) = Location::all().find(|&loc| {
            self.shortest.is_some() && self.through(board, loc) == self.shortest
        }) else {
            return Vec::new();
        };
        let mut path = Vec::new();
        if board.is_empty(start) {
            path.push(start);
        }
        for fl in [&self.a, &self.b] {
            let mut cur = fl.prev[start.index()];
            while cur != NO_PREV {
                let loc = Location::from_index(cur as usize);
                if board.is_empty(loc) {
                    path.push(loc);
                }
                cur = fl.prev[cur as usize];
            }
        }
        path
    }

    /// Length of the best connection passing through `loc`.
    fn through(&self, board: &Board, loc: Location) -> Option<u16> {
        let (a, b) = (self.a.dist[loc.index()], self.b.dist[loc.index()]);
        if a == UNREACHABLE || b == UNREACHABLE {
            return None;
        }
        Some(a + b - cost(board, self.player, loc)?)
    }
}

/// Cost of entering a cell, `None` when blocked.
#[inline]
fn cost(board: &Board, player: Player, loc: Location) -> Option<u16> {
    match board.cell(loc) {
        Cell::Empty => Some(1),
        c if c.player() == Some(player) => Some(0),
        _ => None,
    }
}

fn flood(board: &Board, player: Player, seeds: &[Location]) -> Flood {
    let mut fl = Flood {
        dist: [UNREACHABLE; BOARDSIZE],
        prev: [NO_PREV; BOARDSIZE],
    };
    let mut queue = VecDeque::with_capacity(BOARDSIZE);
    for &s in seeds {
        if let Some(c) = cost(board, player, s) {
            fl.dist[s.index()] = c;
            if c == 0 {
                queue.push_front(s);
            } else {
                queue.push_back(s);
            }
        }
    }
    while let Some(cur) = queue.pop_front() {
        let d = fl.dist[cur.index()];
        for n in cur.neighbors() {
            let Some(c) = cost(board, player, n) else {
                continue;
            };
            if d + c < fl.dist[n.index()] {
                fl.dist[n.index()] = d + c;
                fl.prev[n.index()] = cur.index() as u16;
                if c == 0 {
                    queue.push_front(n);
                } else {
                    queue.push_back(n);
                }
            }
        }
    }
    fl
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(row: usize, col: usize) -> Location {
        Location::new(row, col).unwrap()
    }

    #[test]
    fn test_empty_board_distances() {
        let board = Board::new();
        for player in Player::ALL {
            let d = Distances::compute(&board, player);
            assert_eq!(d.shortest(), Some(N as u16));
            assert!(Location::all().all(|l| d.reachable(l)));
            assert!(d.on_shortest(&board, Location::center()));
        }
    }

    #[test]
    fn test_own_stones_shorten() {
        let mut board = Board::new();
        for row in 0..N - 1 {
            board.play_stone(loc(row, 2), Player::Black);
        }
        let d = Distances::compute(&board, Player::Black);
        assert_eq!(d.shortest(), Some(1));
        assert!(d.on_shortest(&board, loc(N - 1, 2)));
        let path = d.single_path(&board);
        assert_eq!(path.len(), 1);
        assert!(board.is_empty(path[0]));
    }

    #[test]
    fn test_wall_blocks() {
        let mut board = Board::new();
        for col in 0..N {
            board.play_stone(loc(4, col), Player::White);
        }
        let d = Distances::compute(&board, Player::Black);
        assert_eq!(d.shortest(), None);
        assert!(!d.reachable(loc(0, 0)));
        assert!(d.single_path(&board).is_empty());
    }

    #[test]
    fn test_single_path_length_matches_shortest() {
        let mut board = Board::new();
        board.play_stone(Location::center(), Player::White);
        board.play_stone(loc(2, 3), Player::White);
        let d = Distances::compute(&board, Player::White);
        let path = d.single_path(&board);
        assert_eq!(Some(path.len() as u16), d.shortest());
        assert!(path.iter().all(|&l| board.is_empty(l)));
    }
}
