//! Hex board representation and connectivity.
//!
//! This module provides the core game logic:
//! - Cell state stored in a 1D array with a padding ring
//! - Union-find groups, with two edge sentinels per player
//! - Edge-to-edge win detection
//! - An incremental bridge-carrier index
//!
//! Black connects the top and bottom edges, White the left and right edges.
//! Black moves first.

use std::fmt;

use crate::constants::*;

/// One of the two players.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Player {
    Black,
    White,
}

impl Player {
    pub const ALL: [Player; 2] = [Player::Black, Player::White];

    #[inline]
    pub fn opponent(self) -> Player {
        match self {
            Player::Black => Player::White,
            Player::White => Player::Black,
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        match self {
            Player::Black => 0,
            Player::White => 1,
        }
    }

    #[inline]
    fn stone(self) -> Cell {
        match self {
            Player::Black => Cell::Black,
            Player::White => Cell::White,
        }
    }

    /// The two edge sentinels this player must join.
    #[inline]
    fn edges(self) -> (usize, usize) {
        match self {
            Player::Black => (EDGE_TOP, EDGE_BOTTOM),
            Player::White => (EDGE_LEFT, EDGE_RIGHT),
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Player::Black => write!(f, "black"),
            Player::White => write!(f, "white"),
        }
    }
}

/// State of a board array entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Cell {
    Empty,
    Black,
    White,
    /// Padding outside the playable area.
    Out,
}

impl Cell {
    #[inline]
    pub fn player(self) -> Option<Player> {
        match self {
            Cell::Black => Some(Player::Black),
            Cell::White => Some(Player::White),
            _ => None,
        }
    }
}

/// A playable cell, stored as its index into the padded board array.
///
/// Only on-board locations can be constructed, so every `Location` satisfies
/// `0 <= row, col < N`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Location(u16);

impl Location {
    /// Location at `(row, col)`, or `None` when off the board.
    pub fn new(row: usize, col: usize) -> Option<Self> {
        if row < N && col < N {
            Some(Location(((row + 1) * W + col + 1) as u16))
        } else {
            None
        }
    }

    /// Location for a padded array index. The index must be on the board.
    #[inline]
    pub(crate) fn from_index(index: usize) -> Self {
        debug_assert!(is_on_board(index), "index {index} is not a board cell");
        Location(index as u16)
    }

    #[inline]
    pub fn row(self) -> usize {
        self.0 as usize / W - 1
    }

    #[inline]
    pub fn col(self) -> usize {
        self.0 as usize % W - 1
    }

    /// Index into the padded board array.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// The center cell of the board.
    pub fn center() -> Self {
        Location::from_index((N / 2 + 1) * W + N / 2 + 1)
    }

    /// All board locations in row-major order.
    pub fn all() -> impl Iterator<Item = Location> {
        (0..N).flat_map(|row| (0..N).map(move |col| Location::from_index((row + 1) * W + col + 1)))
    }

    /// On-board neighbours in cyclic order.
    pub fn neighbors(self) -> impl Iterator<Item = Location> {
        let i = self.index();
        DELTA
            .into_iter()
            .map(move |d| (i as isize + d) as usize)
            .filter(|&n| is_on_board(n))
            .map(Location::from_index)
    }

    /// Hex distance between two locations.
    pub fn distance(self, other: Location) -> usize {
        let dr = self.row() as isize - other.row() as isize;
        let dc = self.col() as isize - other.col() as isize;
        ((dr.abs() + dc.abs() + (dr + dc).abs()) / 2) as usize
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row(), self.col())
    }
}

/// Whether a padded array index is a playable cell.
#[inline]
pub(crate) fn is_on_board(index: usize) -> bool {
    let (row, col) = (index / W, index % W);
    (1..=N).contains(&row) && (1..=N).contains(&col)
}

/// Owner of the edge a padding cell lies on. Cells beyond a corner belong
/// to both edges and give `None`.
#[inline]
pub(crate) fn edge_owner(index: usize) -> Option<Player> {
    let (row, col) = (index / W, index % W);
    let row_out = row == 0 || row == N + 1;
    let col_out = col == 0 || col == N + 1;
    match (row_out, col_out) {
        (true, false) => Some(Player::Black),
        (false, true) => Some(Player::White),
        _ => None,
    }
}

/// Neighbour of `index` in direction `d`, padding included.
#[inline]
pub(crate) fn step(index: usize, d: usize) -> usize {
    (index as isize + DELTA[d]) as usize
}

/// A move: a player placing a stone at a location.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Move {
    pub player: Player,
    pub location: Location,
}

impl Move {
    pub fn new(player: Player, location: Location) -> Self {
        Self { player, location }
    }
}

/// A bridge: two same-colour stones at distance two whose two common
/// neighbours (the carriers) are both empty.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Bridge {
    pub owner: Player,
    pub ends: (Location, Location),
    pub carriers: (Location, Location),
}

/// Hex board state.
#[derive(Clone)]
pub struct Board {
    cells: [Cell; BOARDSIZE],
    /// Union-find parent links; the last four slots are edge sentinels.
    parent: [u16; UF_SIZE],
    /// Per player, per cell: bit `d` is set when the cell and its neighbour in
    /// direction `d` carry one of that player's bridges.
    carriers: [[u8; BOARDSIZE]; 2],
    /// Bridge carriers the last move intruded into, left empty for the owner.
    intrusions: Vec<Location>,
    empty: Vec<Location>,
    /// Position of each empty location inside `empty`.
    empty_pos: [u16; BOARDSIZE],
    to_move: Player,
    last: Option<Move>,
    winner: Option<Player>,
    moves_played: usize,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    /// An empty board with Black to move.
    pub fn new() -> Self {
        let mut cells = [Cell::Out; BOARDSIZE];
        let mut empty = Vec::with_capacity(CELLS);
        let mut empty_pos = [u16::MAX; BOARDSIZE];
        for loc in Location::all() {
            cells[loc.index()] = Cell::Empty;
            empty_pos[loc.index()] = empty.len() as u16;
            empty.push(loc);
        }
        let mut parent = [0u16; UF_SIZE];
        for (i, p) in parent.iter_mut().enumerate() {
            *p = i as u16;
        }
        Self {
            cells,
            parent,
            carriers: [[0; BOARDSIZE]; 2],
            intrusions: Vec::new(),
            empty,
            empty_pos,
            to_move: Player::Black,
            last: None,
            winner: None,
            moves_played: 0,
        }
    }

    #[inline]
    pub fn cell(&self, loc: Location) -> Cell {
        self.cells[loc.index()]
    }

    #[inline]
    pub(crate) fn cell_at(&self, index: usize) -> Cell {
        self.cells[index]
    }

    #[inline]
    pub fn is_empty(&self, loc: Location) -> bool {
        self.cells[loc.index()] == Cell::Empty
    }

    #[inline]
    pub fn to_move(&self) -> Player {
        self.to_move
    }

    #[inline]
    pub fn last_move(&self) -> Option<Move> {
        self.last
    }

    #[inline]
    pub fn winner(&self) -> Option<Player> {
        self.winner
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.winner.is_some()
    }

    #[inline]
    pub fn moves_played(&self) -> usize {
        self.moves_played
    }

    /// Empty locations, in no particular order.
    #[inline]
    pub fn empties(&self) -> &[Location] {
        &self.empty
    }

    /// A move is valid when its cell is empty and nobody has won yet.
    pub fn is_valid_move(&self, mv: Move) -> bool {
        self.winner.is_none() && self.is_empty(mv.location)
    }

    /// Place a stone for `player` and update groups, bridges and the winner.
    ///
    /// The cell must be empty. Stones may still be placed after the game is
    /// decided (playouts that fill the board do so); the winner never changes.
    pub fn play_stone(&mut self, loc: Location, player: Player) {
        let i = loc.index();
        debug_assert_eq!(self.cells[i], Cell::Empty, "play_stone on occupied cell {loc}");
        let stone = player.stone();
        self.cells[i] = stone;
        self.remove_empty(loc);

        for d in 0..6 {
            let n = step(i, d);
            match self.cells[n] {
                c if c == stone => self.union(i, n),
                Cell::Out => {
                    if let Some(edge) = edge_of(n, player) {
                        self.union(i, edge);
                    }
                }
                _ => {}
            }
        }
        self.update_bridges(i, player);

        self.moves_played += 1;
        self.last = Some(Move::new(player, loc));
        self.to_move = player.opponent();
        if self.winner.is_none() && self.connected(player) {
            self.winner = Some(player);
        }
    }

    /// Whether `player` has joined both of their edges.
    pub fn connected(&self, player: Player) -> bool {
        let (a, b) = player.edges();
        self.root(a) == self.root(b)
    }

    /// Whether a stone for `player` at `loc` would join both of their edges.
    pub fn would_connect(&self, loc: Location, player: Player) -> bool {
        let (a, b) = player.edges();
        let (root_a, root_b) = (self.root(a), self.root(b));
        let stone = player.stone();
        let (mut touches_a, mut touches_b) = (false, false);
        for d in 0..6 {
            let n = step(loc.index(), d);
            let root = match self.cells[n] {
                c if c == stone => self.root(n),
                Cell::Out => match edge_of(n, player) {
                    Some(edge) => self.root(edge),
                    None => continue,
                },
                _ => continue,
            };
            touches_a |= root == root_a;
            touches_b |= root == root_b;
        }
        touches_a && touches_b
    }

    /// Group representative of an occupied location.
    pub fn group_id(&self, loc: Location) -> Option<usize> {
        self.cells[loc.index()].player().map(|_| self.root(loc.index()))
    }

    /// Whether two occupied locations belong to the same group.
    pub fn same_group(&self, a: Location, b: Location) -> bool {
        match (self.group_id(a), self.group_id(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    /// Whether `loc` is a carrier of one of `player`'s bridges.
    #[inline]
    pub fn is_carrier(&self, loc: Location, player: Player) -> bool {
        self.carriers[player.index()][loc.index()] != 0
    }

    /// Empty cells that save bridges of the player to move after the last
    /// move intruded into them.
    #[inline]
    pub fn bridge_defenses(&self) -> &[Location] {
        &self.intrusions
    }

    /// Whether a stone for `player` at the empty `loc` would form a new bridge
    /// with one of their stones.
    pub fn forms_bridge(&self, loc: Location, player: Player) -> bool {
        let i = loc.index();
        let stone = player.stone();
        (0..6).any(|d| {
            let far = i as isize + BRIDGE_DELTA[d];
            far >= 0
                && (far as usize) < BOARDSIZE
                && self.cells[far as usize] == stone
                && self.cells[step(i, d)] == Cell::Empty
                && self.cells[step(i, (d + 1) % 6)] == Cell::Empty
        })
    }

    /// Carriers of the bridge between two stones, if one is recorded.
    pub fn bridge_carriers(&self, a: Location, b: Location) -> Option<(Location, Location)> {
        self.bridges(self.cell(a).player()?)
            .into_iter()
            .find(|br| br.ends == (a, b) || br.ends == (b, a))
            .map(|br| br.carriers)
    }

    /// All bridges currently recorded for `player`.
    pub fn bridges(&self, player: Player) -> Vec<Bridge> {
        let mut out = Vec::new();
        for a in Location::all() {
            let mask = self.carriers[player.index()][a.index()];
            for e in 0..6 {
                if mask & (1 << e) == 0 {
                    continue;
                }
                let b = step(a.index(), e);
                if b < a.index() {
                    continue;
                }
                let x = step(a.index(), (e + 1) % 6);
                let y = step(a.index(), (e + 5) % 6);
                out.push(Bridge {
                    owner: player,
                    ends: (Location::from_index(x), Location::from_index(y)),
                    carriers: (a, Location::from_index(b)),
                });
            }
        }
        out
    }

    /// Maintain the carrier index after a stone lands on `i`.
    fn update_bridges(&mut self, i: usize, player: Player) {
        self.intrusions.clear();

        // The new stone resolves every bridge it was carrying.
        for owner in Player::ALL {
            let mask = self.carriers[owner.index()][i];
            if mask == 0 {
                continue;
            }
            for d in 0..6 {
                if mask & (1 << d) == 0 {
                    continue;
                }
                let partner = step(i, d);
                self.carriers[owner.index()][partner] &= !(1 << ((d + 3) % 6));
                if owner != player && self.cells[partner] == Cell::Empty {
                    self.intrusions.push(Location::from_index(partner));
                }
            }
            self.carriers[owner.index()][i] = 0;
        }

        let stone = player.stone();
        for d in 0..6 {
            let far = i as isize + BRIDGE_DELTA[d];
            if far < 0 || far as usize >= BOARDSIZE || self.cells[far as usize] != stone {
                continue;
            }
            let a = step(i, d);
            let b = step(i, (d + 1) % 6);
            if self.cells[a] == Cell::Empty && self.cells[b] == Cell::Empty {
                self.carriers[player.index()][a] |= 1 << ((d + 2) % 6);
                self.carriers[player.index()][b] |= 1 << ((d + 5) % 6);
            }
        }
    }

    fn remove_empty(&mut self, loc: Location) {
        let pos = self.empty_pos[loc.index()] as usize;
        debug_assert!(pos < self.empty.len());
        self.empty.swap_remove(pos);
        if let Some(&moved) = self.empty.get(pos) {
            self.empty_pos[moved.index()] = pos as u16;
        }
        self.empty_pos[loc.index()] = u16::MAX;
    }

    /// Find with path halving.
    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] as usize != x {
            let grand = self.parent[self.parent[x] as usize];
            self.parent[x] = grand;
            x = grand as usize;
        }
        x
    }

    /// Find without compression, for shared access.
    fn root(&self, mut x: usize) -> usize {
        while self.parent[x] as usize != x {
            x = self.parent[x] as usize;
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // Sentinels stay roots so edge lookups remain short.
            if ra >= BOARDSIZE {
                self.parent[rb] = ra as u16;
            } else {
                self.parent[ra] = rb as u16;
            }
        }
    }
}

/// Edge sentinel a padding cell stands for, from `player`'s point of view.
#[inline]
fn edge_of(index: usize, player: Player) -> Option<usize> {
    let (row, col) = (index / W, index % W);
    match player {
        Player::Black if row == 0 => Some(EDGE_TOP),
        Player::Black if row == N + 1 => Some(EDGE_BOTTOM),
        Player::White if col == 0 => Some(EDGE_LEFT),
        Player::White if col == N + 1 => Some(EDGE_RIGHT),
        _ => None,
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..N {
            write!(f, "{:width$}", "", width = row)?;
            for col in 0..N {
                let ch = match self.cells[(row + 1) * W + col + 1] {
                    Cell::Black => 'X',
                    Cell::White => 'O',
                    _ => '.',
                };
                write!(f, "{ch} ")?;
            }
            writeln!(f)?;
        }
        match self.winner {
            Some(p) => writeln!(f, "{p} wins"),
            None => writeln!(f, "{} to move", self.to_move),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(row: usize, col: usize) -> Location {
        Location::new(row, col).unwrap()
    }

    #[test]
    fn test_location_roundtrip() {
        for l in Location::all() {
            assert_eq!(Location::new(l.row(), l.col()), Some(l));
        }
        assert_eq!(Location::new(N, 0), None);
        assert_eq!(Location::new(0, N), None);
        assert_eq!(Location::all().count(), CELLS);
    }

    #[test]
    fn test_neighbors_count() {
        assert_eq!(loc(0, 0).neighbors().count(), 2);
        assert_eq!(loc(0, N - 1).neighbors().count(), 3);
        assert_eq!(Location::center().neighbors().count(), 6);
        for n in Location::center().neighbors() {
            assert_eq!(n.distance(Location::center()), 1);
        }
    }

    #[test]
    fn test_play_updates_state() {
        let mut board = Board::new();
        let c = Location::center();
        board.play_stone(c, Player::Black);
        assert_eq!(board.cell(c), Cell::Black);
        assert_eq!(board.to_move(), Player::White);
        assert_eq!(board.empties().len(), CELLS - 1);
        assert!(!board.empties().contains(&c));
        assert!(!board.is_valid_move(Move::new(Player::White, c)));
    }

    #[test]
    fn test_black_column_wins() {
        let mut board = Board::new();
        for row in 0..N {
            assert!(!board.is_finished());
            board.play_stone(loc(row, 3), Player::Black);
        }
        assert_eq!(board.winner(), Some(Player::Black));
        assert!(!board.is_valid_move(Move::new(Player::White, loc(0, 0))));
    }

    #[test]
    fn test_white_row_wins() {
        let mut board = Board::new();
        for col in 0..N - 1 {
            board.play_stone(loc(5, col), Player::White);
        }
        assert!(board.would_connect(loc(5, N - 1), Player::White));
        assert!(!board.would_connect(loc(5, N - 1), Player::Black));
        board.play_stone(loc(5, N - 1), Player::White);
        assert_eq!(board.winner(), Some(Player::White));
    }

    #[test]
    fn test_black_row_does_not_win() {
        let mut board = Board::new();
        for col in 0..N {
            board.play_stone(loc(5, col), Player::Black);
        }
        assert!(!board.is_finished());
    }

    #[test]
    fn test_diagonal_chain_connects() {
        // (r, c) and (r + 1, c - 1) are adjacent on a rhombic grid.
        let mut board = Board::new();
        for row in 0..N {
            board.play_stone(loc(row, N - 1 - row), Player::Black);
        }
        assert_eq!(board.winner(), Some(Player::Black));
        assert!(board.same_group(loc(0, N - 1), loc(N - 1, 0)));
    }

    #[test]
    fn test_bridge_detection() {
        let mut board = Board::new();
        let a = loc(4, 4);
        let b = loc(3, 5); // adjacent stones form no bridge
        board.play_stone(a, Player::Black);
        board.play_stone(b, Player::Black);
        assert!(board.bridges(Player::Black).is_empty());

        let mut board = Board::new();
        let far = loc(5, 5); // (4,4) + (1,1)
        board.play_stone(a, Player::Black);
        board.play_stone(far, Player::Black);
        let carriers = board.bridge_carriers(a, far).expect("bridge recorded");
        let mut got = [carriers.0, carriers.1];
        got.sort();
        assert_eq!(got, [loc(4, 5), loc(5, 4)]);
        assert!(board.is_carrier(loc(4, 5), Player::Black));
        assert!(!board.is_carrier(loc(4, 5), Player::White));
    }

    #[test]
    fn test_bridge_intrusion_reports_defense() {
        let mut board = Board::new();
        board.play_stone(loc(4, 4), Player::Black);
        board.play_stone(loc(2, 5), Player::Black); // (4,4) + (-2,+1)
        assert!(board.bridge_defenses().is_empty());
        board.play_stone(loc(3, 4), Player::White);
        assert_eq!(board.bridge_defenses(), &[loc(3, 5)]);
        assert!(board.bridges(Player::Black).is_empty());
        board.play_stone(loc(3, 5), Player::Black);
        assert!(board.same_group(loc(4, 4), loc(2, 5)));
        assert!(board.bridge_defenses().is_empty());
    }

    #[test]
    fn test_own_carrier_resolves_bridge() {
        let mut board = Board::new();
        board.play_stone(loc(4, 4), Player::White);
        board.play_stone(loc(5, 2), Player::White); // (4,4) + (+1,-2)
        assert_eq!(board.bridges(Player::White).len(), 1);
        board.play_stone(loc(5, 3), Player::White);
        assert!(board.bridges(Player::White).is_empty());
        assert!(board.bridge_defenses().is_empty());
    }

    #[test]
    fn test_corner_touches_both_edges() {
        // The top-right corner touches Black's top edge and White's right edge.
        let mut board = Board::new();
        for row in 0..N {
            board.play_stone(loc(row, N - 1), Player::White);
        }
        assert!(!board.is_finished());
        assert!(!board.would_connect(loc(0, N - 2), Player::White));

        let mut board = Board::new();
        for row in 0..N {
            board.play_stone(loc(row, N - 1), Player::Black);
        }
        assert_eq!(board.winner(), Some(Player::Black));
    }

    #[test]
    fn test_forms_bridge() {
        let mut board = Board::new();
        board.play_stone(loc(4, 4), Player::Black);
        assert!(board.forms_bridge(loc(5, 5), Player::Black));
        assert!(board.forms_bridge(loc(2, 5), Player::Black));
        assert!(!board.forms_bridge(loc(5, 5), Player::White));
        assert!(!board.forms_bridge(loc(4, 5), Player::Black));

        board.play_stone(loc(4, 5), Player::White);
        assert!(!board.forms_bridge(loc(5, 5), Player::Black));
    }
}
