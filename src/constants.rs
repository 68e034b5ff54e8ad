//! Board geometry, default search parameters and budget limits.
//!
//! The board uses a 1D array representation with a one-cell padding ring.
//! Padding cells stand for the four board edges, which is how stones get
//! connected to their edge sentinels.
//!
//! # Board Size Configuration
//!
//! The board size is controlled by Cargo features:
//! - `board11x11` (default): 11x11 board
//! - `board9x9`: 9x9 board
//! - `board13x13`: 13x13 board
//!
//! ```sh
//! cargo build                                               # 11x11 (default)
//! cargo build --no-default-features --features board13x13   # 13x13
//! ```

use std::time::Duration;

// =============================================================================
// Board Geometry
// =============================================================================

/// Board size (NxN rhombus).
#[cfg(feature = "board11x11")]
pub const N: usize = 11;

#[cfg(feature = "board9x9")]
pub const N: usize = 9;

#[cfg(feature = "board13x13")]
pub const N: usize = 13;

#[cfg(any(
    all(feature = "board11x11", feature = "board9x9"),
    all(feature = "board11x11", feature = "board13x13"),
    all(feature = "board9x9", feature = "board13x13"),
))]
compile_error!("Enable exactly one board size feature: 'board9x9', 'board11x11' or 'board13x13'");

#[cfg(not(any(feature = "board9x9", feature = "board11x11", feature = "board13x13")))]
compile_error!("Must enable one board size feature: 'board9x9', 'board11x11' or 'board13x13'");

/// Row width including the padding column on both sides.
pub const W: usize = N + 2;

/// Total board array size including the padding ring.
pub const BOARDSIZE: usize = W * W;

/// Number of playable cells.
pub const CELLS: usize = N * N;

/// Union-find slots: one per board array entry plus four edge sentinels.
pub const UF_SIZE: usize = BOARDSIZE + 4;

/// Sentinel for Black's top edge.
pub const EDGE_TOP: usize = BOARDSIZE;
/// Sentinel for Black's bottom edge.
pub const EDGE_BOTTOM: usize = BOARDSIZE + 1;
/// Sentinel for White's left edge.
pub const EDGE_LEFT: usize = BOARDSIZE + 2;
/// Sentinel for White's right edge.
pub const EDGE_RIGHT: usize = BOARDSIZE + 3;

/// Offsets to the six neighbouring cells, in cyclic order around a cell.
/// Order: N (-1,0), NE (-1,+1), E (0,+1), S (+1,0), SW (+1,-1), W (0,-1)
pub const DELTA: [isize; 6] = [
    -(W as isize),
    -(W as isize) + 1,
    1,
    W as isize,
    W as isize - 1,
    -1,
];

/// Offsets to the six bridge partners. `BRIDGE_DELTA[d]` is reached through
/// the carrier pair `DELTA[d]` and `DELTA[(d + 1) % 6]`.
pub const BRIDGE_DELTA: [isize; 6] = [
    DELTA[0] + DELTA[1],
    DELTA[1] + DELTA[2],
    DELTA[2] + DELTA[3],
    DELTA[3] + DELTA[4],
    DELTA[4] + DELTA[5],
    DELTA[5] + DELTA[0],
];

// =============================================================================
// MCTS Parameters
// =============================================================================

/// UCT exploration constant.
pub const ALPHA: f32 = 0.25;

/// RAVE equivalence parameter: visits at which own and RAVE statistics weigh
/// roughly the same.
pub const BETA: f32 = 1000.0;

/// Virtual visits (at a 50% win rate) seeded into every new child.
pub const GAMMA: f32 = 4.0;

/// Virtual wins added to children that create or save a bridge.
pub const BRIDGE_WEIGHT: u32 = 6;

/// Virtual wins added to children on a shortest connection path.
pub const SHORTEST_WEIGHT: u32 = 3;

/// Parent visits needed before a node is expanded under delayed expansion.
pub const EXPAND_VISITS: u32 = 8;

/// Maximum tree depth (effectively unbounded: a game cannot be longer).
pub const MAX_TREE_DEPTH: usize = CELLS;

/// Default arena capacity in nodes.
pub const ARENA_CAPACITY: usize = 1 << 20;

/// Urgency given to children that have never been visited.
pub const UNVISITED_URGENCY: f64 = 1e6;

// =============================================================================
// Time Management
// =============================================================================

/// Default fraction of the remaining resources a single move may spend.
pub const RESOURCES_PART: f64 = 0.5;

/// Default playout count per move.
pub const PLAYOUTS_PER_MOVE: u64 = 20_000;

/// Default playout-move quota for a whole game.
pub const PLAYOUT_MOVES_PER_GAME: u64 = 200_000_000;

/// Default clock for a whole game.
pub const TIME_PER_GAME: Duration = Duration::from_secs(300);

/// Smallest time budget ever handed to a search.
pub const MIN_TIME_BUDGET: Duration = Duration::from_millis(10);

/// Smallest playout-move budget ever handed to a search.
pub const MIN_PLAYOUT_MOVES_BUDGET: u64 = CELLS as u64;
