//! Monte Carlo Tree Search (MCTS) with RAVE, run on several threads.
//!
//! One search performs the classic four steps until a stop condition fires:
//! - selection: descend by UCT urgency blended with RAVE statistics
//! - expansion: a node that reached its visit threshold gets one child per
//!   candidate move, seeded with priors
//! - simulation: a playout from the leaf position
//! - backpropagation: visits and wins along the path, RAVE counts for the
//!   siblings whose moves appeared later in the simulation
//!
//! Workers share one [`Tree`] without locks. Each worker owns a clone of the
//! root board and its own RNG; virtual loss steers concurrent workers away
//! from paths already being simulated.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use fastrand::Rng;
use thiserror::Error;
use tracing::{debug, trace};

use crate::board::{Board, Location, Move, Player};
use crate::config::{Config, ConfigError};
use crate::connection::Distances;
use crate::constants::{BOARDSIZE, MAX_TREE_DEPTH, SHORTEST_WEIGHT, UNVISITED_URGENCY};
use crate::playout::playout;
use crate::time_manager::{Budget, Usage};
use crate::tree::{ChildInit, NO_NODE, NodeIdx, Tree};

/// Errors returned by [`Engine`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SearchError {
    #[error("the game is already finished")]
    Finished,

    #[error("a search is running")]
    Running,

    #[error("no legal moves")]
    NoLegalMoves,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Lifecycle of a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    Idle = 0,
    Running = 1,
    Stopping = 2,
    Done = 3,
}

impl SearchState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Running,
            2 => Self::Stopping,
            3 => Self::Done,
            _ => Self::Idle,
        }
    }
}

/// What one search did.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SearchStats {
    pub playouts: u64,
    pub playout_moves: u64,
    pub elapsed: Duration,
    pub root_visits: u32,
    /// Win rate of the chosen move for the player making it.
    pub win_rate: f64,
    /// Nodes allocated in the arena.
    pub nodes: usize,
}

impl SearchStats {
    pub fn usage(&self) -> Usage {
        Usage {
            playouts: self.playouts,
            playout_moves: self.playout_moves,
            elapsed: self.elapsed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchOutcome {
    pub best: Location,
    pub stats: SearchStats,
}

/// Cancels a running search from another thread.
#[derive(Debug, Clone)]
pub struct StopHandle {
    stop: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
}

impl StopHandle {
    /// Ask the running search, if any, to return as soon as possible.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
        let _ = self.state.compare_exchange(
            SearchState::Running as u8,
            SearchState::Stopping as u8,
            Ordering::Relaxed,
            Ordering::Relaxed,
        );
    }

    pub fn state(&self) -> SearchState {
        SearchState::from_u8(self.state.load(Ordering::Relaxed))
    }
}

/// Search engine holding the tree between moves.
pub struct Engine {
    tree: Option<Tree>,
    /// Moves played since the last search, for tree reuse.
    pending: Vec<Move>,
    max_depth: usize,
    stop: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            tree: None,
            pending: Vec::new(),
            max_depth: MAX_TREE_DEPTH,
            stop: Arc::new(AtomicBool::new(false)),
            state: Arc::new(AtomicU8::new(SearchState::Idle as u8)),
        }
    }

    /// Drop the tree, for a new game.
    pub fn reset(&mut self) {
        self.tree = None;
        self.pending.clear();
    }

    /// Record a move played on the game board.
    pub fn notify_play(&mut self, mv: Move) {
        if self.tree.is_some() {
            self.pending.push(mv);
        }
    }

    pub fn state(&self) -> SearchState {
        SearchState::from_u8(self.state.load(Ordering::Relaxed))
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            stop: Arc::clone(&self.stop),
            state: Arc::clone(&self.state),
        }
    }

    pub fn max_tree_depth(&self) -> usize {
        self.max_depth
    }

    /// Limit how deep below the root the tree may grow. The root itself is
    /// always expanded, so depths below one are raised to one.
    pub fn set_max_tree_depth(&mut self, depth: usize) -> Result<(), SearchError> {
        if self.state() == SearchState::Running {
            return Err(SearchError::Running);
        }
        self.max_depth = depth.max(1);
        Ok(())
    }

    /// The tree of the last search, if kept.
    pub fn tree(&self) -> Option<&Tree> {
        self.tree.as_ref()
    }

    /// Search `board` within `budget` and return the most visited root move.
    pub fn search(
        &mut self,
        board: &Board,
        config: &Config,
        budget: Budget,
    ) -> Result<SearchOutcome, SearchError> {
        config.validate()?;
        if board.is_finished() {
            return Err(SearchError::Finished);
        }
        if board.empties().is_empty() {
            return Err(SearchError::NoLegalMoves);
        }
        // Cleared before entering Running so a stop issued from then on sticks.
        self.stop.store(false, Ordering::Relaxed);
        let started = self
            .state
            .fetch_update(Ordering::Acquire, Ordering::Relaxed, |s| {
                matches!(
                    SearchState::from_u8(s),
                    SearchState::Idle | SearchState::Done
                )
                .then_some(SearchState::Running as u8)
            });
        if started.is_err() {
            return Err(SearchError::Running);
        }

        let start = Instant::now();
        let tree = prepare_tree(&mut self.tree, &mut self.pending, board, config);
        let search = Search {
            tree,
            board,
            config,
            max_depth: self.max_depth,
            stop: &self.stop,
            budget,
            playouts: AtomicU64::new(0),
            playout_moves: AtomicU64::new(0),
            start,
        };

        let base_seed = config.seed.unwrap_or_else(|| fastrand::u64(..));
        thread::scope(|s| {
            for i in 0..config.threads {
                let search = &search;
                let seed =
                    base_seed.wrapping_add((i as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
                s.spawn(move || search.work(i, Rng::with_seed(seed)));
            }
        });
        self.state
            .store(SearchState::Stopping as u8, Ordering::Relaxed);

        let stats = search.stats();
        let root = tree.root();
        let best = tree
            .robust_child(root)
            .and_then(|c| tree.node(c).location().map(|loc| (c, loc)));
        self.state.store(SearchState::Done as u8, Ordering::Release);

        let (best_idx, best) = best.ok_or(SearchError::NoLegalMoves)?;
        let stats = SearchStats {
            win_rate: tree.node(best_idx).mover_winrate().unwrap_or(0.0),
            ..stats
        };
        debug!(
            best = %best,
            playouts = stats.playouts,
            playout_moves = stats.playout_moves,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            win_rate = stats.win_rate,
            nodes = stats.nodes,
            "search finished"
        );
        if !config.reuse_tree {
            self.tree = None;
        }
        Ok(SearchOutcome { best, stats })
    }
}

/// Reuse the kept tree for `board` when possible, otherwise build a fresh
/// one. The returned tree has an expanded root.
fn prepare_tree<'a>(
    slot: &'a mut Option<Tree>,
    pending: &mut Vec<Move>,
    board: &Board,
    config: &Config,
) -> &'a Tree {
    let moves = std::mem::take(pending);
    let reusable = match slot.as_mut() {
        Some(tree) if config.reuse_tree && tree.capacity() == config.arena_capacity => {
            tree.len() * 2 <= tree.capacity()
                && tree.promote(&moves)
                && tree.node(tree.root()).to_move() == board.to_move()
        }
        _ => false,
    };

    let root_ready = reusable
        && slot.as_ref().is_some_and(|tree| {
            tree.clear_exhausted();
            let root = tree.root();
            tree.node(root).is_expanded()
                || (tree.try_begin_expand(root) && expand(tree, root, board, config))
        });
    if !root_ready {
        *slot = None;
    } else if let Some(tree) = slot.as_ref() {
        debug!(nodes = tree.len(), visits = tree.node(tree.root()).visits(), "reusing tree");
    }

    let tree = slot.get_or_insert_with(|| {
        let tree = Tree::new(config.arena_capacity, board.to_move());
        let root = tree.root();
        let expanded = tree.try_begin_expand(root) && expand(&tree, root, board, config);
        debug_assert!(expanded, "a fresh arena must hold the root's children");
        tree
    });
    &*tree
}

/// Per-search state shared by the workers.
struct Search<'a> {
    tree: &'a Tree,
    board: &'a Board,
    config: &'a Config,
    max_depth: usize,
    stop: &'a AtomicBool,
    budget: Budget,
    playouts: AtomicU64,
    playout_moves: AtomicU64,
    start: Instant,
}

impl Search<'_> {
    fn work(&self, worker: usize, mut rng: Rng) {
        let mut path = Vec::with_capacity(64);
        let mut played = Vec::with_capacity(BOARDSIZE);
        let mut amaf = Amaf::new();
        let mut iterations = 0u64;

        while self.claim_iteration() {
            let mut board = self.board.clone();
            path.clear();
            played.clear();

            let leaf = self.descend(&mut board, &mut path, &mut played);
            let leaf_node = self.tree.node(leaf);
            let path_moves = played.len();

            let winner = if leaf_node.is_terminal() || board.is_finished() {
                board.winner()
            } else {
                playout(&mut board, &self.config.toggles, &mut rng, &mut played)
            };
            self.playout_moves
                .fetch_add((played.len() - path_moves) as u64, Ordering::Relaxed);

            match winner {
                Some(winner) => {
                    amaf.record(&played);
                    self.backpropagate(&path, winner, &amaf, path_moves);
                    amaf.clear(&played);
                }
                None => {
                    for &idx in &path[1..] {
                        self.tree.node(idx).remove_virtual_loss();
                    }
                }
            }
            iterations += 1;
        }
        trace!(worker, iterations, "worker finished");
    }

    /// Whether another iteration may start, counting it against the budget.
    fn claim_iteration(&self) -> bool {
        if self.stop.load(Ordering::Relaxed) {
            return false;
        }
        if self.tree.node(self.tree.root()).is_exhausted() {
            return false;
        }
        match self.budget {
            Budget::Playouts(n) => self.playouts.fetch_add(1, Ordering::Relaxed) < n,
            Budget::PlayoutMoves(n) => {
                self.playout_moves.load(Ordering::Relaxed) < n
                    && self.count_playout()
            }
            Budget::Time(limit) => self.start.elapsed() < limit && self.count_playout(),
        }
    }

    fn count_playout(&self) -> bool {
        self.playouts.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Walk from the root to a leaf, expanding on the way, and play the path
    /// on `board`.
    fn descend(
        &self,
        board: &mut Board,
        path: &mut Vec<NodeIdx>,
        played: &mut Vec<Move>,
    ) -> NodeIdx {
        let tree = self.tree;
        let threshold = self.config.initialization.expand_threshold();
        let mut idx = tree.root();
        path.push(idx);

        loop {
            let node = tree.node(idx);
            if !node.is_expanded() {
                if node.is_terminal()
                    || tree.relative_depth(idx) >= self.max_depth
                    || node.visits() < threshold
                    || !tree.try_begin_expand(idx)
                    || !expand(tree, idx, board, self.config)
                {
                    return idx;
                }
            }

            let Some(child) = self.select(idx) else {
                return idx;
            };
            let child_node = tree.node(child);
            child_node.add_virtual_loss();
            path.push(child);
            if let Some(loc) = child_node.location() {
                let mover = child_node.mover();
                board.play_stone(loc, mover);
                played.push(Move::new(mover, loc));
            }
            idx = child;
        }
    }

    /// Child with the highest urgency; the earliest wins ties.
    fn select(&self, idx: NodeIdx) -> Option<NodeIdx> {
        let parent_visits = self.tree.node(idx).visits().max(1) as f64;
        let log_parent = parent_visits.ln();
        let mut best: Option<(NodeIdx, f64)> = None;
        for c in self.tree.children(idx) {
            let u = self.urgency(c, log_parent);
            if best.is_none_or(|(_, bu)| u > bu) {
                best = Some((c, u));
            }
        }
        best.map(|(c, _)| c)
    }

    fn urgency(&self, idx: NodeIdx, log_parent: f64) -> f64 {
        let node = self.tree.node(idx);
        let config = self.config;
        let rave = if config.toggles.rave {
            node.rave_winrate()
        } else {
            None
        };

        // Priors and virtual losses count as visits; virtual losses win nothing.
        let visits = node.visits();
        let n = visits as f64 + node.virtual_loss() as f64 + node.prior_visits() as f64;
        if n <= 0.0 {
            return UNVISITED_URGENCY + rave.unwrap_or(0.5);
        }
        let wins = (visits - node.wins().min(visits)) as f64 + node.prior_wins() as f64;
        let mut value = wins / n;
        if let Some(rave) = rave {
            let beta = config.beta as f64;
            let w = (beta / (3.0 * n + beta)).sqrt();
            value = w * rave + (1.0 - w) * value;
        }
        value + config.alpha as f64 * (log_parent / n).sqrt()
    }

    fn backpropagate(&self, path: &[NodeIdx], winner: Player, amaf: &Amaf, path_moves: usize) {
        let tree = self.tree;
        let toggles = &self.config.toggles;

        for (k, &idx) in path.iter().enumerate() {
            let node = tree.node(idx);
            node.update(winner);
            if k > 0 {
                node.remove_virtual_loss();
            }
            if !toggles.rave {
                continue;
            }
            // Moves after this node: the tree path below it (with path AMAF)
            // and the playout.
            let first_ply = if toggles.path_amaf { k } else { path_moves };
            for c in tree.children(idx) {
                let child = tree.node(c);
                if let Some(loc) = child.location() {
                    if amaf.played_after(loc, child.mover(), first_ply) {
                        child.update_rave(winner);
                    }
                }
            }
        }

        // Exhaustion: leaves with nothing left to learn, then their ancestors.
        let Some(&leaf) = path.last() else {
            return;
        };
        let leaf_node = tree.node(leaf);
        if leaf_node.is_terminal() || tree.relative_depth(leaf) >= self.max_depth {
            leaf_node.mark_exhausted();
            for &idx in path.iter().rev().skip(1) {
                if !tree.all_children_exhausted(idx) {
                    break;
                }
                tree.node(idx).mark_exhausted();
            }
        }
    }

    fn stats(&self) -> SearchStats {
        let root = self.tree.node(self.tree.root());
        let playouts = match self.budget {
            Budget::Playouts(n) => self.playouts.load(Ordering::Relaxed).min(n),
            _ => self.playouts.load(Ordering::Relaxed),
        };
        SearchStats {
            playouts,
            playout_moves: self.playout_moves.load(Ordering::Relaxed),
            elapsed: self.start.elapsed(),
            root_visits: root.visits(),
            win_rate: 0.0,
            nodes: self.tree.len(),
        }
    }
}

/// Candidate moves and their priors for a node being expanded, then the
/// child block itself. Returns `false`, leaving the node unexpanded, when
/// there is nothing to add or the arena is full.
fn expand(tree: &Tree, idx: NodeIdx, board: &Board, config: &Config) -> bool {
    let candidates = candidate_moves(board, config);
    if candidates.is_empty() {
        tree.abort_expand(idx);
        return false;
    }
    let Some(first) = tree.alloc(candidates.len()) else {
        tree.abort_expand(idx);
        return false;
    };

    let player = board.to_move();
    let toggles = &config.toggles;
    let init = config.initialization;

    let single_path = if toggles.single_shortest {
        Distances::compute(board, player).single_path(board)
    } else {
        Vec::new()
    };
    let all_shortest = toggles
        .all_shortest
        .then(|| Player::ALL.map(|p| Distances::compute(board, p)));
    let inherited = if toggles.path_rave {
        rave_two_plies_up(tree, idx)
    } else {
        Vec::new()
    };
    let defenses = board.bridge_defenses();

    for (k, &loc) in candidates.iter().enumerate() {
        let mut child = ChildInit {
            terminal: board.would_connect(loc, player),
            ..ChildInit::default()
        };
        if init.uses_priors() {
            child.prior_visits = config.gamma;
            child.prior_wins = config.gamma / 2.0;
        }
        if init.uses_bridge_priors()
            && (defenses.contains(&loc) || board.forms_bridge(loc, player))
        {
            child.prior_visits += config.bridge_weight as f32;
            child.prior_wins += config.bridge_weight as f32;
        }
        let shortest = single_path.contains(&loc)
            || all_shortest
                .as_ref()
                .is_some_and(|d| d.iter().any(|d| d.on_shortest(board, loc)));
        if shortest {
            child.prior_visits += SHORTEST_WEIGHT as f32;
            child.prior_wins += SHORTEST_WEIGHT as f32;
        }
        if let Some(&(visits, wins)) = inherited.get(loc.index()) {
            child.rave_visits = visits / 2;
            child.rave_wins = wins / 2;
        }
        tree.init_child(first + k as NodeIdx, idx, loc, child);
    }

    tree.finish_expand(idx, first, candidates.len());
    true
}

/// Moves a node expands into, in row-major order.
fn candidate_moves(board: &Board, config: &Config) -> Vec<Location> {
    let toggles = &config.toggles;
    let player = board.to_move();
    let mut moves: Vec<Location> = Location::all().filter(|&l| board.is_empty(l)).collect();

    if toggles.hacks {
        let winning: Vec<Location> = moves
            .iter()
            .copied()
            .filter(|&l| board.would_connect(l, player))
            .collect();
        if !winning.is_empty() {
            return winning;
        }
        let mut blocking = moves
            .iter()
            .copied()
            .filter(|&l| board.would_connect(l, player.opponent()));
        if let (Some(only), None) = (blocking.next(), blocking.next()) {
            return vec![only];
        }
    }

    if toggles.flood_fill {
        let dists = Player::ALL.map(|p| Distances::compute(board, p));
        let live: Vec<Location> = moves
            .iter()
            .copied()
            .filter(|&l| dists.iter().any(|d| d.reachable(l)))
            .collect();
        if !live.is_empty() {
            moves = live;
        }
    }
    moves
}

/// RAVE counts of the grandparent's children, indexed by cell. Those are
/// moves by the same player as the children of `idx`.
fn rave_two_plies_up(tree: &Tree, idx: NodeIdx) -> Vec<(u32, u32)> {
    let parent = tree.node(idx).parent();
    if parent == NO_NODE {
        return Vec::new();
    }
    let grandparent = tree.node(parent).parent();
    if grandparent == NO_NODE {
        return Vec::new();
    }
    let mut counts = vec![(0, 0); BOARDSIZE];
    for c in tree.children(grandparent) {
        let node = tree.node(c);
        if let Some(loc) = node.location() {
            counts[loc.index()] = (node.rave_visits(), node.rave_wins());
        }
    }
    counts
}

/// For each cell, who played it during one simulation and at which ply.
struct Amaf {
    ply: [u16; BOARDSIZE],
    player: [u8; BOARDSIZE],
}

impl Amaf {
    const UNPLAYED: u16 = u16::MAX;

    fn new() -> Self {
        Self {
            ply: [Self::UNPLAYED; BOARDSIZE],
            player: [0; BOARDSIZE],
        }
    }

    fn record(&mut self, played: &[Move]) {
        for (ply, mv) in played.iter().enumerate() {
            let i = mv.location.index();
            if self.ply[i] == Self::UNPLAYED {
                self.ply[i] = ply as u16;
                self.player[i] = mv.player.index() as u8;
            }
        }
    }

    fn clear(&mut self, played: &[Move]) {
        for mv in played {
            self.ply[mv.location.index()] = Self::UNPLAYED;
        }
    }

    /// Whether `player` played `loc` at ply `first_ply` or later.
    fn played_after(&self, loc: Location, player: Player, first_ply: usize) -> bool {
        let i = loc.index();
        self.ply[i] != Self::UNPLAYED
            && self.ply[i] as usize >= first_ply
            && self.player[i] == player.index() as u8
    }
}
