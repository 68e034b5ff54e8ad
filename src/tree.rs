//! Node arena for the search tree.
//!
//! Nodes live in one preallocated `Vec` and refer to each other by index.
//! Every statistic is an atomic so worker threads can share the arena
//! without a lock:
//! - slots are handed out by an atomic bump allocator
//! - a node's children occupy a contiguous block of slots
//! - a node is expanded by exactly one worker, which wins a compare-exchange
//!   on the expansion state and publishes the child block with `Release`
//!
//! Visit and win counts of a node are kept for the player to move at that
//! node; RAVE counts and priors are kept for the player who made the move
//! into it.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU16, AtomicU32, AtomicUsize, Ordering};

use crate::board::{Location, Move, Player};

/// Index of a node in the arena.
pub type NodeIdx = u32;

/// Marker for "no node" (the root's parent).
pub const NO_NODE: NodeIdx = u32::MAX;

const NO_LOCATION: u16 = u16::MAX;

const UNEXPANDED: u8 = 0;
const EXPANDING: u8 = 1;
const EXPANDED: u8 = 2;

/// Initial statistics for a new child.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChildInit {
    pub prior_visits: f32,
    pub prior_wins: f32,
    pub rave_visits: u32,
    pub rave_wins: u32,
    pub terminal: bool,
}

/// A search tree node.
pub struct Node {
    location: AtomicU16,
    to_move: AtomicU8,
    depth: AtomicU16,
    parent: AtomicU32,
    first_child: AtomicU32,
    num_children: AtomicU32,
    state: AtomicU8,
    terminal: AtomicBool,
    exhausted: AtomicBool,
    visits: AtomicU32,
    wins: AtomicU32,
    virtual_loss: AtomicU32,
    rave_visits: AtomicU32,
    rave_wins: AtomicU32,
    prior_visits: AtomicU32,
    prior_wins: AtomicU32,
    expanded_at: AtomicU32,
}

impl Node {
    fn empty() -> Self {
        Self {
            location: AtomicU16::new(NO_LOCATION),
            to_move: AtomicU8::new(0),
            depth: AtomicU16::new(0),
            parent: AtomicU32::new(NO_NODE),
            first_child: AtomicU32::new(NO_NODE),
            num_children: AtomicU32::new(0),
            state: AtomicU8::new(UNEXPANDED),
            terminal: AtomicBool::new(false),
            exhausted: AtomicBool::new(false),
            visits: AtomicU32::new(0),
            wins: AtomicU32::new(0),
            virtual_loss: AtomicU32::new(0),
            rave_visits: AtomicU32::new(0),
            rave_wins: AtomicU32::new(0),
            prior_visits: AtomicU32::new(0),
            prior_wins: AtomicU32::new(0),
            expanded_at: AtomicU32::new(0),
        }
    }

    /// The move that led here; `None` for the root of a fresh tree.
    pub fn location(&self) -> Option<Location> {
        match self.location.load(Ordering::Relaxed) {
            NO_LOCATION => None,
            i => Some(Location::from_index(i as usize)),
        }
    }

    /// Player to move at this node.
    pub fn to_move(&self) -> Player {
        match self.to_move.load(Ordering::Relaxed) {
            0 => Player::Black,
            _ => Player::White,
        }
    }

    /// Player whose move created this node.
    pub fn mover(&self) -> Player {
        self.to_move().opponent()
    }

    pub fn parent(&self) -> NodeIdx {
        self.parent.load(Ordering::Relaxed)
    }

    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed) as usize
    }

    pub fn visits(&self) -> u32 {
        self.visits.load(Ordering::Relaxed)
    }

    /// Wins for the player to move at this node.
    pub fn wins(&self) -> u32 {
        self.wins.load(Ordering::Relaxed)
    }

    pub fn rave_visits(&self) -> u32 {
        self.rave_visits.load(Ordering::Relaxed)
    }

    /// RAVE wins for the player who made the move into this node.
    pub fn rave_wins(&self) -> u32 {
        self.rave_wins.load(Ordering::Relaxed)
    }

    pub fn prior_visits(&self) -> f32 {
        f32::from_bits(self.prior_visits.load(Ordering::Relaxed))
    }

    pub fn prior_wins(&self) -> f32 {
        f32::from_bits(self.prior_wins.load(Ordering::Relaxed))
    }

    pub fn virtual_loss(&self) -> u32 {
        self.virtual_loss.load(Ordering::Relaxed)
    }

    /// Visits the node had when it was expanded.
    pub fn expanded_at(&self) -> u32 {
        self.expanded_at.load(Ordering::Relaxed)
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal.load(Ordering::Relaxed)
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted.load(Ordering::Relaxed)
    }

    pub fn is_expanded(&self) -> bool {
        self.state.load(Ordering::Acquire) == EXPANDED
    }

    /// Win rate for the player who moved into this node, `None` if unvisited.
    pub fn mover_winrate(&self) -> Option<f64> {
        let v = self.visits();
        (v > 0).then(|| (v - self.wins().min(v)) as f64 / v as f64)
    }

    pub fn rave_winrate(&self) -> Option<f64> {
        let v = self.rave_visits();
        (v > 0).then(|| self.rave_wins() as f64 / v as f64)
    }

    #[inline]
    pub(crate) fn add_virtual_loss(&self) {
        self.virtual_loss.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn remove_virtual_loss(&self) {
        let _ = self
            .virtual_loss
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }

    /// Count one simulation through this node.
    #[inline]
    pub(crate) fn update(&self, winner: Player) {
        self.visits.fetch_add(1, Ordering::Relaxed);
        if winner == self.to_move() {
            self.wins.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Count one AMAF occurrence of this node's move.
    #[inline]
    pub(crate) fn update_rave(&self, winner: Player) {
        self.rave_visits.fetch_add(1, Ordering::Relaxed);
        if winner == self.mover() {
            self.rave_wins.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn mark_exhausted(&self) {
        self.exhausted.store(true, Ordering::Relaxed);
    }
}

/// Arena-backed search tree.
pub struct Tree {
    nodes: Vec<Node>,
    next: AtomicUsize,
    root: NodeIdx,
    full_warned: AtomicBool,
}

impl Tree {
    /// A tree with a single root node for `to_move`.
    ///
    /// The root starts with one visit, the evaluation of the position itself,
    /// so that every expanded node holds one visit more than its children.
    pub fn new(capacity: usize, to_move: Player) -> Self {
        let mut nodes = Vec::with_capacity(capacity);
        nodes.resize_with(capacity.max(1), Node::empty);
        let tree = Self {
            nodes,
            next: AtomicUsize::new(1),
            root: 0,
            full_warned: AtomicBool::new(false),
        };
        let root = tree.node(0);
        root.to_move.store(to_move.index() as u8, Ordering::Relaxed);
        root.visits.store(1, Ordering::Relaxed);
        tree
    }

    #[inline]
    pub fn root(&self) -> NodeIdx {
        self.root
    }

    #[inline]
    pub fn node(&self, idx: NodeIdx) -> &Node {
        &self.nodes[idx as usize]
    }

    /// Allocated node count.
    pub fn len(&self) -> usize {
        self.next.load(Ordering::Relaxed).min(self.nodes.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    /// Depth of `idx` below the current root.
    pub fn relative_depth(&self, idx: NodeIdx) -> usize {
        self.node(idx).depth() - self.node(self.root).depth()
    }

    /// Children of an expanded node, in creation order. Empty otherwise.
    pub fn children(&self, idx: NodeIdx) -> std::ops::Range<NodeIdx> {
        let node = self.node(idx);
        if !node.is_expanded() {
            return 0..0;
        }
        let first = node.first_child.load(Ordering::Relaxed);
        first..first + node.num_children.load(Ordering::Relaxed)
    }

    /// Claim the right to expand `idx`. Only one caller ever succeeds until
    /// the expansion is aborted.
    pub(crate) fn try_begin_expand(&self, idx: NodeIdx) -> bool {
        self.node(idx)
            .state
            .compare_exchange(UNEXPANDED, EXPANDING, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Give up an expansion claimed with [`try_begin_expand`](Self::try_begin_expand).
    pub(crate) fn abort_expand(&self, idx: NodeIdx) {
        self.node(idx).state.store(UNEXPANDED, Ordering::Release);
    }

    /// Reserve a contiguous block of `count` slots.
    pub(crate) fn alloc(&self, count: usize) -> Option<NodeIdx> {
        let mut cur = self.next.load(Ordering::Relaxed);
        loop {
            let end = cur + count;
            if end > self.nodes.len() {
                if !self.full_warned.swap(true, Ordering::Relaxed) {
                    tracing::warn!(
                        capacity = self.nodes.len(),
                        "node arena is full, tree stops growing"
                    );
                }
                return None;
            }
            match self
                .next
                .compare_exchange_weak(cur, end, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return Some(cur as NodeIdx),
                Err(actual) => cur = actual,
            }
        }
    }

    /// Fill a freshly allocated slot. The slot is not visible to other
    /// workers until its parent's expansion is published.
    pub(crate) fn init_child(&self, idx: NodeIdx, parent: NodeIdx, loc: Location, init: ChildInit) {
        let p = self.node(parent);
        let node = self.node(idx);
        node.location.store(loc.index() as u16, Ordering::Relaxed);
        node.to_move
            .store(p.to_move().opponent().index() as u8, Ordering::Relaxed);
        node.depth.store(p.depth.load(Ordering::Relaxed) + 1, Ordering::Relaxed);
        node.parent.store(parent, Ordering::Relaxed);
        node.first_child.store(NO_NODE, Ordering::Relaxed);
        node.num_children.store(0, Ordering::Relaxed);
        node.state.store(UNEXPANDED, Ordering::Relaxed);
        node.terminal.store(init.terminal, Ordering::Relaxed);
        node.exhausted.store(false, Ordering::Relaxed);
        node.visits.store(0, Ordering::Relaxed);
        node.wins.store(0, Ordering::Relaxed);
        node.virtual_loss.store(0, Ordering::Relaxed);
        node.rave_visits.store(init.rave_visits, Ordering::Relaxed);
        node.rave_wins.store(init.rave_wins, Ordering::Relaxed);
        node.prior_visits
            .store(init.prior_visits.to_bits(), Ordering::Relaxed);
        node.prior_wins.store(init.prior_wins.to_bits(), Ordering::Relaxed);
        node.expanded_at.store(0, Ordering::Relaxed);
    }

    /// Publish the child block of a node being expanded.
    pub(crate) fn finish_expand(&self, idx: NodeIdx, first: NodeIdx, count: usize) {
        let node = self.node(idx);
        node.first_child.store(first, Ordering::Relaxed);
        node.num_children.store(count as u32, Ordering::Relaxed);
        node.expanded_at.store(node.visits(), Ordering::Relaxed);
        node.state.store(EXPANDED, Ordering::Release);
    }

    /// Whether an expanded node has only exhausted children.
    pub(crate) fn all_children_exhausted(&self, idx: NodeIdx) -> bool {
        let children = self.children(idx);
        !children.is_empty() && children.into_iter().all(|c| self.node(c).is_exhausted())
    }

    /// Most visited child, ties broken by the earliest created child.
    pub fn robust_child(&self, idx: NodeIdx) -> Option<NodeIdx> {
        let mut best: Option<(NodeIdx, u32)> = None;
        for c in self.children(idx) {
            let v = self.node(c).visits();
            if best.is_none_or(|(_, bv)| v > bv) {
                best = Some((c, v));
            }
        }
        best.map(|(c, _)| c)
    }

    /// Child of `idx` reached by `mv`, if expanded.
    pub fn find_child(&self, idx: NodeIdx, mv: Move) -> Option<NodeIdx> {
        self.children(idx).find(|&c| {
            let node = self.node(c);
            node.location() == Some(mv.location) && node.mover() == mv.player
        })
    }

    /// Make the subtree reached by `moves` the new root.
    ///
    /// Fails, leaving the tree untouched, when a move leaves the expanded
    /// tree or the new root was never visited.
    pub fn promote(&mut self, moves: &[Move]) -> bool {
        let mut cur = self.root;
        for &mv in moves {
            match self.find_child(cur, mv) {
                Some(c) => cur = c,
                None => return false,
            }
        }
        if self.node(cur).visits() == 0 {
            return false;
        }
        self.root = cur;
        true
    }

    /// Forget exhaustion marks, which depend on the root and the depth cutoff.
    pub(crate) fn clear_exhausted(&self) {
        for node in &self.nodes[..self.len()] {
            node.exhausted.store(false, Ordering::Relaxed);
        }
    }

    /// Whether every expanded node below the root holds exactly the visits it
    /// had at expansion plus the visits of its children.
    ///
    /// Only meaningful while no search is running.
    pub fn visits_consistent(&self) -> bool {
        let mut stack = vec![self.root];
        while let Some(idx) = stack.pop() {
            let node = self.node(idx);
            if !node.is_expanded() {
                continue;
            }
            let sum: u64 = self
                .children(idx)
                .map(|c| {
                    stack.push(c);
                    self.node(c).visits() as u64
                })
                .sum();
            if node.visits() as u64 != node.expanded_at() as u64 + sum {
                return false;
            }
        }
        true
    }

    /// Render the tree, showing at most `max_children` children per node
    /// (most visited first) and skipping unvisited nodes.
    pub fn format(&self, max_children: usize) -> String {
        let mut out = String::new();
        let root = self.node(self.root);
        let _ = writeln!(
            out,
            "root {} to move visits={} winrate={:.3} nodes={}",
            root.to_move(),
            root.visits(),
            root.wins() as f64 / root.visits().max(1) as f64,
            self.len()
        );
        self.format_children(self.root, max_children, 1, &mut out);
        out
    }

    fn format_children(&self, idx: NodeIdx, max_children: usize, indent: usize, out: &mut String) {
        let mut children: Vec<NodeIdx> = self
            .children(idx)
            .filter(|&c| self.node(c).visits() > 0)
            .collect();
        children.sort_by_key(|&c| std::cmp::Reverse(self.node(c).visits()));
        for c in children.into_iter().take(max_children) {
            let node = self.node(c);
            let loc = node.location().map(|l| l.to_string()).unwrap_or_default();
            let _ = write!(
                out,
                "{:width$}{} {} visits={} winrate={:.3}",
                "",
                node.mover(),
                loc,
                node.visits(),
                node.mover_winrate().unwrap_or(0.0),
                width = indent * 2
            );
            if let Some(r) = node.rave_winrate() {
                let _ = write!(out, " rave={}/{r:.3}", node.rave_visits());
            }
            if node.is_terminal() {
                out.push_str(" terminal");
            }
            out.push('\n');
            self.format_children(c, max_children, indent + 1, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(row: usize, col: usize) -> Location {
        Location::new(row, col).unwrap()
    }

    fn expand_with(tree: &Tree, idx: NodeIdx, locs: &[Location]) -> NodeIdx {
        assert!(tree.try_begin_expand(idx));
        let first = tree.alloc(locs.len()).unwrap();
        for (k, &l) in locs.iter().enumerate() {
            tree.init_child(first + k as NodeIdx, idx, l, ChildInit::default());
        }
        tree.finish_expand(idx, first, locs.len());
        first
    }

    #[test]
    fn test_new_tree() {
        let tree = Tree::new(16, Player::White);
        let root = tree.node(tree.root());
        assert_eq!(root.visits(), 1);
        assert_eq!(root.to_move(), Player::White);
        assert_eq!(root.location(), None);
        assert!(!root.is_expanded());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_expand_once() {
        let tree = Tree::new(16, Player::Black);
        let first = expand_with(&tree, 0, &[loc(0, 0), loc(1, 1)]);
        assert_eq!(tree.children(0), first..first + 2);
        assert!(!tree.try_begin_expand(0));
        let child = tree.node(first);
        assert_eq!(child.to_move(), Player::White);
        assert_eq!(child.mover(), Player::Black);
        assert_eq!(child.parent(), 0);
        assert_eq!(tree.relative_depth(first), 1);
    }

    #[test]
    fn test_alloc_respects_capacity() {
        let tree = Tree::new(4, Player::Black);
        assert_eq!(tree.alloc(2), Some(1));
        assert_eq!(tree.alloc(2), None);
        assert_eq!(tree.alloc(1), Some(3));
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn test_robust_child_ties_go_to_earliest() {
        let tree = Tree::new(16, Player::Black);
        let first = expand_with(&tree, 0, &[loc(0, 0), loc(0, 1), loc(0, 2)]);
        tree.node(first + 1).update(Player::White);
        tree.node(first + 2).update(Player::White);
        assert_eq!(tree.robust_child(0), Some(first + 1));
        tree.node(first + 2).update(Player::Black);
        assert_eq!(tree.robust_child(0), Some(first + 2));
    }

    #[test]
    fn test_update_perspectives() {
        let tree = Tree::new(16, Player::Black);
        let first = expand_with(&tree, 0, &[loc(2, 2)]);
        let child = tree.node(first);
        // Black moved into the child; White is to move there.
        child.update(Player::Black);
        child.update_rave(Player::Black);
        assert_eq!(child.wins(), 0);
        assert_eq!(child.mover_winrate(), Some(1.0));
        assert_eq!(child.rave_winrate(), Some(1.0));
        child.update(Player::White);
        assert_eq!(child.wins(), 1);
        assert_eq!(child.mover_winrate(), Some(0.5));
    }

    #[test]
    fn test_visits_consistent() {
        let tree = Tree::new(16, Player::Black);
        let first = expand_with(&tree, 0, &[loc(0, 0), loc(0, 1)]);
        assert!(tree.visits_consistent());
        tree.node(0).update(Player::Black);
        assert!(!tree.visits_consistent());
        tree.node(first).update(Player::Black);
        assert!(tree.visits_consistent());
    }

    #[test]
    fn test_promote() {
        let mut tree = Tree::new(16, Player::Black);
        let first = expand_with(&tree, 0, &[loc(0, 0), loc(0, 1)]);
        let wrong = Move::new(Player::White, loc(0, 1));
        assert!(!tree.promote(&[wrong]));
        let right = Move::new(Player::Black, loc(0, 1));
        // Never visited: refused.
        assert!(!tree.promote(&[right]));
        tree.node(first + 1).update(Player::Black);
        assert!(tree.promote(&[right]));
        assert_eq!(tree.root(), first + 1);
        assert_eq!(tree.relative_depth(first + 1), 0);
    }

    #[test]
    fn test_virtual_loss_never_underflows() {
        let tree = Tree::new(2, Player::Black);
        let node = tree.node(0);
        node.remove_virtual_loss();
        assert_eq!(node.virtual_loss(), 0);
        node.add_virtual_loss();
        node.remove_virtual_loss();
        assert_eq!(node.virtual_loss(), 0);
    }

    #[test]
    fn test_format_lists_visited_children() {
        let tree = Tree::new(16, Player::Black);
        let first = expand_with(&tree, 0, &[loc(0, 0), loc(0, 1)]);
        tree.node(first + 1).update(Player::Black);
        let text = tree.format(4);
        assert!(text.starts_with("root black to move"));
        assert!(text.contains("black (0, 1) visits=1"));
        assert!(!text.contains("(0, 0)"));
    }
}
