//! Alpha-beta node stack.
//!
//! A [`SearchTree`] holds the path from the root to the node currently being
//! searched. Nodes live in an arena indexed by [`NodeId`]; the node at index
//! `i` is always the child of the node at `i - 1`, so the arena doubles as
//! the current path.
//!
//! Window orientation depends on [`Scoring`]:
//! - Negamax: `alpha`/`beta` are relative to the node's own side and every
//!   node maximizes. A child of the other color gets `(-beta, -alpha)`.
//! - Minimax: values are absolute. `alpha` is the bound of the node's own
//!   side and `beta` the bound of the opposing side; a child of the other
//!   color gets the two swapped.

use std::fmt::{Debug, Write as _};

use crate::search::config::{Scoring, SearchConfig};
use crate::transposition_table::{Bound, TranspositionTable};
use crate::types::{Depth, SCORE_MAX, SCORE_MIN, Score, is_valid_score};

/// Index of a node in the tree's arena.
pub type NodeId = usize;

struct Node<A> {
    parent: Option<NodeId>,
    alpha: Score,
    beta: Score,
    original_alpha: Score,
    best_value: Score,
    is_maximizing: Option<bool>,
    /// Heuristic value of a leaf, already oriented for the parent.
    leaf_value: Option<Score>,
    discarded: bool,
    /// Value taken from the transposition table.
    resolved: bool,
    /// Search below this node was cut short by cancellation.
    abandoned: bool,
    result: Option<A>,
    hash: Option<u32>,
}

impl<A> Node<A> {
    fn new(parent: Option<NodeId>, result: Option<A>) -> Self {
        Node {
            parent,
            alpha: SCORE_MIN,
            beta: SCORE_MAX,
            original_alpha: SCORE_MIN,
            best_value: SCORE_MIN,
            is_maximizing: None,
            leaf_value: None,
            discarded: false,
            resolved: false,
            abandoned: false,
            result,
            hash: None,
        }
    }

    /// Starting best value of a node of the given color.
    #[inline]
    fn worst(scoring: Scoring, is_maximizing: bool) -> Score {
        match scoring {
            Scoring::Minimax if !is_maximizing => SCORE_MAX,
            _ => SCORE_MIN,
        }
    }

    /// Value this node hands to a parent of color `parent_max`, or `None` if
    /// it must never win the parent's comparison.
    fn value_for_parent(&self, scoring: Scoring, parent_max: bool) -> Option<Score> {
        if self.discarded {
            return None;
        }
        if let Some(value) = self.leaf_value {
            return Some(value);
        }
        let is_maximizing = self.is_maximizing?;
        if self.best_value == Self::worst(scoring, is_maximizing) {
            return None;
        }
        Some(match scoring {
            Scoring::Negamax if is_maximizing != parent_max => -self.best_value,
            _ => self.best_value,
        })
    }

    #[inline]
    fn minimizes(&self, scoring: Scoring) -> bool {
        scoring == Scoring::Minimax && self.is_maximizing == Some(false)
    }

    #[inline]
    fn improves(&self, scoring: Scoring, value: Score) -> bool {
        if self.minimizes(scoring) {
            value < self.best_value
        } else {
            value > self.best_value
        }
    }

    #[inline]
    fn tighten(&mut self, scoring: Scoring, value: Score) {
        if self.minimizes(scoring) {
            self.alpha = self.alpha.min(value);
        } else {
            self.alpha = self.alpha.max(value);
        }
    }

    #[inline]
    fn is_cut(&self, scoring: Scoring) -> bool {
        if self.minimizes(scoring) {
            self.alpha <= self.beta
        } else {
            self.alpha >= self.beta
        }
    }
}

/// Stack of alpha-beta nodes for one search. Only one thread ever touches a
/// tree.
pub struct SearchTree<A> {
    scoring: Scoring,
    pruning: bool,
    nodes: Vec<Node<A>>,
    table: Option<TranspositionTable>,
    trace: Option<String>,
    evaluations: u64,
}

impl<A: Clone + Debug> SearchTree<A> {
    /// Creates a tree holding only an uninitialized root.
    pub fn new(config: &SearchConfig) -> Self {
        SearchTree {
            scoring: config.scoring,
            pruning: config.pruning,
            nodes: vec![Node::new(None, None)],
            table: config
                .uses_transposition_table()
                .then(|| TranspositionTable::new(config.tt_mb_size)),
            trace: config.capture_trace.then(String::new),
            evaluations: 0,
        }
    }

    pub fn scoring(&self) -> Scoring {
        self.scoring
    }

    /// Number of plies between the root and the current node.
    #[inline]
    pub fn depth(&self) -> Depth {
        self.nodes.len() - 1
    }

    #[inline]
    fn current_id(&self) -> NodeId {
        self.nodes.len() - 1
    }

    #[inline]
    fn current(&self) -> &Node<A> {
        &self.nodes[self.current_id()]
    }

    #[inline]
    fn current_mut(&mut self) -> &mut Node<A> {
        let id = self.current_id();
        &mut self.nodes[id]
    }

    /// Color of the current node, `None` before it is initialized.
    pub fn current_color(&self) -> Option<bool> {
        self.current().is_maximizing
    }

    /// Leaf evaluations performed on this tree.
    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    /// Opens an uninitialized child of the current node. Children of the root
    /// record `candidate` as their result.
    pub fn begin_node(&mut self, candidate: A) {
        let parent = self.current_id();
        assert!(
            self.nodes[parent].is_maximizing.is_some(),
            "node at depth {parent} opened a child before being initialized"
        );
        if let Some(trace) = self.trace.as_mut() {
            let _ = writeln!(trace, "{:indent$}> {candidate:?}", "", indent = parent * 2);
        }
        let result = (parent == 0).then_some(candidate);
        self.nodes.push(Node::new(Some(parent), result));
    }

    /// Sets the color of the current node and derives its window from the
    /// parent's.
    pub fn initialize_node(&mut self, is_maximizing: bool) {
        let scoring = self.scoring;
        let window = match self.current().parent {
            Some(parent) => {
                let parent = &self.nodes[parent];
                let parent_max = parent
                    .is_maximizing
                    .expect("parent of an open node is always initialized");
                if parent_max == is_maximizing {
                    (parent.alpha, parent.beta)
                } else {
                    match scoring {
                        Scoring::Negamax => (-parent.beta, -parent.alpha),
                        Scoring::Minimax => (parent.beta, parent.alpha),
                    }
                }
            }
            None => match scoring {
                Scoring::Minimax if !is_maximizing => (SCORE_MAX, SCORE_MIN),
                _ => (SCORE_MIN, SCORE_MAX),
            },
        };

        let depth = self.depth();
        let node = self.current_mut();
        assert!(
            node.is_maximizing.is_none(),
            "node at depth {depth} initialized twice"
        );
        node.is_maximizing = Some(is_maximizing);
        (node.alpha, node.beta) = window;
        node.original_alpha = window.0;
        node.best_value = Node::<A>::worst(scoring, is_maximizing);

        if let Some(trace) = self.trace.as_mut() {
            let side = if is_maximizing { "max" } else { "min" };
            let _ = writeln!(
                trace,
                "{:indent$}  {side} [{}, {}]",
                "",
                window.0,
                window.1,
                indent = depth * 2
            );
        }
    }

    /// Scores the current node as a leaf. `score` is from the maximizing
    /// player's point of view.
    pub fn evaluate(&mut self, score: Score) {
        debug_assert!(
            is_valid_score(score),
            "heuristic value {score} is outside the representable range"
        );
        self.evaluations += 1;

        let depth = self.depth();
        let value = match (self.scoring, self.current().parent) {
            (Scoring::Negamax, Some(parent)) => match self.nodes[parent].is_maximizing {
                Some(false) => -score,
                _ => score,
            },
            _ => score,
        };
        let node = self.current_mut();
        debug_assert!(node.is_maximizing.is_none(), "evaluated an inner node");
        node.leaf_value = Some(value);

        if let Some(trace) = self.trace.as_mut() {
            let _ = writeln!(trace, "{:indent$}  = {score}", "", indent = depth * 2);
        }
    }

    /// Marks the current node as a dead end: it never wins its parent's
    /// comparison.
    pub fn discard(&mut self) {
        let depth = self.depth();
        self.current_mut().discarded = true;
        if let Some(trace) = self.trace.as_mut() {
            let _ = writeln!(trace, "{:indent$}  x", "", indent = depth * 2);
        }
    }

    /// Marks the current node as cut short by cancellation. Its value is still
    /// folded but never memoized, and the mark spreads to its ancestors.
    pub fn abandon(&mut self) {
        self.current_mut().abandoned = true;
    }

    /// `true` if any node on the current path or folded into it was abandoned.
    pub fn is_abandoned(&self) -> bool {
        self.current().abandoned
    }

    /// Closes the current node and folds its value into the parent.
    ///
    /// Returns `false` when the parent's window has closed and no further
    /// siblings need to be searched.
    pub fn end_node(&mut self) -> bool {
        assert!(self.nodes.len() > 1, "the root node cannot be ended");
        let child_depth = self.depth();
        let Some(child) = self.nodes.pop() else {
            unreachable!("the tree always holds its root");
        };
        self.store(&child, child_depth);

        let scoring = self.scoring;
        let parent_id = self.current_id();
        let parent = &mut self.nodes[parent_id];
        let parent_max = parent
            .is_maximizing
            .expect("parent of an open node is always initialized");

        if child.abandoned {
            parent.abandoned = true;
        }
        let value = child.value_for_parent(scoring, parent_max);
        if let Some(value) = value {
            if parent.improves(scoring, value) {
                parent.best_value = value;
                if parent_id == 0 {
                    parent.result = child.result;
                }
            }
            parent.tighten(scoring, value);
        }
        let cut = self.pruning && parent.is_cut(scoring);

        if let Some(trace) = self.trace.as_mut() {
            let shown = value.map_or_else(|| "-".to_string(), |v| v.to_string());
            let _ = writeln!(
                trace,
                "{:indent$}< {shown}{}",
                "",
                if cut { " cut" } else { "" },
                indent = parent_id * 2
            );
        }
        !cut
    }

    /// Looks the current node up in the transposition table, tightening its
    /// window from a stored bound.
    ///
    /// Returns `false` when the node's value is fully determined by the table
    /// and its children need not be searched. Trees without a table always
    /// return `true`.
    pub fn consider_transposition_table(&mut self, hash: u32) -> bool {
        let depth = self.depth();
        let id = self.current_id();
        let Some(table) = self.table.as_ref() else {
            return true;
        };
        let node = &mut self.nodes[id];
        let is_maximizing = node
            .is_maximizing
            .expect("transposition lookup on an uninitialized node");
        node.hash = Some(hash);

        let (found, data, _) = table.lookup(hash);
        if !found || !data.is_usable(depth, is_maximizing) {
            return true;
        }

        match data.bound {
            Bound::Exact => node.alpha = node.beta,
            Bound::Lower => node.alpha = node.alpha.max(data.value),
            Bound::Upper => node.beta = node.beta.min(data.value),
            Bound::None => return true,
        }
        if node.alpha < node.beta {
            return true;
        }

        node.best_value = data.value;
        node.resolved = true;
        if let Some(trace) = self.trace.as_mut() {
            let _ = writeln!(
                trace,
                "{:indent$}  tt {:?} {}",
                "",
                data.bound,
                data.value,
                indent = depth * 2
            );
        }
        false
    }

    fn store(&mut self, node: &Node<A>, depth: Depth) {
        let Some(table) = self.table.as_mut() else {
            return;
        };
        let (Some(hash), Some(is_maximizing)) = (node.hash, node.is_maximizing) else {
            return;
        };
        if node.resolved || node.abandoned || node.discarded || node.best_value == SCORE_MIN {
            return;
        }
        let bound = Bound::determine_bound(node.best_value, node.original_alpha, node.beta);
        table.save(hash, node.best_value, bound, depth, is_maximizing);
    }

    pub fn transposition_table(&self) -> Option<&TranspositionTable> {
        self.table.as_ref()
    }

    /// Candidate recorded at the root: the chosen answer once the search is done.
    pub fn result(&self) -> Option<&A> {
        self.nodes[0].result.as_ref()
    }

    /// Predicted value of the root from the maximizing player's point of view,
    /// `None` if no branch produced a value.
    pub fn score(&self) -> Option<Score> {
        let root = &self.nodes[0];
        if let Some(value) = root.leaf_value {
            return Some(value);
        }
        let is_maximizing = root.is_maximizing?;
        if root.best_value == Node::<A>::worst(self.scoring, is_maximizing) {
            return None;
        }
        Some(match self.scoring {
            Scoring::Negamax if !is_maximizing => -root.best_value,
            _ => root.best_value,
        })
    }

    pub fn trace(&self) -> Option<&str> {
        self.trace.as_deref()
    }

    pub fn take_trace(&mut self) -> Option<String> {
        self.trace.as_mut().map(std::mem::take)
    }
}
