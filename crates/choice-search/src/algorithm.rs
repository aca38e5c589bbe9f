//! Scoring algorithm and candidate enumeration plugged into a search.

use std::collections::HashMap;

use crate::game::{Choice, Game};
use crate::search::tree::SearchTree;
use crate::types::{Depth, Score};

/// Decides who maximizes, how leaves are scored and where the search stops.
pub trait MinimaxAlgorithm<G: Game>: Send + Sync {
    /// `true` if the search should maximize the score when `player` decides.
    fn is_maximizing_player(&self, player: G::Player) -> bool;

    /// Heuristic value of `game`. With `relative_to_maximizer` the value is
    /// from the maximizing player's point of view; otherwise it is from the
    /// minimizing player's point of view.
    fn compute_heuristic(&self, game: &G, relative_to_maximizer: bool) -> Score;

    /// `true` if the walk should stop and score `game` as a leaf.
    fn is_terminal(&self, tree: &SearchTree<G::Answer>, game: &G) -> bool;
}

/// Wraps an algorithm and cuts the search off at a fixed ply.
pub struct DepthLimited<A> {
    inner: A,
    max_depth: Depth,
}

impl<A> DepthLimited<A> {
    pub fn new(inner: A, max_depth: Depth) -> Self {
        DepthLimited { inner, max_depth }
    }

    pub fn max_depth(&self) -> Depth {
        self.max_depth
    }
}

impl<G: Game, A: MinimaxAlgorithm<G>> MinimaxAlgorithm<G> for DepthLimited<A> {
    fn is_maximizing_player(&self, player: G::Player) -> bool {
        self.inner.is_maximizing_player(player)
    }

    fn compute_heuristic(&self, game: &G, relative_to_maximizer: bool) -> Score {
        self.inner.compute_heuristic(game, relative_to_maximizer)
    }

    fn is_terminal(&self, tree: &SearchTree<G::Answer>, game: &G) -> bool {
        tree.depth() >= self.max_depth || self.inner.is_terminal(tree, game)
    }
}

/// Lists the legal answers of one kind of choice.
///
/// Answers are returned best-pruning-order first: the search tries them in
/// the order given.
pub trait ChoiceEnumerator<G: Game>: Send + Sync {
    fn enumerate(&self, game: &G, choice: &G::Choice) -> Vec<G::Answer>;
}

impl<G, F> ChoiceEnumerator<G> for F
where
    G: Game,
    F: Fn(&G, &G::Choice) -> Vec<G::Answer> + Send + Sync,
{
    fn enumerate(&self, game: &G, choice: &G::Choice) -> Vec<G::Answer> {
        self(game, choice)
    }
}

/// Finds the enumerator responsible for a choice.
pub trait ChoiceEnumeratorProvider<G: Game>: Send + Sync {
    fn enumerator_for(&self, choice: &G::Choice) -> Option<&dyn ChoiceEnumerator<G>>;

    /// Candidate answers for `choice`. Choices nobody enumerates only offer
    /// their default answer.
    fn enumerate(&self, game: &G, choice: &G::Choice) -> Vec<G::Answer> {
        match self.enumerator_for(choice) {
            Some(enumerator) => enumerator.enumerate(game, choice),
            None => vec![choice.default_answer()],
        }
    }
}

type ChoiceKind<G> = <<G as Game>::Choice as Choice>::Kind;

/// Enumerators keyed by [`Choice::kind`].
pub struct EnumeratorRegistry<G: Game> {
    by_kind: HashMap<ChoiceKind<G>, Box<dyn ChoiceEnumerator<G>>>,
    fallback: Option<Box<dyn ChoiceEnumerator<G>>>,
}

impl<G: Game> Default for EnumeratorRegistry<G> {
    fn default() -> Self {
        EnumeratorRegistry {
            by_kind: HashMap::new(),
            fallback: None,
        }
    }
}

impl<G: Game> EnumeratorRegistry<G> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry that hands every choice to `enumerator`.
    pub fn with_fallback<E: ChoiceEnumerator<G> + 'static>(enumerator: E) -> Self {
        EnumeratorRegistry {
            by_kind: HashMap::new(),
            fallback: Some(Box::new(enumerator)),
        }
    }

    /// Registers `enumerator` for choices of `kind`, replacing any previous one.
    #[must_use]
    pub fn register<E: ChoiceEnumerator<G> + 'static>(
        mut self,
        kind: ChoiceKind<G>,
        enumerator: E,
    ) -> Self {
        self.by_kind.insert(kind, Box::new(enumerator));
        self
    }

    pub fn len(&self) -> usize {
        self.by_kind.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_kind.is_empty() && self.fallback.is_none()
    }
}

impl<G: Game> ChoiceEnumeratorProvider<G> for EnumeratorRegistry<G> {
    fn enumerator_for(&self, choice: &G::Choice) -> Option<&dyn ChoiceEnumerator<G>> {
        self.by_kind
            .get(&choice.kind())
            .or(self.fallback.as_ref())
            .map(|enumerator| enumerator.as_ref())
    }
}
