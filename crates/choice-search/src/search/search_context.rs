use crate::algorithm::{ChoiceEnumeratorProvider, MinimaxAlgorithm};
use crate::game::Game;
use crate::search::cancellation::CancellationToken;
use crate::search::tree::SearchTree;

/// Everything one search walk needs besides the game itself.
pub struct EvaluationContext<'a, G: Game> {
    pub tree: &'a mut SearchTree<G::Answer>,
    pub algorithm: &'a dyn MinimaxAlgorithm<G>,
    pub choices: &'a dyn ChoiceEnumeratorProvider<G>,
    pub cancel: &'a CancellationToken,
}

impl<'a, G: Game> EvaluationContext<'a, G> {
    pub fn new(
        tree: &'a mut SearchTree<G::Answer>,
        algorithm: &'a dyn MinimaxAlgorithm<G>,
        choices: &'a dyn ChoiceEnumeratorProvider<G>,
        cancel: &'a CancellationToken,
    ) -> Self {
        EvaluationContext {
            tree,
            algorithm,
            choices,
            cancel,
        }
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    #[inline]
    pub fn is_terminal(&self, game: &G) -> bool {
        self.algorithm.is_terminal(self.tree, game)
    }

    /// Scores the current node with the heuristic.
    #[inline]
    pub fn evaluate_leaf(&mut self, game: &G) {
        let score = self.algorithm.compute_heuristic(game, true);
        self.tree.evaluate(score);
    }
}
