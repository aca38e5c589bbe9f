use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};

use crate::algorithm::{ChoiceEnumeratorProvider, MinimaxAlgorithm};
use crate::error::{Result, SearchError};
use crate::game::{Choice, Game};
use crate::search::cancellation::CancellationToken;
use crate::search::config::SearchConfig;
use crate::search::driver::driver_for;
use crate::search::search_context::EvaluationContext;
use crate::search::tree::SearchTree;
use crate::types::Score;

/// Scoring algorithm, enumerators and options shared by all work orders of
/// a partitioner.
pub struct EvaluationStrategy<G: Game> {
    pub algorithm: Arc<dyn MinimaxAlgorithm<G>>,
    pub choices: Arc<dyn ChoiceEnumeratorProvider<G>>,
    pub config: SearchConfig,
}

impl<G: Game> EvaluationStrategy<G> {
    pub fn new(
        algorithm: impl MinimaxAlgorithm<G> + 'static,
        choices: impl ChoiceEnumeratorProvider<G> + 'static,
        config: SearchConfig,
    ) -> Self {
        EvaluationStrategy {
            algorithm: Arc::new(algorithm),
            choices: Arc::new(choices),
            config,
        }
    }
}

/// Value a work order found for its candidate.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkResult {
    /// Value of the candidate from the maximizing player's point of view,
    /// `None` if every branch below it was discarded or nothing was reached.
    pub score: Option<Score>,
    pub evaluations: u64,
    pub trace: Option<String>,
    /// Cancellation cut the search short.
    pub abandoned: bool,
}

/// Search of one candidate answer of a root decision.
///
/// Evaluated exactly once, by whichever worker pops it from the queue. The
/// outcome is written once and only read back after the batch has completed.
pub struct WorkOrder<G: Game> {
    index: usize,
    decision: G::Choice,
    sequencer: G::Sequencer,
    candidate: G::Answer,
    strategy: Arc<EvaluationStrategy<G>>,
    cancel: CancellationToken,
    outcome: OnceLock<Result<WorkResult>>,
}

impl<G: Game> WorkOrder<G> {
    /// `sequencer` must have `decision` as its next unit of work.
    pub fn new(
        index: usize,
        decision: G::Choice,
        sequencer: G::Sequencer,
        candidate: G::Answer,
        strategy: Arc<EvaluationStrategy<G>>,
        cancel: CancellationToken,
    ) -> Self {
        WorkOrder {
            index,
            decision,
            sequencer,
            candidate,
            strategy,
            cancel,
            outcome: OnceLock::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn candidate(&self) -> &G::Answer {
        &self.candidate
    }

    /// `None` until the order has been evaluated.
    pub fn outcome(&self) -> Option<&Result<WorkResult>> {
        self.outcome.get()
    }

    /// Searches the candidate on `game`, a worker's private replica, and
    /// records the outcome. Panics are caught and recorded as errors.
    ///
    /// The replica is rolled back to its previous state unless the search
    /// panicked.
    pub fn evaluate(&self, game: &mut G) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.search(game)))
            .unwrap_or_else(|payload| Err(SearchError::from_panic(payload)));
        if let Err(err) = &outcome {
            tracing::warn!(order = self.index, error = %err, "work order failed");
        }
        let _ = self.outcome.set(outcome);
    }

    fn search(&self, game: &mut G) -> Result<WorkResult> {
        let strategy = &*self.strategy;
        let mut tree = SearchTree::new(&strategy.config);
        tree.initialize_node(
            strategy
                .algorithm
                .is_maximizing_player(self.decision.player()),
        );

        let mut driver = driver_for::<G>(strategy.config.driver);
        game.begin_transaction();
        tree.begin_node(self.candidate.clone());
        let walk = {
            let mut ctx = EvaluationContext::new(
                &mut tree,
                strategy.algorithm.as_ref(),
                strategy.choices.as_ref(),
                &self.cancel,
            );
            driver.run(
                &mut ctx,
                game,
                self.sequencer.clone(),
                Some(self.candidate.clone()),
            )
        };
        tree.end_node();
        game.end_transaction(true);
        walk?;

        Ok(WorkResult {
            score: tree.result().and(tree.score()),
            evaluations: tree.evaluations(),
            trace: tree.take_trace(),
            abandoned: tree.is_abandoned(),
        })
    }
}
