use std::fmt::Write as _;
use std::sync::Arc;

use crate::algorithm::{ChoiceEnumeratorProvider, MinimaxAlgorithm};
use crate::error::{Result, SearchError};
use crate::game::{Choice, Game};
use crate::search::cancellation::CancellationToken;
use crate::search::config::SearchConfig;
use crate::search::search_result::{AiResult, ResultSource};
use crate::search::threading::{
    DispatchStrategy, MultiThreadedDispatchStrategy, SingleThreadedDispatchStrategy,
};
use crate::search::tree::SearchTree;
use crate::search::work_order::{EvaluationStrategy, WorkOrder};
use crate::types::Score;

/// Splits a root decision into one work order per candidate, runs them on a
/// dispatch strategy and folds the per-candidate values into one answer.
pub struct MinMaxPartitioner<G: Game> {
    strategy: Arc<EvaluationStrategy<G>>,
    dispatch: Box<dyn DispatchStrategy<G>>,
}

impl<G: Game> MinMaxPartitioner<G> {
    /// Creates a partitioner whose workers hold replicas of `game`. A single
    /// configured thread selects the inline dispatch strategy.
    pub fn new(
        game: &G,
        algorithm: impl MinimaxAlgorithm<G> + 'static,
        choices: impl ChoiceEnumeratorProvider<G> + 'static,
        config: SearchConfig,
    ) -> Self {
        let n_threads = config.effective_threads();
        let dispatch: Box<dyn DispatchStrategy<G>> = if n_threads == 1 {
            Box::new(SingleThreadedDispatchStrategy::new(game))
        } else {
            Box::new(MultiThreadedDispatchStrategy::new(game, n_threads))
        };
        Self::with_dispatch(EvaluationStrategy::new(algorithm, choices, config), dispatch)
    }

    pub fn with_dispatch(
        strategy: EvaluationStrategy<G>,
        dispatch: Box<dyn DispatchStrategy<G>>,
    ) -> Self {
        MinMaxPartitioner {
            strategy: Arc::new(strategy),
            dispatch,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.strategy.config
    }

    pub fn worker_count(&self) -> usize {
        self.dispatch.worker_count()
    }

    /// Picks an answer for `choice`, the next unit of work of `sequencer`.
    ///
    /// `candidates` are searched in the given order. The first error captured
    /// by a work order, by candidate index, is returned once every order has
    /// finished. Cancellation is not an error: it yields the partial verdict,
    /// or the choice's default answer when nothing was reached. Either way the
    /// result is marked [`ResultSource::Cancelled`] once an order was cut short.
    pub fn execute(
        &mut self,
        game: &G,
        sequencer: &G::Sequencer,
        choice: &G::Choice,
        candidates: Vec<G::Answer>,
        cancel: &CancellationToken,
    ) -> Result<AiResult<G::Answer>> {
        match candidates.len() {
            0 => {
                tracing::trace!(?choice, "no candidates, using default answer");
                return Ok(AiResult::fallback(choice.default_answer(), ResultSource::Default));
            }
            1 => {
                tracing::trace!(?choice, "single candidate, search skipped");
                let answer = candidates
                    .into_iter()
                    .next()
                    .unwrap_or_else(|| choice.default_answer());
                return Ok(AiResult::single_candidate(answer));
            }
            _ => {}
        }
        if cancel.is_cancelled() {
            tracing::trace!(?choice, "cancelled before dispatch");
            return Ok(AiResult::fallback(choice.default_answer(), ResultSource::Cancelled));
        }

        self.dispatch.resynchronize(game)?;
        let n_candidates = candidates.len();
        let orders: Vec<Arc<WorkOrder<G>>> = candidates
            .into_iter()
            .enumerate()
            .map(|(index, candidate)| {
                Arc::new(WorkOrder::new(
                    index,
                    choice.clone(),
                    sequencer.clone(),
                    candidate,
                    self.strategy.clone(),
                    cancel.clone(),
                ))
            })
            .collect();
        for order in &orders {
            self.dispatch.dispatch(order.clone());
        }
        self.dispatch.wait()?;

        let mut finished = Vec::with_capacity(orders.len());
        for order in &orders {
            match order.outcome() {
                Some(Ok(result)) => {
                    finished.push((order.index(), order.candidate().clone(), result))
                }
                Some(Err(err)) => return Err(err.clone()),
                None => return Err(SearchError::WorkerUnavailable),
            }
        }

        let evaluations = finished.iter().map(|(_, _, result)| result.evaluations).sum();
        let abandoned = finished.iter().any(|(_, _, result)| result.abandoned);
        let trace = self.strategy.config.capture_trace.then(|| {
            finished.iter().fold(String::new(), |mut trace, (index, candidate, result)| {
                let _ = writeln!(trace, "# order {index}: {candidate:?}");
                trace.push_str(result.trace.as_deref().unwrap_or_default());
                trace
            })
        });
        let is_maximizing = self
            .strategy
            .algorithm
            .is_maximizing_player(choice.player());
        let verdict = aggregate(
            &self.strategy.config,
            is_maximizing,
            finished.iter().filter_map(|(index, candidate, result)| {
                result.score.map(|score| (*index, candidate.clone(), score))
            }),
        );

        let result = match verdict {
            Some((answer, score)) if abandoned => AiResult {
                source: ResultSource::Cancelled,
                ..AiResult::searched(answer, score, evaluations, trace)
            },
            Some((answer, score)) => AiResult::searched(answer, score, evaluations, trace),
            None => {
                let source = if abandoned || cancel.is_cancelled() {
                    ResultSource::Cancelled
                } else {
                    ResultSource::Default
                };
                AiResult {
                    evaluations,
                    trace,
                    ..AiResult::fallback(choice.default_answer(), source)
                }
            }
        };
        tracing::debug!(
            n_candidates,
            answer = ?result.answer,
            score = ?result.score,
            evaluations = result.evaluations,
            source = ?result.source,
            "decision searched"
        );
        Ok(result)
    }
}

/// Folds per-candidate values `(index, candidate, score)` through a one-ply
/// merge tree rooted at a node of color `is_maximizing`.
///
/// Values are fed in candidate-index order, so the verdict does not depend on
/// the order of `scored`, and the lowest index wins ties.
pub fn aggregate<A: Clone + std::fmt::Debug>(
    config: &SearchConfig,
    is_maximizing: bool,
    scored: impl IntoIterator<Item = (usize, A, Score)>,
) -> Option<(A, Score)> {
    let mut scored: Vec<_> = scored.into_iter().collect();
    scored.sort_by_key(|(index, _, _)| *index);

    let merge_config = SearchConfig {
        transposition_table: false,
        pruning: false,
        capture_trace: false,
        ..config.clone()
    };
    let mut merge = SearchTree::new(&merge_config);
    merge.initialize_node(is_maximizing);
    for (_, candidate, score) in scored {
        merge.begin_node(candidate);
        merge.evaluate(score);
        merge.end_node();
    }
    Some((merge.result()?.clone(), merge.score()?))
}
