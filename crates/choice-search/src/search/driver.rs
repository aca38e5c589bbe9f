//! The walk shared by both driver strategies.

use crate::error::Result;
use crate::game::{
    Choice, FixedDecision, Game, Part, RunResult, Sequencer, TransactionKind, UndeclaredChoice,
    state_key,
};
use crate::search::config::DriverKind;
use crate::search::iterative::IterativeMinMaxDriver;
use crate::search::recursive::RecursiveMinMaxDriver;
use crate::search::search_context::EvaluationContext;

/// Walks a simulated game below the current node of a tree.
pub trait MinMaxDriver<G: Game> {
    /// Searches everything below the current node. With `forced` set, that
    /// answer is applied to the pending decision first.
    ///
    /// Every node and transaction opened by the walk is closed again when this
    /// returns, on success and on error.
    fn run(
        &mut self,
        ctx: &mut EvaluationContext<'_, G>,
        game: &mut G,
        sequencer: G::Sequencer,
        forced: Option<G::Answer>,
    ) -> Result<()>;
}

/// Creates the driver selected by `kind`.
pub fn driver_for<G: Game>(kind: DriverKind) -> Box<dyn MinMaxDriver<G>> {
    match kind {
        DriverKind::Recursive => Box::new(RecursiveMinMaxDriver),
        DriverKind::Iterative => Box::new(IterativeMinMaxDriver::new()),
    }
}

/// How a ply ended.
pub(crate) enum PlyOutcome<G: Game> {
    /// The current node got its value (scored, discarded, resolved from the
    /// transposition table or abandoned).
    Closed,
    /// The current node was initialized at a decision with several answers.
    Branch {
        sequencer: G::Sequencer,
        candidates: Vec<G::Answer>,
    },
}

/// Runs the simulation forward from the current node until it either closes
/// or reaches a decision that needs branching.
pub(crate) fn run_ply<G: Game>(
    ctx: &mut EvaluationContext<'_, G>,
    game: &mut G,
    mut sequencer: G::Sequencer,
    forced: Option<G::Answer>,
) -> Result<PlyOutcome<G>> {
    if let Some(answer) = forced
        && sequencer.run_once(game, &mut FixedDecision::new(answer))? == RunResult::Stop
    {
        ctx.evaluate_leaf(game);
        return Ok(PlyOutcome::Closed);
    }

    loop {
        if ctx.is_cancelled() {
            ctx.tree.abandon();
            return Ok(PlyOutcome::Closed);
        }
        if sequencer.is_empty() || ctx.is_terminal(game) {
            ctx.evaluate_leaf(game);
            return Ok(PlyOutcome::Closed);
        }
        let Some(part) = sequencer.next_part() else {
            ctx.evaluate_leaf(game);
            return Ok(PlyOutcome::Closed);
        };

        let result = match part {
            Part::Choice(choice) => {
                let mut candidates = ctx.choices.enumerate(game, &choice);
                if candidates.len() > 1 {
                    let is_maximizing = ctx.algorithm.is_maximizing_player(choice.player());
                    ctx.tree.initialize_node(is_maximizing);
                    if ctx.tree.transposition_table().is_some() {
                        let hash = state_key(game, &sequencer);
                        if !ctx.tree.consider_transposition_table(hash) {
                            return Ok(PlyOutcome::Closed);
                        }
                    }
                    return Ok(PlyOutcome::Branch {
                        sequencer,
                        candidates,
                    });
                }
                // forced move, no node is opened for it
                let Some(answer) = candidates.pop() else {
                    ctx.tree.discard();
                    return Ok(PlyOutcome::Closed);
                };
                sequencer.run_once(game, &mut FixedDecision::new(answer))?
            }
            Part::Transaction(TransactionKind::Rollback) => {
                ctx.tree.discard();
                return Ok(PlyOutcome::Closed);
            }
            Part::Transaction(_) | Part::Step => {
                sequencer.run_once(game, &mut UndeclaredChoice)?
            }
        };

        if result == RunResult::Stop {
            ctx.evaluate_leaf(game);
            return Ok(PlyOutcome::Closed);
        }
    }
}
