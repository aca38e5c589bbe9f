use std::collections::VecDeque;

use crate::error::{Result, SearchError};
use crate::game::Game;
use crate::search::driver::{MinMaxDriver, PlyOutcome, run_ply};
use crate::search::search_context::EvaluationContext;

/// Candidates of one decision that are still to be tried.
struct ChoiceRound<G: Game> {
    sequencer: G::Sequencer,
    remaining: VecDeque<G::Answer>,
    /// A child node and its transaction are open for this round.
    in_flight: bool,
}

/// Driver that replaces recursion with an explicit stack of choice rounds.
///
/// A caller can drive it one candidate at a time through
/// [`IterativeMinMaxDriver::start`] and [`IterativeMinMaxDriver::step`].
/// Between two steps the tree and the game hold exactly the nodes and
/// transactions of the rounds on the stack.
pub struct IterativeMinMaxDriver<G: Game> {
    rounds: Vec<ChoiceRound<G>>,
}

impl<G: Game> Default for IterativeMinMaxDriver<G> {
    fn default() -> Self {
        IterativeMinMaxDriver { rounds: Vec::new() }
    }
}

impl<G: Game> IterativeMinMaxDriver<G> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open choice rounds.
    pub fn pending_rounds(&self) -> usize {
        self.rounds.len()
    }

    /// Starts a walk below the current node. Any walk left over from a
    /// previous start must have been completed.
    pub fn start(
        &mut self,
        ctx: &mut EvaluationContext<'_, G>,
        game: &mut G,
        sequencer: G::Sequencer,
        forced: Option<G::Answer>,
    ) -> Result<()> {
        debug_assert!(self.rounds.is_empty(), "previous walk still in progress");
        self.open(ctx, game, sequencer, forced)
    }

    fn open(
        &mut self,
        ctx: &mut EvaluationContext<'_, G>,
        game: &mut G,
        sequencer: G::Sequencer,
        forced: Option<G::Answer>,
    ) -> Result<()> {
        if let PlyOutcome::Branch {
            sequencer,
            candidates,
        } = run_ply(ctx, game, sequencer, forced)?
        {
            self.rounds.push(ChoiceRound {
                sequencer,
                remaining: candidates.into(),
                in_flight: false,
            });
        }
        Ok(())
    }

    /// Closes the in-flight child of the innermost round, then opens its next
    /// candidate or pops the round when none is left.
    ///
    /// Returns `false` once the walk is complete. On error every open node
    /// and transaction is closed before the error is returned.
    pub fn step(&mut self, ctx: &mut EvaluationContext<'_, G>, game: &mut G) -> Result<bool> {
        let next = {
            let Some(round) = self.rounds.last_mut() else {
                return Ok(false);
            };
            if round.in_flight {
                round.in_flight = false;
                let keep_going = ctx.tree.end_node();
                game.end_transaction(true);
                if !keep_going {
                    round.remaining.clear();
                }
            }
            if !round.remaining.is_empty() && ctx.is_cancelled() {
                ctx.tree.abandon();
                round.remaining.clear();
            }
            match round.remaining.pop_front() {
                Some(candidate) => {
                    round.in_flight = true;
                    Some((round.sequencer.clone(), candidate))
                }
                None => None,
            }
        };

        match next {
            Some((sequencer, candidate)) => {
                game.begin_transaction();
                ctx.tree.begin_node(candidate.clone());
                if let Err(err) = self.open(ctx, game, sequencer, Some(candidate)) {
                    return Err(self.unwind(ctx, game, err));
                }
            }
            None => {
                self.rounds.pop();
            }
        }
        Ok(!self.rounds.is_empty())
    }

    /// Closes every open child node and transaction, innermost first.
    fn unwind(
        &mut self,
        ctx: &mut EvaluationContext<'_, G>,
        game: &mut G,
        err: SearchError,
    ) -> SearchError {
        while let Some(round) = self.rounds.pop() {
            if round.in_flight {
                ctx.tree.end_node();
                game.end_transaction(true);
            }
        }
        err
    }
}

impl<G: Game> MinMaxDriver<G> for IterativeMinMaxDriver<G> {
    fn run(
        &mut self,
        ctx: &mut EvaluationContext<'_, G>,
        game: &mut G,
        sequencer: G::Sequencer,
        forced: Option<G::Answer>,
    ) -> Result<()> {
        self.start(ctx, game, sequencer, forced)?;
        while self.step(ctx, game)? {}
        Ok(())
    }
}
