use crate::error::Result;
use crate::game::Game;
use crate::search::driver::{MinMaxDriver, PlyOutcome, run_ply};
use crate::search::search_context::EvaluationContext;

/// Driver that branches with native recursion. Stack depth grows with the
/// depth of the game tree.
pub struct RecursiveMinMaxDriver;

impl RecursiveMinMaxDriver {
    fn search<G: Game>(
        ctx: &mut EvaluationContext<'_, G>,
        game: &mut G,
        sequencer: G::Sequencer,
        forced: Option<G::Answer>,
    ) -> Result<()> {
        let PlyOutcome::Branch {
            sequencer,
            candidates,
        } = run_ply(ctx, game, sequencer, forced)?
        else {
            return Ok(());
        };

        for candidate in candidates {
            if ctx.is_cancelled() {
                ctx.tree.abandon();
                break;
            }

            game.begin_transaction();
            ctx.tree.begin_node(candidate.clone());
            let outcome = Self::search(ctx, game, sequencer.clone(), Some(candidate));
            let keep_going = ctx.tree.end_node();
            game.end_transaction(true);

            outcome?;
            if !keep_going {
                break;
            }
        }
        Ok(())
    }
}

impl<G: Game> MinMaxDriver<G> for RecursiveMinMaxDriver {
    fn run(
        &mut self,
        ctx: &mut EvaluationContext<'_, G>,
        game: &mut G,
        sequencer: G::Sequencer,
        forced: Option<G::Answer>,
    ) -> Result<()> {
        Self::search(ctx, game, sequencer, forced)
    }
}
