#![allow(dead_code)]

use choice_search::algorithm::MinimaxAlgorithm;
use choice_search::game::{
    FixedDecision, Game, Part, RunResult, Sequencer, TransactionKind, UndeclaredChoice,
};
use choice_search::search::{
    CancellationToken, EvaluationContext, SearchConfig, SearchTree, driver_for,
};
use choice_search::synthetic::{SyntheticAlgorithm, SyntheticGame, SyntheticSequencer, TreeShape};
use choice_search::{Choice, Score};
use proptest::prelude::*;

/// Outcome of a single-tree search over a whole synthetic game.
#[derive(Debug, PartialEq)]
pub struct TreeOutcome {
    pub result: Option<u32>,
    pub score: Option<Score>,
    pub evaluations: u64,
}

/// Searches the whole game with one tree and the configured driver.
pub fn run_tree(shape: &TreeShape, config: &SearchConfig) -> TreeOutcome {
    let (mut game, sequencer) = SyntheticGame::start(shape.clone());
    let algorithm = SyntheticAlgorithm::new(0);
    let choices = SyntheticGame::enumerators();
    let cancel = CancellationToken::new();
    let mut tree = SearchTree::new(config);
    let mut driver = driver_for::<SyntheticGame>(config.driver);
    // a forced opening answer is applied to the game itself
    game.begin_transaction();
    {
        let mut ctx = EvaluationContext::new(&mut tree, &algorithm, &choices, &cancel);
        driver
            .run(&mut ctx, &mut game, sequencer, None)
            .expect("synthetic search failed");
    }
    game.end_transaction(true);
    assert_eq!(game.open_transactions(), 0);
    assert!(game.path().is_empty());
    TreeOutcome {
        result: tree.result().copied(),
        score: tree.score(),
        evaluations: tree.evaluations(),
    }
}

/// Plain minimax without windows, cut-offs or memoization.
pub fn brute_force(
    game: &mut SyntheticGame,
    mut sequencer: SyntheticSequencer,
    algorithm: &SyntheticAlgorithm,
) -> Option<Score> {
    loop {
        match sequencer.next_part() {
            None => return Some(algorithm.compute_heuristic(game, true)),
            Some(Part::Choice(choice)) => {
                let maximize = algorithm.is_maximizing_player(choice.player());
                let mut best: Option<Score> = None;
                for answer in 0..choice.width() {
                    let mut child = sequencer.clone();
                    game.begin_transaction();
                    let run = child
                        .run_once(game, &mut FixedDecision::new(answer))
                        .expect("synthetic answer rejected");
                    let value = if run == RunResult::Stop {
                        Some(algorithm.compute_heuristic(game, true))
                    } else {
                        brute_force(game, child, algorithm)
                    };
                    game.end_transaction(true);

                    if let Some(value) = value {
                        best = Some(match best {
                            None => value,
                            Some(best) if maximize => best.max(value),
                            Some(best) => best.min(value),
                        });
                    }
                }
                return best;
            }
            Some(Part::Transaction(TransactionKind::Rollback)) => return None,
            Some(_) => {
                let run = sequencer
                    .run_once(game, &mut UndeclaredChoice)
                    .expect("synthetic step failed");
                if run == RunResult::Stop {
                    return Some(algorithm.compute_heuristic(game, true));
                }
            }
        }
    }
}

pub fn brute_force_value(shape: &TreeShape) -> Option<Score> {
    let (mut game, sequencer) = SyntheticGame::start(shape.clone());
    brute_force(&mut game, sequencer, &SyntheticAlgorithm::new(0))
}

/// Small synthetic trees with every kind of part mixed in.
pub fn shapes() -> impl Strategy<Value = TreeShape> {
    (
        1u32..=5,
        1u32..=4,
        any::<u64>(),
        0u8..=25,
        0u8..=30,
        0u8..=20,
        0u8..=40,
        0u8..=40,
        0u8..=50,
    )
        .prop_map(
            |(
                depth,
                branching,
                seed,
                dead_end_percent,
                forced_percent,
                rollback_percent,
                step_percent,
                same_player_percent,
                bracket_percent,
            )| TreeShape {
                depth,
                branching,
                seed,
                dead_end_percent,
                forced_percent,
                rollback_percent,
                step_percent,
                same_player_percent,
                bracket_percent,
                transpose: false,
                hidden_choice_at: None,
            },
        )
}

/// Shapes whose move orders transpose into hash-equal states.
pub fn transposing_shapes() -> impl Strategy<Value = TreeShape> {
    (shapes(), 2u32..=4, 3u32..=6).prop_map(|(shape, branching, depth)| TreeShape {
        transpose: true,
        branching,
        depth,
        ..shape
    })
}
