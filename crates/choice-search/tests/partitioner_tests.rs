//! End-to-end decisions through the partitioner and its worker pool.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};

use choice_search::algorithm::{DepthLimited, MinimaxAlgorithm};
use choice_search::search::{
    AiResult, CancellationToken, DriverKind, MinMaxPartitioner, ResultSource, Scoring,
    SearchConfig, SearchTree,
};
use choice_search::synthetic::{SyntheticAlgorithm, SyntheticGame, TreeShape};
use choice_search::{Result, Score, SearchError};
use proptest::prelude::*;

use common::{brute_force_value, run_tree, shapes};

fn partitioner<A>(
    game: &SyntheticGame,
    algorithm: A,
    config: SearchConfig,
) -> MinMaxPartitioner<SyntheticGame>
where
    A: MinimaxAlgorithm<SyntheticGame> + 'static,
{
    MinMaxPartitioner::new(game, algorithm, SyntheticGame::enumerators(), config)
}

/// Decides the opening choice of `shape` with every legal answer as candidate.
fn decide(shape: &TreeShape, config: SearchConfig) -> Result<AiResult<u32>> {
    decide_with(shape, SyntheticAlgorithm::new(0), config)
}

fn decide_with<A>(shape: &TreeShape, algorithm: A, config: SearchConfig) -> Result<AiResult<u32>>
where
    A: MinimaxAlgorithm<SyntheticGame> + 'static,
{
    let (game, sequencer) = SyntheticGame::start(shape.clone());
    let choice = sequencer.pending_choice().expect("opening choice");
    let candidates = (0..choice.width()).collect();
    partitioner(&game, algorithm, config).execute(
        &game,
        &sequencer,
        &choice,
        candidates,
        &CancellationToken::new(),
    )
}

fn single_threaded() -> SearchConfig {
    SearchConfig::default().with_threads(Some(1))
}

#[test]
fn test_single_candidate_skips_search() {
    let shape = TreeShape {
        branching: 1,
        ..TreeShape::default()
    };
    let result = decide(&shape, single_threaded()).unwrap();
    assert_eq!(result.answer, 0);
    assert_eq!(result.source, ResultSource::SingleCandidate);
    assert_eq!(result.score, None);
    assert_eq!(result.evaluations, 0);
    assert!(!result.was_searched());
}

#[test]
fn test_no_candidates_uses_default_answer() {
    let (game, sequencer) = SyntheticGame::start(TreeShape::default());
    let choice = sequencer.pending_choice().unwrap();
    let result = partitioner(&game, SyntheticAlgorithm::new(0), single_threaded())
        .execute(&game, &sequencer, &choice, Vec::new(), &CancellationToken::new())
        .unwrap();
    assert_eq!(result.answer, 0);
    assert_eq!(result.source, ResultSource::Default);
    assert_eq!(result.score, None);
}

#[test]
fn test_cancelled_before_dispatch() {
    let (game, sequencer) = SyntheticGame::start(TreeShape::default());
    let choice = sequencer.pending_choice().unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = partitioner(&game, SyntheticAlgorithm::new(0), single_threaded())
        .execute(&game, &sequencer, &choice, vec![2, 1, 0], &cancel)
        .unwrap();
    assert_eq!(result.answer, 0);
    assert_eq!(result.source, ResultSource::Cancelled);
    assert_eq!(result.evaluations, 0);
}

#[test]
fn test_searched_value_matches_brute_force() {
    for seed in 0..8 {
        let shape = TreeShape {
            seed,
            forced_percent: 20,
            step_percent: 30,
            ..TreeShape::default()
        };
        let result = decide(&shape, single_threaded()).unwrap();
        assert_eq!(result.source, ResultSource::Searched);
        assert_eq!(result.score, brute_force_value(&shape), "seed {seed}");
        assert!(result.evaluations > 0);
        assert!(result.answer < shape.branching);
    }
}

#[test]
fn test_thread_count_does_not_change_result() {
    let shape = TreeShape {
        depth: 5,
        branching: 4,
        seed: 17,
        same_player_percent: 20,
        ..TreeShape::default()
    };
    let inline = decide(&shape, single_threaded()).unwrap();
    for n_threads in [2, 3, 8] {
        let config = SearchConfig::default().with_threads(Some(n_threads));
        let pooled = decide(&shape, config).unwrap();
        assert_eq!(pooled, inline, "{n_threads} threads");
    }
}

#[test]
fn test_minimizing_decision() {
    let shape = TreeShape {
        seed: 3,
        ..TreeShape::default()
    };
    let as_max = decide_with(&shape, SyntheticAlgorithm::new(0), single_threaded()).unwrap();
    let as_min = decide_with(&shape, SyntheticAlgorithm::new(1), single_threaded()).unwrap();
    // the opening player minimizes in the second run over negated leaves
    assert_eq!(as_min.answer, as_max.answer);
    assert_eq!(as_min.score.map(|score| -score), as_max.score);
}

#[test]
fn test_undeclared_choice_is_reported() {
    let shape = TreeShape {
        hidden_choice_at: Some(2),
        ..TreeShape::default()
    };
    for n_threads in [1, 3] {
        let config = SearchConfig::default().with_threads(Some(n_threads));
        let err = decide(&shape, config).unwrap_err();
        assert!(matches!(err, SearchError::UndeclaredChoice { .. }), "{err:?}");
    }
}

#[test]
fn test_out_of_range_candidate_is_reported() {
    let (game, sequencer) = SyntheticGame::start(TreeShape::default());
    let choice = sequencer.pending_choice().unwrap();
    let err = partitioner(&game, SyntheticAlgorithm::new(0), single_threaded())
        .execute(&game, &sequencer, &choice, vec![0, 9], &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, SearchError::Collaborator(_)));
}

#[test]
fn test_worker_panic_is_reported_and_pool_survives() {
    let (game, sequencer) = SyntheticGame::start(TreeShape::default());
    let choice = sequencer.pending_choice().unwrap();
    let cancel = CancellationToken::new();
    let mut partitioner = partitioner(
        &game,
        SyntheticAlgorithm::new(0).with_panic_below(1),
        SearchConfig::default().with_threads(Some(2)),
    );

    let err = partitioner
        .execute(&game, &sequencer, &choice, vec![0, 1, 2], &cancel)
        .unwrap_err();
    assert!(matches!(err, SearchError::WorkerPanicked(_)), "{err:?}");

    let result = partitioner
        .execute(&game, &sequencer, &choice, vec![0, 2], &cancel)
        .unwrap();
    assert_eq!(result.source, ResultSource::Searched);
    assert!(result.answer == 0 || result.answer == 2);
}

#[test]
fn test_dead_ends_fall_back_to_default() {
    let shape = TreeShape {
        depth: 2,
        dead_end_percent: 100,
        ..TreeShape::default()
    };
    let result = decide(&shape, single_threaded()).unwrap();
    assert_eq!(result.source, ResultSource::Default);
    assert_eq!(result.answer, 0);
    assert_eq!(result.score, None);
    assert_eq!(result.evaluations, 0);
}

#[test]
fn test_trace_lists_every_order() {
    let result = decide(&TreeShape::default(), single_threaded().with_trace(true)).unwrap();
    let trace = result.trace.expect("trace requested");
    assert!(trace.contains("# order 0: 0"));
    assert!(trace.contains("# order 2: 2"));

    let quiet = decide(&TreeShape::default(), single_threaded()).unwrap();
    assert_eq!(quiet.trace, None);
}

#[test]
fn test_depth_limit_agrees_across_drivers() {
    let shape = TreeShape {
        depth: 6,
        seed: 41,
        ..TreeShape::default()
    };
    let results: Vec<_> = [DriverKind::Recursive, DriverKind::Iterative]
        .into_iter()
        .map(|driver| {
            let config = single_threaded().with_driver(driver);
            decide_with(&shape, DepthLimited::new(SyntheticAlgorithm::new(0), 3), config).unwrap()
        })
        .collect();
    assert_eq!(results[0], results[1]);

    let unlimited = decide(&shape, single_threaded()).unwrap();
    assert!(results[0].evaluations < unlimited.evaluations);
}

#[test]
fn test_repeated_decisions_are_stable() {
    let (game, sequencer) = SyntheticGame::start(TreeShape::default());
    let choice = sequencer.pending_choice().unwrap();
    let mut partitioner = partitioner(
        &game,
        SyntheticAlgorithm::new(0),
        SearchConfig::default().with_threads(Some(2)),
    );
    let cancel = CancellationToken::new();
    let first = partitioner
        .execute(&game, &sequencer, &choice, vec![0, 1, 2], &cancel)
        .unwrap();
    let again = partitioner
        .execute(&game, &sequencer, &choice, vec![0, 1, 2], &cancel)
        .unwrap();
    assert_eq!(again, first);
    assert_eq!(game.open_transactions(), 0);
    assert!(game.path().is_empty());
}

/// Cancels `token` from inside the heuristic once `budget` leaves were scored.
struct CancelAfterLeaves {
    inner: SyntheticAlgorithm,
    token: CancellationToken,
    budget: usize,
    scored: AtomicUsize,
}

impl CancelAfterLeaves {
    fn new(token: CancellationToken, budget: usize) -> Self {
        CancelAfterLeaves {
            inner: SyntheticAlgorithm::new(0),
            token,
            budget,
            scored: AtomicUsize::new(0),
        }
    }
}

impl MinimaxAlgorithm<SyntheticGame> for CancelAfterLeaves {
    fn is_maximizing_player(&self, player: u8) -> bool {
        self.inner.is_maximizing_player(player)
    }

    fn compute_heuristic(&self, game: &SyntheticGame, relative_to_maximizer: bool) -> Score {
        if self.scored.fetch_add(1, Ordering::Relaxed) + 1 >= self.budget {
            self.token.cancel();
        }
        self.inner.compute_heuristic(game, relative_to_maximizer)
    }

    fn is_terminal(&self, tree: &SearchTree<u32>, game: &SyntheticGame) -> bool {
        self.inner.is_terminal(tree, game)
    }
}

#[test]
fn test_cancelled_mid_search_keeps_partial_verdict() {
    let shape = TreeShape::default();
    let (game, sequencer) = SyntheticGame::start(shape.clone());
    let choice = sequencer.pending_choice().unwrap();
    let candidates: Vec<u32> = (0..choice.width()).collect();

    for n_threads in [1, 3] {
        let config = SearchConfig::default().with_threads(Some(n_threads));
        let full = decide(&shape, config.clone()).unwrap();
        for budget in [1, 5, 40] {
            let cancel = CancellationToken::new();
            let algorithm = CancelAfterLeaves::new(cancel.clone(), budget);
            let mut partitioner = partitioner(&game, algorithm, config.clone());

            let result = partitioner
                .execute(&game, &sequencer, &choice, candidates.clone(), &cancel)
                .unwrap();
            let context = format!("{n_threads} threads, {budget} leaves");
            if cancel.is_cancelled() {
                assert!(result.evaluations >= budget as u64, "{context}");
            }
            match result.score {
                Some(_) => assert!(result.answer < shape.branching, "{context}"),
                None => assert_eq!(result.answer, 0, "{context}"),
            }
            if budget <= 5 {
                // every order scores more leaves than that
                assert!(cancel.is_cancelled(), "{context}");
                assert_eq!(result.source, ResultSource::Cancelled, "{context}");
                assert!(!result.was_searched());
            } else if result.source == ResultSource::Searched {
                assert_eq!(result, full, "{context}");
            } else {
                assert_eq!(result.source, ResultSource::Cancelled, "{context}");
            }

            // workers come back intact for the next decision
            let again = partitioner
                .execute(&game, &sequencer, &choice, candidates.clone(), &CancellationToken::new())
                .unwrap();
            assert_eq!(again, full, "{context}");
            assert_eq!(game.open_transactions(), 0);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Property: splitting the root across work orders gives the single-tree verdict
    #[test]
    fn prop_partitioned_matches_single_tree(
        shape in shapes().prop_filter("root needs a real decision", |shape| shape.branching > 1),
        n_threads in 1usize..=3,
        scoring in prop_oneof![Just(Scoring::Minimax), Just(Scoring::Negamax)],
    ) {
        let config = SearchConfig::new(scoring).with_threads(Some(n_threads));
        let single = run_tree(&shape, &config);
        let partitioned = decide(&shape, config).unwrap();

        prop_assert_eq!(partitioned.score, single.score);
        if partitioned.source == ResultSource::Searched {
            prop_assert_eq!(Some(partitioned.answer), single.result);
        } else {
            prop_assert_eq!(partitioned.source, ResultSource::Default);
            prop_assert_eq!(single.result, None);
        }
    }
}
