//! Deterministic synthetic game.
//!
//! Two players take turns answering choices of configurable width until a
//! fixed number of decisions has been made. Every property of a turn (width,
//! acting player, surrounding steps and markers) and every leaf value is a
//! pseudo-random function of the shape's seed and the current state, so the
//! same shape always produces the same tree.
//!
//! With [`TreeShape::transpose`] the state is only the number of decisions
//! made and the sum of the answers, so different move orders reach
//! hash-equal states.

use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::algorithm::{EnumeratorRegistry, MinimaxAlgorithm};
use crate::error::{Result, SearchError};
use crate::game::{
    Choice, DecisionMaker, Game, Part, RunResult, Sequencer, StateHasher, TransactionKind,
};
use crate::search::tree::SearchTree;
use crate::types::Score;

/// Knobs of a synthetic game tree. Percentages are rolled per turn.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TreeShape {
    /// Decisions until the game ends.
    pub depth: u32,
    /// Width of a regular choice.
    pub branching: u32,
    pub seed: u64,
    /// Turns whose choice has no legal answer.
    pub dead_end_percent: u8,
    /// Turns whose choice has a single legal answer.
    pub forced_percent: u8,
    /// Turns that end in a rollback marker instead of a choice.
    pub rollback_percent: u8,
    /// Turns preceded by a plain step.
    pub step_percent: u8,
    /// Turns where the previous player acts again.
    pub same_player_percent: u8,
    /// Turns whose choice is wrapped in begin/commit markers.
    pub bracket_percent: u8,
    pub transpose: bool,
    /// Ply whose turn hides a decision inside a plain step.
    pub hidden_choice_at: Option<u32>,
}

impl Default for TreeShape {
    fn default() -> Self {
        TreeShape {
            depth: 4,
            branching: 3,
            seed: 0x5eed,
            dead_end_percent: 0,
            forced_percent: 0,
            rollback_percent: 0,
            step_percent: 0,
            same_player_percent: 0,
            bracket_percent: 25,
            transpose: false,
            hidden_choice_at: None,
        }
    }
}

fn mix(values: &[u64]) -> u64 {
    let mut hasher = StateHasher::new();
    for value in values {
        hasher.write_u64(*value);
    }
    hasher.finish()
}

fn initial_key(shape: &TreeShape) -> u64 {
    mix(&[shape.seed, 0, 0])
}

fn next_key(shape: &TreeShape, key: u64, ply: u32, sum: u64, answer: u32) -> u64 {
    if shape.transpose {
        mix(&[shape.seed, ply as u64, sum])
    } else {
        mix(&[key, answer as u64 + 1])
    }
}

/// A decision of the synthetic game.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SyntheticChoice {
    player: u8,
    ply: u32,
    width: u32,
}

impl SyntheticChoice {
    pub fn new(player: u8, ply: u32, width: u32) -> Self {
        SyntheticChoice { player, ply, width }
    }

    /// Number of legal answers, `0..width`.
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn ply(&self) -> u32 {
        self.ply
    }
}

impl Choice for SyntheticChoice {
    type Player = u8;
    type Answer = u32;
    /// Opening decisions (even plies) are kind 0, replies kind 1.
    type Kind = u8;

    fn player(&self) -> u8 {
        self.player
    }

    fn default_answer(&self) -> u32 {
        0
    }

    fn kind(&self) -> u8 {
        (self.ply % 2) as u8
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Checkpoint {
    path_len: usize,
    sum: u64,
    steps: u32,
}

/// State of a synthetic game: the answers given so far.
#[derive(Clone, Debug, PartialEq)]
pub struct SyntheticGame {
    shape: Arc<TreeShape>,
    path: Vec<u32>,
    sum: u64,
    steps: u32,
    journal: Vec<Checkpoint>,
}

impl SyntheticGame {
    pub fn new(shape: TreeShape) -> Self {
        SyntheticGame {
            shape: Arc::new(shape),
            path: Vec::new(),
            sum: 0,
            steps: 0,
            journal: Vec::new(),
        }
    }

    /// A fresh game together with the sequencer of its first turn.
    pub fn start(shape: TreeShape) -> (SyntheticGame, SyntheticSequencer) {
        let game = SyntheticGame::new(shape);
        let sequencer = SyntheticSequencer::new(game.shape.clone());
        (game, sequencer)
    }

    /// Enumerators listing `0..width` for every choice.
    pub fn enumerators() -> EnumeratorRegistry<SyntheticGame> {
        EnumeratorRegistry::with_fallback(
            |_: &SyntheticGame, choice: &SyntheticChoice| -> Vec<u32> {
                (0..choice.width()).collect()
            },
        )
    }

    pub fn shape(&self) -> &TreeShape {
        &self.shape
    }

    pub fn path(&self) -> &[u32] {
        &self.path
    }

    /// Plain steps executed so far.
    pub fn steps(&self) -> u32 {
        self.steps
    }

    pub fn open_transactions(&self) -> usize {
        self.journal.len()
    }

    fn key(&self) -> u64 {
        if self.shape.transpose {
            return mix(&[self.shape.seed, self.path.len() as u64, self.sum]);
        }
        self.path
            .iter()
            .fold(initial_key(&self.shape), |key, &answer| mix(&[key, answer as u64 + 1]))
    }

    /// Heuristic value of the current state for player 0.
    pub fn leaf_value(&self) -> Score {
        let raw = mix(&[self.shape.seed, self.key(), 0x1eaf]) % 2001;
        (raw as Score - 1000.0) / 10.0
    }

    fn apply(&mut self, answer: u32) {
        self.path.push(answer);
        self.sum += answer as u64;
    }
}

impl Game for SyntheticGame {
    type Player = u8;
    type Choice = SyntheticChoice;
    type Answer = u32;
    type Sequencer = SyntheticSequencer;

    fn begin_transaction(&mut self) {
        self.journal.push(Checkpoint {
            path_len: self.path.len(),
            sum: self.sum,
            steps: self.steps,
        });
    }

    fn end_transaction(&mut self, rollback: bool) {
        let Some(checkpoint) = self.journal.pop() else {
            debug_assert!(false, "transaction ended without being opened");
            return;
        };
        if rollback {
            self.path.truncate(checkpoint.path_len);
            self.sum = checkpoint.sum;
            self.steps = checkpoint.steps;
        }
    }

    fn hash_state(&self, hasher: &mut StateHasher) {
        hasher.write_u32(self.path.len() as u32);
        hasher.write_u64(self.key());
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum SyntheticPart {
    Choice(SyntheticChoice),
    Marker(TransactionKind),
    /// A plain step; asks to be run twice when `retry` is set.
    Step { retry: bool },
    /// A step that asks for a decision without declaring it.
    Hidden(SyntheticChoice),
}

/// The pending work of a synthetic game: the parts of the current turn.
///
/// It mirrors the game's ply and state key so upcoming turns can be scheduled
/// without looking at the game.
#[derive(Clone, Debug)]
pub struct SyntheticSequencer {
    shape: Arc<TreeShape>,
    ply: u32,
    sum: u64,
    key: u64,
    last_player: u8,
    queue: VecDeque<SyntheticPart>,
}

impl SyntheticSequencer {
    fn new(shape: Arc<TreeShape>) -> Self {
        let key = initial_key(&shape);
        let mut sequencer = SyntheticSequencer {
            shape,
            ply: 0,
            sum: 0,
            key,
            last_player: 1,
            queue: VecDeque::new(),
        };
        sequencer.schedule_turn();
        sequencer
    }

    /// The choice at the front of the queue, if the next part is one.
    pub fn pending_choice(&self) -> Option<SyntheticChoice> {
        match self.queue.front() {
            Some(SyntheticPart::Choice(choice)) => Some(choice.clone()),
            _ => None,
        }
    }

    pub fn ply(&self) -> u32 {
        self.ply
    }

    fn roll(&self, salt: u64) -> u8 {
        (mix(&[self.shape.seed, self.key, salt]) % 100) as u8
    }

    fn schedule_turn(&mut self) {
        if self.ply >= self.shape.depth {
            return;
        }
        let shape = self.shape.clone();
        let ply = self.ply;
        let player = if ply > 0 && self.roll(3) < shape.same_player_percent {
            self.last_player
        } else {
            1 - self.last_player
        };
        if ply == 0 {
            let opening = SyntheticChoice::new(player, ply, shape.branching);
            self.queue.push_back(SyntheticPart::Choice(opening));
            return;
        }

        let width = if self.roll(1) < shape.dead_end_percent {
            0
        } else if self.roll(2) < shape.forced_percent {
            1
        } else {
            shape.branching
        };
        let choice = SyntheticChoice::new(player, ply, width);

        if shape.hidden_choice_at == Some(ply) {
            self.queue.push_back(SyntheticPart::Hidden(choice.clone()));
        }
        if self.roll(4) < shape.step_percent {
            self.queue.push_back(SyntheticPart::Step {
                retry: self.roll(5) < 50,
            });
        }
        if self.roll(6) < shape.rollback_percent {
            self.queue
                .push_back(SyntheticPart::Marker(TransactionKind::Rollback));
        } else if self.roll(7) < shape.bracket_percent {
            self.queue
                .push_back(SyntheticPart::Marker(TransactionKind::Begin));
            self.queue.push_back(SyntheticPart::Choice(choice));
            self.queue
                .push_back(SyntheticPart::Marker(TransactionKind::Commit));
        } else {
            self.queue.push_back(SyntheticPart::Choice(choice));
        }
    }

    fn answer(
        &mut self,
        game: &mut SyntheticGame,
        choice: &SyntheticChoice,
        decisions: &mut dyn DecisionMaker<SyntheticGame>,
    ) -> Result<()> {
        let answer = decisions.decide(game, choice)?;
        if answer >= choice.width.max(1) {
            return Err(SearchError::Collaborator(format!(
                "answer {answer} is out of range for a choice of width {}",
                choice.width
            )));
        }
        game.apply(answer);
        self.ply += 1;
        self.sum += answer as u64;
        self.key = next_key(&self.shape, self.key, self.ply, self.sum, answer);
        self.last_player = choice.player;
        Ok(())
    }
}

impl Sequencer<SyntheticGame> for SyntheticSequencer {
    fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn next_part(&self) -> Option<Part<SyntheticChoice>> {
        self.queue.front().map(|part| match part {
            SyntheticPart::Choice(choice) => Part::Choice(choice.clone()),
            SyntheticPart::Marker(kind) => Part::Transaction(*kind),
            SyntheticPart::Step { .. } | SyntheticPart::Hidden(_) => Part::Step,
        })
    }

    fn skip(&mut self) {
        self.queue.pop_front();
        if self.queue.is_empty() {
            self.schedule_turn();
        }
    }

    fn run_once(
        &mut self,
        game: &mut SyntheticGame,
        decisions: &mut dyn DecisionMaker<SyntheticGame>,
    ) -> Result<RunResult> {
        let Some(part) = self.queue.front().cloned() else {
            return Ok(RunResult::Stop);
        };
        match part {
            SyntheticPart::Choice(choice) => self.answer(game, &choice, decisions)?,
            // the rule engine answers it like a regular choice
            SyntheticPart::Hidden(choice) => {
                decisions.decide(game, &choice)?;
            }
            SyntheticPart::Step { retry: true } => {
                if let Some(front) = self.queue.front_mut() {
                    *front = SyntheticPart::Step { retry: false };
                }
                return Ok(RunResult::Retry);
            }
            SyntheticPart::Step { retry: false } => game.steps += 1,
            SyntheticPart::Marker(_) => {}
        }
        self.queue.pop_front();

        if self.queue.is_empty() {
            self.schedule_turn();
        }
        if self.ply >= self.shape.depth && self.queue.is_empty() {
            return Ok(RunResult::Stop);
        }
        Ok(RunResult::Continue)
    }

    fn compute_hash(&self, hasher: &mut StateHasher) {
        self.ply.hash(hasher);
        self.last_player.hash(hasher);
        self.queue.hash(hasher);
    }
}

/// Scores synthetic games with [`SyntheticGame::leaf_value`].
#[derive(Clone, Debug)]
pub struct SyntheticAlgorithm {
    maximizing_player: u8,
    panic_below: Option<u32>,
}

impl SyntheticAlgorithm {
    pub fn new(maximizing_player: u8) -> Self {
        SyntheticAlgorithm {
            maximizing_player,
            panic_below: None,
        }
    }

    /// Makes the heuristic panic on every leaf below root answer `answer`.
    #[must_use]
    pub fn with_panic_below(mut self, answer: u32) -> Self {
        self.panic_below = Some(answer);
        self
    }
}

impl MinimaxAlgorithm<SyntheticGame> for SyntheticAlgorithm {
    fn is_maximizing_player(&self, player: u8) -> bool {
        player == self.maximizing_player
    }

    fn compute_heuristic(&self, game: &SyntheticGame, relative_to_maximizer: bool) -> Score {
        if let Some(answer) = self.panic_below
            && game.path.first() == Some(&answer)
        {
            panic!("heuristic failed below answer {answer}");
        }
        let value = if self.maximizing_player == 0 {
            game.leaf_value()
        } else {
            -game.leaf_value()
        };
        if relative_to_maximizer { value } else { -value }
    }

    fn is_terminal(&self, _tree: &SearchTree<u32>, _game: &SyntheticGame) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{FixedDecision, UndeclaredChoice, state_key};

    /// Runs steps and markers until the next choice or the end of the game.
    fn advance(game: &mut SyntheticGame, sequencer: &mut SyntheticSequencer) {
        while let Some(part) = sequencer.next_part() {
            if matches!(part, Part::Choice(_)) {
                break;
            }
            sequencer.run_once(game, &mut UndeclaredChoice).unwrap();
        }
    }

    fn play(game: &mut SyntheticGame, sequencer: &mut SyntheticSequencer, answers: &[u32]) {
        for &answer in answers {
            advance(game, sequencer);
            assert!(sequencer.pending_choice().is_some(), "game ended early");
            sequencer
                .run_once(game, &mut FixedDecision::new(answer))
                .unwrap();
        }
        advance(game, sequencer);
    }

    #[test]
    fn test_plays_to_depth() {
        let (mut game, mut sequencer) = SyntheticGame::start(TreeShape::default());
        let choice = sequencer.pending_choice().unwrap();
        assert_eq!(choice.width(), 3);
        assert_eq!(choice.player(), 0);

        play(&mut game, &mut sequencer, &[0, 1, 2]);
        assert_eq!(sequencer.pending_choice().map(|c| c.player()), Some(1));
        play(&mut game, &mut sequencer, &[1]);
        assert!(sequencer.is_empty());
        assert_eq!(game.path(), &[0, 1, 2, 1]);
        assert_eq!(
            sequencer.run_once(&mut game, &mut UndeclaredChoice),
            Ok(RunResult::Stop)
        );
    }

    #[test]
    fn test_skip_drops_step_unrun() {
        let shape = TreeShape {
            step_percent: 100,
            bracket_percent: 0,
            ..TreeShape::default()
        };
        let (mut game, mut sequencer) = SyntheticGame::start(shape);
        sequencer
            .run_once(&mut game, &mut FixedDecision::new(2))
            .unwrap();
        assert_eq!(sequencer.next_part(), Some(Part::Step));

        sequencer.skip();
        assert!(matches!(sequencer.next_part(), Some(Part::Choice(_))));
        assert_eq!(game.steps(), 0);
        assert_eq!(game.path(), &[2]);
    }

    #[test]
    fn test_rollback_restores_state() {
        let (mut game, mut sequencer) = SyntheticGame::start(TreeShape::default());
        let before = game.clone();
        game.begin_transaction();
        play(&mut game, &mut sequencer, &[2, 0]);
        assert_ne!(game, before);
        game.end_transaction(true);
        assert_eq!(game, before);
    }

    #[test]
    fn test_commit_keeps_state() {
        let (mut game, mut sequencer) = SyntheticGame::start(TreeShape::default());
        game.begin_transaction();
        play(&mut game, &mut sequencer, &[1]);
        game.end_transaction(false);
        assert_eq!(game.path(), &[1]);
        assert_eq!(game.open_transactions(), 0);
    }

    #[test]
    fn test_same_shape_same_values() {
        let shape = TreeShape {
            seed: 99,
            ..TreeShape::default()
        };
        let (mut a, mut seq_a) = SyntheticGame::start(shape.clone());
        let (mut b, mut seq_b) = SyntheticGame::start(shape);
        play(&mut a, &mut seq_a, &[1, 2]);
        play(&mut b, &mut seq_b, &[1, 2]);
        assert_eq!(a.leaf_value(), b.leaf_value());
        assert_eq!(state_key(&a, &seq_a), state_key(&b, &seq_b));
    }

    #[test]
    fn test_transposed_paths_share_key() {
        let shape = TreeShape {
            transpose: true,
            ..TreeShape::default()
        };
        let (mut a, mut seq_a) = SyntheticGame::start(shape.clone());
        let (mut b, mut seq_b) = SyntheticGame::start(shape);
        play(&mut a, &mut seq_a, &[0, 2]);
        play(&mut b, &mut seq_b, &[2, 0]);
        assert_ne!(a.path(), b.path());
        assert_eq!(a.leaf_value(), b.leaf_value());
        assert_eq!(state_key(&a, &seq_a), state_key(&b, &seq_b));

        let (mut c, mut seq_c) = SyntheticGame::start(TreeShape::default());
        let (mut d, mut seq_d) = SyntheticGame::start(TreeShape::default());
        play(&mut c, &mut seq_c, &[0, 2]);
        play(&mut d, &mut seq_d, &[2, 0]);
        assert_ne!(state_key(&c, &seq_c), state_key(&d, &seq_d));
    }

    #[test]
    fn test_hidden_choice_is_reported() {
        let shape = TreeShape {
            hidden_choice_at: Some(1),
            ..TreeShape::default()
        };
        let (mut game, mut sequencer) = SyntheticGame::start(shape);
        sequencer
            .run_once(&mut game, &mut FixedDecision::new(0))
            .unwrap();
        assert_eq!(sequencer.next_part(), Some(Part::Step));
        let err = sequencer
            .run_once(&mut game, &mut UndeclaredChoice)
            .unwrap_err();
        assert!(matches!(err, SearchError::UndeclaredChoice { .. }));
    }

    #[test]
    fn test_out_of_range_answer() {
        let (mut game, mut sequencer) = SyntheticGame::start(TreeShape::default());
        let err = sequencer
            .run_once(&mut game, &mut FixedDecision::new(7))
            .unwrap_err();
        assert!(matches!(err, SearchError::Collaborator(_)));
    }

    #[test]
    fn test_retry_step_runs_twice() {
        let shape = TreeShape {
            step_percent: 100,
            ..TreeShape::default()
        };
        let (mut game, mut sequencer) = SyntheticGame::start(shape);
        sequencer
            .run_once(&mut game, &mut FixedDecision::new(0))
            .unwrap();
        assert_eq!(sequencer.next_part(), Some(Part::Step));
        let mut runs = 0;
        while sequencer.next_part() == Some(Part::Step) {
            sequencer.run_once(&mut game, &mut UndeclaredChoice).unwrap();
            runs += 1;
        }
        assert!(runs == 1 || runs == 2);
        assert_eq!(game.steps(), 1);
    }

    #[test]
    fn test_algorithm_orientation() {
        let (mut game, mut sequencer) = SyntheticGame::start(TreeShape::default());
        play(&mut game, &mut sequencer, &[1]);
        let value = game.leaf_value();
        let max0 = SyntheticAlgorithm::new(0);
        let max1 = SyntheticAlgorithm::new(1);
        assert_eq!(max0.compute_heuristic(&game, true), value);
        assert_eq!(max0.compute_heuristic(&game, false), -value);
        assert_eq!(max1.compute_heuristic(&game, true), -value);
        assert!(max0.is_maximizing_player(0));
        assert!(!max1.is_maximizing_player(0));
    }
}
