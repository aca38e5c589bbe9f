//! Contracts the rule engine implements so the search can simulate a game.
//!
//! The search never looks inside a game. It only needs to:
//! - step a cloneable *sequencer* through the pending work of a turn,
//! - recognise when that work is a decision ([`Part::Choice`]),
//! - wrap every hypothetical branch in a transaction that is rolled back,
//! - hash the game together with the pending sequencer state.

use std::fmt::Debug;
use std::hash::{Hash, Hasher};

use crate::error::{Result, SearchError};

/// Game state the search simulates on.
///
/// Each worker thread owns its own replica obtained through [`Game::replicate`];
/// replicas never share mutable state with the authoritative game.
pub trait Game: Clone + Send + 'static {
    /// Identifies a side in the game.
    type Player: Copy + Eq + Debug + Send + Sync + 'static;
    /// A pending decision.
    type Choice: Choice<Player = Self::Player, Answer = Self::Answer>;
    /// A candidate answer to a decision.
    type Answer: Clone + PartialEq + Debug + Send + Sync + 'static;
    /// The simulated run that advances this game.
    type Sequencer: Sequencer<Self>;

    /// Opens a transaction. Every change made until the matching
    /// [`Game::end_transaction`] belongs to it.
    fn begin_transaction(&mut self);

    /// Closes the innermost transaction, undoing all of its changes when
    /// `rollback` is true. After a rollback the game must be state-equal to
    /// what it was when the transaction began.
    fn end_transaction(&mut self, rollback: bool);

    /// One-shot replication handshake: produces a fully independent copy of
    /// this game for a worker thread.
    fn replicate(&self) -> Self {
        self.clone()
    }

    /// Feeds the game state into `hasher`.
    fn hash_state(&self, hasher: &mut StateHasher);
}

/// A decision point: a place where one player picks among legal continuations.
pub trait Choice: Clone + Debug + Send + Sync + 'static {
    type Player;
    type Answer;
    /// Classification used to look up the enumerator for this choice.
    type Kind: Copy + Eq + Hash + Debug + Send + Sync + 'static;

    /// The player that has to answer.
    fn player(&self) -> Self::Player;

    /// Answer used when the search cannot produce a verdict.
    fn default_answer(&self) -> Self::Answer;

    fn kind(&self) -> Self::Kind;
}

/// Outcome of a single [`Sequencer::run_once`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunResult {
    /// The unit ran; keep going.
    Continue,
    /// The run is over (the game ended).
    Stop,
    /// The unit asked to be run again.
    Retry,
}

/// Boundary marker of the underlying simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    Begin,
    Commit,
    Rollback,
}

/// The next unit of work of a simulated run.
#[derive(Clone, Debug, PartialEq)]
pub enum Part<C> {
    /// A decision point.
    Choice(C),
    /// A transaction boundary of the underlying simulation.
    Transaction(TransactionKind),
    /// Any other step.
    Step,
}

/// A simulated run over a game: the queue of pending units of work.
pub trait Sequencer<G: Game>: Clone + Send + Sync + 'static {
    /// `true` when no work remains.
    fn is_empty(&self) -> bool;

    /// Peeks at the next unit of work.
    fn next_part(&self) -> Option<Part<G::Choice>>;

    /// Drops the next unit of work without running it.
    ///
    /// The search never skips work: it runs every part it meets. This is for
    /// rule engines that drive the sequencer outside a search.
    fn skip(&mut self);

    /// Runs the next unit of work. Decisions are requested from `decisions`.
    fn run_once(&mut self, game: &mut G, decisions: &mut dyn DecisionMaker<G>)
    -> Result<RunResult>;

    /// Feeds the pending run state into `hasher`.
    fn compute_hash(&self, hasher: &mut StateHasher);
}

/// Supplies answers when a sequencer runs a decision point.
pub trait DecisionMaker<G: Game> {
    fn decide(&mut self, game: &G, choice: &G::Choice) -> Result<G::Answer>;
}

/// Decision maker that always gives the same, already chosen answer.
pub struct FixedDecision<A> {
    answer: A,
}

impl<A> FixedDecision<A> {
    pub fn new(answer: A) -> Self {
        FixedDecision { answer }
    }
}

impl<G: Game> DecisionMaker<G> for FixedDecision<G::Answer> {
    fn decide(&mut self, _game: &G, _choice: &G::Choice) -> Result<G::Answer> {
        Ok(self.answer.clone())
    }
}

/// Sentinel decision maker for steps that are not declared choice points.
///
/// Being asked at all means the rule engine hid a decision from the search.
pub struct UndeclaredChoice;

impl<G: Game> DecisionMaker<G> for UndeclaredChoice {
    fn decide(&mut self, _game: &G, choice: &G::Choice) -> Result<G::Answer> {
        Err(SearchError::UndeclaredChoice {
            player: format!("{:?}", choice.player()),
        })
    }
}

/// Hasher used to key the transposition table.
///
/// Collects the written bytes and digests them with rapidhash on `finish`, so
/// equal byte streams always give equal keys.
#[derive(Clone, Debug, Default)]
pub struct StateHasher {
    bytes: Vec<u8>,
}

impl StateHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds the 64-bit digest into the 32-bit key the table stores.
    #[inline]
    pub fn finish_u32(&self) -> u32 {
        let hash = self.finish();
        (hash ^ (hash >> 32)) as u32
    }
}

impl Hasher for StateHasher {
    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    #[inline]
    fn finish(&self) -> u64 {
        use rapidhash::v3;
        v3::rapidhash_v3_nano_inline::<true, false>(&self.bytes, &v3::DEFAULT_RAPID_SECRETS)
    }
}

/// Computes the transposition key of `game` with `sequencer` pending on it.
pub fn state_key<G: Game>(game: &G, sequencer: &G::Sequencer) -> u32 {
    let mut hasher = StateHasher::new();
    game.hash_state(&mut hasher);
    sequencer.compute_hash(&mut hasher);
    hasher.finish_u32()
}
