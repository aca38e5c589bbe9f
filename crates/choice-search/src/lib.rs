//! Decision search for turn-based games driven by a step-wise rule engine.
//!
//! Given a pending decision and its candidate answers, a
//! [`MinMaxPartitioner`] searches every candidate in parallel with
//! alpha-beta minimax (optionally negamax with a transposition table) and
//! returns the answer that is best for the deciding side.

pub mod algorithm;
pub mod error;
pub mod game;
pub mod search;
pub mod synthetic;
pub mod transposition_table;
pub mod types;

pub use algorithm::{
    ChoiceEnumerator, ChoiceEnumeratorProvider, DepthLimited, EnumeratorRegistry, MinimaxAlgorithm,
};
pub use error::{Result, SearchError};
pub use game::{
    Choice, DecisionMaker, FixedDecision, Game, Part, RunResult, Sequencer, StateHasher,
    TransactionKind, UndeclaredChoice, state_key,
};
pub use search::{
    AiResult, CancellationToken, DriverKind, MinMaxPartitioner, ResultSource, Scoring,
    SearchConfig, SearchTree,
};
pub use types::{SCORE_MAX, SCORE_MIN, Score};
