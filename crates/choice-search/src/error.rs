//! Error types for the search engine.
//!
//! Structural bugs in a tree walk (using a node before it is initialized,
//! ending the root) are assertion failures and never reach this type. Errors
//! here are the ones a caller can observe and react to: a rule engine that
//! asked for a decision nobody declared, a collaborator that failed, or a
//! worker thread that died while evaluating a work order.

use thiserror::Error;

/// Errors surfaced by a search.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    /// The simulation asked for a decision at a step that was not declared as
    /// a choice point.
    #[error("undeclared choice point reached for player {player}")]
    UndeclaredChoice { player: String },

    /// A rule engine call failed while the search was simulating the game.
    #[error("collaborator error: {0}")]
    Collaborator(String),

    /// A worker panicked while evaluating a work order.
    #[error("worker panicked: {0}")]
    WorkerPanicked(String),

    /// Work was dispatched to a pool whose workers have already exited.
    #[error("no worker available to evaluate the work order")]
    WorkerUnavailable,
}

/// Convenience alias for results produced by the search engine.
pub type Result<T> = std::result::Result<T, SearchError>;

impl SearchError {
    /// Builds a `WorkerPanicked` error from a payload returned by
    /// `std::panic::catch_unwind`.
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> SearchError {
        let message = if let Some(msg) = payload.downcast_ref::<&str>() {
            (*msg).to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "unknown panic payload".to_string()
        };
        SearchError::WorkerPanicked(message)
    }
}
