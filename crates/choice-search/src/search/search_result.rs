use crate::types::Score;

/// Where the answer of an [`AiResult`] came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResultSource {
    /// Aggregated from the searched work orders.
    Searched,
    /// The decision offered a single candidate; nothing was searched.
    SingleCandidate,
    /// No work order produced a value.
    Default,
    /// Cancellation cut the search short. The answer is the partial verdict
    /// when one was reached, otherwise the default answer.
    Cancelled,
}

/// Outcome of one AI decision.
#[derive(Clone, Debug, PartialEq)]
pub struct AiResult<A> {
    pub answer: A,
    /// Predicted value from the maximizing player's point of view.
    pub score: Option<Score>,
    /// Leaf evaluations over all work orders.
    pub evaluations: u64,
    pub trace: Option<String>,
    pub source: ResultSource,
}

impl<A> AiResult<A> {
    pub fn searched(answer: A, score: Score, evaluations: u64, trace: Option<String>) -> Self {
        AiResult {
            answer,
            score: Some(score),
            evaluations,
            trace,
            source: ResultSource::Searched,
        }
    }

    pub fn single_candidate(answer: A) -> Self {
        Self::unscored(answer, ResultSource::SingleCandidate)
    }

    pub fn fallback(answer: A, source: ResultSource) -> Self {
        Self::unscored(answer, source)
    }

    fn unscored(answer: A, source: ResultSource) -> Self {
        AiResult {
            answer,
            score: None,
            evaluations: 0,
            trace: None,
            source,
        }
    }

    pub fn was_searched(&self) -> bool {
        self.source == ResultSource::Searched
    }
}
