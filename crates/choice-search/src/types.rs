//! Common type aliases used throughout the engine.

/// Heuristic score, always expressed from the maximizing player's point of view
/// unless a function says otherwise.
pub type Score = f32;

/// Ply distance from the root of a search tree.
pub type Depth = usize;

/// Sentinel for "worse than anything" from a maximizer's point of view.
///
/// Sentinels are only ever compared, assigned or negated, never combined
/// arithmetically with real scores.
pub const SCORE_MIN: Score = f32::MIN;

/// Sentinel for "better than anything" from a maximizer's point of view.
pub const SCORE_MAX: Score = f32::MAX;

/// Upper bound on the number of worker threads in a dispatch pool.
pub const MAX_THREADS: usize = 64;

/// Returns `true` if `score` is a usable heuristic value, i.e. a finite number
/// strictly between the two sentinels.
#[inline]
pub fn is_valid_score(score: Score) -> bool {
    score > SCORE_MIN && score < SCORE_MAX
}
