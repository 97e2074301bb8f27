//! Bounded spin-waits on hardware status.

/// Raised when a predicate never held within its poll budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimedOut {
    /// Number of times the predicate was evaluated.
    pub polls: u32,
}

/// Spins until `predicate` returns `true`, evaluating it at most
/// `poll_limit` times.
///
/// Returns the number of polls it took.
pub fn until<F>(poll_limit: u32, mut predicate: F) -> Result<u32, TimedOut>
where
    F: FnMut() -> bool,
{
    let mut polls = 0;
    while polls < poll_limit {
        polls += 1;
        if predicate() {
            return Ok(polls);
        }
        core::hint::spin_loop();
    }
    Err(TimedOut { polls })
}
