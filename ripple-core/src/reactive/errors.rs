//! Errors reported at the write site.

/// Error type for rejected cell writes.
///
/// Both variants are returned synchronously from the write that tripped
/// them. The written value may already be committed when
/// [`TooManyUntrackedUpdates`](Self::TooManyUntrackedUpdates) is returned;
/// its notification pass is not scheduled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReactiveError {
    /// A cell was written from inside one of its own subscribers
    #[error("loop detected: a cell was written while one of its own subscribers was running; use untrack() to break the loop")]
    Loop,

    /// Too many untracked writes landed on one cell
    #[error("possible loop detected: more than {limit} untracked updates to one cell within {window_ms} ms; use batch() or raise the limit")]
    TooManyUntrackedUpdates {
        /// Configured limit
        limit: u32,
        /// Configured window length
        window_ms: u64,
    },
}

pub type Result<T> = std::result::Result<T, ReactiveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_remedy() {
        assert!(ReactiveError::Loop.to_string().contains("untrack()"));

        let err = ReactiveError::TooManyUntrackedUpdates {
            limit: 10,
            window_ms: 1000,
        };
        let message = err.to_string();
        assert!(message.contains("more than 10"));
        assert!(message.contains("1000 ms"));
        assert!(message.contains("batch()"));
    }
}
