//! Stage-pass outcome of a single change entry.

/// What the stage pass decided for one change entry.
///
/// `C` is the per-table pending-operation context carried from the stage
/// pass to the commit pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome<C> {
    /// Requests were handed to the bulker; commit once the flush is done.
    Staged(C),
    /// A dependency is missing; keep the entry queued, nothing was touched.
    NotReady(String),
    /// Nothing to program (the state already holds); consume the entry.
    Done,
    /// The entry can never be applied; log and consume it.
    Invalid(String),
}

impl<C> StageOutcome<C> {
    /// Creates a not-ready outcome.
    pub fn waiting_for(dependency: impl Into<String>) -> Self {
        StageOutcome::NotReady(dependency.into())
    }

    /// Creates an invalid-entry outcome.
    pub fn invalid(message: impl Into<String>) -> Self {
        StageOutcome::Invalid(message.into())
    }

    /// Returns true if requests were staged.
    pub fn is_staged(&self) -> bool {
        matches!(self, StageOutcome::Staged(_))
    }

    /// Returns true if the entry stays queued.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StageOutcome::NotReady(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_classification() {
        let staged: StageOutcome<u32> = StageOutcome::Staged(1);
        assert!(staged.is_staged());
        assert!(!staged.is_retryable());

        let waiting: StageOutcome<u32> = StageOutcome::waiting_for("vnet Vnet1");
        assert!(waiting.is_retryable());
        assert_eq!(waiting, StageOutcome::NotReady("vnet Vnet1".to_string()));

        let invalid: StageOutcome<u32> = StageOutcome::invalid("bad vni");
        assert!(!invalid.is_staged());
        assert!(!invalid.is_retryable());
    }
}
