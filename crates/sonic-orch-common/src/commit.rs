//! Decision table turning a driver status into a commit decision.

use std::fmt;

use sonic_sai::SaiStatus;

/// Kind of hardware operation a status belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Create,
    Remove,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Create => f.write_str("create"),
            OperationKind::Remove => f.write_str("remove"),
        }
    }
}

/// What to do with a change entry after its requests were flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CommitDecision {
    /// The requested state holds: update the table and the resource counters.
    Commit,
    /// Transient failure: keep the entry queued, touch nothing.
    Retry,
    /// Permanent failure: consume the entry, touch nothing.
    Drop,
}

/// Maps one driver status onto a decision.
///
/// | Status | Decision |
/// |---|---|
/// | Success | Commit |
/// | ItemAlreadyExists on create | Commit |
/// | ItemNotFound on remove | Commit |
/// | table full, NotExecuted | Retry |
/// | anything else | Drop |
pub fn interpret(kind: OperationKind, status: SaiStatus) -> CommitDecision {
    match (kind, status) {
        (_, SaiStatus::Success) => CommitDecision::Commit,
        (OperationKind::Create, SaiStatus::ItemAlreadyExists) => CommitDecision::Commit,
        (OperationKind::Remove, SaiStatus::ItemNotFound) => CommitDecision::Commit,
        (_, s) if s.is_table_full() => CommitDecision::Retry,
        (_, SaiStatus::NotExecuted) => CommitDecision::Retry,
        _ => CommitDecision::Drop,
    }
}

/// Combines the statuses of an operation that fanned out into several
/// requests: any Drop wins, then any Retry, otherwise Commit.
///
/// An empty slice commits.
pub fn interpret_all<I>(kind: OperationKind, statuses: I) -> CommitDecision
where
    I: IntoIterator<Item = SaiStatus>,
{
    statuses
        .into_iter()
        .map(|status| interpret(kind, status))
        .fold(CommitDecision::Commit, |acc, d| match (acc, d) {
            (CommitDecision::Drop, _) | (_, CommitDecision::Drop) => CommitDecision::Drop,
            (CommitDecision::Retry, _) | (_, CommitDecision::Retry) => CommitDecision::Retry,
            _ => CommitDecision::Commit,
        })
}

/// Returns true if a committed status was an idempotent replay rather than
/// a real change in hardware.
pub fn is_idempotent_conflict(kind: OperationKind, status: SaiStatus) -> bool {
    matches!(
        (kind, status),
        (OperationKind::Create, SaiStatus::ItemAlreadyExists)
            | (OperationKind::Remove, SaiStatus::ItemNotFound)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_success_commits_both_kinds() {
        assert_eq!(interpret(OperationKind::Create, SaiStatus::Success), CommitDecision::Commit);
        assert_eq!(interpret(OperationKind::Remove, SaiStatus::Success), CommitDecision::Commit);
    }

    #[test]
    fn test_idempotent_conflicts_commit() {
        assert_eq!(
            interpret(OperationKind::Create, SaiStatus::ItemAlreadyExists),
            CommitDecision::Commit
        );
        assert_eq!(
            interpret(OperationKind::Remove, SaiStatus::ItemNotFound),
            CommitDecision::Commit
        );
        assert!(is_idempotent_conflict(OperationKind::Create, SaiStatus::ItemAlreadyExists));
        assert!(!is_idempotent_conflict(OperationKind::Create, SaiStatus::Success));
    }

    #[test]
    fn test_conflict_on_wrong_kind_drops() {
        assert_eq!(
            interpret(OperationKind::Remove, SaiStatus::ItemAlreadyExists),
            CommitDecision::Drop
        );
        assert_eq!(
            interpret(OperationKind::Create, SaiStatus::ItemNotFound),
            CommitDecision::Drop
        );
    }

    #[test]
    fn test_transient_statuses_retry() {
        for status in [
            SaiStatus::TableFull,
            SaiStatus::HwTableFull,
            SaiStatus::NifTableFull,
            SaiStatus::NotExecuted,
        ] {
            assert_eq!(interpret(OperationKind::Create, status), CommitDecision::Retry, "{}", status);
            assert_eq!(interpret(OperationKind::Remove, status), CommitDecision::Retry, "{}", status);
        }
    }

    #[test]
    fn test_other_failures_drop() {
        for status in [
            SaiStatus::Failure,
            SaiStatus::InvalidParameter,
            SaiStatus::ObjectInUse,
            SaiStatus::AttrNotSupported(3),
            SaiStatus::InsufficientResources,
            SaiStatus::NoMemory,
        ] {
            assert_eq!(interpret(OperationKind::Create, status), CommitDecision::Drop, "{}", status);
            assert_eq!(interpret(OperationKind::Remove, status), CommitDecision::Drop, "{}", status);
        }
    }

    #[test]
    fn test_interpret_all_precedence() {
        use SaiStatus::*;
        let kind = OperationKind::Create;

        assert_eq!(interpret_all(kind, []), CommitDecision::Commit);
        assert_eq!(interpret_all(kind, [Success, ItemAlreadyExists]), CommitDecision::Commit);
        assert_eq!(interpret_all(kind, [Success, TableFull]), CommitDecision::Retry);
        assert_eq!(interpret_all(kind, [TableFull, Failure, Success]), CommitDecision::Drop);
    }
}
