//! Offline replay of recorded table changes.
//!
//! A replay file is a JSON array of [`TableChange`] objects, applied in
//! order as if they had arrived on the change channel.

use std::fs;
use std::path::Path;

use log::info;
use sonic_orch_common::ReconcileSummary;
use sonic_sai::SaiResult;
use thiserror::Error;

use super::{OrchDaemon, TableChange};

/// Passes run after each replayed change before moving on.
pub const MAX_REPLAY_ROUNDS: usize = 64;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("failed to read replay file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed replay file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Loads the changes recorded in `path`.
pub fn read_replay(path: &Path) -> Result<Vec<TableChange>, ReplayError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

impl OrchDaemon {
    /// Applies `changes` in order, reconciling after each one, then runs one
    /// CRM polling cycle so counters reflect the final state.
    pub fn replay(&mut self, changes: Vec<TableChange>) -> SaiResult<ReconcileSummary> {
        let mut total = ReconcileSummary::default();
        let count = changes.len();
        for change in changes {
            self.route_change(change);
            let pass = self.process_until_idle(MAX_REPLAY_ROUNDS)?;
            total.merge(&pass);
        }
        self.on_crm_timer();
        info!(
            "Replayed {} changes: {} committed, {} dropped, {} still pending",
            count,
            total.committed,
            total.dropped,
            self.pending_count()
        );
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_read_replay() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"table":"DASH_VNET_TABLE","entries":[{{"key":"Vnet1","op":"SET","fvs":[["vni","100"]]}}]}}]"#
        )
        .unwrap();

        let changes = read_replay(file.path()).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].table, "DASH_VNET_TABLE");
        assert_eq!(changes[0].entries[0].get_field("vni"), Some("100"));
    }

    #[test]
    fn test_read_replay_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(read_replay(file.path()), Err(ReplayError::Json(_))));

        let missing = file.path().with_extension("missing");
        assert!(matches!(read_replay(&missing), Err(ReplayError::Io(_))));
    }
}
