//! The two-pass reconciliation loop.
//!
//! A batch popped from a [`Consumer`] is processed as:
//!
//! 1. stage pass: every entry, in order, is turned into bulk requests by the
//!    table (or left queued when a dependency is missing);
//! 2. one flush of the table's bulkers;
//! 3. commit pass: every staged entry, in the same order, reads its results
//!    and the table decides Commit, Retry or Drop.
//!
//! Entries that are not ready or must be retried go back to the front of the
//! consumer untouched.

use log::{debug, error, warn};
use sonic_sai::{SaiGateway, SaiResult};

use crate::commit::CommitDecision;
use crate::consumer::{Consumer, KeyOpFieldsValues};
use crate::task::StageOutcome;

/// A table programmed through bulk staging.
pub trait BulkTable {
    /// Pending-operation context carried from stage to commit.
    type Context;
    /// Shared state the table reads while staging and writes on commit.
    type Env: ?Sized;

    fn table_name(&self) -> &str;

    /// Builds the requests for one entry.
    ///
    /// Must not mutate anything observable outside the table's bulkers and
    /// its per-pass bookkeeping; `NotReady` and `Invalid` entries leave no
    /// trace.
    fn stage(&mut self, entry: &KeyOpFieldsValues, env: &Self::Env) -> StageOutcome<Self::Context>;

    /// Executes everything staged in this pass.
    fn flush(&mut self, gateway: &dyn SaiGateway) -> SaiResult<()>;

    /// Interprets the results of one staged entry and applies them.
    fn commit(
        &mut self,
        entry: &KeyOpFieldsValues,
        ctx: Self::Context,
        env: &mut Self::Env,
    ) -> CommitDecision;

    /// Forgets all per-pass state (bulker slots, pending bookkeeping).
    fn end_pass(&mut self);
}

/// Counters of one reconciliation pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub staged: usize,
    pub committed: usize,
    pub retried: usize,
    pub not_ready: usize,
    pub dropped: usize,
    pub done: usize,
}

impl ReconcileSummary {
    /// Entries that left the queue.
    pub fn consumed(&self) -> usize {
        self.committed + self.dropped + self.done
    }

    /// Entries that went back to the queue.
    pub fn requeued(&self) -> usize {
        self.retried + self.not_ready
    }

    pub fn merge(&mut self, other: &ReconcileSummary) {
        self.staged += other.staged;
        self.committed += other.committed;
        self.retried += other.retried;
        self.not_ready += other.not_ready;
        self.dropped += other.dropped;
        self.done += other.done;
    }
}

/// Runs one stage/flush/commit pass over the next batch of `consumer`.
///
/// A flush error puts the whole batch back in the consumer untouched and is
/// returned to the caller.
pub fn reconcile<T>(
    consumer: &mut Consumer,
    table: &mut T,
    env: &mut T::Env,
    gateway: &dyn SaiGateway,
) -> SaiResult<ReconcileSummary>
where
    T: BulkTable + ?Sized,
{
    let mut summary = ReconcileSummary::default();
    let batch = consumer.pop_batch();
    if batch.is_empty() {
        return Ok(summary);
    }

    let mut requeue: Vec<(usize, KeyOpFieldsValues)> = Vec::new();
    let mut staged: Vec<(usize, KeyOpFieldsValues, T::Context)> = Vec::new();

    for (pos, entry) in batch.into_iter().enumerate() {
        match table.stage(&entry, env) {
            StageOutcome::Staged(ctx) => {
                summary.staged += 1;
                staged.push((pos, entry, ctx));
            }
            StageOutcome::NotReady(reason) => {
                debug!("{}|{}: not ready, {}", table.table_name(), entry.key, reason);
                summary.not_ready += 1;
                requeue.push((pos, entry));
            }
            StageOutcome::Done => {
                debug!("{}|{}: nothing to do", table.table_name(), entry.key);
                summary.done += 1;
            }
            StageOutcome::Invalid(reason) => {
                error!("{}|{}: invalid entry, {}", table.table_name(), entry.key, reason);
                summary.dropped += 1;
            }
        }
    }

    if !staged.is_empty() {
        if let Err(e) = table.flush(gateway) {
            error!("{}: flush failed, {}", table.table_name(), e);
            table.end_pass();
            requeue.extend(staged.into_iter().map(|(pos, entry, _)| (pos, entry)));
            requeue.sort_by_key(|(pos, _)| *pos);
            consumer.requeue(requeue.into_iter().map(|(_, entry)| entry).collect());
            return Err(e);
        }
    }

    for (pos, entry, ctx) in staged {
        match table.commit(&entry, ctx, env) {
            CommitDecision::Commit => summary.committed += 1,
            CommitDecision::Retry => {
                warn!("{}|{}: {} will be retried", table.table_name(), entry.key, entry.op.as_str());
                summary.retried += 1;
                requeue.push((pos, entry));
            }
            CommitDecision::Drop => {
                error!("{}|{}: {} dropped", table.table_name(), entry.key, entry.op.as_str());
                summary.dropped += 1;
            }
        }
    }
    table.end_pass();

    requeue.sort_by_key(|(pos, _)| *pos);
    consumer.requeue(requeue.into_iter().map(|(_, entry)| entry).collect());
    Ok(summary)
}
