//! Common orchestration abstractions for SONiC.
//!
//! This crate provides the reconciliation machinery shared by every
//! object-programming orch:
//!
//! - [`Consumer`]: per-table change queue that collapses each key to its
//!   latest operation
//! - [`AuthoritativeTable`]: what is currently programmed, keyed by change key
//! - [`interpret`]: the status decision table ([`CommitDecision`])
//! - [`BulkTable`] and [`reconcile`]: the stage / flush / commit pass
//! - [`Orch`]: base trait for orchestration agents
//!
//! # Architecture
//!
//! 1. Desired-state changes arrive per table and are queued in Consumers
//! 2. The OrchDaemon event loop calls `do_task()` on every Orch with work
//! 3. An Orch runs [`reconcile`] per table: requests are staged into SAI
//!    bulkers, flushed once, and each result is committed, retried or dropped
//! 4. Commits update the AuthoritativeTable and the resource monitor
//!
//! # Example
//!
//! ```ignore
//! use sonic_orch_common::{reconcile, Consumer, Orch, ReconcileSummary};
//!
//! impl Orch<OrchContext> for VnetOrch {
//!     fn name(&self) -> &str { "VnetOrch" }
//!
//!     fn do_task(&mut self, ctx: &mut OrchContext) -> SaiResult<ReconcileSummary> {
//!         reconcile(&mut self.consumer, &mut self.table, ctx, self.gateway.as_ref())
//!     }
//! }
//! ```

mod bulk;
mod commit;
mod consumer;
mod orch;
mod table;
mod task;

pub use bulk::{reconcile, BulkTable, ReconcileSummary};
pub use commit::{interpret, interpret_all, is_idempotent_conflict, CommitDecision, OperationKind};
pub use consumer::{Consumer, ConsumerConfig, FieldValue, KeyOpFieldsValues, Operation};
pub use orch::Orch;
pub use table::{AuthoritativeTable, HasRefCount, TableError};
pub use task::StageOutcome;
