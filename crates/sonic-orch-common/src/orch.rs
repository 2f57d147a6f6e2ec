//! Base Orch trait.

use sonic_sai::SaiResult;

use crate::bulk::ReconcileSummary;
use crate::consumer::KeyOpFieldsValues;

/// Base trait for all orchestration agents.
///
/// Each Orch owns the consumers of the tables it handles and takes part in
/// the daemon event loop. `C` is the shared context the daemon hands to every
/// orch (resource monitor, cross-orch name lookups).
///
/// # Lifecycle
///
/// 1. Construction: the Orch is created with its gateway handle
/// 2. Routing: the daemon forwards changes for every table `consumes` accepts
/// 3. Event Loop: `do_task()` is called while work is pending
/// 4. Timer: `on_timer()` runs on the daemon's periodic tick
///
/// Everything runs on the daemon's single control thread.
pub trait Orch<C: ?Sized> {
    /// Returns the name of this Orch (for logging and debugging).
    fn name(&self) -> &str;

    /// Returns true if this Orch handles the given table.
    fn consumes(&self, table: &str) -> bool;

    /// Queues changes for one of the tables this Orch consumes.
    fn add_to_sync(&mut self, table: &str, entries: Vec<KeyOpFieldsValues>);

    /// Processes pending tasks from all consumers.
    ///
    /// Only an unrecoverable driver error is returned; every per-entry
    /// outcome is resolved inside the Orch.
    fn do_task(&mut self, ctx: &mut C) -> SaiResult<ReconcileSummary>;

    /// Returns the priority of this Orch (lower = higher priority).
    ///
    /// Parents must be processed before their children, so the VNET orch
    /// runs before the ENI orch and so on.
    fn priority(&self) -> i32 {
        0
    }

    /// Returns true if this Orch has pending work.
    fn has_pending_tasks(&self) -> bool {
        false
    }

    /// Dumps pending tasks for debugging.
    fn dump_pending_tasks(&self) -> Vec<String> {
        vec![]
    }

    /// Called periodically by the daemon's timer.
    fn on_timer(&mut self, _ctx: &mut C) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::{Consumer, ConsumerConfig};

    struct TestOrch {
        consumer: Consumer,
        task_count: usize,
    }

    impl Orch<()> for TestOrch {
        fn name(&self) -> &str {
            "TestOrch"
        }

        fn consumes(&self, table: &str) -> bool {
            table == self.consumer.table_name()
        }

        fn add_to_sync(&mut self, _table: &str, entries: Vec<KeyOpFieldsValues>) {
            self.consumer.add_to_sync(entries);
        }

        fn do_task(&mut self, _ctx: &mut ()) -> SaiResult<ReconcileSummary> {
            self.task_count += 1;
            let done = self.consumer.drain().len();
            Ok(ReconcileSummary {
                done,
                ..ReconcileSummary::default()
            })
        }

        fn has_pending_tasks(&self) -> bool {
            self.consumer.has_pending()
        }
    }

    #[test]
    fn test_orch_trait() {
        let mut orch = TestOrch {
            consumer: Consumer::new(ConsumerConfig::new("TEST_TABLE")),
            task_count: 0,
        };

        assert_eq!(orch.name(), "TestOrch");
        assert!(orch.consumes("TEST_TABLE"));
        assert!(!orch.consumes("OTHER_TABLE"));
        assert_eq!(orch.priority(), 0);

        orch.add_to_sync("TEST_TABLE", vec![KeyOpFieldsValues::del("k")]);
        assert!(orch.has_pending_tasks());

        let summary = orch.do_task(&mut ()).unwrap();
        assert_eq!(summary.done, 1);
        assert_eq!(orch.task_count, 1);
        assert!(!orch.has_pending_tasks());
        assert!(orch.dump_pending_tasks().is_empty());
    }
}
