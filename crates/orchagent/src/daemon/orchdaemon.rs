//! OrchDaemon implementation.
//!
//! The OrchDaemon is the central coordinator for all Orch modules.
//! It manages:
//! - Orch registration and priority ordering
//! - Routing of table changes to the Orch that consumes them
//! - The event loop: change intake, heartbeat driven reconciliation and the
//!   CRM polling timer
//! - Escalation of fatal driver failures

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use sonic_orch_common::{KeyOpFieldsValues, Orch, ReconcileSummary};
use sonic_sai::SaiResult;
use tokio::sync::mpsc;
use tokio::time::{interval, interval_at, Instant, Interval, MissedTickBehavior};

use crate::orch::OrchContext;
use crate::sai_failure::handle_sai_failure;

/// Configuration for the OrchDaemon.
#[derive(Debug, Clone)]
pub struct OrchDaemonConfig {
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval_ms: u64,
    /// Batch size for consumer operations
    pub batch_size: usize,
    /// Abort the process when the driver channel is lost
    pub abort_on_sai_failure: bool,
}

impl Default for OrchDaemonConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: 1000,
            batch_size: 128,
            abort_on_sai_failure: true,
        }
    }
}

/// A batch of changes to one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableChange {
    pub table: String,
    pub entries: Vec<KeyOpFieldsValues>,
}

impl TableChange {
    pub fn new(table: impl Into<String>, entries: Vec<KeyOpFieldsValues>) -> Self {
        Self {
            table: table.into(),
            entries,
        }
    }
}

type OrchBox = Box<dyn Orch<OrchContext>>;

/// The main orchestration daemon.
///
/// OrchDaemon coordinates all Orch modules and runs the main event loop.
pub struct OrchDaemon {
    /// Configuration
    config: OrchDaemonConfig,
    /// Registered Orchs sorted by priority
    orchs: BTreeMap<i32, Vec<OrchBox>>,
    /// Shared context
    context: OrchContext,
    /// Running flag
    running: bool,
}

impl OrchDaemon {
    /// Creates a new OrchDaemon with the given configuration.
    pub fn new(config: OrchDaemonConfig, context: OrchContext) -> Self {
        Self {
            config,
            orchs: BTreeMap::new(),
            context,
            running: false,
        }
    }

    pub fn config(&self) -> &OrchDaemonConfig {
        &self.config
    }

    /// Registers an Orch with the daemon.
    ///
    /// Orchs are ordered by priority (lower = higher priority).
    pub fn register_orch(&mut self, orch: OrchBox) {
        let priority = orch.priority();
        info!("Registering {} with priority {}", orch.name(), priority);
        self.orchs.entry(priority).or_default().push(orch);
    }

    /// Returns the shared context.
    pub fn context(&self) -> &OrchContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut OrchContext {
        &mut self.context
    }

    /// Hands a batch of changes to every Orch consuming its table.
    ///
    /// Returns false if no Orch consumes the table.
    pub fn route_change(&mut self, change: TableChange) -> bool {
        let mut targets: Vec<&mut OrchBox> = self
            .orchs
            .values_mut()
            .flatten()
            .filter(|orch| orch.consumes(&change.table))
            .collect();

        let Some(last) = targets.pop() else {
            warn!(
                "No orch consumes {}, dropping {} entries",
                change.table,
                change.entries.len()
            );
            return false;
        };
        for orch in targets {
            orch.add_to_sync(&change.table, change.entries.clone());
        }
        debug!(
            "Routing {} entries of {} to {}",
            change.entries.len(),
            change.table,
            last.name()
        );
        last.add_to_sync(&change.table, change.entries);
        true
    }

    /// Runs one reconciliation pass over every Orch with pending work, in
    /// priority order.
    ///
    /// A fatal driver error is escalated and returned; other pass errors are
    /// logged and the affected batch waits for the next pass.
    pub fn process_once(&mut self) -> SaiResult<ReconcileSummary> {
        let mut summary = ReconcileSummary::default();
        for orchs in self.orchs.values_mut() {
            for orch in orchs.iter_mut() {
                if !orch.has_pending_tasks() {
                    continue;
                }
                debug!("Processing tasks for {}", orch.name());
                match orch.do_task(&mut self.context) {
                    Ok(pass) => summary.merge(&pass),
                    Err(e) if e.is_fatal() => {
                        let gateway = Arc::clone(&self.context.gateway);
                        handle_sai_failure(
                            gateway.as_ref(),
                            &e,
                            self.config.abort_on_sai_failure,
                        );
                        return Err(e);
                    }
                    Err(e) => warn!("{} pass failed: {}", orch.name(), e),
                }
            }
        }
        Ok(summary)
    }

    /// Repeats [`process_once`](Self::process_once) until no Orch has
    /// pending work, a pass makes no progress or `max_rounds` is reached.
    pub fn process_until_idle(&mut self, max_rounds: usize) -> SaiResult<ReconcileSummary> {
        let mut total = ReconcileSummary::default();
        for round in 0..max_rounds {
            if !self.has_pending_tasks() {
                break;
            }
            let pass = self.process_once()?;
            total.merge(&pass);
            if pass.consumed() == 0 {
                debug!(
                    "No progress in round {}, {} entries still pending",
                    round,
                    pass.requeued()
                );
                break;
            }
        }
        Ok(total)
    }

    /// Runs the CRM polling cycle and every Orch's timer hook.
    pub fn on_crm_timer(&mut self) {
        self.context.crm.on_timer();
        for orchs in self.orchs.values_mut() {
            for orch in orchs.iter_mut() {
                orch.on_timer(&mut self.context);
            }
        }
    }

    pub fn has_pending_tasks(&self) -> bool {
        self.orchs.values().flatten().any(|orch| orch.has_pending_tasks())
    }

    /// Entries waiting in all consumers.
    pub fn pending_count(&self) -> usize {
        self.orchs
            .values()
            .flatten()
            .map(|orch| orch.dump_pending_tasks().len())
            .sum()
    }

    /// Runs the main event loop.
    ///
    /// Changes arriving on `changes` are routed to their Orchs, the heartbeat
    /// drives reconciliation and the CRM timer follows the configured polling
    /// interval. Returns when `shutdown` resolves, when [`stop`](Self::stop)
    /// was called, or with the error of a fatal driver failure.
    pub async fn run<F>(&mut self, mut changes: mpsc::Receiver<TableChange>, shutdown: F) -> SaiResult<()>
    where
        F: Future<Output = ()>,
    {
        info!(
            "Starting OrchDaemon event loop with {} orch groups",
            self.orchs.len()
        );
        self.running = true;
        tokio::pin!(shutdown);

        let mut heartbeat = interval(Duration::from_millis(self.config.heartbeat_interval_ms.max(1)));
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut crm_period = self.crm_period();
        let mut crm_timer = crm_interval(crm_period);
        let mut open = true;

        while self.running {
            tokio::select! {
                change = changes.recv(), if open => match change {
                    Some(change) => {
                        self.route_change(change);
                    }
                    None => {
                        debug!("Change channel closed");
                        open = false;
                    }
                },
                _ = heartbeat.tick() => {
                    self.process_once()?;
                }
                _ = crm_timer.tick() => {
                    self.on_crm_timer();
                }
                _ = &mut shutdown => {
                    self.stop();
                }
            }

            let period = self.crm_period();
            if period != crm_period {
                info!("CRM polling interval changed to {:?}", period);
                crm_period = period;
                crm_timer = crm_interval(period);
            }
        }

        info!("OrchDaemon event loop stopped");
        Ok(())
    }

    /// Stops the event loop.
    pub fn stop(&mut self) {
        info!("Stopping OrchDaemon");
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Dumps state for debugging.
    pub fn dump(&self) -> Vec<String> {
        let mut lines = Vec::new();
        lines.push(format!("OrchDaemon running: {}", self.running));

        for (priority, orchs) in &self.orchs {
            for orch in orchs {
                lines.push(format!(
                    "  [{:3}] {} - {} pending",
                    priority,
                    orch.name(),
                    orch.dump_pending_tasks().len()
                ));
            }
        }

        lines
    }

    fn crm_period(&self) -> Duration {
        self.context.crm.polling_interval().max(Duration::from_millis(1))
    }
}

fn crm_interval(period: Duration) -> Interval {
    let mut timer = interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}

impl std::fmt::Debug for OrchDaemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchDaemon")
            .field("config", &self.config)
            .field("orch_groups", &self.orchs.len())
            .field("running", &self.running)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crm::{CrmOrch, CrmOrchConfig, InMemoryCountersTable, MemoryEventSink};
    use crate::dash_vnet::{VnetOrch, DASH_VNET_TABLE};
    use pretty_assertions::assert_eq;
    use sonic_sai::{SaiError, SaiObjectType, SimulatedSai};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct TestOrch {
        name: String,
        priority: i32,
        task_count: Arc<AtomicU32>,
        timer_count: Arc<AtomicU32>,
        pending: Vec<KeyOpFieldsValues>,
        fail: Option<SaiError>,
    }

    impl TestOrch {
        fn new(name: &str, priority: i32) -> Self {
            Self {
                name: name.to_string(),
                priority,
                task_count: Arc::new(AtomicU32::new(0)),
                timer_count: Arc::new(AtomicU32::new(0)),
                pending: Vec::new(),
                fail: None,
            }
        }

        fn failing(mut self, err: SaiError) -> Self {
            self.fail = Some(err);
            self
        }
    }

    impl Orch<OrchContext> for TestOrch {
        fn name(&self) -> &str {
            &self.name
        }

        fn consumes(&self, table: &str) -> bool {
            table == self.name
        }

        fn add_to_sync(&mut self, _table: &str, entries: Vec<KeyOpFieldsValues>) {
            self.pending.extend(entries);
        }

        fn do_task(&mut self, _ctx: &mut OrchContext) -> SaiResult<ReconcileSummary> {
            self.task_count.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = &self.fail {
                return Err(err.clone());
            }
            let committed = self.pending.len();
            self.pending.clear();
            Ok(ReconcileSummary {
                committed,
                ..ReconcileSummary::default()
            })
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn has_pending_tasks(&self) -> bool {
            !self.pending.is_empty()
        }

        fn dump_pending_tasks(&self) -> Vec<String> {
            self.pending.iter().map(|e| e.key.clone()).collect()
        }

        fn on_timer(&mut self, _ctx: &mut OrchContext) {
            self.timer_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn context(sai: Arc<SimulatedSai>) -> OrchContext {
        let crm = CrmOrch::new(
            CrmOrchConfig::with_polling_interval(Duration::from_millis(20)),
            sai.clone(),
            Arc::new(InMemoryCountersTable::new()),
            Arc::new(MemoryEventSink::new()),
        );
        OrchContext::new(sai, crm)
    }

    fn test_config() -> OrchDaemonConfig {
        OrchDaemonConfig {
            heartbeat_interval_ms: 5,
            batch_size: 128,
            abort_on_sai_failure: false,
        }
    }

    fn vnet(name: &str, vni: &str) -> KeyOpFieldsValues {
        KeyOpFieldsValues::set(name, vec![("vni".to_string(), vni.to_string())])
    }

    // ============================================================================
    // 1. Configuration Tests
    // ============================================================================

    #[tokio::test]
    async fn test_orchdaemon_default_config() {
        let config = OrchDaemonConfig::default();
        assert_eq!(config.heartbeat_interval_ms, 1000);
        assert_eq!(config.batch_size, 128);
        assert!(config.abort_on_sai_failure);
    }

    #[tokio::test]
    async fn test_orchdaemon_new_empty() {
        let daemon = OrchDaemon::new(test_config(), context(Arc::new(SimulatedSai::new())));
        assert_eq!(daemon.orchs.len(), 0);
        assert!(!daemon.is_running());
        assert!(!daemon.has_pending_tasks());
    }

    // ============================================================================
    // 2. Orch Registration Tests
    // ============================================================================

    #[tokio::test]
    async fn test_orchdaemon_register_different_priorities() {
        let mut daemon = OrchDaemon::new(test_config(), context(Arc::new(SimulatedSai::new())));

        daemon.register_orch(Box::new(TestOrch::new("RouteOrch", 30)));
        daemon.register_orch(Box::new(TestOrch::new("VnetOrch", 10)));
        daemon.register_orch(Box::new(TestOrch::new("EniOrch", 20)));
        daemon.register_orch(Box::new(TestOrch::new("OtherVnetOrch", 10)));

        assert_eq!(daemon.orchs.get(&10).map(|v| v.len()), Some(2));
        assert_eq!(daemon.orchs.len(), 3);

        let dump = daemon.dump();
        assert_eq!(dump[0], "OrchDaemon running: false");
        assert_eq!(dump[1], "  [ 10] VnetOrch - 0 pending");
        assert_eq!(dump[4], "  [ 30] RouteOrch - 0 pending");
    }

    // ============================================================================
    // 3. Change Routing Tests
    // ============================================================================

    #[tokio::test]
    async fn test_orchdaemon_route_change() {
        let mut daemon = OrchDaemon::new(test_config(), context(Arc::new(SimulatedSai::new())));
        daemon.register_orch(Box::new(TestOrch::new("T1", 0)));

        assert!(daemon.route_change(TableChange::new("T1", vec![KeyOpFieldsValues::del("k")])));
        assert!(daemon.has_pending_tasks());
        assert!(!daemon.route_change(TableChange::new("UNKNOWN", vec![KeyOpFieldsValues::del("k")])));

        let summary = daemon.process_once().unwrap();
        assert_eq!(summary.committed, 1);
        assert!(!daemon.has_pending_tasks());
    }

    #[tokio::test]
    async fn test_orchdaemon_process_until_idle() {
        let sai = Arc::new(SimulatedSai::new());
        let mut daemon = OrchDaemon::new(test_config(), context(sai.clone()));
        daemon.register_orch(Box::new(VnetOrch::new(128)));

        daemon.route_change(TableChange::new(DASH_VNET_TABLE, vec![vnet("Vnet1", "100")]));
        let summary = daemon.process_until_idle(8).unwrap();

        assert_eq!(summary.committed, 1);
        assert!(daemon.context().vnet_oid("Vnet1").is_some());
        assert_eq!(sai.object_count(SaiObjectType::Vnet), 1);
    }

    #[tokio::test]
    async fn test_orchdaemon_idle_stops_without_progress() {
        let mut daemon = OrchDaemon::new(test_config(), context(Arc::new(SimulatedSai::new())));
        daemon.register_orch(Box::new(VnetOrch::new(128)));

        // a mapping whose VNET never arrives stays pending
        daemon.route_change(TableChange::new(
            crate::dash_vnet::DASH_VNET_MAPPING_TABLE,
            vec![KeyOpFieldsValues::set(
                "Vnet9:10.0.0.1",
                vec![
                    ("routing_type".to_string(), "vnet_encap".to_string()),
                    ("underlay_ip".to_string(), "25.1.1.1".to_string()),
                    ("mac_address".to_string(), "00:00:00:00:00:01".to_string()),
                ],
            )],
        ));
        let summary = daemon.process_until_idle(100).unwrap();
        assert_eq!(summary.not_ready, 1);
        assert!(daemon.has_pending_tasks());
    }

    // ============================================================================
    // 4. Failure Tests
    // ============================================================================

    #[tokio::test]
    async fn test_orchdaemon_fatal_failure_dumps() {
        let sai = Arc::new(SimulatedSai::new());
        let mut daemon = OrchDaemon::new(test_config(), context(sai.clone()));
        let orch = TestOrch::new("T1", 0).failing(SaiError::channel_lost("gone"));
        let count = orch.task_count.clone();
        daemon.register_orch(Box::new(orch));
        daemon.register_orch(Box::new(TestOrch::new("T2", 5)));

        daemon.route_change(TableChange::new("T1", vec![KeyOpFieldsValues::del("a")]));
        daemon.route_change(TableChange::new("T2", vec![KeyOpFieldsValues::del("b")]));

        let err = daemon.process_once().unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(sai.dumps(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        // later orchs do not run after a fatal failure
        assert_eq!(daemon.dump()[2], "  [  5] T2 - 1 pending");
    }

    #[tokio::test]
    async fn test_orchdaemon_non_fatal_failure_continues() {
        let sai = Arc::new(SimulatedSai::new());
        let mut daemon = OrchDaemon::new(test_config(), context(sai.clone()));
        daemon.register_orch(Box::new(TestOrch::new("T1", 0).failing(SaiError::TableFull {
            table: "vnet".to_string(),
        })));
        daemon.register_orch(Box::new(TestOrch::new("T2", 5)));

        daemon.route_change(TableChange::new("T1", vec![KeyOpFieldsValues::del("a")]));
        daemon.route_change(TableChange::new("T2", vec![KeyOpFieldsValues::del("b")]));

        let summary = daemon.process_once().unwrap();
        assert_eq!(summary.committed, 1);
        assert_eq!(sai.dumps(), 0);
    }

    // ============================================================================
    // 5. Event Loop Tests
    // ============================================================================

    #[tokio::test]
    async fn test_orchdaemon_run_processes_changes() {
        let sai = Arc::new(SimulatedSai::new());
        let mut daemon = OrchDaemon::new(test_config(), context(sai.clone()));
        daemon.register_orch(Box::new(VnetOrch::new(128)));
        let timer = TestOrch::new("Timer", 50);
        let timer_count = timer.timer_count.clone();
        daemon.register_orch(Box::new(timer));

        let (tx, rx) = mpsc::channel(8);
        tx.send(TableChange::new(DASH_VNET_TABLE, vec![vnet("Vnet1", "100")]))
            .await
            .unwrap();
        drop(tx);

        daemon
            .run(rx, tokio::time::sleep(Duration::from_millis(200)))
            .await
            .unwrap();

        assert!(!daemon.is_running());
        assert!(daemon.context().vnet_oid("Vnet1").is_some());
        assert!(daemon.context().crm.stats().timer_expirations >= 1);
        assert!(timer_count.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_orchdaemon_run_returns_fatal_error() {
        let sai = Arc::new(SimulatedSai::new());
        let mut daemon = OrchDaemon::new(test_config(), context(sai.clone()));
        daemon.register_orch(Box::new(VnetOrch::new(128)));
        sai.set_channel_lost(true);

        let (tx, rx) = mpsc::channel(8);
        tx.send(TableChange::new(DASH_VNET_TABLE, vec![vnet("Vnet1", "100")]))
            .await
            .unwrap();

        let result = daemon
            .run(rx, tokio::time::sleep(Duration::from_secs(5)))
            .await;
        assert!(matches!(result, Err(SaiError::ChannelLost { .. })));
        assert_eq!(sai.dumps(), 1);
    }
}
