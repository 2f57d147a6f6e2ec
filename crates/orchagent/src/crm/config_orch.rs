//! Consumer of the CRM configuration table.

use log::{error, info};
use sonic_orch_common::{Consumer, ConsumerConfig, KeyOpFieldsValues, Orch, ReconcileSummary};
use sonic_sai::SaiResult;

use super::types::{CRM_CONFIG_KEY, CRM_CONFIG_TABLE};
use crate::orch::OrchContext;

/// Feeds `CRM|Config` changes into the shared [`CrmOrch`](super::CrmOrch).
///
/// Configuration never touches the driver, so entries are applied in place
/// and never requeued.
#[derive(Debug)]
pub struct CrmConfigOrch {
    consumer: Consumer,
}

impl CrmConfigOrch {
    pub fn new() -> Self {
        Self {
            consumer: Consumer::new(ConsumerConfig::new(CRM_CONFIG_TABLE)),
        }
    }

    fn apply(entry: &KeyOpFieldsValues, ctx: &mut OrchContext) -> bool {
        if entry.op.is_del() {
            error!("Unsupported operation DEL on {}|{}", CRM_CONFIG_TABLE, entry.key);
            return false;
        }
        if entry.key != CRM_CONFIG_KEY {
            error!("Unknown CRM config key {}", entry.key);
            return false;
        }
        match ctx.crm.handle_set_command(&entry.key, &entry.fvs) {
            Ok(()) => {
                info!("CRM config {} applied", entry.key);
                true
            }
            Err(e) => {
                error!("Failed to apply CRM config {}: {}", entry.key, e);
                false
            }
        }
    }
}

impl Default for CrmConfigOrch {
    fn default() -> Self {
        Self::new()
    }
}

impl Orch<OrchContext> for CrmConfigOrch {
    fn name(&self) -> &str {
        "CrmConfigOrch"
    }

    fn consumes(&self, table: &str) -> bool {
        table == CRM_CONFIG_TABLE
    }

    fn add_to_sync(&mut self, _table: &str, entries: Vec<KeyOpFieldsValues>) {
        self.consumer.add_to_sync(entries);
    }

    fn do_task(&mut self, ctx: &mut OrchContext) -> SaiResult<ReconcileSummary> {
        let mut summary = ReconcileSummary::default();
        for entry in self.consumer.drain() {
            if Self::apply(&entry, ctx) {
                summary.committed += 1;
            } else {
                summary.dropped += 1;
            }
        }
        Ok(summary)
    }

    fn has_pending_tasks(&self) -> bool {
        self.consumer.has_pending()
    }

    fn dump_pending_tasks(&self) -> Vec<String> {
        self.consumer.dump()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crm::{
        CrmOrch, CrmOrchConfig, CrmResourceType, CrmThresholdType, InMemoryCountersTable,
        MemoryEventSink,
    };
    use pretty_assertions::assert_eq;
    use sonic_sai::SimulatedSai;
    use std::sync::Arc;
    use std::time::Duration;

    fn context() -> OrchContext {
        let sai = Arc::new(SimulatedSai::new());
        let crm = CrmOrch::new(
            CrmOrchConfig::default(),
            sai.clone(),
            Arc::new(InMemoryCountersTable::new()),
            Arc::new(MemoryEventSink::new()),
        );
        OrchContext::new(sai, crm)
    }

    fn fv(f: &str, v: &str) -> (String, String) {
        (f.to_string(), v.to_string())
    }

    #[test]
    fn test_set_config() {
        let mut ctx = context();
        let mut orch = CrmConfigOrch::new();
        assert!(orch.consumes("CRM"));

        orch.add_to_sync(
            "CRM",
            vec![KeyOpFieldsValues::set(
                "Config",
                vec![
                    fv("polling_interval", "10"),
                    fv("dash_vnet_threshold_type", "used"),
                    fv("dash_vnet_low_threshold", "100"),
                    fv("dash_vnet_high_threshold", "200"),
                ],
            )],
        );
        let summary = orch.do_task(&mut ctx).unwrap();

        assert_eq!(summary.committed, 1);
        assert!(!orch.has_pending_tasks());
        assert_eq!(ctx.crm.polling_interval(), Duration::from_secs(10));
        let entry = ctx.crm.resource(CrmResourceType::DashVnet).unwrap();
        assert_eq!(entry.threshold_type, CrmThresholdType::Used);
        assert_eq!((entry.low_threshold, entry.high_threshold), (100, 200));
    }

    #[test]
    fn test_rejected_entries_are_consumed() {
        let mut ctx = context();
        let mut orch = CrmConfigOrch::new();

        orch.add_to_sync(
            "CRM",
            vec![
                KeyOpFieldsValues::set("Config", vec![fv("dash_eni_low_threshold", "95")]),
                KeyOpFieldsValues::set("Other", vec![fv("polling_interval", "10")]),
                KeyOpFieldsValues::del("Config2"),
            ],
        );
        let summary = orch.do_task(&mut ctx).unwrap();

        assert_eq!(summary.dropped, 3);
        assert!(!orch.has_pending_tasks());
        let entry = ctx.crm.resource(CrmResourceType::DashEni).unwrap();
        assert_eq!(entry.low_threshold, 70);
    }
}
