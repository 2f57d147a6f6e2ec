//! DASH VNET orchestration logic.

use std::sync::Arc;

use sonic_orch_common::{
    reconcile, Consumer, ConsumerConfig, KeyOpFieldsValues, Orch, ReconcileSummary,
};
use sonic_sai::{SaiResult, DEFAULT_MAX_BULK_SIZE};

use super::map_table::VnetMapTable;
use super::types::{DASH_VNET_MAPPING_TABLE, DASH_VNET_TABLE};
use super::vnet_table::VnetTable;
use crate::orch::OrchContext;

/// Run order of the DASH VNET orch in the daemon.
pub const VNET_ORCH_PRIORITY: i32 = 10;

/// Owns DASH_VNET_TABLE and DASH_VNET_MAPPING_TABLE.
///
/// VNETs are reconciled before mappings in every `do_task`, so a mapping
/// arriving together with its VNET is programmed in the same round.
#[derive(Debug)]
pub struct VnetOrch {
    vnet_consumer: Consumer,
    map_consumer: Consumer,
    vnets: VnetTable,
    mappings: VnetMapTable,
}

impl VnetOrch {
    pub fn new(batch_size: usize) -> Self {
        Self {
            vnet_consumer: Consumer::new(
                ConsumerConfig::new(DASH_VNET_TABLE)
                    .with_priority(VNET_ORCH_PRIORITY)
                    .with_batch_size(batch_size),
            ),
            map_consumer: Consumer::new(
                ConsumerConfig::new(DASH_VNET_MAPPING_TABLE)
                    .with_priority(VNET_ORCH_PRIORITY)
                    .with_batch_size(batch_size),
            ),
            vnets: VnetTable::new(DEFAULT_MAX_BULK_SIZE),
            mappings: VnetMapTable::new(DEFAULT_MAX_BULK_SIZE),
        }
    }

    pub fn vnets(&self) -> &VnetTable {
        &self.vnets
    }

    pub fn mappings(&self) -> &VnetMapTable {
        &self.mappings
    }
}

impl Orch<OrchContext> for VnetOrch {
    fn name(&self) -> &str {
        "DashVnetOrch"
    }

    fn consumes(&self, table: &str) -> bool {
        table == DASH_VNET_TABLE || table == DASH_VNET_MAPPING_TABLE
    }

    fn add_to_sync(&mut self, table: &str, entries: Vec<KeyOpFieldsValues>) {
        if table == DASH_VNET_TABLE {
            self.vnet_consumer.add_to_sync(entries);
        } else if table == DASH_VNET_MAPPING_TABLE {
            self.map_consumer.add_to_sync(entries);
        }
    }

    fn do_task(&mut self, ctx: &mut OrchContext) -> SaiResult<ReconcileSummary> {
        let gateway = Arc::clone(&ctx.gateway);
        let mut summary = reconcile(
            &mut self.vnet_consumer,
            &mut self.vnets,
            ctx,
            gateway.as_ref(),
        )?;
        summary.merge(&reconcile(
            &mut self.map_consumer,
            &mut self.mappings,
            ctx,
            gateway.as_ref(),
        )?);
        Ok(summary)
    }

    fn priority(&self) -> i32 {
        VNET_ORCH_PRIORITY
    }

    fn has_pending_tasks(&self) -> bool {
        self.vnet_consumer.has_pending() || self.map_consumer.has_pending()
    }

    fn dump_pending_tasks(&self) -> Vec<String> {
        let mut tasks = self.vnet_consumer.dump();
        tasks.extend(self.map_consumer.dump());
        tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crm::{
        CrmOrch, CrmOrchConfig, CrmResourceType, InMemoryCountersTable, MemoryEventSink,
    };
    use pretty_assertions::assert_eq;
    use sonic_sai::{SaiObjectType, SaiStatus, SimulatedSai};

    struct Harness {
        sai: Arc<SimulatedSai>,
        ctx: OrchContext,
        orch: VnetOrch,
    }

    fn harness() -> Harness {
        let sai = Arc::new(SimulatedSai::new());
        let crm = CrmOrch::new(
            CrmOrchConfig::default(),
            sai.clone(),
            Arc::new(InMemoryCountersTable::new()),
            Arc::new(MemoryEventSink::new()),
        );
        Harness {
            ctx: OrchContext::new(sai.clone(), crm),
            sai,
            orch: VnetOrch::new(128),
        }
    }

    fn fv(f: &str, v: &str) -> (String, String) {
        (f.to_string(), v.to_string())
    }

    fn vnet(name: &str, vni: &str) -> KeyOpFieldsValues {
        KeyOpFieldsValues::set(name, vec![fv("vni", vni)])
    }

    fn mapping(key: &str, underlay: &str) -> KeyOpFieldsValues {
        KeyOpFieldsValues::set(
            key,
            vec![
                fv("routing_type", "vnet_encap"),
                fv("underlay_ip", underlay),
                fv("mac_address", "f9:22:83:99:22:a2"),
            ],
        )
    }

    fn used(h: &Harness, resource: CrmResourceType) -> u32 {
        h.ctx.crm.global_used(resource).unwrap_or_default()
    }

    #[test]
    fn test_vnet_create_and_remove() {
        let mut h = harness();
        h.orch.add_to_sync(DASH_VNET_TABLE, vec![vnet("Vnet1", "45654")]);

        let summary = h.orch.do_task(&mut h.ctx).unwrap();
        assert_eq!(summary.committed, 1);
        assert!(h.ctx.vnet_oid("Vnet1").is_some());
        assert_eq!(used(&h, CrmResourceType::DashVnet), 1);
        assert_eq!(h.orch.vnets().get("Vnet1").map(|v| v.config.vni), Some(45654));

        // Replayed SET is a no-op
        h.orch.add_to_sync(DASH_VNET_TABLE, vec![vnet("Vnet1", "45654")]);
        let summary = h.orch.do_task(&mut h.ctx).unwrap();
        assert_eq!(summary.done, 1);
        assert_eq!(used(&h, CrmResourceType::DashVnet), 1);

        h.orch.add_to_sync(DASH_VNET_TABLE, vec![KeyOpFieldsValues::del("Vnet1")]);
        let summary = h.orch.do_task(&mut h.ctx).unwrap();
        assert_eq!(summary.committed, 1);
        assert!(h.ctx.vnet_oid("Vnet1").is_none());
        assert_eq!(used(&h, CrmResourceType::DashVnet), 0);
        assert_eq!(h.sai.object_count(SaiObjectType::Vnet), 0);
    }

    #[test]
    fn test_invalid_vnet_is_dropped() {
        let mut h = harness();
        h.orch.add_to_sync(DASH_VNET_TABLE, vec![vnet("Vnet1", "not-a-number")]);

        let summary = h.orch.do_task(&mut h.ctx).unwrap();
        assert_eq!(summary.dropped, 1);
        assert!(!h.orch.has_pending_tasks());
        assert_eq!(h.sai.bulk_calls(), 0);
    }

    #[test]
    fn test_mapping_waits_for_vnet() {
        let mut h = harness();
        h.orch.add_to_sync(
            DASH_VNET_MAPPING_TABLE,
            vec![mapping("Vnet1:10.0.0.1", "101.1.2.3")],
        );

        let summary = h.orch.do_task(&mut h.ctx).unwrap();
        assert_eq!(summary.not_ready, 1);
        assert!(h.orch.has_pending_tasks());
        assert!(h.orch.mappings().is_empty());

        h.orch.add_to_sync(DASH_VNET_TABLE, vec![vnet("Vnet1", "100")]);
        let summary = h.orch.do_task(&mut h.ctx).unwrap();
        assert_eq!(summary.committed, 2);
        assert!(!h.orch.has_pending_tasks());
        assert_eq!(used(&h, CrmResourceType::DashIpv4OutboundCaToPa), 1);
        assert_eq!(used(&h, CrmResourceType::DashIpv4PaValidation), 1);
    }

    #[test]
    fn test_pa_validation_is_shared() {
        let mut h = harness();
        h.orch.add_to_sync(DASH_VNET_TABLE, vec![vnet("Vnet1", "100")]);
        h.orch.do_task(&mut h.ctx).unwrap();

        h.orch.add_to_sync(
            DASH_VNET_MAPPING_TABLE,
            vec![
                mapping("Vnet1:10.0.0.1", "101.1.2.3"),
                mapping("Vnet1:10.0.0.2", "101.1.2.3"),
            ],
        );
        let summary = h.orch.do_task(&mut h.ctx).unwrap();
        assert_eq!(summary.committed, 2);
        assert_eq!(h.orch.mappings().pa_ref_count("Vnet1:101.1.2.3"), Some(2));
        assert_eq!(h.sai.object_count(SaiObjectType::PaValidationEntry), 1);
        assert_eq!(used(&h, CrmResourceType::DashIpv4PaValidation), 1);
        assert_eq!(used(&h, CrmResourceType::DashIpv4OutboundCaToPa), 2);

        // A third mapping joins the existing entry
        h.orch.add_to_sync(
            DASH_VNET_MAPPING_TABLE,
            vec![mapping("Vnet1:10.0.0.3", "101.1.2.3")],
        );
        h.orch.do_task(&mut h.ctx).unwrap();
        assert_eq!(h.orch.mappings().pa_ref_count("Vnet1:101.1.2.3"), Some(3));

        // Neither removal holds the last reference
        h.orch.add_to_sync(
            DASH_VNET_MAPPING_TABLE,
            vec![
                KeyOpFieldsValues::del("Vnet1:10.0.0.1"),
                KeyOpFieldsValues::del("Vnet1:10.0.0.2"),
            ],
        );
        h.orch.do_task(&mut h.ctx).unwrap();
        assert_eq!(h.orch.mappings().pa_ref_count("Vnet1:101.1.2.3"), Some(1));
        assert_eq!(h.sai.object_count(SaiObjectType::PaValidationEntry), 1);

        h.orch.add_to_sync(
            DASH_VNET_MAPPING_TABLE,
            vec![KeyOpFieldsValues::del("Vnet1:10.0.0.3")],
        );
        h.orch.do_task(&mut h.ctx).unwrap();
        assert_eq!(h.orch.mappings().pa_ref_count("Vnet1:101.1.2.3"), None);
        assert_eq!(h.sai.object_count(SaiObjectType::PaValidationEntry), 0);
        assert_eq!(used(&h, CrmResourceType::DashIpv4PaValidation), 0);
        assert_eq!(used(&h, CrmResourceType::DashIpv4OutboundCaToPa), 0);
        assert!(h.orch.mappings().is_empty());
    }

    #[test]
    fn test_last_release_and_new_acquire_in_one_pass() {
        let mut h = harness();
        h.orch.add_to_sync(DASH_VNET_TABLE, vec![vnet("Vnet1", "100")]);
        h.orch.add_to_sync(
            DASH_VNET_MAPPING_TABLE,
            vec![mapping("Vnet1:10.0.0.1", "101.1.2.3")],
        );
        h.orch.do_task(&mut h.ctx).unwrap();

        // The removal takes the PA entry down, so the new mapping waits
        h.orch.add_to_sync(
            DASH_VNET_MAPPING_TABLE,
            vec![
                KeyOpFieldsValues::del("Vnet1:10.0.0.1"),
                mapping("Vnet1:10.0.0.2", "101.1.2.3"),
            ],
        );
        let summary = h.orch.do_task(&mut h.ctx).unwrap();
        assert_eq!(summary.committed, 1);
        assert_eq!(summary.not_ready, 1);
        assert_eq!(h.orch.mappings().pa_ref_count("Vnet1:101.1.2.3"), None);

        let summary = h.orch.do_task(&mut h.ctx).unwrap();
        assert_eq!(summary.committed, 1);
        assert_eq!(h.orch.mappings().pa_ref_count("Vnet1:101.1.2.3"), Some(1));
        assert_eq!(used(&h, CrmResourceType::DashIpv4PaValidation), 1);
    }

    #[test]
    fn test_partial_mapping_retries_missing_half() {
        let mut h = harness();
        h.orch.add_to_sync(DASH_VNET_TABLE, vec![vnet("Vnet1", "100")]);
        h.orch.do_task(&mut h.ctx).unwrap();

        h.sai.push_status(SaiObjectType::PaValidationEntry, SaiStatus::TableFull);
        h.orch.add_to_sync(
            DASH_VNET_MAPPING_TABLE,
            vec![mapping("Vnet1:2001:db8::1", "2001:db8:ffff::1")],
        );
        let summary = h.orch.do_task(&mut h.ctx).unwrap();
        assert_eq!(summary.retried, 1);

        let partial = h.orch.mappings().get("Vnet1:2001:db8::1").unwrap();
        assert!(partial.ca_to_pa);
        assert!(!partial.pa_validation);
        assert_eq!(used(&h, CrmResourceType::DashIpv6OutboundCaToPa), 1);
        assert_eq!(used(&h, CrmResourceType::DashIpv6PaValidation), 0);

        let calls = h.sai.bulk_calls();
        let summary = h.orch.do_task(&mut h.ctx).unwrap();
        assert_eq!(summary.committed, 1);
        // Only the PA validation entry went to the driver
        assert_eq!(h.sai.bulk_calls(), calls + 1);
        assert!(h.orch.mappings().get("Vnet1:2001:db8::1").unwrap().is_complete());
        assert_eq!(used(&h, CrmResourceType::DashIpv6OutboundCaToPa), 1);
        assert_eq!(used(&h, CrmResourceType::DashIpv6PaValidation), 1);
    }

    #[test]
    fn test_mapping_drop_keeps_committed_half() {
        let mut h = harness();
        h.orch.add_to_sync(DASH_VNET_TABLE, vec![vnet("Vnet1", "100")]);
        h.orch.do_task(&mut h.ctx).unwrap();

        h.sai
            .push_status(SaiObjectType::OutboundCaToPaEntry, SaiStatus::InvalidParameter);
        h.orch.add_to_sync(
            DASH_VNET_MAPPING_TABLE,
            vec![mapping("Vnet1:10.0.0.1", "101.1.2.3")],
        );
        let summary = h.orch.do_task(&mut h.ctx).unwrap();
        assert_eq!(summary.dropped, 1);
        assert!(!h.orch.has_pending_tasks());
        assert_eq!(h.orch.mappings().pa_ref_count("Vnet1:101.1.2.3"), Some(1));

        // DEL cleans up the half that went in
        h.orch.add_to_sync(
            DASH_VNET_MAPPING_TABLE,
            vec![KeyOpFieldsValues::del("Vnet1:10.0.0.1")],
        );
        let summary = h.orch.do_task(&mut h.ctx).unwrap();
        assert_eq!(summary.committed, 1);
        assert!(h.orch.mappings().is_empty());
        assert_eq!(h.orch.mappings().pa_entry_count(), 0);
        assert_eq!(used(&h, CrmResourceType::DashIpv4PaValidation), 0);
        assert_eq!(used(&h, CrmResourceType::DashIpv4OutboundCaToPa), 0);
    }
}
