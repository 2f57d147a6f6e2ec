//! DASH ENI orchestration logic.

use std::sync::Arc;

use log::{error, info};
use sonic_orch_common::{
    interpret, reconcile, AuthoritativeTable, BulkTable, CommitDecision, Consumer,
    ConsumerConfig, KeyOpFieldsValues, OperationKind, Orch, ReconcileSummary, StageOutcome,
};
use sonic_sai::{
    BulkHandle, CreateRequest, EniOid, EntityBulker, SaiAttrValue, SaiAttribute, SaiGateway,
    SaiObjectKey, SaiObjectType, SaiResult, SaiStatus, VnetOid, DEFAULT_MAX_BULK_SIZE,
};

use super::types::{EniConfig, EniEntry, DASH_ENI_TABLE};
use crate::crm::CrmResourceType;
use crate::orch::OrchContext;

/// Run order of the DASH ENI orch in the daemon.
pub const ENI_ORCH_PRIORITY: i32 = 20;

/// Staged ENI operation.
#[derive(Debug)]
pub enum EniOp {
    Create {
        handle: BulkHandle,
        vnet_oid: VnetOid,
        config: EniConfig,
    },
    Remove {
        handle: BulkHandle,
    },
}

/// Programmed ENIs.
#[derive(Debug)]
pub struct EniTable {
    bulker: EntityBulker,
    enis: AuthoritativeTable<EniEntry>,
}

impl EniTable {
    pub fn new(max_bulk_size: usize) -> Self {
        Self {
            bulker: EntityBulker::new(SaiObjectType::Eni, max_bulk_size),
            enis: AuthoritativeTable::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&EniEntry> {
        self.enis.get(name)
    }

    pub fn len(&self) -> usize {
        self.enis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.enis.is_empty()
    }

    fn attributes(vnet_oid: VnetOid, config: &EniConfig) -> Vec<SaiAttribute> {
        let mut attrs = vec![
            SaiAttribute::new("SAI_ENI_ATTR_VNET_ID", SaiAttrValue::Oid(vnet_oid.as_raw())),
            SaiAttribute::new(
                "SAI_ENI_ATTR_UNDERLAY_IP",
                SaiAttrValue::IpAddr(config.underlay_ip),
            ),
            SaiAttribute::new("SAI_ENI_ATTR_ADMIN_STATE", SaiAttrValue::Bool(config.admin_state)),
        ];
        if let Some(vm_vni) = config.vm_vni {
            attrs.push(SaiAttribute::new("SAI_ENI_ATTR_VM_VNI", SaiAttrValue::U32(vm_vni)));
        }
        attrs
    }
}

impl BulkTable for EniTable {
    type Context = EniOp;
    type Env = OrchContext;

    fn table_name(&self) -> &str {
        DASH_ENI_TABLE
    }

    fn stage(&mut self, entry: &KeyOpFieldsValues, ctx: &OrchContext) -> StageOutcome<EniOp> {
        if entry.op.is_del() {
            let Some(eni) = self.enis.get(&entry.key) else {
                return StageOutcome::Done;
            };
            let handle = self.bulker.stage_remove(SaiObjectKey::Oid(eni.eni_oid.as_raw()));
            return StageOutcome::Staged(EniOp::Remove { handle });
        }

        if self.enis.contains(&entry.key) {
            return StageOutcome::Done;
        }
        let config = match EniConfig::from_entry(entry) {
            Ok(config) => config,
            Err(e) => return StageOutcome::invalid(e),
        };
        let Some(vnet_oid) = ctx.vnet_oid(&config.vnet) else {
            return StageOutcome::waiting_for(format!("VNET {}", config.vnet));
        };
        let handle = self
            .bulker
            .stage_create(CreateRequest::object(Self::attributes(vnet_oid, &config)));
        StageOutcome::Staged(EniOp::Create {
            handle,
            vnet_oid,
            config,
        })
    }

    fn flush(&mut self, gateway: &dyn SaiGateway) -> SaiResult<()> {
        self.bulker.flush(gateway)
    }

    fn commit(
        &mut self,
        entry: &KeyOpFieldsValues,
        op: EniOp,
        ctx: &mut OrchContext,
    ) -> CommitDecision {
        match op {
            EniOp::Create {
                handle,
                vnet_oid,
                config,
            } => {
                let status = self.bulker.status(handle).unwrap_or(SaiStatus::NotExecuted);
                let decision = interpret(OperationKind::Create, status);
                if decision != CommitDecision::Commit {
                    return decision;
                }
                // ENI IDs are driver-allocated; already-exists returns none to adopt.
                let Some(eni_oid) = self.bulker.object_id(handle).and_then(EniOid::from_raw)
                else {
                    error!("ENI {} created with status {} but no object ID", entry.key, status);
                    return CommitDecision::Drop;
                };
                info!("ENI {} created as {} in VNET {}", entry.key, eni_oid, config.vnet);
                self.enis.insert(
                    entry.key.clone(),
                    EniEntry {
                        eni_oid,
                        vnet_oid,
                        config,
                    },
                );
                ctx.eni_ids.insert(entry.key.clone(), eni_oid);
                ctx.crm_increment(CrmResourceType::DashEni);
                decision
            }
            EniOp::Remove { handle } => {
                let status = self.bulker.status(handle).unwrap_or(SaiStatus::NotExecuted);
                let decision = interpret(OperationKind::Remove, status);
                if decision == CommitDecision::Commit {
                    self.enis.remove(&entry.key);
                    ctx.eni_ids.remove(&entry.key);
                    ctx.crm_decrement(CrmResourceType::DashEni);
                    info!("ENI {} removed", entry.key);
                }
                decision
            }
        }
    }

    fn end_pass(&mut self) {
        self.bulker.clear();
    }
}

/// Owns DASH_ENI_TABLE.
#[derive(Debug)]
pub struct EniOrch {
    consumer: Consumer,
    table: EniTable,
}

impl EniOrch {
    pub fn new(batch_size: usize) -> Self {
        Self {
            consumer: Consumer::new(
                ConsumerConfig::new(DASH_ENI_TABLE)
                    .with_priority(ENI_ORCH_PRIORITY)
                    .with_batch_size(batch_size),
            ),
            table: EniTable::new(DEFAULT_MAX_BULK_SIZE),
        }
    }

    pub fn enis(&self) -> &EniTable {
        &self.table
    }
}

impl Orch<OrchContext> for EniOrch {
    fn name(&self) -> &str {
        "DashEniOrch"
    }

    fn consumes(&self, table: &str) -> bool {
        table == DASH_ENI_TABLE
    }

    fn add_to_sync(&mut self, _table: &str, entries: Vec<KeyOpFieldsValues>) {
        self.consumer.add_to_sync(entries);
    }

    fn do_task(&mut self, ctx: &mut OrchContext) -> SaiResult<ReconcileSummary> {
        let gateway = Arc::clone(&ctx.gateway);
        reconcile(&mut self.consumer, &mut self.table, ctx, gateway.as_ref())
    }

    fn priority(&self) -> i32 {
        ENI_ORCH_PRIORITY
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
    use crate::crm::{CrmOrch, CrmOrchConfig, InMemoryCountersTable, MemoryEventSink};
    use pretty_assertions::assert_eq;
    use sonic_sai::SimulatedSai;

    fn context(sai: Arc<SimulatedSai>) -> OrchContext {
        let crm = CrmOrch::new(
            CrmOrchConfig::default(),
            sai.clone(),
            Arc::new(InMemoryCountersTable::new()),
            Arc::new(MemoryEventSink::new()),
        );
        OrchContext::new(sai, crm)
    }

    fn eni(name: &str, vnet: &str) -> KeyOpFieldsValues {
        KeyOpFieldsValues::set(
            name,
            vec![
                ("vnet".to_string(), vnet.to_string()),
                ("mac_address".to_string(), "00:11:22:33:44:55".to_string()),
                ("underlay_ip".to_string(), "25.1.1.1".to_string()),
            ],
        )
    }

    #[test]
    fn test_eni_waits_for_vnet() {
        let sai = Arc::new(SimulatedSai::new());
        let mut ctx = context(sai.clone());
        let mut orch = EniOrch::new(128);
        orch.add_to_sync(DASH_ENI_TABLE, vec![eni("eni0", "Vnet1")]);

        let summary = orch.do_task(&mut ctx).unwrap();
        assert_eq!(summary.not_ready, 1);
        assert!(orch.has_pending_tasks());
        assert_eq!(sai.bulk_calls(), 0);

        ctx.vnet_ids
            .insert("Vnet1".to_string(), VnetOid::from_raw(0x7a01).unwrap());
        let summary = orch.do_task(&mut ctx).unwrap();
        assert_eq!(summary.committed, 1);
        assert!(ctx.eni_oid("eni0").is_some());
        assert_eq!(ctx.crm.global_used(CrmResourceType::DashEni), Some(1));
        assert_eq!(
            orch.enis().get("eni0").map(|e| e.vnet_oid.as_raw()),
            Some(0x7a01)
        );
    }

    #[test]
    fn test_eni_table_full_retries() {
        let sai = Arc::new(SimulatedSai::new());
        sai.set_capacity(SaiObjectType::Eni, 1);
        let mut ctx = context(sai.clone());
        ctx.vnet_ids
            .insert("Vnet1".to_string(), VnetOid::from_raw(0x7a01).unwrap());
        let mut orch = EniOrch::new(128);

        orch.add_to_sync(DASH_ENI_TABLE, vec![eni("eni0", "Vnet1"), eni("eni1", "Vnet1")]);
        let summary = orch.do_task(&mut ctx).unwrap();
        assert_eq!(summary.committed, 1);
        assert_eq!(summary.retried, 1);
        assert!(ctx.eni_oid("eni1").is_none());

        orch.add_to_sync(DASH_ENI_TABLE, vec![KeyOpFieldsValues::del("eni0")]);
        let summary = orch.do_task(&mut ctx).unwrap();
        // eni1 is back in front of the queue and fits once eni0 is gone
        assert_eq!(summary.committed, 2);
        assert!(ctx.eni_oid("eni0").is_none());
        assert!(ctx.eni_oid("eni1").is_some());
        assert_eq!(ctx.crm.global_used(CrmResourceType::DashEni), Some(1));
    }
}
