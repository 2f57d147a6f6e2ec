//! DASH_VNET_TABLE programming.

use log::{error, info};
use sonic_orch_common::{
    interpret, AuthoritativeTable, BulkTable, CommitDecision, KeyOpFieldsValues, OperationKind,
    StageOutcome,
};
use sonic_sai::{
    BulkHandle, CreateRequest, EntityBulker, SaiAttrValue, SaiAttribute, SaiGateway,
    SaiObjectKey, SaiObjectType, SaiResult, SaiStatus, VnetOid,
};

use super::types::{VnetConfig, VnetEntry, DASH_VNET_TABLE};
use crate::crm::CrmResourceType;
use crate::orch::OrchContext;

/// Staged VNET operation.
#[derive(Debug)]
pub enum VnetOp {
    Create { handle: BulkHandle, config: VnetConfig },
    Remove { handle: BulkHandle },
}

/// Programmed VNETs.
#[derive(Debug)]
pub struct VnetTable {
    bulker: EntityBulker,
    vnets: AuthoritativeTable<VnetEntry>,
}

impl VnetTable {
    pub fn new(max_bulk_size: usize) -> Self {
        Self {
            bulker: EntityBulker::new(SaiObjectType::Vnet, max_bulk_size),
            vnets: AuthoritativeTable::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&VnetEntry> {
        self.vnets.get(name)
    }

    pub fn len(&self) -> usize {
        self.vnets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vnets.is_empty()
    }

    fn commit_create(
        &mut self,
        name: &str,
        handle: BulkHandle,
        config: VnetConfig,
        ctx: &mut OrchContext,
    ) -> CommitDecision {
        let status = self.bulker.status(handle).unwrap_or(SaiStatus::NotExecuted);
        let decision = interpret(OperationKind::Create, status);
        if decision != CommitDecision::Commit {
            return decision;
        }

        // An already-exists answer for a driver-allocated object carries no
        // object ID, so there is nothing to adopt.
        let Some(vnet_oid) = self.bulker.object_id(handle).and_then(VnetOid::from_raw) else {
            error!("VNET {} created with status {} but no object ID", name, status);
            return CommitDecision::Drop;
        };

        info!("VNET {} created as {} (vni {})", name, vnet_oid, config.vni);
        self.vnets.insert(name, VnetEntry { vnet_oid, config });
        ctx.vnet_ids.insert(name.to_string(), vnet_oid);
        ctx.crm_increment(CrmResourceType::DashVnet);
        decision
    }

    fn commit_remove(
        &mut self,
        name: &str,
        handle: BulkHandle,
        ctx: &mut OrchContext,
    ) -> CommitDecision {
        let status = self.bulker.status(handle).unwrap_or(SaiStatus::NotExecuted);
        let decision = interpret(OperationKind::Remove, status);
        if decision == CommitDecision::Commit {
            self.vnets.remove(name);
            ctx.vnet_ids.remove(name);
            ctx.crm_decrement(CrmResourceType::DashVnet);
            info!("VNET {} removed", name);
        }
        decision
    }
}

impl BulkTable for VnetTable {
    type Context = VnetOp;
    type Env = OrchContext;

    fn table_name(&self) -> &str {
        DASH_VNET_TABLE
    }

    fn stage(&mut self, entry: &KeyOpFieldsValues, _ctx: &OrchContext) -> StageOutcome<VnetOp> {
        if entry.op.is_set() {
            if self.vnets.contains(&entry.key) {
                return StageOutcome::Done;
            }
            let config = match VnetConfig::from_entry(entry) {
                Ok(config) => config,
                Err(e) => return StageOutcome::invalid(e),
            };
            let handle = self.bulker.stage_create(CreateRequest::object(vec![SaiAttribute::new(
                "SAI_VNET_ATTR_VNI",
                SaiAttrValue::U32(config.vni),
            )]));
            StageOutcome::Staged(VnetOp::Create { handle, config })
        } else {
            let Some(vnet) = self.vnets.get(&entry.key) else {
                return StageOutcome::Done;
            };
            let handle = self
                .bulker
                .stage_remove(SaiObjectKey::Oid(vnet.vnet_oid.as_raw()));
            StageOutcome::Staged(VnetOp::Remove { handle })
        }
    }

    fn flush(&mut self, gateway: &dyn SaiGateway) -> SaiResult<()> {
        self.bulker.flush(gateway)
    }

    fn commit(
        &mut self,
        entry: &KeyOpFieldsValues,
        op: VnetOp,
        ctx: &mut OrchContext,
    ) -> CommitDecision {
        match op {
            VnetOp::Create { handle, config } => self.commit_create(&entry.key, handle, config, ctx),
            VnetOp::Remove { handle } => self.commit_remove(&entry.key, handle, ctx),
        }
    }

    fn end_pass(&mut self) {
        self.bulker.clear();
    }
}
