//! DASH_VNET_MAPPING_TABLE programming.
//!
//! A mapping fans out into two hardware objects:
//!
//! - an outbound CA-to-PA entry, owned by the mapping alone;
//! - a PA validation entry, shared by every mapping of the VNET that points
//!   at the same underlay address and kept alive by a refcount.
//!
//! Each half is committed on its own. A mapping whose CA-to-PA entry went in
//! while its PA validation was rejected stays in the table with one flag
//! set, and the next SET (or DEL) only stages the missing (or remaining)
//! half.

use std::collections::HashMap;

use log::{debug, info, warn};
use sonic_orch_common::{
    interpret, interpret_all, AuthoritativeTable, BulkTable, CommitDecision, KeyOpFieldsValues,
    OperationKind, StageOutcome,
};
use sonic_sai::{
    AddrFamily, BulkHandle, CreateRequest, EntityBulker, SaiAttrValue, SaiAttribute,
    SaiGateway, SaiObjectKey, SaiObjectType, SaiResult, SaiStatus,
};

use super::types::{
    ca_to_pa_entry_key, pa_validation_entry_key, PaValidationEntry, VnetMapConfig,
    VnetMapEntry, VnetMapKey, DASH_VNET_MAPPING_TABLE,
};
use crate::crm::CrmResourceType;
use crate::orch::OrchContext;

/// What a mapping does to its shared PA validation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PaAction {
    /// Takes a reference, creating the hardware entry if it is the first.
    Acquire,
    /// Drops a reference that is not the last.
    Release,
    /// Drops the last reference and removes the hardware entry.
    Remove,
}

/// Changes to one PA validation entry staged in the current pass.
#[derive(Debug, Default)]
struct PaPass {
    creating: Option<BulkHandle>,
    removing: bool,
    acquired: u32,
    released: u32,
}

/// Staged mapping operation.
#[derive(Debug)]
pub struct MapOp {
    kind: OperationKind,
    entry: VnetMapEntry,
    ca_to_pa: Option<BulkHandle>,
    pa_validation: Option<(PaAction, BulkHandle)>,
}

/// Programmed VNET mappings and the PA validation entries they share.
#[derive(Debug)]
pub struct VnetMapTable {
    ca_to_pa_bulker: EntityBulker,
    pa_bulker: EntityBulker,
    mappings: AuthoritativeTable<VnetMapEntry>,
    pa_entries: AuthoritativeTable<PaValidationEntry>,
    pass: HashMap<String, PaPass>,
}

impl VnetMapTable {
    pub fn new(max_bulk_size: usize) -> Self {
        Self {
            ca_to_pa_bulker: EntityBulker::new(SaiObjectType::OutboundCaToPaEntry, max_bulk_size),
            pa_bulker: EntityBulker::new(SaiObjectType::PaValidationEntry, max_bulk_size),
            mappings: AuthoritativeTable::new(),
            pa_entries: AuthoritativeTable::new(),
            pass: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&VnetMapEntry> {
        self.mappings.get(key)
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// References held on the PA validation entry `<vnet>:<underlay-ip>`.
    pub fn pa_ref_count(&self, pa_key: &str) -> Option<u32> {
        self.pa_entries.ref_count(pa_key)
    }

    pub fn pa_entry_count(&self) -> usize {
        self.pa_entries.len()
    }

    fn stage_set(
        &mut self,
        entry: &KeyOpFieldsValues,
        ctx: &OrchContext,
    ) -> StageOutcome<MapOp> {
        let key: VnetMapKey = match entry.key.parse() {
            Ok(key) => key,
            Err(e) => return StageOutcome::invalid(e),
        };

        let mapping = match self.mappings.get(&entry.key) {
            Some(existing) if existing.is_complete() => return StageOutcome::Done,
            Some(existing) => {
                debug!("{}: resuming partially programmed mapping", entry.key);
                existing.clone()
            }
            None => {
                let config = match VnetMapConfig::from_entry(entry) {
                    Ok(config) => config,
                    Err(e) => return StageOutcome::invalid(e),
                };
                let Some(dst_vnet_id) = ctx.vnet_oid(&key.vnet) else {
                    return StageOutcome::waiting_for(format!("VNET {}", key.vnet));
                };
                VnetMapEntry {
                    dst_vnet_id,
                    overlay_ip: key.overlay_ip,
                    config,
                    ca_to_pa: false,
                    pa_validation: false,
                }
            }
        };

        let pa = mapping.pa_key(&key.vnet);
        if !mapping.pa_validation && self.pass.get(&pa).is_some_and(|p| p.removing) {
            return StageOutcome::waiting_for(format!("PA validation {} removal", pa));
        }

        let ca_to_pa = (!mapping.ca_to_pa).then(|| {
            self.ca_to_pa_bulker.stage_create(CreateRequest::entry(
                ca_to_pa_entry_key(mapping.dst_vnet_id, &mapping.overlay_ip),
                vec![
                    SaiAttribute::new(
                        "SAI_OUTBOUND_CA_TO_PA_ENTRY_ATTR_UNDERLAY_DIP",
                        SaiAttrValue::IpAddr(mapping.config.underlay_ip),
                    ),
                    SaiAttribute::new(
                        "SAI_OUTBOUND_CA_TO_PA_ENTRY_ATTR_OVERLAY_DMAC",
                        SaiAttrValue::Mac(mapping.config.mac_address),
                    ),
                    SaiAttribute::new(
                        "SAI_OUTBOUND_CA_TO_PA_ENTRY_ATTR_USE_DST_VNET_VNI",
                        SaiAttrValue::Bool(mapping.config.use_dst_vni),
                    ),
                ],
            ))
        });

        let pa_validation = if mapping.pa_validation {
            None
        } else {
            Some((PaAction::Acquire, self.stage_acquire(&pa, &mapping)))
        };

        StageOutcome::Staged(MapOp {
            kind: OperationKind::Create,
            entry: mapping,
            ca_to_pa,
            pa_validation,
        })
    }

    /// Shares an existing or in-flight PA validation entry, or stages it.
    fn stage_acquire(&mut self, pa: &str, mapping: &VnetMapEntry) -> BulkHandle {
        let exists = self.pa_entries.contains(pa);
        let pass = self.pass.entry(pa.to_string()).or_default();
        pass.acquired += 1;

        if exists {
            return self.pa_bulker.resolved(SaiStatus::Success);
        }
        if let Some(handle) = pass.creating {
            return handle;
        }
        let handle = self.pa_bulker.stage_create(CreateRequest::entry(
            pa_validation_entry_key(mapping.dst_vnet_id, &mapping.config.underlay_ip),
            Vec::new(),
        ));
        pass.creating = Some(handle);
        handle
    }

    fn stage_del(&mut self, entry: &KeyOpFieldsValues) -> StageOutcome<MapOp> {
        let Some(mapping) = self.mappings.get(&entry.key).cloned() else {
            return StageOutcome::Done;
        };
        let Some((vnet, _)) = entry.key.split_once(':') else {
            return StageOutcome::invalid("invalid VNET mapping key");
        };

        let ca_to_pa = mapping.ca_to_pa.then(|| {
            self.ca_to_pa_bulker.stage_remove(SaiObjectKey::Entry(ca_to_pa_entry_key(
                mapping.dst_vnet_id,
                &mapping.overlay_ip,
            )))
        });

        let pa_validation = if mapping.pa_validation {
            Some(self.stage_release(&mapping.pa_key(vnet), &mapping))
        } else {
            None
        };

        StageOutcome::Staged(MapOp {
            kind: OperationKind::Remove,
            entry: mapping,
            ca_to_pa,
            pa_validation,
        })
    }

    /// Releases one reference, removing the hardware entry with the last one.
    fn stage_release(&mut self, pa: &str, mapping: &VnetMapEntry) -> (PaAction, BulkHandle) {
        let held = self.pa_entries.ref_count(pa).unwrap_or(0);
        let pass = self.pass.entry(pa.to_string()).or_default();
        let remaining = (held + pass.acquired).saturating_sub(pass.released);
        pass.released += 1;

        if remaining > 1 {
            return (PaAction::Release, self.pa_bulker.resolved(SaiStatus::Success));
        }
        pass.removing = true;
        let handle = self.pa_bulker.stage_remove(SaiObjectKey::Entry(pa_validation_entry_key(
            mapping.dst_vnet_id,
            &mapping.config.underlay_ip,
        )));
        (PaAction::Remove, handle)
    }

    fn commit_ca_to_pa(
        &mut self,
        kind: OperationKind,
        status: SaiStatus,
        mapping: &mut VnetMapEntry,
        ctx: &mut OrchContext,
    ) {
        if interpret(kind, status) != CommitDecision::Commit {
            return;
        }
        let resource = CrmResourceType::outbound_ca_to_pa(AddrFamily::of(&mapping.overlay_ip));
        match kind {
            OperationKind::Create => {
                mapping.ca_to_pa = true;
                ctx.crm_increment(resource);
            }
            OperationKind::Remove => {
                mapping.ca_to_pa = false;
                ctx.crm_decrement(resource);
            }
        }
    }

    fn commit_pa_validation(
        &mut self,
        pa: &str,
        action: PaAction,
        status: SaiStatus,
        mapping: &mut VnetMapEntry,
        ctx: &mut OrchContext,
    ) {
        let kind = match action {
            PaAction::Acquire => OperationKind::Create,
            PaAction::Release | PaAction::Remove => OperationKind::Remove,
        };
        if interpret(kind, status) != CommitDecision::Commit {
            return;
        }
        let resource = CrmResourceType::pa_validation(AddrFamily::of(&mapping.config.underlay_ip));

        match action {
            PaAction::Acquire => {
                mapping.pa_validation = true;
                if self.pa_entries.increment_ref(pa).is_err() {
                    self.pa_entries.insert(
                        pa,
                        PaValidationEntry {
                            vnet_id: mapping.dst_vnet_id,
                            underlay_ip: mapping.config.underlay_ip,
                            ref_count: 1,
                        },
                    );
                    ctx.crm_increment(resource);
                    info!("PA validation {} created", pa);
                }
            }
            PaAction::Release => {
                mapping.pa_validation = false;
                if let Err(e) = self.pa_entries.decrement_ref(pa) {
                    warn!("PA validation {} release: {}", pa, e);
                }
            }
            PaAction::Remove => {
                mapping.pa_validation = false;
                if self.pa_entries.remove(pa).is_some() {
                    ctx.crm_decrement(resource);
                    info!("PA validation {} removed", pa);
                }
            }
        }
    }
}

impl BulkTable for VnetMapTable {
    type Context = MapOp;
    type Env = OrchContext;

    fn table_name(&self) -> &str {
        DASH_VNET_MAPPING_TABLE
    }

    fn stage(&mut self, entry: &KeyOpFieldsValues, ctx: &OrchContext) -> StageOutcome<MapOp> {
        if entry.op.is_set() {
            self.stage_set(entry, ctx)
        } else {
            self.stage_del(entry)
        }
    }

    fn flush(&mut self, gateway: &dyn SaiGateway) -> SaiResult<()> {
        self.ca_to_pa_bulker.flush(gateway)?;
        self.pa_bulker.flush(gateway)
    }

    fn commit(
        &mut self,
        entry: &KeyOpFieldsValues,
        op: MapOp,
        ctx: &mut OrchContext,
    ) -> CommitDecision {
        let MapOp {
            kind,
            entry: mut mapping,
            ca_to_pa,
            pa_validation,
        } = op;
        let mut statuses = Vec::with_capacity(2);

        if let Some(handle) = ca_to_pa {
            let status = self
                .ca_to_pa_bulker
                .status(handle)
                .unwrap_or(SaiStatus::NotExecuted);
            statuses.push(status);
            self.commit_ca_to_pa(kind, status, &mut mapping, ctx);
        }

        if let Some((action, handle)) = pa_validation {
            let status = self.pa_bulker.status(handle).unwrap_or(SaiStatus::NotExecuted);
            statuses.push(status);
            let vnet = entry.key.split_once(':').map_or("", |(vnet, _)| vnet);
            let pa = mapping.pa_key(vnet);
            self.commit_pa_validation(&pa, action, status, &mut mapping, ctx);
        }

        if mapping.is_empty() {
            if self.mappings.remove(&entry.key).is_some() {
                info!("VNET mapping {} removed", entry.key);
            }
        } else {
            if mapping.is_complete() && kind == OperationKind::Create {
                info!("VNET mapping {} created", entry.key);
            }
            self.mappings.insert(entry.key.clone(), mapping);
        }

        interpret_all(kind, statuses)
    }

    fn end_pass(&mut self) {
        self.ca_to_pa_bulker.clear();
        self.pa_bulker.clear();
        self.pass.clear();
    }
}
