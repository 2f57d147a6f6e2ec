//! Per-object-type bulk staging.
//!
//! An [`EntityBulker`] collects create and remove requests for one SAI object
//! type during a reconciliation pass and executes them in as few driver calls
//! as possible. Every staged request owns one result slot; `flush` resolves
//! each slot exactly once.

use log::{debug, warn};

use crate::error::{SaiResult, SaiStatus};
use crate::gateway::{CreateRequest, SaiGateway};
use crate::types::{RawSaiObjectId, SaiObjectKey, SaiObjectType};

/// Default number of requests sent per driver call.
pub const DEFAULT_MAX_BULK_SIZE: usize = 1000;

/// Handle to one result slot of an [`EntityBulker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BulkHandle(usize);

#[derive(Debug)]
enum SlotOp {
    Create(CreateRequest),
    Remove(SaiObjectKey),
    Resolved,
}

#[derive(Debug)]
struct Slot {
    op: SlotOp,
    status: Option<SaiStatus>,
    object_id: Option<RawSaiObjectId>,
}

/// Bulk stager for a single object type.
#[derive(Debug)]
pub struct EntityBulker {
    object_type: SaiObjectType,
    max_bulk_size: usize,
    slots: Vec<Slot>,
}

impl EntityBulker {
    pub fn new(object_type: SaiObjectType, max_bulk_size: usize) -> Self {
        Self {
            object_type,
            max_bulk_size: max_bulk_size.max(1),
            slots: Vec::new(),
        }
    }

    pub fn object_type(&self) -> SaiObjectType {
        self.object_type
    }

    /// Stages a create request.
    pub fn stage_create(&mut self, request: CreateRequest) -> BulkHandle {
        self.push(SlotOp::Create(request), None)
    }

    /// Stages a remove request.
    pub fn stage_remove(&mut self, key: SaiObjectKey) -> BulkHandle {
        self.push(SlotOp::Remove(key), None)
    }

    /// Adds a slot that is already resolved and never reaches the driver.
    ///
    /// Used when a logical operation maps onto a shared hardware object that
    /// already exists (or must stay) and only bookkeeping changes.
    pub fn resolved(&mut self, status: SaiStatus) -> BulkHandle {
        self.push(SlotOp::Resolved, Some(status))
    }

    fn push(&mut self, op: SlotOp, status: Option<SaiStatus>) -> BulkHandle {
        self.slots.push(Slot {
            op,
            status,
            object_id: None,
        });
        BulkHandle(self.slots.len() - 1)
    }

    /// Number of slots still waiting for the driver.
    pub fn pending(&self) -> usize {
        self.slots.iter().filter(|s| s.status.is_none()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Status of a slot, `None` until it has been flushed.
    pub fn status(&self, handle: BulkHandle) -> Option<SaiStatus> {
        self.slots.get(handle.0).and_then(|s| s.status)
    }

    /// OID returned for a successful create.
    pub fn object_id(&self, handle: BulkHandle) -> Option<RawSaiObjectId> {
        self.slots.get(handle.0).and_then(|s| s.object_id)
    }

    /// Drops all slots. Handles from before the call are invalid afterwards.
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Executes every unresolved slot: removes first, then creates.
    ///
    /// Slots the driver did not answer are resolved as `NotExecuted`. A
    /// driver error (channel loss) is returned as is and leaves the
    /// remaining slots unresolved.
    pub fn flush(&mut self, gateway: &dyn SaiGateway) -> SaiResult<()> {
        self.flush_removes(gateway)?;
        self.flush_creates(gateway)
    }

    fn flush_removes(&mut self, gateway: &dyn SaiGateway) -> SaiResult<()> {
        let indices: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.status.is_none() && matches!(s.op, SlotOp::Remove(_)))
            .map(|(i, _)| i)
            .collect();

        for chunk in indices.chunks(self.max_bulk_size) {
            let keys: Vec<SaiObjectKey> = chunk
                .iter()
                .filter_map(|&i| match &self.slots[i].op {
                    SlotOp::Remove(key) => Some(key.clone()),
                    _ => None,
                })
                .collect();

            debug!("bulk remove {} x{}", self.object_type, keys.len());
            let statuses = gateway.bulk_remove(self.object_type, &keys)?;
            if statuses.len() < chunk.len() {
                warn!(
                    "bulk remove {} answered {}/{} requests",
                    self.object_type,
                    statuses.len(),
                    chunk.len()
                );
            }

            for (pos, &i) in chunk.iter().enumerate() {
                self.slots[i].status = Some(
                    statuses
                        .get(pos)
                        .copied()
                        .unwrap_or(SaiStatus::NotExecuted),
                );
            }
        }
        Ok(())
    }

    fn flush_creates(&mut self, gateway: &dyn SaiGateway) -> SaiResult<()> {
        let indices: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.status.is_none() && matches!(s.op, SlotOp::Create(_)))
            .map(|(i, _)| i)
            .collect();

        for chunk in indices.chunks(self.max_bulk_size) {
            let requests: Vec<CreateRequest> = chunk
                .iter()
                .filter_map(|&i| match &self.slots[i].op {
                    SlotOp::Create(req) => Some(req.clone()),
                    _ => None,
                })
                .collect();

            debug!("bulk create {} x{}", self.object_type, requests.len());
            let results = gateway.bulk_create(self.object_type, &requests)?;
            if results.len() < chunk.len() {
                warn!(
                    "bulk create {} answered {}/{} requests",
                    self.object_type,
                    results.len(),
                    chunk.len()
                );
            }

            for (pos, &i) in chunk.iter().enumerate() {
                let slot = &mut self.slots[i];
                match results.get(pos) {
                    Some(result) => {
                        slot.status = Some(result.status);
                        slot.object_id = result.object_id;
                    }
                    None => slot.status = Some(SaiStatus::NotExecuted),
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedSai;
    use pretty_assertions::assert_eq;

    fn create(entry: &str) -> CreateRequest {
        CreateRequest::entry(entry, Vec::new())
    }

    #[test]
    fn test_flush_resolves_every_slot() {
        let sai = SimulatedSai::new();
        let mut bulker = EntityBulker::new(SaiObjectType::OutboundRoutingEntry, 2);

        let handles: Vec<BulkHandle> = (0..5)
            .map(|i| bulker.stage_create(create(&format!("eni0:10.0.{}.0/24", i))))
            .collect();
        assert_eq!(bulker.pending(), 5);
        assert!(handles.iter().all(|h| bulker.status(*h).is_none()));

        bulker.flush(&sai).unwrap();

        assert_eq!(bulker.pending(), 0);
        for h in &handles {
            assert_eq!(bulker.status(*h), Some(SaiStatus::Success));
        }
        // 5 requests, chunks of 2
        assert_eq!(sai.bulk_calls(), 3);
    }

    #[test]
    fn test_partial_failure_gets_own_status() {
        let sai = SimulatedSai::new();
        sai.set_capacity(SaiObjectType::OutboundRoutingEntry, 1);
        let mut bulker = EntityBulker::new(SaiObjectType::OutboundRoutingEntry, 16);

        let first = bulker.stage_create(create("eni0:10.0.0.0/24"));
        let second = bulker.stage_create(create("eni0:10.0.1.0/24"));
        bulker.flush(&sai).unwrap();

        assert_eq!(bulker.status(first), Some(SaiStatus::Success));
        assert_eq!(bulker.status(second), Some(SaiStatus::TableFull));
    }

    #[test]
    fn test_removes_run_before_creates() {
        let sai = SimulatedSai::new();
        sai.set_capacity(SaiObjectType::PaValidationEntry, 1);
        let mut bulker = EntityBulker::new(SaiObjectType::PaValidationEntry, 16);
        let h = bulker.stage_create(create("vnet1:1.1.1.1"));
        bulker.flush(&sai).unwrap();
        assert_eq!(bulker.status(h), Some(SaiStatus::Success));
        bulker.clear();

        // Staged create first, remove second: remove still frees the slot
        let c = bulker.stage_create(create("vnet1:2.2.2.2"));
        let r = bulker.stage_remove(SaiObjectKey::Entry("vnet1:1.1.1.1".to_string()));
        bulker.flush(&sai).unwrap();

        assert_eq!(bulker.status(r), Some(SaiStatus::Success));
        assert_eq!(bulker.status(c), Some(SaiStatus::Success));
    }

    #[test]
    fn test_oid_create_returns_object_id() {
        let sai = SimulatedSai::new();
        let mut bulker = EntityBulker::new(SaiObjectType::Vnet, 16);
        let h = bulker.stage_create(CreateRequest::object(Vec::new()));
        bulker.flush(&sai).unwrap();

        assert!(bulker.object_id(h).is_some());
    }

    #[test]
    fn test_resolved_slot_skips_driver() {
        let sai = SimulatedSai::new();
        let mut bulker = EntityBulker::new(SaiObjectType::PaValidationEntry, 16);
        let h = bulker.resolved(SaiStatus::Success);
        assert_eq!(bulker.pending(), 0);

        bulker.flush(&sai).unwrap();
        assert_eq!(bulker.status(h), Some(SaiStatus::Success));
        assert_eq!(sai.bulk_calls(), 0);
    }

    #[test]
    fn test_channel_lost_leaves_slots_unresolved() {
        let sai = SimulatedSai::new();
        sai.set_channel_lost(true);
        let mut bulker = EntityBulker::new(SaiObjectType::Eni, 16);
        let h = bulker.stage_create(CreateRequest::object(Vec::new()));

        let err = bulker.flush(&sai).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(bulker.status(h), None);
    }
}
