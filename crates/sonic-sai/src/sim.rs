//! In-memory switch driver.
//!
//! `SimulatedSai` models a fixed-capacity ASIC: each object type has a table
//! size, entries are tracked by key, and duplicates or missing keys produce
//! the same statuses a real driver would. Tests can inject statuses, mark
//! resources as unsupported and cut the driver channel.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

use log::{debug, info};

use crate::error::{SaiError, SaiResult, SaiStatus};
use crate::gateway::{CreateRequest, CreateStatus, SaiGateway};
use crate::types::{
    AvailabilityQualifier, RawSaiObjectId, SaiAttrId, SaiAttrValue, SaiObjectKey, SaiObjectType,
};

/// Table size used when no capacity is configured for a type.
pub const DEFAULT_SIM_CAPACITY: u64 = 4096;

const SIM_SWITCH_OID: RawSaiObjectId = 0x21_0000_0000_0000;

#[derive(Debug, Default)]
struct SimState {
    next_oid: RawSaiObjectId,
    objects: HashMap<SaiObjectType, HashSet<SaiObjectKey>>,
    capacity: HashMap<SaiObjectType, u64>,
    forced: HashMap<SaiObjectType, VecDeque<SaiStatus>>,
    unsupported: HashSet<SaiObjectType>,
    availability: HashMap<SaiObjectType, u64>,
    named_availability: HashMap<String, u64>,
    attributes: HashMap<(RawSaiObjectId, SaiAttrId), SaiAttrValue>,
    channel_lost: bool,
    bulk_calls: usize,
    dumps: usize,
}

/// Simulated SAI driver.
#[derive(Debug)]
pub struct SimulatedSai {
    default_capacity: u64,
    state: Mutex<SimState>,
}

impl Default for SimulatedSai {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedSai {
    pub fn new() -> Self {
        Self::with_default_capacity(DEFAULT_SIM_CAPACITY)
    }

    pub fn with_default_capacity(default_capacity: u64) -> Self {
        Self {
            default_capacity,
            state: Mutex::new(SimState {
                next_oid: 1,
                ..SimState::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Sets the table size for one object type.
    pub fn set_capacity(&self, object_type: SaiObjectType, capacity: u64) {
        self.state().capacity.insert(object_type, capacity);
    }

    /// Queues statuses returned, in order, by the next requests of a type.
    ///
    /// A queued `Success` lets the request go through normal processing.
    pub fn push_status(&self, object_type: SaiObjectType, status: SaiStatus) {
        self.state()
            .forced
            .entry(object_type)
            .or_default()
            .push_back(status);
    }

    /// Makes availability queries for a type report NOT_SUPPORTED.
    pub fn set_unsupported(&self, object_type: SaiObjectType) {
        self.state().unsupported.insert(object_type);
    }

    /// Overrides the availability reported for a type.
    pub fn set_availability(&self, object_type: SaiObjectType, available: u64) {
        self.state().availability.insert(object_type, available);
    }

    /// Sets the availability reported for a named extension table.
    pub fn set_named_availability(&self, name: impl Into<String>, available: u64) {
        self.state().named_availability.insert(name.into(), available);
    }

    /// Sets the value returned for an attribute of an object.
    pub fn set_attribute(&self, object_id: RawSaiObjectId, attr: SaiAttrId, value: SaiAttrValue) {
        self.state().attributes.insert((object_id, attr), value);
    }

    /// Cuts (or restores) the driver channel.
    pub fn set_channel_lost(&self, lost: bool) {
        self.state().channel_lost = lost;
    }

    /// Number of objects of a type currently programmed.
    pub fn object_count(&self, object_type: SaiObjectType) -> usize {
        self.state().objects.get(&object_type).map_or(0, HashSet::len)
    }

    /// Returns true if the given object is programmed.
    pub fn contains(&self, object_type: SaiObjectType, key: &SaiObjectKey) -> bool {
        self.state()
            .objects
            .get(&object_type)
            .is_some_and(|set| set.contains(key))
    }

    /// Number of bulk driver calls made so far.
    pub fn bulk_calls(&self) -> usize {
        self.state().bulk_calls
    }

    /// Number of dumps requested.
    pub fn dumps(&self) -> usize {
        self.state().dumps
    }

    fn capacity_of(&self, state: &SimState, object_type: SaiObjectType) -> u64 {
        state
            .capacity
            .get(&object_type)
            .copied()
            .unwrap_or(self.default_capacity)
    }

    fn check_channel(state: &SimState) -> SaiResult<()> {
        if state.channel_lost {
            Err(SaiError::channel_lost("simulated driver channel is down"))
        } else {
            Ok(())
        }
    }

    fn take_forced(state: &mut SimState, object_type: SaiObjectType) -> Option<SaiStatus> {
        state
            .forced
            .get_mut(&object_type)
            .and_then(VecDeque::pop_front)
            .filter(|status| !status.is_success())
    }
}

impl SaiGateway for SimulatedSai {
    fn switch_id(&self) -> RawSaiObjectId {
        SIM_SWITCH_OID
    }

    fn bulk_create(
        &self,
        object_type: SaiObjectType,
        requests: &[CreateRequest],
    ) -> SaiResult<Vec<CreateStatus>> {
        let mut state = self.state();
        Self::check_channel(&state)?;
        state.bulk_calls += 1;
        let capacity = self.capacity_of(&state, object_type);

        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            if let Some(status) = Self::take_forced(&mut state, object_type) {
                results.push(CreateStatus::failed(status));
                continue;
            }

            let (key, object_id) = match &request.entry {
                Some(entry) => (SaiObjectKey::Entry(entry.clone()), None),
                None => {
                    let oid = state.next_oid | ((object_type as u64 + 1) << 48);
                    state.next_oid += 1;
                    (SaiObjectKey::Oid(oid), Some(oid))
                }
            };

            let table = state.objects.entry(object_type).or_default();
            let status = if table.contains(&key) {
                SaiStatus::ItemAlreadyExists
            } else if table.len() as u64 >= capacity {
                SaiStatus::TableFull
            } else {
                table.insert(key);
                SaiStatus::Success
            };

            results.push(CreateStatus {
                status,
                object_id: object_id.filter(|_| status.is_success()),
            });
        }
        Ok(results)
    }

    fn bulk_remove(
        &self,
        object_type: SaiObjectType,
        keys: &[SaiObjectKey],
    ) -> SaiResult<Vec<SaiStatus>> {
        let mut state = self.state();
        Self::check_channel(&state)?;
        state.bulk_calls += 1;

        let mut results = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(status) = Self::take_forced(&mut state, object_type) {
                results.push(status);
                continue;
            }
            let removed = state
                .objects
                .get_mut(&object_type)
                .is_some_and(|table| table.remove(key));
            results.push(if removed {
                SaiStatus::Success
            } else {
                SaiStatus::ItemNotFound
            });
        }
        Ok(results)
    }

    fn get_attribute(
        &self,
        object_id: RawSaiObjectId,
        attr: SaiAttrId,
    ) -> Result<SaiAttrValue, SaiStatus> {
        let state = self.state();
        if state.channel_lost {
            return Err(SaiStatus::Failure);
        }
        state
            .attributes
            .get(&(object_id, attr))
            .cloned()
            .ok_or(SaiStatus::NotSupported)
    }

    fn get_availability(
        &self,
        object_type: SaiObjectType,
        qualifiers: &[AvailabilityQualifier],
    ) -> Result<u64, SaiStatus> {
        let state = self.state();
        if state.channel_lost {
            return Err(SaiStatus::Failure);
        }
        if state.unsupported.contains(&object_type) {
            return Err(SaiStatus::NotSupported);
        }

        for qualifier in qualifiers {
            if let AvailabilityQualifier::ObjectName(name) = qualifier {
                return state
                    .named_availability
                    .get(name)
                    .copied()
                    .ok_or(SaiStatus::NotSupported);
            }
        }

        if let Some(available) = state.availability.get(&object_type) {
            return Ok(*available);
        }

        let used = state.objects.get(&object_type).map_or(0, HashSet::len) as u64;
        Ok(self.capacity_of(&state, object_type).saturating_sub(used))
    }

    fn invoke_dump(&self) -> SaiResult<()> {
        let mut state = self.state();
        state.dumps += 1;
        info!("simulated driver dump #{} written", state.dumps);
        debug!(
            "simulated driver holds {} object types",
            state.objects.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_duplicate_entry_reports_already_exists() {
        let sai = SimulatedSai::new();
        let req = CreateRequest::entry("vnet1:10.0.0.1", Vec::new());

        let first = sai.create(SaiObjectType::OutboundCaToPaEntry, req.clone()).unwrap();
        let second = sai.create(SaiObjectType::OutboundCaToPaEntry, req).unwrap();

        assert_eq!(first.status, SaiStatus::Success);
        assert_eq!(second.status, SaiStatus::ItemAlreadyExists);
        assert_eq!(sai.object_count(SaiObjectType::OutboundCaToPaEntry), 1);
    }

    #[test]
    fn test_remove_missing_reports_not_found() {
        let sai = SimulatedSai::new();
        let status = sai
            .remove(SaiObjectType::Vnet, SaiObjectKey::Oid(0x42))
            .unwrap();
        assert_eq!(status, SaiStatus::ItemNotFound);
    }

    #[test]
    fn test_availability_tracks_usage() {
        let sai = SimulatedSai::new();
        sai.set_capacity(SaiObjectType::Eni, 4);
        sai.create(SaiObjectType::Eni, CreateRequest::object(Vec::new()))
            .unwrap();

        assert_eq!(sai.get_availability(SaiObjectType::Eni, &[]), Ok(3));
    }

    #[test]
    fn test_forced_status_consumed_in_order() {
        let sai = SimulatedSai::new();
        sai.push_status(SaiObjectType::Vnet, SaiStatus::NotExecuted);
        sai.push_status(SaiObjectType::Vnet, SaiStatus::Success);

        let a = sai.create(SaiObjectType::Vnet, CreateRequest::object(Vec::new())).unwrap();
        let b = sai.create(SaiObjectType::Vnet, CreateRequest::object(Vec::new())).unwrap();

        assert_eq!(a.status, SaiStatus::NotExecuted);
        assert_eq!(b.status, SaiStatus::Success);
        assert!(b.object_id.is_some());
    }

    #[test]
    fn test_unsupported_and_channel_lost() {
        let sai = SimulatedSai::new();
        sai.set_unsupported(SaiObjectType::DashAclGroup);
        assert_eq!(
            sai.get_availability(SaiObjectType::DashAclGroup, &[]),
            Err(SaiStatus::NotSupported)
        );

        sai.set_channel_lost(true);
        assert!(sai
            .bulk_create(SaiObjectType::Vnet, &[])
            .unwrap_err()
            .is_fatal());
        sai.invoke_dump().unwrap();
        assert_eq!(sai.dumps(), 1);
    }
}
