//! The driver boundary.
//!
//! Everything the agent asks of the switch goes through [`SaiGateway`]. Bulk
//! calls return one status per request; a `ChannelLost` error means the
//! driver is gone and no statuses are available at all.

use crate::error::{SaiResult, SaiStatus};
use crate::types::{
    AvailabilityQualifier, RawSaiObjectId, SaiAttrId, SaiAttrValue, SaiAttribute, SaiObjectKey,
    SaiObjectType,
};

/// A single create request in a bulk call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRequest {
    /// Entry key for entry-addressed object types, `None` for OID objects.
    pub entry: Option<String>,
    pub attributes: Vec<SaiAttribute>,
}

impl CreateRequest {
    pub fn object(attributes: Vec<SaiAttribute>) -> Self {
        Self {
            entry: None,
            attributes,
        }
    }

    pub fn entry(entry: impl Into<String>, attributes: Vec<SaiAttribute>) -> Self {
        Self {
            entry: Some(entry.into()),
            attributes,
        }
    }
}

/// Per-request result of a bulk create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateStatus {
    pub status: SaiStatus,
    /// Driver-allocated OID, only set for successful OID creates.
    pub object_id: Option<RawSaiObjectId>,
}

impl CreateStatus {
    pub fn failed(status: SaiStatus) -> Self {
        Self {
            status,
            object_id: None,
        }
    }
}

/// Interface to the switch driver.
pub trait SaiGateway: Send + Sync {
    /// Returns the switch object ID.
    fn switch_id(&self) -> RawSaiObjectId;

    /// Creates objects in one driver call.
    ///
    /// The returned vector may be shorter than `requests` if the driver
    /// stopped early; callers treat missing slots as not executed.
    fn bulk_create(
        &self,
        object_type: SaiObjectType,
        requests: &[CreateRequest],
    ) -> SaiResult<Vec<CreateStatus>>;

    /// Removes objects in one driver call.
    fn bulk_remove(
        &self,
        object_type: SaiObjectType,
        keys: &[SaiObjectKey],
    ) -> SaiResult<Vec<SaiStatus>>;

    /// Reads a single attribute of an object.
    fn get_attribute(
        &self,
        object_id: RawSaiObjectId,
        attr: SaiAttrId,
    ) -> Result<SaiAttrValue, SaiStatus>;

    /// Queries remaining capacity for an object type.
    fn get_availability(
        &self,
        object_type: SaiObjectType,
        qualifiers: &[AvailabilityQualifier],
    ) -> Result<u64, SaiStatus>;

    /// Asks the driver to write its state dump.
    fn invoke_dump(&self) -> SaiResult<()>;

    /// Creates a single object.
    fn create(&self, object_type: SaiObjectType, request: CreateRequest) -> SaiResult<CreateStatus> {
        let statuses = self.bulk_create(object_type, std::slice::from_ref(&request))?;
        Ok(statuses
            .into_iter()
            .next()
            .unwrap_or(CreateStatus::failed(SaiStatus::NotExecuted)))
    }

    /// Removes a single object.
    fn remove(&self, object_type: SaiObjectType, key: SaiObjectKey) -> SaiResult<SaiStatus> {
        let statuses = self.bulk_remove(object_type, std::slice::from_ref(&key))?;
        Ok(statuses.into_iter().next().unwrap_or(SaiStatus::NotExecuted))
    }
}
