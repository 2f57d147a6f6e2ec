//! SAI (Switch Abstraction Interface) boundary for the orchestration agent.
//!
//! This crate holds everything the agent knows about the switch driver:
//!
//! - [`error`]: the SAI status taxonomy and the crate error type
//! - [`types`]: type-safe object IDs, object types, attributes and
//!   availability qualifiers
//! - [`gateway`]: the [`SaiGateway`] trait every driver implements
//! - [`bulker`]: per-object-type bulk staging ([`EntityBulker`])
//! - [`sim`]: an in-memory fixed-capacity driver used by tests and by the
//!   replay mode of the daemon
//!
//! # Example
//!
//! ```
//! use sonic_sai::{CreateRequest, EntityBulker, SaiObjectType, SaiStatus, SimulatedSai};
//!
//! let sai = SimulatedSai::new();
//! let mut bulker = EntityBulker::new(SaiObjectType::Vnet, 64);
//! let handle = bulker.stage_create(CreateRequest::object(Vec::new()));
//! bulker.flush(&sai).unwrap();
//! assert_eq!(bulker.status(handle), Some(SaiStatus::Success));
//! ```

pub mod bulker;
pub mod error;
pub mod gateway;
pub mod sim;
pub mod types;

pub use bulker::{BulkHandle, EntityBulker, DEFAULT_MAX_BULK_SIZE};
pub use error::{SaiError, SaiResult, SaiStatus};
pub use gateway::{CreateRequest, CreateStatus, SaiGateway};
pub use sim::{SimulatedSai, DEFAULT_SIM_CAPACITY};
pub use types::{
    AclBindPoint, AclResource, AclStage, AclTableKind, AclTableOid, AddrFamily,
    AvailabilityQualifier, DashAclGroupKind, DashAclGroupOid, EniKind, EniOid, NextHopType,
    RawSaiObjectId, SaiAttrId, SaiAttrValue, SaiAttribute, SaiObjectId, SaiObjectKey,
    SaiObjectKind, SaiObjectType, SwitchAvailableAttr, SwitchKind, SwitchOid, VnetKind, VnetOid,
    SAI_NULL_OBJECT_ID,
};
