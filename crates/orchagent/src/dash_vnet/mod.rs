//! DASH VNET and VNET mapping orchestration.
//!
//! `DASH_VNET_TABLE|<vnet>` creates a VNET object and publishes its OID so
//! ENIs, mappings and routes can refer to it by name.
//! `DASH_VNET_MAPPING_TABLE|<vnet>:<overlay-ip>` programs an outbound
//! CA-to-PA entry plus a PA validation entry shared by every mapping of the
//! VNET with the same underlay address.

mod map_table;
mod orch;
mod types;
mod vnet_table;

pub use map_table::{MapOp, VnetMapTable};
pub use orch::{VnetOrch, VNET_ORCH_PRIORITY};
pub use types::{
    ca_to_pa_entry_key, pa_key, pa_validation_entry_key, MappingRoutingType, PaValidationEntry,
    Vni, VnetConfig, VnetEntry, VnetMapConfig, VnetMapEntry, VnetMapKey,
    DASH_VNET_MAPPING_TABLE, DASH_VNET_TABLE,
};
pub use vnet_table::{VnetOp, VnetTable};
