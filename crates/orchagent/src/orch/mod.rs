//! Shared state handed to every orch.
//!
//! The daemon builds one [`OrchContext`] at startup and passes it by
//! mutable reference into every `do_task`. It carries the resource monitor
//! and the name-to-OID indices that let a child object find its parent
//! (VNET for ENIs and mappings, ENI for routes).

mod fields;

use std::collections::HashMap;
use std::sync::Arc;

use log::warn;
use sonic_sai::{EniOid, SaiGateway, VnetOid};

use crate::crm::{CrmOrch, CrmResourceType};

pub use fields::{optional_field, parse_bool, parse_mac, required_field, IpPrefix};

/// Context shared by the orchs of one daemon.
pub struct OrchContext {
    /// Switch driver.
    pub gateway: Arc<dyn SaiGateway>,
    /// Resource monitor.
    pub crm: CrmOrch,
    /// Programmed VNETs by name.
    pub vnet_ids: HashMap<String, VnetOid>,
    /// Programmed ENIs by name.
    pub eni_ids: HashMap<String, EniOid>,
}

impl OrchContext {
    pub fn new(gateway: Arc<dyn SaiGateway>, crm: CrmOrch) -> Self {
        Self {
            gateway,
            crm,
            vnet_ids: HashMap::new(),
            eni_ids: HashMap::new(),
        }
    }

    pub fn vnet_oid(&self, name: &str) -> Option<VnetOid> {
        self.vnet_ids.get(name).copied()
    }

    pub fn eni_oid(&self, name: &str) -> Option<EniOid> {
        self.eni_ids.get(name).copied()
    }

    /// Counts one hardware object created for `resource`.
    pub fn crm_increment(&mut self, resource: CrmResourceType) {
        if let Err(e) = self.crm.increment_used(resource) {
            warn!("CRM accounting skipped: {}", e);
        }
    }

    /// Counts one hardware object removed for `resource`.
    pub fn crm_decrement(&mut self, resource: CrmResourceType) {
        if let Err(e) = self.crm.decrement_used(resource) {
            warn!("CRM accounting skipped: {}", e);
        }
    }
}

impl std::fmt::Debug for OrchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchContext")
            .field("crm", &self.crm)
            .field("vnets", &self.vnet_ids.len())
            .field("enis", &self.eni_ids.len())
            .finish()
    }
}
