//! DASH VNET and VNET mapping types.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use sonic_orch_common::{HasRefCount, KeyOpFieldsValues};
use sonic_sai::{AddrFamily, VnetOid};

use crate::orch::{optional_field, parse_bool, parse_mac, required_field};

pub const DASH_VNET_TABLE: &str = "DASH_VNET_TABLE";
pub const DASH_VNET_MAPPING_TABLE: &str = "DASH_VNET_MAPPING_TABLE";

pub type Vni = u32;

/// Attributes of a DASH VNET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VnetConfig {
    pub vni: Vni,
    pub guid: Option<String>,
}

impl VnetConfig {
    pub fn from_entry(entry: &KeyOpFieldsValues) -> Result<Self, String> {
        let vni = required_field(entry, "vni")?
            .parse()
            .map_err(|_| "invalid vni".to_string())?;
        Ok(Self {
            vni,
            guid: optional_field(entry, "guid")?,
        })
    }
}

/// A programmed VNET.
#[derive(Debug, Clone)]
pub struct VnetEntry {
    pub vnet_oid: VnetOid,
    pub config: VnetConfig,
}

/// Routing type of a VNET mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MappingRoutingType {
    #[default]
    VnetEncap,
    PrivateLink,
}

impl FromStr for MappingRoutingType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vnet_encap" => Ok(Self::VnetEncap),
            "privatelink" => Ok(Self::PrivateLink),
            _ => Err(format!("unknown routing type: {}", s)),
        }
    }
}

/// `<vnet>:<overlay-ip>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VnetMapKey {
    pub vnet: String,
    pub overlay_ip: IpAddr,
}

impl FromStr for VnetMapKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (vnet, ip) = s
            .split_once(':')
            .filter(|(vnet, _)| !vnet.is_empty())
            .ok_or_else(|| format!("invalid VNET mapping key: {}", s))?;
        let overlay_ip = ip
            .parse()
            .map_err(|_| format!("invalid overlay IP in key: {}", s))?;
        Ok(Self {
            vnet: vnet.to_string(),
            overlay_ip,
        })
    }
}

impl fmt::Display for VnetMapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.vnet, self.overlay_ip)
    }
}

/// Attributes of a VNET mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VnetMapConfig {
    pub routing_type: MappingRoutingType,
    pub underlay_ip: IpAddr,
    pub mac_address: [u8; 6],
    pub use_dst_vni: bool,
}

impl VnetMapConfig {
    pub fn from_entry(entry: &KeyOpFieldsValues) -> Result<Self, String> {
        Ok(Self {
            routing_type: optional_field(entry, "routing_type")?.unwrap_or_default(),
            underlay_ip: required_field(entry, "underlay_ip")?
                .parse()
                .map_err(|_| "invalid underlay_ip".to_string())?,
            mac_address: parse_mac(required_field(entry, "mac_address")?)?,
            use_dst_vni: match entry.get_field("use_dst_vni") {
                Some(v) => parse_bool(v)?,
                None => false,
            },
        })
    }
}

/// A VNET mapping and which of its hardware objects are in place.
///
/// An entry with only one of the two flags set is a mapping whose other
/// half is still being retried (or removed).
#[derive(Debug, Clone)]
pub struct VnetMapEntry {
    pub dst_vnet_id: VnetOid,
    pub overlay_ip: IpAddr,
    pub config: VnetMapConfig,
    pub ca_to_pa: bool,
    pub pa_validation: bool,
}

impl VnetMapEntry {
    pub fn is_complete(&self) -> bool {
        self.ca_to_pa && self.pa_validation
    }

    pub fn is_empty(&self) -> bool {
        !self.ca_to_pa && !self.pa_validation
    }

    /// Key of the PA validation object this mapping shares.
    pub fn pa_key(&self, vnet: &str) -> String {
        pa_key(vnet, &self.config.underlay_ip)
    }
}

/// `<vnet>:<underlay-ip>`
pub fn pa_key(vnet: &str, underlay_ip: &IpAddr) -> String {
    format!("{}:{}", vnet, underlay_ip)
}

/// A PA validation object shared by every mapping of one VNET that uses the
/// same underlay address.
#[derive(Debug, Clone)]
pub struct PaValidationEntry {
    pub vnet_id: VnetOid,
    pub underlay_ip: IpAddr,
    pub ref_count: u32,
}

impl PaValidationEntry {
    pub fn family(&self) -> AddrFamily {
        AddrFamily::of(&self.underlay_ip)
    }

    pub fn entry_key(&self) -> String {
        pa_validation_entry_key(self.vnet_id, &self.underlay_ip)
    }
}

impl HasRefCount for PaValidationEntry {
    fn increment_ref(&mut self) -> u32 {
        self.ref_count = self.ref_count.saturating_add(1);
        self.ref_count
    }

    fn decrement_ref(&mut self) -> Option<u32> {
        self.ref_count = self.ref_count.checked_sub(1)?;
        Some(self.ref_count)
    }

    fn ref_count(&self) -> u32 {
        self.ref_count
    }
}

/// Hardware entry key of a CA-to-PA entry.
pub fn ca_to_pa_entry_key(vnet_id: VnetOid, overlay_ip: &IpAddr) -> String {
    format!("{}:{}", vnet_id, overlay_ip)
}

/// Hardware entry key of a PA validation entry.
pub fn pa_validation_entry_key(vnet_id: VnetOid, underlay_ip: &IpAddr) -> String {
    format!("{}:{}", vnet_id, underlay_ip)
}
