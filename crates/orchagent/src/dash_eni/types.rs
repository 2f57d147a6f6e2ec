//! DASH ENI types.

use std::net::IpAddr;

use sonic_orch_common::KeyOpFieldsValues;
use sonic_sai::{EniOid, VnetOid};

use crate::orch::{optional_field, parse_bool, parse_mac, required_field};

pub const DASH_ENI_TABLE: &str = "DASH_ENI_TABLE";

/// Attributes of an ENI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EniConfig {
    pub vnet: String,
    pub mac_address: [u8; 6],
    pub underlay_ip: IpAddr,
    pub admin_state: bool,
    pub vm_vni: Option<u32>,
    pub qos: Option<String>,
}

impl EniConfig {
    pub fn from_entry(entry: &KeyOpFieldsValues) -> Result<Self, String> {
        Ok(Self {
            vnet: required_field(entry, "vnet")?.to_string(),
            mac_address: parse_mac(required_field(entry, "mac_address")?)?,
            underlay_ip: required_field(entry, "underlay_ip")?
                .parse()
                .map_err(|_| "invalid underlay_ip".to_string())?,
            admin_state: match entry.get_field("admin_state") {
                Some(state) => parse_bool(state)?,
                None => true,
            },
            vm_vni: optional_field(entry, "vm_vni")?,
            qos: optional_field(entry, "qos")?,
        })
    }
}

/// A programmed ENI.
#[derive(Debug, Clone)]
pub struct EniEntry {
    pub eni_oid: EniOid,
    pub vnet_oid: VnetOid,
    pub config: EniConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fv(f: &str, v: &str) -> (String, String) {
        (f.to_string(), v.to_string())
    }

    #[test]
    fn test_eni_config() {
        let entry = KeyOpFieldsValues::set(
            "eni0",
            vec![
                fv("vnet", "Vnet1"),
                fv("mac_address", "00:11:22:33:44:55"),
                fv("underlay_ip", "25.1.1.1"),
                fv("admin_state", "disabled"),
                fv("vm_vni", "4321"),
            ],
        );
        let config = EniConfig::from_entry(&entry).unwrap();
        assert_eq!(config.vnet, "Vnet1");
        assert!(!config.admin_state);
        assert_eq!(config.vm_vni, Some(4321));
        assert_eq!(config.qos, None);
    }

    #[test]
    fn test_eni_defaults_and_errors() {
        let entry = KeyOpFieldsValues::set(
            "eni0",
            vec![
                fv("vnet", "Vnet1"),
                fv("mac_address", "00:11:22:33:44:55"),
                fv("underlay_ip", "25.1.1.1"),
            ],
        );
        assert!(EniConfig::from_entry(&entry).unwrap().admin_state);

        let entry = KeyOpFieldsValues::set(
            "eni0",
            vec![fv("vnet", "Vnet1"), fv("mac_address", "00:11:22:33:44:55")],
        );
        assert_eq!(
            EniConfig::from_entry(&entry),
            Err("missing field underlay_ip".to_string())
        );
    }
}
