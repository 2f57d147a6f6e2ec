//! DASH outbound route and inbound route rule types.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use sonic_orch_common::KeyOpFieldsValues;
use sonic_sai::{EniOid, VnetOid};

use crate::orch::{optional_field, parse_bool, required_field, IpPrefix};

pub const DASH_ROUTE_TABLE: &str = "DASH_ROUTE_TABLE";
pub const DASH_ROUTE_RULE_TABLE: &str = "DASH_ROUTE_RULE_TABLE";

/// Outbound routing action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteActionType {
    Vnet,
    VnetDirect,
    Direct,
    Drop,
}

impl RouteActionType {
    pub fn as_sai_str(&self) -> &'static str {
        match self {
            Self::Vnet => "SAI_OUTBOUND_ROUTING_ENTRY_ACTION_ROUTE_VNET",
            Self::VnetDirect => "SAI_OUTBOUND_ROUTING_ENTRY_ACTION_ROUTE_VNET_DIRECT",
            Self::Direct => "SAI_OUTBOUND_ROUTING_ENTRY_ACTION_ROUTE_DIRECT",
            Self::Drop => "SAI_OUTBOUND_ROUTING_ENTRY_ACTION_DROP",
        }
    }
}

impl FromStr for RouteActionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vnet" => Ok(Self::Vnet),
            "vnet_direct" => Ok(Self::VnetDirect),
            "direct" => Ok(Self::Direct),
            "drop" => Ok(Self::Drop),
            _ => Err(format!("unknown action_type: {}", s)),
        }
    }
}

/// `<eni>:<prefix>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    pub eni: String,
    pub prefix: IpPrefix,
}

impl FromStr for RouteKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (eni, prefix) = s
            .split_once(':')
            .filter(|(eni, _)| !eni.is_empty())
            .ok_or_else(|| format!("invalid route key: {}", s))?;
        Ok(Self {
            eni: eni.to_string(),
            prefix: prefix.parse()?,
        })
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.eni, self.prefix)
    }
}

/// Attributes of an outbound route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteConfig {
    pub action: RouteActionType,
    pub vnet: Option<String>,
    pub overlay_ip: Option<IpAddr>,
}

impl RouteConfig {
    pub fn from_entry(entry: &KeyOpFieldsValues) -> Result<Self, String> {
        let config = Self {
            action: required_field(entry, "action_type")?.parse()?,
            vnet: optional_field(entry, "vnet")?,
            overlay_ip: optional_field(entry, "overlay_ip")?,
        };
        match config.action {
            RouteActionType::Vnet if config.vnet.is_none() => {
                Err("action vnet requires vnet".to_string())
            }
            RouteActionType::VnetDirect if config.vnet.is_none() || config.overlay_ip.is_none() => {
                Err("action vnet_direct requires vnet and overlay_ip".to_string())
            }
            _ => Ok(config),
        }
    }
}

/// A programmed outbound route.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub eni_oid: EniOid,
    pub dst_vnet_oid: Option<VnetOid>,
    pub prefix: IpPrefix,
    pub config: RouteConfig,
    /// Hardware entry key.
    pub entry_key: String,
}

/// Hardware entry key of an outbound routing entry.
pub fn outbound_routing_entry_key(eni_oid: EniOid, prefix: &IpPrefix) -> String {
    format!("{}:{}", eni_oid, prefix)
}

/// Inbound routing action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteRuleAction {
    Decap,
    DecapPaValidate,
}

impl RouteRuleAction {
    pub fn as_sai_str(&self) -> &'static str {
        match self {
            Self::Decap => "SAI_INBOUND_ROUTING_ENTRY_ACTION_VXLAN_DECAP",
            Self::DecapPaValidate => "SAI_INBOUND_ROUTING_ENTRY_ACTION_VXLAN_DECAP_PA_VALIDATE",
        }
    }
}

impl FromStr for RouteRuleAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "decap" => Ok(Self::Decap),
            "decap_pa_validate" => Ok(Self::DecapPaValidate),
            _ => Err(format!("unknown action_type: {}", s)),
        }
    }
}

/// `<eni>:<vni>:<prefix>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteRuleKey {
    pub eni: String,
    pub vni: u32,
    pub prefix: IpPrefix,
}

impl FromStr for RouteRuleKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let (Some(eni), Some(vni), Some(prefix)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(format!("invalid route rule key: {}", s));
        };
        if eni.is_empty() {
            return Err(format!("invalid route rule key: {}", s));
        }
        Ok(Self {
            eni: eni.to_string(),
            vni: vni.parse().map_err(|_| format!("invalid vni in key: {}", s))?,
            prefix: prefix.parse()?,
        })
    }
}

impl fmt::Display for RouteRuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.eni, self.vni, self.prefix)
    }
}

/// Attributes of an inbound route rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRuleConfig {
    pub action: RouteRuleAction,
    pub priority: u32,
    pub vnet: Option<String>,
    pub pa_validation: bool,
}

impl RouteRuleConfig {
    pub fn from_entry(entry: &KeyOpFieldsValues) -> Result<Self, String> {
        let pa_validation = match entry.get_field("pa_validation") {
            Some(v) => parse_bool(v)?,
            None => false,
        };
        let action = match optional_field(entry, "action_type")? {
            Some(action) => action,
            None if pa_validation => RouteRuleAction::DecapPaValidate,
            None => RouteRuleAction::Decap,
        };
        let config = Self {
            action,
            priority: required_field(entry, "priority")?
                .parse()
                .map_err(|_| "invalid priority".to_string())?,
            vnet: optional_field(entry, "vnet")?,
            pa_validation,
        };
        if config.pa_validation && config.vnet.is_none() {
            return Err("pa_validation requires vnet".to_string());
        }
        Ok(config)
    }
}

/// A programmed inbound route rule.
#[derive(Debug, Clone)]
pub struct RouteRuleEntry {
    pub eni_oid: EniOid,
    pub src_vnet_oid: Option<VnetOid>,
    pub vni: u32,
    pub prefix: IpPrefix,
    pub config: RouteRuleConfig,
    /// Hardware entry key.
    pub entry_key: String,
}

/// Hardware entry key of an inbound routing entry.
pub fn inbound_routing_entry_key(eni_oid: EniOid, vni: u32, prefix: &IpPrefix) -> String {
    format!("{}:{}:{}", eni_oid, vni, prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fv(f: &str, v: &str) -> (String, String) {
        (f.to_string(), v.to_string())
    }

    #[test]
    fn test_route_key() {
        let key: RouteKey = "eni0:10.1.0.0/16".parse().unwrap();
        assert_eq!(key.eni, "eni0");
        assert_eq!(key.prefix.len, 16);

        let key: RouteKey = "eni0:2001:db8::/64".parse().unwrap();
        assert_eq!(key.to_string(), "eni0:2001:db8::/64");

        assert!("eni0".parse::<RouteKey>().is_err());
        assert!("eni0:bogus/8".parse::<RouteKey>().is_err());
    }

    #[test]
    fn test_route_rule_key() {
        let key: RouteRuleKey = "eni0:1000:2001:db8::/64".parse().unwrap();
        assert_eq!(key.vni, 1000);
        assert_eq!(key.prefix.to_string(), "2001:db8::/64");

        assert!("eni0:x:10.0.0.0/8".parse::<RouteRuleKey>().is_err());
        assert!("eni0:1000".parse::<RouteRuleKey>().is_err());
    }

    #[test]
    fn test_route_config_requirements() {
        let route = |fvs| RouteConfig::from_entry(&KeyOpFieldsValues::set("eni0:10.0.0.0/8", fvs));

        assert!(route(vec![fv("action_type", "vnet")]).is_err());
        assert!(route(vec![fv("action_type", "vnet"), fv("vnet", "Vnet1")]).is_ok());
        assert!(route(vec![fv("action_type", "vnet_direct"), fv("vnet", "Vnet1")]).is_err());
        assert_eq!(
            route(vec![
                fv("action_type", "vnet_direct"),
                fv("vnet", "Vnet1"),
                fv("overlay_ip", "10.0.0.6"),
            ])
            .map(|c| c.action),
            Ok(RouteActionType::VnetDirect)
        );
        assert!(route(vec![fv("action_type", "drop")]).is_ok());
        assert!(route(vec![fv("action_type", "teleport")]).is_err());
    }

    #[test]
    fn test_route_rule_config() {
        let rule = |fvs| {
            RouteRuleConfig::from_entry(&KeyOpFieldsValues::set("eni0:1000:10.0.0.0/8", fvs))
        };

        let config = rule(vec![
            fv("priority", "1"),
            fv("pa_validation", "true"),
            fv("vnet", "Vnet1"),
        ])
        .unwrap();
        assert_eq!(config.action, RouteRuleAction::DecapPaValidate);

        assert!(rule(vec![fv("priority", "1"), fv("pa_validation", "true")]).is_err());
        assert!(rule(vec![fv("pa_validation", "false")]).is_err());
        assert_eq!(
            rule(vec![fv("priority", "2")]).map(|c| c.action),
            Ok(RouteRuleAction::Decap)
        );
    }
}
