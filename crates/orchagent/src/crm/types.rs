//! CRM types and data structures.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use sonic_sai::{
    AclBindPoint, AclStage, AddrFamily, AvailabilityQualifier, NextHopType, RawSaiObjectId,
    SaiAttrId, SaiObjectType, SwitchAvailableAttr,
};

/// CRM resource type enumeration.
///
/// One variant per finite hardware table tracked by CRM, across routing,
/// ACL, forwarding, NAT, MPLS, SRv6, extension tables and DASH (DPU).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CrmResourceType {
    // IP routing resources
    Ipv4Route,
    Ipv6Route,

    // Nexthop resources
    Ipv4Nexthop,
    Ipv6Nexthop,

    // Neighbor resources
    Ipv4Neighbor,
    Ipv6Neighbor,

    // Nexthop group resources
    NexthopGroupMember,
    NexthopGroup,

    // ACL resources
    AclTable,
    AclGroup,
    AclEntry,
    AclCounter,

    // Forwarding resources
    FdbEntry,
    IpmcEntry,

    // NAT resources
    SnatEntry,
    DnatEntry,

    // MPLS resources
    MplsInseg,
    MplsNexthop,

    // SRv6 resources
    Srv6MySidEntry,
    Srv6Nexthop,

    NexthopGroupMap,

    // Extension table (P4RT)
    ExtTable,

    // DASH (DPU) resources
    DashVnet,
    DashEni,
    DashEniEtherAddressMap,
    DashIpv4InboundRouting,
    DashIpv6InboundRouting,
    DashIpv4OutboundRouting,
    DashIpv6OutboundRouting,
    DashIpv4PaValidation,
    DashIpv6PaValidation,
    DashIpv4OutboundCaToPa,
    DashIpv6OutboundCaToPa,
    DashIpv4AclGroup,
    DashIpv6AclGroup,
    DashIpv4AclRule,
    DashIpv6AclRule,

    TwampEntry,
}

/// How the driver is asked for the remaining capacity of a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvailabilityQuery {
    /// Object-type availability, falling back to a switch attribute when
    /// the object query fails.
    Object {
        object_type: SaiObjectType,
        qualifiers: Vec<AvailabilityQualifier>,
        fallback: Option<SwitchAvailableAttr>,
    },
    /// Switch attribute only.
    Switch(SwitchAvailableAttr),
    /// Switch ACL resource list, one counter per stage and bind point.
    AclResourceList(SaiAttrId),
    /// ACL table attribute, one counter per tracked table.
    AclTableAttribute(SaiAttrId),
    /// Generic programmable object by name, one counter per extension table.
    ExtTable,
    /// DASH ACL rule object per tracked group.
    DashAclRule,
}

impl CrmResourceType {
    /// Every resource type, in polling order.
    pub const ALL: [CrmResourceType; 38] = [
        Self::Ipv4Route,
        Self::Ipv6Route,
        Self::Ipv4Nexthop,
        Self::Ipv6Nexthop,
        Self::Ipv4Neighbor,
        Self::Ipv6Neighbor,
        Self::NexthopGroupMember,
        Self::NexthopGroup,
        Self::AclTable,
        Self::AclGroup,
        Self::AclEntry,
        Self::AclCounter,
        Self::FdbEntry,
        Self::IpmcEntry,
        Self::SnatEntry,
        Self::DnatEntry,
        Self::MplsInseg,
        Self::MplsNexthop,
        Self::Srv6MySidEntry,
        Self::Srv6Nexthop,
        Self::NexthopGroupMap,
        Self::ExtTable,
        Self::DashVnet,
        Self::DashEni,
        Self::DashEniEtherAddressMap,
        Self::DashIpv4InboundRouting,
        Self::DashIpv6InboundRouting,
        Self::DashIpv4OutboundRouting,
        Self::DashIpv6OutboundRouting,
        Self::DashIpv4PaValidation,
        Self::DashIpv6PaValidation,
        Self::DashIpv4OutboundCaToPa,
        Self::DashIpv6OutboundCaToPa,
        Self::DashIpv4AclGroup,
        Self::DashIpv6AclGroup,
        Self::DashIpv4AclRule,
        Self::DashIpv6AclRule,
        Self::TwampEntry,
    ];

    /// Returns the configuration and telemetry stem for this resource type.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ipv4Route => "ipv4_route",
            Self::Ipv6Route => "ipv6_route",
            Self::Ipv4Nexthop => "ipv4_nexthop",
            Self::Ipv6Nexthop => "ipv6_nexthop",
            Self::Ipv4Neighbor => "ipv4_neighbor",
            Self::Ipv6Neighbor => "ipv6_neighbor",
            Self::NexthopGroupMember => "nexthop_group_member",
            Self::NexthopGroup => "nexthop_group",
            Self::AclTable => "acl_table",
            Self::AclGroup => "acl_group",
            Self::AclEntry => "acl_entry",
            Self::AclCounter => "acl_counter",
            Self::FdbEntry => "fdb_entry",
            Self::IpmcEntry => "ipmc_entry",
            Self::SnatEntry => "snat_entry",
            Self::DnatEntry => "dnat_entry",
            Self::MplsInseg => "mpls_inseg",
            Self::MplsNexthop => "mpls_nexthop",
            Self::Srv6MySidEntry => "srv6_my_sid_entry",
            Self::Srv6Nexthop => "srv6_nexthop",
            Self::NexthopGroupMap => "nexthop_group_map",
            Self::ExtTable => "extension_table",
            Self::DashVnet => "dash_vnet",
            Self::DashEni => "dash_eni",
            Self::DashEniEtherAddressMap => "dash_eni_ether_address_map",
            Self::DashIpv4InboundRouting => "dash_ipv4_inbound_routing",
            Self::DashIpv6InboundRouting => "dash_ipv6_inbound_routing",
            Self::DashIpv4OutboundRouting => "dash_ipv4_outbound_routing",
            Self::DashIpv6OutboundRouting => "dash_ipv6_outbound_routing",
            Self::DashIpv4PaValidation => "dash_ipv4_pa_validation",
            Self::DashIpv6PaValidation => "dash_ipv6_pa_validation",
            Self::DashIpv4OutboundCaToPa => "dash_ipv4_outbound_ca_to_pa",
            Self::DashIpv6OutboundCaToPa => "dash_ipv6_outbound_ca_to_pa",
            Self::DashIpv4AclGroup => "dash_ipv4_acl_group",
            Self::DashIpv6AclGroup => "dash_ipv6_acl_group",
            Self::DashIpv4AclRule => "dash_ipv4_acl_rule",
            Self::DashIpv6AclRule => "dash_ipv6_acl_rule",
            Self::TwampEntry => "twamp_entry",
        }
    }

    /// Returns the upper-case name used in log messages.
    pub fn log_name(&self) -> String {
        self.name().to_uppercase()
    }

    /// Telemetry field holding the used count.
    pub fn used_field(&self) -> String {
        format!("crm_stats_{}_used", self.name())
    }

    /// Telemetry field holding the available count.
    pub fn available_field(&self) -> String {
        format!("crm_stats_{}_available", self.name())
    }

    /// Returns true if this is a DASH (DPU) resource type.
    pub fn is_dash_resource(&self) -> bool {
        matches!(
            self,
            Self::DashVnet
                | Self::DashEni
                | Self::DashEniEtherAddressMap
                | Self::DashIpv4InboundRouting
                | Self::DashIpv6InboundRouting
                | Self::DashIpv4OutboundRouting
                | Self::DashIpv6OutboundRouting
                | Self::DashIpv4PaValidation
                | Self::DashIpv6PaValidation
                | Self::DashIpv4OutboundCaToPa
                | Self::DashIpv6OutboundCaToPa
                | Self::DashIpv4AclGroup
                | Self::DashIpv6AclGroup
                | Self::DashIpv4AclRule
                | Self::DashIpv6AclRule
        )
    }

    /// Returns true for ACL table and group, tracked per stage/bind point.
    pub fn is_acl_resource(&self) -> bool {
        matches!(self, Self::AclTable | Self::AclGroup)
    }

    /// Returns true if this resource is tracked per ACL table.
    pub fn is_per_table_resource(&self) -> bool {
        matches!(self, Self::AclEntry | Self::AclCounter)
    }

    /// Returns true for DASH ACL groups.
    pub fn is_dash_acl_group(&self) -> bool {
        matches!(self, Self::DashIpv4AclGroup | Self::DashIpv6AclGroup)
    }

    /// Returns true for DASH ACL rules, tracked per group.
    pub fn is_dash_acl_rule(&self) -> bool {
        matches!(self, Self::DashIpv4AclRule | Self::DashIpv6AclRule)
    }

    /// Returns the rule resource tracked under a DASH ACL group resource.
    pub fn dash_acl_rule_of(&self) -> Option<CrmResourceType> {
        match self {
            Self::DashIpv4AclGroup => Some(Self::DashIpv4AclRule),
            Self::DashIpv6AclGroup => Some(Self::DashIpv6AclRule),
            _ => None,
        }
    }

    /// Returns true if the resource has a single switch-wide counter.
    pub fn is_global(&self) -> bool {
        matches!(
            self.availability_query(),
            AvailabilityQuery::Object { .. } | AvailabilityQuery::Switch(_)
        )
    }

    /// Returns how availability of this resource is queried.
    pub fn availability_query(&self) -> AvailabilityQuery {
        use AvailabilityQuery::*;
        use SwitchAvailableAttr as Sw;

        let object = |object_type, qualifiers: Vec<AvailabilityQualifier>, fallback| Object {
            object_type,
            qualifiers,
            fallback,
        };
        let v4 = || vec![AvailabilityQualifier::AddrFamily(AddrFamily::Ipv4)];
        let v6 = || vec![AvailabilityQualifier::AddrFamily(AddrFamily::Ipv6)];

        match self {
            Self::Ipv4Route => object(SaiObjectType::RouteEntry, v4(), Some(Sw::Ipv4RouteEntry)),
            Self::Ipv6Route => object(SaiObjectType::RouteEntry, v6(), Some(Sw::Ipv6RouteEntry)),
            Self::Ipv4Nexthop => Switch(Sw::Ipv4NexthopEntry),
            Self::Ipv6Nexthop => Switch(Sw::Ipv6NexthopEntry),
            Self::Ipv4Neighbor => {
                object(SaiObjectType::NeighborEntry, v4(), Some(Sw::Ipv4NeighborEntry))
            }
            Self::Ipv6Neighbor => {
                object(SaiObjectType::NeighborEntry, v6(), Some(Sw::Ipv6NeighborEntry))
            }
            Self::NexthopGroupMember => Switch(Sw::NextHopGroupMemberEntry),
            Self::NexthopGroup => {
                object(SaiObjectType::NextHopGroup, vec![], Some(Sw::NextHopGroupEntry))
            }
            Self::AclTable => AclResourceList(SaiAttrId::SwitchAvailableAclTable),
            Self::AclGroup => AclResourceList(SaiAttrId::SwitchAvailableAclTableGroup),
            Self::AclEntry => AclTableAttribute(SaiAttrId::AclTableAvailableEntry),
            Self::AclCounter => AclTableAttribute(SaiAttrId::AclTableAvailableCounter),
            Self::FdbEntry => object(SaiObjectType::FdbEntry, vec![], Some(Sw::FdbEntry)),
            Self::IpmcEntry => Switch(Sw::IpmcEntry),
            Self::SnatEntry => Switch(Sw::SnatEntry),
            Self::DnatEntry => Switch(Sw::DnatEntry),
            Self::MplsInseg => object(SaiObjectType::InsegEntry, vec![], None),
            Self::MplsNexthop => object(
                SaiObjectType::NextHop,
                vec![AvailabilityQualifier::NextHopType(NextHopType::Mpls)],
                None,
            ),
            Self::Srv6MySidEntry => object(SaiObjectType::MySidEntry, vec![], None),
            Self::Srv6Nexthop => object(
                SaiObjectType::NextHop,
                vec![AvailabilityQualifier::NextHopType(NextHopType::Srv6Sidlist)],
                None,
            ),
            Self::NexthopGroupMap => object(SaiObjectType::NextHopGroupMap, vec![], None),
            Self::ExtTable => ExtTable,
            Self::DashVnet => object(SaiObjectType::Vnet, vec![], None),
            Self::DashEni => object(SaiObjectType::Eni, vec![], None),
            Self::DashEniEtherAddressMap => {
                object(SaiObjectType::EniEtherAddressMapEntry, vec![], None)
            }
            Self::DashIpv4InboundRouting | Self::DashIpv6InboundRouting => {
                object(SaiObjectType::InboundRoutingEntry, vec![], None)
            }
            Self::DashIpv4OutboundRouting | Self::DashIpv6OutboundRouting => {
                object(SaiObjectType::OutboundRoutingEntry, vec![], None)
            }
            Self::DashIpv4PaValidation | Self::DashIpv6PaValidation => {
                object(SaiObjectType::PaValidationEntry, vec![], None)
            }
            Self::DashIpv4OutboundCaToPa | Self::DashIpv6OutboundCaToPa => {
                object(SaiObjectType::OutboundCaToPaEntry, vec![], None)
            }
            Self::DashIpv4AclGroup => object(SaiObjectType::DashAclGroup, v4(), None),
            Self::DashIpv6AclGroup => object(SaiObjectType::DashAclGroup, v6(), None),
            Self::DashIpv4AclRule | Self::DashIpv6AclRule => DashAclRule,
            Self::TwampEntry => Switch(Sw::TwampSession),
        }
    }

    /// Outbound routing resource for an address family.
    pub fn outbound_routing(family: AddrFamily) -> Self {
        match family {
            AddrFamily::Ipv4 => Self::DashIpv4OutboundRouting,
            AddrFamily::Ipv6 => Self::DashIpv6OutboundRouting,
        }
    }

    /// Inbound routing resource for an address family.
    pub fn inbound_routing(family: AddrFamily) -> Self {
        match family {
            AddrFamily::Ipv4 => Self::DashIpv4InboundRouting,
            AddrFamily::Ipv6 => Self::DashIpv6InboundRouting,
        }
    }

    /// PA validation resource for an address family.
    pub fn pa_validation(family: AddrFamily) -> Self {
        match family {
            AddrFamily::Ipv4 => Self::DashIpv4PaValidation,
            AddrFamily::Ipv6 => Self::DashIpv6PaValidation,
        }
    }

    /// Outbound CA-to-PA resource for an address family.
    pub fn outbound_ca_to_pa(family: AddrFamily) -> Self {
        match family {
            AddrFamily::Ipv4 => Self::DashIpv4OutboundCaToPa,
            AddrFamily::Ipv6 => Self::DashIpv6OutboundCaToPa,
        }
    }
}

impl FromStr for CrmResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.name() == lower)
            .ok_or_else(|| format!("Unknown CRM resource type: {}", s))
    }
}

impl fmt::Display for CrmResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// CRM threshold type for resource monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CrmThresholdType {
    /// Percentage of total capacity.
    #[default]
    Percentage,
    /// Absolute number of entries used.
    Used,
    /// Absolute number of entries available.
    Free,
}

impl CrmThresholdType {
    /// Returns the configuration value for this threshold type.
    pub fn config_value(&self) -> &'static str {
        match self {
            Self::Percentage => "percentage",
            Self::Used => "used",
            Self::Free => "free",
        }
    }

    /// Returns the tag used in threshold log messages.
    pub fn log_tag(&self) -> &'static str {
        match self {
            Self::Percentage => "TH_PERCENTAGE",
            Self::Used => "TH_USED",
            Self::Free => "TH_FREE",
        }
    }
}

impl FromStr for CrmThresholdType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "percentage" => Ok(Self::Percentage),
            "used" => Ok(Self::Used),
            "free" => Ok(Self::Free),
            _ => Err(format!("Unknown threshold type: {}", s)),
        }
    }
}

impl fmt::Display for CrmThresholdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.config_value())
    }
}

/// Checks a threshold pair against a threshold type.
pub fn validate_thresholds(
    threshold_type: CrmThresholdType,
    low: u32,
    high: u32,
) -> Result<(), String> {
    if low >= high {
        return Err(format!("low threshold {} must be below high threshold {}", low, high));
    }
    if threshold_type == CrmThresholdType::Percentage && high > 100 {
        return Err(format!("percentage threshold {} exceeds 100", high));
    }
    Ok(())
}

/// CRM resource support status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CrmResourceStatus {
    /// Resource is supported by the platform.
    #[default]
    Supported,
    /// Resource is not supported by the platform. Never reverts.
    NotSupported,
}

/// Sub-pool of a resource type.
///
/// `Display` gives the telemetry row the counter is published under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CrmSubKey {
    Global,
    Acl {
        stage: AclStage,
        bind_point: AclBindPoint,
    },
    AclTable(RawSaiObjectId),
    ExtTable(String),
    DashAclGroup(RawSaiObjectId),
}

impl CrmSubKey {
    /// Owning object of a per-table or per-group sub-pool.
    pub fn object_id(&self) -> Option<RawSaiObjectId> {
        match self {
            Self::AclTable(oid) | Self::DashAclGroup(oid) => Some(*oid),
            _ => None,
        }
    }
}

impl fmt::Display for CrmSubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str(CRM_COUNTERS_TABLE_KEY),
            Self::Acl { stage, bind_point } => write!(f, "ACL_STATS:{}:{}", stage, bind_point),
            Self::AclTable(oid) => write!(f, "ACL_TABLE_STATS:0x{:x}", oid),
            Self::ExtTable(name) => write!(f, "EXT_TABLE_STATS:{}", name),
            Self::DashAclGroup(oid) => write!(f, "DASH_ACL_GROUP_STATS:0x{:x}", oid),
        }
    }
}

/// Counter data for a single CRM sub-pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrmResourceCounter {
    /// SAI object ID (used for ACL tables, DASH ACL groups).
    pub id: RawSaiObjectId,
    /// Available entries.
    pub available: u32,
    /// Used entries.
    pub used: u32,
    /// Exceeded log counter (for rate limiting, max 10).
    pub exceeded_log_count: u32,
}

impl CrmResourceCounter {
    /// Creates a new counter with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a counter with a specific SAI object ID.
    pub fn with_id(id: RawSaiObjectId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    /// Returns the utilization percentage. Zero used is always 0%.
    pub fn utilization_percent(&self) -> u32 {
        if self.used == 0 {
            return 0;
        }
        let used = u64::from(self.used);
        let total = used + u64::from(self.available);
        // used > 0 keeps total non-zero and the ratio at most 100
        u32::try_from(used * 100 / total).unwrap_or(100)
    }

    /// Increments the used counter, returning the new value.
    pub fn increment_used(&mut self) -> u32 {
        self.used = self.used.saturating_add(1);
        self.used
    }

    /// Decrements the used counter, returning the new value.
    /// Returns None if the counter would underflow.
    pub fn decrement_used(&mut self) -> Option<u32> {
        self.used = self.used.checked_sub(1)?;
        Some(self.used)
    }

    /// Runs the hysteresis check for this counter.
    ///
    /// The exceeded count saturates at [`CRM_EXCEEDED_MSG_MAX`]; only the
    /// check that moves it off zero is reported as a crossing.
    pub fn check_threshold(
        &mut self,
        threshold_type: CrmThresholdType,
        low: u32,
        high: u32,
    ) -> ThresholdCheck {
        let percent = self.utilization_percent();
        let utilization = match threshold_type {
            CrmThresholdType::Percentage => u64::from(percent),
            CrmThresholdType::Used => u64::from(self.used),
            CrmThresholdType::Free => u64::from(self.available),
        };

        if utilization >= u64::from(high) && self.exceeded_log_count < CRM_EXCEEDED_MSG_MAX {
            let crossing = self.exceeded_log_count == 0;
            self.exceeded_log_count += 1;
            ThresholdCheck::Exceeded {
                utilization,
                percent,
                crossing,
            }
        } else if utilization <= u64::from(low) && self.exceeded_log_count > 0 && high != low {
            self.exceeded_log_count = 0;
            ThresholdCheck::Cleared {
                utilization,
                percent,
            }
        } else {
            ThresholdCheck::Normal
        }
    }
}

/// Maximum number of exceeded messages before rate limiting.
pub const CRM_EXCEEDED_MSG_MAX: u32 = 10;

/// Result of a threshold check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdCheck {
    /// Inside the band, already reported, or already cleared.
    Normal,
    /// At or above the high threshold.
    Exceeded {
        utilization: u64,
        percent: u32,
        crossing: bool,
    },
    /// Back at or below the low threshold after an excursion.
    Cleared { utilization: u64, percent: u32 },
}

/// Default low threshold percentage.
pub const DEFAULT_LOW_THRESHOLD: u32 = 70;

/// Default high threshold percentage.
pub const DEFAULT_HIGH_THRESHOLD: u32 = 85;

/// Default polling interval in seconds (5 minutes).
pub const DEFAULT_POLLING_INTERVAL: u64 = 5 * 60;

/// Counter table key for global/default resources.
pub const CRM_COUNTERS_TABLE_KEY: &str = "STATS";

/// Configuration table and key.
pub const CRM_CONFIG_TABLE: &str = "CRM";
pub const CRM_CONFIG_KEY: &str = "Config";

/// Configuration field of the polling interval, in seconds.
pub const CRM_POLLING_INTERVAL_FIELD: &str = "polling_interval";

/// CRM resource entry tracking thresholds and counters.
#[derive(Debug, Clone)]
pub struct CrmResourceEntry {
    /// Resource type.
    pub resource_type: CrmResourceType,
    /// Threshold type.
    pub threshold_type: CrmThresholdType,
    /// Low threshold value.
    pub low_threshold: u32,
    /// High threshold value.
    pub high_threshold: u32,
    /// Counters by sub-pool.
    pub counters: BTreeMap<CrmSubKey, CrmResourceCounter>,
    /// Resource support status.
    pub status: CrmResourceStatus,
}

impl CrmResourceEntry {
    /// Creates a new resource entry with default thresholds.
    pub fn new(resource_type: CrmResourceType) -> Self {
        let mut counters = BTreeMap::new();
        if resource_type.is_global() {
            counters.insert(CrmSubKey::Global, CrmResourceCounter::new());
        }
        Self {
            resource_type,
            threshold_type: CrmThresholdType::default(),
            low_threshold: DEFAULT_LOW_THRESHOLD,
            high_threshold: DEFAULT_HIGH_THRESHOLD,
            counters,
            status: CrmResourceStatus::default(),
        }
    }

    pub fn is_supported(&self) -> bool {
        self.status == CrmResourceStatus::Supported
    }

    /// Gets a counter by sub-key if it exists.
    pub fn counter(&self, key: &CrmSubKey) -> Option<&CrmResourceCounter> {
        self.counters.get(key)
    }

    /// Gets a mutable counter by sub-key if it exists.
    pub fn counter_mut(&mut self, key: &CrmSubKey) -> Option<&mut CrmResourceCounter> {
        self.counters.get_mut(key)
    }

    /// Returns the counter for a sub-pool, creating it with the owning
    /// object ID when first seen.
    pub fn ensure_counter(&mut self, key: CrmSubKey) -> &mut CrmResourceCounter {
        let id = key.object_id().unwrap_or_default();
        self.counters
            .entry(key)
            .or_insert_with(|| CrmResourceCounter::with_id(id))
    }

    /// Removes a counter by sub-key.
    pub fn remove_counter(&mut self, key: &CrmSubKey) -> Option<CrmResourceCounter> {
        self.counters.remove(key)
    }
}

/// CRM threshold field types for configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrmThresholdField {
    Type,
    Low,
    High,
}

impl CrmThresholdField {
    /// Returns the configuration field suffix.
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Type => "_threshold_type",
            Self::Low => "_low_threshold",
            Self::High => "_high_threshold",
        }
    }

    /// Splits a configuration field into resource and field type.
    pub fn parse_field(field: &str) -> Option<(CrmResourceType, CrmThresholdField)> {
        [Self::Type, Self::Low, Self::High]
            .into_iter()
            .find_map(|kind| {
                field
                    .strip_suffix(kind.suffix())
                    .and_then(|resource| resource.parse().ok())
                    .map(|resource| (resource, kind))
            })
    }
}
