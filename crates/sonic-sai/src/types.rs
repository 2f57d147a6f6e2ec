//! SAI object, attribute and qualifier types.
//!
//! Object IDs are strongly typed through a phantom kind parameter so a VNET
//! OID cannot be passed where an ENI OID is expected. Bulk requests and
//! availability queries use the untyped [`RawSaiObjectId`] because they cross
//! the driver boundary.

use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::net::IpAddr;

/// Raw SAI object ID type (matches sai_object_id_t in C).
pub type RawSaiObjectId = u64;

/// The null object ID (SAI_NULL_OBJECT_ID).
pub const SAI_NULL_OBJECT_ID: RawSaiObjectId = 0;

/// Marker trait for SAI object kinds.
pub trait SaiObjectKind: Send + Sync + 'static {
    /// Returns the SAI object type name for debugging.
    fn type_name() -> &'static str;
}

/// A type-safe SAI object ID.
///
/// # Examples
///
/// ```
/// use sonic_sai::{VnetOid, EniOid};
///
/// let vnet = VnetOid::from_raw(0x7a00000000001).unwrap();
/// let eni = EniOid::from_raw(0x7b00000000001).unwrap();
/// assert_ne!(vnet.as_raw(), eni.as_raw());
/// ```
#[derive(Clone, Copy)]
pub struct SaiObjectId<T: SaiObjectKind> {
    raw: RawSaiObjectId,
    _marker: PhantomData<T>,
}

impl<T: SaiObjectKind> SaiObjectId<T> {
    /// The null object ID.
    pub const NULL: Self = Self {
        raw: SAI_NULL_OBJECT_ID,
        _marker: PhantomData,
    };

    /// Creates a new object ID from a raw value.
    ///
    /// Returns `None` if the raw value is the null object ID.
    pub fn from_raw(raw: RawSaiObjectId) -> Option<Self> {
        if raw == SAI_NULL_OBJECT_ID {
            None
        } else {
            Some(Self {
                raw,
                _marker: PhantomData,
            })
        }
    }

    /// Returns the raw object ID value.
    pub const fn as_raw(&self) -> RawSaiObjectId {
        self.raw
    }

    /// Returns true if this is a null object ID.
    pub const fn is_null(&self) -> bool {
        self.raw == SAI_NULL_OBJECT_ID
    }
}

impl<T: SaiObjectKind> fmt::Debug for SaiObjectId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:016x})", T::type_name(), self.raw)
    }
}

impl<T: SaiObjectKind> fmt::Display for SaiObjectId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.raw)
    }
}

impl<T: SaiObjectKind> PartialEq for SaiObjectId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T: SaiObjectKind> Eq for SaiObjectId<T> {}

impl<T: SaiObjectKind> Hash for SaiObjectId<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

macro_rules! define_object_kind {
    ($name:ident, $type_name:literal, $oid_alias:ident) => {
        #[doc = concat!("Marker type for SAI ", $type_name, " objects.")]
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl SaiObjectKind for $name {
            fn type_name() -> &'static str {
                $type_name
            }
        }

        #[doc = concat!("Type alias for ", $type_name, " object IDs.")]
        pub type $oid_alias = SaiObjectId<$name>;
    };
}

define_object_kind!(SwitchKind, "Switch", SwitchOid);
define_object_kind!(AclTableKind, "AclTable", AclTableOid);
define_object_kind!(VnetKind, "Vnet", VnetOid);
define_object_kind!(EniKind, "Eni", EniOid);
define_object_kind!(DashAclGroupKind, "DashAclGroup", DashAclGroupOid);

/// SAI object types the agent programs or queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SaiObjectType {
    RouteEntry,
    NeighborEntry,
    NextHop,
    NextHopGroup,
    NextHopGroupMap,
    FdbEntry,
    InsegEntry,
    MySidEntry,
    GenericProgrammable,
    AclTable,
    Vnet,
    Eni,
    EniEtherAddressMapEntry,
    InboundRoutingEntry,
    OutboundRoutingEntry,
    PaValidationEntry,
    OutboundCaToPaEntry,
    DashAclGroup,
    DashAclRule,
}

impl SaiObjectType {
    /// Returns true if objects of this type are addressed by an entry key
    /// rather than a driver-allocated OID.
    pub fn is_entry(&self) -> bool {
        matches!(
            self,
            Self::RouteEntry
                | Self::NeighborEntry
                | Self::FdbEntry
                | Self::InsegEntry
                | Self::MySidEntry
                | Self::EniEtherAddressMapEntry
                | Self::InboundRoutingEntry
                | Self::OutboundRoutingEntry
                | Self::PaValidationEntry
                | Self::OutboundCaToPaEntry
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RouteEntry => "SAI_OBJECT_TYPE_ROUTE_ENTRY",
            Self::NeighborEntry => "SAI_OBJECT_TYPE_NEIGHBOR_ENTRY",
            Self::NextHop => "SAI_OBJECT_TYPE_NEXT_HOP",
            Self::NextHopGroup => "SAI_OBJECT_TYPE_NEXT_HOP_GROUP",
            Self::NextHopGroupMap => "SAI_OBJECT_TYPE_NEXT_HOP_GROUP_MAP",
            Self::FdbEntry => "SAI_OBJECT_TYPE_FDB_ENTRY",
            Self::InsegEntry => "SAI_OBJECT_TYPE_INSEG_ENTRY",
            Self::MySidEntry => "SAI_OBJECT_TYPE_MY_SID_ENTRY",
            Self::GenericProgrammable => "SAI_OBJECT_TYPE_GENERIC_PROGRAMMABLE",
            Self::AclTable => "SAI_OBJECT_TYPE_ACL_TABLE",
            Self::Vnet => "SAI_OBJECT_TYPE_VNET",
            Self::Eni => "SAI_OBJECT_TYPE_ENI",
            Self::EniEtherAddressMapEntry => "SAI_OBJECT_TYPE_ENI_ETHER_ADDRESS_MAP_ENTRY",
            Self::InboundRoutingEntry => "SAI_OBJECT_TYPE_INBOUND_ROUTING_ENTRY",
            Self::OutboundRoutingEntry => "SAI_OBJECT_TYPE_OUTBOUND_ROUTING_ENTRY",
            Self::PaValidationEntry => "SAI_OBJECT_TYPE_PA_VALIDATION_ENTRY",
            Self::OutboundCaToPaEntry => "SAI_OBJECT_TYPE_OUTBOUND_CA_TO_PA_ENTRY",
            Self::DashAclGroup => "SAI_OBJECT_TYPE_DASH_ACL_GROUP",
            Self::DashAclRule => "SAI_OBJECT_TYPE_DASH_ACL_RULE",
        }
    }
}

impl fmt::Display for SaiObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of an object to remove: a driver OID or an entry key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SaiObjectKey {
    Oid(RawSaiObjectId),
    Entry(String),
}

impl fmt::Display for SaiObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Oid(oid) => write!(f, "0x{:x}", oid),
            Self::Entry(entry) => f.write_str(entry),
        }
    }
}

/// IP address family qualifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AddrFamily {
    Ipv4,
    Ipv6,
}

impl AddrFamily {
    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => Self::Ipv4,
            IpAddr::V6(_) => Self::Ipv6,
        }
    }
}

/// Next-hop type qualifier used by availability queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NextHopType {
    Mpls,
    Srv6Sidlist,
}

/// ACL stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AclStage {
    Ingress,
    Egress,
}

impl AclStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ingress => "INGRESS",
            Self::Egress => "EGRESS",
        }
    }
}

impl fmt::Display for AclStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ACL bind point type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AclBindPoint {
    Port,
    Lag,
    Vlan,
    Rif,
    Switch,
}

impl AclBindPoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Port => "PORT",
            Self::Lag => "LAG",
            Self::Vlan => "VLAN",
            Self::Rif => "RIF",
            Self::Switch => "SWITCH",
        }
    }
}

impl fmt::Display for AclBindPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One element of the switch ACL resource availability list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AclResource {
    pub stage: AclStage,
    pub bind_point: AclBindPoint,
    pub avail_num: u32,
}

/// Switch attributes reporting remaining capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwitchAvailableAttr {
    Ipv4RouteEntry,
    Ipv6RouteEntry,
    Ipv4NexthopEntry,
    Ipv6NexthopEntry,
    Ipv4NeighborEntry,
    Ipv6NeighborEntry,
    NextHopGroupMemberEntry,
    NextHopGroupEntry,
    FdbEntry,
    IpmcEntry,
    SnatEntry,
    DnatEntry,
    TwampSession,
}

/// Attribute identifiers the agent reads back from the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaiAttrId {
    /// A scalar switch capacity attribute.
    SwitchAvailable(SwitchAvailableAttr),
    /// `SAI_SWITCH_ATTR_AVAILABLE_ACL_TABLE`, a list per stage/bind point.
    SwitchAvailableAclTable,
    /// `SAI_SWITCH_ATTR_AVAILABLE_ACL_TABLE_GROUP`.
    SwitchAvailableAclTableGroup,
    /// `SAI_ACL_TABLE_ATTR_AVAILABLE_ACL_ENTRY`, read on an ACL table OID.
    AclTableAvailableEntry,
    /// `SAI_ACL_TABLE_ATTR_AVAILABLE_ACL_COUNTER`.
    AclTableAvailableCounter,
}

/// Attribute values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaiAttrValue {
    Bool(bool),
    U32(u32),
    U64(u64),
    Oid(RawSaiObjectId),
    IpAddr(IpAddr),
    Mac([u8; 6]),
    Str(String),
    AclResourceList(Vec<AclResource>),
}

impl SaiAttrValue {
    /// Returns the value as a count, if it is scalar.
    pub fn as_count(&self) -> Option<u64> {
        match self {
            Self::U32(v) => Some(u64::from(*v)),
            Self::U64(v) => Some(*v),
            _ => None,
        }
    }
}

/// A named attribute in a create request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaiAttribute {
    pub id: &'static str,
    pub value: SaiAttrValue,
}

impl SaiAttribute {
    pub fn new(id: &'static str, value: SaiAttrValue) -> Self {
        Self { id, value }
    }
}

/// Extra qualifiers narrowing an availability query to one sub-pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvailabilityQualifier {
    AddrFamily(AddrFamily),
    NextHopType(NextHopType),
    ObjectName(String),
    DashAclGroup(RawSaiObjectId),
}
