//! DASH outbound routing and inbound route rules.
//!
//! `DASH_ROUTE_TABLE|<eni>:<prefix>` programs an outbound routing entry of
//! an ENI; `DASH_ROUTE_RULE_TABLE|<eni>:<vni>:<prefix>` programs an inbound
//! routing entry. Both wait for their ENI (and VNET, when one is named) to
//! be programmed first.

mod orch;
mod types;

pub use orch::{RouteOp, RouteOrch, RouteRuleTable, RouteTable, ROUTE_ORCH_PRIORITY};
pub use types::{
    inbound_routing_entry_key, outbound_routing_entry_key, RouteActionType, RouteConfig,
    RouteEntry, RouteKey, RouteRuleAction, RouteRuleConfig, RouteRuleEntry, RouteRuleKey,
    DASH_ROUTE_RULE_TABLE, DASH_ROUTE_TABLE,
};
