//! DASH route orchestration logic.

use std::sync::Arc;

use log::info;
use sonic_orch_common::{
    interpret, reconcile, AuthoritativeTable, BulkTable, CommitDecision, Consumer,
    ConsumerConfig, KeyOpFieldsValues, OperationKind, Orch, ReconcileSummary, StageOutcome,
};
use sonic_sai::{
    BulkHandle, CreateRequest, EntityBulker, SaiAttrValue, SaiAttribute, SaiGateway,
    SaiObjectKey, SaiObjectType, SaiResult, SaiStatus, DEFAULT_MAX_BULK_SIZE,
};

use super::types::{
    inbound_routing_entry_key, outbound_routing_entry_key, RouteConfig, RouteEntry, RouteKey,
    RouteRuleConfig, RouteRuleEntry, RouteRuleKey, DASH_ROUTE_RULE_TABLE, DASH_ROUTE_TABLE,
};
use crate::crm::CrmResourceType;
use crate::orch::OrchContext;

/// Run order of the DASH route orch in the daemon.
pub const ROUTE_ORCH_PRIORITY: i32 = 30;

/// Staged route or route rule operation.
#[derive(Debug)]
pub enum RouteOp<E> {
    Create { handle: BulkHandle, entry: E },
    Remove { handle: BulkHandle },
}

/// Programmed outbound routes.
#[derive(Debug)]
pub struct RouteTable {
    bulker: EntityBulker,
    routes: AuthoritativeTable<RouteEntry>,
}

impl RouteTable {
    pub fn new(max_bulk_size: usize) -> Self {
        Self {
            bulker: EntityBulker::new(SaiObjectType::OutboundRoutingEntry, max_bulk_size),
            routes: AuthoritativeTable::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&RouteEntry> {
        self.routes.get(key)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    fn stage_set(
        &mut self,
        entry: &KeyOpFieldsValues,
        ctx: &OrchContext,
    ) -> StageOutcome<RouteOp<RouteEntry>> {
        if self.routes.contains(&entry.key) {
            return StageOutcome::Done;
        }
        let key: RouteKey = match entry.key.parse() {
            Ok(key) => key,
            Err(e) => return StageOutcome::invalid(e),
        };
        let config = match RouteConfig::from_entry(entry) {
            Ok(config) => config,
            Err(e) => return StageOutcome::invalid(e),
        };
        let Some(eni_oid) = ctx.eni_oid(&key.eni) else {
            return StageOutcome::waiting_for(format!("ENI {}", key.eni));
        };
        let dst_vnet_oid = match &config.vnet {
            Some(vnet) => match ctx.vnet_oid(vnet) {
                Some(oid) => Some(oid),
                None => return StageOutcome::waiting_for(format!("VNET {}", vnet)),
            },
            None => None,
        };

        let mut attrs = vec![SaiAttribute::new(
            "SAI_OUTBOUND_ROUTING_ENTRY_ATTR_ACTION",
            SaiAttrValue::Str(config.action.as_sai_str().to_string()),
        )];
        if let Some(oid) = dst_vnet_oid {
            attrs.push(SaiAttribute::new(
                "SAI_OUTBOUND_ROUTING_ENTRY_ATTR_DST_VNET_ID",
                SaiAttrValue::Oid(oid.as_raw()),
            ));
        }
        if let Some(overlay_ip) = config.overlay_ip {
            attrs.push(SaiAttribute::new(
                "SAI_OUTBOUND_ROUTING_ENTRY_ATTR_OVERLAY_IP",
                SaiAttrValue::IpAddr(overlay_ip),
            ));
        }

        let entry_key = outbound_routing_entry_key(eni_oid, &key.prefix);
        let handle = self
            .bulker
            .stage_create(CreateRequest::entry(entry_key.clone(), attrs));
        StageOutcome::Staged(RouteOp::Create {
            handle,
            entry: RouteEntry {
                eni_oid,
                dst_vnet_oid,
                prefix: key.prefix,
                config,
                entry_key,
            },
        })
    }
}

impl BulkTable for RouteTable {
    type Context = RouteOp<RouteEntry>;
    type Env = OrchContext;

    fn table_name(&self) -> &str {
        DASH_ROUTE_TABLE
    }

    fn stage(
        &mut self,
        entry: &KeyOpFieldsValues,
        ctx: &OrchContext,
    ) -> StageOutcome<Self::Context> {
        if entry.op.is_set() {
            return self.stage_set(entry, ctx);
        }
        let Some(route) = self.routes.get(&entry.key) else {
            return StageOutcome::Done;
        };
        let handle = self
            .bulker
            .stage_remove(SaiObjectKey::Entry(route.entry_key.clone()));
        StageOutcome::Staged(RouteOp::Remove { handle })
    }

    fn flush(&mut self, gateway: &dyn SaiGateway) -> SaiResult<()> {
        self.bulker.flush(gateway)
    }

    fn commit(
        &mut self,
        entry: &KeyOpFieldsValues,
        op: Self::Context,
        ctx: &mut OrchContext,
    ) -> CommitDecision {
        match op {
            RouteOp::Create { handle, entry: route } => {
                let status = self.bulker.status(handle).unwrap_or(SaiStatus::NotExecuted);
                let decision = interpret(OperationKind::Create, status);
                if decision == CommitDecision::Commit {
                    ctx.crm_increment(CrmResourceType::outbound_routing(route.prefix.family()));
                    info!("Outbound route {} created", entry.key);
                    self.routes.insert(entry.key.clone(), route);
                }
                decision
            }
            RouteOp::Remove { handle } => {
                let status = self.bulker.status(handle).unwrap_or(SaiStatus::NotExecuted);
                let decision = interpret(OperationKind::Remove, status);
                if decision == CommitDecision::Commit {
                    if let Some(route) = self.routes.remove(&entry.key) {
                        ctx.crm_decrement(CrmResourceType::outbound_routing(route.prefix.family()));
                        info!("Outbound route {} removed", entry.key);
                    }
                }
                decision
            }
        }
    }

    fn end_pass(&mut self) {
        self.bulker.clear();
    }
}

/// Programmed inbound route rules.
#[derive(Debug)]
pub struct RouteRuleTable {
    bulker: EntityBulker,
    rules: AuthoritativeTable<RouteRuleEntry>,
}

impl RouteRuleTable {
    pub fn new(max_bulk_size: usize) -> Self {
        Self {
            bulker: EntityBulker::new(SaiObjectType::InboundRoutingEntry, max_bulk_size),
            rules: AuthoritativeTable::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&RouteRuleEntry> {
        self.rules.get(key)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn stage_set(
        &mut self,
        entry: &KeyOpFieldsValues,
        ctx: &OrchContext,
    ) -> StageOutcome<RouteOp<RouteRuleEntry>> {
        if self.rules.contains(&entry.key) {
            return StageOutcome::Done;
        }
        let key: RouteRuleKey = match entry.key.parse() {
            Ok(key) => key,
            Err(e) => return StageOutcome::invalid(e),
        };
        let config = match RouteRuleConfig::from_entry(entry) {
            Ok(config) => config,
            Err(e) => return StageOutcome::invalid(e),
        };
        let Some(eni_oid) = ctx.eni_oid(&key.eni) else {
            return StageOutcome::waiting_for(format!("ENI {}", key.eni));
        };
        let src_vnet_oid = match &config.vnet {
            Some(vnet) => match ctx.vnet_oid(vnet) {
                Some(oid) => Some(oid),
                None => return StageOutcome::waiting_for(format!("VNET {}", vnet)),
            },
            None => None,
        };

        let mut attrs = vec![
            SaiAttribute::new(
                "SAI_INBOUND_ROUTING_ENTRY_ATTR_ACTION",
                SaiAttrValue::Str(config.action.as_sai_str().to_string()),
            ),
            SaiAttribute::new(
                "SAI_INBOUND_ROUTING_ENTRY_ATTR_PRIORITY",
                SaiAttrValue::U32(config.priority),
            ),
        ];
        if let Some(oid) = src_vnet_oid {
            attrs.push(SaiAttribute::new(
                "SAI_INBOUND_ROUTING_ENTRY_ATTR_SRC_VNET_ID",
                SaiAttrValue::Oid(oid.as_raw()),
            ));
        }

        let entry_key = inbound_routing_entry_key(eni_oid, key.vni, &key.prefix);
        let handle = self
            .bulker
            .stage_create(CreateRequest::entry(entry_key.clone(), attrs));
        StageOutcome::Staged(RouteOp::Create {
            handle,
            entry: RouteRuleEntry {
                eni_oid,
                src_vnet_oid,
                vni: key.vni,
                prefix: key.prefix,
                config,
                entry_key,
            },
        })
    }
}

impl BulkTable for RouteRuleTable {
    type Context = RouteOp<RouteRuleEntry>;
    type Env = OrchContext;

    fn table_name(&self) -> &str {
        DASH_ROUTE_RULE_TABLE
    }

    fn stage(
        &mut self,
        entry: &KeyOpFieldsValues,
        ctx: &OrchContext,
    ) -> StageOutcome<Self::Context> {
        if entry.op.is_set() {
            return self.stage_set(entry, ctx);
        }
        let Some(rule) = self.rules.get(&entry.key) else {
            return StageOutcome::Done;
        };
        let handle = self
            .bulker
            .stage_remove(SaiObjectKey::Entry(rule.entry_key.clone()));
        StageOutcome::Staged(RouteOp::Remove { handle })
    }

    fn flush(&mut self, gateway: &dyn SaiGateway) -> SaiResult<()> {
        self.bulker.flush(gateway)
    }

    fn commit(
        &mut self,
        entry: &KeyOpFieldsValues,
        op: Self::Context,
        ctx: &mut OrchContext,
    ) -> CommitDecision {
        match op {
            RouteOp::Create { handle, entry: rule } => {
                let status = self.bulker.status(handle).unwrap_or(SaiStatus::NotExecuted);
                let decision = interpret(OperationKind::Create, status);
                if decision == CommitDecision::Commit {
                    ctx.crm_increment(CrmResourceType::inbound_routing(rule.prefix.family()));
                    info!("Inbound route rule {} created", entry.key);
                    self.rules.insert(entry.key.clone(), rule);
                }
                decision
            }
            RouteOp::Remove { handle } => {
                let status = self.bulker.status(handle).unwrap_or(SaiStatus::NotExecuted);
                let decision = interpret(OperationKind::Remove, status);
                if decision == CommitDecision::Commit {
                    if let Some(rule) = self.rules.remove(&entry.key) {
                        ctx.crm_decrement(CrmResourceType::inbound_routing(rule.prefix.family()));
                        info!("Inbound route rule {} removed", entry.key);
                    }
                }
                decision
            }
        }
    }

    fn end_pass(&mut self) {
        self.bulker.clear();
    }
}

/// Owns DASH_ROUTE_TABLE and DASH_ROUTE_RULE_TABLE.
#[derive(Debug)]
pub struct RouteOrch {
    route_consumer: Consumer,
    rule_consumer: Consumer,
    routes: RouteTable,
    rules: RouteRuleTable,
}

impl RouteOrch {
    pub fn new(batch_size: usize) -> Self {
        Self {
            route_consumer: Consumer::new(
                ConsumerConfig::new(DASH_ROUTE_TABLE)
                    .with_priority(ROUTE_ORCH_PRIORITY)
                    .with_batch_size(batch_size),
            ),
            rule_consumer: Consumer::new(
                ConsumerConfig::new(DASH_ROUTE_RULE_TABLE)
                    .with_priority(ROUTE_ORCH_PRIORITY)
                    .with_batch_size(batch_size),
            ),
            routes: RouteTable::new(DEFAULT_MAX_BULK_SIZE),
            rules: RouteRuleTable::new(DEFAULT_MAX_BULK_SIZE),
        }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn rules(&self) -> &RouteRuleTable {
        &self.rules
    }
}

impl Orch<OrchContext> for RouteOrch {
    fn name(&self) -> &str {
        "DashRouteOrch"
    }

    fn consumes(&self, table: &str) -> bool {
        table == DASH_ROUTE_TABLE || table == DASH_ROUTE_RULE_TABLE
    }

    fn add_to_sync(&mut self, table: &str, entries: Vec<KeyOpFieldsValues>) {
        if table == DASH_ROUTE_TABLE {
            self.route_consumer.add_to_sync(entries);
        } else if table == DASH_ROUTE_RULE_TABLE {
            self.rule_consumer.add_to_sync(entries);
        }
    }

    fn do_task(&mut self, ctx: &mut OrchContext) -> SaiResult<ReconcileSummary> {
        let gateway = Arc::clone(&ctx.gateway);
        let mut summary = reconcile(
            &mut self.route_consumer,
            &mut self.routes,
            ctx,
            gateway.as_ref(),
        )?;
        summary.merge(&reconcile(
            &mut self.rule_consumer,
            &mut self.rules,
            ctx,
            gateway.as_ref(),
        )?);
        Ok(summary)
    }

    fn priority(&self) -> i32 {
        ROUTE_ORCH_PRIORITY
    }

    fn has_pending_tasks(&self) -> bool {
        self.route_consumer.has_pending() || self.rule_consumer.has_pending()
    }

    fn dump_pending_tasks(&self) -> Vec<String> {
        let mut tasks = self.route_consumer.dump();
        tasks.extend(self.rule_consumer.dump());
        tasks
    }
}
