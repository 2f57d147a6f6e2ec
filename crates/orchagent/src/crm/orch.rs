//! CrmOrch implementation.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use sonic_sai::{
    AclBindPoint, AclStage, AvailabilityQualifier, RawSaiObjectId, SaiAttrId, SaiAttrValue,
    SaiGateway, SaiObjectType, SaiStatus,
};
use thiserror::Error;

use super::sink::{CountersTable, CrmThresholdEvent, ThresholdEventKind, ThresholdEventSink};
use super::types::{
    validate_thresholds, AvailabilityQuery, CrmResourceEntry, CrmResourceStatus,
    CrmResourceType, CrmSubKey, CrmThresholdField, CrmThresholdType, ThresholdCheck,
    CRM_COUNTERS_TABLE_KEY, CRM_POLLING_INTERVAL_FIELD, DEFAULT_POLLING_INTERVAL,
};

/// CRM orchestrator error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CrmOrchError {
    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),

    #[error("Counter underflow: {resource} {subkey}")]
    CounterUnderflow {
        resource: CrmResourceType,
        subkey: String,
    },

    #[error("Counter not found: {resource} {subkey}")]
    CounterNotFound {
        resource: CrmResourceType,
        subkey: String,
    },

    #[error("{resource} cannot be used for {operation}")]
    InvalidResource {
        resource: CrmResourceType,
        operation: &'static str,
    },

    #[error("Parse error: {0}")]
    Parse(String),
}

/// CRM orchestrator configuration.
#[derive(Debug, Clone)]
pub struct CrmOrchConfig {
    /// Polling interval for resource monitoring.
    pub polling_interval: Duration,
}

impl Default for CrmOrchConfig {
    fn default() -> Self {
        Self {
            polling_interval: Duration::from_secs(DEFAULT_POLLING_INTERVAL),
        }
    }
}

impl CrmOrchConfig {
    /// Creates a new config with the given polling interval.
    pub fn with_polling_interval(interval: Duration) -> Self {
        Self {
            polling_interval: interval,
        }
    }
}

/// CRM orchestrator statistics.
#[derive(Debug, Clone, Default)]
pub struct CrmOrchStats {
    /// Number of timer expirations processed.
    pub timer_expirations: u64,
    /// Number of threshold events published.
    pub threshold_events: u64,
    /// Number of configuration updates processed.
    pub config_updates: u64,
    /// Number of resource increments.
    pub increments: u64,
    /// Number of resource decrements.
    pub decrements: u64,
}

/// Threshold settings gathered from one configuration batch.
#[derive(Debug, Clone, Copy)]
struct PendingThresholds {
    threshold_type: CrmThresholdType,
    low: u32,
    high: u32,
}

/// CRM orchestrator for capacity resource management.
///
/// Owns the used/available accounting of every tracked hardware table. The
/// `used` side only moves through the increment/decrement API, called by
/// the object orchs when a hardware create or remove is committed; the
/// `available` side is refreshed from the driver on every timer tick.
pub struct CrmOrch {
    config: CrmOrchConfig,
    resources: BTreeMap<CrmResourceType, CrmResourceEntry>,
    gateway: Arc<dyn SaiGateway>,
    counters_table: Arc<dyn CountersTable>,
    events: Arc<dyn ThresholdEventSink>,
    stats: CrmOrchStats,
}

impl std::fmt::Debug for CrmOrch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrmOrch")
            .field("config", &self.config)
            .field("resources_count", &self.resources.len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl CrmOrch {
    /// Creates a new CrmOrch tracking every resource type.
    pub fn new(
        config: CrmOrchConfig,
        gateway: Arc<dyn SaiGateway>,
        counters_table: Arc<dyn CountersTable>,
        events: Arc<dyn ThresholdEventSink>,
    ) -> Self {
        let resources = CrmResourceType::ALL
            .iter()
            .map(|&res_type| (res_type, CrmResourceEntry::new(res_type)))
            .collect();

        // Stale global row from a previous run
        counters_table.del(CRM_COUNTERS_TABLE_KEY);

        Self {
            config,
            resources,
            gateway,
            counters_table,
            events,
            stats: CrmOrchStats::default(),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CrmOrchConfig {
        &self.config
    }

    /// Returns the polling interval.
    pub fn polling_interval(&self) -> Duration {
        self.config.polling_interval
    }

    /// Sets the polling interval.
    pub fn set_polling_interval(&mut self, interval: Duration) {
        self.config.polling_interval = interval;
        self.stats.config_updates += 1;
    }

    /// Returns the statistics.
    pub fn stats(&self) -> &CrmOrchStats {
        &self.stats
    }

    /// Gets a resource entry by type.
    pub fn resource(&self, resource_type: CrmResourceType) -> Option<&CrmResourceEntry> {
        self.resources.get(&resource_type)
    }

    /// Returns the used count of one sub-pool.
    pub fn used(&self, resource_type: CrmResourceType, subkey: &CrmSubKey) -> Option<u32> {
        self.resource(resource_type)
            .and_then(|entry| entry.counter(subkey))
            .map(|counter| counter.used)
    }

    /// Returns the available count of one sub-pool.
    pub fn available(&self, resource_type: CrmResourceType, subkey: &CrmSubKey) -> Option<u32> {
        self.resource(resource_type)
            .and_then(|entry| entry.counter(subkey))
            .map(|counter| counter.available)
    }

    /// Returns the switch-wide used count of a resource.
    pub fn global_used(&self, resource_type: CrmResourceType) -> Option<u32> {
        self.used(resource_type, &CrmSubKey::Global)
    }

    fn entry_mut(
        &mut self,
        resource_type: CrmResourceType,
    ) -> Result<&mut CrmResourceEntry, CrmOrchError> {
        self.resources
            .get_mut(&resource_type)
            .ok_or(CrmOrchError::InvalidResource {
                resource: resource_type,
                operation: "accounting",
            })
    }

    // ========== Counter Increment/Decrement Operations ==========

    fn increment(
        &mut self,
        resource_type: CrmResourceType,
        subkey: CrmSubKey,
    ) -> Result<u32, CrmOrchError> {
        let used = self.entry_mut(resource_type)?.ensure_counter(subkey).increment_used();
        self.stats.increments += 1;
        Ok(used)
    }

    fn decrement(
        &mut self,
        resource_type: CrmResourceType,
        subkey: &CrmSubKey,
    ) -> Result<u32, CrmOrchError> {
        let counter = match self.entry_mut(resource_type)?.counter_mut(subkey) {
            Some(counter) => counter,
            None => {
                error!(
                    "Failed to decrement {} {}: no such counter",
                    resource_type.log_name(),
                    subkey
                );
                return Err(CrmOrchError::CounterNotFound {
                    resource: resource_type,
                    subkey: subkey.to_string(),
                });
            }
        };

        match counter.decrement_used() {
            Some(used) => {
                self.stats.decrements += 1;
                Ok(used)
            }
            None => {
                error!(
                    "Failed to decrement {} {}: used count is already 0",
                    resource_type.log_name(),
                    subkey
                );
                Err(CrmOrchError::CounterUnderflow {
                    resource: resource_type,
                    subkey: subkey.to_string(),
                })
            }
        }
    }

    fn require(
        resource_type: CrmResourceType,
        ok: bool,
        operation: &'static str,
    ) -> Result<(), CrmOrchError> {
        if ok {
            Ok(())
        } else {
            Err(CrmOrchError::InvalidResource {
                resource: resource_type,
                operation,
            })
        }
    }

    /// Increments the used counter for a global resource.
    pub fn increment_used(&mut self, resource_type: CrmResourceType) -> Result<u32, CrmOrchError> {
        Self::require(resource_type, resource_type.is_global(), "global accounting")?;
        self.increment(resource_type, CrmSubKey::Global)
    }

    /// Decrements the used counter for a global resource.
    pub fn decrement_used(&mut self, resource_type: CrmResourceType) -> Result<u32, CrmOrchError> {
        Self::require(resource_type, resource_type.is_global(), "global accounting")?;
        self.decrement(resource_type, &CrmSubKey::Global)
    }

    /// Increments the used counter for an ACL resource (table/group).
    pub fn increment_acl_used(
        &mut self,
        resource_type: CrmResourceType,
        stage: AclStage,
        bind_point: AclBindPoint,
    ) -> Result<u32, CrmOrchError> {
        Self::require(resource_type, resource_type.is_acl_resource(), "ACL accounting")?;
        self.increment(resource_type, CrmSubKey::Acl { stage, bind_point })
    }

    /// Decrements the used counter for an ACL resource.
    ///
    /// Decrementing an ACL table also drops the entry and counter sub-pools
    /// of `table_id` together with their telemetry row.
    pub fn decrement_acl_used(
        &mut self,
        resource_type: CrmResourceType,
        stage: AclStage,
        bind_point: AclBindPoint,
        table_id: RawSaiObjectId,
    ) -> Result<u32, CrmOrchError> {
        Self::require(resource_type, resource_type.is_acl_resource(), "ACL accounting")?;
        let result = self.decrement(resource_type, &CrmSubKey::Acl { stage, bind_point });

        if resource_type == CrmResourceType::AclTable && table_id != 0 {
            let subkey = CrmSubKey::AclTable(table_id);
            for per_table in [CrmResourceType::AclEntry, CrmResourceType::AclCounter] {
                if let Some(entry) = self.resources.get_mut(&per_table) {
                    entry.remove_counter(&subkey);
                }
            }
            self.counters_table.del(&subkey.to_string());
        }

        result
    }

    /// Increments the used counter for a per-table ACL resource.
    pub fn increment_acl_table_used(
        &mut self,
        resource_type: CrmResourceType,
        table_id: RawSaiObjectId,
    ) -> Result<u32, CrmOrchError> {
        Self::require(resource_type, resource_type.is_per_table_resource(), "ACL table accounting")?;
        self.increment(resource_type, CrmSubKey::AclTable(table_id))
    }

    /// Decrements the used counter for a per-table ACL resource.
    pub fn decrement_acl_table_used(
        &mut self,
        resource_type: CrmResourceType,
        table_id: RawSaiObjectId,
    ) -> Result<u32, CrmOrchError> {
        Self::require(resource_type, resource_type.is_per_table_resource(), "ACL table accounting")?;
        self.decrement(resource_type, &CrmSubKey::AclTable(table_id))
    }

    /// Increments the used counter for an extension table.
    pub fn increment_ext_table_used(&mut self, table_name: &str) -> Result<u32, CrmOrchError> {
        self.increment(
            CrmResourceType::ExtTable,
            CrmSubKey::ExtTable(table_name.to_string()),
        )
    }

    /// Decrements the used counter for an extension table.
    pub fn decrement_ext_table_used(&mut self, table_name: &str) -> Result<u32, CrmOrchError> {
        self.decrement(
            CrmResourceType::ExtTable,
            &CrmSubKey::ExtTable(table_name.to_string()),
        )
    }

    /// Increments the used counter for a DASH ACL group or rule.
    ///
    /// A new group also gets an empty rule sub-pool so its rule capacity is
    /// polled before the first rule is added.
    pub fn increment_dash_acl_used(
        &mut self,
        resource_type: CrmResourceType,
        group_id: RawSaiObjectId,
    ) -> Result<u32, CrmOrchError> {
        if let Some(rule_type) = resource_type.dash_acl_rule_of() {
            let used = self.increment(resource_type, CrmSubKey::Global)?;
            self.entry_mut(rule_type)?
                .ensure_counter(CrmSubKey::DashAclGroup(group_id));
            return Ok(used);
        }

        Self::require(resource_type, resource_type.is_dash_acl_rule(), "DASH ACL accounting")?;
        self.increment(resource_type, CrmSubKey::DashAclGroup(group_id))
    }

    /// Decrements the used counter for a DASH ACL group or rule.
    ///
    /// Removing a group drops its rule sub-pool and telemetry row.
    pub fn decrement_dash_acl_used(
        &mut self,
        resource_type: CrmResourceType,
        group_id: RawSaiObjectId,
    ) -> Result<u32, CrmOrchError> {
        if let Some(rule_type) = resource_type.dash_acl_rule_of() {
            let result = self.decrement(resource_type, &CrmSubKey::Global);
            let subkey = CrmSubKey::DashAclGroup(group_id);
            self.entry_mut(rule_type)?.remove_counter(&subkey);
            self.counters_table.del(&subkey.to_string());
            return result;
        }

        Self::require(resource_type, resource_type.is_dash_acl_rule(), "DASH ACL accounting")?;
        self.decrement(resource_type, &CrmSubKey::DashAclGroup(group_id))
    }

    // ========== Configuration Operations ==========

    /// Sets the threshold type for a resource.
    ///
    /// Changing the type re-arms the exceeded state of every sub-pool.
    pub fn set_threshold_type(
        &mut self,
        resource_type: CrmResourceType,
        threshold_type: CrmThresholdType,
    ) -> Result<(), CrmOrchError> {
        let entry = self.entry_mut(resource_type)?;
        validate_thresholds(threshold_type, entry.low_threshold, entry.high_threshold)
            .map_err(CrmOrchError::InvalidThreshold)?;

        Self::apply_threshold_type(entry, threshold_type);
        self.stats.config_updates += 1;
        Ok(())
    }

    fn apply_threshold_type(entry: &mut CrmResourceEntry, threshold_type: CrmThresholdType) {
        if entry.threshold_type != threshold_type {
            entry.threshold_type = threshold_type;
            for counter in entry.counters.values_mut() {
                counter.exceeded_log_count = 0;
            }
        }
    }

    /// Sets both thresholds of a resource.
    pub fn set_thresholds(
        &mut self,
        resource_type: CrmResourceType,
        low: u32,
        high: u32,
    ) -> Result<(), CrmOrchError> {
        let entry = self.entry_mut(resource_type)?;
        validate_thresholds(entry.threshold_type, low, high)
            .map_err(CrmOrchError::InvalidThreshold)?;

        entry.low_threshold = low;
        entry.high_threshold = high;
        self.stats.config_updates += 1;
        Ok(())
    }

    /// Applies one SET of the CRM configuration table.
    ///
    /// The whole batch is parsed and validated before anything changes; on
    /// error the previous configuration stays in force.
    pub fn handle_set_command(
        &mut self,
        key: &str,
        fvs: &[(String, String)],
    ) -> Result<(), CrmOrchError> {
        debug!("CRM config {}: {} fields", key, fvs.len());

        let mut interval = None;
        let mut pending: HashMap<CrmResourceType, PendingThresholds> = HashMap::new();

        for (field, value) in fvs {
            if field == CRM_POLLING_INTERVAL_FIELD {
                let secs: u64 = value
                    .parse()
                    .ok()
                    .filter(|secs| *secs > 0)
                    .ok_or_else(|| {
                        CrmOrchError::Parse(format!("Invalid polling interval: {}", value))
                    })?;
                interval = Some(Duration::from_secs(secs));
                continue;
            }

            let (resource_type, field_type) = CrmThresholdField::parse_field(field)
                .ok_or_else(|| CrmOrchError::Parse(format!("Unknown field: {}", field)))?;

            let entry = self.entry_mut(resource_type)?;
            let thresholds = pending.entry(resource_type).or_insert(PendingThresholds {
                threshold_type: entry.threshold_type,
                low: entry.low_threshold,
                high: entry.high_threshold,
            });

            match field_type {
                CrmThresholdField::Type => {
                    thresholds.threshold_type = value.parse().map_err(CrmOrchError::Parse)?;
                }
                CrmThresholdField::Low => {
                    thresholds.low = value.parse().map_err(|_| {
                        CrmOrchError::Parse(format!("Invalid value for {}: {}", field, value))
                    })?;
                }
                CrmThresholdField::High => {
                    thresholds.high = value.parse().map_err(|_| {
                        CrmOrchError::Parse(format!("Invalid value for {}: {}", field, value))
                    })?;
                }
            }
        }

        for (resource_type, thresholds) in &pending {
            validate_thresholds(thresholds.threshold_type, thresholds.low, thresholds.high)
                .map_err(|e| {
                    CrmOrchError::InvalidThreshold(format!("{}: {}", resource_type, e))
                })?;
        }

        if let Some(interval) = interval {
            info!("CRM polling interval set to {}s", interval.as_secs());
            self.set_polling_interval(interval);
        }
        for (resource_type, thresholds) in pending {
            let entry = self.entry_mut(resource_type)?;
            Self::apply_threshold_type(entry, thresholds.threshold_type);
            entry.low_threshold = thresholds.low;
            entry.high_threshold = thresholds.high;
            self.stats.config_updates += 1;
        }
        Ok(())
    }

    // ========== Timer/Polling Operations ==========

    /// Handles timer expiration: queries the driver, publishes counters and
    /// checks thresholds.
    pub fn on_timer(&mut self) {
        self.stats.timer_expirations += 1;
        self.poll_availability();
        self.publish_snapshot();
        self.check_thresholds();
    }

    /// Refreshes the available side of every supported resource.
    pub fn poll_availability(&mut self) {
        let gateway = Arc::clone(&self.gateway);
        let switch_id = gateway.switch_id();

        for res_type in CrmResourceType::ALL {
            let supported = self
                .resources
                .get(&res_type)
                .is_some_and(CrmResourceEntry::is_supported);
            if !supported {
                continue;
            }

            let failure = match res_type.availability_query() {
                AvailabilityQuery::Object {
                    object_type,
                    qualifiers,
                    fallback,
                } => {
                    let result = gateway
                        .get_availability(object_type, &qualifiers)
                        .or_else(|status| match fallback {
                            Some(attr) => gateway
                                .get_attribute(switch_id, SaiAttrId::SwitchAvailable(attr))
                                .and_then(|value| value.as_count().ok_or(SaiStatus::Failure)),
                            None => Err(status),
                        });
                    self.set_available(res_type, CrmSubKey::Global, result)
                }
                AvailabilityQuery::Switch(attr) => {
                    let result = gateway
                        .get_attribute(switch_id, SaiAttrId::SwitchAvailable(attr))
                        .and_then(|value| value.as_count().ok_or(SaiStatus::Failure));
                    self.set_available(res_type, CrmSubKey::Global, result)
                }
                AvailabilityQuery::AclResourceList(attr) => {
                    match gateway.get_attribute(switch_id, attr) {
                        Ok(SaiAttrValue::AclResourceList(list)) => {
                            if let Some(entry) = self.resources.get_mut(&res_type) {
                                for res in list {
                                    let subkey = CrmSubKey::Acl {
                                        stage: res.stage,
                                        bind_point: res.bind_point,
                                    };
                                    entry.ensure_counter(subkey).available = res.avail_num;
                                }
                            }
                            None
                        }
                        Ok(other) => {
                            error!(
                                "Unexpected value for {} availability: {:?}",
                                res_type.log_name(),
                                other
                            );
                            None
                        }
                        Err(status) => Some(status),
                    }
                }
                AvailabilityQuery::AclTableAttribute(attr) => {
                    self.poll_sub_pools(res_type, |subkey| match subkey {
                        CrmSubKey::AclTable(oid) => Some(
                            gateway
                                .get_attribute(*oid, attr)
                                .and_then(|value| value.as_count().ok_or(SaiStatus::Failure)),
                        ),
                        _ => None,
                    })
                }
                AvailabilityQuery::ExtTable => self.poll_sub_pools(res_type, |subkey| match subkey {
                    CrmSubKey::ExtTable(name) => Some(gateway.get_availability(
                        SaiObjectType::GenericProgrammable,
                        &[AvailabilityQualifier::ObjectName(name.clone())],
                    )),
                    _ => None,
                }),
                AvailabilityQuery::DashAclRule => {
                    self.poll_sub_pools(res_type, |subkey| match subkey {
                        CrmSubKey::DashAclGroup(oid) => Some(gateway.get_availability(
                            SaiObjectType::DashAclRule,
                            &[AvailabilityQualifier::DashAclGroup(*oid)],
                        )),
                        _ => None,
                    })
                }
            };

            if let Some(status) = failure {
                self.handle_query_failure(res_type, status);
            }
        }
    }

    /// Stores one availability answer, handing back a failed status.
    fn set_available(
        &mut self,
        res_type: CrmResourceType,
        subkey: CrmSubKey,
        result: Result<u64, SaiStatus>,
    ) -> Option<SaiStatus> {
        match result {
            Ok(available) => {
                if let Some(entry) = self.resources.get_mut(&res_type) {
                    entry.ensure_counter(subkey).available =
                        u32::try_from(available).unwrap_or(u32::MAX);
                }
                None
            }
            Err(status) => Some(status),
        }
    }

    /// Queries every tracked sub-pool of a resource and returns the first
    /// failure seen. A failing sub-pool keeps its last known availability.
    fn poll_sub_pools<F>(&mut self, res_type: CrmResourceType, mut query: F) -> Option<SaiStatus>
    where
        F: FnMut(&CrmSubKey) -> Option<Result<u64, SaiStatus>>,
    {
        let subkeys: Vec<CrmSubKey> = self
            .resources
            .get(&res_type)
            .map(|entry| entry.counters.keys().cloned().collect())
            .unwrap_or_default();

        let mut first_failure = None;
        for subkey in subkeys {
            let Some(result) = query(&subkey) else {
                continue;
            };
            let label = subkey.to_string();
            if let Some(status) = self.set_available(res_type, subkey, result) {
                if !status.is_not_supported() {
                    error!(
                        "Failed to get availability for {} {}: {}",
                        res_type.log_name(),
                        label,
                        status
                    );
                }
                first_failure.get_or_insert(status);
            }
        }
        first_failure
    }

    fn handle_query_failure(&mut self, res_type: CrmResourceType, status: SaiStatus) {
        if !status.is_not_supported() {
            error!(
                "Failed to get availability for {}: {}",
                res_type.log_name(),
                status
            );
            return;
        }

        let Some(entry) = self.resources.get_mut(&res_type) else {
            return;
        };
        entry.status = CrmResourceStatus::NotSupported;
        info!("CRM resource {} not supported", res_type.log_name());

        let fields = [res_type.used_field(), res_type.available_field()];
        for subkey in entry.counters.keys() {
            self.counters_table.del_fields(&subkey.to_string(), &fields);
        }
    }

    /// Writes the used/available pair of every supported sub-pool.
    pub fn publish_snapshot(&self) {
        for (res_type, entry) in &self.resources {
            if !entry.is_supported() {
                continue;
            }
            let used_field = res_type.used_field();
            let available_field = res_type.available_field();
            for (subkey, counter) in &entry.counters {
                self.counters_table.set(
                    &subkey.to_string(),
                    &[
                        (used_field.clone(), counter.used.to_string()),
                        (available_field.clone(), counter.available.to_string()),
                    ],
                );
            }
        }
    }

    /// Runs the hysteresis check on every supported sub-pool.
    pub fn check_thresholds(&mut self) {
        let events = Arc::clone(&self.events);

        for (res_type, entry) in &mut self.resources {
            if !entry.is_supported() {
                continue;
            }
            let threshold_type = entry.threshold_type;
            let (low, high) = (entry.low_threshold, entry.high_threshold);

            for (subkey, counter) in &mut entry.counters {
                let (used, free) = (counter.used, counter.available);
                let (kind, percent) = match counter.check_threshold(threshold_type, low, high) {
                    ThresholdCheck::Normal => continue,
                    ThresholdCheck::Exceeded {
                        percent, crossing, ..
                    } => {
                        warn!(
                            "{} THRESHOLD_EXCEEDED for {} {}% Used count {} free count {}",
                            res_type.log_name(),
                            threshold_type.log_tag(),
                            percent,
                            used,
                            free
                        );
                        if !crossing {
                            continue;
                        }
                        (ThresholdEventKind::Exceeded, percent)
                    }
                    ThresholdCheck::Cleared { percent, .. } => {
                        warn!(
                            "{} THRESHOLD_CLEAR for {} {}% Used count {} free count {}",
                            res_type.log_name(),
                            threshold_type.log_tag(),
                            percent,
                            used,
                            free
                        );
                        (ThresholdEventKind::Clear, percent)
                    }
                };

                self.stats.threshold_events += 1;
                events.publish(&CrmThresholdEvent {
                    resource: *res_type,
                    subkey: subkey.to_string(),
                    kind,
                    threshold_type,
                    percent,
                    used,
                    free,
                });
            }
        }
    }
}
