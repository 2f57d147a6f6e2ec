//! Telemetry and event outputs of CrmOrch.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;

use log::warn;

use super::types::{CrmResourceType, CrmThresholdType};

/// Name under which threshold events are published.
pub const CRM_THRESHOLD_EVENT: &str = "chk_crm_threshold";

/// Field/value rows of the counters database.
pub trait CountersTable: Send + Sync {
    /// Sets fields of a row, creating it if needed.
    fn set(&self, key: &str, fvs: &[(String, String)]);

    /// Deletes a whole row.
    fn del(&self, key: &str);

    /// Deletes fields of a row, leaving the others.
    fn del_fields(&self, key: &str, fields: &[String]);
}

type Rows = BTreeMap<String, BTreeMap<String, String>>;

/// Counters table kept in memory, dumpable as JSON.
#[derive(Debug, Default)]
pub struct InMemoryCountersTable {
    rows: Mutex<Rows>,
}

impl InMemoryCountersTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn rows(&self) -> std::sync::MutexGuard<'_, Rows> {
        self.rows.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Returns a copy of one row.
    pub fn get(&self, key: &str) -> Option<BTreeMap<String, String>> {
        self.rows().get(key).cloned()
    }

    /// Returns one field of one row.
    pub fn field(&self, key: &str, field: &str) -> Option<String> {
        self.rows().get(key).and_then(|row| row.get(field).cloned())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.rows().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.rows().keys().cloned().collect()
    }

    /// Serializes every row as a JSON object.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&*self.rows())
    }
}

impl CountersTable for InMemoryCountersTable {
    fn set(&self, key: &str, fvs: &[(String, String)]) {
        let mut rows = self.rows();
        let row = rows.entry(key.to_string()).or_default();
        for (field, value) in fvs {
            row.insert(field.clone(), value.clone());
        }
    }

    fn del(&self, key: &str) {
        self.rows().remove(key);
    }

    fn del_fields(&self, key: &str, fields: &[String]) {
        let mut rows = self.rows();
        if let Some(row) = rows.get_mut(key) {
            for field in fields {
                row.remove(field);
            }
            if row.is_empty() {
                rows.remove(key);
            }
        }
    }
}

/// Direction of a threshold crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdEventKind {
    Exceeded,
    Clear,
}

impl fmt::Display for ThresholdEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exceeded => f.write_str("THRESHOLD_EXCEEDED"),
            Self::Clear => f.write_str("THRESHOLD_CLEAR"),
        }
    }
}

/// A threshold crossing of one CRM sub-pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrmThresholdEvent {
    pub resource: CrmResourceType,
    /// Telemetry row of the sub-pool.
    pub subkey: String,
    pub kind: ThresholdEventKind,
    pub threshold_type: CrmThresholdType,
    pub percent: u32,
    pub used: u32,
    pub free: u32,
}

impl CrmThresholdEvent {
    /// Event parameters as published.
    pub fn params(&self) -> Vec<(String, String)> {
        vec![
            ("percent".to_string(), self.percent.to_string()),
            ("used_cnt".to_string(), self.used.to_string()),
            ("free_cnt".to_string(), self.free.to_string()),
        ]
    }
}

/// Receiver of threshold events.
pub trait ThresholdEventSink: Send + Sync {
    fn publish(&self, event: &CrmThresholdEvent);
}

/// Writes events to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventSink;

impl ThresholdEventSink for LogEventSink {
    fn publish(&self, event: &CrmThresholdEvent) {
        warn!(
            "{} {}: {} {} {} {:?}",
            CRM_THRESHOLD_EVENT,
            event.kind,
            event.resource.log_name(),
            event.subkey,
            event.threshold_type.log_tag(),
            event.params()
        );
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<CrmThresholdEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CrmThresholdEvent> {
        self.events.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Number of events of one kind.
    pub fn count(&self, kind: ThresholdEventKind) -> usize {
        self.events
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .filter(|e| e.kind == kind)
            .count()
    }
}

impl ThresholdEventSink for MemoryEventSink {
    fn publish(&self, event: &CrmThresholdEvent) {
        self.events
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(event.clone());
    }
}
