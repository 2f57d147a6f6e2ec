//! CrmOrch - Critical Resource Monitor for the DASH orchagent.
//!
//! Tracks how much of every hardware table is in use, how much the driver
//! still reports as available, and raises threshold events when a
//! configured watermark is crossed.
//!
//! # Architecture
//!
//! ```text
//! CONFIG_DB:CRM|Config
//!      │
//!      ▼
//! CrmConfigOrch ──> CrmOrch ───> SaiGateway (availability queries)
//!                     ▲  │
//!   object orchs ─────┘  ├──> CountersTable (STATS, ACL_STATS, ...)
//!   (increment/decrement)└──> ThresholdEventSink (chk_crm_threshold)
//! ```
//!
//! The `used` side of every counter moves only when an object orch commits
//! a hardware create or remove. The `available` side is refreshed on every
//! timer tick.
//!
//! Every counter lives under a [`CrmSubKey`]: the global pool, an ACL
//! stage/bind point, a single ACL table, an extension table or a DASH ACL
//! group. Removing a parent (an ACL table, a DASH ACL group) drops the
//! sub-pools it owned together with their telemetry rows.

mod config_orch;
mod orch;
mod sink;
mod types;

pub use config_orch::CrmConfigOrch;
pub use orch::{CrmOrch, CrmOrchConfig, CrmOrchError, CrmOrchStats};
pub use sink::{
    CountersTable, CrmThresholdEvent, InMemoryCountersTable, LogEventSink, MemoryEventSink,
    ThresholdEventKind, ThresholdEventSink, CRM_THRESHOLD_EVENT,
};
pub use types::{
    validate_thresholds, AvailabilityQuery, CrmResourceCounter, CrmResourceEntry,
    CrmResourceStatus, CrmResourceType, CrmSubKey, CrmThresholdField, CrmThresholdType,
    ThresholdCheck, CRM_CONFIG_KEY, CRM_CONFIG_TABLE, CRM_COUNTERS_TABLE_KEY,
    CRM_EXCEEDED_MSG_MAX, CRM_POLLING_INTERVAL_FIELD, DEFAULT_HIGH_THRESHOLD,
    DEFAULT_LOW_THRESHOLD, DEFAULT_POLLING_INTERVAL,
};
