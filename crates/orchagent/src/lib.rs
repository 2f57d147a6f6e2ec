//! SONiC DASH Orchagent - Switch Orchestration Daemon
//!
//! Translates declarative DASH intent (VNETs, ENIs, VNET mappings, routes)
//! into bulk SAI calls and tracks hardware table consumption against the
//! CRM thresholds.
//!
//! # Architecture
//!
//! ```text
//! [TableChange] ──> [OrchDaemon] ──> [Orch::do_task] ──> [EntityBulker] ──> [SaiGateway]
//!                        │                  │
//!                        │                  └── commit ──> [CrmOrch used counters]
//!                        └── CRM timer ──> [CrmOrch] ──> [COUNTERS / threshold events]
//! ```
//!
//! # Key Components
//!
//! - [`daemon::OrchDaemon`]: Main event loop and Orch coordination
//! - [`crm`]: Critical Resource Monitor
//! - [`dash_vnet`], [`dash_eni`], [`dash_route`]: DASH object orchs
//! - [`orch::OrchContext`]: state shared between orchs
//! - [`sai_failure`]: fatal driver failure handling

pub mod crm;
pub mod daemon;
pub mod dash_eni;
pub mod dash_route;
pub mod dash_vnet;
pub mod orch;
pub mod sai_failure;
