//! DASH ENI orchestration.
//!
//! `DASH_ENI_TABLE|<eni>` creates an ENI inside an already programmed VNET
//! and publishes its OID for the route orch. An ENI whose VNET is not there
//! yet stays queued.

mod orch;
mod types;

pub use orch::{EniOp, EniOrch, EniTable, ENI_ORCH_PRIORITY};
pub use types::{EniConfig, EniEntry, DASH_ENI_TABLE};
