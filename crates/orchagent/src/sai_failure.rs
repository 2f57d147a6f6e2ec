//! Fatal driver failure handling.
//!
//! When the driver channel is gone nothing further can be programmed and the
//! in-memory tables can no longer be trusted to match the hardware. The agent
//! records what it can and exits so the supervisor restarts the stack.

use log::{error, info};
use sonic_sai::{SaiError, SaiGateway};

/// Handles an error the reconciliation loop cannot recover from.
///
/// Logs the error, asks the driver for a state dump and, when `abort` is
/// set, terminates the process. Returns only when `abort` is false.
pub fn handle_sai_failure(gateway: &dyn SaiGateway, err: &SaiError, abort: bool) {
    error!("Encountered failure in SAI operation: {}", err);

    match gateway.invoke_dump() {
        Ok(()) => info!("SAI dump requested after failure"),
        Err(e) => error!("Failed to take SAI dump: {}", e),
    }

    if abort {
        error!("Aborting orchagent");
        std::process::abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sonic_sai::SimulatedSai;

    #[test]
    fn test_failure_takes_dump() {
        let sai = SimulatedSai::new();
        handle_sai_failure(&sai, &SaiError::channel_lost("socket closed"), false);
        assert_eq!(sai.dumps(), 1);

        handle_sai_failure(&sai, &SaiError::channel_lost("socket closed"), false);
        assert_eq!(sai.dumps(), 2);
    }
}
