//! SONiC DASH orchagent entry point.
//!
//! Builds the driver, the resource monitor and the DASH orchs, then either
//! replays a recorded change file or runs the event loop until interrupted.

use clap::Parser;
use log::{error, info, warn};
use sonic_orchagent::crm::{
    CrmConfigOrch, CrmOrch, CrmOrchConfig, InMemoryCountersTable, LogEventSink,
};
use sonic_orchagent::daemon::{read_replay, OrchDaemon, OrchDaemonConfig, TableChange};
use sonic_orchagent::dash_eni::EniOrch;
use sonic_orchagent::dash_route::RouteOrch;
use sonic_orchagent::dash_vnet::VnetOrch;
use sonic_orchagent::orch::OrchContext;
use sonic_sai::{SimulatedSai, DEFAULT_SIM_CAPACITY};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;

/// SONiC DASH Orchestration Agent
#[derive(Parser, Debug)]
#[command(name = "orchagent")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Batch size for consumer table operations
    #[arg(short = 'b', long, default_value = "128")]
    batch_size: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Heartbeat interval in milliseconds
    #[arg(long, default_value = "1000")]
    heartbeat_interval: u64,

    /// Apply the table changes recorded in this JSON file and exit
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Write the CRM counters table to this JSON file after a replay
    #[arg(long, requires = "replay")]
    counters_out: Option<PathBuf>,

    /// Table size of every object type in the simulated switch
    #[arg(long, default_value_t = DEFAULT_SIM_CAPACITY)]
    sim_capacity: u64,

    /// Keep running after a fatal driver failure instead of aborting
    #[arg(long)]
    no_abort_on_sai_failure: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    info!("====================================================================");
    info!("SONiC DASH orchagent starting");
    info!("====================================================================");
    info!("Configuration:");
    info!("  Batch size: {}", args.batch_size);
    info!("  Heartbeat interval: {}ms", args.heartbeat_interval);
    info!("  Simulated table size: {}", args.sim_capacity);
    info!("  Abort on SAI failure: {}", !args.no_abort_on_sai_failure);

    let sai = Arc::new(SimulatedSai::with_default_capacity(args.sim_capacity));
    let counters = Arc::new(InMemoryCountersTable::new());
    let crm = CrmOrch::new(
        CrmOrchConfig::default(),
        sai.clone(),
        counters.clone(),
        Arc::new(LogEventSink),
    );

    let config = OrchDaemonConfig {
        heartbeat_interval_ms: args.heartbeat_interval,
        batch_size: args.batch_size,
        abort_on_sai_failure: !args.no_abort_on_sai_failure,
    };
    let mut daemon = OrchDaemon::new(config, OrchContext::new(sai, crm));

    info!("Registering orchestration modules...");
    daemon.register_orch(Box::new(CrmConfigOrch::new()));
    daemon.register_orch(Box::new(VnetOrch::new(args.batch_size)));
    daemon.register_orch(Box::new(EniOrch::new(args.batch_size)));
    daemon.register_orch(Box::new(RouteOrch::new(args.batch_size)));

    let code = match &args.replay {
        Some(path) => replay(&mut daemon, path, args.counters_out.as_deref(), &counters),
        None => serve(&mut daemon).await,
    };

    info!("====================================================================");
    info!("SONiC DASH orchagent shutdown complete");
    info!("====================================================================");

    code
}

fn replay(
    daemon: &mut OrchDaemon,
    path: &Path,
    counters_out: Option<&Path>,
    counters: &InMemoryCountersTable,
) -> ExitCode {
    info!("Replaying changes from {}", path.display());
    let changes = match read_replay(path) {
        Ok(changes) => changes,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = daemon.replay(changes) {
        error!("Replay stopped: {}", e);
        return ExitCode::FAILURE;
    }
    for line in daemon.dump() {
        info!("{}", line);
    }

    if let Some(out) = counters_out {
        let written = counters
            .to_json()
            .map_err(|e| e.to_string())
            .and_then(|json| std::fs::write(out, json).map_err(|e| e.to_string()));
        if let Err(e) = written {
            error!("Failed to write counters to {}: {}", out.display(), e);
            return ExitCode::FAILURE;
        }
        info!("Counters written to {}", out.display());
    }

    ExitCode::SUCCESS
}

async fn serve(daemon: &mut OrchDaemon) -> ExitCode {
    // No transport feeds the channel yet; the loop still drives timers
    let (_changes_tx, changes_rx) = mpsc::channel::<TableChange>(1024);

    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => warn!("Received SIGINT, shutting down gracefully..."),
            Err(err) => {
                error!("Failed to listen for ctrl-c: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    info!("Starting event loop...");
    match daemon.run(changes_rx, shutdown).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Event loop terminated: {}", e);
            ExitCode::FAILURE
        }
    }
}
