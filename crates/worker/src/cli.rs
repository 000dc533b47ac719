//! Command-line interface of the `orchestra-worker` binary.

use clap::{Parser, Subcommand};
use orchestra_core::status::ScheduleStatus;
use orchestra_core::types::Id;

#[derive(Parser, Debug)]
#[command(name = "orchestra-worker")]
#[command(about = "Submits dispatched schedules to a cluster and reports their status", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Submit every dispatched schedule to the cluster backend
    Subscribe {
        /// Overrides DISPATCH_SUBSCRIPTION
        #[arg(long)]
        subscription: Option<String>,
        /// Stop after this many seconds instead of running until Ctrl-C
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Log every envelope received on a subscription
    Echo {
        subscription: String,
        /// Messenger to subscribe through (defaults to DISPATCH_MESSENGER)
        #[arg(long)]
        messenger: Option<String>,
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Publish a status update for a schedule (run by the hook scripts)
    PublishStatus {
        #[arg(long)]
        schedule_id: Id,
        #[arg(long)]
        job_id: Id,
        #[arg(long)]
        status: ScheduleStatus,
        #[arg(long)]
        exit_info: Option<String>,
    },
    /// Query the backend for a submitted job and publish what it reports
    Poll {
        #[arg(long)]
        schedule_id: Id,
        #[arg(long)]
        job_id: Id,
        /// Backend job id, as printed by the submit command
        #[arg(long)]
        external_id: String,
    },
}
