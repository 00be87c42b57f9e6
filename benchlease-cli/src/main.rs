mod commands;
mod handlers;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "benchlease",
    about = "benchlease — exporter lease broker for shared lab hardware",
    version
)]
struct Cli {
    #[command(flatten)]
    opts: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
pub struct GlobalOpts {
    /// Storage backend: "memory" or "sqlite:<path>"
    #[arg(long, global = true, default_value = "memory", env = "BENCHLEASE_STORAGE")]
    pub storage: String,

    /// JSON exporter inventory to load into the registry
    #[arg(long, global = true, env = "BENCHLEASE_INVENTORY")]
    pub inventory: Option<PathBuf>,

    /// JSON broker configuration file
    #[arg(long, global = true, env = "BENCHLEASE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the shortest lease a caller may request
    #[arg(long, global = true, env = "BENCHLEASE_MIN_LEASE_MINUTES")]
    pub min_lease_minutes: Option<u64>,

    /// Override the longest lease a caller may request
    #[arg(long, global = true, env = "BENCHLEASE_MAX_LEASE_MINUTES")]
    pub max_lease_minutes: Option<u64>,

    /// Override how often the expiry sweeper runs
    #[arg(long, global = true, env = "BENCHLEASE_SWEEP_INTERVAL_SECS")]
    pub sweep_interval_secs: Option<u64>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the effective broker configuration
    Config,

    /// List exporters and their status
    Exporters {
        /// Label selector, e.g. "board-type=j784s4evm,enabled=true"
        #[arg(long)]
        selector: Option<String>,

        /// Attach the lease currently holding each exporter
        #[arg(long)]
        include_leases: bool,

        /// Report each exporter's online flag
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        include_online: bool,
    },

    /// List leases on exporters matching a selector
    Leases {
        #[arg(long)]
        selector: Option<String>,
    },

    /// Create, inspect or release a lease
    Lease {
        #[command(subcommand)]
        action: LeaseAction,
    },

    /// Expire leases past their deadline
    Sweep {
        /// Keep sweeping on the configured interval until Ctrl-C
        #[arg(long)]
        watch: bool,
    },

    /// Print version information
    Version,
}

#[derive(Subcommand)]
pub enum LeaseAction {
    /// Lease one exporter matching a selector
    Create {
        #[arg(long)]
        selector: String,

        /// Human-readable lease name
        #[arg(long)]
        name: Option<String>,

        #[arg(long, default_value_t = 30)]
        duration_minutes: u64,
    },

    /// Show a single lease
    Show { lease_id: String },

    /// Release a held lease
    Release { lease_id: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr; stdout carries JSON responses only
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match commands::run(cli.opts, cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            handlers::print_failure(&e);
            ExitCode::FAILURE
        }
    }
}
