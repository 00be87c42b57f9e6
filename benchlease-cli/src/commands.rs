use std::sync::Arc;

use anyhow::{anyhow, Context};

use benchlease_core::config::BrokerConfig;
use benchlease_core::registry::{InMemoryRegistry, Inventory};
use benchlease_core::{ExporterQuery, LeaseBroker};

use crate::handlers::*;
use crate::{Commands, GlobalOpts, LeaseAction};

pub async fn run(opts: GlobalOpts, command: Commands) -> anyhow::Result<()> {
    if let Commands::Version = command {
        return emit(VersionResponse {
            name: "benchlease".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        });
    }

    let broker = create_broker(&opts)?;

    match command {
        Commands::Config => emit(broker.config()),
        Commands::Exporters {
            selector,
            include_leases,
            include_online,
        } => {
            let exporters = broker.exporters(&ExporterQuery {
                selector,
                include_leases,
                include_online,
            })?;
            tracing::info!(count = exporters.len(), "Exporters listed");
            emit(exporters)
        }
        Commands::Leases { selector } => {
            let leases: Vec<LeaseResponse> = broker
                .list(selector.as_deref())?
                .into_iter()
                .map(LeaseResponse::from)
                .collect();
            tracing::info!(count = leases.len(), "Leases listed");
            emit(leases)
        }
        Commands::Lease { action } => run_lease(&broker, action),
        Commands::Sweep { watch } => run_sweep(&broker, watch).await,
        Commands::Version => Ok(()),
    }
}

fn run_lease(broker: &LeaseBroker, action: LeaseAction) -> anyhow::Result<()> {
    match action {
        LeaseAction::Create {
            selector,
            name,
            duration_minutes,
        } => {
            let req = CreateLeaseRequest {
                selector,
                name,
                duration_minutes,
            };
            req.validate().map_err(|e| anyhow!(e))?;

            tracing::info!(
                selector = %req.selector,
                duration_minutes = req.duration_minutes,
                "Creating lease"
            );
            let lease = broker.allocate(&req.selector, req.duration(), req.name.as_deref())?;
            emit(LeaseResponse::from(lease))
        }
        LeaseAction::Show { lease_id } => emit(LeaseResponse::from(broker.lease(&lease_id)?)),
        LeaseAction::Release { lease_id } => {
            let lease = broker.release(&lease_id)?;
            emit(LeaseResponse::from(lease))
        }
    }
}

async fn run_sweep(broker: &LeaseBroker, watch: bool) -> anyhow::Result<()> {
    let sweeper = broker.sweeper();

    if !watch {
        let expired = sweeper.sweep_once();
        return emit(SweepResponse { expired });
    }

    tracing::info!(
        interval_secs = sweeper.interval().as_secs(),
        "🧹 Sweeper running, press Ctrl-C to stop"
    );
    let handle = sweeper.spawn();
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    handle.shutdown().await;
    tracing::info!("Sweeper stopped");
    Ok(())
}

// ─── Broker Assembly ────────────────────────────────────────────────────────

fn load_config(opts: &GlobalOpts) -> anyhow::Result<BrokerConfig> {
    let mut config = match &opts.config {
        Some(path) => BrokerConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => BrokerConfig::default(),
    };

    if let Some(min) = opts.min_lease_minutes {
        config.min_lease_minutes = min;
    }
    if let Some(max) = opts.max_lease_minutes {
        config.max_lease_minutes = max;
    }
    if let Some(secs) = opts.sweep_interval_secs {
        config.sweep_interval_secs = secs;
    }
    config.validate()?;
    Ok(config)
}

fn load_registry(opts: &GlobalOpts) -> anyhow::Result<InMemoryRegistry> {
    match &opts.inventory {
        Some(path) => {
            let inventory = Inventory::load(path)
                .with_context(|| format!("loading inventory {}", path.display()))?;
            tracing::info!(
                exporters = inventory.exporters.len(),
                "📋 Inventory loaded from {}",
                path.display()
            );
            Ok(inventory.into_registry())
        }
        None => {
            tracing::warn!("No inventory given; the exporter registry is empty");
            Ok(InMemoryRegistry::new())
        }
    }
}

// ─── Storage Backend Selection ──────────────────────────────────────────────

fn create_broker(opts: &GlobalOpts) -> anyhow::Result<LeaseBroker> {
    let config = load_config(opts)?;
    let registry = Arc::new(load_registry(opts)?);
    let storage = opts.storage.as_str();

    if storage == "memory" {
        tracing::info!("💾 Storage backend: in-memory (leases will not persist)");
        return Ok(LeaseBroker::in_memory(config, registry)?);
    }

    if let Some(path) = storage.strip_prefix("sqlite:") {
        #[cfg(feature = "sqlite")]
        {
            tracing::info!("💾 Storage backend: SQLite ({})", path);
            return LeaseBroker::with_sqlite(config, registry, path)
                .with_context(|| format!("opening SQLite lease store at '{}'", path));
        }
        #[cfg(not(feature = "sqlite"))]
        {
            tracing::error!(
                "SQLite storage requested but `sqlite` feature is not enabled. \
                 Rebuild with: cargo build --features sqlite"
            );
            let _ = path;
        }
    } else {
        tracing::error!(
            "Unknown storage backend: '{}'. Use 'memory' or 'sqlite:<path>'",
            storage
        );
    }

    tracing::warn!("Falling back to in-memory storage.");
    Ok(LeaseBroker::in_memory(config, registry)?)
}
