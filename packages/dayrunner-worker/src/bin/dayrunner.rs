//! Process host: parses configuration, wires collaborators for the
//! configured store backend, serves the health surface, and drives the
//! orchestrator until shutdown.

use std::collections::HashMap;
use std::sync::Arc;

use clap::Parser;
use dayrunner_core::SystemClock;
use dayrunner_worker::config::Cli;
use dayrunner_worker::health::{self, HealthController};
use dayrunner_worker::lease::MemoryLeaseStore;
use dayrunner_worker::orchestrator::{Orchestrator, OrchestratorDeps};
use dayrunner_worker::output::FileOutputWriter;
use dayrunner_worker::paging::MemoryRowSource;
use dayrunner_worker::progress::MemoryProgressStore;
use dayrunner_worker::publisher::bus::{HttpBusClient, InMemoryBusClient};
use dayrunner_worker::publisher::DefaultEventPublisher;
use dayrunner_worker::translator::TranslatorRegistry;
use dayrunner_worker::trigger::ProgressBackedTriggerGuard;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let cli = Cli::parse();
    let config = cli.load()?;
    config.validate()?;

    match cli.metrics_addr.parse::<std::net::SocketAddr>() {
        Ok(addr) => {
            if let Err(err) = metrics_exporter_prometheus::PrometheusBuilder::new()
                .with_http_listener(addr)
                .install()
            {
                tracing::warn!(error = %err, "failed to install prometheus exporter");
            }
        }
        Err(err) => tracing::warn!(error = %err, "invalid metrics bind address, metrics disabled"),
    }

    let clock = Arc::new(SystemClock);
    let health_controller = Arc::new(HealthController::new());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn({
        let health_controller = health_controller.clone();
        let shutdown_tx = shutdown_tx.clone();
        async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
            health_controller.set_draining();
            let _ = shutdown_tx.send(true);
        }
    });

    let router = health::router(health_controller.clone());
    let listener = tokio::net::TcpListener::bind(&cli.bind_addr).await?;
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, router).await {
            tracing::error!(error = %err, "health server exited");
        }
    });

    let deps = build_deps(&cli, &config, clock.clone()).await?;
    let orchestrator = Orchestrator::new(&config, deps);

    health_controller.set_ready();

    if cli.once {
        orchestrator.run_once(shutdown_rx).await?;
    } else {
        orchestrator.run_forever(shutdown_rx).await;
    }

    health_controller.set_stopped();
    Ok(())
}

async fn build_deps(
    cli: &Cli,
    config: &dayrunner_core::Config,
    clock: Arc<dyn dayrunner_core::ClockSource>,
) -> anyhow::Result<OrchestratorDeps> {
    let translators = TranslatorRegistry::with_builtins();

    let mut outputs: HashMap<String, Arc<dyn dayrunner_worker::output::OutputWriter>> = HashMap::new();
    for file in &config.files {
        let file_name = file.resolve_file_name_today();
        let path = std::path::Path::new(&config.output_root_path).join(file_name);
        outputs.insert(file.file_id.clone(), Arc::new(FileOutputWriter::new(path)));
    }

    let bus_endpoint = std::env::var("DAYRUNNER_BUS_WEBHOOK").ok();

    match cli.store_backend.as_str() {
        "memory" => {
            let lease = Arc::new(MemoryLeaseStore::with_clock(clock.clone()));
            let progress: Arc<dyn dayrunner_worker::ProgressStore> =
                Arc::new(MemoryProgressStore::with_clock(clock.clone()));
            let rows = Arc::new(MemoryRowSource::new(Vec::new()));
            let trigger = Arc::new(ProgressBackedTriggerGuard::new(progress.clone(), clock.clone()));

            let publisher: Arc<dyn dayrunner_worker::EventPublisher> = match bus_endpoint {
                Some(endpoint) => Arc::new(DefaultEventPublisher::new(
                    HttpBusClient::new(endpoint),
                    config.bus.topic.clone(),
                    clock.clone(),
                )),
                None => Arc::new(DefaultEventPublisher::new(
                    InMemoryBusClient::new(),
                    config.bus.topic.clone(),
                    clock.clone(),
                )),
            };

            Ok(OrchestratorDeps {
                lease,
                progress,
                rows,
                outputs,
                translators,
                publisher,
                trigger,
                clock,
            })
        }
        #[cfg(feature = "postgres")]
        "postgres" => {
            use dayrunner_worker::lease::PgLeaseStore;
            use dayrunner_worker::paging::PgRowSource;
            use dayrunner_worker::progress::PgProgressStore;

            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(5)
                .connect(&config.state_store.connection_string)
                .await?;

            let lease = Arc::new(PgLeaseStore::with_table(pool.clone(), &config.state_store.lease_collection));
            let progress: Arc<dyn dayrunner_worker::ProgressStore> = Arc::new(PgProgressStore::with_table(
                pool.clone(),
                &config.state_store.status_collection,
            ));
            let rows = Arc::new(PgRowSource::new(pool, &config.sql.view_name, &config.sql.order_by));
            let trigger = Arc::new(ProgressBackedTriggerGuard::new(progress.clone(), clock.clone()));

            let publisher: Arc<dyn dayrunner_worker::EventPublisher> = match bus_endpoint {
                Some(endpoint) => Arc::new(DefaultEventPublisher::new(
                    HttpBusClient::new(endpoint),
                    config.bus.topic.clone(),
                    clock.clone(),
                )),
                None => Arc::new(DefaultEventPublisher::new(
                    InMemoryBusClient::new(),
                    config.bus.topic.clone(),
                    clock.clone(),
                )),
            };

            Ok(OrchestratorDeps {
                lease,
                progress,
                rows,
                outputs,
                translators,
                publisher,
                trigger,
                clock,
            })
        }
        other => anyhow::bail!("unknown store backend: {other}"),
    }
}
