mod classifier;
mod clients;
mod config;
mod diff;
mod error;
mod helpers;
mod models;
mod routes;
mod scan;
mod scheduler;
mod snapshot;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

use clients::contexts::{self, ClusterTarget};
use config::{Config, DiffStrategyKind};
use diff::{DiffEngine, HashPartitionStrategy, KeyPartitionStrategy, SortedPartitionStrategy};
use scan::{HttpPodSource, ScanOrchestrator};
use scheduler::Scheduler;
use snapshot::SnapshotStore;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ScanOrchestrator>,
    pub targets: Arc<Vec<ClusterTarget>>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "podwatch=info".parse().unwrap()),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| {
            std::env::args().skip(1).zip(std::env::args().skip(2)).find_map(|(k, v)| {
                if k == "-config" || k == "--config" {
                    Some(v)
                } else {
                    None
                }
            })
        })
        .unwrap_or_else(|| "/etc/podwatch/config.yaml".to_string());

    let cfg = Config::load(&PathBuf::from(&config_path)).unwrap_or_else(|e| {
        eprintln!("error loading config: {}", e);
        std::process::exit(1);
    });
    let cfg = Arc::new(cfg);

    let targets = contexts::resolve_targets(&cfg);
    info!("monitoring {} cluster target(s)", targets.len());

    let strategy: Box<dyn KeyPartitionStrategy> = match cfg.diff_strategy {
        DiffStrategyKind::Hash => Box::new(HashPartitionStrategy),
        DiffStrategyKind::Sorted => Box::new(SortedPartitionStrategy),
    };

    let orchestrator = Arc::new(ScanOrchestrator::new(
        targets.clone(),
        Arc::new(HttpPodSource::new(cfg.api_timeout())),
        SnapshotStore::new(&cfg.data_dir),
        DiffEngine::new(strategy),
        cfg.pending_threshold(),
    ));

    let scheduler = Scheduler::start(orchestrator.clone(), cfg.scan_interval());

    let state = AppState {
        orchestrator,
        targets: Arc::new(targets),
        config: cfg.clone(),
    };
    let router = routes::build_router(state);

    let listen_addr = cfg.listen_addr();
    let listener = TcpListener::bind(&listen_addr).await.unwrap_or_else(|e| {
        eprintln!("failed to bind {}: {}", listen_addr, e);
        std::process::exit(1);
    });

    info!("podwatch listening on {}", listen_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap_or_else(|e| {
            eprintln!("server error: {}", e);
            std::process::exit(1);
        });

    scheduler.stop().await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to listen for ctrl+c");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
