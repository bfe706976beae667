//! Frame extraction worker binary.

use std::sync::Arc;

use tracing::{error, info, warn};

use vproc_media::{check_ffmpeg, FrameExtractor, FrameExtractorConfig};
use vproc_queue::{CacheConfig, SqsQueue, StatusCacheClient};
use vproc_storage::S3Client;
use vproc_store::{connect, JobRepository, StoreConfig};
use vproc_worker::{logging, metrics, JobExecutor, JobOrchestrator, WorkerConfig, WorkerResult};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    logging::init_tracing();

    info!("Starting vproc-worker");

    let executor = match build_executor().await {
        Ok(executor) => Arc::new(executor),
        Err(e) => {
            error!("Failed to start worker: {}", e);
            std::process::exit(1);
        }
    };

    let signal_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Received shutdown signal");
        signal_executor.shutdown();
    });

    if let Err(e) = executor.run().await {
        error!("Executor error: {}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}

async fn build_executor() -> WorkerResult<JobExecutor> {
    let config = WorkerConfig::from_env()?;
    info!("Worker config: {:?}", config);

    if let Some(port) = std::env::var("METRICS_PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
    {
        metrics::install_exporter(port)?;
        info!("Metrics exporter listening on port {}", port);
    }

    if let Err(e) = check_ffmpeg() {
        warn!("{}; every job will fail at the transform step", e);
    }

    let store_config = StoreConfig::from_env()?;
    let pool = connect(&store_config).await?;
    let store = Arc::new(JobRepository::new(pool));

    let cache = Arc::new(StatusCacheClient::new(&CacheConfig::from_env())?);
    let queue = Arc::new(SqsQueue::from_env().await?);
    let artifacts = Arc::new(S3Client::from_env().await?);
    let transform = Arc::new(FrameExtractor::new(FrameExtractorConfig::from_env()));

    let orchestrator = JobOrchestrator::new(
        store,
        cache,
        artifacts,
        transform,
        queue.clone(),
        config.work_dir.clone(),
    );

    Ok(JobExecutor::new(config, queue, Arc::new(orchestrator)))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
