use anyhow::{Context, Result};
use clap::Parser;
use object_compressor::{
    config::{Cli, Command, CompressArgs, RelayConfig, ServeArgs, StorageBackend, WorkerConfig},
    errors::JobError,
    models::job::JobConf,
    routes::routes,
    services::{
        compression_service::CompressionWorker, local_store::LocalObjectStore,
        object_store::ObjectStore, s3_store::S3ObjectStore, trigger_service::HttpJobTrigger,
    },
};
use std::{io::ErrorKind, sync::Arc};
use tokio::{net::TcpListener, signal};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup (stderr; stdout is reserved for job results) ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Serve(args) => serve(args).await,
        Command::Compress(args) => compress(args).await,
    }
}

/// Run the storage-event relay until SIGINT/SIGTERM.
async fn serve(args: ServeArgs) -> Result<()> {
    let cfg = RelayConfig::from_env_and_args(args)?;
    tracing::info!(
        addr = %cfg.addr(),
        job_runner = %cfg.job_runner_url,
        dag_id = %cfg.dag_id,
        timeout_secs = cfg.trigger_timeout.as_secs(),
        "Starting storage-event relay"
    );

    let trigger = HttpJobTrigger::new(&cfg).context("building job runner client")?;
    tracing::info!("Triggering jobs via {}", trigger.url());

    let app = routes::routes(Arc::new(trigger));

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err).with_context(|| format!("binding {}", addr)),
    };

    tracing::info!("Relay listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Relay stopped");
    Ok(())
}

/// Run one compression job; the result goes to stdout as a JSON line.
async fn compress(args: CompressArgs) -> Result<()> {
    let cfg = WorkerConfig::from_env_and_args(&args)?;
    tracing::debug!("Worker config: {:?}", cfg);

    let conf = match (&args.conf, &args.object_name) {
        (Some(raw), _) => serde_json::from_str::<JobConf>(raw).map_err(|err| {
            JobError::Configuration(format!("invalid job configuration: {}", err))
        })?,
        (None, object_name) => JobConf {
            object_name: object_name.clone(),
        },
    };

    let store: Arc<dyn ObjectStore> = match cfg.storage.backend {
        StorageBackend::S3 => Arc::new(S3ObjectStore::new(&cfg.storage).await),
        StorageBackend::Local => Arc::new(LocalObjectStore::new(&cfg.storage.local_root)),
    };

    let worker = CompressionWorker::new(cfg, store);
    let result = worker.run_conf(&conf).await?;

    let line = serde_json::to_string(&result)?;
    if let Some(path) = &args.result_file {
        tokio::fs::write(path, &line)
            .await
            .with_context(|| format!("writing result file {}", path.display()))?;
    }
    println!("{}", line);

    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        _ = terminate => tracing::info!("Received SIGTERM signal"),
    }
}
