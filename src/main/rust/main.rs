use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::sync::oneshot;
use tracing::{error, info};

use ros2rtmp_bridge::{
    serve_metrics, BridgeController, BridgeDependencies, Config, OsProcessLauncher,
    PrometheusReporter, StdioBus, SystemClock,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse configuration
    let config = Config::parse();
    config.validate()?;

    // Initialize logging; stdout carries bus records, so logs go to stderr
    let filter = if config.verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    // Initialize metrics
    PrometheusReporter::init_metrics()?;

    // Convert CLI config to domain configs
    let bridge_config = config
        .to_bridge_config()
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    let options = config
        .to_bridge_options()
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    let registry = config
        .to_type_registry()
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    info!("Starting ROS <-> RTMP bridge");
    info!("  Platform/mode: {}/{}", bridge_config.platform(), bridge_config.mode());
    info!("  Direction: {}", bridge_config.direction());
    info!("  Topic: {} ({})", bridge_config.topic(), bridge_config.message_type());
    info!("  Stream URL: {}", bridge_config.stream_url());
    info!("  Metrics port: {}", config.metrics_port);

    // Create infrastructure implementations (dependency injection)
    let deps = BridgeDependencies {
        registry,
        bus: Arc::new(StdioBus::new()),
        launcher: Arc::new(OsProcessLauncher::ffmpeg(&config.ffmpeg_path)),
        clock: Arc::new(SystemClock),
        metrics: Arc::new(PrometheusReporter::new()),
    };

    let mut controller = BridgeController::initialize(bridge_config, options, deps)
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    let stop = controller.stop_handle();

    // Start metrics server
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let metrics_server = tokio::spawn(serve_metrics(config.metrics_port, async move {
        shutdown_rx.await.ok();
    }));

    // Run the bridge in a blocking thread (pipes and the bus use synchronous I/O)
    let mut bridge_handle =
        tokio::task::spawn_blocking(move || controller.run_to_completion());

    let outcome = tokio::select! {
        _ = wait_for_shutdown_signal() => {
            info!("Received shutdown signal");
            stop.stop();
            bridge_handle.await?
        }
        joined = &mut bridge_handle => joined?,
    };

    // Signal shutdown to metrics server
    let _ = shutdown_tx.send(());
    metrics_server.await?;

    // A bridge that gave up (e.g. no stream source) exits non-zero for the supervisor
    if let Err(e) = outcome {
        error!("Bridge error: {}", e);
        return Err(anyhow::anyhow!("{}", e));
    }

    info!("Bridge shutdown complete");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut sigterm, mut sigquit) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::quit()),
    ) {
        (Ok(term), Ok(quit)) => (term, quit),
        _ => {
            error!("Failed to install signal handlers, falling back to ctrl+c");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
        _ = sigquit.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
