use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

use offline_agent::agent::OfflineAgent;
use offline_agent::config::Config;
use offline_agent::server::AgentServer;
use offline_agent::sync::ConnectivityMonitor;

/// Offline agent - keeps the saved-locations app working without a network
#[derive(Parser, Debug)]
#[command(name = "offline-agent")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "offline-agent.yaml")]
    config: PathBuf,

    /// Test configuration and exit
    #[arg(long)]
    test: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration from file
    let config = Config::from_file(&args.config)
        .and_then(|config| config.validate().map(|_| config))
        .unwrap_or_else(|e| {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        });

    offline_agent::logging::init_with_config(&config.logging)
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    tracing::info!(
        config_file = %args.config.display(),
        listen = %config.server.listen_addr(),
        upstream = %config.upstream.base_url,
        cache_version = %config.cache.version,
        cache_backend = ?config.cache.backend,
        queue_dir = %config.queue.directory.display(),
        "Configuration loaded successfully"
    );

    if args.test {
        println!("configuration {} is valid", args.config.display());
        return Ok(());
    }

    let listen_addr = config.server.listen_addr();
    let agent = Arc::new(
        OfflineAgent::from_config(config)
            .await
            .context("failed to build agent")?,
    );

    agent.install().await.context("install failed")?;
    agent.activate().await.context("activate failed")?;
    agent
        .resume_pending_uploads()
        .await
        .context("failed to read upload queue")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let monitor = ConnectivityMonitor::new(Arc::clone(&agent));
    let monitor_task = tokio::spawn(monitor.run(shutdown_rx.clone()));

    let server = AgentServer::bind(Arc::clone(&agent), &listen_addr)
        .await
        .context("failed to start listener")?;
    let server_task = tokio::spawn(server.serve(shutdown_rx));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("Shutdown requested");
    let _ = shutdown_tx.send(true);

    server_task.await.context("listener task panicked")??;
    monitor_task.await.context("sync monitor task panicked")?;
    tracing::info!("Agent stopped");
    Ok(())
}
