//! Main entry point for the pairwise-lobby matchmaker
//!
//! Runs rounds of simulated players through the matchmaking service and
//! checks that every round pairs them correctly. With `--serve` it keeps
//! running rounds and exposes health and metrics endpoints until Ctrl+C.

use anyhow::{anyhow, Result};
use clap::Parser;
use pairwise_lobby::config::{validate_config, AppConfig};
use pairwise_lobby::metrics::{HealthServer, HealthServerConfig, MetricsCollector};
use pairwise_lobby::service::{MatchmakingService, TracingEventPublisher};
use pairwise_lobby::simulation::run_round;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::time::Duration;
use tracing::{error, info, warn};

/// Pairwise Lobby - random two-player matchmaking
#[derive(Parser)]
#[command(
    name = "pairwise-lobby",
    version,
    about = "Random pairwise matchmaking with cooperative cancellation",
    long_about = "Pairwise Lobby pairs concurrently queueing players two at a time through a \
                 single rendezvous slot. This binary drives simulated players through the \
                 matchmaker, verifies the pairings, and can expose health and Prometheus \
                 metrics endpoints while doing so."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Players per round override
    #[arg(short, long, value_name = "N", help = "Players queued per round")]
    players: Option<usize>,

    /// Rounds override
    #[arg(short, long, value_name = "N", help = "Number of rounds to run")]
    rounds: Option<usize>,

    /// Maximum wait override
    #[arg(long, value_name = "MS", help = "Maximum time a player waits for a match")]
    max_wait_ms: Option<u64>,

    /// Early cancellation override
    #[arg(
        long,
        value_name = "K",
        help = "Every K-th player cancels right after queueing (0 disables)"
    )]
    cancel_every: Option<usize>,

    /// Serve health and metrics endpoints and run until interrupted
    #[arg(long, help = "Keep running rounds and serve health/metrics until Ctrl+C")]
    serve: bool,

    /// Metrics port override
    #[arg(long, value_name = "PORT", help = "Override metrics server port")]
    metrics_port: Option<u16>,

    /// Dry run mode (validate config and exit)
    #[arg(long, help = "Validate configuration and exit without running")]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Load and merge configuration from file or environment and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::from_env()?,
    };

    // Apply CLI overrides
    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }
    if args.debug {
        config.service.log_level = "debug".to_string();
    }
    if let Some(players) = args.players {
        config.simulation.players = players;
    }
    if let Some(rounds) = args.rounds {
        config.simulation.rounds = rounds;
    }
    if let Some(max_wait_ms) = args.max_wait_ms {
        config.matchmaking.max_wait_time_ms = max_wait_ms;
    }
    if let Some(cancel_every) = args.cancel_every {
        config.simulation.cancel_every = cancel_every;
    }
    if let Some(metrics_port) = args.metrics_port {
        config.service.metrics_port = metrics_port;
    }

    validate_config(&config)?;
    Ok(config)
}

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig, serve: bool) {
    info!("Pairwise Lobby Matchmaker v{}", pairwise_lobby::VERSION);
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!("   Max wait: {}ms", config.matchmaking.max_wait_time_ms);
    info!(
        "   Players per round: {}, cancel every: {}",
        config.simulation.players, config.simulation.cancel_every
    );
    if serve {
        info!("   Metrics port: {}", config.service.metrics_port);
    } else {
        info!("   Rounds: {}", config.simulation.rounds);
    }
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C) signal"),
        _ = terminate => info!("Received SIGTERM signal"),
    }
}

/// Run the configured number of rounds, failing on the first bad pairing
async fn run_rounds(service: Arc<MatchmakingService>, config: &AppConfig) -> Result<()> {
    for round in 1..=config.simulation.rounds {
        let report = run_round(service.clone(), round, &config.simulation).await;
        report.verify()?;

        println!(
            "round {}: {} players, {} matches, {} cancelled, {} failed ({:.2}ms)",
            round,
            report.players,
            report.match_count(),
            report.cancelled.len(),
            report.failures.len(),
            report.duration.as_secs_f64() * 1000.0
        );
        for event in report.matched.iter().filter(|event| event.is_originator) {
            println!(
                "  {} <-> {} ({})",
                event.player_id, event.opponent_id, event.match_id
            );
        }
        for (player_id, reason) in &report.cancelled {
            println!("  {} unmatched ({})", player_id, reason);
        }

        if round < config.simulation.rounds {
            tokio::time::sleep(config.round_interval()).await;
        }
    }

    Ok(())
}

/// Keep running rounds until shutdown
async fn run_forever(service: Arc<MatchmakingService>, config: &AppConfig) {
    let shutdown = service.shutdown_token();
    let mut round = 0;

    while !shutdown.is_cancelled() {
        round += 1;
        let report = run_round(service.clone(), round, &config.simulation).await;
        if let Err(e) = report.verify() {
            error!("Round {} produced invalid pairings: {}", round, e);
        }

        tokio::select! {
            _ = shutdown.cancelled() => {}
            _ = tokio::time::sleep(config.round_interval()) => {}
        }
    }
}

async fn serve(service: Arc<MatchmakingService>, config: AppConfig) -> Result<()> {
    let health_server = Arc::new(HealthServer::new(
        HealthServerConfig {
            port: config.service.metrics_port,
            ..HealthServerConfig::default()
        },
        service.clone(),
    ));

    let server_task = {
        let health_server = health_server.clone();
        tokio::spawn(async move {
            if let Err(e) = health_server.start().await {
                error!("Health server failed: {}", e);
            }
        })
    };

    let rounds_task = {
        let service = service.clone();
        let config = config.clone();
        tokio::spawn(async move { run_forever(service, &config).await })
    };

    info!("Pairwise Lobby is running - press Ctrl+C to stop");
    wait_for_shutdown_signal().await;

    info!("Shutdown signal received, beginning graceful shutdown...");
    service.shutdown();
    health_server.stop();

    let shutdown = async {
        if let Err(e) = rounds_task.await {
            warn!("Simulation task ended abnormally: {}", e);
        }
        if let Err(e) = server_task.await {
            warn!("Health server task ended abnormally: {}", e);
        }
    };

    match tokio::time::timeout(config.shutdown_timeout(), shutdown).await {
        Ok(()) => info!("Graceful shutdown completed"),
        Err(_) => warn!("Shutdown timeout exceeded, forcing exit"),
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    display_startup_banner(&config, args.serve);

    if args.dry_run {
        info!("Configuration validation successful - exiting");
        return Ok(());
    }

    let metrics = Arc::new(MetricsCollector::new()?);
    let service = Arc::new(MatchmakingService::new(
        config.clone(),
        Arc::new(TracingEventPublisher::new()),
        metrics,
    ));
    let maintenance = service.spawn_maintenance(Duration::from_secs(5));

    let result = if args.serve {
        serve(service.clone(), config).await
    } else {
        let result = run_rounds(service.clone(), &config).await;
        service.shutdown();
        result
    };

    if let Err(e) = maintenance.await {
        warn!("Metrics refresh task ended abnormally: {}", e);
    }

    if let Err(e) = result {
        error!("Matchmaking simulation failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
