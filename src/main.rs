//! KeyMaster binary
//!
//! Loads configuration, starts the service components and the gateway
//! connection, and shuts everything down gracefully on SIGINT/SIGTERM.

use anyhow::{Context as _, Result};
use clap::Parser;
use keymaster::config::{validate_config, AppConfig};
use keymaster::discord::build_client;
use keymaster::service::{AppState, HealthCheck, HealthStatus};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::signal;
use tracing::{debug, error, info, warn};

/// Raider.IO profiles and keystone group finder for Discord
#[derive(Parser, Debug)]
#[command(
    name = "keymaster",
    version,
    about = "Discord bot for Raider.IO character profiles and keystone group finding",
    long_about = "KeyMaster links guild members to their Raider.IO characters, shows scores, \
                 weekly progress and affixes, and runs interactive group finder posts with \
                 tank, healer and DPS slots that survive restarts."
)]
struct Args {
    /// TOML configuration file; environment variables are used when omitted
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Shorthand for `--log-level debug`
    #[arg(short, long)]
    debug: bool,

    /// Override the SQLite connection URL
    #[arg(long, value_name = "URL")]
    database_url: Option<String>,

    /// Override the health/metrics port; 0 disables the server
    #[arg(long, value_name = "PORT")]
    health_port: Option<u16>,

    /// Start the components, report their health and exit
    #[arg(long)]
    health_check: bool,

    /// Validate the configuration and exit without connecting to Discord
    #[arg(long)]
    dry_run: bool,
}

impl Args {
    /// Configuration from file or environment with command line overrides applied
    fn load_config(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::from_file(path)?,
            None => AppConfig::from_env()?,
        };

        if let Some(level) = &self.log_level {
            config.service.log_level = level.clone();
        }
        if self.debug {
            config.service.log_level = "debug".to_string();
        }
        if let Some(url) = &self.database_url {
            config.database.url = url.clone();
        }
        if let Some(port) = self.health_port {
            config.service.health_port = port;
        }

        validate_config(&config).context("Invalid configuration after command line overrides")?;
        Ok(config)
    }
}

/// RUST_LOG wins over the configured level when set
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
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

fn log_banner(config: &AppConfig) {
    info!("🚀 KeyMaster v{}", keymaster::VERSION);
    info!("   Service: {} (log level {})", config.service.name, config.service.log_level);
    info!("   Database: {}", config.database.url);
    info!("   Raider.IO: {}", config.ranking.base_url);
    match config.service.health_port {
        0 => info!("   Health server: disabled"),
        port => info!("   Health server: port {}", port),
    }
    match config.discord.guild_id {
        Some(guild) => info!("   Commands: guild {}", guild),
        None => info!("   Commands: global"),
    }
    if config.refresh.enabled {
        info!("   Profile refresh: every {}s", config.refresh.interval_seconds);
    } else {
        info!("   Profile refresh: disabled");
    }
}

/// Start everything, print one line per component and map the result to an exit code
async fn health_check(config: AppConfig) -> Result<ExitCode> {
    let state = Arc::new(AppState::new(config).await?);
    state.start().await?;
    let report = HealthCheck::check(state.clone()).await;
    state.shutdown().await?;

    let report = report?;
    println!("Health Check: {}", report.status);
    println!("  Registered users: {}", report.stats.registered_users);
    println!("  Open groups: {}", report.stats.active_sessions);
    for check in &report.checks {
        println!("  {}: {}", check.name, check.status);
    }

    Ok(match report.status {
        HealthStatus::Healthy => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
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
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

/// Run the bot until the gateway stops or a shutdown signal arrives
async fn run(config: AppConfig) -> Result<()> {
    let state = Arc::new(
        AppState::new(config.clone())
            .await
            .context("Failed to initialize application")?,
    );
    state.start().await.context("Failed to start service")?;

    let mut client = match build_client(state.clone()).await {
        Ok(client) => client,
        Err(e) => {
            state.shutdown().await?;
            return Err(e);
        }
    };
    let shard_manager = client.shard_manager.clone();
    info!("✅ KeyMaster is running, press Ctrl+C to stop");

    tokio::select! {
        result = client.start() => {
            if let Err(e) = result {
                error!("Discord client stopped: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("🛑 Shutting down...");
            shard_manager.lock().await.shutdown_all().await;
        }
    }

    match tokio::time::timeout(config.shutdown_timeout(), state.shutdown()).await {
        Ok(Ok(())) => info!("✅ Graceful shutdown completed"),
        Ok(Err(e)) => error!("Shutdown failed: {}", e),
        Err(_) => warn!("⚠️  Shutdown timeout exceeded, forcing exit"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // .env is optional; real environment variables take precedence
    let dotenv = dotenvy::dotenv();

    let config = match args.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("{:#}", e);
        return ExitCode::FAILURE;
    }

    match dotenv {
        Ok(path) => info!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => debug!("No .env file found"),
        Err(e) => warn!("Failed to read .env file: {}", e),
    }

    if args.health_check {
        return health_check(config).await.unwrap_or_else(|e| {
            error!("Health check failed: {:#}", e);
            ExitCode::FAILURE
        });
    }

    log_banner(&config);
    if args.dry_run {
        info!("Configuration is valid, exiting without connecting to Discord");
        return ExitCode::SUCCESS;
    }

    match run(config).await {
        Ok(()) => {
            info!("🛑 KeyMaster stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
