mod bootstrap;
mod health;

use std::path::PathBuf;

use anyhow::Result;
use chrono::Duration;
use clap::{Parser, Subcommand};

use rolecall_core::config::{AppConfig, ConfigOverrides, LoadOptions};

#[derive(Parser)]
#[command(name = "rolecall-server", about = "Reaction-role bot server", version)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the database URL.
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Override the log level.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the bot: migrations, health endpoint, gateway loop.
    Run,
    /// Apply pending database migrations and exit.
    Migrate,
}

fn init_logging(config: &AppConfig) {
    use rolecall_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config.clone(),
        overrides: ConfigOverrides {
            database_url: cli.database_url.clone(),
            log_level: cli.log_level.clone(),
            ..ConfigOverrides::default()
        },
        ..LoadOptions::default()
    };

    let config = AppConfig::load(options)?;
    init_logging(&config);

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config).await,
        Command::Migrate => migrate(config).await,
    }
}

async fn run(config: AppConfig) -> Result<()> {
    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.db_pool.clone(),
    )
    .await?;

    spawn_idle_sweep(&app);

    app.runner.start().await?;

    tracing::info!("rolecall-server started");
    wait_for_shutdown().await?;
    tracing::info!("rolecall-server stopping");

    Ok(())
}

async fn migrate(config: AppConfig) -> Result<()> {
    let pool = rolecall_db::connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await?;

    rolecall_db::migrations::run_pending(&pool).await?;
    tracing::info!(database_url = %config.database.url, "migrations applied");

    pool.close().await;
    Ok(())
}

/// Background sweep that abandons dialogues idle past the TTL.
fn spawn_idle_sweep(app: &bootstrap::Application) {
    let dialogue = app.dialogue.clone();
    let idle_ttl = Duration::seconds(app.config.dialogue.idle_ttl_secs as i64);
    let sweep_interval = std::time::Duration::from_secs(app.config.dialogue.sweep_interval_secs);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let expired = dialogue.expire_idle(idle_ttl).await;
            if expired > 0 {
                tracing::info!(expired, "abandoned idle dialogues");
            }
        }
    });
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
