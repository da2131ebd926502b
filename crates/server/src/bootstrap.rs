use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use rolecall_core::config::{AppConfig, ConfigError, LoadOptions};
use rolecall_db::{connect_with_settings, migrations, DbPool, SqlBindingRepository};
use rolecall_gateway::{
    handlers::build_dispatcher, DialogueService, GatewayRunner, GrantService, MembershipIndex,
    NoopEventSource, NoopGatewaySession, ReconcileConfig, ReconciliationEngine, ReconnectPolicy,
    SubscriptionRegistry,
};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub dialogue: Arc<DialogueService>,
    pub runner: GatewayRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!("starting application bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!("database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!("database migrations applied");

    let store = Arc::new(SqlBindingRepository::new(db_pool.clone()));
    let session = Arc::new(NoopGatewaySession);
    let registry = Arc::new(SubscriptionRegistry::new());
    let index = Arc::new(MembershipIndex::new());

    let dialogue = Arc::new(DialogueService::new(
        store.clone(),
        session.clone(),
        registry,
        config.discord.command_id.clone(),
    ));
    let grants = Arc::new(GrantService::new(store.clone(), session.clone(), index.clone()));
    let engine = Arc::new(ReconciliationEngine::new(
        store,
        session,
        index.clone(),
        ReconcileConfig {
            page_size: config.reconciliation.page_size,
            remove_departed: config.reconciliation.remove_departed,
        },
    ));

    let dispatcher = build_dispatcher(dialogue.clone(), grants, index, engine);
    let runner = GatewayRunner::new(
        Arc::new(NoopEventSource),
        Arc::new(dispatcher),
        ReconnectPolicy::default(),
    );

    Ok(Application { config, db_pool, dialogue, runner })
}
