pub mod cli;
pub mod core;
pub mod providers;
pub mod repository;
pub mod store;
pub mod sync;

use crate::core::RateSource;
use crate::core::config::AppConfig;
use crate::providers::FastForexProvider;
use crate::repository::RateRepository;
use crate::store::PersistentStore;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    Rates {
        base: Option<String>,
        filter: Option<String>,
    },
    Trend {
        base: String,
        days: u32,
    },
    Convert {
        from: String,
        to: String,
        amount: f64,
    },
    Currencies {
        refresh: bool,
    },
    Refresh,
    Watch,
}

/// Shared services built once per invocation.
pub struct AppContext {
    pub config: AppConfig,
    pub store: Arc<PersistentStore>,
    pub source: Arc<dyn RateSource>,
    pub repository: RateRepository,
}

impl AppContext {
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let data_path = config.data_path()?;
        debug!("Using store at {}", data_path.display());
        let store = Arc::new(PersistentStore::on_disk(data_path));
        let source: Arc<dyn RateSource> = Arc::new(
            FastForexProvider::from_config(&config.provider)
                .context("Failed to create rate provider")?,
        );
        let repository = RateRepository::new(Arc::clone(&store), Arc::clone(&source));

        Ok(Self {
            config,
            store,
            source,
            repository,
        })
    }
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("fxsync starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let context = AppContext::from_config(config)?;
    let repository = &context.repository;

    match command {
        AppCommand::Rates { base, filter } => {
            let base = base.unwrap_or_else(|| context.config.base_currency.clone());
            cli::rates::run(repository, &base, filter.as_deref()).await
        }
        AppCommand::Trend { base, days } => cli::trend::run(repository, &base, days).await,
        AppCommand::Convert { from, to, amount } => {
            cli::convert::run(repository, &from, &to, amount).await
        }
        AppCommand::Currencies { refresh } => cli::currencies::run(repository, refresh).await,
        AppCommand::Refresh => {
            cli::refresh::run_once(Arc::clone(&context.store), Arc::clone(&context.source)).await
        }
        AppCommand::Watch => {
            cli::refresh::watch(
                Arc::clone(&context.store),
                Arc::clone(&context.source),
                context.config.refresh_interval(),
            )
            .await
        }
    }
}
