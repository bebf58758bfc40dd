use std::sync::Arc;

use sea_orm::{DatabaseConnection, DbErr};
use thiserror::Error;

use crate::catalog::{Catalog, ConfigError};
use crate::config::{Config, EnvError, StateBackend};
use crate::connection;
use crate::engine::DialogueEngine;
use crate::registrations::{DatabaseRegistrations, LogRegistrations};
use crate::store::{DatabaseStateStore, MemoryStateStore, StateStore};
/// Anything that keeps the bot from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Env(#[from] EnvError),
    #[error(transparent)]
    Catalog(#[from] ConfigError),
    #[error(transparent)]
    Database(#[from] DbErr),
}

pub fn load_catalog(config: &Config) -> Result<Catalog, ConfigError> {
    match &config.catalog_path {
        Some(path) => {
            log::info!("Loading catalog from {}...", path);
            Catalog::load(path)
        }
        None => Catalog::builtin(),
    }
}

pub async fn init_engine(config: &Config) -> Result<DialogueEngine, StartupError> {
    let catalog = Arc::new(load_catalog(config)?);
    log::info!("Loaded catalog...");

    let connection = match &config.database_url {
        Some(url) => Some(connection::init(url).await?),
        None => None,
    };

    build_engine(catalog, &config.backend, connection)
}

/// Picks the state store for `backend`. Registrations go to the database
/// whenever there is one.
pub fn build_engine(
    catalog: Arc<Catalog>,
    backend: &StateBackend,
    connection: Option<DatabaseConnection>,
) -> Result<DialogueEngine, StartupError> {
    let states: Arc<dyn StateStore> = match (backend, connection) {
        (StateBackend::Database, Some(connection)) => {
            Arc::new(DatabaseStateStore::new(connection))
        }
        (StateBackend::Database, None) => return Err(EnvError::Missing("DB_URL").into()),
        (StateBackend::Memory, Some(connection)) => {
            log::info!("Keeping dialogue states in memory, registrations in the database...");
            Arc::new(MemoryStateStore::new(Arc::new(DatabaseRegistrations::new(
                connection,
            ))))
        }
        (StateBackend::Memory, None) => {
            log::warn!("No DB_URL, registrations are only written to the log");
            Arc::new(MemoryStateStore::new(Arc::new(LogRegistrations)))
        }
    };

    Ok(DialogueEngine::new(catalog, states))
}
