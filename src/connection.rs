use crate::migration::Migrator;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::{MigratorTrait, SchemaManager};

/// Connects to `database_url` and brings the schema up to date.
pub async fn init(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(database_url.to_string());
    opt.sqlx_logging_level(log::LevelFilter::Debug);
    if database_url.starts_with("sqlite") {
        // An in-memory SQLite database lives and dies with its connection.
        opt.max_connections(1).min_connections(1);
    }
    let connection = Database::connect(opt).await?;
    log::info!("Connected to database...");

    let schema_manager = SchemaManager::new(&connection);
    Migrator::up(&connection, None).await?;
    if !schema_manager.has_table("user_states").await? {
        return Err(DbErr::Migration("user_states table is missing".to_string()));
    }
    log::info!("Applied migrations...");

    Ok(connection)
}
