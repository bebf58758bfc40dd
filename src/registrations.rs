//! Where finished registrations end up.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{prelude::*, ActiveValue, ConnectionTrait};
use tokio::sync::Mutex;

use crate::entity::registrations;
use crate::store::StoreError;
use crate::types::Registration;

#[async_trait]
pub trait RegistrationSink: Send + Sync {
    async fn record(&self, registration: &Registration) -> Result<(), StoreError>;
}

/// Writes finished registrations to the log only. Used when no database is
/// configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogRegistrations;

#[async_trait]
impl RegistrationSink for LogRegistrations {
    async fn record(&self, registration: &Registration) -> Result<(), StoreError> {
        log::info!(
            "Registration: {} <{}>",
            registration.name,
            registration.email
        );
        Ok(())
    }
}

/// Collects registrations in a `Vec` for tests. Never drops anything.
#[derive(Debug, Default)]
pub struct MemoryRegistrations {
    recorded: Mutex<Vec<Registration>>,
}

impl MemoryRegistrations {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<Registration> {
        self.recorded.lock().await.clone()
    }
}

#[async_trait]
impl RegistrationSink for MemoryRegistrations {
    async fn record(&self, registration: &Registration) -> Result<(), StoreError> {
        self.recorded.lock().await.push(registration.clone());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseRegistrations {
    connection: DatabaseConnection,
}

impl DatabaseRegistrations {
    pub fn new(connection: DatabaseConnection) -> Self {
        DatabaseRegistrations { connection }
    }
}

/// Inserts one `registrations` row on `connection`, which may be a transaction.
pub(crate) async fn insert<C: ConnectionTrait>(
    connection: &C,
    registration: &Registration,
) -> Result<(), DbErr> {
    registrations::ActiveModel {
        name: ActiveValue::Set(registration.name.clone()),
        email: ActiveValue::Set(registration.email.clone()),
        created_at: ActiveValue::Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(connection)
    .await?;

    Ok(())
}

#[async_trait]
impl RegistrationSink for DatabaseRegistrations {
    async fn record(&self, registration: &Registration) -> Result<(), StoreError> {
        insert(&self.connection, registration).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection;

    #[tokio::test]
    async fn registrations_are_written_to_the_database() {
        let connection = connection::init("sqlite::memory:").await.unwrap();
        let sink = DatabaseRegistrations::new(connection.clone());

        sink.record(&Registration {
            name: "Вениамин".to_string(),
            email: "email@email.ru".to_string(),
        })
        .await
        .unwrap();

        let rows = registrations::Entity::find().all(&connection).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Вениамин");
        assert_eq!(rows[0].email, "email@email.ru");
    }
}
