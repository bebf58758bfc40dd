//! Per-user scenario state.
//!
//! The engine only sees [`StateStore`]; whether states live in process memory
//! or in the database is decided at startup.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{Registration, UserId, UserState};

mod database;
mod memory;

pub use database::DatabaseStateStore;
pub use memory::MemoryStateStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("stored context is not valid JSON: {0}")]
    Context(#[from] serde_json::Error),
}

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, user_id: &UserId) -> Result<Option<UserState>, StoreError>;

    /// Inserts the state or replaces the one stored for the same user.
    async fn put(&self, state: &UserState) -> Result<(), StoreError>;

    /// Removing a state that doesn't exist is not an error.
    async fn delete(&self, user_id: &UserId) -> Result<(), StoreError>;

    /// Ends the user's scenario: records `registration` and removes the state.
    /// Either both happen or neither does, so a retried final answer never
    /// records the same registration twice.
    async fn finish(&self, user_id: &UserId, registration: &Registration)
        -> Result<(), StoreError>;
}
