use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{StateStore, StoreError};
use crate::registrations::RegistrationSink;
use crate::types::{Registration, UserId, UserState};

/// Keeps states for the lifetime of the process. Finished registrations go to
/// `registrations`.
pub struct MemoryStateStore {
    states: RwLock<HashMap<UserId, UserState>>,
    registrations: Arc<dyn RegistrationSink>,
}

impl MemoryStateStore {
    pub fn new(registrations: Arc<dyn RegistrationSink>) -> Self {
        MemoryStateStore {
            states: RwLock::default(),
            registrations,
        }
    }

    pub async fn len(&self) -> usize {
        self.states.read().await.len()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, user_id: &UserId) -> Result<Option<UserState>, StoreError> {
        Ok(self.states.read().await.get(user_id).cloned())
    }

    async fn put(&self, state: &UserState) -> Result<(), StoreError> {
        self.states
            .write()
            .await
            .insert(state.user_id.clone(), state.clone());
        Ok(())
    }

    async fn delete(&self, user_id: &UserId) -> Result<(), StoreError> {
        self.states.write().await.remove(user_id);
        Ok(())
    }

    async fn finish(
        &self,
        user_id: &UserId,
        registration: &Registration,
    ) -> Result<(), StoreError> {
        let mut states = self.states.write().await;
        self.registrations.record(registration).await?;
        states.remove(user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::registrations::MemoryRegistrations;

    struct BrokenSink;

    #[async_trait]
    impl RegistrationSink for BrokenSink {
        async fn record(&self, _registration: &Registration) -> Result<(), StoreError> {
            Err(StoreError::Database(sea_orm::DbErr::Custom(
                "registrations unavailable".to_string(),
            )))
        }
    }

    fn registration() -> Registration {
        Registration {
            name: "Вениамин".to_string(),
            email: "email@email.ru".to_string(),
        }
    }

    #[tokio::test]
    async fn put_get_delete() {
        let store = MemoryStateStore::new(Arc::new(MemoryRegistrations::new()));
        let user_id = UserId::from("42");
        assert_eq!(store.get(&user_id).await.unwrap(), None);

        let mut state = UserState::new(user_id.clone(), "registration", "step1");
        store.put(&state).await.unwrap();
        assert_eq!(store.get(&user_id).await.unwrap(), Some(state.clone()));

        state.step_name = "step2".to_string();
        state.context.insert("name".to_string(), "Вениамин".to_string());
        store.put(&state).await.unwrap();
        assert_eq!(store.len().await, 1);
        assert_eq!(store.get(&user_id).await.unwrap(), Some(state));

        store.delete(&user_id).await.unwrap();
        store.delete(&user_id).await.unwrap();
        assert_eq!(store.get(&user_id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn finish_records_and_forgets() {
        let registrations = Arc::new(MemoryRegistrations::new());
        let store = MemoryStateStore::new(registrations.clone());
        let user_id = UserId::from("42");
        store
            .put(&UserState::new(user_id.clone(), "registration", "step2"))
            .await
            .unwrap();

        store.finish(&user_id, &registration()).await.unwrap();

        assert_eq!(store.get(&user_id).await.unwrap(), None);
        assert_eq!(registrations.all().await, vec![registration()]);
    }

    #[tokio::test]
    async fn failed_recording_keeps_the_state() {
        let store = MemoryStateStore::new(Arc::new(BrokenSink));
        let user_id = UserId::from("42");
        let state = UserState::new(user_id.clone(), "registration", "step2");
        store.put(&state).await.unwrap();

        assert!(store.finish(&user_id, &registration()).await.is_err());
        assert_eq!(store.get(&user_id).await.unwrap(), Some(state));
    }
}
