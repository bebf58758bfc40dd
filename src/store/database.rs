use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{prelude::*, sea_query::OnConflict, ActiveValue, TransactionTrait};

use super::{StateStore, StoreError};
use crate::entity::user_states;
use crate::registrations;
use crate::types::{Context, Registration, UserId, UserState};

/// Keeps states in the `user_states` table so dialogues survive restarts.
/// Finished registrations are written to the `registrations` table of the
/// same database.
#[derive(Debug, Clone)]
pub struct DatabaseStateStore {
    connection: DatabaseConnection,
}

impl DatabaseStateStore {
    pub fn new(connection: DatabaseConnection) -> Self {
        DatabaseStateStore { connection }
    }
}

fn from_model(model: user_states::Model) -> Result<UserState, StoreError> {
    let context: Context = serde_json::from_str(&model.context)?;
    Ok(UserState {
        user_id: UserId(model.user_id),
        scenario_name: model.scenario_name,
        step_name: model.step_name,
        context,
    })
}

#[async_trait]
impl StateStore for DatabaseStateStore {
    async fn get(&self, user_id: &UserId) -> Result<Option<UserState>, StoreError> {
        user_states::Entity::find_by_id(user_id.0.clone())
            .one(&self.connection)
            .await?
            .map(from_model)
            .transpose()
    }

    async fn put(&self, state: &UserState) -> Result<(), StoreError> {
        user_states::Entity::insert(user_states::ActiveModel {
            user_id: ActiveValue::Set(state.user_id.0.clone()),
            scenario_name: ActiveValue::Set(state.scenario_name.clone()),
            step_name: ActiveValue::Set(state.step_name.clone()),
            context: ActiveValue::Set(serde_json::to_string(&state.context)?),
            updated_at: ActiveValue::Set(Utc::now().naive_utc()),
        })
        .on_conflict(
            OnConflict::column(user_states::Column::UserId)
                .update_columns([
                    user_states::Column::ScenarioName,
                    user_states::Column::StepName,
                    user_states::Column::Context,
                    user_states::Column::UpdatedAt,
                ])
                .to_owned(),
        )
        .exec(&self.connection)
        .await?;

        Ok(())
    }

    async fn delete(&self, user_id: &UserId) -> Result<(), StoreError> {
        user_states::Entity::delete_by_id(user_id.0.clone())
            .exec(&self.connection)
            .await?;
        Ok(())
    }

    async fn finish(
        &self,
        user_id: &UserId,
        registration: &Registration,
    ) -> Result<(), StoreError> {
        let txn = self.connection.begin().await?;
        let written = async {
            registrations::insert(&txn, registration).await?;
            user_states::Entity::delete_by_id(user_id.0.clone())
                .exec(&txn)
                .await?;
            Ok::<_, DbErr>(())
        }
        .await;

        match written {
            Ok(()) => txn.commit().await?,
            Err(err) => {
                txn.rollback().await?;
                return Err(err.into());
            }
        }
        Ok(())
    }
}
