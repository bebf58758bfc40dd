//! The dialogue engine: intent matching plus the scenario state machine.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::catalog::{Catalog, IntentAction, Scenario, Step, StepKind};
use crate::handlers::RegisteredHandler;
use crate::store::{StateStore, StoreError};
use crate::template::{Template, TemplateError};
use crate::types::{Context, Registration, UserId, UserState};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("scenario `{scenario}`, step `{step}`: {source}")]
    Template {
        scenario: String,
        step: String,
        source: TemplateError,
    },
    #[error("user {user_id} is at unknown step `{step}` of scenario `{scenario}`")]
    StaleState {
        user_id: UserId,
        scenario: String,
        step: String,
    },
    #[error("unknown scenario `{0}`")]
    UnknownScenario(String),
    #[error("scenario finished without `{0}` in context")]
    MissingRegistrationField(&'static str),
}

/// A non-terminal step a user is waiting at.
struct Awaiting<'a> {
    scenario: &'a Scenario,
    step: &'a Step,
    handler: &'static RegisteredHandler,
    failure_text: &'a Template,
    next_step: &'a str,
}

/// One async mutex per user, created on demand and dropped once nobody holds
/// or waits for it.
#[derive(Default)]
struct UserLocks {
    locks: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl UserLocks {
    async fn acquire(&self, user_id: &UserId) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .lock()
            .await
            .entry(user_id.clone())
            .or_default()
            .clone();
        lock.lock_owned().await
    }

    async fn release(&self, user_id: &UserId) {
        let mut locks = self.locks.lock().await;
        if locks
            .get(user_id)
            .map_or(false, |lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(user_id);
        }
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }
}

pub struct DialogueEngine {
    catalog: Arc<Catalog>,
    states: Arc<dyn StateStore>,
    locks: UserLocks,
}

impl DialogueEngine {
    pub fn new(catalog: Arc<Catalog>, states: Arc<dyn StateStore>) -> Self {
        DialogueEngine {
            catalog,
            states,
            locks: UserLocks::default(),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Produces the reply to `text`. Messages of the same user are handled
    /// one at a time.
    pub async fn handle_message(&self, user_id: &UserId, text: &str) -> Result<String, EngineError> {
        let guard = self.locks.acquire(user_id).await;
        let reply = self.handle_locked(user_id, text).await;
        drop(guard);
        self.locks.release(user_id).await;
        reply
    }

    async fn handle_locked(&self, user_id: &UserId, text: &str) -> Result<String, EngineError> {
        if let Some(state) = self.states.get(user_id).await? {
            if self.awaiting_step(&state).is_some() {
                return self.continue_scenario(state, text).await;
            }
            log::warn!(
                "Dropping state of user {}: step {} of scenario {} is not in the catalog",
                user_id,
                state.step_name,
                state.scenario_name
            );
            self.states.delete(user_id).await?;
        }

        match self.catalog.match_intent(text) {
            Some(intent) => {
                log::debug!("User {} matched intent {}", user_id, intent.name);
                match &intent.action {
                    IntentAction::Answer(answer) => Ok(answer.clone()),
                    IntentAction::StartScenario(scenario) => {
                        self.start_scenario(user_id, scenario).await
                    }
                }
            }
            None => Ok(self.catalog.default_answer().to_string()),
        }
    }

    /// Puts the user at the first step of `scenario_name` and returns its text
    /// as written.
    ///
    /// Callers must not run this concurrently for the same user;
    /// [`DialogueEngine::handle_message`] takes care of that.
    pub async fn start_scenario(
        &self,
        user_id: &UserId,
        scenario_name: &str,
    ) -> Result<String, EngineError> {
        let scenario = self
            .catalog
            .scenario(scenario_name)
            .ok_or_else(|| EngineError::UnknownScenario(scenario_name.to_string()))?;
        let first_step = scenario
            .step(&scenario.first_step)
            .ok_or_else(|| EngineError::UnknownScenario(scenario_name.to_string()))?;

        let state = UserState::new(user_id.clone(), &scenario.name, &first_step.name);
        self.states.put(&state).await?;
        log::info!("User {} started scenario {}", user_id, scenario.name);

        Ok(first_step.text.source().to_string())
    }

    /// Feeds `text` to the handler of the step the user is at.
    ///
    /// Same locking contract as [`DialogueEngine::start_scenario`].
    pub async fn continue_scenario(
        &self,
        state: UserState,
        text: &str,
    ) -> Result<String, EngineError> {
        let Awaiting {
            scenario,
            step,
            handler,
            failure_text,
            next_step,
        } = self
            .awaiting_step(&state)
            .ok_or_else(|| EngineError::StaleState {
                user_id: state.user_id.clone(),
                scenario: state.scenario_name.clone(),
                step: state.step_name.clone(),
            })?;

        let mut context = state.context.clone();
        if !(handler.handler)(text, &mut context) {
            log::debug!(
                "User {} failed step {} of scenario {}",
                state.user_id,
                step.name,
                scenario.name
            );
            return render(scenario, step, failure_text, &state.context);
        }

        let next = scenario
            .step(next_step)
            .ok_or_else(|| EngineError::StaleState {
                user_id: state.user_id.clone(),
                scenario: scenario.name.clone(),
                step: next_step.to_string(),
            })?;
        let reply = render(scenario, next, &next.text, &context)?;

        if next.is_terminal() {
            let registration = Registration {
                name: take_field(&context, "name")?,
                email: take_field(&context, "email")?,
            };
            self.states.finish(&state.user_id, &registration).await?;
            log::info!(
                "Registered: {} {}",
                registration.name,
                registration.email
            );
        } else {
            let state = UserState {
                step_name: next.name.clone(),
                context,
                ..state
            };
            self.states.put(&state).await?;
        }

        Ok(reply)
    }

    /// Resolves the step a stored state points at, if it still waits for input.
    fn awaiting_step(&self, state: &UserState) -> Option<Awaiting<'_>> {
        let scenario = self.catalog.scenario(&state.scenario_name)?;
        let step = scenario.step(&state.step_name)?;
        match &step.kind {
            StepKind::Prompt {
                handler,
                failure_text,
                next_step,
            } => Some(Awaiting {
                scenario,
                step,
                handler: *handler,
                failure_text,
                next_step,
            }),
            StepKind::Terminal => None,
        }
    }
}

fn render(
    scenario: &Scenario,
    step: &Step,
    template: &Template,
    context: &Context,
) -> Result<String, EngineError> {
    template.render(context).map_err(|source| EngineError::Template {
        scenario: scenario.name.clone(),
        step: step.name.clone(),
        source,
    })
}

fn take_field(context: &Context, field: &'static str) -> Result<String, EngineError> {
    context
        .get(field)
        .cloned()
        .ok_or(EngineError::MissingRegistrationField(field))
}
