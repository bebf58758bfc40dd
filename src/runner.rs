//! The driving loop between a transport and the engine.

use std::any::Any;
use std::error::Error;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures::FutureExt;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::engine::{DialogueEngine, EngineError};
use crate::types::{EventKind, InboundEvent, UserId};

pub type SendError = Box<dyn Error + Send + Sync>;

/// Delivers replies back to users.
#[async_trait]
pub trait Outbox: Send + Sync {
    async fn send(&self, user_id: &UserId, text: &str) -> Result<(), SendError>;
}

#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("unrecognized event type `{0}`")]
    UnrecognizedEventType(EventKind),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("can't deliver reply: {0}")]
    Delivery(SendError),
}

pub async fn process_event(
    engine: &DialogueEngine,
    outbox: &dyn Outbox,
    event: &InboundEvent,
) -> Result<(), ProcessingError> {
    if event.kind != EventKind::MessageNew {
        return Err(ProcessingError::UnrecognizedEventType(event.kind.clone()));
    }

    let reply = engine.handle_message(&event.user_id, &event.text).await?;
    outbox
        .send(&event.user_id, &reply)
        .await
        .map_err(ProcessingError::Delivery)?;

    Ok(())
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Handles one event and swallows whatever goes wrong, panics included, so a
/// single bad event never stops the loop.
pub async fn on_event(engine: &DialogueEngine, outbox: &dyn Outbox, event: InboundEvent) {
    let outcome = AssertUnwindSafe(process_event(engine, outbox, &event))
        .catch_unwind()
        .await;

    let result = match outcome {
        Ok(result) => result,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            log::error!(
                "Panic in event handling for user {} (text {:?}): {}",
                event.user_id,
                event.text,
                message
            );
            sentry::capture_message(message, sentry::Level::Error);
            return;
        }
    };

    match result {
        Ok(()) => {}
        Err(ProcessingError::UnrecognizedEventType(kind)) => {
            log::info!("We are not yet able to handle events of this type: {}", kind);
        }
        Err(err) => {
            log::error!(
                "Error in event handling for user {} (text {:?}): {}",
                event.user_id,
                event.text,
                err
            );
            sentry::capture_error(&err);
        }
    }
}

/// Consumes events one at a time until every sender is gone. Returns how many
/// events were taken off the channel.
pub async fn run(
    engine: &DialogueEngine,
    outbox: &dyn Outbox,
    mut events: mpsc::Receiver<InboundEvent>,
) -> usize {
    let mut processed = 0;
    while let Some(event) = events.recv().await {
        on_event(engine, outbox, event).await;
        processed += 1;
    }
    processed
}
