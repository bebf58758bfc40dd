use std::error::Error;
use std::sync::Arc;

use conf_bot::{
    config::Config,
    engine::DialogueEngine,
    runner::{self, Outbox},
    startup,
    telegram::{self, TelegramOutbox},
};
use teloxide::prelude::*;

async fn on_message(
    message: Message,
    engine: Arc<DialogueEngine>,
    outbox: Arc<dyn Outbox>,
) -> ResponseResult<()> {
    runner::on_event(&engine, outbox.as_ref(), telegram::inbound_event(&message)).await;
    respond(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    pretty_env_logger::init();
    log::info!("Starting...");
    let config = Config::init()?;
    log::info!("Initialized config...");

    let _sentry = config.sentry_url.as_deref().map(|url| {
        sentry::init((
            url,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let engine = Arc::new(startup::init_engine(&config).await?);

    let bot = Bot::from_env();
    let outbox: Arc<dyn Outbox> = Arc::new(TelegramOutbox::new(bot.clone()));

    let handler = Update::filter_message().endpoint(on_message);

    log::info!("Started listening...");
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![engine, outbox])
        .default_handler(|update| async move {
            log::info!(
                "We are not yet able to handle update {} of this kind: {:?}",
                update.id,
                update.kind
            );
        })
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
