//! Talk to the bot from a terminal, without Telegram.

use std::error::Error;

use async_trait::async_trait;
use conf_bot::{
    config::Config,
    runner::{self, Outbox, SendError},
    startup,
    types::{InboundEvent, UserId},
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

const CONSOLE_USER: &str = "console";

struct StdoutOutbox;

#[async_trait]
impl Outbox for StdoutOutbox {
    async fn send(&self, _user_id: &UserId, text: &str) -> Result<(), SendError> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(format!("bot> {}\n", text).as_bytes()).await?;
        stdout.flush().await?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    pretty_env_logger::init();
    log::info!("Starting...");
    let config = Config::init()?;
    log::info!("Initialized config...");
    let engine = startup::init_engine(&config).await?;

    let (sender, receiver) = mpsc::channel(16);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if sender
                .send(InboundEvent::message(CONSOLE_USER, &line))
                .await
                .is_err()
            {
                break;
            }
        }
    });

    let processed = runner::run(&engine, &StdoutOutbox, receiver).await;
    log::info!("Processed {} messages", processed);

    Ok(())
}
