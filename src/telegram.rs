//! Telegram side of the bot: turns updates into inbound events and sends
//! replies through the Bot API.

use async_trait::async_trait;
use teloxide::prelude::*;

use crate::runner::{Outbox, SendError};
use crate::types::{EventKind, InboundEvent, UserId};

pub struct TelegramOutbox {
    bot: Bot,
}

impl TelegramOutbox {
    pub fn new(bot: Bot) -> Self {
        TelegramOutbox { bot }
    }
}

#[async_trait]
impl Outbox for TelegramOutbox {
    async fn send(&self, user_id: &UserId, text: &str) -> Result<(), SendError> {
        let chat_id = ChatId(user_id.0.parse()?);
        self.bot.send_message(chat_id, text).await?;
        Ok(())
    }
}

fn message_kind(message: &Message) -> EventKind {
    if message.text().is_some() {
        return EventKind::MessageNew;
    }
    let kind = if message.sticker().is_some() {
        "sticker"
    } else if message.photo().is_some() {
        "photo"
    } else if message.voice().is_some() {
        "voice"
    } else if message.document().is_some() {
        "document"
    } else if message.location().is_some() {
        "location"
    } else {
        "non_text_message"
    };
    EventKind::Other(kind.to_string())
}

pub fn inbound_event(message: &Message) -> InboundEvent {
    InboundEvent {
        kind: message_kind(message),
        user_id: UserId::from(message.chat.id.0),
        text: message.text().unwrap_or_default().to_string(),
    }
}
