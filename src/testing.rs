//! Shared test fixtures

use crate::error::{BotError, Result};
use crate::format::MAX_MESSAGE_CHARS;
use crate::storage::BotStore;
use crate::telegram::{ChatId, MessageId, Messenger};
use crate::types::{Event, Market, Outcome};
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashSet;
use std::sync::Mutex;
use tempfile::TempDir;

/// Something the bot sent or edited
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    Sent {
        chat_id: ChatId,
        message_id: MessageId,
        text: String,
    },
    Edited {
        chat_id: ChatId,
        message_id: MessageId,
        text: String,
    },
}

impl Outgoing {
    pub fn chat_id(&self) -> ChatId {
        match self {
            Outgoing::Sent { chat_id, .. } | Outgoing::Edited { chat_id, .. } => *chat_id,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Outgoing::Sent { text, .. } | Outgoing::Edited { text, .. } => text,
        }
    }
}

/// Messenger that records everything and fails for selected chats.
/// Texts over Telegram's length limit are rejected.
#[derive(Default)]
pub struct RecordingMessenger {
    log: Mutex<Vec<Outgoing>>,
    failing: Mutex<HashSet<ChatId>>,
    /// Last message id handed out by `send`
    last_id: Mutex<MessageId>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, chat_id: ChatId) {
        self.failing.lock().unwrap().insert(chat_id);
    }

    pub fn outgoing(&self) -> Vec<Outgoing> {
        self.log.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.outgoing().iter().map(|o| o.text().to_string()).collect()
    }

    pub fn sent_to(&self, chat_id: ChatId) -> Vec<String> {
        self.outgoing()
            .iter()
            .filter(|o| matches!(o, Outgoing::Sent { .. }) && o.chat_id() == chat_id)
            .map(|o| o.text().to_string())
            .collect()
    }

    fn check(&self, chat_id: ChatId, text: &str) -> Result<()> {
        if self.failing.lock().unwrap().contains(&chat_id) {
            return Err(BotError::Telegram(format!(
                "sendMessage failed (403): Forbidden: bot was blocked by user {}",
                chat_id
            )));
        }
        if text.chars().count() > MAX_MESSAGE_CHARS {
            return Err(BotError::Telegram(
                "sendMessage failed (400): Bad Request: message is too long".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send(&self, chat_id: ChatId, text: &str) -> Result<MessageId> {
        self.check(chat_id, text)?;
        let message_id = {
            let mut last_id = self.last_id.lock().unwrap();
            *last_id += 1;
            *last_id
        };
        self.log.lock().unwrap().push(Outgoing::Sent {
            chat_id,
            message_id,
            text: text.to_string(),
        });
        Ok(message_id)
    }

    async fn edit(&self, chat_id: ChatId, message_id: MessageId, text: &str) -> Result<()> {
        self.check(chat_id, text)?;
        self.log.lock().unwrap().push(Outgoing::Edited {
            chat_id,
            message_id,
            text: text.to_string(),
        });
        Ok(())
    }
}

/// Binary market with Yes/No prices
pub fn binary_market(question: &str, yes: Decimal) -> Market {
    Market {
        id: format!("m-{}", question.len()),
        question: question.to_string(),
        end_date: None,
        liquidity: dec!(5000),
        volume: dec!(1000),
        outcomes: vec![
            Outcome {
                name: "Yes".to_string(),
                price: Some(yes),
            },
            Outcome {
                name: "No".to_string(),
                price: Some(Decimal::ONE - yes),
            },
        ],
    }
}

/// Event with one binary market and the given event-level volume
pub fn sample_event(id: &str, title: &str, volume: Decimal) -> Event {
    Event {
        id: id.to_string(),
        slug: title.to_lowercase().replace(' ', "-"),
        title: title.to_string(),
        description: None,
        end_date: None,
        liquidity: Some(dec!(5000)),
        volume: Some(volume),
        markets: vec![binary_market(title, dec!(0.5))],
    }
}

/// Store in a fresh temporary directory; keep the `TempDir` alive
pub async fn temp_store() -> (TempDir, BotStore) {
    let dir = TempDir::new().unwrap();
    let store = BotStore::open(dir.path(), 10_000).await.unwrap();
    (dir, store)
}
