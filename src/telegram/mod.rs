//! Telegram Bot API transport and command parsing
//!
//! Commands: /start, /deal, /keywords, /pause, /resume, /help

pub mod handler;

#[cfg(test)]
mod tests;

pub use handler::CommandHandler;

use crate::config::TelegramConfig;
use crate::error::{BotError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tracing::{debug, error, info, warn};

pub type ChatId = i64;
pub type MessageId = i64;

/// Outbound messages; HTML parse mode
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send(&self, chat_id: ChatId, text: &str) -> Result<MessageId>;

    async fn edit(&self, chat_id: ChatId, message_id: MessageId, text: &str) -> Result<()>;
}

/// Commands understood by the bot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    /// Subscribe to notifications
    Start,
    /// Analyze one event; argument is a link or slug
    Deal(String),
    /// Show, set or clear keyword filters
    Keywords(String),
    Pause,
    Resume,
    Help,
    Unknown(String),
}

/// Parse a slash command; `None` for plain text
pub fn parse_command(text: &str) -> Option<BotCommand> {
    let rest = text.trim().strip_prefix('/')?;

    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((head, args)) => (head, args.trim()),
        None => (rest, ""),
    };
    // Remove @botname
    let name = head.split('@').next().unwrap_or(head);
    if name.is_empty() {
        return None;
    }

    let command = match name.to_lowercase().as_str() {
        "start" => BotCommand::Start,
        "deal" => BotCommand::Deal(args.to_string()),
        "keywords" => BotCommand::Keywords(args.to_string()),
        "pause" => BotCommand::Pause,
        "resume" => BotCommand::Resume,
        "help" => BotCommand::Help,
        _ => BotCommand::Unknown(name.to_string()),
    };
    Some(command)
}

/// A text message from a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub user_id: i64,
    pub chat_id: ChatId,
    pub text: String,
}

/// Telegram bot talking to the Bot API over HTTPS
pub struct TelegramBot {
    http: Client,
    base_url: String,
    poll_timeout_secs: u64,
    disable_link_preview: bool,
    last_update_id: RwLock<i64>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TelegramUpdate {
    update_id: i64,
    message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    message_id: i64,
    from: Option<TelegramUser>,
    chat: TelegramChat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramUser {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: i64,
}

#[derive(Debug, Serialize)]
struct GetUpdatesRequest {
    offset: i64,
    timeout: u64,
    allowed_updates: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: ChatId,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Serialize)]
struct EditMessageRequest<'a> {
    chat_id: ChatId,
    message_id: MessageId,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

impl TelegramMessage {
    fn into_incoming(self) -> Option<IncomingMessage> {
        let text = self.text?;
        let user_id = self.from.map(|u| u.id).unwrap_or(self.chat.id);
        Some(IncomingMessage {
            user_id,
            chat_id: self.chat.id,
            text,
        })
    }
}

impl TelegramBot {
    pub fn new(config: &TelegramConfig, bot_token: &str) -> Result<Self> {
        // Long polls hold the connection for poll_timeout_secs
        let http = Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs + 10))
            .build()?;

        Ok(Self {
            http,
            base_url: format!("{}/bot{}", config.api_url.trim_end_matches('/'), bot_token),
            poll_timeout_secs: config.poll_timeout_secs,
            disable_link_preview: config.disable_link_preview,
            last_update_id: RwLock::new(0),
        })
    }

    /// Receive commands until `shutdown` flips, one task per message
    pub async fn start_polling(
        self: Arc<Self>,
        handler: Arc<CommandHandler>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("Starting Telegram command listener...");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let updates = tokio::select! {
                _ = shutdown.changed() => break,
                result = self.poll_updates() => result,
            };

            match updates {
                Ok(updates) => {
                    for update in updates {
                        // Update offset
                        *self.last_update_id.write().await = update.update_id + 1;

                        let Some(message) = update.message else {
                            continue;
                        };
                        debug!("Update {} (message {})", update.update_id, message.message_id);

                        if let Some(incoming) = message.into_incoming() {
                            let handler = Arc::clone(&handler);
                            tokio::spawn(async move {
                                if let Err(e) = handler.handle(&incoming).await {
                                    error!("Failed to handle message from {}: {}", incoming.user_id, e);
                                }
                            });
                        }
                    }
                }
                Err(e) => {
                    error!("Failed to poll Telegram updates: {}", e);
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = tokio::time::sleep(Duration::from_secs(5)) => {}
                    }
                }
            }
        }

        info!("Telegram command listener stopped");
    }

    async fn poll_updates(&self) -> Result<Vec<TelegramUpdate>> {
        let offset = *self.last_update_id.read().await;
        let request = GetUpdatesRequest {
            offset,
            timeout: self.poll_timeout_secs,
            allowed_updates: vec!["message"],
        };
        self.call("getUpdates", &request).await
    }

    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, method);
        let response: ApiResponse<T> = self.http.post(&url).json(body).send().await?.json().await?;
        response.into_result(method)
    }
}

impl<T> ApiResponse<T> {
    fn into_result(self, method: &str) -> Result<T> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(BotError::Telegram(format!(
                "{} failed ({}): {}",
                method,
                self.error_code.unwrap_or_default(),
                self.description.unwrap_or_else(|| "no description".to_string())
            ))),
        }
    }
}

#[async_trait]
impl Messenger for TelegramBot {
    async fn send(&self, chat_id: ChatId, text: &str) -> Result<MessageId> {
        let request = SendMessageRequest {
            chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: self.disable_link_preview,
        };
        let message: TelegramMessage = self.call("sendMessage", &request).await?;
        Ok(message.message_id)
    }

    async fn edit(&self, chat_id: ChatId, message_id: MessageId, text: &str) -> Result<()> {
        let request = EditMessageRequest {
            chat_id,
            message_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: self.disable_link_preview,
        };
        // Result is the edited message, or `true` for inline messages
        match self
            .call::<_, serde_json::Value>("editMessageText", &request)
            .await
        {
            Ok(_) => Ok(()),
            Err(BotError::Telegram(msg)) if msg.contains("message is not modified") => {
                warn!("Edit of message {} in {} was a no-op", message_id, chat_id);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
