//! Command handlers
//!
//! Each handler replies through `Messenger` and touches state only through
//! `BotStore`.

use super::{parse_command, BotCommand, ChatId, IncomingMessage, Messenger};
use crate::client::{parse_event_link, MarketApi};
use crate::error::{BotError, Result};
use crate::filter::parse_keywords;
use crate::format::{escape_html, format_context_messages, format_event};
use crate::storage::BotStore;
use crate::types::UserId;
use std::sync::Arc;
use tracing::{error, info, warn};

pub const WELCOME_TEXT: &str = "🎯 <b>Welcome to Polydictions Bot</b>\n\n\
Track and analyze Polymarket events.\n\n\
<b>Commands:</b>\n\
📊 /deal &lt;link&gt; - Analyze event\n\
🔔 /start - Subscribe to notifications\n\
🔍 /keywords - Set keyword filters\n\
⏸️ /pause - Pause notifications\n\
▶️ /resume - Resume notifications\n\
❓ /help - Help\n\n\
You're now subscribed to new events! 🔔\n\n\
💡 <b>Pro tip:</b> Use /keywords to filter events (btc, eth, election, sports, etc.)";

pub const HELP_TEXT: &str = "<b>Polydictions Bot</b>\n\n\
<b>Commands:</b>\n\
/deal &lt;link&gt; - Analyze event with Market Context\n\
\x20 Example: /deal https://polymarket.com/event/event-slug\n\n\
/start - Subscribe to notifications\n\
/pause - Pause notifications\n\
/resume - Resume notifications\n\
/keywords - Manage keyword filters\n\
/help - Show help\n\n\
<b>Features:</b>\n\
• Event statistics &amp; current odds\n\
• Total liquidity &amp; volume\n\
• 🧠 AI-powered Market Context analysis\n\
• Auto notifications for new events\n\
• 🔍 Keyword filtering (btc, eth, election, sports, etc.)\n\
• ⏸️ Pause/resume notifications anytime";

const KEYWORDS_USAGE: &str = "<b>How to use:</b>\n\
/keywords btc, eth, election - Set keywords\n\
/keywords clear - Remove all filters\n\n\
<b>Filter options:</b>\n\
• Simple words: btc, eth, sports\n\
• Phrases: \"united states\", \"world cup\"\n\
• OR logic: keywords separated by commas\n\n\
<b>Examples:</b>\n\
• <code>btc, eth</code> → any event with btc OR eth\n\
• <code>\"united states\", election</code> → phrase + word\n\
• <code>sports, football, basketball</code> → any sports event";

pub const DEAL_USAGE_TEXT: &str = "❌ Please provide a Polymarket link.\n\n\
Example:\n/deal https://polymarket.com/event/your-event-slug";

pub const INVALID_LINK_TEXT: &str = "❌ Invalid Polymarket URL";
pub const FETCHING_TEXT: &str = "⏳ Fetching event data...";
pub const EVENT_NOT_FOUND_TEXT: &str = "❌ Event not found";
pub const CONTEXT_PENDING_TEXT: &str =
    "🧠 Generating Market Context... (this may take 10-30 seconds)";

pub const CONTEXT_FAILED_TEXT: &str = "⚠️ Market Context generation failed.\n\n\
This can happen if:\n\
• The event is too new\n\
• The API is temporarily unavailable\n\
• The event doesn't have enough data\n\n\
Check bot logs for details.";

pub const NO_KEYWORDS_TEXT: &str = "You don't have any keyword filters set.";
pub const EMPTY_KEYWORDS_TEXT: &str = "❌ Please provide at least one keyword.";
pub const ALREADY_PAUSED_TEXT: &str =
    "You're already paused. Use /resume to resume notifications.";
pub const NOT_PAUSED_TEXT: &str = "You're not paused. Notifications are already active!";

/// Dispatches parsed commands
pub struct CommandHandler {
    store: Arc<BotStore>,
    api: Arc<dyn MarketApi>,
    messenger: Arc<dyn Messenger>,
}

impl CommandHandler {
    pub fn new(store: Arc<BotStore>, api: Arc<dyn MarketApi>, messenger: Arc<dyn Messenger>) -> Self {
        Self {
            store,
            api,
            messenger,
        }
    }

    /// Handle one incoming message; plain text is ignored
    pub async fn handle(&self, message: &IncomingMessage) -> Result<()> {
        let Some(command) = parse_command(&message.text) else {
            return Ok(());
        };
        info!("Received command from {}: {:?}", message.user_id, command);

        let chat = message.chat_id;
        let user = message.user_id;

        match command {
            BotCommand::Start => self.start(chat, user).await,
            BotCommand::Deal(args) => self.deal(chat, &args).await,
            BotCommand::Keywords(args) => self.keywords(chat, user, &args).await,
            BotCommand::Pause => self.pause(chat, user).await,
            BotCommand::Resume => self.resume(chat, user).await,
            BotCommand::Help => self.reply(chat, HELP_TEXT).await,
            BotCommand::Unknown(name) => {
                let text = format!(
                    "❓ Unknown command: /{}\nUse /help for available commands",
                    escape_html(&name)
                );
                self.reply(chat, &text).await
            }
        }
    }

    async fn reply(&self, chat: ChatId, text: &str) -> Result<()> {
        self.messenger.send(chat, text).await.map(|_| ())
    }

    async fn start(&self, chat: ChatId, user: UserId) -> Result<()> {
        self.store.subscribe(user).await;
        self.reply(chat, WELCOME_TEXT).await
    }

    async fn deal(&self, chat: ChatId, args: &str) -> Result<()> {
        if args.is_empty() {
            return self.reply(chat, DEAL_USAGE_TEXT).await;
        }
        let Some(slug) = parse_event_link(args) else {
            return self.reply(chat, INVALID_LINK_TEXT).await;
        };

        let status = self.messenger.send(chat, FETCHING_TEXT).await?;

        let event = match self.api.get_event(&slug).await {
            Ok(event) => event,
            Err(BotError::EventNotFound(_)) => {
                info!("Event {} not found", slug);
                return self.messenger.edit(chat, status, EVENT_NOT_FOUND_TEXT).await;
            }
            Err(e) => {
                if e.is_user_facing() {
                    info!("Rejected /deal for {}: {}", slug, e);
                } else {
                    error!("Error in /deal for {}: {}", slug, e);
                }
                let text = format!("❌ Error: {}", escape_html(&e.to_string()));
                return self.messenger.edit(chat, status, &text).await;
            }
        };

        if let Err(e) = self.messenger.edit(chat, status, &format_event(&event)).await {
            error!("Failed to show event {}: {}", slug, e);
            let text = format!("❌ Error: {}", escape_html(&e.to_string()));
            return self.messenger.edit(chat, status, &text).await;
        }

        let pending = self.messenger.send(chat, CONTEXT_PENDING_TEXT).await?;
        match self.api.get_context(&event).await {
            Ok(context) => {
                let mut parts = format_context_messages(&context).into_iter();
                if let Some(first) = parts.next() {
                    self.messenger.edit(chat, pending, &first).await?;
                }
                for part in parts {
                    self.messenger.send(chat, &part).await?;
                }
            }
            Err(e) => {
                warn!("Market context unavailable for {}: {}", event.slug, e);
                self.messenger.edit(chat, pending, CONTEXT_FAILED_TEXT).await?;
            }
        }

        info!("Chat {} checked event {}", chat, slug);
        Ok(())
    }

    async fn keywords(&self, chat: ChatId, user: UserId, args: &str) -> Result<()> {
        if args.is_empty() {
            let current = self.store.keywords(user).await;
            let text = if current.is_empty() {
                format!(
                    "<b>Keyword Filters</b>\n\n\
                     Filter events by keywords to see only what matters!\n\n\
                     {}\n\n\
                     Currently no filters set - you'll receive all events.",
                    KEYWORDS_USAGE
                )
            } else {
                format!(
                    "<b>Your current keywords:</b>\n{}\n\n{}\n\n\
                     Only events matching your keywords will be sent!",
                    escape_html(&current.join(", ")),
                    KEYWORDS_USAGE
                )
            };
            return self.reply(chat, &text).await;
        }

        if args.eq_ignore_ascii_case("clear") {
            let text = if self.store.clear_keywords(user).await {
                "✅ All keyword filters removed. You'll receive all events."
            } else {
                NO_KEYWORDS_TEXT
            };
            return self.reply(chat, text).await;
        }

        let keywords = parse_keywords(args);
        if keywords.is_empty() {
            return self.reply(chat, EMPTY_KEYWORDS_TEXT).await;
        }

        let listing = keywords
            .iter()
            .map(|k| format!("  • {}", escape_html(k)))
            .collect::<Vec<_>>()
            .join("\n");
        self.store.set_keywords(user, keywords).await;

        let text = format!(
            "✅ <b>Keywords saved!</b>\n\n\
             You will only receive events matching:\n{}\n\n\
             Use /keywords clear to remove filters.",
            listing
        );
        self.reply(chat, &text).await
    }

    async fn pause(&self, chat: ChatId, user: UserId) -> Result<()> {
        if !self.store.pause(user).await {
            return self.reply(chat, ALREADY_PAUSED_TEXT).await;
        }
        self.reply(
            chat,
            "⏸️ <b>Notifications paused</b>\n\n\
             You won't receive any new event notifications.\n\n\
             Use /resume when you want to resume notifications.",
        )
        .await
    }

    async fn resume(&self, chat: ChatId, user: UserId) -> Result<()> {
        if !self.store.resume(user).await {
            return self.reply(chat, NOT_PAUSED_TEXT).await;
        }

        let keywords = self.store.keywords(user).await;
        let filters = if keywords.is_empty() {
            String::new()
        } else {
            format!("\n\n🔍 Active filters: {}", escape_html(&keywords.join(", ")))
        };

        let text = format!(
            "▶️ <b>Notifications resumed</b>\n\n\
             You'll receive new event notifications again!{}",
            filters
        );
        self.reply(chat, &text).await
    }
}
