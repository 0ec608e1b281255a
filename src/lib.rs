//! Polydictions Bot
//!
//! Telegram bot that announces new Polymarket events to subscribers,
//! filtered per subscriber by keyword, and analyzes single events on demand.
//!
//! ## Architecture
//!
//! ```text
//! Gamma API → EventMonitor (diff vs seen set) → Keyword Filter → Messenger → subscribers
//!                  ↑                                                 ↑
//!               BotStore (users, seen events, keywords, paused)      |
//!                  ↓                                                 |
//! Telegram getUpdates → CommandHandler (/start /deal /keywords ...) ─┘
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod filter;
pub mod format;
pub mod monitor;
pub mod storage;
pub mod telegram;
pub mod types;

#[cfg(test)]
mod testing;
