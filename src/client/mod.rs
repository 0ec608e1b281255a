//! Polymarket API clients
//!
//! `MarketApi` is the seam the notification loop and command handlers use;
//! `PolymarketClient` implements it over HTTP.

pub mod context;
pub mod gamma;

pub use context::ContextClient;
pub use gamma::GammaClient;

use crate::config::PolymarketConfig;
use crate::error::Result;
use crate::types::Event;
use async_trait::async_trait;
use std::time::Duration;

/// Read-only market data needed by the bot
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketApi: Send + Sync {
    /// Currently open events, newest first
    async fn list_events(&self, limit: usize) -> Result<Vec<Event>>;

    /// A single event by slug; `EventNotFound` if it does not resolve
    async fn get_event(&self, slug: &str) -> Result<Event>;

    /// AI-generated summary of the event
    async fn get_context(&self, event: &Event) -> Result<String>;
}

/// Combined Polymarket client
#[derive(Clone)]
pub struct PolymarketClient {
    pub gamma: GammaClient,
    pub context: ContextClient,
}

impl PolymarketClient {
    pub fn new(config: &PolymarketConfig) -> Result<Self> {
        let gamma = GammaClient::new(
            &config.gamma_url,
            Duration::from_secs(config.request_timeout_secs),
        )?;
        let context = ContextClient::new(
            &config.context_url,
            Duration::from_secs(config.context_timeout_secs),
            config.context_retries,
            Duration::from_millis(config.context_retry_delay_ms),
        )?;

        Ok(Self { gamma, context })
    }
}

#[async_trait]
impl MarketApi for PolymarketClient {
    async fn list_events(&self, limit: usize) -> Result<Vec<Event>> {
        self.gamma.list_events(limit).await
    }

    async fn get_event(&self, slug: &str) -> Result<Event> {
        self.gamma.get_event_by_slug(slug).await
    }

    async fn get_context(&self, event: &Event) -> Result<String> {
        self.context.fetch(&event.slug).await
    }
}

const EVENT_PATH: &str = "polymarket.com/event/";

fn is_slug_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-'
}

/// Extract an event slug from a Polymarket link or a bare slug
pub fn parse_event_link(input: &str) -> Option<String> {
    let input = input.trim();

    if let Some(pos) = input.to_ascii_lowercase().find(EVENT_PATH) {
        let slug: String = input[pos + EVENT_PATH.len()..]
            .chars()
            .take_while(|c| is_slug_char(*c))
            .collect();
        return (!slug.is_empty()).then_some(slug);
    }

    if !input.is_empty() && input.chars().all(is_slug_char) {
        return Some(input.to_string());
    }

    None
}
