//! Core records shared across the bot

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Telegram user identifier
pub type UserId = i64;

/// Base URL of public event pages
pub const EVENT_URL_BASE: &str = "https://polymarket.com/event/";

/// A Polymarket event (one question, one or more markets)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub end_date: Option<DateTime<Utc>>,
    /// Event-level totals, when the API provides them
    pub liquidity: Option<Decimal>,
    pub volume: Option<Decimal>,
    pub markets: Vec<Market>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub id: String,
    pub question: String,
    pub end_date: Option<DateTime<Utc>>,
    pub liquidity: Decimal,
    pub volume: Decimal,
    pub outcomes: Vec<Outcome>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub name: String,
    pub price: Option<Decimal>,
}

impl Event {
    /// Public page of the event
    pub fn link(&self) -> String {
        format!("{}{}", EVENT_URL_BASE, self.slug)
    }

    /// Lowercased title, description and market questions
    pub fn searchable_text(&self) -> String {
        let mut parts: Vec<&str> = vec![self.title.as_str()];
        if let Some(desc) = &self.description {
            parts.push(desc.as_str());
        }
        parts.extend(self.markets.iter().map(|m| m.question.as_str()));
        parts.join(" ").to_lowercase()
    }

    /// (liquidity, volume): event totals if both present, else summed over markets
    pub fn totals(&self) -> (Decimal, Decimal) {
        match (self.liquidity, self.volume) {
            (Some(liquidity), Some(volume)) => (liquidity, volume),
            _ => self.markets.iter().fold(
                (Decimal::ZERO, Decimal::ZERO),
                |(liq, vol), m| (liq + m.liquidity, vol + m.volume),
            ),
        }
    }

    /// Volume used for staleness checks; missing counts as zero
    pub fn volume_or_zero(&self) -> Decimal {
        self.volume.unwrap_or(Decimal::ZERO)
    }

    /// Event end date, falling back to the first market's
    pub fn closes_at(&self) -> Option<DateTime<Utc>> {
        self.end_date
            .or_else(|| self.markets.first().and_then(|m| m.end_date))
    }
}

impl Market {
    /// Whether the market has both outcomes and at least one price
    pub fn has_prices(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.iter().any(|o| o.price.is_some())
    }
}
