//! Gamma API client for event data
//!
//! Lists freshly created events and resolves single events by slug.

use crate::error::{BotError, Result};
use crate::types::{Event, Market, Outcome};
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Gamma API client
#[derive(Clone)]
pub struct GammaClient {
    http: Client,
    base_url: String,
}

/// Raw event as returned by `/events`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GammaEvent {
    id: Option<Value>,
    #[serde(default)]
    slug: Option<String>,
    #[serde(default)]
    title: Option<String>,
    description: Option<String>,
    end_date: Option<String>,
    liquidity: Option<Value>,
    volume: Option<Value>,
    markets: Option<Vec<GammaMarket>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GammaMarket {
    id: Option<Value>,
    question: Option<String>,
    end_date: Option<String>,
    #[serde(rename = "end_date_iso")]
    end_date_iso: Option<String>,
    liquidity_num: Option<Value>,
    liquidity: Option<Value>,
    volume_num: Option<Value>,
    volume: Option<Value>,
    outcomes: Option<Value>,       // JSON string "[\"Yes\", \"No\"]" or array
    outcome_prices: Option<Value>, // JSON string "[\"0.55\", \"0.45\"]" or array
}

impl GammaClient {
    /// Create a new Gamma client
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Newest open events, newest first
    pub async fn list_events(&self, limit: usize) -> Result<Vec<Event>> {
        let query = [
            ("limit", limit.to_string()),
            ("offset", "0".to_string()),
            ("closed", "false".to_string()),
            ("order", "new".to_string()),
        ];
        let events = self.fetch_events(&query).await?;
        debug!("Gamma returned {} events", events.len());
        Ok(events)
    }

    /// Resolve a single event by its slug
    pub async fn get_event_by_slug(&self, slug: &str) -> Result<Event> {
        let query = [("slug", slug.to_string())];
        self.fetch_events(&query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BotError::EventNotFound(slug.to_string()))
    }

    async fn fetch_events(&self, query: &[(&str, String)]) -> Result<Vec<Event>> {
        let url = format!("{}/events", self.base_url);
        let response = self.http.get(&url).query(query).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::Api(format!("Gamma API error: {} - {}", status, body)));
        }

        let raw: Vec<GammaEvent> = response.json().await?;
        Ok(raw.into_iter().filter_map(Self::parse_event).collect())
    }

    fn parse_event(ge: GammaEvent) -> Option<Event> {
        let id = ge.id.as_ref().and_then(value_to_string)?;

        let markets = ge
            .markets
            .unwrap_or_default()
            .into_iter()
            .map(Self::parse_market)
            .collect();

        Some(Event {
            id,
            slug: ge.slug.unwrap_or_default(),
            title: ge.title.unwrap_or_else(|| "Unknown Event".to_string()),
            description: ge.description.filter(|d| !d.trim().is_empty()),
            end_date: ge.end_date.as_deref().and_then(parse_date),
            liquidity: ge.liquidity.as_ref().and_then(value_to_decimal),
            volume: ge.volume.as_ref().and_then(value_to_decimal),
            markets,
        })
    }

    fn parse_market(gm: GammaMarket) -> Market {
        let names: Vec<String> = gm
            .outcomes
            .as_ref()
            .map(parse_list)
            .unwrap_or_default()
            .iter()
            .filter_map(outcome_name)
            .collect();

        let prices: Vec<Option<Decimal>> = gm
            .outcome_prices
            .as_ref()
            .map(parse_list)
            .unwrap_or_default()
            .iter()
            .map(value_to_decimal)
            .collect();

        let outcomes = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| Outcome {
                name,
                price: prices.get(i).copied().flatten(),
            })
            .collect();

        let liquidity = gm
            .liquidity_num
            .as_ref()
            .or(gm.liquidity.as_ref())
            .and_then(value_to_decimal)
            .unwrap_or(Decimal::ZERO);
        let volume = gm
            .volume_num
            .as_ref()
            .or(gm.volume.as_ref())
            .and_then(value_to_decimal)
            .unwrap_or(Decimal::ZERO);

        Market {
            id: gm.id.as_ref().and_then(value_to_string).unwrap_or_default(),
            question: gm.question.unwrap_or_default(),
            end_date: gm
                .end_date
                .as_deref()
                .or(gm.end_date_iso.as_deref())
                .and_then(parse_date),
            liquidity,
            volume,
            outcomes,
        }
    }
}

/// Ids come back as strings or numbers depending on the endpoint
fn value_to_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_to_decimal(v: &Value) -> Option<Decimal> {
    match v {
        Value::Number(n) => n
            .to_string()
            .parse::<Decimal>()
            .ok()
            .or_else(|| Decimal::from_scientific(&n.to_string()).ok())
            .or_else(|| n.as_f64().and_then(|f| Decimal::try_from(f).ok())),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<Decimal>()
                .ok()
                .or_else(|| Decimal::from_scientific(s).ok())
        }
        _ => None,
    }
}

/// Lists are usually JSON encoded inside a string
fn parse_list(v: &Value) -> Vec<Value> {
    match v {
        Value::Array(items) => items.clone(),
        Value::String(s) => serde_json::from_str(s).unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn outcome_name(v: &Value) -> Option<String> {
    match v {
        Value::Object(map) => map.get("name").and_then(value_to_string),
        other => value_to_string(other),
    }
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
        })
}
