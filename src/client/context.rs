//! AI-generated market context
//!
//! Polymarket exposes a Grok-backed summary endpoint keyed by event slug.
//! Responses are plain text, optionally followed by a `__SOURCES__` block.

use crate::error::{BotError, Result};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{info, warn};

/// Marker separating the summary from its source list
const SOURCES_MARKER: &str = "__SOURCES__";

/// Responses this short are placeholders, not summaries
const MIN_CONTEXT_CHARS: usize = 50;

#[derive(Clone)]
pub struct ContextClient {
    http: Client,
    url: String,
    retries: u32,
    retry_delay: Duration,
}

/// Outcome of a single attempt
enum Attempt {
    Done(String),
    Retry(String),
}

impl ContextClient {
    pub fn new(url: &str, timeout: Duration, retries: u32, retry_delay: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            url: url.to_string(),
            retries,
            retry_delay,
        })
    }

    /// Fetch the summary for an event slug, retrying transient failures
    pub async fn fetch(&self, slug: &str) -> Result<String> {
        if slug.is_empty() {
            return Err(BotError::InvalidInput("event slug is empty".into()));
        }

        let mut attempt = 0;
        loop {
            info!(
                "Fetching market context for {} (attempt {}/{})",
                slug,
                attempt + 1,
                self.retries + 1
            );

            match self.attempt(slug).await? {
                Attempt::Done(text) => return Ok(text),
                Attempt::Retry(reason) if attempt < self.retries => {
                    warn!("Market context attempt failed ({}), retrying", reason);
                    attempt += 1;
                    tokio::time::sleep(self.retry_delay).await;
                }
                Attempt::Retry(reason) => return Err(BotError::Api(reason)),
            }
        }
    }

    async fn attempt(&self, slug: &str) -> Result<Attempt> {
        let response = match self
            .http
            .post(&self.url)
            .query(&[("prompt", slug)])
            .header("Content-Type", "application/json")
            .header("Accept", "*/*")
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) if e.is_timeout() => return Ok(Attempt::Retry("request timed out".into())),
            Err(e) => return Err(e.into()),
        };

        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::BAD_REQUEST {
            return Err(BotError::InvalidInput(format!("context rejected slug {}", slug)));
        }
        if status.is_server_error() {
            return Ok(Attempt::Retry(format!("server error {}", status)));
        }
        if !status.is_success() {
            return Err(BotError::Api(format!("context API error: {} - {}", status, body)));
        }

        match clean_context(&body) {
            Some(text) => {
                info!("Got market context ({} chars)", text.chars().count());
                Ok(Attempt::Done(text))
            }
            None => Ok(Attempt::Retry(format!(
                "response too short ({} chars)",
                body.chars().count()
            ))),
        }
    }
}

/// Strip the sources block; `None` when what remains is too short to use
pub fn clean_context(body: &str) -> Option<String> {
    let text = body
        .split(SOURCES_MARKER)
        .next()
        .unwrap_or_default()
        .trim();

    if text.chars().count() > MIN_CONTEXT_CHARS {
        Some(text.to_string())
    } else {
        None
    }
}
