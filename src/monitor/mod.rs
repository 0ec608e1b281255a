//! Notification loop
//!
//! Every `check_interval` the newest events are fetched, diffed against the
//! seen set and announced to matching subscribers. No cycle runs until the
//! seen set has been primed.
//!
//! ```text
//! Idle -> Fetching -> Diffing -> Dispatching -> Idle
//!           |            |
//!           | error      | seen set saved before any send
//!           v            v
//!          Idle      Dispatching
//! ```


use crate::client::MarketApi;
use crate::config::MonitorConfig;
use crate::error::Result;
use crate::filter;
use crate::format::format_notification;
use crate::storage::BotStore;
use crate::telegram::Messenger;
use crate::types::Event;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Counters for one poll cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub new_events: usize,
    pub already_seen: usize,
    /// Unseen but above the stale volume threshold; marked seen silently
    pub filtered_high_volume: usize,
    pub delivered: usize,
    pub skipped_paused: usize,
    pub skipped_filtered: usize,
    pub failed: usize,
}

impl CycleReport {
    fn log(&self) {
        if self.new_events == 0 && self.filtered_high_volume == 0 {
            debug!(
                "No new events ({} fetched, {} already seen)",
                self.fetched, self.already_seen
            );
            return;
        }
        info!(
            fetched = self.fetched,
            new = self.new_events,
            already_seen = self.already_seen,
            filtered_high_volume = self.filtered_high_volume,
            delivered = self.delivered,
            skipped_paused = self.skipped_paused,
            skipped_filtered = self.skipped_filtered,
            failed = self.failed,
            "Poll cycle complete"
        );
    }
}

/// Polls for new events and notifies subscribers
pub struct EventMonitor {
    store: Arc<BotStore>,
    api: Arc<dyn MarketApi>,
    messenger: Arc<dyn Messenger>,
    config: MonitorConfig,
    primed: AtomicBool,
}

impl EventMonitor {
    pub fn new(
        store: Arc<BotStore>,
        api: Arc<dyn MarketApi>,
        messenger: Arc<dyn Messenger>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            store,
            api,
            messenger,
            config,
            primed: AtomicBool::new(false),
        }
    }

    pub fn is_primed(&self) -> bool {
        self.primed.load(Ordering::Acquire)
    }

    /// Seed the seen set so the first cycle does not announce old events.
    /// Returns how many ids were added.
    pub async fn prime(&self) -> Result<usize> {
        let seen = self.store.seen_count().await;

        if seen == 0 {
            info!(
                "Seen events is empty, initializing with recent {} events...",
                self.config.prime_limit
            );
            let events = self.api.list_events(self.config.prime_limit).await?;
            // Gamma lists newest first; insert oldest first so eviction
            // drops the oldest ids
            let added = self
                .store
                .mark_seen(events.into_iter().rev().map(|e| e.id))
                .await;
            info!("Initialized with {} events", added);
            self.primed.store(true, Ordering::Release);
            return Ok(added);
        }

        info!("Using {} seen events from storage, refreshing to catch gaps", seen);
        let events = self.api.list_events(self.config.refresh_limit).await?;

        let mut missed = Vec::new();
        for event in events {
            // Resurfaced old events carry volume; brand new ones do not
            if event.volume_or_zero() > self.config.missed_volume_threshold
                && !self.store.is_seen(&event.id).await
            {
                missed.push(event.id);
            }
        }

        let added = self.store.mark_seen(missed.into_iter().rev()).await;
        if added > 0 {
            info!("Added {} missed events to seen list", added);
        }
        self.primed.store(true, Ordering::Release);
        Ok(added)
    }

    /// One Fetching -> Diffing -> Dispatching pass
    pub async fn poll_once(&self) -> Result<CycleReport> {
        let events = self.api.list_events(self.config.poll_limit).await?;

        let mut report = CycleReport {
            fetched: events.len(),
            ..Default::default()
        };

        let mut batch_ids = HashSet::new();
        let mut mark = Vec::new();
        let mut fresh = Vec::new();

        for event in events {
            if self.store.is_seen(&event.id).await || !batch_ids.insert(event.id.clone()) {
                report.already_seen += 1;
                continue;
            }

            mark.push(event.id.clone());
            if event.volume_or_zero() > self.config.stale_volume_threshold {
                debug!(
                    "Skipping high-volume event {} ({}), likely resurfaced",
                    event.id, event.title
                );
                report.filtered_high_volume += 1;
                continue;
            }
            fresh.push(event);
        }

        report.new_events = fresh.len();
        self.store.mark_seen(mark.into_iter().rev()).await;

        if !fresh.is_empty() {
            self.dispatch(&fresh, &mut report).await;
        }

        Ok(report)
    }

    async fn dispatch(&self, events: &[Event], report: &mut CycleReport) {
        let recipients = self.store.recipients().await;
        let paused = self
            .store
            .subscribers()
            .await
            .len()
            .saturating_sub(recipients.len());
        let delay = self.config.send_delay();
        let mut sent_any = false;

        for event in events {
            info!("New event: {} ({})", event.title, event.id);
            report.skipped_paused += paused;

            let text = format_notification(event);
            let searchable = event.searchable_text();

            for recipient in &recipients {
                if !recipient.keywords.is_empty()
                    && !filter::matches_text(&searchable, &recipient.keywords)
                {
                    report.skipped_filtered += 1;
                    continue;
                }

                if sent_any && !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                sent_any = true;

                match self.messenger.send(recipient.user_id, &text).await {
                    Ok(_) => report.delivered += 1,
                    Err(e) => {
                        warn!(
                            "Failed to notify {} about {}: {}",
                            recipient.user_id, event.id, e
                        );
                        report.failed += 1;
                    }
                }
            }
        }
    }

    /// One scheduled step: prime if that has not succeeded yet, then poll.
    /// A failed prime skips the poll.
    pub async fn tick(&self) -> Result<CycleReport> {
        if !self.is_primed() {
            self.prime().await?;
        }
        self.poll_once().await
    }

    /// Prime, then poll on a fixed interval until `shutdown` flips
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let seen = self.store.seen_count().await;
        info!(
            "Starting event monitoring every {:?} with {} seen events",
            self.config.check_interval(),
            seen
        );

        if let Err(e) = self.prime().await {
            error!("Failed to prime seen events: {}", e);
        }

        let period = self.config.check_interval();
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = shutdown.changed() => break,
                _ = interval.tick() => {
                    let primed = self.is_primed();
                    match self.tick().await {
                        Ok(report) => report.log(),
                        Err(e) if primed => error!("Failed to fetch events: {}", e),
                        Err(e) => error!("Failed to prime seen events, retrying next cycle: {}", e),
                    }
                }
            }
        }

        info!("Event monitoring stopped");
    }
}
