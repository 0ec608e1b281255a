//! Bot state and its persistence
//!
//! `BotStore` owns subscribers, keyword filters, paused flags and the seen
//! set. Everything lives in memory behind one lock; each mutation rewrites
//! the affected JSON file while the lock is held, so writes never interleave.

pub mod files;
pub mod seen;


pub use files::{Collection, EventList, JsonFileStore, KeywordMap, UserList};
pub use seen::SeenSet;

use crate::error::Result;
use crate::types::UserId;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::{error, info};

/// A subscriber who should receive notifications, with its filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub user_id: UserId,
    pub keywords: Vec<String>,
}

#[derive(Debug, Default)]
struct State {
    subscribers: BTreeSet<UserId>,
    paused: BTreeSet<UserId>,
    keywords: KeywordMap,
    seen: SeenSet,
}

pub struct BotStore {
    files: JsonFileStore,
    state: RwLock<State>,
}

impl BotStore {
    /// Load all collections from `dir`; any read or parse failure is an error
    pub async fn open(dir: impl Into<PathBuf>, max_seen_events: usize) -> Result<Self> {
        let files = JsonFileStore::new(dir);

        let subscribers: UserList = files.load(Collection::Subscribers).await?;
        let paused: UserList = files.load(Collection::Paused).await?;
        let keywords: KeywordMap = files.load(Collection::Keywords).await?;
        let seen: EventList = files.load(Collection::SeenEvents).await?;

        let state = State {
            subscribers: subscribers.users.into_iter().collect(),
            paused: paused.users.into_iter().collect(),
            keywords,
            seen: SeenSet::from_ids(seen.events, max_seen_events),
        };

        info!(
            "Loaded state from {}: {} subscribers, {} paused, {} filters, {} seen events",
            files.dir().display(),
            state.subscribers.len(),
            state.paused.len(),
            state.keywords.len(),
            state.seen.len()
        );

        Ok(Self {
            files,
            state: RwLock::new(state),
        })
    }

    /// Returns true if the user was not subscribed before
    pub async fn subscribe(&self, user: UserId) -> bool {
        let mut state = self.state.write().await;
        if !state.subscribers.insert(user) {
            return false;
        }
        info!("New subscriber {} ({} total)", user, state.subscribers.len());
        self.persist(&state, Collection::Subscribers).await;
        true
    }

    pub async fn subscribers(&self) -> Vec<UserId> {
        self.state.read().await.subscribers.iter().copied().collect()
    }

    pub async fn is_subscribed(&self, user: UserId) -> bool {
        self.state.read().await.subscribers.contains(&user)
    }

    /// Returns true if the user was not paused before
    pub async fn pause(&self, user: UserId) -> bool {
        let mut state = self.state.write().await;
        if !state.paused.insert(user) {
            return false;
        }
        info!("User {} paused notifications", user);
        self.persist(&state, Collection::Paused).await;
        true
    }

    /// Returns true if the user was paused before
    pub async fn resume(&self, user: UserId) -> bool {
        let mut state = self.state.write().await;
        if !state.paused.remove(&user) {
            return false;
        }
        info!("User {} resumed notifications", user);
        self.persist(&state, Collection::Paused).await;
        true
    }

    pub async fn is_paused(&self, user: UserId) -> bool {
        self.state.read().await.paused.contains(&user)
    }

    /// Empty when the user has no filter
    pub async fn keywords(&self, user: UserId) -> Vec<String> {
        self.state
            .read()
            .await
            .keywords
            .get(&user)
            .cloned()
            .unwrap_or_default()
    }

    /// Replace the user's filter; an empty list removes it
    pub async fn set_keywords(&self, user: UserId, keywords: Vec<String>) {
        if keywords.is_empty() {
            self.clear_keywords(user).await;
            return;
        }

        let mut state = self.state.write().await;
        info!("User {} set keywords {:?}", user, keywords);
        state.keywords.insert(user, keywords);
        self.persist(&state, Collection::Keywords).await;
    }

    /// Returns true if a filter was removed
    pub async fn clear_keywords(&self, user: UserId) -> bool {
        let mut state = self.state.write().await;
        if state.keywords.remove(&user).is_none() {
            return false;
        }
        info!("User {} cleared keywords", user);
        self.persist(&state, Collection::Keywords).await;
        true
    }

    pub async fn is_seen(&self, event_id: &str) -> bool {
        self.state.read().await.seen.contains(event_id)
    }

    pub async fn seen_count(&self) -> usize {
        self.state.read().await.seen.len()
    }

    /// Mark ids as seen and persist; returns how many were new
    pub async fn mark_seen<I>(&self, ids: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let mut state = self.state.write().await;
        let added = ids
            .into_iter()
            .filter(|id| state.seen.insert(id.clone()))
            .count();

        if added > 0 {
            self.persist(&state, Collection::SeenEvents).await;
        }
        added
    }

    /// Non-paused subscribers with their filters, ordered by user id
    pub async fn recipients(&self) -> Vec<Recipient> {
        let state = self.state.read().await;
        state
            .subscribers
            .iter()
            .filter(|user| !state.paused.contains(user))
            .map(|user| Recipient {
                user_id: *user,
                keywords: state.keywords.get(user).cloned().unwrap_or_default(),
            })
            .collect()
    }

    /// Write one collection; failures are logged and memory stays authoritative
    async fn persist(&self, state: &State, collection: Collection) {
        let result = match collection {
            Collection::Subscribers => {
                let list = UserList {
                    users: state.subscribers.iter().copied().collect(),
                };
                self.files.save(collection, &list).await
            }
            Collection::Paused => {
                let list = UserList {
                    users: state.paused.iter().copied().collect(),
                };
                self.files.save(collection, &list).await
            }
            Collection::Keywords => self.files.save(collection, &state.keywords).await,
            Collection::SeenEvents => {
                let list = EventList {
                    events: state.seen.to_vec(),
                };
                self.files.save(collection, &list).await
            }
        };

        if let Err(e) = result {
            error!("Failed to save {}: {}", collection.file_name(), e);
        }
    }
}
