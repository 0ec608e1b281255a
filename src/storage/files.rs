//! Flat JSON files, one per collection
//!
//! Every save overwrites the whole file. A missing file loads as the
//! collection's default value.

use crate::error::{BotError, Result};
use crate::types::UserId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The four persisted collections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Subscribers,
    SeenEvents,
    Keywords,
    Paused,
}

impl Collection {
    pub fn file_name(self) -> &'static str {
        match self {
            Collection::Subscribers => "users.json",
            Collection::SeenEvents => "seen_events.json",
            Collection::Keywords => "keywords.json",
            Collection::Paused => "paused_users.json",
        }
    }
}

/// `{"users": [...]}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserList {
    #[serde(default)]
    pub users: Vec<UserId>,
}

/// `{"events": [...]}`, oldest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventList {
    #[serde(default)]
    pub events: Vec<String>,
}

/// `{"<user id>": ["kw", ...]}`
pub type KeywordMap = BTreeMap<UserId, Vec<String>>;

/// Reads and writes collections under one data directory
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, collection: Collection) -> PathBuf {
        self.dir.join(collection.file_name())
    }

    pub async fn load<T>(&self, collection: Collection) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        let path = self.path(collection);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("{} not found, starting empty", path.display());
                return Ok(T::default());
            }
            Err(e) => return Err(storage_error(&path, e)),
        };

        if content.trim().is_empty() {
            return Ok(T::default());
        }

        serde_json::from_str(&content).map_err(|e| storage_error(&path, e))
    }

    pub async fn save<T>(&self, collection: Collection, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        let path = self.path(collection);
        let content = serde_json::to_string_pretty(value).map_err(|e| storage_error(&path, e))?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| storage_error(&self.dir, e))?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| storage_error(&path, e))?;

        debug!("Saved {}", path.display());
        Ok(())
    }
}

fn storage_error(path: &Path, cause: impl std::fmt::Display) -> BotError {
    BotError::Storage {
        path: path.display().to_string(),
        message: cause.to_string(),
    }
}
