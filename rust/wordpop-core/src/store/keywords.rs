//! KeywordStore: in-memory keyword and message registry
//!
//! Holds the working keyword set, per-keyword custom messages and the global
//! avoidance message. Reads are synchronous; `load`/`refresh` pull a fresh
//! snapshot through `StorageSync`. The store never writes to persistence.

use std::collections::{HashMap, HashSet};

use crate::config::{default_keyword_message, DEFAULT_AVOIDANCE_MESSAGE};
use crate::scanner::DetectionState;
use crate::storage::{SettingsUpdate, StorageBackend, StorageError, StorageSync, StoredSettings};

const TAG: &str = "KeywordStore";

#[derive(Debug, Clone)]
pub struct KeywordStore {
    keywords: Vec<String>,
    custom_messages: HashMap<String, String>,
    avoidance_message: Option<String>,
    loaded: bool,
}

impl Default for KeywordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeywordStore {
    /// Empty store; every scan is a no-op until something is loaded.
    pub fn new() -> Self {
        Self {
            keywords: Vec::new(),
            custom_messages: HashMap::new(),
            avoidance_message: None,
            loaded: false,
        }
    }

    /// Current keywords, insertion order
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Custom message for `keyword`, or the templated default.
    pub fn message_for(&self, keyword: &str) -> String {
        match self.custom_messages.get(keyword) {
            Some(message) if !message.trim().is_empty() => message.clone(),
            _ => default_keyword_message(keyword),
        }
    }

    /// True when the user saved a non-empty message for `keyword`
    pub fn has_custom_message(&self, keyword: &str) -> bool {
        self.custom_messages
            .get(keyword)
            .is_some_and(|m| !m.trim().is_empty())
    }

    pub fn avoidance_message(&self) -> &str {
        match self.avoidance_message.as_deref() {
            Some(message) if !message.trim().is_empty() => message,
            _ => DEFAULT_AVOIDANCE_MESSAGE,
        }
    }

    /// Whether a snapshot has been applied at least once
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Load from storage and resolve with the keyword list. Never fails: on
    /// a storage error the store keeps what it had.
    pub async fn load<P, S>(&mut self, sync: &StorageSync<P, S>) -> Vec<String>
    where
        P: StorageBackend,
        S: StorageBackend,
    {
        let fetched = sync.fetch_settings().await;
        self.apply_loaded(fetched)
    }

    /// Second half of `load`, for callers that cannot hold the store across
    /// the fetch (the content script keeps it in a `RefCell`).
    pub fn apply_loaded(&mut self, fetched: Result<StoredSettings, StorageError>) -> Vec<String> {
        match fetched {
            Ok(settings) => self.apply_settings(settings),
            Err(e) => wp_error!(TAG, "Keeping current keywords, load failed: {}", e),
        }
        self.keywords.clone()
    }

    /// Forget cooldowns, then reload.
    pub async fn refresh<P, S>(
        &mut self,
        sync: &StorageSync<P, S>,
        state: &mut DetectionState,
    ) -> Vec<String>
    where
        P: StorageBackend,
        S: StorageBackend,
    {
        wp_info!(TAG, "Force refreshing keywords");
        state.clear_cooldowns();
        self.load(sync).await
    }

    /// Replace the whole store with `settings`.
    pub fn apply_settings(&mut self, settings: StoredSettings) {
        self.keywords = normalize_keywords(settings.keywords);
        self.custom_messages = settings.custom_messages;
        self.avoidance_message = Some(settings.avoidance_message);
        self.loaded = true;
        wp_info!(TAG, "Loaded {} keyword(s)", self.keywords.len());
    }

    /// Apply an external partial update. Returns the new keyword list when
    /// the keywords changed.
    pub fn apply_update(&mut self, update: SettingsUpdate) -> Option<Vec<String>> {
        if let Some(messages) = update.custom_messages {
            self.custom_messages = messages;
        }
        if let Some(message) = update.avoidance_message {
            self.avoidance_message = Some(message);
        }
        let keywords = update.keywords?;
        self.keywords = normalize_keywords(keywords);
        self.loaded = true;
        wp_info!(TAG, "Keywords updated externally: {:?}", self.keywords);
        Some(self.keywords.clone())
    }
}

/// Trim, drop empties, and collapse case-insensitive duplicates (first wins).
fn normalize_keywords(raw: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty() && seen.insert(k.to_lowercase()))
        .collect()
}
