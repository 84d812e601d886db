//! StorageSync: bridges the keyword store to persistence
//!
//! Reads go to the primary backend (`chrome.storage.sync`) first; keys it
//! lacks are looked up in the secondary backend (`localStorage`). A key that
//! neither backend holds is defaulted and the default is written back to the
//! active backend, so the next read is consistent.
//!
//! Values are decoded one key at a time. A corrupt value is logged, treated
//! as absent and ends up replaced by its default.
//!
//! A backend whose read *failed* says nothing about which keys exist. Keys
//! left unresolved after such a failure are never defaulted; `fetch` returns
//! the error instead, so a transient failure cannot overwrite saved settings.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use super::backend::{RawEntries, StorageBackend};
use super::error::StorageError;
use crate::config::{
    AVOIDANCE_MESSAGE_KEY, CUSTOM_MESSAGES_KEY, DEFAULT_AVOIDANCE_MESSAGE, KEYWORDS_KEY,
    SETTINGS_KEYS,
};

const TAG: &str = "StorageSync";

// =============================================================================
// Types
// =============================================================================

/// Snapshot of everything the engine reads from storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSettings {
    pub keywords: Vec<String>,
    pub custom_messages: HashMap<String, String>,
    pub avoidance_message: String,
}

impl Default for StoredSettings {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            custom_messages: HashMap::new(),
            avoidance_message: DEFAULT_AVOIDANCE_MESSAGE.to_string(),
        }
    }
}

impl StoredSettings {
    /// Build from decoded values; missing keys fall back to defaults.
    pub fn from_values(values: &HashMap<String, Value>) -> Self {
        let mut settings = Self::default();
        if let Some(v) = values.get(KEYWORDS_KEY) {
            if let Ok(keywords) = serde_json::from_value(v.clone()) {
                settings.keywords = keywords;
            }
        }
        if let Some(v) = values.get(CUSTOM_MESSAGES_KEY) {
            if let Ok(messages) = serde_json::from_value(v.clone()) {
                settings.custom_messages = messages;
            }
        }
        if let Some(v) = values.get(AVOIDANCE_MESSAGE_KEY) {
            if let Ok(message) = serde_json::from_value(v.clone()) {
                settings.avoidance_message = message;
            }
        }
        settings
    }
}

/// One entry of a `chrome.storage.onChanged` notification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageChange {
    #[serde(default)]
    pub old_value: Option<Value>,
    #[serde(default)]
    pub new_value: Option<Value>,
}

/// Partial settings update extracted from an external change.
/// `None` means the key did not change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsUpdate {
    pub keywords: Option<Vec<String>>,
    pub custom_messages: Option<HashMap<String, String>>,
    pub avoidance_message: Option<String>,
}

impl SettingsUpdate {
    /// Extract the new values of the three settings keys. Other keys are
    /// ignored. A removed key (no `newValue`) maps to its default, and so does
    /// a value of the wrong shape.
    pub fn from_changes(changes: &HashMap<String, StorageChange>) -> Self {
        Self {
            keywords: changes
                .get(KEYWORDS_KEY)
                .map(|c| decode_change(KEYWORDS_KEY, c)),
            custom_messages: changes
                .get(CUSTOM_MESSAGES_KEY)
                .map(|c| decode_change(CUSTOM_MESSAGES_KEY, c)),
            avoidance_message: changes
                .get(AVOIDANCE_MESSAGE_KEY)
                .map(|c| decode_change::<String>(AVOIDANCE_MESSAGE_KEY, c)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_none() && self.custom_messages.is_none() && self.avoidance_message.is_none()
    }
}

fn decode_change<T>(key: &str, change: &StorageChange) -> T
where
    T: serde::de::DeserializeOwned + Default,
{
    match &change.new_value {
        None | Some(Value::Null) => default_for(key),
        Some(v) => serde_json::from_value(v.clone()).unwrap_or_else(|e| {
            wp_error!(TAG, "Ignoring malformed change for {}: {}", key, e);
            default_for(key)
        }),
    }
}

fn default_for<T>(key: &str) -> T
where
    T: serde::de::DeserializeOwned + Default,
{
    default_value(key)
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}

/// First-run default for a settings key
pub fn default_value(key: &str) -> Option<Value> {
    match key {
        KEYWORDS_KEY => Some(Value::Array(Vec::new())),
        CUSTOM_MESSAGES_KEY => Some(Value::Object(serde_json::Map::new())),
        AVOIDANCE_MESSAGE_KEY => Some(Value::String(DEFAULT_AVOIDANCE_MESSAGE.to_string())),
        _ => None,
    }
}

/// Decode raw JSON text for `key`, checking the shape of known keys.
pub fn decode_value(key: &str, text: &str) -> Result<Value, StorageError> {
    let corrupt = |e: serde_json::Error| StorageError::Corrupt {
        key: key.to_string(),
        message: e.to_string(),
    };
    let value: Value = serde_json::from_str(text).map_err(corrupt)?;
    match key {
        KEYWORDS_KEY => {
            serde_json::from_value::<Vec<String>>(value.clone()).map_err(corrupt)?;
        }
        CUSTOM_MESSAGES_KEY => {
            serde_json::from_value::<HashMap<String, String>>(value.clone()).map_err(corrupt)?;
        }
        AVOIDANCE_MESSAGE_KEY => {
            serde_json::from_value::<String>(value.clone()).map_err(corrupt)?;
        }
        _ => {}
    }
    Ok(value)
}

// =============================================================================
// StorageSync
// =============================================================================

pub struct StorageSync<P, S> {
    primary: P,
    secondary: S,
}

impl<P: StorageBackend, S: StorageBackend> StorageSync<P, S> {
    pub fn new(primary: P, secondary: S) -> Self {
        Self { primary, secondary }
    }

    pub fn primary(&self) -> &P {
        &self.primary
    }

    pub fn secondary(&self) -> &S {
        &self.secondary
    }

    /// Name of the backend defaults are written to
    pub fn active_backend(&self) -> &'static str {
        if self.primary.is_available() {
            self.primary.name()
        } else {
            self.secondary.name()
        }
    }

    /// Read `keys`, falling back from primary to secondary, defaulting what
    /// neither holds. Keys without a known default are simply left out.
    ///
    /// Fails when a backend read failed and some key is still unresolved:
    /// that key may well exist in the unreadable backend.
    pub async fn fetch(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StorageError> {
        let mut values = HashMap::new();
        let mut pending: Vec<&str> = keys.to_vec();
        let mut failure = None;

        if self.primary.is_available() {
            match read_into(&self.primary, &pending, &mut values).await {
                Ok(missing) => pending = missing,
                Err(e) => failure = Some(e),
            }
        }
        if !pending.is_empty() && self.secondary.is_available() {
            match read_into(&self.secondary, &pending, &mut values).await {
                Ok(missing) => pending = missing,
                Err(e) => {
                    failure.get_or_insert(e);
                }
            }
        }
        if pending.is_empty() {
            return Ok(values);
        }
        if let Some(e) = failure {
            wp_warn!(TAG, "Not defaulting {:?}: {}", pending, e);
            return Err(e);
        }

        self.write_defaults(&pending, &mut values).await;
        Ok(values)
    }

    /// Typed fetch of the three settings keys
    pub async fn fetch_settings(&self) -> Result<StoredSettings, StorageError> {
        let values = self.fetch(&SETTINGS_KEYS).await?;
        Ok(StoredSettings::from_values(&values))
    }

    /// Install-time defaulting against the primary backend only: writes the
    /// keyword and custom-message defaults for keys the primary lacks.
    /// Returns the keys that were written.
    pub async fn install_defaults(&self) -> Result<Vec<String>, StorageError> {
        let keys = [KEYWORDS_KEY, CUSTOM_MESSAGES_KEY];
        let existing = self.primary.read(&keys).await?;

        let mut entries = RawEntries::new();
        for key in keys {
            if existing.contains_key(key) {
                continue;
            }
            if let Some(default) = default_value(key) {
                entries.insert(key.to_string(), default.to_string());
            }
        }

        if !entries.is_empty() {
            self.primary.write(&entries).await?;
        }
        let mut written: Vec<String> = entries.into_keys().collect();
        written.sort();
        Ok(written)
    }

    async fn write_defaults(&self, keys: &[&str], values: &mut HashMap<String, Value>) {
        let mut entries = RawEntries::new();
        for &key in keys {
            if let Some(default) = default_value(key) {
                entries.insert(key.to_string(), default.to_string());
                values.insert(key.to_string(), default);
            }
        }
        if entries.is_empty() {
            return;
        }

        wp_info!(
            TAG,
            "Writing defaults for {:?} to {}",
            keys,
            self.active_backend()
        );
        let result = if self.primary.is_available() {
            self.primary.write(&entries).await
        } else if self.secondary.is_available() {
            self.secondary.write(&entries).await
        } else {
            Err(StorageError::Unavailable {
                backend: self.secondary.name(),
            })
        };
        if let Err(e) = result {
            wp_warn!(TAG, "Could not persist defaults: {}", e);
        }
    }
}

/// Read `keys` from `backend` into `values`; returns the keys still missing
/// (absent or corrupt). A failed read is an error, not "all missing".
async fn read_into<'k, B: StorageBackend>(
    backend: &B,
    keys: &[&'k str],
    values: &mut HashMap<String, Value>,
) -> Result<Vec<&'k str>, StorageError> {
    let raw = backend.read(keys).await.map_err(|e| {
        wp_warn!(TAG, "Read from {} failed: {}", backend.name(), e);
        e
    })?;

    let mut missing = Vec::new();
    for &key in keys {
        match raw.get(key).map(|text| decode_value(key, text)) {
            Some(Ok(value)) => {
                wp_debug!(TAG, "Loaded {} from {}", key, backend.name());
                values.insert(key.to_string(), value);
            }
            Some(Err(e)) => {
                wp_error!(TAG, "Discarding value in {}: {}", backend.name(), e);
                missing.push(key);
            }
            None => missing.push(key),
        }
    }
    Ok(missing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::backend::MemoryBackend;
    use futures::executor::block_on;
    use serde_json::json;

    fn sync_pair() -> (
        StorageSync<MemoryBackend, MemoryBackend>,
        MemoryBackend,
        MemoryBackend,
    ) {
        let primary = MemoryBackend::new("sync");
        let secondary = MemoryBackend::new("local");
        let sync = StorageSync::new(primary.clone(), secondary.clone());
        (sync, primary, secondary)
    }

    #[test]
    fn test_first_run_writes_defaults_to_primary() {
        let (sync, primary, secondary) = sync_pair();

        let settings = block_on(sync.fetch_settings()).unwrap();

        assert_eq!(settings, StoredSettings::default());
        assert_eq!(primary.get_raw(KEYWORDS_KEY).as_deref(), Some("[]"));
        assert_eq!(primary.get_raw(CUSTOM_MESSAGES_KEY).as_deref(), Some("{}"));
        assert_eq!(
            primary.get_raw(AVOIDANCE_MESSAGE_KEY),
            Some(json!(DEFAULT_AVOIDANCE_MESSAGE).to_string())
        );
        assert!(secondary.is_empty());
    }

    #[test]
    fn test_primary_unavailable_uses_secondary() {
        let secondary = MemoryBackend::new("local");
        secondary.set_raw(KEYWORDS_KEY, r#"["alex"]"#);
        let sync = StorageSync::new(MemoryBackend::unavailable("sync"), secondary.clone());

        let settings = block_on(sync.fetch_settings()).unwrap();

        assert_eq!(settings.keywords, vec!["alex".to_string()]);
        assert_eq!(sync.active_backend(), "local");
        // Missing keys were defaulted into the secondary
        assert_eq!(secondary.get_raw(CUSTOM_MESSAGES_KEY).as_deref(), Some("{}"));
    }

    #[test]
    fn test_missing_primary_key_falls_back_to_secondary() {
        let (sync, primary, secondary) = sync_pair();
        primary.set_raw(AVOIDANCE_MESSAGE_KEY, r#""breathe""#);
        secondary.set_raw(KEYWORDS_KEY, r#"["ex"]"#);

        let settings = block_on(sync.fetch_settings()).unwrap();

        assert_eq!(settings.keywords, vec!["ex".to_string()]);
        assert_eq!(settings.avoidance_message, "breathe");
        // Found in the secondary, so nothing was written for it
        assert!(primary.get_raw(KEYWORDS_KEY).is_none());
    }

    #[test]
    fn test_corrupt_value_replaced_with_default() {
        let (sync, primary, _) = sync_pair();
        primary.set_raw(KEYWORDS_KEY, "[not json");
        primary.set_raw(CUSTOM_MESSAGES_KEY, r#"{"ex":"stay strong"}"#);

        let settings = block_on(sync.fetch_settings()).unwrap();

        assert!(settings.keywords.is_empty());
        assert_eq!(settings.custom_messages.get("ex").map(String::as_str), Some("stay strong"));
        assert_eq!(primary.get_raw(KEYWORDS_KEY).as_deref(), Some("[]"));
    }

    #[test]
    fn test_wrong_shape_is_corrupt() {
        assert!(decode_value(KEYWORDS_KEY, "42").is_err());
        assert!(decode_value(CUSTOM_MESSAGES_KEY, r#"{"a": 1}"#).is_err());
        assert!(decode_value(AVOIDANCE_MESSAGE_KEY, "[]").is_err());
        assert!(decode_value(AVOIDANCE_MESSAGE_KEY, r#""ok""#).is_ok());
    }

    #[test]
    fn test_failed_primary_read_served_by_secondary() {
        let (sync, primary, secondary) = sync_pair();
        primary.set_failing(true);
        secondary.set_raw(KEYWORDS_KEY, r#"["alex"]"#);
        secondary.set_raw(CUSTOM_MESSAGES_KEY, "{}");
        secondary.set_raw(AVOIDANCE_MESSAGE_KEY, r#""breathe""#);

        let settings = block_on(sync.fetch_settings()).unwrap();

        assert_eq!(settings.keywords, vec!["alex".to_string()]);
        assert_eq!(settings.avoidance_message, "breathe");
    }

    #[test]
    fn test_failed_primary_read_never_overwrites() {
        let (sync, primary, _) = sync_pair();
        primary.set_raw(KEYWORDS_KEY, r#"["alex"]"#);
        primary.set_failing_reads(true);

        let result = block_on(sync.fetch_settings());

        assert!(matches!(result, Err(StorageError::Backend { .. })));
        assert_eq!(primary.get_raw(KEYWORDS_KEY).as_deref(), Some(r#"["alex"]"#));
        assert!(primary.get_raw(CUSTOM_MESSAGES_KEY).is_none());
        assert!(primary.get_raw(AVOIDANCE_MESSAGE_KEY).is_none());
    }

    #[test]
    fn test_failed_secondary_read_never_defaults() {
        let secondary = MemoryBackend::new("local");
        secondary.set_raw(KEYWORDS_KEY, r#"["alex"]"#);
        secondary.set_failing_reads(true);
        let sync = StorageSync::new(MemoryBackend::unavailable("sync"), secondary.clone());

        assert!(block_on(sync.fetch_settings()).is_err());
        assert_eq!(secondary.len(), 1);
    }

    #[test]
    fn test_fetch_skips_unknown_missing_keys() {
        let (sync, primary, _) = sync_pair();

        let values = block_on(sync.fetch(&["somethingElse"])).unwrap();

        assert!(values.is_empty());
        assert!(primary.is_empty());
    }

    #[test]
    fn test_change_extracts_new_values_only() {
        let mut changes = HashMap::new();
        changes.insert(
            KEYWORDS_KEY.to_string(),
            StorageChange {
                old_value: Some(json!(["old"])),
                new_value: Some(json!(["alex", "sam"])),
            },
        );
        changes.insert(
            "unrelated".to_string(),
            StorageChange {
                old_value: None,
                new_value: Some(json!(1)),
            },
        );

        let update = SettingsUpdate::from_changes(&changes);

        assert_eq!(
            update.keywords,
            Some(vec!["alex".to_string(), "sam".to_string()])
        );
        assert!(update.custom_messages.is_none());
        assert!(update.avoidance_message.is_none());
    }

    #[test]
    fn test_removed_key_maps_to_default() {
        let mut changes = HashMap::new();
        changes.insert(
            AVOIDANCE_MESSAGE_KEY.to_string(),
            StorageChange {
                old_value: Some(json!("custom")),
                new_value: None,
            },
        );
        changes.insert(
            CUSTOM_MESSAGES_KEY.to_string(),
            StorageChange {
                old_value: None,
                new_value: Some(json!("not an object")),
            },
        );

        let update = SettingsUpdate::from_changes(&changes);

        assert_eq!(
            update.avoidance_message.as_deref(),
            Some(DEFAULT_AVOIDANCE_MESSAGE)
        );
        assert_eq!(update.custom_messages, Some(HashMap::new()));
    }

    #[test]
    fn test_change_notification_deserializes() {
        let changes: HashMap<String, StorageChange> = serde_json::from_str(
            r#"{ "wordPopKeywords": { "oldValue": [], "newValue": ["ex"] } }"#,
        )
        .unwrap();

        let update = SettingsUpdate::from_changes(&changes);
        assert_eq!(update.keywords, Some(vec!["ex".to_string()]));
    }

    #[test]
    fn test_install_defaults_only_fills_absent_keys() {
        let (sync, primary, _) = sync_pair();
        primary.set_raw(KEYWORDS_KEY, r#"["alex"]"#);

        let written = block_on(sync.install_defaults()).unwrap();

        assert_eq!(written, vec![CUSTOM_MESSAGES_KEY.to_string()]);
        assert_eq!(primary.get_raw(KEYWORDS_KEY).as_deref(), Some(r#"["alex"]"#));
        assert_eq!(primary.get_raw(CUSTOM_MESSAGES_KEY).as_deref(), Some("{}"));
        assert!(primary.get_raw(AVOIDANCE_MESSAGE_KEY).is_none());
    }
}
