//! Browser persistence backends (wasm32 only)
//!
//! - `ChromeSyncBackend` - `chrome.storage.sync`, promise-based (MV3)
//! - `LocalStorageBackend` - `window.localStorage`, JSON-encoded strings
//!
//! `chrome` is looked up through `Reflect` on the global object so the same
//! build also runs on plain pages (dev server), where only the local
//! backend is available.

use js_sys::{Array, Function, Object, Promise, Reflect, JSON};
use std::collections::HashMap;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

use super::backend::{RawEntries, StorageBackend};
use super::error::StorageError;
use super::sync::{SettingsUpdate, StorageChange, StorageSync};

const TAG: &str = "StorageSync";

/// Storage pair used by the content and background scripts
pub type BrowserStorage = StorageSync<ChromeSyncBackend, LocalStorageBackend>;

pub fn browser_storage() -> BrowserStorage {
    StorageSync::new(ChromeSyncBackend, LocalStorageBackend)
}

// =============================================================================
// chrome.* lookup
// =============================================================================

/// Walk `globalThis.chrome.<path...>`, stopping at the first missing link.
pub(crate) fn chrome_path(path: &[&str]) -> Option<JsValue> {
    let mut current: JsValue = js_sys::global().into();
    for segment in std::iter::once(&"chrome").chain(path.iter()) {
        current = Reflect::get(&current, &JsValue::from_str(segment)).ok()?;
        if current.is_undefined() || current.is_null() {
            return None;
        }
    }
    Some(current)
}

fn method(target: &JsValue, name: &str) -> Result<Function, String> {
    Reflect::get(target, &JsValue::from_str(name))
        .map_err(|e| format!("{:?}", e))?
        .dyn_into::<Function>()
        .map_err(|_| format!("{} is not a function", name))
}

fn js_err(e: JsValue) -> String {
    e.as_string().unwrap_or_else(|| format!("{:?}", e))
}

// =============================================================================
// ChromeSyncBackend
// =============================================================================

pub struct ChromeSyncBackend;

impl ChromeSyncBackend {
    const NAME: &'static str = "chrome.storage.sync";

    fn area(&self) -> Result<JsValue, StorageError> {
        chrome_path(&["storage", "sync"]).ok_or(StorageError::Unavailable {
            backend: Self::NAME,
        })
    }

    async fn call(&self, name: &str, arg: &JsValue) -> Result<JsValue, StorageError> {
        let area = self.area()?;
        let f = method(&area, name).map_err(|e| StorageError::backend(Self::NAME, e))?;
        let promise: Promise = f
            .call1(&area, arg)
            .map_err(|e| StorageError::backend(Self::NAME, js_err(e)))?
            .dyn_into()
            .map_err(|_| StorageError::backend(Self::NAME, "storage call did not return a promise"))?;
        JsFuture::from(promise)
            .await
            .map_err(|e| StorageError::backend(Self::NAME, js_err(e)))
    }
}

impl StorageBackend for ChromeSyncBackend {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn is_available(&self) -> bool {
        self.area().is_ok()
    }

    async fn read(&self, keys: &[&str]) -> Result<RawEntries, StorageError> {
        let key_list: Array = keys.iter().map(|k| JsValue::from_str(k)).collect();
        let result = self.call("get", &key_list.into()).await?;

        let mut entries = RawEntries::new();
        for &key in keys {
            let value = Reflect::get(&result, &JsValue::from_str(key))
                .map_err(|e| StorageError::backend(Self::NAME, js_err(e)))?;
            if value.is_undefined() {
                continue;
            }
            match JSON::stringify(&value).ok().and_then(|s| s.as_string()) {
                Some(text) => {
                    entries.insert(key.to_string(), text);
                }
                None => wp_warn!(TAG, "Value for {} could not be serialized", key),
            }
        }
        Ok(entries)
    }

    async fn write(&self, entries: &RawEntries) -> Result<(), StorageError> {
        let items = Object::new();
        for (key, text) in entries {
            let value = JSON::parse(text).map_err(|e| StorageError::Corrupt {
                key: key.clone(),
                message: js_err(e),
            })?;
            Reflect::set(&items, &JsValue::from_str(key), &value)
                .map_err(|e| StorageError::backend(Self::NAME, js_err(e)))?;
        }
        self.call("set", &items.into()).await.map(|_| ())
    }
}

// =============================================================================
// LocalStorageBackend
// =============================================================================

pub struct LocalStorageBackend;

impl LocalStorageBackend {
    const NAME: &'static str = "localStorage";

    fn storage(&self) -> Result<web_sys::Storage, StorageError> {
        web_sys::window()
            .and_then(|w| w.local_storage().ok().flatten())
            .ok_or(StorageError::Unavailable {
                backend: Self::NAME,
            })
    }
}

impl StorageBackend for LocalStorageBackend {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn is_available(&self) -> bool {
        self.storage().is_ok()
    }

    async fn read(&self, keys: &[&str]) -> Result<RawEntries, StorageError> {
        let storage = self.storage()?;
        let mut entries = RawEntries::new();
        for &key in keys {
            let item = storage
                .get_item(key)
                .map_err(|e| StorageError::backend(Self::NAME, js_err(e)))?;
            if let Some(text) = item {
                entries.insert(key.to_string(), text);
            }
        }
        Ok(entries)
    }

    async fn write(&self, entries: &RawEntries) -> Result<(), StorageError> {
        let storage = self.storage()?;
        for (key, text) in entries {
            storage
                .set_item(key, text)
                .map_err(|e| StorageError::backend(Self::NAME, js_err(e)))?;
        }
        Ok(())
    }
}

// =============================================================================
// Change notifications
// =============================================================================

/// Register `handler` with `chrome.storage.onChanged`. The handler only sees
/// the settings keys that changed, already decoded. The listener lives as
/// long as the page.
pub fn on_external_change<F>(mut handler: F) -> Result<(), StorageError>
where
    F: FnMut(SettingsUpdate) + 'static,
{
    let unavailable = StorageError::Unavailable {
        backend: "chrome.storage.onChanged",
    };
    let event = chrome_path(&["storage", "onChanged"]).ok_or(unavailable)?;
    let add = method(&event, "addListener")
        .map_err(|e| StorageError::backend("chrome.storage.onChanged", e))?;

    let listener = Closure::wrap(Box::new(move |changes: JsValue, _area: JsValue| {
        let changes: HashMap<String, StorageChange> =
            match serde_wasm_bindgen::from_value(changes) {
                Ok(changes) => changes,
                Err(e) => {
                    wp_error!(TAG, "Unreadable storage change: {}", e);
                    return;
                }
            };
        let update = SettingsUpdate::from_changes(&changes);
        if !update.is_empty() {
            handler(update);
        }
    }) as Box<dyn FnMut(JsValue, JsValue)>);

    add.call1(&event, listener.as_ref())
        .map_err(|e| StorageError::backend("chrome.storage.onChanged", js_err(e)))?;
    listener.forget();
    Ok(())
}
