//! Key-value persistence seam.
//!
//! Backends exchange raw JSON text per key. Decoding happens in
//! `StorageSync` so a corrupt value only ever affects its own key.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use super::error::StorageError;

/// Key -> JSON text
pub type RawEntries = HashMap<String, String>;

/// A string-keyed, JSON-valued store.
///
/// The extension runs on a single-threaded event loop, so implementations
/// are neither `Send` nor `Sync`.
#[allow(async_fn_in_trait)]
pub trait StorageBackend {
    /// Short name used in logs and errors
    fn name(&self) -> &'static str;

    /// Whether the backend exists in the current context
    fn is_available(&self) -> bool;

    /// Read `keys`. Absent keys are simply missing from the result.
    async fn read(&self, keys: &[&str]) -> Result<RawEntries, StorageError>;

    /// Write every entry of `entries`.
    async fn write(&self, entries: &RawEntries) -> Result<(), StorageError>;
}

// =============================================================================
// MemoryBackend
// =============================================================================

/// In-memory backend. Clones share the same data, so a caller can keep a
/// handle for inspection after moving one into a `StorageSync`.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    name: &'static str,
    available: bool,
    entries: Rc<RefCell<RawEntries>>,
    failing_reads: Rc<Cell<bool>>,
    failing_writes: Rc<Cell<bool>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new("memory")
    }
}

impl MemoryBackend {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            available: true,
            entries: Rc::new(RefCell::new(RawEntries::new())),
            failing_reads: Rc::new(Cell::new(false)),
            failing_writes: Rc::new(Cell::new(false)),
        }
    }

    /// A backend that reports itself as missing (e.g. no extension host)
    pub fn unavailable(name: &'static str) -> Self {
        Self {
            available: false,
            ..Self::new(name)
        }
    }

    /// Store raw text for `key` without any validation
    pub fn set_raw(&self, key: &str, text: &str) {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), text.to_string());
    }

    pub fn get_raw(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    pub fn remove(&self, key: &str) {
        self.entries.borrow_mut().remove(key);
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Make every subsequent call fail with a backend error
    pub fn set_failing(&self, failing: bool) {
        self.failing_reads.set(failing);
        self.failing_writes.set(failing);
    }

    /// Make reads fail while writes still go through
    pub fn set_failing_reads(&self, failing: bool) {
        self.failing_reads.set(failing);
    }

    fn check(&self, failing: &Cell<bool>) -> Result<(), StorageError> {
        if !self.available {
            return Err(StorageError::Unavailable { backend: self.name });
        }
        if failing.get() {
            return Err(StorageError::backend(self.name, "simulated failure"));
        }
        Ok(())
    }
}

impl StorageBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        self.name
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn read(&self, keys: &[&str]) -> Result<RawEntries, StorageError> {
        self.check(&self.failing_reads)?;
        let entries = self.entries.borrow();
        Ok(keys
            .iter()
            .filter_map(|&key| entries.get(key).map(|v| (key.to_string(), v.clone())))
            .collect())
    }

    async fn write(&self, entries: &RawEntries) -> Result<(), StorageError> {
        self.check(&self.failing_writes)?;
        let mut stored = self.entries.borrow_mut();
        for (key, value) in entries {
            stored.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}
