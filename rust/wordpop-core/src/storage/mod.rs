//! Storage Sync Adapter
//!
//! - `backend.rs` - `StorageBackend` seam + in-memory backend
//! - `sync.rs` - `StorageSync`: primary/secondary fallback, first-run defaults,
//!   per-key decoding and external change extraction
//! - `browser.rs` - `chrome.storage.sync` and `localStorage` backends (wasm32)

pub mod backend;
pub mod error;
pub mod sync;

#[cfg(target_arch = "wasm32")]
pub mod browser;

pub use backend::*;
pub use error::*;
pub use sync::*;
