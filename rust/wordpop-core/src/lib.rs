//! WordPop Core: keyword detection + interruption overlay for the browser
//!
//! A Rust/WASM implementation of the WordPop extension runtime. The content
//! script watches page text for user-chosen keywords and, on a match, covers
//! the page with a full-screen "Stop and breathe" overlay.
//!
//! # Architecture
//!
//! - `store/` - KeywordStore: keywords, custom messages, avoidance message
//! - `storage/` - StorageSync: `chrome.storage.sync` with `localStorage`
//!   fallback, first-run defaults, external change decoding
//! - `scanner/` - TextScanner + DetectionState: word-boundary matching with
//!   per-keyword cooldowns
//! - `overlay/` - OverlayController: singleton overlay session over a surface
//! - `scheduler.rs` - RescanScheduler: one entry point for every scan trigger
//! - `messages.rs` - runtime messages between content and background scripts
//! - `extension/` - content and background script entry points (wasm32)
//!
//! # Usage (WASM)
//! ```javascript,ignore
//! // content.js
//! import init, { startContentScript } from 'wordpop-core';
//!
//! await init();
//! startContentScript({ cooldownMs: 15000, verbose: false });
//!
//! // background.js
//! import init, { startBackground } from 'wordpop-core';
//!
//! await init();
//! startBackground();
//! ```

#[macro_use]
mod logging;

pub mod config;
pub mod messages;
pub mod overlay;
pub mod scanner;
pub mod scheduler;
pub mod storage;
pub mod store;

#[cfg(target_arch = "wasm32")]
pub mod extension;

pub use config::*;
pub use logging::{is_verbose, set_verbose};
pub use messages::*;
pub use overlay::*;
pub use scanner::*;
pub use scheduler::*;
pub use storage::*;
pub use store::*;

use wasm_bindgen::prelude::*;

// When the `wee_alloc` feature is enabled, use `wee_alloc` as the global
// allocator for smaller WASM bundle size.
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Get version information
#[wasm_bindgen]
pub fn version() -> String {
    format!("wordpop-core v{}", env!("CARGO_PKG_VERSION"))
}
