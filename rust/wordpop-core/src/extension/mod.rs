//! Extension entry points (wasm32 only)
//!
//! - `content.rs` - content script: detection on every page
//! - `background.rs` - service worker: install defaults, runtime messages

pub mod background;
pub mod content;

pub use background::*;
pub use content::*;
