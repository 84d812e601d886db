//! Configuration types and defaults for the detection engine
//!
//! Storage keys and default messages are shared with the settings UI, so they
//! must not change without a migration.

use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

// =============================================================================
// Storage Keys
// =============================================================================

/// Array of keyword strings
pub const KEYWORDS_KEY: &str = "wordPopKeywords";
/// Object mapping keyword -> custom message
pub const CUSTOM_MESSAGES_KEY: &str = "wordPopCustomMessages";
/// Global avoidance message string
pub const AVOIDANCE_MESSAGE_KEY: &str = "wordPopAvoidanceMessage";

/// All keys the engine reads, in load order
pub const SETTINGS_KEYS: [&str; 3] = [KEYWORDS_KEY, CUSTOM_MESSAGES_KEY, AVOIDANCE_MESSAGE_KEY];

// =============================================================================
// Messages
// =============================================================================

pub const DEFAULT_AVOIDANCE_MESSAGE: &str =
    "Remember why you're here. Take a deep breath and focus on yourself.";

/// Message shown for a keyword that has no custom message.
pub fn default_keyword_message(keyword: &str) -> String {
    format!(
        "Remember: focusing on \"{}\" right now might not help your healing process.",
        keyword
    )
}

// =============================================================================
// Engine Configuration
// =============================================================================

/// Element id of the overlay mount point
pub const DEFAULT_OVERLAY_ID: &str = "wordpop-overlay";

/// Runtime tunables. Every field has a default so JS callers may pass a
/// partial object (or nothing at all).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Minimum time between two overlays for the same keyword. Default: 15000
    pub cooldown_ms: u64,
    /// Delay before the first scan after keywords load. Default: 500
    pub initial_scan_delay_ms: u32,
    /// Safety-net polling interval. Default: 3000
    pub poll_interval_ms: u32,
    /// Length of the overlay exit transition. Default: 300
    pub exit_transition_ms: u32,
    /// Id of the overlay element. Default: "wordpop-overlay"
    pub overlay_id: String,
    /// Inject the test button on localhost pages. Default: true
    pub dev_test_button: bool,
    /// Send WORD_DETECTED to the background script on detection. Default: true
    pub notify_background: bool,
    /// Emit debug lines to the console. Default: false
    pub verbose: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 15_000,
            initial_scan_delay_ms: 500,
            poll_interval_ms: 3_000,
            exit_transition_ms: 300,
            overlay_id: DEFAULT_OVERLAY_ID.to_string(),
            dev_test_button: true,
            notify_background: true,
            verbose: false,
        }
    }
}

impl EngineConfig {
    /// Read a config object handed over from JS.
    ///
    /// `undefined`/`null` yield the defaults, and so does a malformed object
    /// (with a warning): a bad config must never keep the script from running.
    pub fn from_js(value: JsValue) -> Self {
        if value.is_undefined() || value.is_null() {
            return Self::default();
        }
        match serde_wasm_bindgen::from_value(value) {
            Ok(config) => config,
            Err(e) => {
                wp_warn!("Config", "Invalid engine config, using defaults: {}", e);
                Self::default()
            }
        }
    }
}
