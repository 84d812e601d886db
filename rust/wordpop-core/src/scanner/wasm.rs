use wasm_bindgen::prelude::*;

use crate::scanner::keyword::TextScanner;
use crate::scanner::state::{now_ms, DetectionState};

/// Standalone scanner for JS callers (settings preview, tests in the page).
/// Owns its own cooldown state; it is independent from the content script.
#[wasm_bindgen]
pub struct KeywordScanner {
    inner: TextScanner,
    state: DetectionState,
}

#[wasm_bindgen]
impl KeywordScanner {
    #[wasm_bindgen(constructor)]
    pub fn new(cooldown_ms: u32) -> Self {
        KeywordScanner {
            inner: TextScanner::new(u64::from(cooldown_ms)),
            state: DetectionState::new(),
        }
    }

    /// Scan with cooldowns applied. `keywords` is a string array.
    #[wasm_bindgen]
    pub fn scan(&mut self, text: &str, keywords: JsValue) -> Result<Vec<String>, JsValue> {
        let keywords = parse_keywords(keywords)?;
        Ok(self.inner.scan(text, &keywords, &mut self.state, now_ms()))
    }

    /// Scan without touching cooldowns.
    #[wasm_bindgen(js_name = findMatches)]
    pub fn find_matches(&mut self, text: &str, keywords: JsValue) -> Result<Vec<String>, JsValue> {
        let keywords = parse_keywords(keywords)?;
        Ok(self.inner.matches(text, &keywords))
    }

    #[wasm_bindgen(js_name = resetCooldowns)]
    pub fn reset_cooldowns(&mut self) {
        self.state.clear_cooldowns();
    }

    #[wasm_bindgen(js_name = cooldownMs)]
    pub fn cooldown_ms(&self) -> f64 {
        self.inner.cooldown_ms() as f64
    }
}

/// One-shot match of `keywords` against `text`, no cooldowns.
#[wasm_bindgen(js_name = scanText)]
pub fn scan_text(text: &str, keywords: JsValue) -> Result<Vec<String>, JsValue> {
    let keywords = parse_keywords(keywords)?;
    Ok(TextScanner::new(0).matches(text, &keywords))
}

fn parse_keywords(value: JsValue) -> Result<Vec<String>, JsValue> {
    serde_wasm_bindgen::from_value(value)
        .map_err(|e| JsValue::from_str(&format!("Invalid keyword list: {}", e)))
}
