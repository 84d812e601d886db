//! DetectionState: per-page cooldown bookkeeping and the overlay gate

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

/// Milliseconds on the page clock (`performance.now()` in the browser).
pub fn now_ms() -> u64 {
    instant::now() as u64
}

/// Process-wide detection state for one page load. Never persisted.
#[derive(Debug, Default)]
pub struct DetectionState {
    /// Normalized keyword -> last time it triggered an overlay
    last_detected_at: HashMap<String, u64>,
    /// Shared with the open session's close callback
    overlay_active: Rc<Cell<bool>>,
}

impl DetectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_detected_at(&self, keyword: &str) -> Option<u64> {
        self.last_detected_at.get(keyword).copied()
    }

    /// True while `keyword` triggered less than `cooldown_ms` ago
    pub fn is_cooling(&self, keyword: &str, now: u64, cooldown_ms: u64) -> bool {
        self.last_detected_at
            .get(keyword)
            .is_some_and(|&last| now.saturating_sub(last) <= cooldown_ms)
    }

    /// Start the cooldown of `keyword` at `now`.
    pub fn record(&mut self, keyword: &str, now: u64) {
        self.last_detected_at.insert(keyword.to_string(), now);
    }


    pub fn clear_cooldowns(&mut self) {
        self.last_detected_at.clear();
    }

    /// Number of keywords with a recorded detection
    pub fn tracked_count(&self) -> usize {
        self.last_detected_at.len()
    }

    pub fn is_overlay_active(&self) -> bool {
        self.overlay_active.get()
    }

    pub fn set_overlay_active(&self, active: bool) {
        self.overlay_active.set(active);
    }

    /// Handle on the overlay flag, for the session close callback
    pub fn overlay_flag(&self) -> Rc<Cell<bool>> {
        Rc::clone(&self.overlay_active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_sets_timestamp() {
        let mut state = DetectionState::new();
        state.record("alex", 100);
        assert_eq!(state.last_detected_at("alex"), Some(100));
    }

    #[test]
    fn test_cooldown_boundary() {
        let mut state = DetectionState::new();
        state.record("alex", 0);

        // Exactly the cooldown period is not enough
        assert!(state.is_cooling("alex", 15_000, 15_000));
        assert!(!state.is_cooling("alex", 15_001, 15_000));
    }

    #[test]
    fn test_is_cooling_has_no_side_effect() {
        let mut state = DetectionState::new();
        assert!(!state.is_cooling("alex", 0, 15_000));
        assert_eq!(state.tracked_count(), 0);

        state.record("alex", 0);
        assert!(state.is_cooling("alex", 15_000, 15_000));
        assert!(!state.is_cooling("alex", 15_001, 15_000));
    }

    #[test]
    fn test_overlay_flag_is_shared() {
        let state = DetectionState::new();
        let flag = state.overlay_flag();

        state.set_overlay_active(true);
        assert!(flag.get());

        flag.set(false);
        assert!(!state.is_overlay_active());
    }

    #[test]
    fn test_clear_cooldowns() {
        let mut state = DetectionState::new();
        state.record("a", 1);
        state.record("b", 1);
        assert_eq!(state.tracked_count(), 2);

        state.clear_cooldowns();
        assert_eq!(state.tracked_count(), 0);
    }
}
