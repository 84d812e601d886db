//! RescanScheduler: decides when the page is scanned
//!
//! Every trigger (initial load, DOM mutation, poll, storage change, manual)
//! funnels into `request_scan`, so all of them share the same suppression:
//! nothing is scanned while an overlay is up, and nothing matches before
//! keywords are loaded.
//!
//! The scheduler owns the components it coordinates (`KeywordStore`,
//! `TextScanner`, `DetectionState`, `OverlayController`); the content
//! script only supplies page text, the clock and DOM events.

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::overlay::{ExitAction, KeywordLine, OverlayController, OverlaySurface};
use crate::scanner::{DetectionState, TextScanner};
use crate::storage::{SettingsUpdate, StorageError, StoredSettings};
use crate::store::KeywordStore;

const TAG: &str = "Scheduler";

/// Keyword shown by the development test alert
pub const TEST_KEYWORD: &str = "test keyword";

// =============================================================================
// Triggers
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScanTrigger {
    /// First scan after keywords load
    InitialLoad,
    /// DOM mutation that may change visible text
    Mutation,
    /// Fixed-interval safety net
    Poll,
    /// Keywords changed in another extension surface
    StorageChange,
    /// Explicit request (JS caller, test button)
    Manual,
}

/// MutationObserver record types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    ChildList,
    CharacterData,
    Attributes,
}

impl MutationKind {
    /// Parse `MutationRecord.type`
    pub fn from_record_type(record_type: &str) -> Option<Self> {
        match record_type {
            "childList" => Some(Self::ChildList),
            "characterData" => Some(Self::CharacterData),
            "attributes" => Some(Self::Attributes),
            _ => None,
        }
    }

    /// Whether this kind of mutation can change the page's visible text
    pub fn affects_text(self) -> bool {
        matches!(self, Self::ChildList | Self::CharacterData)
    }
}

/// True when at least one mutation in the batch can change visible text.
/// Attribute-only batches are ignored to avoid scan storms.
pub fn mutations_affect_text<I>(kinds: I) -> bool
where
    I: IntoIterator<Item = MutationKind>,
{
    kinds.into_iter().any(MutationKind::affects_text)
}

// =============================================================================
// Outcome + stats
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// An overlay is active; nothing was scanned
    Suppressed,
    /// Scanned, nothing new (no keywords, no match, or all cooling down)
    NoMatch,
    /// Keywords found and an overlay opened for them
    Detected(Vec<String>),
    /// Keywords found but the overlay could not be opened
    OverlayFailed(Vec<String>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStats {
    pub requested: u64,
    pub suppressed: u64,
    pub scanned: u64,
    pub overlays_opened: u64,
}

/// Called with the detected keywords whenever an overlay opens
pub type DetectionHook = Box<dyn FnMut(&[String])>;

// =============================================================================
// Page text
// =============================================================================

/// Title, URL and body text, space-joined. The first occurrence of each
/// `own_labels` entry (text of our own controls) is dropped from the body.
pub fn compose_page_text(title: &str, url: &str, body: &str, own_labels: &[&str]) -> String {
    let mut body = body.to_string();
    for label in own_labels.iter().filter(|l| !l.is_empty()) {
        body = body.replacen(label, "", 1);
    }
    format!("{} {} {}", title, url, body)
}

// =============================================================================
// RescanScheduler
// =============================================================================

pub struct RescanScheduler<S: OverlaySurface> {
    store: KeywordStore,
    scanner: TextScanner,
    state: DetectionState,
    overlay: OverlayController<S>,
    stats: SchedulerStats,
    on_detect: Option<DetectionHook>,
}

impl<S: OverlaySurface> RescanScheduler<S> {
    /// Fresh components wired from `config`.
    pub fn new(config: &EngineConfig, surface: S) -> Self {
        Self::with_parts(
            KeywordStore::new(),
            TextScanner::new(config.cooldown_ms),
            DetectionState::new(),
            OverlayController::new(surface, config.overlay_id.clone(), config.exit_transition_ms),
        )
    }

    /// Assemble from pre-built components.
    pub fn with_parts(
        store: KeywordStore,
        scanner: TextScanner,
        state: DetectionState,
        overlay: OverlayController<S>,
    ) -> Self {
        Self {
            store,
            scanner,
            state,
            overlay,
            stats: SchedulerStats::default(),
            on_detect: None,
        }
    }

    pub fn store(&self) -> &KeywordStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut KeywordStore {
        &mut self.store
    }

    pub fn state(&self) -> &DetectionState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut DetectionState {
        &mut self.state
    }

    pub fn overlay(&self) -> &OverlayController<S> {
        &self.overlay
    }

    pub fn overlay_mut(&mut self) -> &mut OverlayController<S> {
        &mut self.overlay
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// True while an overlay is up, including its exit transition
    pub fn is_suspended(&self) -> bool {
        self.state.is_overlay_active() || self.overlay.is_visible()
    }

    pub fn set_detection_hook(&mut self, hook: DetectionHook) {
        self.on_detect = Some(hook);
    }

    /// Install a freshly loaded snapshot. Returns the keyword list.
    pub fn apply_settings(&mut self, settings: StoredSettings) -> Vec<String> {
        self.store.apply_settings(settings);
        self.store.keywords().to_vec()
    }

    /// Apply the result of a storage fetch through `KeywordStore::apply_loaded`;
    /// a failed fetch keeps the current keywords.
    pub fn apply_loaded(&mut self, fetched: Result<StoredSettings, StorageError>) -> Vec<String> {
        self.store.apply_loaded(fetched)
    }

    /// Apply an external change. Returns true when the keyword list changed,
    /// i.e. when a `StorageChange` scan is due.
    pub fn apply_update(&mut self, update: SettingsUpdate) -> bool {
        self.store.apply_update(update).is_some()
    }

    /// Single entry point for every trigger.
    pub fn request_scan(&mut self, trigger: ScanTrigger, page_text: &str, now: u64) -> ScanOutcome {
        self.stats.requested += 1;

        if self.is_suspended() {
            self.stats.suppressed += 1;
            wp_debug!(TAG, "{:?} scan suppressed: overlay active", trigger);
            return ScanOutcome::Suppressed;
        }

        self.stats.scanned += 1;
        let detected = self
            .scanner
            .pending(page_text, self.store.keywords(), &self.state, now);
        if detected.is_empty() {
            wp_debug!(TAG, "{:?} scan: no keywords found", trigger);
            return ScanOutcome::NoMatch;
        }

        // Cooldowns start only once the user has actually seen the overlay
        if self.open_overlay(&detected) {
            self.scanner.commit(&detected, &mut self.state, now);
            ScanOutcome::Detected(detected)
        } else {
            ScanOutcome::OverlayFailed(detected)
        }
    }

    /// Open the development test alert. No-op while an overlay is up.
    pub fn open_test_alert(&mut self) -> bool {
        if self.is_suspended() {
            return false;
        }
        self.open_overlay(&[TEST_KEYWORD.to_string()])
    }

    /// Route a button press on the overlay. Resumes scanning.
    pub fn handle_exit(&mut self, action: ExitAction) -> bool {
        self.overlay.exit(action)
    }

    fn open_overlay(&mut self, detected: &[String]) -> bool {
        let lines = detected
            .iter()
            .map(|keyword| KeywordLine {
                keyword: keyword.clone(),
                message: self
                    .store
                    .has_custom_message(keyword)
                    .then(|| self.store.message_for(keyword)),
            })
            .collect();

        let gate = self.state.overlay_flag();
        let opened = self.overlay.open_with_lines(
            lines,
            self.store.avoidance_message(),
            Box::new(move || gate.set(false)),
        );
        if !opened {
            return false;
        }

        self.state.set_overlay_active(true);
        self.stats.overlays_opened += 1;
        if let Some(hook) = self.on_detect.as_mut() {
            hook(detected);
        }
        true
    }
}

// =============================================================================
// Tests
// =============================================================================
