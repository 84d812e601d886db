//! OverlayController: singleton overlay session
//!
//! # State machine
//! Idle → (`open`) → Active → (`exit(Continue | Leave)`) → Idle
//!
//! `open` while Active is a silent no-op, so a burst of scan triggers can
//! never stack overlays. The session's `on_close` runs exactly once, before
//! the exit transition completes, whichever action ended it.
//!
//! After `exit` the element may still be on the page (exit transition, or a
//! "leave" that stayed in the same document). `is_visible` covers that
//! window so callers don't read the overlay's own text as page content.

use serde::{Deserialize, Serialize};

use super::view::{KeywordLine, OverlayView};

const TAG: &str = "Overlay";

/// Single-shot close notification
pub type OnClose = Box<dyn FnOnce()>;

/// Where the overlay is drawn. The DOM implementation lives in `dom.rs`;
/// tests use a recording surface.
pub trait OverlaySurface {
    /// Remove any element carrying `overlay_id`. Returns whether one existed.
    fn remove_stale(&mut self, overlay_id: &str) -> bool;

    /// Build and attach the overlay with its entrance transition.
    fn mount(&mut self, view: &OverlayView) -> Result<(), String>;

    /// Detach the overlay after an exit transition of `transition_ms`
    /// (0 = immediately).
    fn dismiss(&mut self, overlay_id: &str, transition_ms: u32);

    /// Go back one history entry. Returns false when there is nowhere to go.
    fn navigate_back(&mut self) -> bool;

    /// Whether an element carrying `overlay_id` is on the page
    fn is_mounted(&self, overlay_id: &str) -> bool;
}

/// The two ways out of an overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitAction {
    /// "Continue Anyway": close and keep reading
    Continue,
    /// "Leave This Page": close and go back
    Leave,
}

/// The currently displayed interruption
pub struct OverlaySession {
    detected_keywords: Vec<String>,
    message: String,
    on_close: Option<OnClose>,
}

impl OverlaySession {
    pub fn detected_keywords(&self) -> &[String] {
        &self.detected_keywords
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    fn close(mut self) {
        if let Some(on_close) = self.on_close.take() {
            on_close();
        }
    }
}

impl std::fmt::Debug for OverlaySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlaySession")
            .field("detected_keywords", &self.detected_keywords)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

pub struct OverlayController<S: OverlaySurface> {
    surface: S,
    session: Option<OverlaySession>,
    overlay_id: String,
    exit_transition_ms: u32,
    /// Set by `exit` until the next `open`
    closing: bool,
}

impl<S: OverlaySurface> OverlayController<S> {
    pub fn new(surface: S, overlay_id: impl Into<String>, exit_transition_ms: u32) -> Self {
        Self {
            surface,
            session: None,
            overlay_id: overlay_id.into(),
            exit_transition_ms,
            closing: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Active, or closed but our element is still being removed
    pub fn is_visible(&self) -> bool {
        self.session.is_some() || (self.closing && self.surface.is_mounted(&self.overlay_id))
    }

    pub fn session(&self) -> Option<&OverlaySession> {
        self.session.as_ref()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn overlay_id(&self) -> &str {
        &self.overlay_id
    }

    /// Open a session for `detected_keywords` showing `message`.
    pub fn open(
        &mut self,
        detected_keywords: Vec<String>,
        message: impl Into<String>,
        on_close: OnClose,
    ) -> bool {
        let lines = detected_keywords.into_iter().map(KeywordLine::plain).collect();
        self.open_with_lines(lines, message, on_close)
    }

    /// Like `open`, with a per-keyword note for keywords that have one.
    ///
    /// Returns false (and drops `on_close` uncalled) when a session is
    /// already active or the surface could not mount the overlay.
    pub fn open_with_lines(
        &mut self,
        lines: Vec<KeywordLine>,
        message: impl Into<String>,
        on_close: OnClose,
    ) -> bool {
        if self.session.is_some() {
            wp_debug!(TAG, "Overlay already active, ignoring open");
            return false;
        }

        let mut seen = std::collections::HashSet::new();
        let lines: Vec<KeywordLine> = lines
            .into_iter()
            .filter(|line| seen.insert(line.keyword.clone()))
            .collect();

        if self.surface.remove_stale(&self.overlay_id) {
            wp_debug!(TAG, "Removed stale overlay element");
        }

        let view = OverlayView {
            overlay_id: self.overlay_id.clone(),
            message: message.into(),
            keywords: lines,
        };
        if let Err(e) = self.surface.mount(&view) {
            wp_error!(TAG, "Could not mount overlay: {}", e);
            return false;
        }

        wp_info!(TAG, "Showing avoidance screen for: {}", view.keyword_summary());
        self.closing = false;
        self.session = Some(OverlaySession {
            detected_keywords: view.keywords.into_iter().map(|l| l.keyword).collect(),
            message: view.message,
            on_close: Some(on_close),
        });
        true
    }

    /// End the active session. No-op (false) when idle.
    pub fn exit(&mut self, action: ExitAction) -> bool {
        let Some(session) = self.session.take() else {
            return false;
        };

        wp_info!(TAG, "Overlay closed ({:?})", action);
        self.closing = true;
        session.close();

        match action {
            ExitAction::Continue => {
                self.surface.dismiss(&self.overlay_id, self.exit_transition_ms);
            }
            ExitAction::Leave => {
                // Going back may keep this document (forward-only history,
                // in-app routes), so the overlay is always dismissed too
                if self.surface.navigate_back() {
                    self.surface.dismiss(&self.overlay_id, self.exit_transition_ms);
                } else {
                    wp_warn!(TAG, "No history entry to go back to");
                    self.surface.dismiss(&self.overlay_id, 0);
                }
            }
        }
        true
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Surface that keeps mounted overlays in a list, like a tiny DOM
    #[derive(Debug, Default)]
    pub(crate) struct RecordingSurface {
        pub mounted: Vec<OverlayView>,
        pub dismissed: Vec<(String, u32)>,
        pub back_navigations: usize,
        pub has_history: bool,
        pub fail_mount: bool,
        /// Keep dismissed overlays mounted until `finish_transitions`
        pub defer_removal: bool,
        pub fading: Vec<String>,
    }

    impl RecordingSurface {
        pub fn with_history() -> Self {
            Self {
                has_history: true,
                ..Self::default()
            }
        }

        pub fn count(&self, overlay_id: &str) -> usize {
            self.mounted.iter().filter(|v| v.overlay_id == overlay_id).count()
        }

        /// Let every pending exit transition complete
        pub fn finish_transitions(&mut self) {
            let fading = std::mem::take(&mut self.fading);
            self.mounted.retain(|v| !fading.contains(&v.overlay_id));
        }
    }

    impl OverlaySurface for RecordingSurface {
        fn remove_stale(&mut self, overlay_id: &str) -> bool {
            let before = self.mounted.len();
            self.mounted.retain(|v| v.overlay_id != overlay_id);
            before != self.mounted.len()
        }

        fn mount(&mut self, view: &OverlayView) -> Result<(), String> {
            if self.fail_mount {
                return Err("document has no body".to_string());
            }
            self.mounted.push(view.clone());
            Ok(())
        }

        fn dismiss(&mut self, overlay_id: &str, transition_ms: u32) {
            self.dismissed.push((overlay_id.to_string(), transition_ms));
            if self.defer_removal && transition_ms > 0 {
                self.fading.push(overlay_id.to_string());
            } else {
                self.mounted.retain(|v| v.overlay_id != overlay_id);
            }
        }

        fn navigate_back(&mut self) -> bool {
            self.back_navigations += 1;
            self.has_history
        }

        fn is_mounted(&self, overlay_id: &str) -> bool {
            self.count(overlay_id) > 0
        }
    }

    const ID: &str = "wordpop-overlay";

    fn controller() -> OverlayController<RecordingSurface> {
        OverlayController::new(RecordingSurface::with_history(), ID, 300)
    }

    fn counting_close() -> (OnClose, Rc<Cell<u32>>) {
        let calls = Rc::new(Cell::new(0));
        let c = Rc::clone(&calls);
        (Box::new(move || c.set(c.get() + 1)), calls)
    }

    #[test]
    fn test_open_mounts_one_overlay() {
        let mut overlay = controller();
        let (on_close, _) = counting_close();

        assert!(overlay.open(vec!["alex".to_string()], "Breathe.", on_close));

        assert!(overlay.is_active());
        assert_eq!(overlay.surface().count(ID), 1);
        let view = &overlay.surface().mounted[0];
        assert_eq!(view.message, "Breathe.");
        assert_eq!(view.keyword_summary(), "alex");
    }

    #[test]
    fn test_second_open_is_ignored() {
        let mut overlay = controller();
        let (first, first_calls) = counting_close();
        let (second, second_calls) = counting_close();

        assert!(overlay.open(vec!["alex".to_string()], "one", first));
        assert!(!overlay.open(vec!["sam".to_string()], "two", second));

        assert_eq!(overlay.surface().count(ID), 1);
        assert_eq!(overlay.session().unwrap().detected_keywords(), ["alex".to_string()]);
        assert_eq!(first_calls.get(), 0);
        assert_eq!(second_calls.get(), 0);
    }

    #[test]
    fn test_open_removes_stale_markup() {
        let mut surface = RecordingSurface::with_history();
        surface.mounted.push(OverlayView {
            overlay_id: ID.to_string(),
            message: "left over".to_string(),
            keywords: vec![],
        });
        let mut overlay = OverlayController::new(surface, ID, 300);
        let (on_close, _) = counting_close();

        overlay.open(vec!["alex".to_string()], "fresh", on_close);

        assert_eq!(overlay.surface().count(ID), 1);
        assert_eq!(overlay.surface().mounted[0].message, "fresh");
    }

    #[test]
    fn test_open_dedupes_keywords_in_order() {
        let mut overlay = controller();
        let (on_close, _) = counting_close();

        overlay.open(
            vec!["sam".to_string(), "alex".to_string(), "sam".to_string()],
            "m",
            on_close,
        );

        assert_eq!(
            overlay.session().unwrap().detected_keywords(),
            ["sam".to_string(), "alex".to_string()]
        );
    }

    #[test]
    fn test_continue_closes_with_transition() {
        let mut overlay = controller();
        let (on_close, calls) = counting_close();
        overlay.open(vec!["alex".to_string()], "m", on_close);

        assert!(overlay.exit(ExitAction::Continue));

        assert_eq!(calls.get(), 1);
        assert!(!overlay.is_active());
        assert_eq!(overlay.surface().count(ID), 0);
        assert_eq!(overlay.surface().dismissed, vec![(ID.to_string(), 300)]);
        assert_eq!(overlay.surface().back_navigations, 0);
    }

    #[test]
    fn test_leave_closes_then_navigates_back() {
        let mut overlay = controller();
        let (on_close, calls) = counting_close();
        overlay.open(vec!["alex".to_string()], "m", on_close);

        assert!(overlay.exit(ExitAction::Leave));

        assert_eq!(calls.get(), 1);
        assert_eq!(overlay.surface().back_navigations, 1);
        assert_eq!(overlay.surface().dismissed, vec![(ID.to_string(), 300)]);
    }

    #[test]
    fn test_leave_within_same_document_removes_overlay() {
        // history.back() "succeeds" but the page stays (forward-only history,
        // in-app route): the overlay must not be left behind without a session
        let mut overlay = controller();
        let (on_close, _) = counting_close();
        overlay.open(vec!["alex".to_string()], "m", on_close);

        overlay.exit(ExitAction::Leave);

        assert_eq!(overlay.surface().count(ID), 0);
        assert!(!overlay.is_visible());
        assert!(!overlay.exit(ExitAction::Continue));
    }

    #[test]
    fn test_visible_until_transition_completes() {
        let mut surface = RecordingSurface::with_history();
        surface.defer_removal = true;
        let mut overlay = OverlayController::new(surface, ID, 300);
        let (on_close, calls) = counting_close();
        overlay.open(vec!["alex".to_string()], "m", on_close);

        overlay.exit(ExitAction::Continue);
        assert_eq!(calls.get(), 1);
        assert!(!overlay.is_active());
        assert!(overlay.is_visible());

        overlay.surface_mut().finish_transitions();
        assert!(!overlay.is_visible());
    }

    #[test]
    fn test_foreign_element_does_not_count_as_visible() {
        let mut surface = RecordingSurface::with_history();
        surface.mounted.push(OverlayView {
            overlay_id: ID.to_string(),
            message: "left over".to_string(),
            keywords: vec![],
        });
        let overlay = OverlayController::new(surface, ID, 300);

        assert!(!overlay.is_visible());
    }

    #[test]
    fn test_leave_without_history_dismisses() {
        let mut overlay = OverlayController::new(RecordingSurface::default(), ID, 300);
        let (on_close, calls) = counting_close();
        overlay.open(vec!["alex".to_string()], "m", on_close);

        overlay.exit(ExitAction::Leave);

        assert_eq!(calls.get(), 1);
        assert_eq!(overlay.surface().dismissed, vec![(ID.to_string(), 0)]);
    }

    #[test]
    fn test_on_close_runs_once() {
        let mut overlay = controller();
        let (on_close, calls) = counting_close();
        overlay.open(vec!["alex".to_string()], "m", on_close);

        assert!(overlay.exit(ExitAction::Continue));
        assert!(!overlay.exit(ExitAction::Leave));
        assert!(!overlay.exit(ExitAction::Continue));

        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_failed_mount_stays_idle() {
        let mut surface = RecordingSurface::with_history();
        surface.fail_mount = true;
        let mut overlay = OverlayController::new(surface, ID, 300);
        let (on_close, calls) = counting_close();

        assert!(!overlay.open(vec!["alex".to_string()], "m", on_close));
        assert!(!overlay.is_active());
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_reopen_after_close() {
        let mut overlay = controller();
        let (first, _) = counting_close();
        let (second, _) = counting_close();

        overlay.open(vec!["alex".to_string()], "m", first);
        overlay.exit(ExitAction::Continue);
        assert!(overlay.open(vec!["sam".to_string()], "m", second));

        assert_eq!(overlay.surface().count(ID), 1);
    }

    #[test]
    fn test_exit_action_wire_names() {
        assert_eq!(serde_json::to_string(&ExitAction::Leave).unwrap(), "\"leave\"");
        let action: ExitAction = serde_json::from_str("\"continue\"").unwrap();
        assert_eq!(action, ExitAction::Continue);
    }
}
