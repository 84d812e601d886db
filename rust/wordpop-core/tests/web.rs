//! Browser tests for the DOM overlay surface.
//!
//! Run with `wasm-pack test --headless --chrome rust/wordpop-core`.

#![cfg(target_arch = "wasm32")]

use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::JsCast;
use wasm_bindgen_test::*;
use web_sys::{Document, HtmlElement};

use wordpop_core::overlay::dom::DomSurface;
use wordpop_core::{
    ExitAction, KeywordLine, OverlayController, CONTINUE_BUTTON_ID, DEFAULT_OVERLAY_ID,
    LEAVE_BUTTON_ID, STYLES_ID,
};

wasm_bindgen_test_configure!(run_in_browser);

fn document() -> Document {
    web_sys::window().unwrap().document().unwrap()
}

fn overlay_count(document: &Document) -> u32 {
    document
        .query_selector_all(&format!("#{}", DEFAULT_OVERLAY_ID))
        .unwrap()
        .length()
}

fn controller() -> OverlayController<DomSurface> {
    OverlayController::new(DomSurface::new(document()), DEFAULT_OVERLAY_ID, 0)
}

fn cleanup(document: &Document) {
    for id in [DEFAULT_OVERLAY_ID, STYLES_ID] {
        if let Some(el) = document.get_element_by_id(id) {
            el.remove();
        }
    }
}

#[wasm_bindgen_test]
fn test_open_mounts_single_overlay() {
    let doc = document();
    cleanup(&doc);
    let mut overlay = controller();

    assert!(overlay.open(vec!["alex".to_string()], "Breathe.", Box::new(|| {})));
    assert!(!overlay.open(vec!["sam".to_string()], "Again.", Box::new(|| {})));

    assert_eq!(overlay_count(&doc), 1);
    assert!(doc.get_element_by_id(STYLES_ID).is_some());
    let text = doc
        .get_element_by_id(DEFAULT_OVERLAY_ID)
        .unwrap()
        .text_content()
        .unwrap();
    assert!(text.contains("Stop and breathe"));
    assert!(text.contains("Breathe."));
    assert!(text.contains("alex"));
    assert!(!text.contains("sam"));

    overlay.exit(ExitAction::Continue);
    assert_eq!(overlay_count(&doc), 0);
    cleanup(&doc);
}

#[wasm_bindgen_test]
fn test_keywords_rendered_as_text() {
    let doc = document();
    cleanup(&doc);
    let mut overlay = controller();

    overlay.open_with_lines(
        vec![KeywordLine {
            keyword: "<b>ex</b>".to_string(),
            message: Some("<img src=x>".to_string()),
        }],
        "m",
        Box::new(|| {}),
    );

    let el = doc.get_element_by_id(DEFAULT_OVERLAY_ID).unwrap();
    assert!(el.query_selector("b").unwrap().is_none());
    assert!(el.query_selector("img").unwrap().is_none());
    assert!(el.text_content().unwrap().contains("<b>ex</b>: <img src=x>"));

    overlay.exit(ExitAction::Continue);
    cleanup(&doc);
}

#[wasm_bindgen_test]
fn test_continue_button_routes_to_handler() {
    let doc = document();
    cleanup(&doc);
    let actions: Rc<RefCell<Vec<ExitAction>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&actions);

    let mut surface = DomSurface::new(doc.clone());
    surface.set_exit_handler(Rc::new(move |action| sink.borrow_mut().push(action)));
    let mut overlay = OverlayController::new(surface, DEFAULT_OVERLAY_ID, 0);
    overlay.open(vec!["alex".to_string()], "m", Box::new(|| {}));

    for id in [CONTINUE_BUTTON_ID, LEAVE_BUTTON_ID] {
        doc.get_element_by_id(id)
            .unwrap()
            .dyn_into::<HtmlElement>()
            .unwrap()
            .click();
    }

    assert_eq!(*actions.borrow(), vec![ExitAction::Continue, ExitAction::Leave]);
    overlay.exit(ExitAction::Continue);
    cleanup(&doc);
}

#[wasm_bindgen_test]
fn test_open_replaces_stale_element() {
    let doc = document();
    cleanup(&doc);
    let stale = doc.create_element("div").unwrap();
    stale.set_id(DEFAULT_OVERLAY_ID);
    doc.body().unwrap().append_child(&stale).unwrap();

    let mut overlay = controller();
    overlay.open(vec!["alex".to_string()], "fresh", Box::new(|| {}));

    assert_eq!(overlay_count(&doc), 1);
    overlay.exit(ExitAction::Continue);
    cleanup(&doc);
}

#[wasm_bindgen_test]
fn test_fading_overlay_stays_visible() {
    let doc = document();
    cleanup(&doc);
    let mut overlay = OverlayController::new(DomSurface::new(doc.clone()), DEFAULT_OVERLAY_ID, 300);
    overlay.open(vec!["alex".to_string()], "m", Box::new(|| {}));

    overlay.exit(ExitAction::Continue);

    // Removal waits for the exit transition
    assert!(!overlay.is_active());
    assert!(overlay.is_visible());
    cleanup(&doc);
    assert!(!overlay.is_visible());
}
