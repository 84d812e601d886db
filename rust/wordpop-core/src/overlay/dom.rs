//! DomSurface: draws the overlay into the page (wasm32 only)
//!
//! Elements are built with `create_element` + `set_text_content`, never
//! `innerHTML`, so user-supplied keywords and messages are inert text.
//! Button clicks are forwarded to the exit handler installed by the content
//! script, which routes them back into `OverlayController::exit`.

use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, Event, HtmlElement};

use super::controller::{ExitAction, OverlaySurface};
use super::view::*;

const TAG: &str = "Overlay";

pub type ExitHandler = Rc<dyn Fn(ExitAction)>;

pub struct DomSurface {
    document: Document,
    exit_handler: Option<ExitHandler>,
    /// Click listeners of the mounted overlay. Replaced on the next mount,
    /// never dropped from inside a click.
    listeners: Vec<Closure<dyn FnMut(Event)>>,
}

impl DomSurface {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            exit_handler: None,
            listeners: Vec::new(),
        }
    }

    pub fn set_exit_handler(&mut self, handler: ExitHandler) {
        self.exit_handler = Some(handler);
    }

    fn element(&self, tag: &str, style: &str) -> Result<Element, String> {
        let el = self
            .document
            .create_element(tag)
            .map_err(|e| format!("create_element({}) failed: {:?}", tag, e))?;
        if !style.is_empty() {
            el.set_attribute("style", style)
                .map_err(|e| format!("set style failed: {:?}", e))?;
        }
        Ok(el)
    }

    fn text(&self, tag: &str, style: &str, text: &str) -> Result<Element, String> {
        let el = self.element(tag, style)?;
        el.set_text_content(Some(text));
        Ok(el)
    }

    fn install_styles(&self) -> Result<(), String> {
        if let Some(existing) = self.document.get_element_by_id(STYLES_ID) {
            existing.remove();
        }
        let head = self.document.head().ok_or("document has no head")?;
        let style = self.text("style", "", OVERLAY_STYLES)?;
        style.set_id(STYLES_ID);
        append(&head, &style)
    }

    fn button(
        &self,
        id: &str,
        style: &str,
        label: &str,
        action: ExitAction,
        listeners: &mut Vec<Closure<dyn FnMut(Event)>>,
    ) -> Result<Element, String> {
        let button = self.text("button", style, label)?;
        button.set_id(id);

        let handler = self.exit_handler.clone();
        let listener = Closure::wrap(Box::new(move |event: Event| {
            event.prevent_default();
            match &handler {
                Some(handler) => handler(action),
                None => wp_warn!(TAG, "No exit handler installed"),
            }
        }) as Box<dyn FnMut(Event)>);

        button
            .add_event_listener_with_callback("click", listener.as_ref().unchecked_ref())
            .map_err(|e| format!("add_event_listener failed: {:?}", e))?;
        listeners.push(listener);
        Ok(button)
    }

    fn build(
        &self,
        view: &OverlayView,
        listeners: &mut Vec<Closure<dyn FnMut(Event)>>,
    ) -> Result<Element, String> {
        let overlay = self.element("div", OVERLAY_STYLE)?;
        overlay.set_id(&view.overlay_id);

        let panel = self.element("div", PANEL_STYLE)?;

        let header = self.element("h2", HEADER_STYLE)?;
        append(&header, &self.text("span", ACCENT_STYLE, HEADER_ACCENT)?)?;
        header
            .append_with_str_1(HEADER_TEXT)
            .map_err(|e| format!("{:?}", e))?;
        append(&panel, &header)?;

        append(&panel, &self.text("p", MESSAGE_STYLE, &view.message)?)?;

        if !view.keywords.is_empty() {
            let detected = self.element("div", KEYWORD_BOX_STYLE)?;
            append(&detected, &self.text("p", KEYWORD_LABEL_STYLE, DETECTED_LABEL)?)?;
            append(&detected, &self.text("p", KEYWORD_LIST_STYLE, &view.keyword_summary())?)?;
            for (keyword, note) in view.notes() {
                let line = format!("{}: {}", keyword, note);
                append(&detected, &self.text("p", NOTE_STYLE, &line)?)?;
            }
            append(&panel, &detected)?;
        }

        let actions = self.element("div", ACTIONS_STYLE)?;
        let leave = self.button(
            LEAVE_BUTTON_ID,
            LEAVE_BUTTON_STYLE,
            LEAVE_LABEL,
            ExitAction::Leave,
            listeners,
        )?;
        let resume = self.button(
            CONTINUE_BUTTON_ID,
            CONTINUE_BUTTON_STYLE,
            CONTINUE_LABEL,
            ExitAction::Continue,
            listeners,
        )?;
        append(&actions, &leave)?;
        append(&actions, &resume)?;
        append(&panel, &actions)?;

        append(&overlay, &panel)?;
        Ok(overlay)
    }
}

fn append(parent: &Element, child: &Element) -> Result<(), String> {
    parent
        .append_child(child)
        .map(|_| ())
        .map_err(|e| format!("append_child failed: {:?}", e))
}

impl OverlaySurface for DomSurface {
    fn remove_stale(&mut self, overlay_id: &str) -> bool {
        match self.document.get_element_by_id(overlay_id) {
            Some(el) => {
                el.remove();
                true
            }
            None => false,
        }
    }

    fn mount(&mut self, view: &OverlayView) -> Result<(), String> {
        let body = self.document.body().ok_or("document has no body")?;
        self.install_styles()?;

        let mut listeners = Vec::new();
        let overlay = self.build(view, &mut listeners)?;

        body.append_child(&overlay)
            .map_err(|e| format!("append_child failed: {:?}", e))?;
        // Old overlay elements are gone by now, so their listeners can go too
        self.listeners = listeners;
        Ok(())
    }

    fn dismiss(&mut self, overlay_id: &str, transition_ms: u32) {
        let Some(el) = self.document.get_element_by_id(overlay_id) else {
            return;
        };
        if transition_ms == 0 {
            el.remove();
            return;
        }

        if let Some(html) = el.dyn_ref::<HtmlElement>() {
            if let Err(e) = html.style().set_property("animation", EXIT_ANIMATION) {
                wp_debug!(TAG, "Could not start exit transition: {:?}", e);
            }
        }
        let remove = Closure::once_into_js(move || el.remove());
        let scheduled = web_sys::window().map(|w| {
            w.set_timeout_with_callback_and_timeout_and_arguments_0(
                remove.unchecked_ref(),
                transition_ms as i32,
            )
        });
        if !matches!(scheduled, Some(Ok(_))) {
            wp_warn!(TAG, "Could not schedule overlay removal");
        }
    }

    fn is_mounted(&self, overlay_id: &str) -> bool {
        self.document.get_element_by_id(overlay_id).is_some()
    }

    fn navigate_back(&mut self) -> bool {
        let Some(history) = web_sys::window().and_then(|w| w.history().ok()) else {
            return false;
        };
        if history.length().unwrap_or(0) <= 1 {
            return false;
        }
        history.back().is_ok()
    }
}
