//! Content script runtime
//!
//! Wires the scheduler to the page: storage load, the delayed initial scan,
//! a MutationObserver on `document.body`, the polling interval, external
//! storage changes and (on localhost) the test button.
//!
//! Every event handler holds a `Weak` to the runtime and borrows the
//! scheduler with `try_borrow_mut`; an event that arrives while another is
//! being handled is dropped, the next poll picks it up.

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::{Array, Function, Promise};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{Document, Event, MutationObserver, MutationObserverInit, MutationRecord, Window};

use crate::config::EngineConfig;
use crate::messages::RuntimeMessage;
use crate::overlay::dom::{DomSurface, ExitHandler};
use crate::overlay::ExitAction;
use crate::scanner::now_ms;
use crate::scheduler::{
    compose_page_text, mutations_affect_text, MutationKind, RescanScheduler, ScanOutcome, ScanTrigger,
};
use crate::storage::browser::{browser_storage, chrome_path, on_external_change, BrowserStorage};
use crate::storage::{SettingsUpdate, StorageError};

const TAG: &str = "WordPop";

const TEST_BUTTON_ID: &str = "wordpop-test-button";
const TEST_BUTTON_LABEL: &str = "Test Breakup Buddy Popup";
const TEST_BUTTON_DELAY_MS: i32 = 1_000;
const TEST_BUTTON_STYLE: &str = "position: fixed; bottom: 20px; right: 20px; \
    z-index: 2147483646; padding: 10px 16px; background: rgb(236, 72, 153); color: white; \
    border: none; border-radius: 8px; font-size: 14px; cursor: pointer;";
const DEV_HOSTS: [&str; 2] = ["localhost", "127.0.0.1"];

thread_local! {
    static RUNTIME: RefCell<Option<Rc<ContentScript>>> = const { RefCell::new(None) };
}

struct ContentScript {
    config: EngineConfig,
    window: Window,
    document: Document,
    storage: BrowserStorage,
    scheduler: RefCell<RescanScheduler<DomSurface>>,
}

impl ContentScript {
    fn new(config: EngineConfig, window: Window, document: Document) -> Rc<Self> {
        let surface = DomSurface::new(document.clone());
        let mut scheduler = RescanScheduler::new(&config, surface);
        if config.notify_background {
            scheduler.set_detection_hook(Box::new(notify_background));
        }

        let runtime = Rc::new(Self {
            config,
            window,
            document,
            storage: browser_storage(),
            scheduler: RefCell::new(scheduler),
        });

        let weak = Rc::downgrade(&runtime);
        let handler: ExitHandler = Rc::new(move |action: ExitAction| {
            if let Some(runtime) = weak.upgrade() {
                runtime.exit(action);
            }
        });
        runtime
            .scheduler
            .borrow_mut()
            .overlay_mut()
            .surface_mut()
            .set_exit_handler(handler);
        runtime
    }

    fn start(self: &Rc<Self>) {
        wp_info!(TAG, "Content script started");

        let runtime = Rc::clone(self);
        spawn_local(async move {
            let fetched = runtime.storage.fetch_settings().await;
            let keywords = runtime.scheduler.borrow_mut().apply_loaded(fetched);
            wp_info!(TAG, "Keywords loaded: {:?}", keywords);

            let weak = Rc::downgrade(&runtime);
            runtime.after(runtime.config.initial_scan_delay_ms as i32, move || {
                if let Some(runtime) = weak.upgrade() {
                    runtime.scan(ScanTrigger::InitialLoad);
                }
            });
        });

        if let Err(e) = self.observe_mutations() {
            wp_error!(TAG, "Could not observe page mutations: {:?}", e);
        }
        if let Err(e) = self.start_polling() {
            wp_error!(TAG, "Could not start polling: {:?}", e);
        }
        if let Err(e) = self.watch_storage() {
            wp_warn!(TAG, "Not watching keyword changes: {}", e);
        }
        if self.config.dev_test_button && self.is_dev_host() {
            let weak = Rc::downgrade(self);
            self.after(TEST_BUTTON_DELAY_MS, move || {
                if let Some(runtime) = weak.upgrade() {
                    if let Err(e) = runtime.install_test_button() {
                        wp_warn!(TAG, "Could not add test button: {:?}", e);
                    }
                }
            });
        }
    }

    // -------------------------------------------------------------------------
    // Scanning
    // -------------------------------------------------------------------------

    fn scan(&self, trigger: ScanTrigger) -> Option<ScanOutcome> {
        let Ok(mut scheduler) = self.scheduler.try_borrow_mut() else {
            wp_debug!(TAG, "{:?} scan skipped: scheduler busy", trigger);
            return None;
        };
        // innerText forces a layout; don't pay for it while suspended
        let text = if scheduler.is_suspended() {
            String::new()
        } else {
            self.page_text()
        };
        Some(scheduler.request_scan(trigger, &text, now_ms()))
    }

    /// Title, URL and visible body text, minus our own test button label
    fn page_text(&self) -> String {
        let title = self.document.title();
        let url = self.window.location().href().unwrap_or_default();
        let body = self
            .document
            .body()
            .map(|body| body.inner_text())
            .unwrap_or_default();
        let own_labels: &[&str] = if self.document.get_element_by_id(TEST_BUTTON_ID).is_some() {
            &[TEST_BUTTON_LABEL]
        } else {
            &[]
        };
        compose_page_text(&title, &url, &body, own_labels)
    }

    fn exit(&self, action: ExitAction) {
        match self.scheduler.try_borrow_mut() {
            Ok(mut scheduler) => {
                scheduler.handle_exit(action);
            }
            Err(_) => wp_warn!(TAG, "Exit ignored: scheduler busy"),
        }
    }

    fn apply_update(&self, update: SettingsUpdate) {
        let changed = match self.scheduler.try_borrow_mut() {
            Ok(mut scheduler) => scheduler.apply_update(update),
            Err(_) => {
                wp_warn!(TAG, "Storage change dropped: scheduler busy");
                return;
            }
        };
        if changed {
            self.scan(ScanTrigger::StorageChange);
        }
    }

    /// `KeywordStore::refresh` split around the fetch: the scheduler's
    /// `RefCell` must not stay borrowed across an await, or every DOM event
    /// during the fetch would be dropped.
    async fn refresh(&self) -> Vec<String> {
        if let Ok(mut scheduler) = self.scheduler.try_borrow_mut() {
            scheduler.state_mut().clear_cooldowns();
        }
        let fetched = self.storage.fetch_settings().await;
        match self.scheduler.try_borrow_mut() {
            Ok(mut scheduler) => scheduler.apply_loaded(fetched),
            Err(_) => {
                wp_warn!(TAG, "Refreshed keywords not applied: scheduler busy");
                fetched.map(|settings| settings.keywords).unwrap_or_default()
            }
        }
    }

    // -------------------------------------------------------------------------
    // Triggers
    // -------------------------------------------------------------------------

    fn observe_mutations(self: &Rc<Self>) -> Result<(), JsValue> {
        let Some(body) = self.document.body() else {
            return Err(JsValue::from_str("document has no body"));
        };

        let weak = Rc::downgrade(self);
        let callback = Closure::wrap(Box::new(move |records: Array, _observer: MutationObserver| {
            let kinds = records
                .iter()
                .filter_map(|record| record.dyn_into::<MutationRecord>().ok())
                .filter_map(|record| MutationKind::from_record_type(&record.type_()));
            if !mutations_affect_text(kinds) {
                return;
            }
            if let Some(runtime) = weak.upgrade() {
                runtime.scan(ScanTrigger::Mutation);
            }
        }) as Box<dyn FnMut(Array, MutationObserver)>);

        let observer = MutationObserver::new(callback.as_ref().unchecked_ref())?;
        let init = MutationObserverInit::new();
        init.set_child_list(true);
        init.set_subtree(true);
        init.set_character_data(true);
        observer.observe_with_options(&body, &init)?;

        callback.forget();
        Ok(())
    }

    fn start_polling(self: &Rc<Self>) -> Result<(), JsValue> {
        let weak = Rc::downgrade(self);
        let tick = Closure::wrap(Box::new(move || {
            if let Some(runtime) = weak.upgrade() {
                runtime.scan(ScanTrigger::Poll);
            }
        }) as Box<dyn FnMut()>);

        self.window.set_interval_with_callback_and_timeout_and_arguments_0(
            tick.as_ref().unchecked_ref(),
            self.config.poll_interval_ms as i32,
        )?;
        tick.forget();
        Ok(())
    }

    fn watch_storage(self: &Rc<Self>) -> Result<(), StorageError> {
        let weak = Rc::downgrade(self);
        on_external_change(move |update| {
            if let Some(runtime) = weak.upgrade() {
                runtime.apply_update(update);
            }
        })
    }

    fn after<F>(&self, delay_ms: i32, f: F)
    where
        F: FnOnce() + 'static,
    {
        let callback = Closure::once_into_js(f);
        if let Err(e) = self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), delay_ms)
        {
            wp_error!(TAG, "setTimeout failed: {:?}", e);
        }
    }

    // -------------------------------------------------------------------------
    // Test button
    // -------------------------------------------------------------------------

    fn is_dev_host(&self) -> bool {
        self.window
            .location()
            .hostname()
            .map(|host| DEV_HOSTS.contains(&host.as_str()))
            .unwrap_or(false)
    }

    fn install_test_button(self: &Rc<Self>) -> Result<(), JsValue> {
        if self.document.get_element_by_id(TEST_BUTTON_ID).is_some() {
            return Ok(());
        }
        let body = self
            .document
            .body()
            .ok_or_else(|| JsValue::from_str("document has no body"))?;

        let button = self.document.create_element("button")?;
        button.set_id(TEST_BUTTON_ID);
        button.set_text_content(Some(TEST_BUTTON_LABEL));
        button.set_attribute("style", TEST_BUTTON_STYLE)?;

        let weak = Rc::downgrade(self);
        let on_click = Closure::wrap(Box::new(move |_event: Event| {
            let Some(runtime) = weak.upgrade() else {
                return;
            };
            let Ok(mut scheduler) = runtime.scheduler.try_borrow_mut() else {
                return;
            };
            scheduler.open_test_alert();
        }) as Box<dyn FnMut(Event)>);
        button.add_event_listener_with_callback("click", on_click.as_ref().unchecked_ref())?;
        on_click.forget();

        body.append_child(&button)?;
        wp_debug!(TAG, "Test button added");
        Ok(())
    }
}

/// Tell the background script about each detected keyword.
fn notify_background(keywords: &[String]) {
    let Some(runtime) = chrome_path(&["runtime"]) else {
        return;
    };
    let Some(send) = js_sys::Reflect::get(&runtime, &JsValue::from_str("sendMessage"))
        .ok()
        .and_then(|f| f.dyn_into::<Function>().ok())
    else {
        return;
    };
    let url = web_sys::window().and_then(|w| w.location().href().ok());

    for keyword in keywords {
        let message = RuntimeMessage::WordDetected {
            keyword: keyword.clone(),
            url: url.clone(),
        };
        let value = match serde_wasm_bindgen::to_value(&message) {
            Ok(value) => value,
            Err(e) => {
                wp_error!(TAG, "Could not encode runtime message: {}", e);
                continue;
            }
        };
        match send.call1(&runtime, &value) {
            Ok(result) => {
                // No listener rejects the promise; that is not an error here
                if let Ok(promise) = result.dyn_into::<Promise>() {
                    spawn_local(async move {
                        if let Err(e) = JsFuture::from(promise).await {
                            wp_debug!(TAG, "WORD_DETECTED not delivered: {:?}", e);
                        }
                    });
                }
            }
            Err(e) => wp_debug!(TAG, "sendMessage failed: {:?}", e),
        }
    }
}

fn current() -> Option<Rc<ContentScript>> {
    RUNTIME.with(|slot| slot.borrow().clone())
}

// =============================================================================
// WASM exports
// =============================================================================

/// Start detection on the current page. `config` is an optional partial
/// `EngineConfig` object. Calling it twice is a no-op.
#[wasm_bindgen(js_name = startContentScript)]
pub fn start_content_script(config: JsValue) -> Result<(), JsValue> {
    if current().is_some() {
        wp_warn!(TAG, "Content script already running");
        return Ok(());
    }

    let config = EngineConfig::from_js(config);
    crate::logging::set_verbose(config.verbose);

    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))?;

    let runtime = ContentScript::new(config, window, document.clone());
    RUNTIME.with(|slot| *slot.borrow_mut() = Some(Rc::clone(&runtime)));

    if document.body().is_some() {
        runtime.start();
    } else {
        // Injected at document_start: wait for the body to exist
        let deferred = Closure::once_into_js(move || runtime.start());
        document.add_event_listener_with_callback("DOMContentLoaded", deferred.unchecked_ref())?;
    }
    Ok(())
}

/// Scan the page now. Returns true when an overlay opened.
#[wasm_bindgen(js_name = rescanPage)]
pub fn rescan_page() -> bool {
    matches!(
        current().and_then(|runtime| runtime.scan(ScanTrigger::Manual)),
        Some(ScanOutcome::Detected(_))
    )
}

/// Forget cooldowns and reload keywords from storage. Resolves with the
/// keyword list.
#[wasm_bindgen(js_name = refreshKeywords)]
pub async fn refresh_keywords() -> Result<JsValue, JsValue> {
    let runtime = current().ok_or_else(|| JsValue::from_str("content script not started"))?;
    let keywords = runtime.refresh().await;
    Ok(serde_wasm_bindgen::to_value(&keywords)?)
}

/// Scheduler counters, for debugging
#[wasm_bindgen(js_name = scanStats)]
pub fn scan_stats() -> Result<JsValue, JsValue> {
    let runtime = current().ok_or_else(|| JsValue::from_str("content script not started"))?;
    let scheduler = runtime
        .scheduler
        .try_borrow()
        .map_err(|_| JsValue::from_str("scheduler busy"))?;
    Ok(serde_wasm_bindgen::to_value(scheduler.stats())?)
}
