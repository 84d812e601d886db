//! Background (service worker) runtime
//!
//! - `runtime.onInstalled`: seed storage with empty defaults
//! - `runtime.onMessage`: acknowledge `WORD_DETECTED`

use js_sys::{Function, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;

use crate::messages::{acknowledge, RuntimeMessage};
use crate::storage::browser::{browser_storage, chrome_path};

const TAG: &str = "WordPop";

fn add_listener(path: &[&str], listener: &JsValue) -> Result<(), JsValue> {
    let event = chrome_path(path)
        .ok_or_else(|| JsValue::from_str(&format!("chrome.{} unavailable", path.join("."))))?;
    let add: Function = Reflect::get(&event, &JsValue::from_str("addListener"))?.dyn_into()?;
    add.call1(&event, listener)?;
    Ok(())
}

fn install_defaults() {
    spawn_local(async {
        match browser_storage().install_defaults().await {
            Ok(written) if written.is_empty() => wp_info!(TAG, "Extension installed"),
            Ok(written) => wp_info!(TAG, "Extension installed, defaults written: {:?}", written),
            Err(e) => wp_error!(TAG, "Could not write install defaults: {}", e),
        }
    });
}

/// Register the background listeners.
#[wasm_bindgen(js_name = startBackground)]
pub fn start_background() -> Result<(), JsValue> {
    let on_installed = Closure::wrap(Box::new(move |_details: JsValue| {
        install_defaults();
    }) as Box<dyn FnMut(JsValue)>);
    add_listener(&["runtime", "onInstalled"], on_installed.as_ref())?;
    on_installed.forget();

    let on_message = Closure::wrap(Box::new(
        move |message: JsValue, _sender: JsValue, send_response: JsValue| -> JsValue {
            let Ok(reply) = handle_runtime_message(message) else {
                // Not ours; let other listeners answer
                return JsValue::FALSE;
            };
            if let Some(send_response) = send_response.dyn_ref::<Function>() {
                if let Err(e) = send_response.call1(&JsValue::NULL, &reply) {
                    wp_warn!(TAG, "sendResponse failed: {:?}", e);
                }
            }
            // Keep the channel open for the response
            JsValue::TRUE
        },
    ) as Box<dyn FnMut(JsValue, JsValue, JsValue) -> JsValue>);
    add_listener(&["runtime", "onMessage"], on_message.as_ref())?;
    on_message.forget();

    wp_info!(TAG, "Background started");
    Ok(())
}

/// Handle one runtime message and return the reply (`{received: true}`).
/// Rejects messages this extension does not know.
#[wasm_bindgen(js_name = handleRuntimeMessage)]
pub fn handle_runtime_message(message: JsValue) -> Result<JsValue, JsValue> {
    let message: RuntimeMessage = serde_wasm_bindgen::from_value(message)
        .map_err(|e| JsValue::from_str(&format!("Unknown runtime message: {}", e)))?;
    Ok(serde_wasm_bindgen::to_value(&acknowledge(&message))?)
}
