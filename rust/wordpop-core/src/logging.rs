//! Console logging for the extension runtime.
//!
//! On wasm32 every line goes to the page console through `web_sys::console`,
//! tagged with the component that produced it (`[StorageSync] ...`).
//! Native builds (unit tests, tooling) drop the output so no JS import is
//! ever called outside the browser.
//!
//! Debug lines are only emitted when verbose mode is on
//! (`EngineConfig::verbose`).

use std::cell::Cell;

thread_local! {
    static VERBOSE: Cell<bool> = const { Cell::new(false) };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

/// Toggle emission of debug lines.
pub fn set_verbose(verbose: bool) {
    VERBOSE.with(|v| v.set(verbose));
}

pub fn is_verbose() -> bool {
    VERBOSE.with(|v| v.get())
}

/// Write one tagged line at `level`.
pub fn write(level: Level, tag: &str, message: &str) {
    if level == Level::Debug && !is_verbose() {
        return;
    }
    emit(level, &format!("[{}] {}", tag, message));
}

#[cfg(target_arch = "wasm32")]
fn emit(level: Level, line: &str) {
    let line = wasm_bindgen::JsValue::from_str(line);
    match level {
        Level::Debug => web_sys::console::debug_1(&line),
        Level::Info => web_sys::console::log_1(&line),
        Level::Warn => web_sys::console::warn_1(&line),
        Level::Error => web_sys::console::error_1(&line),
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn emit(_level: Level, _line: &str) {}

macro_rules! wp_debug {
    ($tag:expr, $($arg:tt)*) => {
        $crate::logging::write($crate::logging::Level::Debug, $tag, &format!($($arg)*))
    };
}

macro_rules! wp_info {
    ($tag:expr, $($arg:tt)*) => {
        $crate::logging::write($crate::logging::Level::Info, $tag, &format!($($arg)*))
    };
}

macro_rules! wp_warn {
    ($tag:expr, $($arg:tt)*) => {
        $crate::logging::write($crate::logging::Level::Warn, $tag, &format!($($arg)*))
    };
}

macro_rules! wp_error {
    ($tag:expr, $($arg:tt)*) => {
        $crate::logging::write($crate::logging::Level::Error, $tag, &format!($($arg)*))
    };
}
