//! Overlay Controller
//!
//! - `view.rs` - what the overlay shows (`OverlayView`) + DOM constants
//! - `controller.rs` - `OverlayController`: singleton session state machine
//!   over an `OverlaySurface`
//! - `dom.rs` - `DomSurface`: the real page surface (wasm32)

pub mod controller;
pub mod view;

#[cfg(target_arch = "wasm32")]
pub mod dom;

pub use controller::*;
pub use view::*;
