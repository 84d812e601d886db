pub mod keyword;
pub mod state;
pub mod wasm;

pub use keyword::*;
pub use state::*;
pub use wasm::*;
