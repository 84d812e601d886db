use thiserror::Error;
use wasm_bindgen::JsValue;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("{backend} storage is not available")]
    Unavailable { backend: &'static str },

    #[error("{backend} storage call failed: {message}")]
    Backend {
        backend: &'static str,
        message: String,
    },

    #[error("corrupt value for {key}: {message}")]
    Corrupt { key: String, message: String },
}

impl StorageError {
    pub fn backend(backend: &'static str, message: impl Into<String>) -> Self {
        Self::Backend {
            backend,
            message: message.into(),
        }
    }
}

impl From<StorageError> for JsValue {
    fn from(e: StorageError) -> Self {
        JsValue::from_str(&e.to_string())
    }
}
