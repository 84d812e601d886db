//! Runtime messages exchanged between the content and background scripts

use serde::{Deserialize, Serialize};

const TAG: &str = "WordPop";

/// Messages carried by `chrome.runtime.sendMessage`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RuntimeMessage {
    /// A keyword triggered an overlay in some tab
    #[serde(rename = "WORD_DETECTED")]
    WordDetected {
        keyword: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
}

/// Reply sent back through `sendResponse`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageAck {
    pub received: bool,
}

/// Handle one message in the background context.
pub fn acknowledge(message: &RuntimeMessage) -> MessageAck {
    match message {
        RuntimeMessage::WordDetected { keyword, url } => {
            match url {
                Some(url) => wp_info!(TAG, "Word detected: {} ({})", keyword, url),
                None => wp_info!(TAG, "Word detected: {}", keyword),
            }
            MessageAck { received: true }
        }
    }
}
