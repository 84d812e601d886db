use serde::{Deserialize, Serialize};

/// Styles element id (keyframes + button hover states)
pub const STYLES_ID: &str = "wordpop-styles";
/// "Leave This Page" button id
pub const LEAVE_BUTTON_ID: &str = "leave-page";
/// "Continue Anyway" button id
pub const CONTINUE_BUTTON_ID: &str = "close-wordpop";
/// Highest z-index a page can use
pub const MAX_Z_INDEX: &str = "2147483647";

pub const HEADER_ACCENT: &str = "Stop";
pub const HEADER_TEXT: &str = " and breathe";
pub const DETECTED_LABEL: &str = "Detected sensitive content:";
pub const LEAVE_LABEL: &str = "Leave This Page";
pub const CONTINUE_LABEL: &str = "Continue Anyway";

/// One detected keyword, with the custom message the user set for it (if any)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordLine {
    pub keyword: String,
    pub message: Option<String>,
}

impl KeywordLine {
    pub fn plain(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            message: None,
        }
    }
}

/// Everything a surface needs to draw the overlay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayView {
    pub overlay_id: String,
    pub message: String,
    pub keywords: Vec<KeywordLine>,
}

impl OverlayView {
    /// "alex, paris" as shown under the detected-content label
    pub fn keyword_summary(&self) -> String {
        self.keywords
            .iter()
            .map(|line| line.keyword.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Keyword lines that carry a custom message
    pub fn notes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.keywords
            .iter()
            .filter_map(|line| line.message.as_deref().map(|m| (line.keyword.as_str(), m)))
    }
}

pub const OVERLAY_STYLES: &str = r#"
@keyframes wordpopFadeIn {
  from { opacity: 0; transform: scale(0.98); }
  to { opacity: 1; transform: scale(1); }
}
@keyframes wordpopFadeOut {
  from { opacity: 1; transform: scale(1); }
  to { opacity: 0; transform: scale(0.98); }
}
#close-wordpop:hover {
  background-color: rgba(255, 255, 255, 0.25);
  transform: translateY(-2px);
}
#leave-page:hover {
  background-color: rgba(236, 72, 153, 1);
  transform: translateY(-2px);
}
"#;

pub const OVERLAY_STYLE: &str = "position: fixed; top: 0; left: 0; width: 100%; height: 100%; \
    background-color: rgba(0, 0, 0, 0.95); z-index: 2147483647; display: flex; \
    flex-direction: column; justify-content: center; align-items: center; padding: 2rem; \
    box-sizing: border-box; animation: wordpopFadeIn 0.3s ease-out forwards;";

pub const PANEL_STYLE: &str = "max-width: 600px; text-align: center; color: white; \
    font-family: system-ui, sans-serif;";

pub const HEADER_STYLE: &str =
    "font-size: 28px; font-weight: 700; margin-bottom: 1.5rem; color: #f0f0f0;";

pub const ACCENT_STYLE: &str = "color: rgb(236, 72, 153);";

pub const MESSAGE_STYLE: &str = "font-size: 20px; margin: 1rem 0 2rem; line-height: 1.6;";

pub const KEYWORD_BOX_STYLE: &str = "padding: 1rem; background-color: rgba(236, 72, 153, 0.2); \
    border-radius: 8px; max-width: 300px; margin: 1rem auto;";

pub const KEYWORD_LABEL_STYLE: &str = "font-size: 14px; margin-bottom: 0.5rem; opacity: 0.8;";

pub const KEYWORD_LIST_STYLE: &str = "font-weight: 600; font-size: 16px;";

pub const NOTE_STYLE: &str = "font-size: 14px; margin-top: 0.5rem; font-style: italic;";

pub const ACTIONS_STYLE: &str = "display: flex; flex-direction: column; gap: 12px; width: 100%; \
    max-width: 300px; margin: 0 auto;";

pub const LEAVE_BUTTON_STYLE: &str = "background-color: rgba(236, 72, 153, 0.8); color: white; \
    border: none; padding: 0.75rem 1.5rem; border-radius: 8px; font-size: 16px; \
    font-weight: 500; cursor: pointer; transition: all 0.2s;";

pub const CONTINUE_BUTTON_STYLE: &str = "background-color: rgba(255, 255, 255, 0.15); \
    color: white; border: none; padding: 0.75rem 1.5rem; border-radius: 8px; font-size: 16px; \
    font-weight: 500; cursor: pointer; transition: all 0.2s;";

pub const EXIT_ANIMATION: &str = "wordpopFadeOut 0.3s ease-out forwards";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_summary_and_notes() {
        let view = OverlayView {
            overlay_id: "wordpop-overlay".to_string(),
            message: "Breathe.".to_string(),
            keywords: vec![
                KeywordLine::plain("alex"),
                KeywordLine {
                    keyword: "paris".to_string(),
                    message: Some("Not today.".to_string()),
                },
            ],
        };

        assert_eq!(view.keyword_summary(), "alex, paris");
        assert_eq!(view.notes().collect::<Vec<_>>(), vec![("paris", "Not today.")]);
    }

    #[test]
    fn test_overlay_style_uses_max_z_index() {
        assert!(OVERLAY_STYLE.contains(MAX_Z_INDEX));
        assert!(OVERLAY_STYLE.contains("position: fixed"));
    }
}
