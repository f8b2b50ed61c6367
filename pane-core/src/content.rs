//! Editor content payloads.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

/// What an editor displays.
///
/// Content is immutable; editors replace it wholesale.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum EditorContent {
    /// Styled text, one run per styling change.
    Text(Vec<TextRun>),
    /// A base64-encoded image.
    Image(String),
}

impl EditorContent {
    /// Image content from base64 text.
    pub fn image(base64: impl Into<String>) -> Self {
        Self::Image(base64.into())
    }

    /// Text content from runs.
    pub fn text(runs: Vec<TextRun>) -> Self {
        Self::Text(runs)
    }

    /// True for image content.
    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image(_))
    }

    /// Decode image content into raw bytes.
    ///
    /// Returns `None` for text content.
    pub fn decode_image(&self) -> Option<Result<Vec<u8>, base64::DecodeError>> {
        match self {
            Self::Image(data) => Some(STANDARD.decode(data)),
            Self::Text(_) => None,
        }
    }

    /// Concatenated plain text of all runs, or `None` for images.
    pub fn plain_text(&self) -> Option<String> {
        match self {
            Self::Text(runs) => Some(runs.iter().map(|r| r.content.as_str()).collect()),
            Self::Image(_) => None,
        }
    }
}

impl std::fmt::Debug for EditorContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(runs) => f.debug_tuple("Text").field(runs).finish(),
            Self::Image(data) => write!(f, "Image([{} bytes base64])", data.len()),
        }
    }
}

/// A run of text sharing one style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    /// Font size in points.
    #[serde(rename = "fontSize")]
    pub font_size: f32,
    /// The text itself.
    pub content: String,
    /// CSS-style color string.
    #[serde(rename = "fontColor")]
    pub font_color: String,
}

impl TextRun {
    /// Create a text run.
    pub fn new(font_size: f32, content: impl Into<String>, font_color: impl Into<String>) -> Self {
        Self {
            font_size,
            content: content.into(),
            font_color: font_color.into(),
        }
    }
}
