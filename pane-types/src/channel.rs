//! Application messages exchanged over the negotiated data channel.
//!
//! Every frame is a JSON object whose `type` field names the command. Editor
//! indices travel as `number`; image and file payloads are base64 text.

use serde::{Deserialize, Serialize};

use crate::error::decode_tagged;
use crate::WireError;

/// Discriminator field for channel frames.
const KIND_FIELD: &str = "type";

/// All possible data-channel messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelMessage {
    /// Dispose and forget one editor.
    RemoveEditor {
        /// Editor index.
        number: u32,
    },
    /// Hide every editor.
    HideEditors,
    /// Show every editor.
    ShowEditors,
    /// Create or replace an image editor.
    AddEditor(EditorImage),
    /// Remote side selected an editor.
    SetSelectedEditor {
        /// Editor index.
        number: u32,
    },
    /// One chunk of a file transfer.
    File(FileChunk),
    /// Local side selected an editor (outbound only).
    SelectedEditor {
        /// Editor index.
        number: u32,
    },
}

impl ChannelMessage {
    /// Every `type` value this side understands.
    pub const KINDS: &'static [&'static str] = &[
        "remove_editor",
        "hide_editors",
        "show_editors",
        "add_editor",
        "set_selected_editor",
        "file",
        "selected_editor",
    ];

    /// The wire name of this message.
    pub fn kind(&self) -> &'static str {
        match self {
            ChannelMessage::RemoveEditor { .. } => "remove_editor",
            ChannelMessage::HideEditors => "hide_editors",
            ChannelMessage::ShowEditors => "show_editors",
            ChannelMessage::AddEditor(_) => "add_editor",
            ChannelMessage::SetSelectedEditor { .. } => "set_selected_editor",
            ChannelMessage::File(_) => "file",
            ChannelMessage::SelectedEditor { .. } => "selected_editor",
        }
    }

    /// Serialize to a JSON text frame.
    pub fn to_json(&self) -> Result<String, WireError> {
        serde_json::to_string(self).map_err(WireError::Encode)
    }

    /// Decode a JSON text frame.
    pub fn from_json(text: &str) -> Result<Self, WireError> {
        Self::from_value(&Self::parse_frame(text)?)
    }

    /// Parse a text frame into a raw JSON value without interpreting it.
    ///
    /// Used when the raw value must also be handed to the host application.
    pub fn parse_frame(text: &str) -> Result<serde_json::Value, WireError> {
        serde_json::from_str(text).map_err(WireError::Decode)
    }

    /// Interpret an already parsed frame.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, WireError> {
        decode_tagged(value, KIND_FIELD, Self::KINDS)
    }
}

/// Payload of `add_editor`: an editor index plus its base64 image.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorImage {
    /// Editor index.
    pub number: u32,
    /// Base64-encoded image bytes.
    pub chunk: String,
}

impl std::fmt::Debug for EditorImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorImage")
            .field("number", &self.number)
            .field("chunk", &format!("[{} bytes base64]", self.chunk.len()))
            .finish()
    }
}

/// Payload of `file`: one base64 fragment of a chunked transfer.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChunk {
    /// Transfer identifier shared by all chunks of one file.
    pub id: String,
    /// Zero-based chunk index.
    pub number: usize,
    /// Total number of chunks in the transfer.
    pub total: usize,
    /// Base64 text fragment.
    pub chunk: String,
}

impl std::fmt::Debug for FileChunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileChunk")
            .field("id", &self.id)
            .field("number", &self.number)
            .field("total", &self.total)
            .field("chunk", &format!("[{} bytes base64]", self.chunk.len()))
            .finish()
    }
}
