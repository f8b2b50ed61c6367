//! Error types for pane-client.
//!
//! Media failures never surface here: a session without audio keeps going.
//! Config loading reports [`ConfigError`](crate::config::ConfigError) on its own.

use pane_core::EditorError;
use pane_types::WireError;
use thiserror::Error;

use crate::transport::TransportError;

/// Session errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Wire encoding or decoding error.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// Editor error.
    #[error("editor error: {0}")]
    Editor(#[from] EditorError),

    /// The data channel is missing or not open.
    #[error("data channel not open")]
    ChannelNotOpen,

    /// The operation is not valid in the current signaling state.
    #[error("invalid state for this operation: {state}")]
    InvalidState {
        /// Name of the current state.
        state: &'static str,
    },

    /// The relay handshake could not be started.
    #[error("connect failed: {0}")]
    ConnectFailed(String),
}
