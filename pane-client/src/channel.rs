//! Application protocol over the negotiated data channel.
//!
//! [`PeerChannelProtocol`] owns the data channel, the editor registry and the
//! file reassembler. Inbound frames are decoded and dispatched by `type`:
//!
//! | type | effect |
//! |---|---|
//! | `remove_editor` | dispose and forget the editor |
//! | `hide_editors` / `show_editors` | batch visibility |
//! | `add_editor` | create or replace a hidden image editor |
//! | `set_selected_editor` | select locally, nothing is sent back |
//! | `file` | feed the reassembler, hand finished files to the host |
//! | `selected_editor` | recognized, no built-in handler |
//!
//! Every frame that parses as JSON is then handed to the host message
//! callback, whether or not a handler matched.

use base64::{engine::general_purpose::STANDARD, Engine};
use pane_core::{EditorChange, EditorRegistry, EditorSnapshot, FileChunkReassembler};
use pane_types::{ChannelMessage, FileChunk};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

use crate::error::SessionError;
use crate::transport::{ChannelState, DataChannel};

/// Host callback receiving every parsed inbound frame.
pub type MessageCallback = Arc<dyn Fn(&serde_json::Value) + Send + Sync>;

/// Host callback receiving completed file transfers as `(id, bytes)`.
pub type FileSink = Arc<dyn Fn(&str, Vec<u8>) + Send + Sync>;

/// Listener for structural editor changes.
pub type ChangeListener = Arc<dyn Fn(&EditorChange) + Send + Sync>;

#[derive(Default)]
struct Callbacks {
    on_message: Option<MessageCallback>,
    file_sink: Option<FileSink>,
    change_listeners: Vec<ChangeListener>,
}

/// Editor sync and file transfer over one data channel.
pub struct PeerChannelProtocol {
    channel: Mutex<Option<Arc<dyn DataChannel>>>,
    registry: Mutex<EditorRegistry>,
    reassembler: Mutex<FileChunkReassembler>,
    callbacks: RwLock<Callbacks>,
}

impl PeerChannelProtocol {
    /// Create a protocol handler with no channel attached yet.
    pub fn new(max_pending_transfers: usize) -> Self {
        Self {
            channel: Mutex::new(None),
            registry: Mutex::new(EditorRegistry::new()),
            reassembler: Mutex::new(FileChunkReassembler::new(max_pending_transfers)),
            callbacks: RwLock::new(Callbacks::default()),
        }
    }

    /// Take ownership of the session's data channel.
    pub async fn attach(&self, channel: Arc<dyn DataChannel>) {
        tracing::debug!("Data channel attached: {}", channel.label());
        *self.channel.lock().await = Some(channel);
    }

    /// Whether a channel is attached and open.
    pub async fn is_open(&self) -> bool {
        self.channel
            .lock()
            .await
            .as_ref()
            .map(|c| c.ready_state() == ChannelState::Open)
            .unwrap_or(false)
    }

    /// Send one message. Fails fast unless the channel is open.
    pub async fn send(&self, message: &ChannelMessage) -> Result<(), SessionError> {
        let channel = self
            .channel
            .lock()
            .await
            .clone()
            .filter(|c| c.ready_state() == ChannelState::Open)
            .ok_or(SessionError::ChannelNotOpen)?;

        let text = message.to_json()?;
        channel.send(&text).await?;
        tracing::debug!("Channel <- {}", message.kind());
        Ok(())
    }

    /// Select an editor locally and tell the peer.
    ///
    /// Selecting the already-selected editor does nothing. An unknown index
    /// is logged and nothing is sent. The local selection stands even if the
    /// channel turns out to be closed.
    pub async fn select_editor(&self, index: u32) -> Result<(), SessionError> {
        let changes = {
            let mut registry = self.registry.lock().await;
            if registry.is_selected(index) {
                return Ok(());
            }
            registry.select_only(index)?
        };
        if changes.is_empty() {
            return Ok(());
        }

        self.broadcast(&changes);
        self.send(&ChannelMessage::SelectedEditor { number: index })
            .await
    }

    /// Decode and dispatch one inbound text frame.
    pub async fn handle_frame(&self, text: &str) {
        let value = match ChannelMessage::parse_frame(text) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Dropping malformed channel frame ({} bytes): {}", text.len(), e);
                return;
            }
        };

        match ChannelMessage::from_value(&value) {
            Ok(message) => self.dispatch(message).await,
            Err(e) if e.is_unknown_kind() => tracing::warn!("Ignoring channel message: {}", e),
            Err(e) => tracing::warn!("Dropping channel frame: {}", e),
        }

        let on_message = self.read_callbacks().on_message.clone();
        if let Some(callback) = on_message {
            callback(&value);
        }
    }

    async fn dispatch(&self, message: ChannelMessage) {
        tracing::debug!("Channel -> {}", message.kind());

        let message = match message {
            ChannelMessage::File(chunk) => return self.receive_file(chunk).await,
            ChannelMessage::SelectedEditor { number } => {
                tracing::debug!("Peer reported selection of editor {}", number);
                return;
            }
            other => other,
        };

        let result = {
            let mut registry = self.registry.lock().await;
            match message {
                ChannelMessage::RemoveEditor { number } => registry.remove(number),
                ChannelMessage::HideEditors => registry.set_all_visible(false),
                ChannelMessage::ShowEditors => registry.set_all_visible(true),
                ChannelMessage::AddEditor(image) => {
                    registry.upsert_image_editor(image.number, image.chunk, false)
                }
                ChannelMessage::SetSelectedEditor { number } => registry.select_only(number),
                ChannelMessage::File(_) | ChannelMessage::SelectedEditor { .. } => Ok(Vec::new()),
            }
        };

        match result {
            Ok(changes) => self.broadcast(&changes),
            Err(e) => tracing::warn!("Editor command failed: {}", e),
        }
    }

    async fn receive_file(&self, file: FileChunk) {
        let FileChunk {
            id,
            number,
            total,
            chunk,
        } = file;

        let result = self
            .reassembler
            .lock()
            .await
            .receive(&id, number, chunk, total);

        let payload = match result {
            Ok(Some(payload)) => payload,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!("Dropping file chunk: {}", e);
                return;
            }
        };

        let bytes = match STANDARD.decode(payload.as_bytes()) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Transfer {} is not valid base64: {}", id, e);
                return;
            }
        };

        let sink = self.read_callbacks().file_sink.clone();
        match sink {
            Some(sink) => sink(&id, bytes),
            None => tracing::debug!("No file sink registered; dropping transfer {}", id),
        }
    }

    /// Register the host message callback, replacing any previous one.
    pub fn set_message_callback(&self, callback: MessageCallback) {
        self.write_callbacks().on_message = Some(callback);
    }

    /// Register the host file sink, replacing any previous one.
    pub fn set_file_sink(&self, sink: FileSink) {
        self.write_callbacks().file_sink = Some(sink);
    }

    /// Add a listener for editor changes.
    pub fn add_change_listener(&self, listener: ChangeListener) {
        self.write_callbacks().change_listeners.push(listener);
    }

    /// Snapshot of one editor.
    pub async fn editor(&self, index: u32) -> Option<EditorSnapshot> {
        self.registry.lock().await.get(index).map(|e| e.snapshot())
    }

    /// Snapshots of all editors, ordered by index.
    pub async fn editors(&self) -> Vec<(u32, EditorSnapshot)> {
        self.registry.lock().await.snapshots()
    }

    /// Number of file transfers in progress.
    pub async fn pending_transfers(&self) -> usize {
        self.reassembler.lock().await.pending_count()
    }

    /// Close the data channel and drop partial transfers.
    pub async fn close(&self) {
        self.reassembler.lock().await.clear();
        let channel = self.channel.lock().await.take();
        if let Some(channel) = channel {
            if let Err(e) = channel.close().await {
                tracing::debug!("Data channel close: {}", e);
            }
        }
    }

    // Listeners run with no lock held so they may call back into the session.
    fn broadcast(&self, changes: &[EditorChange]) {
        if changes.is_empty() {
            return;
        }
        let listeners = self.read_callbacks().change_listeners.clone();
        for change in changes {
            for listener in &listeners {
                listener(change);
            }
        }
    }

    fn read_callbacks(&self) -> std::sync::RwLockReadGuard<'_, Callbacks> {
        self.callbacks.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_callbacks(&self) -> std::sync::RwLockWriteGuard<'_, Callbacks> {
        self.callbacks.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for PeerChannelProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerChannelProtocol").finish_non_exhaustive()
    }
}
