//! RemoteSession - the main interface for Panelink.
//!
//! This module provides [`RemoteSession`], the API applications use to reach
//! a remote host, mirror its editors and exchange files.
//!
//! # Architecture
//!
//! RemoteSession uses a pure state machine (from pane-core) for the
//! signaling lifecycle and interprets its actions to perform I/O via the
//! transport traits. One driver task per session handles relay frames and
//! peer notifications one at a time.
//!
//! ```text
//! Application → RemoteSession → SignalingSession → RelayTransport
//!                    │                 │
//!                    │                 └──────────► PeerTransport
//!                    └──► PeerChannelProtocol ────► DataChannel
//! ```
//!
//! # Example
//!
//! ```ignore
//! use panelink_client::{RemoteSession, SessionConfig, WsRelayTransport};
//!
//! let session = RemoteSession::new(SessionConfig::default(), WsRelayTransport::new(), peer);
//! session.add_editor_change_listener(|change| println!("{:?}", change.kind));
//! session.connect("HOST").await?;
//! session.select_editor(2).await?;
//! session.close().await;
//! ```

use pane_core::{EditorChange, EditorSnapshot, SessionEvent, SignalingEvent, SignalingState};
use pane_types::{ChannelMessage, SessionId};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use crate::channel::PeerChannelProtocol;
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::media::{AudioSource, RemoteTrack, TrackCallback};
use crate::signaling::{PeerEvent, SignalingSession};
use crate::transport::{PeerTransport, RelayTransport};

/// A session with one remote host.
pub struct RemoteSession<R: RelayTransport + 'static, P: PeerTransport + 'static> {
    signaling: Arc<SignalingSession<R, P>>,
    channel: Arc<PeerChannelProtocol>,
    events: broadcast::Sender<SessionEvent>,
    track_callback: Arc<Mutex<Option<TrackCallback>>>,
    peer_rx: Mutex<Option<mpsc::UnboundedReceiver<PeerEvent>>>,
    shutdown: watch::Sender<bool>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl<R: RelayTransport + 'static, P: PeerTransport + 'static> RemoteSession<R, P> {
    /// Create a session. Nothing is sent until [`connect`](Self::connect).
    pub fn new(config: SessionConfig, relay: R, peer: P) -> Self {
        let (events, _) = broadcast::channel(config.event_buffer.max(1));
        let (peer_tx, peer_rx) = mpsc::unbounded_channel();
        let (shutdown, _) = watch::channel(false);
        let channel = Arc::new(PeerChannelProtocol::new(config.max_pending_transfers));

        let signaling = Arc::new(SignalingSession::new(
            config,
            Arc::new(relay),
            Arc::new(peer),
            Arc::clone(&channel),
            events.clone(),
            peer_tx,
        ));

        Self {
            signaling,
            channel,
            events,
            track_callback: Arc::new(Mutex::new(None)),
            peer_rx: Mutex::new(Some(peer_rx)),
            shutdown,
            driver: Mutex::new(None),
        }
    }

    /// Connect to the relay and ask it to reach `target`.
    ///
    /// Returns once the connect request is sent; the greeting and
    /// negotiation continue on the driver task. Watch
    /// [`subscribe_events`](Self::subscribe_events) for progress.
    pub async fn connect(&self, target: impl Into<SessionId>) -> Result<(), SessionError> {
        let state = self.signaling.state().await;
        if !matches!(state, SignalingState::Disconnected) {
            return Err(SessionError::InvalidState { state: state.name() });
        }

        self.signaling
            .dispatch(SignalingEvent::ConnectRequested {
                target: target.into(),
            })
            .await;

        if let SignalingState::Failed { reason } = self.signaling.state().await {
            return Err(SessionError::ConnectFailed(reason));
        }

        self.spawn_driver();
        Ok(())
    }

    fn spawn_driver(&self) {
        let Some(peer_rx) = lock(&self.peer_rx).take() else {
            return;
        };
        let handle = tokio::spawn(drive(
            Arc::clone(&self.signaling),
            Arc::clone(&self.channel),
            Arc::clone(&self.track_callback),
            peer_rx,
            self.shutdown.subscribe(),
        ));
        *lock(&self.driver) = Some(handle);
    }

    /// Select an editor locally and tell the remote host.
    pub async fn select_editor(&self, index: u32) -> Result<(), SessionError> {
        self.channel.select_editor(index).await
    }

    /// Send an application message over the data channel.
    ///
    /// Fails with [`SessionError::ChannelNotOpen`] unless the channel is open.
    pub async fn send(&self, message: &ChannelMessage) -> Result<(), SessionError> {
        self.channel.send(message).await
    }

    /// Close the relay and peer transports and stop the driver.
    ///
    /// Repeated calls do nothing.
    pub async fn close(&self) {
        self.signaling.close().await;
        self.shutdown.send_replace(true);
    }

    /// The relay-assigned session id, once greeted.
    pub async fn session_id(&self) -> Option<SessionId> {
        self.signaling.session_id().await
    }

    /// Current signaling state.
    pub async fn state(&self) -> SignalingState {
        self.signaling.state().await
    }

    /// Whether the data channel is open.
    pub async fn is_open(&self) -> bool {
        self.channel.is_open().await
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Snapshot of one editor.
    pub async fn editor(&self, index: u32) -> Option<EditorSnapshot> {
        self.channel.editor(index).await
    }

    /// Snapshots of all editors, ordered by index.
    pub async fn editors(&self) -> Vec<(u32, EditorSnapshot)> {
        self.channel.editors().await
    }

    /// Listen for structural editor changes.
    ///
    /// Listeners run on the driver task with no session lock held.
    pub fn add_editor_change_listener<F>(&self, listener: F)
    where
        F: Fn(&EditorChange) + Send + Sync + 'static,
    {
        self.channel.add_change_listener(Arc::new(listener));
    }

    /// Receive every parsed inbound channel frame.
    pub fn on_channel_message<F>(&self, callback: F)
    where
        F: Fn(&serde_json::Value) + Send + Sync + 'static,
    {
        self.channel.set_message_callback(Arc::new(callback));
    }

    /// Receive completed file transfers as `(id, bytes)`.
    pub fn set_file_sink<F>(&self, sink: F)
    where
        F: Fn(&str, Vec<u8>) + Send + Sync + 'static,
    {
        self.channel.set_file_sink(Arc::new(sink));
    }

    /// Receive remote media tracks.
    pub fn on_remote_track<F>(&self, callback: F)
    where
        F: Fn(&RemoteTrack) + Send + Sync + 'static,
    {
        *lock(&self.track_callback) = Some(Arc::new(callback));
    }

    /// Provide local audio for sessions configured with `transmit_audio`.
    pub fn set_audio_source<A>(&self, source: A)
    where
        A: AudioSource + 'static,
    {
        self.signaling.set_audio_source(Arc::new(source));
    }
}

impl<R: RelayTransport + 'static, P: PeerTransport + 'static> Drop for RemoteSession<R, P> {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
        if let Some(handle) = lock(&self.driver).take() {
            handle.abort();
        }
    }
}

impl<R: RelayTransport + 'static, P: PeerTransport + 'static> std::fmt::Debug
    for RemoteSession<R, P>
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSession")
            .field("signaling", &self.signaling)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Session driver: one event at a time until shutdown, close or failure.
async fn drive<R: RelayTransport, P: PeerTransport>(
    signaling: Arc<SignalingSession<R, P>>,
    channel: Arc<PeerChannelProtocol>,
    track_callback: Arc<Mutex<Option<TrackCallback>>>,
    mut peer_rx: mpsc::UnboundedReceiver<PeerEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let relay = Arc::clone(signaling.relay());
    let mut relay_open = true;
    tracing::debug!("Session driver started");

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            frame = relay.recv(), if relay_open => match frame {
                Ok(text) => signaling.handle_relay_frame(&text).await,
                Err(e) => {
                    relay_open = false;
                    signaling.relay_closed(e.to_string()).await;
                }
            },
            event = peer_rx.recv() => match event {
                Some(PeerEvent::LocalCandidate(candidate)) => {
                    signaling.send_local_candidate(candidate).await
                }
                Some(PeerEvent::RemoteTrack(track)) => {
                    signaling.remote_track(&track);
                    let callback = lock(&track_callback).clone();
                    if let Some(callback) = callback {
                        callback(&track);
                    }
                }
                Some(PeerEvent::ChannelOpened) => {
                    signaling.dispatch(SignalingEvent::ChannelOpened).await
                }
                Some(PeerEvent::ChannelFrame(text)) => channel.handle_frame(&text).await,
                None => break,
            },
        }

        if !signaling.is_active().await {
            break;
        }
    }

    tracing::debug!("Session driver stopped");
}
