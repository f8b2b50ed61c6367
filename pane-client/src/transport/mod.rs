//! Transport abstraction for Panelink.
//!
//! A session talks over two pipes:
//! - a [`RelayTransport`], an ordered text pipe to the signaling relay
//! - a [`PeerTransport`], the negotiated direct connection, which carries one
//!   [`DataChannel`] for application messages plus optional media
//!
//! # Design
//!
//! The traits are async and connection-oriented. Peer-side notifications
//! (ICE candidates, remote tracks, channel open, channel messages) are
//! delivered through registered handlers; the session forwards them into its
//! driver task so they are handled one at a time.
//!
//! # Example
//!
//! ```ignore
//! let relay = MockRelayTransport::new();
//! relay.connect("ws://relay/signal").await?;
//! relay.send(r#"{"message":"connect","sessionid":"HOST"}"#).await?;
//! let frame = relay.recv().await?;
//! ```

mod mock;
mod ws;

pub use mock::{MockDataChannel, MockPeerTransport, MockRelayTransport};
pub use ws::WsRelayTransport;

use async_trait::async_trait;
use pane_types::{IceCandidate, SessionDescription};
use std::sync::Arc;
use thiserror::Error;

use crate::media::{AudioStream, RemoteTrack};

/// Transport errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Not connected.
    #[error("not connected")]
    NotConnected,

    /// Connection closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// A negotiation primitive failed.
    #[error("negotiation failed: {0}")]
    Negotiation(String),
}

/// Ready state of a data channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Created, not yet open.
    Connecting,
    /// Open for sending.
    Open,
    /// Shutting down.
    Closing,
    /// Closed.
    Closed,
}

/// Media the answering side asks to receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerOptions {
    /// Receive remote audio.
    pub receive_audio: bool,
    /// Receive remote video.
    pub receive_video: bool,
}

impl Default for AnswerOptions {
    fn default() -> Self {
        Self {
            receive_audio: true,
            receive_video: true,
        }
    }
}

/// Handler for locally gathered ICE candidates.
pub type CandidateHandler = Box<dyn Fn(IceCandidate) + Send + Sync>;

/// Handler for tracks added by the remote side.
pub type TrackHandler = Box<dyn Fn(RemoteTrack) + Send + Sync>;

/// Handler for a data channel becoming open.
pub type OpenHandler = Box<dyn Fn() + Send + Sync>;

/// Handler for inbound data channel text frames.
pub type MessageHandler = Box<dyn Fn(String) + Send + Sync>;

/// Ordered, reliable text pipe to the signaling relay.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// Open the connection to `url`.
    async fn connect(&self, url: &str) -> Result<(), TransportError>;

    /// Send one text frame.
    async fn send(&self, text: &str) -> Result<(), TransportError>;

    /// Receive the next text frame.
    ///
    /// Waits until a frame arrives or the connection ends. Must be cancel
    /// safe: dropping the future loses no frame.
    async fn recv(&self) -> Result<String, TransportError>;

    /// Check if the connection is open.
    fn is_open(&self) -> bool;

    /// Close the connection gracefully.
    async fn close(&self) -> Result<(), TransportError>;
}

/// The negotiated peer connection.
///
/// Implementations wrap the host's peer connection object. Only the
/// primitives the session needs are exposed.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Produce a fresh local offer.
    async fn create_offer(&self) -> Result<SessionDescription, TransportError>;

    /// Produce an answer to the applied remote offer.
    async fn create_answer(
        &self,
        options: AnswerOptions,
    ) -> Result<SessionDescription, TransportError>;

    /// Apply a local description.
    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), TransportError>;

    /// Apply a remote description.
    async fn set_remote_description(&self, desc: SessionDescription)
        -> Result<(), TransportError>;

    /// Add a remote ICE candidate.
    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), TransportError>;

    /// Attach the local audio stream.
    async fn add_audio_track(&self, stream: AudioStream) -> Result<(), TransportError>;

    /// Create the application data channel.
    async fn create_data_channel(&self, label: &str)
        -> Result<Arc<dyn DataChannel>, TransportError>;

    /// Register the local ICE candidate handler, replacing any previous one.
    fn on_ice_candidate(&self, handler: CandidateHandler);

    /// Register the remote track handler, replacing any previous one.
    fn on_remote_track(&self, handler: TrackHandler);

    /// Close the peer connection.
    async fn close(&self) -> Result<(), TransportError>;
}

/// A text data channel on the peer connection.
#[async_trait]
pub trait DataChannel: Send + Sync {
    /// Channel label.
    fn label(&self) -> String;

    /// Current ready state.
    fn ready_state(&self) -> ChannelState;

    /// Send one text frame.
    async fn send(&self, text: &str) -> Result<(), TransportError>;

    /// Register the open handler, replacing any previous one.
    fn on_open(&self, handler: OpenHandler);

    /// Register the message handler, replacing any previous one.
    fn on_message(&self, handler: MessageHandler);

    /// Close the channel.
    async fn close(&self) -> Result<(), TransportError>;
}
