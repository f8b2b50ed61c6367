//! # pane-client
//!
//! Client library for Panelink remote editor sessions.
//!
//! This is the library applications use to reach a remote host through a
//! signaling relay, negotiate a peer connection and mirror the host's editors
//! over the resulting data channel.
//!
//! ## Features
//!
//! - **Relay Signaling**: connect/greeting handshake and offer/answer/ICE
//!   exchange over a WebSocket relay
//! - **Transport Abstraction**: pluggable relay and peer transports (WebSocket, mock)
//! - **Editor Sync**: editor images, visibility and selection mirrored from the host
//! - **File Transfer**: chunked, base64-encoded files reassembled into bytes
//! - **Pure State Machine**: uses pane-core for side-effect-free logic
//!
//! ## Example
//!
//! ```ignore
//! use panelink_client::{RemoteSession, SessionConfig, WsRelayTransport};
//!
//! let config = SessionConfig::new("wss://relay.example.com/signal");
//! let session = RemoteSession::new(config, WsRelayTransport::new(), peer);
//!
//! session.set_file_sink(|id, bytes| println!("{id}: {} bytes", bytes.len()));
//! session.connect("HOST-ID").await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod config;
pub mod error;
pub mod media;
pub mod session;
pub mod signaling;
pub mod transport;

pub use channel::{ChangeListener, FileSink, MessageCallback, PeerChannelProtocol};
pub use config::{ConfigError, SessionConfig};
pub use error::SessionError;
pub use media::{AudioSource, AudioStream, MediaError, MockAudioSource, RemoteTrack};
pub use session::RemoteSession;
pub use signaling::SignalingSession;
pub use transport::{
    AnswerOptions, ChannelState, DataChannel, MockDataChannel, MockPeerTransport,
    MockRelayTransport, PeerTransport, RelayTransport, TransportError, WsRelayTransport,
};

// Core types callers see through the session API
pub use pane_core::{
    ChangeKind, EditorChange, EditorContent, EditorSnapshot, SessionEvent, SignalingState,
};
pub use pane_types::{ChannelMessage, SessionId};
