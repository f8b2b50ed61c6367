//! Mock transports for testing.
//!
//! Allow queueing inbound frames, capturing outbound frames, firing peer
//! callbacks on demand, and forcing the next operation to fail. Clones share
//! state, so a test keeps one handle while the session owns another.

use super::{
    AnswerOptions, CandidateHandler, ChannelState, DataChannel, MessageHandler, OpenHandler,
    PeerTransport, RelayTransport, TrackHandler, TransportError,
};
use crate::media::{AudioStream, RemoteTrack};
use async_trait::async_trait;
use pane_types::{ChannelMessage, IceCandidate, RelayMessage, SessionDescription};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

// ===========================================
// Relay
// ===========================================

/// Mock relay transport.
///
/// `recv()` waits until a frame is pushed, the relay hangs up, or the
/// transport is closed.
#[derive(Debug, Default, Clone)]
pub struct MockRelayTransport {
    inner: Arc<Mutex<MockRelayInner>>,
    arrived: Arc<Notify>,
}

#[derive(Debug, Default)]
struct MockRelayInner {
    open: bool,
    connected_url: Option<String>,
    sent_frames: Vec<String>,
    inbound: VecDeque<String>,
    hung_up: bool,
    fail_next_connect: Option<String>,
    fail_next_send: Option<String>,
    fail_next_recv: Option<String>,
}

impl MockRelayTransport {
    /// Create a new mock relay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw text frame for `recv()`.
    pub fn push_frame(&self, frame: impl Into<String>) {
        lock(&self.inner).inbound.push_back(frame.into());
        self.arrived.notify_one();
    }

    /// Queue a relay message for `recv()`.
    pub fn push_message(&self, message: &RelayMessage) {
        if let Ok(frame) = message.to_json() {
            self.push_frame(frame);
        }
    }

    /// End the inbound stream once queued frames are drained.
    pub fn hang_up(&self) {
        lock(&self.inner).hung_up = true;
        self.arrived.notify_one();
    }

    /// All frames sent so far.
    pub fn sent_frames(&self) -> Vec<String> {
        lock(&self.inner).sent_frames.clone()
    }

    /// Sent frames that decode as relay messages.
    pub fn sent_messages(&self) -> Vec<RelayMessage> {
        self.sent_frames()
            .iter()
            .filter_map(|f| RelayMessage::from_json(f).ok())
            .collect()
    }

    /// URL passed to `connect()`.
    pub fn connected_url(&self) -> Option<String> {
        lock(&self.inner).connected_url.clone()
    }

    /// Cause the next connect() to fail with the given error.
    pub fn fail_next_connect(&self, error: &str) {
        lock(&self.inner).fail_next_connect = Some(error.to_string());
    }

    /// Cause the next send() to fail with the given error.
    pub fn fail_next_send(&self, error: &str) {
        lock(&self.inner).fail_next_send = Some(error.to_string());
    }

    /// Cause the next recv() to fail with the given error.
    pub fn fail_next_recv(&self, error: &str) {
        lock(&self.inner).fail_next_recv = Some(error.to_string());
        self.arrived.notify_one();
    }
}

#[async_trait]
impl RelayTransport for MockRelayTransport {
    async fn connect(&self, url: &str) -> Result<(), TransportError> {
        let mut inner = lock(&self.inner);

        // Check for forced failure
        if let Some(error) = inner.fail_next_connect.take() {
            return Err(TransportError::ConnectionFailed(error));
        }

        inner.open = true;
        inner.connected_url = Some(url.to_string());
        Ok(())
    }

    async fn send(&self, text: &str) -> Result<(), TransportError> {
        let mut inner = lock(&self.inner);

        if !inner.open {
            return Err(TransportError::NotConnected);
        }

        // Check for forced failure
        if let Some(error) = inner.fail_next_send.take() {
            return Err(TransportError::SendFailed(error));
        }

        inner.sent_frames.push(text.to_string());
        Ok(())
    }

    async fn recv(&self) -> Result<String, TransportError> {
        loop {
            {
                let mut inner = lock(&self.inner);

                if !inner.open {
                    return Err(TransportError::NotConnected);
                }
                if let Some(error) = inner.fail_next_recv.take() {
                    return Err(TransportError::ReceiveFailed(error));
                }
                if let Some(frame) = inner.inbound.pop_front() {
                    return Ok(frame);
                }
                if inner.hung_up {
                    inner.open = false;
                    return Err(TransportError::ConnectionClosed);
                }
            }
            self.arrived.notified().await;
        }
    }

    fn is_open(&self) -> bool {
        lock(&self.inner).open
    }

    async fn close(&self) -> Result<(), TransportError> {
        lock(&self.inner).open = false;
        self.arrived.notify_one();
        Ok(())
    }
}

// ===========================================
// Data channel
// ===========================================

/// Mock data channel.
#[derive(Clone)]
pub struct MockDataChannel {
    label: String,
    inner: Arc<Mutex<MockChannelInner>>,
}

struct MockChannelInner {
    state: ChannelState,
    sent_frames: Vec<String>,
    open_handler: Option<Arc<dyn Fn() + Send + Sync>>,
    message_handler: Option<Arc<dyn Fn(String) + Send + Sync>>,
    fail_next_send: Option<String>,
}

impl MockDataChannel {
    /// Create a channel in the `Connecting` state.
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            inner: Arc::new(Mutex::new(MockChannelInner {
                state: ChannelState::Connecting,
                sent_frames: Vec::new(),
                open_handler: None,
                message_handler: None,
                fail_next_send: None,
            })),
        }
    }

    /// Mark the channel open and fire the open handler.
    pub fn open(&self) {
        let handler = {
            let mut inner = lock(&self.inner);
            inner.state = ChannelState::Open;
            inner.open_handler.clone()
        };
        if let Some(handler) = handler {
            handler();
        }
    }

    /// Force the ready state without firing handlers.
    pub fn set_state(&self, state: ChannelState) {
        lock(&self.inner).state = state;
    }

    /// Deliver an inbound text frame to the message handler.
    pub fn deliver(&self, frame: impl Into<String>) {
        let handler = lock(&self.inner).message_handler.clone();
        if let Some(handler) = handler {
            handler(frame.into());
        }
    }

    /// Deliver an inbound channel message.
    pub fn deliver_message(&self, message: &ChannelMessage) {
        if let Ok(frame) = message.to_json() {
            self.deliver(frame);
        }
    }

    /// All frames sent so far.
    pub fn sent_frames(&self) -> Vec<String> {
        lock(&self.inner).sent_frames.clone()
    }

    /// Sent frames that decode as channel messages.
    pub fn sent_messages(&self) -> Vec<ChannelMessage> {
        self.sent_frames()
            .iter()
            .filter_map(|f| ChannelMessage::from_json(f).ok())
            .collect()
    }

    /// Cause the next send() to fail with the given error.
    pub fn fail_next_send(&self, error: &str) {
        lock(&self.inner).fail_next_send = Some(error.to_string());
    }
}

impl std::fmt::Debug for MockDataChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("MockDataChannel")
            .field("label", &self.label)
            .field("state", &inner.state)
            .field("sent_frames", &inner.sent_frames.len())
            .finish()
    }
}

#[async_trait]
impl DataChannel for MockDataChannel {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn ready_state(&self) -> ChannelState {
        lock(&self.inner).state
    }

    async fn send(&self, text: &str) -> Result<(), TransportError> {
        let mut inner = lock(&self.inner);

        if inner.state != ChannelState::Open {
            return Err(TransportError::NotConnected);
        }
        if let Some(error) = inner.fail_next_send.take() {
            return Err(TransportError::SendFailed(error));
        }

        inner.sent_frames.push(text.to_string());
        Ok(())
    }

    fn on_open(&self, handler: OpenHandler) {
        lock(&self.inner).open_handler = Some(Arc::from(handler));
    }

    fn on_message(&self, handler: MessageHandler) {
        lock(&self.inner).message_handler = Some(Arc::from(handler));
    }

    async fn close(&self) -> Result<(), TransportError> {
        lock(&self.inner).state = ChannelState::Closed;
        Ok(())
    }
}

// ===========================================
// Peer
// ===========================================

/// Mock peer transport.
///
/// Generates a fresh SDP body for every offer and answer, records everything
/// applied to it, and fires its handlers on demand.
#[derive(Clone, Default)]
pub struct MockPeerTransport {
    inner: Arc<Mutex<MockPeerInner>>,
}

#[derive(Default)]
struct MockPeerInner {
    offers_created: usize,
    answer_options: Vec<AnswerOptions>,
    local_descriptions: Vec<SessionDescription>,
    remote_descriptions: Vec<SessionDescription>,
    remote_candidates: Vec<IceCandidate>,
    audio_tracks: Vec<AudioStream>,
    channels: Vec<MockDataChannel>,
    closed: bool,
    offer_delay: Option<Duration>,
    channel_delay: Option<Duration>,
    candidate_handler: Option<Arc<dyn Fn(IceCandidate) + Send + Sync>>,
    track_handler: Option<Arc<dyn Fn(RemoteTrack) + Send + Sync>>,
    fail_next_offer: Option<String>,
    fail_next_answer: Option<String>,
    fail_next_remote_description: Option<String>,
    fail_next_channel: Option<String>,
}

fn fresh_sdp() -> String {
    format!(
        "v=0\r\no=- {} 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n",
        uuid::Uuid::new_v4().simple()
    )
}

impl MockPeerTransport {
    /// Create a new mock peer transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of offers created.
    pub fn offers_created(&self) -> usize {
        lock(&self.inner).offers_created
    }

    /// Options passed to every `create_answer()` call.
    pub fn answer_options(&self) -> Vec<AnswerOptions> {
        lock(&self.inner).answer_options.clone()
    }

    /// Local descriptions applied so far.
    pub fn local_descriptions(&self) -> Vec<SessionDescription> {
        lock(&self.inner).local_descriptions.clone()
    }

    /// Remote descriptions applied so far.
    pub fn remote_descriptions(&self) -> Vec<SessionDescription> {
        lock(&self.inner).remote_descriptions.clone()
    }

    /// Remote candidates added so far.
    pub fn remote_candidates(&self) -> Vec<IceCandidate> {
        lock(&self.inner).remote_candidates.clone()
    }

    /// Audio streams attached so far.
    pub fn audio_tracks(&self) -> Vec<AudioStream> {
        lock(&self.inner).audio_tracks.clone()
    }

    /// The most recently created data channel.
    pub fn data_channel(&self) -> Option<MockDataChannel> {
        lock(&self.inner).channels.last().cloned()
    }

    /// Number of data channels created.
    pub fn channels_created(&self) -> usize {
        lock(&self.inner).channels.len()
    }

    /// Whether `close()` was called.
    pub fn is_closed(&self) -> bool {
        lock(&self.inner).closed
    }

    /// Make `create_offer()` wait before resolving.
    pub fn delay_offers(&self, delay: Duration) {
        lock(&self.inner).offer_delay = Some(delay);
    }

    /// Make `create_data_channel()` wait before resolving.
    pub fn delay_channels(&self, delay: Duration) {
        lock(&self.inner).channel_delay = Some(delay);
    }

    /// Fire the local ICE candidate handler.
    pub fn emit_ice_candidate(&self, candidate: IceCandidate) {
        let handler = lock(&self.inner).candidate_handler.clone();
        if let Some(handler) = handler {
            handler(candidate);
        }
    }

    /// Fire the remote track handler.
    pub fn emit_remote_track(&self, track: RemoteTrack) {
        let handler = lock(&self.inner).track_handler.clone();
        if let Some(handler) = handler {
            handler(track);
        }
    }

    /// Cause the next create_offer() to fail with the given error.
    pub fn fail_next_offer(&self, error: &str) {
        lock(&self.inner).fail_next_offer = Some(error.to_string());
    }

    /// Cause the next create_answer() to fail with the given error.
    pub fn fail_next_answer(&self, error: &str) {
        lock(&self.inner).fail_next_answer = Some(error.to_string());
    }

    /// Cause the next set_remote_description() to fail with the given error.
    pub fn fail_next_remote_description(&self, error: &str) {
        lock(&self.inner).fail_next_remote_description = Some(error.to_string());
    }

    /// Cause the next create_data_channel() to fail with the given error.
    pub fn fail_next_channel(&self, error: &str) {
        lock(&self.inner).fail_next_channel = Some(error.to_string());
    }
}

impl std::fmt::Debug for MockPeerTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("MockPeerTransport")
            .field("offers_created", &inner.offers_created)
            .field("channels", &inner.channels.len())
            .field("closed", &inner.closed)
            .finish()
    }
}

#[async_trait]
impl PeerTransport for MockPeerTransport {
    async fn create_offer(&self) -> Result<SessionDescription, TransportError> {
        let delay = {
            let mut inner = lock(&self.inner);
            if let Some(error) = inner.fail_next_offer.take() {
                return Err(TransportError::Negotiation(error));
            }
            inner.offers_created += 1;
            inner.offer_delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(SessionDescription::offer(fresh_sdp()))
    }

    async fn create_answer(
        &self,
        options: AnswerOptions,
    ) -> Result<SessionDescription, TransportError> {
        let mut inner = lock(&self.inner);
        if let Some(error) = inner.fail_next_answer.take() {
            return Err(TransportError::Negotiation(error));
        }
        inner.answer_options.push(options);
        Ok(SessionDescription::answer(fresh_sdp()))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), TransportError> {
        lock(&self.inner).local_descriptions.push(desc);
        Ok(())
    }

    async fn set_remote_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), TransportError> {
        let mut inner = lock(&self.inner);
        if let Some(error) = inner.fail_next_remote_description.take() {
            return Err(TransportError::Negotiation(error));
        }
        inner.remote_descriptions.push(desc);
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), TransportError> {
        lock(&self.inner).remote_candidates.push(candidate);
        Ok(())
    }

    async fn add_audio_track(&self, stream: AudioStream) -> Result<(), TransportError> {
        lock(&self.inner).audio_tracks.push(stream);
        Ok(())
    }

    async fn create_data_channel(
        &self,
        label: &str,
    ) -> Result<Arc<dyn DataChannel>, TransportError> {
        let (channel, delay) = {
            let mut inner = lock(&self.inner);
            if let Some(error) = inner.fail_next_channel.take() {
                return Err(TransportError::Negotiation(error));
            }
            let channel = MockDataChannel::new(label);
            inner.channels.push(channel.clone());
            (channel, inner.channel_delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(Arc::new(channel))
    }

    fn on_ice_candidate(&self, handler: CandidateHandler) {
        lock(&self.inner).candidate_handler = Some(Arc::from(handler));
    }

    fn on_remote_track(&self, handler: TrackHandler) {
        lock(&self.inner).track_handler = Some(Arc::from(handler));
    }

    async fn close(&self) -> Result<(), TransportError> {
        let channels = {
            let mut inner = lock(&self.inner);
            inner.closed = true;
            inner.channels.clone()
        };
        for channel in channels {
            channel.set_state(ChannelState::Closed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pane_types::SessionId;

    // ===========================================
    // MockRelayTransport Tests
    // ===========================================

    #[tokio::test]
    async fn relay_connects_and_records_url() {
        let relay = MockRelayTransport::new();
        assert!(!relay.is_open());

        relay.connect("ws://relay/signal").await.unwrap();

        assert!(relay.is_open());
        assert_eq!(relay.connected_url().as_deref(), Some("ws://relay/signal"));
    }

    #[tokio::test]
    async fn relay_send_requires_connection() {
        let relay = MockRelayTransport::new();
        let result = relay.send("{}").await;
        assert_eq!(result, Err(TransportError::NotConnected));
    }

    #[tokio::test]
    async fn relay_captures_sent_messages() {
        let relay = MockRelayTransport::new();
        relay.connect("ws://relay").await.unwrap();

        let connect = RelayMessage::Connect {
            sessionid: SessionId::new("HOST"),
        };
        relay.send(&connect.to_json().unwrap()).await.unwrap();
        relay.send("not json").await.unwrap();

        assert_eq!(relay.sent_frames().len(), 2);
        assert_eq!(relay.sent_messages(), vec![connect]);
    }

    #[tokio::test]
    async fn relay_recv_waits_for_pushed_frame() {
        let relay = MockRelayTransport::new();
        relay.connect("ws://relay").await.unwrap();

        let pusher = relay.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            pusher.push_frame("hello");
        });

        assert_eq!(relay.recv().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn relay_hang_up_drains_queue_first() {
        let relay = MockRelayTransport::new();
        relay.connect("ws://relay").await.unwrap();
        relay.push_frame("last");
        relay.hang_up();

        assert_eq!(relay.recv().await.unwrap(), "last");
        assert_eq!(relay.recv().await, Err(TransportError::ConnectionClosed));
        assert!(!relay.is_open());
    }

    #[tokio::test]
    async fn relay_close_wakes_pending_recv() {
        let relay = MockRelayTransport::new();
        relay.connect("ws://relay").await.unwrap();

        let closer = relay.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            closer.close().await.unwrap();
        });

        assert_eq!(relay.recv().await, Err(TransportError::NotConnected));
    }

    #[tokio::test]
    async fn relay_forced_failures() {
        let relay = MockRelayTransport::new();
        relay.fail_next_connect("refused");
        assert!(matches!(
            relay.connect("ws://relay").await,
            Err(TransportError::ConnectionFailed(_))
        ));

        relay.connect("ws://relay").await.unwrap();
        relay.fail_next_send("broken pipe");
        assert!(relay.send("x").await.is_err());
        assert!(relay.send("x").await.is_ok());

        relay.fail_next_recv("reset");
        assert!(matches!(
            relay.recv().await,
            Err(TransportError::ReceiveFailed(_))
        ));
    }

    // ===========================================
    // MockPeerTransport Tests
    // ===========================================

    #[tokio::test]
    async fn offers_are_fresh() {
        let peer = MockPeerTransport::new();
        let a = peer.create_offer().await.unwrap();
        let b = peer.create_offer().await.unwrap();
        assert_ne!(a.sdp, b.sdp);
        assert_eq!(peer.offers_created(), 2);
    }

    #[tokio::test]
    async fn handlers_fire_on_demand() {
        let peer = MockPeerTransport::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        peer.on_ice_candidate(Box::new(move |c| sink.lock().unwrap().push(c.candidate)));

        peer.emit_ice_candidate(IceCandidate::new("candidate:1"));

        assert_eq!(*seen.lock().unwrap(), vec!["candidate:1".to_string()]);
    }

    #[tokio::test]
    async fn close_closes_channels() {
        let peer = MockPeerTransport::new();
        let channel = peer.create_data_channel("panelink").await.unwrap();
        assert_eq!(channel.label(), "panelink");

        peer.close().await.unwrap();

        assert!(peer.is_closed());
        assert_eq!(channel.ready_state(), ChannelState::Closed);
    }

    // ===========================================
    // MockDataChannel Tests
    // ===========================================

    #[tokio::test]
    async fn channel_sends_only_when_open() {
        let channel = MockDataChannel::new("panelink");
        assert!(channel.send("x").await.is_err());

        channel.open();
        channel.send("x").await.unwrap();

        assert_eq!(channel.sent_frames(), vec!["x".to_string()]);
    }

    #[tokio::test]
    async fn channel_open_and_message_handlers() {
        let channel = MockDataChannel::new("panelink");
        let log = Arc::new(Mutex::new(Vec::new()));

        let on_open = Arc::clone(&log);
        channel.on_open(Box::new(move || on_open.lock().unwrap().push("open".to_string())));
        let on_message = Arc::clone(&log);
        channel.on_message(Box::new(move |m| on_message.lock().unwrap().push(m)));

        channel.open();
        channel.deliver("frame");

        assert_eq!(
            *log.lock().unwrap(),
            vec!["open".to_string(), "frame".to_string()]
        );
    }
}
