//! Relay handshake and peer negotiation.
//!
//! [`SignalingSession`] feeds events into the pure
//! [`SignalingState`](pane_core::SignalingState) machine and performs the
//! actions it returns. It also answers remote offers, applies remote answers
//! and trickles ICE candidates in both directions.
//!
//! ```text
//! relay frame ─► handle_relay_frame ─► dispatch(event) ─► SignalingState::on_event
//!                                            ▲                    │
//!                                            └── follow-up ◄── execute(action)
//! ```
//!
//! Every continuation re-checks that the session is still active after each
//! await and drops its result once the session has closed or failed.

use pane_core::{SessionEvent, SignalingAction, SignalingEvent, SignalingState};
use pane_types::{Answer, IceCandidate, Offer, RelayMessage, SessionId};
use std::collections::VecDeque;
use std::sync::{Arc, RwLock};
use tokio::sync::{broadcast, mpsc, Mutex};

use crate::channel::PeerChannelProtocol;
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::media::{acquire_audio, AudioSource, AudioStream, MediaError, RemoteTrack};
use crate::transport::{AnswerOptions, PeerTransport, RelayTransport};

/// Notifications raised by peer-side handlers, handled by the session driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PeerEvent {
    LocalCandidate(IceCandidate),
    RemoteTrack(RemoteTrack),
    ChannelOpened,
    ChannelFrame(String),
}

/// Drives the relay handshake and offer/answer/ICE exchange.
pub struct SignalingSession<R: RelayTransport, P: PeerTransport> {
    relay: Arc<R>,
    peer: Arc<P>,
    channel: Arc<PeerChannelProtocol>,
    config: SessionConfig,
    state: Mutex<SignalingState>,
    audio_source: RwLock<Option<Arc<dyn AudioSource>>>,
    local_audio: Mutex<Option<AudioStream>>,
    events: broadcast::Sender<SessionEvent>,
    peer_events: mpsc::UnboundedSender<PeerEvent>,
}

impl<R: RelayTransport, P: PeerTransport> SignalingSession<R, P> {
    /// Create a session and wire the peer transport's handlers into
    /// `peer_events`.
    pub(crate) fn new(
        config: SessionConfig,
        relay: Arc<R>,
        peer: Arc<P>,
        channel: Arc<PeerChannelProtocol>,
        events: broadcast::Sender<SessionEvent>,
        peer_events: mpsc::UnboundedSender<PeerEvent>,
    ) -> Self {
        let tx = peer_events.clone();
        peer.on_ice_candidate(Box::new(move |candidate| {
            let _ = tx.send(PeerEvent::LocalCandidate(candidate));
        }));
        let tx = peer_events.clone();
        peer.on_remote_track(Box::new(move |track| {
            let _ = tx.send(PeerEvent::RemoteTrack(track));
        }));

        Self {
            relay,
            peer,
            channel,
            config,
            state: Mutex::new(SignalingState::new()),
            audio_source: RwLock::new(None),
            local_audio: Mutex::new(None),
            events,
            peer_events,
        }
    }

    /// Register the local audio provider.
    pub fn set_audio_source(&self, source: Arc<dyn AudioSource>) {
        *self
            .audio_source
            .write()
            .unwrap_or_else(|e| e.into_inner()) = Some(source);
    }

    /// The relay transport.
    pub fn relay(&self) -> &Arc<R> {
        &self.relay
    }

    /// Current signaling state.
    pub async fn state(&self) -> SignalingState {
        self.state.lock().await.clone()
    }

    /// The relay-assigned session id, once greeted.
    pub async fn session_id(&self) -> Option<SessionId> {
        self.state.lock().await.session_id().cloned()
    }

    /// False once the session has closed or failed.
    pub async fn is_active(&self) -> bool {
        self.state.lock().await.is_active()
    }

    /// Feed an event through the state machine and perform the resulting
    /// actions, including any follow-up events they produce.
    pub async fn dispatch(&self, event: SignalingEvent) {
        let mut pending = VecDeque::from([event]);

        while let Some(event) = pending.pop_front() {
            for action in self.apply(event).await {
                // A concurrent close may have ended the session mid-batch
                if !action.is_teardown() && !self.is_active().await {
                    tracing::debug!("Session ended; skipping {:?}", action);
                    continue;
                }
                if let Some(next) = self.execute(action).await {
                    pending.push_back(next);
                }
            }
        }
    }

    async fn apply(&self, event: SignalingEvent) -> Vec<SignalingAction> {
        let mut state = self.state.lock().await;
        let (next, actions) = state.clone().on_event(event);
        if next.name() != state.name() {
            tracing::info!("Signaling: {} -> {}", state.name(), next.name());
        }
        *state = next;
        actions
    }

    async fn execute(&self, action: SignalingAction) -> Option<SignalingEvent> {
        match action {
            SignalingAction::OpenRelay => match self.relay.connect(&self.config.relay_url).await {
                Ok(()) => Some(SignalingEvent::RelayOpened),
                Err(e) => Some(SignalingEvent::RelayFailed {
                    error: e.to_string(),
                }),
            },
            SignalingAction::SendConnect { target } => {
                let message = RelayMessage::Connect { sessionid: target };
                self.send_relay(&message)
                    .await
                    .err()
                    .map(|e| SignalingEvent::RelayFailed {
                        error: e.to_string(),
                    })
            }
            SignalingAction::CreateDataChannel => self.create_data_channel().await.err().map(|e| {
                SignalingEvent::NegotiationFailed {
                    error: e.to_string(),
                }
            }),
            SignalingAction::AcquireLocalAudio => self.acquire_local_audio().await,
            SignalingAction::AttachLocalAudio => {
                self.attach_local_audio().await;
                None
            }
            SignalingAction::StartNegotiation => match self.negotiate().await {
                Ok(true) => Some(SignalingEvent::OfferSent),
                Ok(false) => None,
                Err(e) => Some(SignalingEvent::NegotiationFailed {
                    error: e.to_string(),
                }),
            },
            SignalingAction::CloseTransports => {
                self.close_transports().await;
                None
            }
            SignalingAction::Emit(event) => {
                self.emit(event);
                None
            }
        }
    }

    async fn create_data_channel(&self) -> Result<(), SessionError> {
        let channel = self
            .peer
            .create_data_channel(&self.config.data_channel_label)
            .await?;
        if !self.is_active().await {
            tracing::debug!("Session closed during channel creation; closing channel");
            if let Err(e) = channel.close().await {
                tracing::debug!("Data channel close: {}", e);
            }
            return Ok(());
        }

        let tx = self.peer_events.clone();
        channel.on_open(Box::new(move || {
            let _ = tx.send(PeerEvent::ChannelOpened);
        }));
        let tx = self.peer_events.clone();
        channel.on_message(Box::new(move |frame| {
            let _ = tx.send(PeerEvent::ChannelFrame(frame));
        }));

        self.channel.attach(channel).await;
        Ok(())
    }

    async fn acquire_local_audio(&self) -> Option<SignalingEvent> {
        let source = self
            .audio_source
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        let result = match source {
            Some(source) => acquire_audio(source.as_ref(), self.config.audio_timeout()).await,
            None => Err(MediaError::NoSource),
        };

        if !self.is_active().await {
            tracing::debug!("Session closed while acquiring audio; dropping result");
            return None;
        }

        match result {
            Ok(stream) => {
                *self.local_audio.lock().await = Some(stream);
                Some(SignalingEvent::LocalAudioReady)
            }
            Err(e) => {
                tracing::warn!("Proceeding without audio: {}", e);
                Some(SignalingEvent::LocalAudioFailed {
                    error: e.to_string(),
                })
            }
        }
    }

    async fn attach_local_audio(&self) {
        let Some(stream) = self.local_audio.lock().await.take() else {
            return;
        };
        match self.peer.add_audio_track(stream).await {
            Ok(()) => tracing::debug!("Local audio attached"),
            Err(e) => tracing::warn!("Could not attach local audio: {}", e),
        }
    }

    /// Create an offer, apply it locally and send it over the relay.
    ///
    /// Returns `Ok(false)` if the session ended while the offer was pending.
    async fn negotiate(&self) -> Result<bool, SessionError> {
        if !self.is_active().await {
            return Ok(false);
        }
        let offer = self.peer.create_offer().await?;
        if !self.is_active().await {
            tracing::debug!("Session closed during offer creation; dropping offer");
            return Ok(false);
        }

        self.peer.set_local_description(offer.clone()).await?;
        if !self.is_active().await {
            return Ok(false);
        }

        self.send_relay(&RelayMessage::Offer(Offer {
            sdp: offer,
            my_session_id: None,
            target_session_id: None,
        }))
        .await?;
        Ok(true)
    }

    /// Handle one inbound relay frame.
    ///
    /// Unknown message kinds and malformed frames are logged and skipped.
    pub async fn handle_relay_frame(&self, text: &str) {
        let message = match RelayMessage::from_json(text) {
            Ok(message) => message,
            Err(e) if e.is_unknown_kind() => {
                tracing::warn!("Ignoring relay message: {}", e);
                return;
            }
            Err(e) => {
                tracing::warn!("Dropping relay frame ({} bytes): {}", text.len(), e);
                return;
            }
        };

        tracing::debug!("Relay -> {}", message.kind());
        match message {
            RelayMessage::Greeting { sessionid } => {
                self.dispatch(SignalingEvent::GreetingReceived {
                    session_id: sessionid,
                    transmit_audio: self.config.transmit_audio,
                })
                .await
            }
            RelayMessage::Offer(offer) => {
                let event = match self.answer_offer(offer).await {
                    Ok(true) => SignalingEvent::AnswerSent,
                    Ok(false) => return,
                    Err(e) => SignalingEvent::NegotiationFailed {
                        error: e.to_string(),
                    },
                };
                self.dispatch(event).await
            }
            RelayMessage::Answer(answer) => {
                if let Err(e) = self.peer.set_remote_description(answer.sdp).await {
                    self.dispatch(SignalingEvent::NegotiationFailed {
                        error: e.to_string(),
                    })
                    .await
                }
            }
            RelayMessage::Candidate { candidate } => {
                if let Err(e) = self.peer.add_ice_candidate(candidate).await {
                    tracing::warn!("Rejected remote ICE candidate: {}", e);
                }
            }
            RelayMessage::Connect { .. } => {
                tracing::warn!("Ignoring connect request from relay");
            }
        }
    }

    /// Apply a remote offer and send back an answer tagged with both routing
    /// ids. The target is the offerer's `mySessionId`, falling back to the
    /// session we asked to reach.
    async fn answer_offer(&self, offer: Offer) -> Result<bool, SessionError> {
        let (own_id, target_id) = {
            let state = self.state.lock().await;
            match state.session_id() {
                Some(own) => (
                    own.clone(),
                    offer.my_session_id.clone().or_else(|| state.target().cloned()),
                ),
                None => {
                    tracing::warn!("Ignoring offer received before greeting");
                    return Ok(false);
                }
            }
        };
        let Some(target_id) = target_id else {
            tracing::warn!("Ignoring offer with no routable sender");
            return Ok(false);
        };

        self.peer.set_remote_description(offer.sdp).await?;
        if !self.is_active().await {
            return Ok(false);
        }

        let answer = self.peer.create_answer(AnswerOptions::default()).await?;
        if !self.is_active().await {
            tracing::debug!("Session closed during answer creation; dropping answer");
            return Ok(false);
        }

        self.peer.set_local_description(answer.clone()).await?;
        self.send_relay(&RelayMessage::Answer(Answer {
            sdp: answer,
            my_session_id: own_id,
            target_session_id: target_id,
        }))
        .await?;
        Ok(true)
    }

    /// Forward a locally gathered ICE candidate to the relay.
    pub(crate) async fn send_local_candidate(&self, candidate: IceCandidate) {
        if !self.state.lock().await.accepts_signaling() || !self.relay.is_open() {
            tracing::debug!("Dropping local ICE candidate; relay not usable");
            return;
        }
        if let Err(e) = self.send_relay(&RelayMessage::Candidate { candidate }).await {
            tracing::warn!("Could not forward ICE candidate: {}", e);
        }
    }

    /// Report a remote track to subscribers.
    pub(crate) fn remote_track(&self, track: &RemoteTrack) {
        tracing::info!("Remote {} track added: {}", track.kind, track.id);
        self.emit(SessionEvent::RemoteTrack {
            track_id: track.id.clone(),
            kind: track.kind.clone(),
        });
    }

    /// Record that the relay connection ended.
    pub async fn relay_closed(&self, reason: String) {
        tracing::info!("Relay connection ended: {}", reason);
        self.dispatch(SignalingEvent::RelayClosed { reason }).await
    }

    /// Close the session. Repeated calls do nothing.
    pub async fn close(&self) {
        self.dispatch(SignalingEvent::CloseRequested).await
    }

    async fn send_relay(&self, message: &RelayMessage) -> Result<(), SessionError> {
        let text = message.to_json()?;
        self.relay.send(&text).await?;
        tracing::debug!("Relay <- {}", message.kind());
        Ok(())
    }

    async fn close_transports(&self) {
        self.channel.close().await;
        if let Err(e) = self.peer.close().await {
            tracing::debug!("Peer close: {}", e);
        }
        if let Err(e) = self.relay.close().await {
            tracing::debug!("Relay close: {}", e);
        }
        self.local_audio.lock().await.take();
    }

    fn emit(&self, event: SessionEvent) {
        if let SessionEvent::Failed { error } = &event {
            tracing::warn!("Session failed: {}", error);
        }
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

impl<R: RelayTransport, P: PeerTransport> std::fmt::Debug for SignalingSession<R, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalingSession")
            .field("relay_url", &self.config.relay_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MockAudioSource;
    use crate::transport::{MockPeerTransport, MockRelayTransport};
    use pane_types::SessionDescription;
    use std::time::Duration;

    struct Harness {
        session: SignalingSession<MockRelayTransport, MockPeerTransport>,
        relay: MockRelayTransport,
        peer: MockPeerTransport,
        events: broadcast::Receiver<SessionEvent>,
        peer_rx: mpsc::UnboundedReceiver<PeerEvent>,
    }

    fn harness(config: SessionConfig) -> Harness {
        let relay = MockRelayTransport::new();
        let peer = MockPeerTransport::new();
        let (events_tx, events) = broadcast::channel(16);
        let (peer_tx, peer_rx) = mpsc::unbounded_channel();
        let session = SignalingSession::new(
            config,
            Arc::new(relay.clone()),
            Arc::new(peer.clone()),
            Arc::new(PeerChannelProtocol::new(8)),
            events_tx,
            peer_tx,
        );
        Harness {
            session,
            relay,
            peer,
            events,
            peer_rx,
        }
    }

    async fn greeted(config: SessionConfig) -> Harness {
        let h = harness(config);
        h.session
            .dispatch(SignalingEvent::ConnectRequested {
                target: SessionId::new("HOST"),
            })
            .await;
        h.session
            .handle_relay_frame(r#"{"message":"greeting","sessionid":"S1"}"#)
            .await;
        h
    }

    fn offers(relay: &MockRelayTransport) -> Vec<Offer> {
        relay
            .sent_messages()
            .into_iter()
            .filter_map(|m| match m {
                RelayMessage::Offer(o) => Some(o),
                _ => None,
            })
            .collect()
    }

    fn drain(events: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut out = Vec::new();
        while let Ok(event) = events.try_recv() {
            out.push(event);
        }
        out
    }

    // ===========================================
    // Handshake Tests
    // ===========================================

    #[tokio::test]
    async fn connect_opens_relay_and_requests_session() {
        let h = harness(SessionConfig::new("ws://relay.test/signal"));

        h.session
            .dispatch(SignalingEvent::ConnectRequested {
                target: SessionId::new("HOST"),
            })
            .await;

        assert_eq!(h.relay.connected_url().as_deref(), Some("ws://relay.test/signal"));
        assert_eq!(
            h.relay.sent_messages(),
            vec![RelayMessage::Connect {
                sessionid: SessionId::new("HOST")
            }]
        );
        assert_eq!(h.session.state().await.name(), "awaiting_session");
    }

    #[tokio::test]
    async fn relay_refusal_fails_session() {
        let mut h = harness(SessionConfig::default());
        h.relay.fail_next_connect("refused");

        h.session
            .dispatch(SignalingEvent::ConnectRequested {
                target: SessionId::new("HOST"),
            })
            .await;

        assert!(!h.session.is_active().await);
        assert!(drain(&mut h.events)
            .iter()
            .any(|e| matches!(e, SessionEvent::Failed { .. })));
    }

    #[tokio::test]
    async fn greeting_without_audio_sends_exactly_one_offer() {
        let mut h = greeted(SessionConfig::default()).await;

        let sent = offers(&h.relay);
        assert_eq!(sent.len(), 1);
        assert_eq!(h.peer.local_descriptions(), vec![sent[0].sdp.clone()]);
        assert_eq!(h.peer.channels_created(), 1);
        assert_eq!(h.session.session_id().await, Some(SessionId::new("S1")));
        assert_eq!(
            drain(&mut h.events)[0],
            SessionEvent::SessionAssigned {
                session_id: SessionId::new("S1")
            }
        );
    }

    #[tokio::test]
    async fn second_greeting_is_ignored() {
        let h = greeted(SessionConfig::default()).await;

        h.session
            .handle_relay_frame(r#"{"message":"greeting","sessionid":"S2"}"#)
            .await;

        assert_eq!(offers(&h.relay).len(), 1);
        assert_eq!(h.session.session_id().await, Some(SessionId::new("S1")));
    }

    // ===========================================
    // Audio Tests
    // ===========================================

    #[tokio::test]
    async fn audio_is_attached_before_offer() {
        let h = harness(SessionConfig::default().with_audio(true));
        let source = MockAudioSource::ready(AudioStream::new("mic"));
        h.session.set_audio_source(Arc::new(source.clone()));

        h.session
            .dispatch(SignalingEvent::ConnectRequested {
                target: SessionId::new("HOST"),
            })
            .await;
        h.session
            .handle_relay_frame(r#"{"message":"greeting","sessionid":"S1"}"#)
            .await;

        assert_eq!(source.calls(), 1);
        assert_eq!(h.peer.audio_tracks(), vec![AudioStream::new("mic")]);
        assert_eq!(offers(&h.relay).len(), 1);
    }

    #[tokio::test]
    async fn missing_audio_still_negotiates() {
        let mut h = greeted(SessionConfig::default().with_audio(true)).await;

        assert_eq!(offers(&h.relay).len(), 1);
        assert!(h.peer.audio_tracks().is_empty());
        assert!(drain(&mut h.events)
            .iter()
            .any(|e| matches!(e, SessionEvent::AudioUnavailable { .. })));
    }

    #[tokio::test]
    async fn stalled_audio_times_out_then_negotiates() {
        let h = harness(
            SessionConfig::default()
                .with_audio(true)
                .with_audio_timeout(Duration::from_secs(1)),
        );
        h.session.set_audio_source(Arc::new(MockAudioSource::never()));

        h.session
            .dispatch(SignalingEvent::ConnectRequested {
                target: SessionId::new("HOST"),
            })
            .await;
        h.session
            .handle_relay_frame(r#"{"message":"greeting","sessionid":"S1"}"#)
            .await;

        assert_eq!(offers(&h.relay).len(), 1);
        assert!(h.session.is_active().await);
    }

    // ===========================================
    // Negotiation Tests
    // ===========================================

    #[tokio::test]
    async fn remote_offer_is_answered_with_routing_ids() {
        let h = greeted(SessionConfig::default()).await;
        let remote = SessionDescription::offer("v=0 remote");

        h.session
            .handle_relay_frame(
                &RelayMessage::Offer(Offer {
                    sdp: remote.clone(),
                    my_session_id: Some(SessionId::new("PEER")),
                    target_session_id: Some(SessionId::new("S1")),
                })
                .to_json()
                .unwrap(),
            )
            .await;

        assert_eq!(h.peer.remote_descriptions(), vec![remote]);
        assert_eq!(h.peer.answer_options(), vec![AnswerOptions::default()]);
        let answer = h
            .relay
            .sent_messages()
            .into_iter()
            .find_map(|m| match m {
                RelayMessage::Answer(a) => Some(a),
                _ => None,
            })
            .unwrap();
        assert_eq!(answer.my_session_id, SessionId::new("S1"));
        assert_eq!(answer.target_session_id, SessionId::new("PEER"));
        assert_eq!(h.session.state().await.name(), "negotiating");
    }

    #[tokio::test]
    async fn untagged_offer_answers_connect_target() {
        let h = greeted(SessionConfig::default()).await;

        h.session
            .handle_relay_frame(r#"{"message":"offer","sdp":{"type":"offer","sdp":"v=0"}}"#)
            .await;

        let answer = h
            .relay
            .sent_messages()
            .into_iter()
            .find_map(|m| match m {
                RelayMessage::Answer(a) => Some(a),
                _ => None,
            })
            .unwrap();
        assert_eq!(answer.target_session_id, SessionId::new("HOST"));
    }

    #[tokio::test]
    async fn offer_before_greeting_is_ignored() {
        let h = harness(SessionConfig::default());
        h.session
            .handle_relay_frame(r#"{"message":"offer","sdp":{"type":"offer","sdp":"v=0"}}"#)
            .await;
        assert!(h.peer.remote_descriptions().is_empty());
    }

    #[tokio::test]
    async fn remote_answer_is_applied() {
        let h = greeted(SessionConfig::default()).await;

        h.session
            .handle_relay_frame(
                r#"{"message":"answer","sdp":{"type":"answer","sdp":"v=0"},"mySessionId":"HOST","targetSessionId":"S1"}"#,
            )
            .await;

        assert_eq!(
            h.peer.remote_descriptions(),
            vec![SessionDescription::answer("v=0")]
        );
    }

    #[tokio::test]
    async fn offer_failure_fails_session() {
        let mut h = harness(SessionConfig::default());
        h.peer.fail_next_offer("no codecs");
        h.session
            .dispatch(SignalingEvent::ConnectRequested {
                target: SessionId::new("HOST"),
            })
            .await;

        h.session
            .handle_relay_frame(r#"{"message":"greeting","sessionid":"S1"}"#)
            .await;

        assert!(matches!(h.session.state().await, SignalingState::Failed { .. }));
        assert!(h.peer.is_closed());
        assert!(!h.relay.is_open());
        assert!(drain(&mut h.events)
            .iter()
            .any(|e| matches!(e, SessionEvent::Failed { error } if error.contains("no codecs"))));
    }

    #[tokio::test]
    async fn offer_finishing_after_close_is_dropped() {
        let h = harness(SessionConfig::default());
        h.peer.delay_offers(Duration::from_millis(50));
        h.session
            .dispatch(SignalingEvent::ConnectRequested {
                target: SessionId::new("HOST"),
            })
            .await;

        let closer = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            h.session.close().await;
        };
        let greeting = h
            .session
            .handle_relay_frame(r#"{"message":"greeting","sessionid":"S1"}"#);
        tokio::join!(greeting, closer);

        assert!(offers(&h.relay).is_empty());
        assert!(h.peer.local_descriptions().is_empty());
        assert_eq!(h.session.state().await, SignalingState::Closed);
    }

    #[tokio::test]
    async fn channel_finishing_after_close_is_closed_and_not_attached() {
        use crate::transport::{ChannelState, DataChannel};

        let mut h = harness(SessionConfig::default());
        h.peer.delay_channels(Duration::from_millis(50));
        h.session
            .dispatch(SignalingEvent::ConnectRequested {
                target: SessionId::new("HOST"),
            })
            .await;

        let closer = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            h.session.close().await;
        };
        let greeting = h
            .session
            .handle_relay_frame(r#"{"message":"greeting","sessionid":"S1"}"#);
        tokio::join!(greeting, closer);

        let channel = h.peer.data_channel().unwrap();
        assert_eq!(channel.ready_state(), ChannelState::Closed);
        channel.open();
        assert!(!h.session.channel.is_open().await);
        assert!(h.peer_rx.try_recv().is_err());

        assert_eq!(h.peer.offers_created(), 0);
        assert!(offers(&h.relay).is_empty());
        assert_eq!(
            drain(&mut h.events),
            vec![
                SessionEvent::SessionAssigned {
                    session_id: SessionId::new("S1")
                },
                SessionEvent::Closed,
            ]
        );
    }

    // ===========================================
    // ICE Tests
    // ===========================================

    #[tokio::test]
    async fn remote_candidates_reach_peer() {
        let h = greeted(SessionConfig::default()).await;

        h.session
            .handle_relay_frame(
                r#"{"message":"icecandidate","candidate":{"candidate":"candidate:1","sdpMid":"0","sdpMLineIndex":0}}"#,
            )
            .await;

        let candidates = h.peer.remote_candidates();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].sdp_mid.as_deref(), Some("0"));
    }

    #[tokio::test]
    async fn local_candidates_are_queued_then_forwarded() {
        let mut h = greeted(SessionConfig::default()).await;

        h.peer.emit_ice_candidate(IceCandidate::new("candidate:local"));
        let candidate = match h.peer_rx.recv().await.unwrap() {
            PeerEvent::LocalCandidate(candidate) => candidate,
            other => panic!("expected a local candidate, got {:?}", other),
        };
        h.session.send_local_candidate(candidate).await;

        assert!(h.relay.sent_messages().contains(&RelayMessage::Candidate {
            candidate: IceCandidate::new("candidate:local")
        }));
    }

    // ===========================================
    // Tolerance Tests
    // ===========================================

    #[tokio::test]
    async fn unknown_and_malformed_frames_are_skipped() {
        let h = greeted(SessionConfig::default()).await;
        let before = h.relay.sent_frames().len();

        h.session
            .handle_relay_frame(r#"{"message":"bye","sessionid":"S1"}"#)
            .await;
        h.session.handle_relay_frame("{{{").await;
        h.session.handle_relay_frame(r#"{"sessionid":"S1"}"#).await;

        assert!(h.session.is_active().await);
        assert_eq!(h.relay.sent_frames().len(), before);
    }

    #[tokio::test]
    async fn close_emits_closed_once() {
        let mut h = greeted(SessionConfig::default()).await;
        drain(&mut h.events);

        h.session.close().await;
        h.session.close().await;

        assert_eq!(drain(&mut h.events), vec![SessionEvent::Closed]);
        assert!(h.peer.is_closed());
    }
}
