//! Signaling state machine for Panelink.
//!
//! This module provides a pure, side-effect-free state machine for the
//! relay handshake and peer negotiation lifecycle. The state machine takes
//! events as input and produces a new state plus a list of actions to execute.
//!
//! ```text
//! Disconnected → Connecting → AwaitingSession → SessionEstablished
//!                                                      │
//!                                    Negotiating ◄─────┘
//!                                         │
//!                                     Connected
//! (any active state) → Closed | Failed
//! ```
//!
//! The actual I/O (opening the relay, negotiating, sending frames) is
//! performed by pane-client, not by this module.

use pane_types::SessionId;

/// Signaling state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalingState {
    /// No relay connection.
    Disconnected,
    /// Relay connection is being opened.
    Connecting {
        /// Session we want to reach.
        target: SessionId,
    },
    /// Connect request sent, waiting for the relay's greeting.
    AwaitingSession {
        /// Session we want to reach.
        target: SessionId,
    },
    /// Greeting received; data channel created; negotiation pending.
    SessionEstablished {
        /// Session we want to reach.
        target: SessionId,
        /// Session id assigned to us by the relay.
        session_id: SessionId,
    },
    /// Offer or answer exchanged, waiting for the data channel to open.
    Negotiating {
        /// Session we want to reach.
        target: SessionId,
        /// Session id assigned to us by the relay.
        session_id: SessionId,
    },
    /// Data channel open.
    Connected {
        /// Session we are connected to.
        target: SessionId,
        /// Session id assigned to us by the relay.
        session_id: SessionId,
    },
    /// Closed on request. Terminal.
    Closed,
    /// Negotiation or relay failure. Terminal.
    Failed {
        /// What went wrong.
        reason: String,
    },
}

impl SignalingState {
    /// Create a new state machine in the Disconnected state.
    pub fn new() -> Self {
        Self::Disconnected
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (pane-client)
    /// is responsible for executing the returned actions in order.
    pub fn on_event(self, event: SignalingEvent) -> (Self, Vec<SignalingAction>) {
        match (self, event) {
            // From Disconnected
            (Self::Disconnected, SignalingEvent::ConnectRequested { target }) => {
                (Self::Connecting { target }, vec![SignalingAction::OpenRelay])
            }

            // From Connecting
            (Self::Connecting { target }, SignalingEvent::RelayOpened) => (
                Self::AwaitingSession {
                    target: target.clone(),
                },
                vec![SignalingAction::SendConnect { target }],
            ),
            (
                Self::Connecting { .. } | Self::AwaitingSession { .. },
                SignalingEvent::RelayFailed { error },
            ) => fail(error),

            // From AwaitingSession
            (
                Self::AwaitingSession { target },
                SignalingEvent::GreetingReceived {
                    session_id,
                    transmit_audio,
                },
            ) => {
                let mut actions = vec![
                    SignalingAction::Emit(SessionEvent::SessionAssigned {
                        session_id: session_id.clone(),
                    }),
                    SignalingAction::CreateDataChannel,
                ];
                if transmit_audio {
                    actions.push(SignalingAction::AcquireLocalAudio);
                } else {
                    actions.push(SignalingAction::StartNegotiation);
                }
                (Self::SessionEstablished { target, session_id }, actions)
            }

            // From SessionEstablished
            (state @ Self::SessionEstablished { .. }, SignalingEvent::LocalAudioReady) => (
                state,
                vec![
                    SignalingAction::AttachLocalAudio,
                    SignalingAction::StartNegotiation,
                ],
            ),
            (state @ Self::SessionEstablished { .. }, SignalingEvent::LocalAudioFailed { error }) => (
                state,
                vec![
                    SignalingAction::Emit(SessionEvent::AudioUnavailable { error }),
                    SignalingAction::StartNegotiation,
                ],
            ),
            (
                Self::SessionEstablished { target, session_id },
                SignalingEvent::OfferSent | SignalingEvent::AnswerSent,
            ) => (Self::Negotiating { target, session_id }, vec![]),

            // Data channel open completes negotiation
            (
                Self::SessionEstablished { target, session_id }
                | Self::Negotiating { target, session_id },
                SignalingEvent::ChannelOpened,
            ) => (
                Self::Connected {
                    target,
                    session_id: session_id.clone(),
                },
                vec![SignalingAction::Emit(SessionEvent::ChannelOpen { session_id })],
            ),

            // Relay loss only matters until the data channel is up
            (state @ Self::Connected { .. }, SignalingEvent::RelayClosed { .. }) => (state, vec![]),
            (
                Self::Connecting { .. }
                | Self::AwaitingSession { .. }
                | Self::SessionEstablished { .. }
                | Self::Negotiating { .. },
                SignalingEvent::RelayClosed { reason },
            ) => fail(format!("relay closed before negotiation completed: {}", reason)),

            // Failures
            (
                Self::Connecting { .. }
                | Self::AwaitingSession { .. }
                | Self::SessionEstablished { .. }
                | Self::Negotiating { .. }
                | Self::Connected { .. },
                SignalingEvent::NegotiationFailed { error },
            ) => fail(error),

            // Close
            (Self::Disconnected, SignalingEvent::CloseRequested) => (
                Self::Closed,
                vec![SignalingAction::Emit(SessionEvent::Closed)],
            ),
            (state, SignalingEvent::CloseRequested) if state.is_active() => (
                Self::Closed,
                vec![
                    SignalingAction::CloseTransports,
                    SignalingAction::Emit(SessionEvent::Closed),
                ],
            ),

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// False once the session is closed or failed.
    ///
    /// Asynchronous continuations check this before applying their results.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Closed | Self::Failed { .. })
    }

    /// True once the data channel is open.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    /// True while the relay is open and the session may exchange signaling.
    pub fn accepts_signaling(&self) -> bool {
        matches!(
            self,
            Self::AwaitingSession { .. }
                | Self::SessionEstablished { .. }
                | Self::Negotiating { .. }
                | Self::Connected { .. }
        )
    }

    /// The relay-assigned session id, once greeted.
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            Self::SessionEstablished { session_id, .. }
            | Self::Negotiating { session_id, .. }
            | Self::Connected { session_id, .. } => Some(session_id),
            _ => None,
        }
    }

    /// The session we asked the relay to reach.
    pub fn target(&self) -> Option<&SessionId> {
        match self {
            Self::Connecting { target }
            | Self::AwaitingSession { target }
            | Self::SessionEstablished { target, .. }
            | Self::Negotiating { target, .. }
            | Self::Connected { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Short state name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting { .. } => "connecting",
            Self::AwaitingSession { .. } => "awaiting_session",
            Self::SessionEstablished { .. } => "session_established",
            Self::Negotiating { .. } => "negotiating",
            Self::Connected { .. } => "connected",
            Self::Closed => "closed",
            Self::Failed { .. } => "failed",
        }
    }
}

impl Default for SignalingState {
    fn default() -> Self {
        Self::new()
    }
}

fn fail(reason: String) -> (SignalingState, Vec<SignalingAction>) {
    (
        SignalingState::Failed {
            reason: reason.clone(),
        },
        vec![
            SignalingAction::CloseTransports,
            SignalingAction::Emit(SessionEvent::Failed { error: reason }),
        ],
    )
}

/// Events that drive the signaling lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalingEvent {
    /// Application asked to reach `target`.
    ConnectRequested {
        /// Session to reach.
        target: SessionId,
    },
    /// Relay transport reported open.
    RelayOpened,
    /// Relay transport could not be opened or written to.
    RelayFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// Relay sent a greeting.
    GreetingReceived {
        /// Session id assigned to us.
        session_id: SessionId,
        /// Whether local audio must be attached before negotiating.
        transmit_audio: bool,
    },
    /// Local audio stream is available.
    LocalAudioReady,
    /// Local audio could not be acquired in time.
    LocalAudioFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// Local offer was sent over the relay.
    OfferSent,
    /// Answer to a remote offer was sent over the relay.
    AnswerSent,
    /// Data channel reported open.
    ChannelOpened,
    /// A negotiation step failed.
    NegotiationFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// Relay connection ended.
    RelayClosed {
        /// Reason for the closure.
        reason: String,
    },
    /// Application asked to close.
    CloseRequested,
}

/// Actions to be executed by pane-client.
///
/// These are instructions, not side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalingAction {
    /// Open the relay transport.
    OpenRelay,
    /// Send `connect{sessionid: target}` over the relay.
    SendConnect {
        /// Session to reach.
        target: SessionId,
    },
    /// Create the application data channel on the peer transport.
    CreateDataChannel,
    /// Start acquiring the local audio stream.
    AcquireLocalAudio,
    /// Add the acquired audio track to the peer transport.
    AttachLocalAudio,
    /// Create an offer, set it locally and send it over the relay.
    StartNegotiation,
    /// Close relay and peer transports.
    CloseTransports,
    /// Emit an event to the application.
    Emit(SessionEvent),
}

impl SignalingAction {
    /// True for the actions that end a session: closing transports and
    /// emitting `Failed` or `Closed`. Everything else is skipped once the
    /// session is no longer active.
    pub fn is_teardown(&self) -> bool {
        matches!(
            self,
            Self::CloseTransports
                | Self::Emit(SessionEvent::Failed { .. })
                | Self::Emit(SessionEvent::Closed)
        )
    }
}

/// Events emitted to the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The relay assigned a session id.
    SessionAssigned {
        /// Assigned session id.
        session_id: SessionId,
    },
    /// Audio could not be acquired; the session continues without it.
    AudioUnavailable {
        /// Error message describing the failure.
        error: String,
    },
    /// The data channel is open.
    ChannelOpen {
        /// Our session id.
        session_id: SessionId,
    },
    /// The remote side added a media track.
    RemoteTrack {
        /// Track identifier.
        track_id: String,
        /// Media kind (`audio` or `video`).
        kind: String,
    },
    /// The session failed. Terminal.
    Failed {
        /// Error message describing the failure.
        error: String,
    },
    /// The session was closed. Terminal.
    Closed,
}
