//! Signaling messages exchanged over the relay.
//!
//! Every frame is a JSON object whose `message` field names the kind:
//!
//! ```text
//! {"message":"connect","sessionid":"<target>"}
//! {"message":"greeting","sessionid":"<assigned>"}
//! {"message":"offer","sdp":{"type":"offer","sdp":"v=0..."}}
//! {"message":"answer","sdp":{...},"mySessionId":"..","targetSessionId":".."}
//! {"message":"icecandidate","candidate":{"candidate":"candidate:..","sdpMid":"0"}}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::decode_tagged;
use crate::{SessionId, WireError};

/// Discriminator field for relay frames.
const KIND_FIELD: &str = "message";

/// All possible relay messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "message", rename_all = "lowercase")]
pub enum RelayMessage {
    /// Ask the relay to open a session towards `sessionid`.
    Connect {
        /// Session the caller wants to reach.
        sessionid: SessionId,
    },
    /// Relay response carrying the session id assigned to this side.
    Greeting {
        /// Session id assigned by the relay.
        sessionid: SessionId,
    },
    /// SDP offer.
    Offer(Offer),
    /// SDP answer.
    Answer(Answer),
    /// Trickled ICE candidate.
    #[serde(rename = "icecandidate")]
    Candidate {
        /// The candidate as produced by the peer transport.
        candidate: IceCandidate,
    },
}

impl RelayMessage {
    /// Every `message` value this side understands.
    pub const KINDS: &'static [&'static str] =
        &["connect", "greeting", "offer", "answer", "icecandidate"];

    /// The wire name of this message.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayMessage::Connect { .. } => "connect",
            RelayMessage::Greeting { .. } => "greeting",
            RelayMessage::Offer(_) => "offer",
            RelayMessage::Answer(_) => "answer",
            RelayMessage::Candidate { .. } => "icecandidate",
        }
    }

    /// Serialize to a JSON text frame.
    pub fn to_json(&self) -> Result<String, WireError> {
        serde_json::to_string(self).map_err(WireError::Encode)
    }

    /// Decode a JSON text frame.
    pub fn from_json(text: &str) -> Result<Self, WireError> {
        let value: serde_json::Value = serde_json::from_str(text).map_err(WireError::Decode)?;
        decode_tagged(&value, KIND_FIELD, Self::KINDS)
    }
}

/// An SDP offer, optionally tagged with the sender's routing ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    /// The session description.
    pub sdp: SessionDescription,
    /// Session id of the offering side, when it chose to include it.
    #[serde(
        rename = "mySessionId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub my_session_id: Option<SessionId>,
    /// Session id the offer is addressed to, when included.
    #[serde(
        rename = "targetSessionId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub target_session_id: Option<SessionId>,
}

/// An SDP answer tagged with both routing ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    /// The session description.
    pub sdp: SessionDescription,
    /// Session id of the answering side.
    #[serde(rename = "mySessionId")]
    pub my_session_id: SessionId,
    /// Session id of the side that made the offer.
    #[serde(rename = "targetSessionId")]
    pub target_session_id: SessionId,
}

/// SDP description type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    /// An offer.
    Offer,
    /// A provisional answer.
    Pranswer,
    /// A final answer.
    Answer,
    /// Roll back to the last stable state.
    Rollback,
}

/// A session description as exchanged by peer transports.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    /// Offer, answer, ...
    #[serde(rename = "type")]
    pub kind: SdpKind,
    /// The SDP body.
    pub sdp: String,
}

impl SessionDescription {
    /// Create an offer description.
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    /// Create an answer description.
    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

impl std::fmt::Debug for SessionDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // SDP bodies carry ICE credentials and fingerprints
        f.debug_struct("SessionDescription")
            .field("kind", &self.kind)
            .field("sdp", &format!("[{} bytes]", self.sdp.len()))
            .finish()
    }
}

/// An ICE candidate in its JSON init form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    /// The candidate line.
    pub candidate: String,
    /// Media stream identification tag.
    #[serde(rename = "sdpMid", default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    /// Index of the media description.
    #[serde(
        rename = "sdpMLineIndex",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sdp_mline_index: Option<u16>,
    /// ICE username fragment.
    #[serde(
        rename = "usernameFragment",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    /// Create a candidate with only the candidate line set.
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_mline_index: None,
            username_fragment: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_uses_message_discriminator() {
        let msg = RelayMessage::Connect {
            sessionid: SessionId::new("target"),
        };
        let json: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(json["message"], "connect");
        assert_eq!(json["sessionid"], "target");
    }

    #[test]
    fn greeting_decodes() {
        let msg = RelayMessage::from_json(r#"{"message":"greeting","sessionid":"S1"}"#).unwrap();
        assert_eq!(
            msg,
            RelayMessage::Greeting {
                sessionid: SessionId::new("S1")
            }
        );
    }

    #[test]
    fn bare_offer_omits_routing_ids() {
        let msg = RelayMessage::Offer(Offer {
            sdp: SessionDescription::offer("v=0"),
            my_session_id: None,
            target_session_id: None,
        });
        let text = msg.to_json().unwrap();
        assert!(!text.contains("mySessionId"));
        assert!(text.contains(r#""type":"offer""#));
    }

    #[test]
    fn tagged_offer_decodes_routing_ids() {
        let text = r#"{"message":"offer","sdp":{"type":"offer","sdp":"v=0"},
                       "mySessionId":"H","targetSessionId":"S1"}"#;
        match RelayMessage::from_json(text).unwrap() {
            RelayMessage::Offer(offer) => {
                assert_eq!(offer.my_session_id, Some(SessionId::new("H")));
                assert_eq!(offer.target_session_id, Some(SessionId::new("S1")));
            }
            other => panic!("Expected Offer, got {:?}", other),
        }
    }

    #[test]
    fn answer_uses_camel_case_ids() {
        let msg = RelayMessage::Answer(Answer {
            sdp: SessionDescription::answer("v=0"),
            my_session_id: SessionId::new("S1"),
            target_session_id: SessionId::new("H"),
        });
        let json: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(json["message"], "answer");
        assert_eq!(json["mySessionId"], "S1");
        assert_eq!(json["targetSessionId"], "H");
        assert_eq!(json["sdp"]["type"], "answer");
    }

    #[test]
    fn candidate_wire_name() {
        let text = r#"{"message":"icecandidate","candidate":{"candidate":"candidate:1 1 udp 1 10.0.0.1 5000 typ host","sdpMid":"0","sdpMLineIndex":0}}"#;
        let msg = RelayMessage::from_json(text).unwrap();
        assert_eq!(msg.kind(), "icecandidate");
        match msg {
            RelayMessage::Candidate { candidate } => {
                assert_eq!(candidate.sdp_mid.as_deref(), Some("0"));
                assert_eq!(candidate.sdp_mline_index, Some(0));
            }
            other => panic!("Expected Candidate, got {:?}", other),
        }
    }

    // ===========================================
    // Decode Failure Tests
    // ===========================================

    #[test]
    fn unknown_kind_is_reported() {
        let err = RelayMessage::from_json(r#"{"message":"bye"}"#).unwrap_err();
        assert!(err.is_unknown_kind());
    }

    #[test]
    fn non_json_is_decode_error() {
        let err = RelayMessage::from_json("not json").unwrap_err();
        assert!(matches!(err, WireError::Decode(_)));
    }

    #[test]
    fn missing_discriminator() {
        let err = RelayMessage::from_json(r#"{"sessionid":"S1"}"#).unwrap_err();
        assert!(matches!(
            err,
            WireError::MissingDiscriminator { field: "message" }
        ));
    }

    #[test]
    fn known_kind_with_bad_fields() {
        let err = RelayMessage::from_json(r#"{"message":"greeting"}"#).unwrap_err();
        assert!(matches!(err, WireError::InvalidFields { ref kind, .. } if kind == "greeting"));
    }

    #[test]
    fn description_debug_hides_body() {
        let desc = SessionDescription::offer("a=ice-pwd:secret");
        let debug = format!("{:?}", desc);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("16 bytes"));
    }
}
