//! # pane-types
//!
//! Wire format types for the Panelink signaling and editor-sync protocol.
//!
//! Two message families travel over two different pipes:
//! - [`RelayMessage`] - JSON frames on the signaling relay, discriminated by
//!   the `message` field (connect, greeting, offer, answer, icecandidate)
//! - [`ChannelMessage`] - JSON frames on the negotiated data channel,
//!   discriminated by the `type` field (editor commands and file chunks)
//!
//! Decoding never panics on foreign input. Unknown discriminators are reported
//! as [`WireError::UnknownKind`] so callers can skip them, while malformed
//! frames are reported as [`WireError::Decode`].

#![warn(missing_docs)]
#![warn(clippy::all)]

mod channel;
mod error;
mod ids;
mod relay;

pub use channel::{ChannelMessage, EditorImage, FileChunk};
pub use error::WireError;
pub use ids::SessionId;
pub use relay::{Answer, IceCandidate, Offer, RelayMessage, SdpKind, SessionDescription};
