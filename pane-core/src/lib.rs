//! # pane-core
//!
//! Pure logic for Panelink (no I/O, instant tests).
//!
//! This crate implements the editor model, the chunk reassembler and the
//! signaling state machine without any network access, enabling fast unit
//! tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects:
//! - [`SignalingState::on_event`] returns the next state plus the
//!   [`SignalingAction`]s the client must perform
//! - [`EditorRegistry`] mutations return the [`EditorChange`]s they caused, so
//!   the caller decides when to broadcast them
//! - [`FileChunkReassembler::receive`] returns the assembled payload instead of
//!   dispatching it
//!
//! The actual I/O (relay, peer transport, host callbacks) is performed by
//! `pane-client`, which interprets these outputs.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod content;
pub mod editor;
pub mod reassembly;
pub mod registry;
pub mod signaling;

pub use content::{EditorContent, TextRun};
pub use editor::{Editor, EditorError, EditorEvent, EditorSnapshot};
pub use reassembly::{FileChunkReassembler, ReassemblyError, DEFAULT_MAX_PENDING_TRANSFERS};
pub use registry::{ChangeKind, EditorChange, EditorRegistry};
pub use signaling::{SessionEvent, SignalingAction, SignalingEvent, SignalingState};
