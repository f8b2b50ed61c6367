//! Error types for Panelink wire decoding.

use thiserror::Error;

/// Errors that can occur while encoding or decoding protocol frames.
#[derive(Debug, Error)]
pub enum WireError {
    /// The frame is not valid JSON (or not a JSON object).
    #[error("malformed frame: {0}")]
    Decode(#[source] serde_json::Error),

    /// The frame has no string discriminator field.
    #[error("frame has no `{field}` discriminator")]
    MissingDiscriminator {
        /// Name of the discriminator field (`message` or `type`).
        field: &'static str,
    },

    /// The discriminator names a message kind this side does not know.
    #[error("unknown `{field}` value: {kind}")]
    UnknownKind {
        /// Name of the discriminator field.
        field: &'static str,
        /// The unrecognized value.
        kind: String,
    },

    /// The kind is known but its fields do not match the schema.
    #[error("invalid `{kind}` frame: {source}")]
    InvalidFields {
        /// The message kind that failed to decode.
        kind: String,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },

    /// Serialization failed.
    #[error("encoding failed: {0}")]
    Encode(#[source] serde_json::Error),
}

impl WireError {
    /// True for frames that were well-formed but named an unknown kind.
    ///
    /// These are tolerated (logged and skipped) so that peers speaking a newer
    /// protocol revision do not tear down the session.
    pub fn is_unknown_kind(&self) -> bool {
        matches!(self, WireError::UnknownKind { .. })
    }
}

/// Decode `value` as `T` after checking that the discriminator `field` names
/// one of `known`.
pub(crate) fn decode_tagged<T: serde::de::DeserializeOwned>(
    value: &serde_json::Value,
    field: &'static str,
    known: &[&str],
) -> Result<T, WireError> {
    let kind = value
        .get(field)
        .and_then(serde_json::Value::as_str)
        .ok_or(WireError::MissingDiscriminator { field })?;

    if !known.contains(&kind) {
        return Err(WireError::UnknownKind {
            field,
            kind: kind.to_string(),
        });
    }

    T::deserialize(value).map_err(|source| WireError::InvalidFields {
        kind: kind.to_string(),
        source,
    })
}
