//! Shared message envelope and JSON codec for the community live connection.
//!
//! This crate owns the wire representation used by the `client` library and
//! the `cli` driver. It intentionally keeps message payloads flexible
//! (`serde_json::Value`) while the envelope itself is strict: a `type`
//! discriminator plus an object payload.
//!
//! Inbound messages carry one of the [`kind`] constants; the single
//! client-to-server message is built by [`subscribe_community`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Error returned by [`decode_envelope`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The raw text could not be parsed as an envelope.
    #[error("failed to parse envelope JSON: {0}")]
    Parse(#[from] serde_json::Error),
    /// The `data` field is present but is not a JSON object.
    #[error("envelope data must be a JSON object, got {0}")]
    NonObjectData(&'static str),
}

/// Well-known message discriminators on the live wire.
///
/// Server-to-client kinds mirror the entity collections they patch; the
/// per-kind merge rules live with the client's event applicator.
pub mod kind {
    /// Field patch for the community's descriptive and aggregate data.
    pub const COMMUNITY_UPDATED: &str = "community_updated";
    /// Field patch for the community's settings; merged the same way.
    pub const SETTINGS_UPDATED: &str = "settings_updated";
    /// Field patch for one member, keyed by `id`.
    pub const MEMBER_UPDATED: &str = "member_updated";
    /// Role replacement for one member, keyed by `id`.
    pub const ROLE_UPDATED: &str = "role_updated";
    /// Connection-request status replacement for one member, keyed by `id`.
    pub const CONNECTION_UPDATED: &str = "connection_updated";
    /// Event lifecycle message; `data.action` selects the merge rule.
    pub const EVENT_UPDATED: &str = "event_updated";
    /// Post lifecycle message; `data.action` selects the merge rule.
    pub const POST_UPDATED: &str = "post_updated";
    /// Comment lifecycle message; `data.action` selects the merge rule.
    pub const COMMENT_UPDATED: &str = "comment_updated";
    /// Client-to-server subscription intent, sent once per open connection.
    pub const SUBSCRIBE_COMMUNITY: &str = "subscribe_community";
}

/// A single message on the live-connection wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Message discriminator, e.g. `"post_updated"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Object payload; interpretation is per-kind.
    #[serde(default = "empty_object")]
    pub data: Value,
}

impl Envelope {
    /// The payload's `action` discriminator, for lifecycle kinds that carry
    /// one (`event_updated`, `post_updated`, `comment_updated`).
    #[must_use]
    pub fn action(&self) -> Option<&str> {
        self.data.get("action").and_then(Value::as_str)
    }
}

/// Build the subscription intent for one community context.
#[must_use]
pub fn subscribe_community(slug: &str) -> Envelope {
    Envelope {
        kind: kind::SUBSCRIBE_COMMUNITY.to_owned(),
        data: serde_json::json!({ "slug": slug }),
    }
}

/// Encode an envelope into its wire text.
#[must_use]
pub fn encode_envelope(envelope: &Envelope) -> String {
    // Serializing a String discriminator plus a JSON value cannot fail.
    serde_json::to_string(envelope).unwrap_or_default()
}

/// Decode wire text into an envelope.
///
/// # Errors
///
/// Returns [`CodecError::Parse`] for malformed JSON and
/// [`CodecError::NonObjectData`] when the payload is not an object.
pub fn decode_envelope(text: &str) -> Result<Envelope, CodecError> {
    let envelope = serde_json::from_str::<Envelope>(text)?;
    if !envelope.data.is_object() {
        return Err(CodecError::NonObjectData(json_type_name(&envelope.data)));
    }
    Ok(envelope)
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
