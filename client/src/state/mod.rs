//! Per-community state model and merge rules.
//!
//! SYSTEM CONTEXT
//! ==============
//! [`CommunityView`] is the one explicit state container per community
//! context: everything the UI reads lives here, everything inbound from the
//! live connection or a mutation reconciliation is merged into it. Entity
//! modules own their types and field-level merge functions; merges update
//! only the fields present in a payload so concurrent optimistic edits on
//! unrelated fields survive a partial broadcast.


pub mod community;
pub mod events;
pub mod members;
pub mod posts;

use serde_json::Value;

use self::community::CommunityState;
use self::events::CommunityEvent;
use self::members::Member;
use self::posts::Post;

/// Live-connection lifecycle state, surfaced on the view.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LinkStatus {
    /// No connection attempt has been made for this context.
    #[default]
    Idle,
    /// A connection attempt is in flight.
    Connecting,
    /// The connection is open and subscribed.
    Open,
    /// The connection is closed; the reason decides whether reconnects fire.
    Closed(CloseReason),
}

impl LinkStatus {
    /// Whether live updates are currently flowing.
    #[must_use]
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Open)
    }
}

/// Why a live connection is closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// The consumer left the community context; no reconnect.
    Intentional,
    /// The connection dropped; a reconnect is pending or in progress.
    Error,
    /// No credential was configured; fatal to the link, no retries.
    MissingCredentials,
    /// The reconnect attempt cap was reached; no further automatic retries.
    RetriesExhausted,
}

/// All client-side state for one community context.
///
/// Created empty when a context opens, filled by the initial full-list
/// fetch, patched incrementally by inbound live messages and mutation
/// reconciliations, and discarded when the context closes.
#[derive(Clone, Debug, Default)]
pub struct CommunityView {
    /// Identifying slug scoping this context.
    pub slug: String,
    /// The viewing user's id.
    pub viewer_id: u64,
    /// Community metadata and aggregate counters.
    pub community: CommunityState,
    /// Member list; exactly one entry per user id.
    pub members: Vec<Member>,
    /// Post feed, newest first.
    pub posts: Vec<Post>,
    /// Scheduled community events.
    pub events: Vec<CommunityEvent>,
    /// Live-connection status.
    pub link: LinkStatus,
    /// Set when a stale-reference failure demands a reconciliation fetch.
    pub needs_refresh: bool,
    /// Most recent surfaced error, if any.
    pub last_error: Option<String>,
}

impl CommunityView {
    /// Fresh view for a newly opened context.
    #[must_use]
    pub fn new(slug: &str, viewer_id: u64) -> Self {
        Self {
            slug: slug.to_owned(),
            viewer_id,
            ..Self::default()
        }
    }
}

pub(crate) fn value_as_u32(value: &Value) -> Option<u32> {
    value.as_u64().and_then(|raw| u32::try_from(raw).map_or_else(|_| None, Some))
}

pub(crate) fn value_as_u8(value: &Value) -> Option<u8> {
    value.as_u64().and_then(|raw| u8::try_from(raw).map_or_else(|_| None, Some))
}

pub(crate) fn string_list(value: &Value) -> Option<Vec<String>> {
    value.as_array().map(|items| {
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_owned)
            .collect()
    })
}
