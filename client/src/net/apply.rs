//! Event applicator: merges one inbound live message into the view.
//!
//! Every rule is a field-level merge keyed by stable entity id — never a
//! whole-object replace, never an array-position lookup — so a partial
//! broadcast about one field cannot clobber a concurrent local edit of
//! another, and messages about ids we do not hold are clean no-ops.

#[cfg(test)]
#[path = "apply_test.rs"]
mod apply_test;

use envelope::{Envelope, kind};
use serde_json::Value;

use crate::state::CommunityView;
use crate::state::community::merge_community;
use crate::state::events::{CommunityEvent, find_event_mut, merge_event_details};
use crate::state::members::{connection_from_value, find_member_mut, merge_member, role_from_value};
use crate::state::posts::{Comment, Post, find_post_mut, merge_post, prepend_post, remove_post};

/// Apply one inbound message to the view.
///
/// Unrecognized kinds and malformed payloads are logged and ignored; the
/// applicator never fails.
pub fn apply_event(view: &mut CommunityView, envelope: &Envelope) {
    match envelope.kind.as_str() {
        kind::COMMUNITY_UPDATED | kind::SETTINGS_UPDATED => {
            merge_community(&mut view.community, &envelope.data);
        }
        kind::MEMBER_UPDATED => apply_member_updated(view, &envelope.data),
        kind::ROLE_UPDATED => apply_role_updated(view, &envelope.data),
        kind::CONNECTION_UPDATED => apply_connection_updated(view, &envelope.data),
        kind::EVENT_UPDATED => apply_event_updated(view, envelope),
        kind::POST_UPDATED => apply_post_updated(view, envelope),
        kind::COMMENT_UPDATED => apply_comment_updated(view, envelope),
        other => {
            tracing::warn!(kind = other, "ignoring unrecognized live message");
        }
    }
}

fn payload_id(data: &Value, key: &str) -> Option<u64> {
    data.get(key).and_then(Value::as_u64)
}

fn apply_member_updated(view: &mut CommunityView, data: &Value) {
    let Some(id) = payload_id(data, "id") else {
        return;
    };
    if let Some(member) = find_member_mut(&mut view.members, id) {
        merge_member(member, data);
    }
}

fn apply_role_updated(view: &mut CommunityView, data: &Value) {
    let Some(id) = payload_id(data, "id") else {
        return;
    };
    if let Some(member) = find_member_mut(&mut view.members, id)
        && let Some(role) = data.get("role").and_then(role_from_value)
    {
        member.role = role;
    }
}

fn apply_connection_updated(view: &mut CommunityView, data: &Value) {
    let Some(id) = payload_id(data, "id") else {
        return;
    };
    if let Some(member) = find_member_mut(&mut view.members, id) {
        if let Some(connection) = data.get("connection").and_then(connection_from_value) {
            member.connection = connection;
        }
        if let Some(request_id) = data.get("request_id") {
            member.request_id = request_id.as_str().map(str::to_owned);
        }
    }
}

fn apply_event_updated(view: &mut CommunityView, envelope: &Envelope) {
    let data = &envelope.data;
    match envelope.action() {
        Some("create") => {
            if let Ok(mut event) = serde_json::from_value::<CommunityEvent>(data.clone()) {
                // The creator is the first participant.
                event.participants = 1;
                view.events.push(event);
            }
        }
        Some("update") => {
            if let Some(id) = payload_id(data, "id")
                && let Some(event) = find_event_mut(&mut view.events, id)
            {
                merge_event_details(event, data);
            }
        }
        Some("participant_join") => {
            if let Some(id) = payload_id(data, "id")
                && let Some(event) = find_event_mut(&mut view.events, id)
            {
                event.participants = event.participants.saturating_add(1);
            }
        }
        Some("participant_leave") => {
            if let Some(id) = payload_id(data, "id")
                && let Some(event) = find_event_mut(&mut view.events, id)
            {
                event.participants = event.participants.saturating_sub(1);
            }
        }
        action => {
            tracing::warn!(?action, "ignoring event message with unknown action");
        }
    }
}

fn apply_post_updated(view: &mut CommunityView, envelope: &Envelope) {
    let data = &envelope.data;
    match envelope.action() {
        Some("create") => {
            if let Ok(post) = serde_json::from_value::<Post>(data.clone()) {
                prepend_post(&mut view.posts, post);
            }
        }
        Some("update") => {
            if let Some(id) = payload_id(data, "id")
                && let Some(post) = find_post_mut(&mut view.posts, id)
            {
                merge_post(post, data);
            }
        }
        Some("delete") => {
            if let Some(id) = payload_id(data, "id") {
                remove_post(&mut view.posts, id);
            }
        }
        action => {
            tracing::warn!(?action, "ignoring post message with unknown action");
        }
    }
}

fn apply_comment_updated(view: &mut CommunityView, envelope: &Envelope) {
    let data = &envelope.data;
    match envelope.action() {
        Some("create") => {
            if let Ok(comment) = serde_json::from_value::<Comment>(data.clone())
                && let Some(post) = find_post_mut(&mut view.posts, comment.post_id)
            {
                post.comment_count = post.comment_count.saturating_add(1);
                if comment.is_top {
                    post.top_comment = Some(comment);
                }
            }
        }
        Some("update") => {
            if let Ok(comment) = serde_json::from_value::<Comment>(data.clone())
                && let Some(post) = find_post_mut(&mut view.posts, comment.post_id)
            {
                post.top_comment = Some(comment);
            }
        }
        Some("delete") => {
            if let Some(post_id) = payload_id(data, "post_id")
                && let Some(post) = find_post_mut(&mut view.posts, post_id)
            {
                post.comment_count = post.comment_count.saturating_sub(1);
                let deleted_id = payload_id(data, "id");
                if post.top_comment.as_ref().map(|comment| comment.id) == deleted_id {
                    post.top_comment = None;
                }
            }
        }
        action => {
            tracing::warn!(?action, "ignoring comment message with unknown action");
        }
    }
}
