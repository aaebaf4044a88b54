use super::*;
use envelope::Envelope;
use serde_json::{Value, json};

use crate::state::events::EventKind;
use crate::state::members::{ConnectionState, Role};
use crate::state::posts::{AuthorSnapshot, apply_optimistic_rating};

fn envelope(kind: &str, data: Value) -> Envelope {
    Envelope {
        kind: kind.to_owned(),
        data,
    }
}

fn seeded_view() -> CommunityView {
    let mut view = CommunityView::new("rustaceans", 1);
    view.community.name = "Rustaceans".to_owned();
    view.community.member_count = 2;
    view.members = vec![
        crate::state::members::Member {
            id: 1,
            username: "ada".to_owned(),
            display_name: "Ada".to_owned(),
            role: Role::Admin,
            online: true,
            contributions: 10,
            badges: Vec::new(),
            connection: ConnectionState::Connect,
            request_id: None,
        },
        crate::state::members::Member {
            id: 2,
            username: "grace".to_owned(),
            display_name: "Grace".to_owned(),
            role: Role::Member,
            online: false,
            contributions: 3,
            badges: Vec::new(),
            connection: ConnectionState::Connect,
            request_id: None,
        },
    ];
    view.posts = vec![Post {
        id: 42,
        title: "Hello".to_owned(),
        content: "first".to_owned(),
        author: AuthorSnapshot::default(),
        rating: 4.0,
        total_ratings: 10,
        user_rating: 0,
        comment_count: 0,
        media: Vec::new(),
        top_comment: None,
    }];
    view.events = vec![CommunityEvent {
        id: 7,
        title: "Weekly".to_owned(),
        description: "sync".to_owned(),
        kind: EventKind::Discussion,
        starts_at: None,
        participants: 0,
    }];
    view
}

// =============================================================
// community / settings
// =============================================================

#[test]
fn community_updated_merges_fields() {
    let mut view = seeded_view();
    apply_event(
        &mut view,
        &envelope("community_updated", json!({ "online_count": 9 })),
    );
    assert_eq!(view.community.online_count, 9);
    assert_eq!(view.community.name, "Rustaceans");
}

#[test]
fn settings_updated_uses_the_same_merge() {
    let mut view = seeded_view();
    apply_event(
        &mut view,
        &envelope("settings_updated", json!({ "is_private": true })),
    );
    assert!(view.community.is_private);
}

// =============================================================
// members
// =============================================================

#[test]
fn member_updated_merges_by_id() {
    let mut view = seeded_view();
    apply_event(
        &mut view,
        &envelope("member_updated", json!({ "id": 2, "online": true })),
    );
    assert!(view.members[1].online);
    assert_eq!(view.members[1].contributions, 3);
}

#[test]
fn member_messages_for_unknown_ids_are_no_ops() {
    let mut view = seeded_view();
    let before = view.members.clone();
    apply_event(
        &mut view,
        &envelope("member_updated", json!({ "id": 99, "online": true })),
    );
    apply_event(
        &mut view,
        &envelope("role_updated", json!({ "id": 99, "role": "admin" })),
    );
    apply_event(
        &mut view,
        &envelope("connection_updated", json!({ "id": 99, "connection": "pending" })),
    );
    assert_eq!(view.members, before);
}

#[test]
fn role_updated_replaces_role_only() {
    let mut view = seeded_view();
    apply_event(
        &mut view,
        &envelope("role_updated", json!({ "id": 2, "role": "moderator", "online": true })),
    );
    assert_eq!(view.members[1].role, Role::Moderator);
    // Other fields in the payload are not part of a role update.
    assert!(!view.members[1].online);
}

#[test]
fn connection_updated_replaces_status_and_request_id_only() {
    let mut view = seeded_view();
    apply_event(
        &mut view,
        &envelope(
            "connection_updated",
            json!({ "id": 2, "connection": "pending", "request_id": "req-7", "online": true }),
        ),
    );
    assert_eq!(view.members[1].connection, ConnectionState::Pending);
    assert_eq!(view.members[1].request_id, Some("req-7".to_owned()));
    assert!(!view.members[1].online);
}

// =============================================================
// events
// =============================================================

#[test]
fn event_create_appends_with_one_participant() {
    let mut view = seeded_view();
    apply_event(
        &mut view,
        &envelope(
            "event_updated",
            json!({ "action": "create", "id": 8, "title": "AMA", "kind": "ama", "participants": 50 }),
        ),
    );
    assert_eq!(view.events.len(), 2);
    let created = view.events.last().expect("created event");
    assert_eq!(created.id, 8);
    assert_eq!(created.kind, EventKind::Ama);
    // The creator is the only participant, whatever the payload claims.
    assert_eq!(created.participants, 1);
}

#[test]
fn event_update_merges_details_not_participants() {
    let mut view = seeded_view();
    view.events[0].participants = 5;
    apply_event(
        &mut view,
        &envelope(
            "event_updated",
            json!({ "action": "update", "id": 7, "title": "Monthly", "participants": 99 }),
        ),
    );
    assert_eq!(view.events[0].title, "Monthly");
    assert_eq!(view.events[0].participants, 5);
}

#[test]
fn participant_join_increments() {
    let mut view = seeded_view();
    apply_event(
        &mut view,
        &envelope("event_updated", json!({ "action": "participant_join", "id": 7 })),
    );
    assert_eq!(view.events[0].participants, 1);
}

#[test]
fn participant_leave_is_floored_at_zero() {
    let mut view = seeded_view();
    assert_eq!(view.events[0].participants, 0);
    apply_event(
        &mut view,
        &envelope("event_updated", json!({ "action": "participant_leave", "id": 7 })),
    );
    assert_eq!(view.events[0].participants, 0);
}

#[test]
fn event_messages_for_unknown_ids_are_no_ops() {
    let mut view = seeded_view();
    let before = view.events.clone();
    apply_event(
        &mut view,
        &envelope("event_updated", json!({ "action": "participant_join", "id": 99 })),
    );
    apply_event(
        &mut view,
        &envelope("event_updated", json!({ "action": "update", "id": 99, "title": "X" })),
    );
    assert_eq!(view.events, before);
}

// =============================================================
// posts
// =============================================================

#[test]
fn post_create_prepends() {
    let mut view = seeded_view();
    apply_event(
        &mut view,
        &envelope(
            "post_updated",
            json!({ "action": "create", "id": 43, "title": "Newest", "author": { "name": "Grace" } }),
        ),
    );
    assert_eq!(view.posts.len(), 2);
    assert_eq!(view.posts[0].id, 43);
    assert_eq!(view.posts[0].author.name, "Grace");
}

#[test]
fn post_update_merges_fields() {
    let mut view = seeded_view();
    apply_event(
        &mut view,
        &envelope("post_updated", json!({ "action": "update", "id": 42, "title": "Hello again" })),
    );
    assert_eq!(view.posts[0].title, "Hello again");
    assert_eq!(view.posts[0].content, "first");
}

#[test]
fn post_update_does_not_clobber_pending_optimistic_rating() {
    let mut view = seeded_view();
    apply_optimistic_rating(&mut view.posts[0], 5);
    let pending_rating = view.posts[0].rating;
    apply_event(
        &mut view,
        &envelope("post_updated", json!({ "action": "update", "id": 42, "title": "Edited" })),
    );
    assert_eq!(view.posts[0].user_rating, 5);
    assert!((view.posts[0].rating - pending_rating).abs() < f64::EPSILON);
}

#[test]
fn post_delete_removes_by_id() {
    let mut view = seeded_view();
    apply_event(
        &mut view,
        &envelope("post_updated", json!({ "action": "delete", "id": 42 })),
    );
    assert!(view.posts.is_empty());
}

#[test]
fn post_delete_wins_over_a_pending_rating() {
    let mut view = seeded_view();
    // Mid-flight optimistic rating on post 42.
    apply_optimistic_rating(&mut view.posts[0], 5);
    apply_event(
        &mut view,
        &envelope("post_updated", json!({ "action": "delete", "id": 42 })),
    );
    assert!(view.posts.is_empty());
}

// =============================================================
// comments
// =============================================================

#[test]
fn comment_create_bumps_count_and_caches_top() {
    let mut view = seeded_view();
    apply_event(
        &mut view,
        &envelope(
            "comment_updated",
            json!({ "action": "create", "id": 5, "post_id": 42, "content": "nice", "is_top": true }),
        ),
    );
    assert_eq!(view.posts[0].comment_count, 1);
    assert_eq!(view.posts[0].top_comment.as_ref().map(|c| c.id), Some(5));
}

#[test]
fn comment_create_without_top_flag_leaves_cache_alone() {
    let mut view = seeded_view();
    apply_event(
        &mut view,
        &envelope(
            "comment_updated",
            json!({ "action": "create", "id": 5, "post_id": 42, "content": "meh" }),
        ),
    );
    assert_eq!(view.posts[0].comment_count, 1);
    assert!(view.posts[0].top_comment.is_none());
}

#[test]
fn comment_update_replaces_cached_top_only() {
    let mut view = seeded_view();
    view.posts[0].comment_count = 3;
    apply_event(
        &mut view,
        &envelope(
            "comment_updated",
            json!({ "action": "update", "id": 6, "post_id": 42, "content": "better", "is_top": true }),
        ),
    );
    assert_eq!(view.posts[0].top_comment.as_ref().map(|c| c.id), Some(6));
    assert_eq!(view.posts[0].comment_count, 3);
}

#[test]
fn comment_delete_is_floored_at_zero() {
    let mut view = seeded_view();
    assert_eq!(view.posts[0].comment_count, 0);
    apply_event(
        &mut view,
        &envelope("comment_updated", json!({ "action": "delete", "id": 5, "post_id": 42 })),
    );
    assert_eq!(view.posts[0].comment_count, 0);
}

#[test]
fn comment_delete_clears_matching_top_comment() {
    let mut view = seeded_view();
    view.posts[0].comment_count = 2;
    apply_event(
        &mut view,
        &envelope(
            "comment_updated",
            json!({ "action": "create", "id": 5, "post_id": 42, "is_top": true }),
        ),
    );
    apply_event(
        &mut view,
        &envelope("comment_updated", json!({ "action": "delete", "id": 5, "post_id": 42 })),
    );
    assert!(view.posts[0].top_comment.is_none());
    assert_eq!(view.posts[0].comment_count, 2);
}

#[test]
fn comment_messages_for_unknown_posts_are_no_ops() {
    let mut view = seeded_view();
    let before = view.posts.clone();
    apply_event(
        &mut view,
        &envelope("comment_updated", json!({ "action": "create", "id": 5, "post_id": 99 })),
    );
    assert_eq!(view.posts, before);
}

// =============================================================
// unrecognized
// =============================================================

#[test]
fn unrecognized_kinds_change_nothing() {
    let mut view = seeded_view();
    let before = view.clone();
    apply_event(&mut view, &envelope("glitter_updated", json!({ "id": 1 })));
    assert_eq!(view.members, before.members);
    assert_eq!(view.posts, before.posts);
    assert_eq!(view.events, before.events);
    assert_eq!(view.community, before.community);
}

#[test]
fn known_kinds_with_unknown_actions_change_nothing() {
    let mut view = seeded_view();
    let before = view.posts.clone();
    apply_event(
        &mut view,
        &envelope("post_updated", json!({ "action": "sparkle", "id": 42 })),
    );
    assert_eq!(view.posts, before);
}
