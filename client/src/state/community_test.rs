use super::*;

fn community() -> CommunityState {
    CommunityState {
        slug: "rustaceans".to_owned(),
        name: "Rustaceans".to_owned(),
        description: "Systems talk".to_owned(),
        topics: vec!["rust".to_owned()],
        rules: vec!["be kind".to_owned()],
        is_private: false,
        member_count: 12,
        online_count: 3,
        posts_today: 2,
        avg_rating: 4.1,
    }
}

#[test]
fn merge_updates_only_present_fields() {
    let mut state = community();
    merge_community(
        &mut state,
        &serde_json::json!({ "name": "Rustaceans!", "online_count": 5 }),
    );
    assert_eq!(state.name, "Rustaceans!");
    assert_eq!(state.online_count, 5);
    // Everything else is untouched.
    assert_eq!(state.description, "Systems talk");
    assert_eq!(state.member_count, 12);
    assert_eq!(state.posts_today, 2);
}

#[test]
fn merge_never_touches_slug() {
    let mut state = community();
    merge_community(&mut state, &serde_json::json!({ "slug": "hijacked" }));
    assert_eq!(state.slug, "rustaceans");
}

#[test]
fn merge_replaces_list_fields_wholesale() {
    let mut state = community();
    merge_community(
        &mut state,
        &serde_json::json!({ "topics": ["rust", "async"], "rules": [] }),
    );
    assert_eq!(state.topics, vec!["rust".to_owned(), "async".to_owned()]);
    assert!(state.rules.is_empty());
}

#[test]
fn merge_ignores_wrongly_typed_fields() {
    let mut state = community();
    merge_community(
        &mut state,
        &serde_json::json!({ "member_count": "many", "is_private": 1 }),
    );
    assert_eq!(state.member_count, 12);
    assert!(!state.is_private);
}

#[test]
fn merge_accepts_privacy_and_rating() {
    let mut state = community();
    merge_community(
        &mut state,
        &serde_json::json!({ "is_private": true, "avg_rating": 4.6 }),
    );
    assert!(state.is_private);
    assert!((state.avg_rating - 4.6).abs() < f64::EPSILON);
}
