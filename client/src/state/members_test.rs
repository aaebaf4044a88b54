use super::*;

fn member(id: u64, role: Role) -> Member {
    Member {
        id,
        username: format!("user-{id}"),
        display_name: format!("User {id}"),
        role,
        online: false,
        contributions: 0,
        badges: Vec::new(),
        connection: ConnectionState::Connect,
        request_id: None,
    }
}

fn roster() -> Vec<Member> {
    vec![member(1, Role::Admin), member(2, Role::Member)]
}

// =============================================================
// merge_member
// =============================================================

#[test]
fn merge_updates_only_present_fields() {
    let mut target = member(2, Role::Member);
    merge_member(
        &mut target,
        &serde_json::json!({ "online": true, "contributions": 9 }),
    );
    assert!(target.online);
    assert_eq!(target.contributions, 9);
    assert_eq!(target.role, Role::Member);
    assert_eq!(target.username, "user-2");
}

#[test]
fn merge_parses_role_and_connection_labels() {
    let mut target = member(2, Role::Member);
    merge_member(
        &mut target,
        &serde_json::json!({ "role": "moderator", "connection": "pending" }),
    );
    assert_eq!(target.role, Role::Moderator);
    assert_eq!(target.connection, ConnectionState::Pending);
}

#[test]
fn merge_ignores_unknown_role_label() {
    let mut target = member(2, Role::Moderator);
    merge_member(&mut target, &serde_json::json!({ "role": "supreme" }));
    assert_eq!(target.role, Role::Moderator);
}

#[test]
fn merge_clears_request_id_on_explicit_null() {
    let mut target = member(2, Role::Member);
    target.request_id = Some("req-1".to_owned());
    merge_member(&mut target, &serde_json::json!({ "request_id": null }));
    assert_eq!(target.request_id, None);

    merge_member(&mut target, &serde_json::json!({ "request_id": "req-2" }));
    assert_eq!(target.request_id, Some("req-2".to_owned()));
}

// =============================================================
// list helpers
// =============================================================

#[test]
fn upsert_replaces_existing_entry_by_id() {
    let mut members = roster();
    let mut replacement = member(2, Role::Moderator);
    replacement.online = true;
    upsert_member(&mut members, replacement);
    assert_eq!(members.len(), 2);
    let updated = find_member(&members, 2).expect("member 2");
    assert_eq!(updated.role, Role::Moderator);
    assert!(updated.online);
}

#[test]
fn upsert_appends_new_entry() {
    let mut members = roster();
    upsert_member(&mut members, member(3, Role::Member));
    assert_eq!(members.len(), 3);
}

#[test]
fn admin_count_counts_admins_only() {
    assert_eq!(admin_count(&roster()), 1);
    assert_eq!(
        admin_count(&[member(1, Role::Admin), member(2, Role::Admin)]),
        2
    );
    assert_eq!(admin_count(&[]), 0);
}

// =============================================================
// authority checks
// =============================================================

#[test]
fn admin_may_change_another_members_role() {
    assert_eq!(check_role_change(&roster(), 1, 2), Ok(()));
}

#[test]
fn role_change_on_self_is_rejected() {
    assert_eq!(check_role_change(&roster(), 1, 1), Err(AuthorityError::ActingOnSelf));
}

#[test]
fn role_change_by_non_admin_is_rejected() {
    assert_eq!(check_role_change(&roster(), 2, 1), Err(AuthorityError::NotAdmin));
}

#[test]
fn role_change_by_unknown_actor_is_rejected() {
    assert_eq!(check_role_change(&roster(), 99, 2), Err(AuthorityError::NotAdmin));
}

#[test]
fn role_change_on_unknown_target_is_rejected() {
    assert_eq!(
        check_role_change(&roster(), 1, 99),
        Err(AuthorityError::UnknownMember(99))
    );
}

#[test]
fn demoting_an_admin_is_fine_while_another_remains() {
    let members = vec![member(1, Role::Admin), member(2, Role::Admin), member(3, Role::Member)];
    assert_eq!(check_role_change(&members, 1, 2), Ok(()));
    assert_eq!(check_member_removal(&members, 1, 2), Ok(()));
}

#[test]
fn last_admin_cannot_be_demoted_or_removed_by_anyone() {
    let members = roster();
    // The sole admin is member 1: member 2 lacks authority, and member 1
    // acting on itself is the (blocked) self path.
    assert_eq!(check_role_change(&members, 2, 1), Err(AuthorityError::NotAdmin));
    assert_eq!(check_role_change(&members, 1, 1), Err(AuthorityError::ActingOnSelf));
    assert_eq!(check_member_removal(&members, 2, 1), Err(AuthorityError::NotAdmin));
    assert_eq!(check_member_removal(&members, 1, 1), Err(AuthorityError::ActingOnSelf));
}

#[test]
fn sole_admin_cannot_leave() {
    assert_eq!(check_leave(&roster(), 1), Err(AuthorityError::LastAdmin));
}

#[test]
fn admin_can_leave_when_another_admin_remains() {
    let members = vec![member(1, Role::Admin), member(2, Role::Admin)];
    assert_eq!(check_leave(&members, 1), Ok(()));
}

#[test]
fn plain_member_can_leave() {
    assert_eq!(check_leave(&roster(), 2), Ok(()));
}

#[test]
fn non_member_cannot_leave() {
    assert_eq!(check_leave(&roster(), 99), Err(AuthorityError::UnknownMember(99)));
}
