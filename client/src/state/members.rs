//! Member model, merge rules, and local authority checks.

#[cfg(test)]
#[path = "members_test.rs"]
mod members_test;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{string_list, value_as_u32};

/// Membership role within a community.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full control, including roles and membership.
    Admin,
    /// Content moderation privileges.
    Moderator,
    /// Ordinary member.
    #[default]
    Member,
}

/// Connection-request status between the viewing user and a member.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No request either way; one may be sent.
    #[default]
    Connect,
    /// A request from the viewer is awaiting an answer.
    Pending,
    /// The viewer and this member are connected.
    Connected,
}

/// One member of the active community.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Member {
    /// Stable user id; the member list holds exactly one entry per id.
    pub id: u64,
    /// Login handle.
    pub username: String,
    /// Display name shown in member lists.
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub online: bool,
    /// Contribution counter maintained by the server.
    #[serde(default)]
    pub contributions: u32,
    #[serde(default)]
    pub badges: Vec<String>,
    /// Connection-request status relative to the viewing user.
    #[serde(default)]
    pub connection: ConnectionState,
    /// Server-assigned id of the outstanding connection request, if any.
    #[serde(default)]
    pub request_id: Option<String>,
}

/// Local authority failures, raised before any network call.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AuthorityError {
    #[error("only an admin may perform this action")]
    NotAdmin,
    #[error("cannot perform this action on yourself")]
    ActingOnSelf,
    #[error("the last admin cannot be demoted or removed")]
    LastAdmin,
    #[error("member {0} is not in this community")]
    UnknownMember(u64),
}

/// Shallow-merge payload fields into an existing member.
pub fn merge_member(member: &mut Member, data: &Value) {
    if let Some(username) = data.get("username").and_then(Value::as_str) {
        member.username = username.to_owned();
    }
    if let Some(display_name) = data.get("display_name").and_then(Value::as_str) {
        member.display_name = display_name.to_owned();
    }
    if let Some(role) = data.get("role").and_then(role_from_value) {
        member.role = role;
    }
    if let Some(online) = data.get("online").and_then(Value::as_bool) {
        member.online = online;
    }
    if let Some(contributions) = data.get("contributions").and_then(value_as_u32) {
        member.contributions = contributions;
    }
    if let Some(badges) = data.get("badges").and_then(string_list) {
        member.badges = badges;
    }
    if let Some(connection) = data.get("connection").and_then(connection_from_value) {
        member.connection = connection;
    }
    if let Some(request_id) = data.get("request_id") {
        member.request_id = request_id.as_str().map(str::to_owned);
    }
}

pub(crate) fn role_from_value(value: &Value) -> Option<Role> {
    serde_json::from_value(value.clone()).map_or_else(|_| None, Some)
}

pub(crate) fn connection_from_value(value: &Value) -> Option<ConnectionState> {
    serde_json::from_value(value.clone()).map_or_else(|_| None, Some)
}

/// Find a member by id.
#[must_use]
pub fn find_member(members: &[Member], id: u64) -> Option<&Member> {
    members.iter().find(|member| member.id == id)
}

/// Find a member by id, mutably.
pub fn find_member_mut(members: &mut [Member], id: u64) -> Option<&mut Member> {
    members.iter_mut().find(|member| member.id == id)
}

/// Insert or replace a member, keyed by id.
pub fn upsert_member(members: &mut Vec<Member>, member: Member) {
    if let Some(existing) = find_member_mut(members, member.id) {
        *existing = member;
    } else {
        members.push(member);
    }
}

/// Number of admins in the member list.
#[must_use]
pub fn admin_count(members: &[Member]) -> usize {
    members
        .iter()
        .filter(|member| member.role == Role::Admin)
        .count()
}

/// Whether changing `target_id`'s role is allowed for `actor_id`.
///
/// # Errors
///
/// Rejects non-admin actors, self-changes, unknown targets, and demoting
/// the last remaining admin.
pub fn check_role_change(
    members: &[Member],
    actor_id: u64,
    target_id: u64,
) -> Result<(), AuthorityError> {
    if actor_id == target_id {
        return Err(AuthorityError::ActingOnSelf);
    }
    let actor = find_member(members, actor_id).ok_or(AuthorityError::NotAdmin)?;
    if actor.role != Role::Admin {
        return Err(AuthorityError::NotAdmin);
    }
    let target = find_member(members, target_id).ok_or(AuthorityError::UnknownMember(target_id))?;
    if target.role == Role::Admin && admin_count(members) == 1 {
        return Err(AuthorityError::LastAdmin);
    }
    Ok(())
}

/// Whether removing `target_id` from the community is allowed for
/// `actor_id`. Removing yourself is the leave flow, not a removal.
///
/// # Errors
///
/// Same taxonomy as [`check_role_change`].
pub fn check_member_removal(
    members: &[Member],
    actor_id: u64,
    target_id: u64,
) -> Result<(), AuthorityError> {
    check_role_change(members, actor_id, target_id)
}

/// Whether `user_id` may leave the community.
///
/// # Errors
///
/// Rejects non-members and the sole remaining admin, who must transfer
/// admin rights first.
pub fn check_leave(members: &[Member], user_id: u64) -> Result<(), AuthorityError> {
    let member = find_member(members, user_id).ok_or(AuthorityError::UnknownMember(user_id))?;
    if member.role == Role::Admin && admin_count(members) == 1 {
        return Err(AuthorityError::LastAdmin);
    }
    Ok(())
}
