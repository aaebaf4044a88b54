//! Community metadata and aggregate counters.

#[cfg(test)]
#[path = "community_test.rs"]
mod community_test;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{string_list, value_as_u32};

/// Descriptive fields and aggregate counters for the active community.
///
/// Mutated in place by [`merge_community`]; replaced wholesale only on
/// initial load.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CommunityState {
    /// Identifying slug; never changed by merges.
    pub slug: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Long-form description.
    #[serde(default)]
    pub description: String,
    /// Topic tags.
    #[serde(default)]
    pub topics: Vec<String>,
    /// Community rules, in display order.
    #[serde(default)]
    pub rules: Vec<String>,
    /// Whether the community is invite-only.
    #[serde(default)]
    pub is_private: bool,
    /// Total member count.
    #[serde(default)]
    pub member_count: u32,
    /// Members currently online.
    #[serde(default)]
    pub online_count: u32,
    /// Posts created today.
    #[serde(default)]
    pub posts_today: u32,
    /// Mean rating across the community's posts.
    #[serde(default)]
    pub avg_rating: f64,
}

/// Shallow-merge payload fields into the community state.
///
/// Only keys present in `data` are touched; the slug is identity and is
/// never merged.
pub fn merge_community(community: &mut CommunityState, data: &Value) {
    if let Some(name) = data.get("name").and_then(Value::as_str) {
        community.name = name.to_owned();
    }
    if let Some(description) = data.get("description").and_then(Value::as_str) {
        community.description = description.to_owned();
    }
    if let Some(topics) = data.get("topics").and_then(string_list) {
        community.topics = topics;
    }
    if let Some(rules) = data.get("rules").and_then(string_list) {
        community.rules = rules;
    }
    if let Some(is_private) = data.get("is_private").and_then(Value::as_bool) {
        community.is_private = is_private;
    }
    if let Some(member_count) = data.get("member_count").and_then(value_as_u32) {
        community.member_count = member_count;
    }
    if let Some(online_count) = data.get("online_count").and_then(value_as_u32) {
        community.online_count = online_count;
    }
    if let Some(posts_today) = data.get("posts_today").and_then(value_as_u32) {
        community.posts_today = posts_today;
    }
    if let Some(avg_rating) = data.get("avg_rating").and_then(Value::as_f64) {
        community.avg_rating = avg_rating;
    }
}
