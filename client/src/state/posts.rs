//! Post feed model: posts, authors, media, and the cached top comment.

#[cfg(test)]
#[path = "posts_test.rs"]
mod posts_test;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::members::Role;
use super::{value_as_u8, value_as_u32};

/// Frozen author details attached to a post or comment at creation time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorSnapshot {
    pub name: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// One attachment in a post's ordered media list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    /// Attachment kind, e.g. `"image"` or `"video"`.
    pub kind: String,
    pub url: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

/// Sentiment classification assigned to a comment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl Sentiment {
    /// Parse leniently; unknown labels fall back to [`Sentiment::Neutral`].
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label {
            "positive" => Self::Positive,
            "negative" => Self::Negative,
            _ => Self::Neutral,
        }
    }
}

impl<'de> Deserialize<'de> for Sentiment {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_label(&raw))
    }
}

/// A comment as carried on the wire; only the top comment is cached.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    /// Post this comment belongs to.
    pub post_id: u64,
    #[serde(default)]
    pub author: AuthorSnapshot,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub sentiment: Sentiment,
    /// Whether the server flagged this as the post's top comment.
    #[serde(default)]
    pub is_top: bool,
}

/// One post in the community feed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub author: AuthorSnapshot,
    /// Mean of all submitted ratings.
    #[serde(default)]
    pub rating: f64,
    /// Number of submitted ratings; only ever corrected downward by the
    /// server, never locally.
    #[serde(default)]
    pub total_ratings: u32,
    /// The viewer's own rating, 1-5; `0` means not rated.
    #[serde(default)]
    pub user_rating: u8,
    #[serde(default)]
    pub comment_count: u32,
    /// Ordered media attachments.
    #[serde(default)]
    pub media: Vec<MediaItem>,
    /// Cached top comment, maintained by comment broadcasts.
    #[serde(default)]
    pub top_comment: Option<Comment>,
}

/// Shallow-merge payload fields into an existing post.
pub fn merge_post(post: &mut Post, data: &Value) {
    if let Some(title) = data.get("title").and_then(Value::as_str) {
        post.title = title.to_owned();
    }
    if let Some(content) = data.get("content").and_then(Value::as_str) {
        post.content = content.to_owned();
    }
    if let Some(author) = data.get("author") {
        if let Ok(author) = serde_json::from_value::<AuthorSnapshot>(author.clone()) {
            post.author = author;
        }
    }
    if let Some(rating) = data.get("rating").and_then(Value::as_f64) {
        post.rating = rating;
    }
    if let Some(total_ratings) = data.get("total_ratings").and_then(value_as_u32) {
        post.total_ratings = total_ratings;
    }
    if let Some(user_rating) = data.get("user_rating").and_then(value_as_u8) {
        post.user_rating = user_rating;
    }
    if let Some(comment_count) = data.get("comment_count").and_then(value_as_u32) {
        post.comment_count = comment_count;
    }
    if let Some(media) = data.get("media") {
        if let Ok(media) = serde_json::from_value::<Vec<MediaItem>>(media.clone()) {
            post.media = media;
        }
    }
    if let Some(top_comment) = data.get("top_comment") {
        post.top_comment = serde_json::from_value::<Comment>(top_comment.clone()).map_or_else(|_| None, Some);
    }
}

/// Apply the viewer's rating to the running mean before the backend
/// confirms it.
///
/// A first rating widens the denominator by one; re-rating shifts the mean
/// by the delta against the previous value.
pub fn apply_optimistic_rating(post: &mut Post, rating: u8) {
    let previous = post.user_rating;
    let denominator = if previous == 0 {
        post.total_ratings + 1
    } else {
        post.total_ratings
    };
    if denominator == 0 {
        post.rating = f64::from(rating);
    } else {
        post.rating += (f64::from(rating) - f64::from(previous)) / f64::from(denominator);
    }
    if previous == 0 {
        post.total_ratings += 1;
    }
    post.user_rating = rating;
}

/// Install the server-confirmed rating aggregate, replacing whatever the
/// optimistic apply computed.
pub fn apply_confirmed_rating(post: &mut Post, mean: f64, total_ratings: u32, user_rating: u8) {
    post.rating = mean;
    post.total_ratings = total_ratings;
    post.user_rating = user_rating;
}

/// Find a post by id.
#[must_use]
pub fn find_post(posts: &[Post], id: u64) -> Option<&Post> {
    posts.iter().find(|post| post.id == id)
}

/// Find a post by id, mutably.
pub fn find_post_mut(posts: &mut [Post], id: u64) -> Option<&mut Post> {
    posts.iter_mut().find(|post| post.id == id)
}

/// Remove a post by id; true when something was removed.
pub fn remove_post(posts: &mut Vec<Post>, id: u64) -> bool {
    let before = posts.len();
    posts.retain(|post| post.id != id);
    posts.len() != before
}

/// Prepend a post, replacing any existing entry with the same id.
pub fn prepend_post(posts: &mut Vec<Post>, post: Post) {
    if let Some(existing) = find_post_mut(posts, post.id) {
        *existing = post;
    } else {
        posts.insert(0, post);
    }
}
