//! REST client for the community backend.
//!
//! ERROR HANDLING
//! ==============
//! Non-success statuses surface as [`ApiError::Status`] with the server's
//! message attached. Most are opaque pass-through; the classifier helpers
//! pick out the small set of patterns the mutation engine routes to a
//! reconciliation fetch instead of a revert.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ClientConfig;
use crate::state::community::CommunityState;
use crate::state::events::CommunityEvent;
use crate::state::members::{Member, Role};
use crate::state::posts::{MediaItem, Post};

/// Failures from the REST layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("missing bearer credential; set COMMONS_TOKEN or ClientConfig::token")]
    MissingCredentials,
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("missing expected field `{0}`")]
    MissingField(&'static str),
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },
}

impl ApiError {
    /// The mutation target no longer exists on the server.
    #[must_use]
    pub fn is_stale_reference(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
            || self.message_contains("no longer exists")
    }

    /// The mutation raced an identical one that already landed.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::Status { status: 409, .. })
            || self.message_contains("already exists")
    }

    /// The request body exceeded the server's size limit.
    #[must_use]
    pub fn is_payload_too_large(&self) -> bool {
        matches!(self, Self::Status { status: 413, .. })
    }

    /// True when reconciliation should refetch state instead of reverting
    /// the optimistic fields.
    #[must_use]
    pub fn needs_refetch(&self) -> bool {
        self.is_stale_reference() || self.is_already_exists()
    }

    fn message_contains(&self, needle: &str) -> bool {
        matches!(self, Self::Status { message, .. } if message.to_ascii_lowercase().contains(needle))
    }
}

/// Server-confirmed rating aggregate, returned by [`ApiClient::rate_post`].
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct RatingOutcome {
    pub rating: f64,
    pub total_ratings: u32,
}

/// Body of a post creation request.
#[derive(Clone, Debug, Default, Serialize)]
pub struct PostDraft {
    pub title: String,
    pub content: String,
    pub media: Vec<MediaItem>,
}

/// Body of an invite submission; also the shape persisted as a draft.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InviteDraft {
    pub recipients: Vec<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
}

/// Typed REST surface over the community backend.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    #[must_use]
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            token: config.token.clone(),
        }
    }

    /// GET the community's metadata.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or a non-success status.
    pub async fn fetch_community(&self, slug: &str) -> Result<CommunityState, ApiError> {
        let value = self.request(Method::GET, &community_path(slug), None).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// GET the full member list.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or a non-success status.
    pub async fn fetch_members(&self, slug: &str) -> Result<Vec<Member>, ApiError> {
        let value = self.request(Method::GET, &members_path(slug), None).await?;
        parse_list(&value, "members")
    }

    /// GET the post feed.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or a non-success status.
    pub async fn fetch_posts(&self, slug: &str) -> Result<Vec<Post>, ApiError> {
        let value = self.request(Method::GET, &posts_path(slug), None).await?;
        parse_list(&value, "posts")
    }

    /// GET the event list.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or a non-success status.
    pub async fn fetch_events(&self, slug: &str) -> Result<Vec<CommunityEvent>, ApiError> {
        let value = self.request(Method::GET, &events_path(slug), None).await?;
        parse_list(&value, "events")
    }

    /// Join the community; returns the viewer's confirmed member row.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or a non-success status.
    pub async fn join_community(&self, slug: &str) -> Result<Member, ApiError> {
        let path = format!("{}/join", community_path(slug));
        let value = self.request(Method::POST, &path, Some(Value::Null)).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Leave the community.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or a non-success status.
    pub async fn leave_community(&self, slug: &str) -> Result<(), ApiError> {
        let path = format!("{}/leave", community_path(slug));
        self.request(Method::POST, &path, Some(Value::Null)).await?;
        Ok(())
    }

    /// PATCH a member's role.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or a non-success status.
    pub async fn update_member_role(
        &self,
        slug: &str,
        member_id: u64,
        role: Role,
    ) -> Result<(), ApiError> {
        let path = format!("{}/{member_id}/role", members_path(slug));
        let body = serde_json::json!({ "role": role });
        self.request(Method::PATCH, &path, Some(body)).await?;
        Ok(())
    }

    /// Remove a member from the community.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or a non-success status.
    pub async fn remove_member(&self, slug: &str, member_id: u64) -> Result<(), ApiError> {
        let path = format!("{}/{member_id}", members_path(slug));
        self.request(Method::DELETE, &path, None).await?;
        Ok(())
    }

    /// Add a member directly (admin flow); returns the confirmed row.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or a non-success status.
    pub async fn add_member(&self, slug: &str, username: &str) -> Result<Member, ApiError> {
        let body = serde_json::json!({ "username": username });
        let value = self.request(Method::POST, &members_path(slug), Some(body)).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Create a post; returns the confirmed post.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or a non-success status,
    /// including 413 when attachments exceed the server's size limit.
    pub async fn create_post(&self, slug: &str, draft: &PostDraft) -> Result<Post, ApiError> {
        let body = serde_json::to_value(draft)?;
        let value = self.request(Method::POST, &posts_path(slug), Some(body)).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Submit the viewer's rating; returns the server-computed aggregate.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or a non-success status.
    pub async fn rate_post(
        &self,
        slug: &str,
        post_id: u64,
        rating: u8,
    ) -> Result<RatingOutcome, ApiError> {
        let path = format!("{}/{post_id}/rating", posts_path(slug));
        let body = serde_json::json!({ "rating": rating });
        let value = self.request(Method::POST, &path, Some(body)).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Join an event; returns the confirmed participant count.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or a non-success status.
    pub async fn join_event(&self, slug: &str, event_id: u64) -> Result<u32, ApiError> {
        let path = format!("{}/{event_id}/join", events_path(slug));
        let value = self.request(Method::POST, &path, Some(Value::Null)).await?;
        parse_u32(&value, "participants")
    }

    /// Leave an event; returns the confirmed participant count.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or a non-success status.
    pub async fn leave_event(&self, slug: &str, event_id: u64) -> Result<u32, ApiError> {
        let path = format!("{}/{event_id}/leave", events_path(slug));
        let value = self.request(Method::POST, &path, Some(Value::Null)).await?;
        parse_u32(&value, "participants")
    }

    /// Send invites; returns how many were sent.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or a non-success status.
    pub async fn send_invites(&self, slug: &str, invite: &InviteDraft) -> Result<u32, ApiError> {
        let path = format!("{}/invites", community_path(slug));
        let body = serde_json::to_value(invite)?;
        let value = self.request(Method::POST, &path, Some(body)).await?;
        parse_u32(&value, "sent")
    }

    /// PATCH community settings; returns the confirmed fields.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or a non-success status.
    pub async fn update_settings(&self, slug: &str, patch: &Value) -> Result<Value, ApiError> {
        let path = format!("{}/settings", community_path(slug));
        self.request(Method::PATCH, &path, Some(patch.clone())).await
    }

    /// Create a connection request toward a member; returns the
    /// server-assigned request id.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or a non-success status.
    pub async fn create_connection_request(&self, member_id: u64) -> Result<String, ApiError> {
        let body = serde_json::json!({ "user_id": member_id });
        let value = self
            .request(Method::POST, "/api/connections/requests", Some(body))
            .await?;
        value
            .get("request_id")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or(ApiError::MissingField("request_id"))
    }

    /// Cancel an outstanding connection request.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or a non-success status.
    pub async fn cancel_connection_request(&self, request_id: &str) -> Result<(), ApiError> {
        let path = format!("/api/connections/requests/{request_id}");
        self.request(Method::DELETE, &path, None).await?;
        Ok(())
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ApiError> {
        let token = self.token.as_deref().ok_or(ApiError::MissingCredentials)?;
        let url = format!("{}{path}", self.base_url.trim_end_matches('/'));

        let request = self
            .http
            .request(method, &url)
            .bearer_auth(token)
            .header("x-request-id", uuid::Uuid::new_v4().to_string());
        let request = if let Some(json) = body {
            request.json(&json)
        } else {
            request
        };

        let response = request.send().await?;
        let status = response.status();
        let value = response
            .json::<Value>()
            .await
            .unwrap_or_else(|_| Value::Null);

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: error_message(&value),
            });
        }

        Ok(value)
    }
}

fn community_path(slug: &str) -> String {
    format!("/api/communities/{slug}")
}

fn members_path(slug: &str) -> String {
    format!("/api/communities/{slug}/members")
}

fn posts_path(slug: &str) -> String {
    format!("/api/communities/{slug}/posts")
}

fn events_path(slug: &str) -> String {
    format!("/api/communities/{slug}/events")
}

/// Extract the server's error text, preferring `message` over `error`.
fn error_message(value: &Value) -> String {
    value
        .get("message")
        .or_else(|| value.get("error"))
        .and_then(Value::as_str)
        .map_or_else(|| value.to_string(), str::to_owned)
}

fn parse_list<T: serde::de::DeserializeOwned>(
    value: &Value,
    field: &'static str,
) -> Result<Vec<T>, ApiError> {
    let items = value.get(field).ok_or(ApiError::MissingField(field))?;
    Ok(serde_json::from_value(items.clone())?)
}

fn parse_u32(value: &Value, field: &'static str) -> Result<u32, ApiError> {
    value
        .get(field)
        .and_then(Value::as_u64)
        .and_then(|raw| u32::try_from(raw).map_or_else(|_| None, Some))
        .ok_or(ApiError::MissingField(field))
}
