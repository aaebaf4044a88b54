//! Runtime configuration for the client library.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

/// Connection settings and viewer identity shared by the REST client and
/// the live-connection manager.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// HTTP base URL of the backend (e.g. `"http://127.0.0.1:3000"`).
    pub base_url: String,
    /// Bearer credential; absence makes the live connection fail fast and
    /// REST calls return a credential error.
    pub token: Option<String>,
    /// The viewing user's id, used by authority prechecks.
    pub user_id: u64,
    /// The viewing user's username, used for optimistic join entries.
    pub username: String,
}

impl ClientConfig {
    /// Load config from `COMMONS_*` environment variables with defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let base_url =
            env_opt("COMMONS_BASE_URL").unwrap_or_else(|| "http://127.0.0.1:3000".to_owned());
        let token = env_opt("COMMONS_TOKEN");
        let user_id = env_opt("COMMONS_USER_ID")
            .and_then(|raw| raw.parse::<u64>().map_or_else(|_| None, Some))
            .unwrap_or(0);
        let username = env_opt("COMMONS_USERNAME").unwrap_or_else(|| "anonymous".to_owned());

        Self {
            base_url,
            token,
            user_id,
            username,
        }
    }
}

fn env_opt(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}
