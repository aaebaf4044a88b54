//! Live-connection manager.
//!
//! Owns the single live connection for an active community context:
//! connects, subscribes, feeds inbound messages to the event applicator in
//! arrival order, and reconnects with exponential backoff until the
//! attempt cap. The consumer closes intentionally through [`SyncHandle`];
//! that close reason never triggers a reconnect, and a close that lands
//! during a backoff wait cancels the pending timer.
//!
//! ERROR HANDLING
//! ==============
//! Transport failures are translated into [`LinkStatus`] updates and
//! logging so the view keeps operating on last-known state; nothing here
//! is fatal to the surrounding application.

#[cfg(test)]
#[path = "sync_client_test.rs"]
mod sync_client_test;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use envelope::{decode_envelope, encode_envelope, subscribe_community};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::connect_async;

use crate::config::ClientConfig;
use crate::net::apply::apply_event;
use crate::net::policy::ReconnectPolicy;
use crate::state::{CloseReason, CommunityView, LinkStatus};

/// Error cases inside one connection attempt.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("websocket connect failed: {0}")]
    Connect(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("websocket transport failed: {0}")]
    Transport(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("websocket closed by server")]
    ServerClosed,
}

/// Control messages accepted by a running sync client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncCommand {
    /// Leave the community context; close without reconnecting.
    Close,
}

/// Handle to a spawned sync client.
pub struct SyncHandle {
    commands: mpsc::UnboundedSender<SyncCommand>,
    task: tokio::task::JoinHandle<()>,
}

impl SyncHandle {
    /// Request an intentional close. Idempotent.
    pub fn close(&self) {
        if self.commands.send(SyncCommand::Close).is_err() {
            tracing::debug!("sync client already stopped");
        }
    }

    /// Wait for the sync task to finish.
    pub async fn join(self) {
        if self.task.await.is_err() {
            tracing::warn!("sync task ended abnormally");
        }
    }
}

/// Spawn the live-connection lifecycle as a local task.
///
/// The view is `!Send`, so this must run on a current-thread runtime
/// inside a `LocalSet`.
pub fn spawn_sync_client(config: &ClientConfig, view: Rc<RefCell<CommunityView>>) -> SyncHandle {
    let (commands, receiver) = mpsc::unbounded_channel();
    let task = tokio::task::spawn_local(sync_loop(config.clone(), view, receiver));
    SyncHandle { commands, task }
}

async fn sync_loop(
    config: ClientConfig,
    view: Rc<RefCell<CommunityView>>,
    mut commands: mpsc::UnboundedReceiver<SyncCommand>,
) {
    let Some(token) = config.token.clone() else {
        view.borrow_mut().link = LinkStatus::Closed(CloseReason::MissingCredentials);
        tracing::warn!("live connection aborted: no credential configured");
        return;
    };
    let slug = view.borrow().slug.clone();
    let url = match live_url(&config.base_url, &slug, &token) {
        Ok(url) => url,
        Err(error) => {
            view.borrow_mut().link = LinkStatus::Closed(CloseReason::Error);
            tracing::warn!(%error, "live connection aborted");
            return;
        }
    };

    let mut policy = ReconnectPolicy::new();
    loop {
        view.borrow_mut().link = LinkStatus::Connecting;
        match connect_and_run(&url, &slug, &view, &mut commands, &mut policy).await {
            Ok(()) => {
                view.borrow_mut().link = LinkStatus::Closed(CloseReason::Intentional);
                tracing::info!(slug, "live connection closed");
                return;
            }
            Err(error) => {
                tracing::warn!(slug, %error, "live connection dropped");
            }
        }

        let Some(delay) = policy.next_delay() else {
            view.borrow_mut().link = LinkStatus::Closed(CloseReason::RetriesExhausted);
            tracing::warn!(slug, attempts = policy.attempts(), "giving up on live connection");
            return;
        };
        view.borrow_mut().link = LinkStatus::Closed(CloseReason::Error);
        tracing::info!(slug, ?delay, "scheduling reconnect");
        if wait_for_retry(delay, &mut commands).await == RetryWait::Cancelled {
            view.borrow_mut().link = LinkStatus::Closed(CloseReason::Intentional);
            return;
        }
    }
}

/// Connect, subscribe, and pump messages until close or failure.
///
/// `Ok(())` means an intentional close; any `Err` feeds the reconnect
/// policy.
async fn connect_and_run(
    url: &str,
    slug: &str,
    view: &Rc<RefCell<CommunityView>>,
    commands: &mut mpsc::UnboundedReceiver<SyncCommand>,
    policy: &mut ReconnectPolicy,
) -> Result<(), SyncError> {
    let (mut stream, _) = connect_async(url)
        .await
        .map_err(|error| SyncError::Connect(Box::new(error)))?;

    policy.reset();
    view.borrow_mut().link = LinkStatus::Open;
    tracing::info!(slug, "live connection open");

    let subscribe = encode_envelope(&subscribe_community(slug));
    stream
        .send(Message::Text(subscribe.into()))
        .await
        .map_err(|error| SyncError::Transport(Box::new(error)))?;

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(SyncCommand::Close) | None => {
                    if let Err(error) = stream.close(None).await {
                        tracing::debug!(%error, "close handshake failed");
                    }
                    return Ok(());
                }
            },
            message = stream.next() => {
                let Some(message) = message else {
                    return Err(SyncError::ServerClosed);
                };
                match message.map_err(|error| SyncError::Transport(Box::new(error)))? {
                    Message::Text(text) => match decode_envelope(text.as_str()) {
                        Ok(inbound) => apply_event(&mut view.borrow_mut(), &inbound),
                        Err(error) => {
                            tracing::warn!(%error, "undecodable live message");
                        }
                    },
                    Message::Close(_) => return Err(SyncError::ServerClosed),
                    _ => {}
                }
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RetryWait {
    Elapsed,
    Cancelled,
}

/// Sleep out a backoff delay, unless a close command lands first.
async fn wait_for_retry(
    delay: Duration,
    commands: &mut mpsc::UnboundedReceiver<SyncCommand>,
) -> RetryWait {
    tokio::select! {
        () = tokio::time::sleep(delay) => RetryWait::Elapsed,
        command = commands.recv() => match command {
            Some(SyncCommand::Close) | None => RetryWait::Cancelled,
        },
    }
}

fn live_url(base_url: &str, slug: &str, token: &str) -> Result<String, SyncError> {
    if let Some(rest) = base_url.strip_prefix("http://") {
        return Ok(format!("ws://{rest}/api/communities/{slug}/live?token={token}"));
    }
    if let Some(rest) = base_url.strip_prefix("https://") {
        return Ok(format!("wss://{rest}/api/communities/{slug}/live?token={token}"));
    }

    Err(SyncError::InvalidBaseUrl(base_url.to_owned()))
}
