//! Networking: REST calls and the live-connection lifecycle.
//!
//! SYSTEM CONTEXT
//! ==============
//! `api` handles REST calls, `sync_client` manages the live connection,
//! `policy` is its reconnect state machine, and `apply` merges inbound
//! messages into the community view. The sync client owns the socket
//! exclusively; the applicator only ever sees decoded envelopes.

pub mod api;
pub mod apply;
pub mod policy;
pub mod sync_client;
