//! Commons client library.
//!
//! Keeps a local mirror of one community — metadata, members, posts,
//! events — fresh over a live connection, and runs user mutations
//! optimistically against the REST backend.
//!
//! SYSTEM CONTEXT
//! ==============
//! `state` holds the per-community data model and merge rules, `net` owns
//! the REST client and the live-connection lifecycle, `mutation` is the
//! three-phase optimistic engine, and `session` wires them together behind
//! one facade. Execution is single-threaded cooperative: the session and
//! the spawned sync task share state through `Rc<RefCell<_>>` on a
//! current-thread runtime.

pub mod config;
pub mod drafts;
pub mod mutation;
pub mod net;
pub mod session;
pub mod state;
