//! Three-phase optimistic mutation engine.
//!
//! Every user-initiated mutation follows one contract: a local precheck
//! (no network on failure), an optimistic apply that returns its own undo,
//! and a reconciliation that either installs server-confirmed values or
//! unwinds. A failure in the stale-reference class skips the undo and
//! raises the view's refresh flag instead, since the local state is wrong
//! in a way a plain revert cannot fix.
//!
//! Each mutation target is tracked in an in-flight set while its call is
//! outstanding; a second mutation against the same target is rejected
//! without side effects. Completions that land after the community
//! context changed are dropped entirely.

#[cfg(test)]
#[path = "mutation_test.rs"]
mod mutation_test;

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::future::Future;
use std::rc::Rc;

use crate::net::api::ApiError;
use crate::state::CommunityView;
use crate::state::members::AuthorityError;

/// Entity a mutation is aimed at, for in-flight duplicate suppression.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MutationTarget {
    Community,
    Member(u64),
    Post(u64),
    Event(u64),
    Request(String),
}

/// Failures surfaced by [`run_mutation`].
#[derive(Debug, thiserror::Error)]
pub enum MutationError {
    /// Rejected by a local authority precheck; no network call was made.
    #[error(transparent)]
    Authority(#[from] AuthorityError),
    /// A mutation for the same target is still outstanding.
    #[error("a mutation for this target is already in flight")]
    AlreadyInFlight,
    /// The community context changed before the call resolved; the
    /// completion was discarded.
    #[error("the community context changed before the call resolved")]
    ContextChanged,
    /// Ratings are 1-5.
    #[error("rating must be between 1 and 5")]
    InvalidRating,
    #[error("post {0} is not in this community")]
    UnknownPost(u64),
    #[error("event {0} is not in this community")]
    UnknownEvent(u64),
    #[error("already a member of this community")]
    AlreadyMember,
    #[error("{0}")]
    InvalidInput(&'static str),
    /// The backend rejected the call; optimistic fields were reverted or
    /// flagged for refetch.
    #[error(transparent)]
    Api(ApiError),
}

/// Undo closure produced by an optimistic apply.
pub type Undo = Box<dyn FnOnce(&mut CommunityView)>;

/// Run one mutation through the three-phase contract.
///
/// # Errors
///
/// Precheck failures and in-flight duplicates return before any state or
/// network effect. Backend failures return [`MutationError::Api`] after
/// the optimistic fields were reverted (or the refresh flag raised, for
/// the refetch class). A context change during the call returns
/// [`MutationError::ContextChanged`] and applies nothing.
pub async fn run_mutation<Out, Fut>(
    view: &Rc<RefCell<CommunityView>>,
    inflight: &Rc<RefCell<HashSet<MutationTarget>>>,
    generation: &Rc<Cell<u64>>,
    target: MutationTarget,
    precheck: impl FnOnce(&CommunityView) -> Result<(), MutationError>,
    optimistic: impl FnOnce(&mut CommunityView) -> Undo,
    request: Fut,
    reconcile: impl FnOnce(&mut CommunityView, &Out),
) -> Result<Out, MutationError>
where
    Fut: Future<Output = Result<Out, ApiError>>,
{
    precheck(&view.borrow())?;
    if !inflight.borrow_mut().insert(target.clone()) {
        return Err(MutationError::AlreadyInFlight);
    }

    let undo = optimistic(&mut view.borrow_mut());
    let started_generation = generation.get();

    let outcome = request.await;
    inflight.borrow_mut().remove(&target);

    if generation.get() != started_generation {
        tracing::debug!(?target, "dropping mutation completion for closed context");
        return Err(MutationError::ContextChanged);
    }

    match outcome {
        Ok(confirmed) => {
            reconcile(&mut view.borrow_mut(), &confirmed);
            Ok(confirmed)
        }
        Err(error) => {
            let mut state = view.borrow_mut();
            if error.needs_refetch() {
                state.needs_refresh = true;
            } else {
                undo(&mut state);
            }
            state.last_error = Some(error.to_string());
            drop(state);
            Err(MutationError::Api(error))
        }
    }
}
