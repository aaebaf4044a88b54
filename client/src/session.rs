//! Session facade for one community context.
//!
//! SYSTEM CONTEXT
//! ==============
//! `CommunitySession` owns the shared view, the REST client, the in-flight
//! mutation set, the draft store, and the live-connection handle. Opening
//! a context performs the initial full-list fetch and spawns the sync
//! client; closing bumps the context generation (so late completions are
//! dropped), closes the link intentionally, and discards state.
//!
//! All mutations go through the three-phase engine in [`crate::mutation`];
//! the methods here supply the prechecks, optimistic transforms, and
//! reconciliations per operation.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::cell::{Cell, Ref, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use serde_json::Value;

use crate::config::ClientConfig;
use crate::drafts::{DraftStore, draft_key};
use crate::mutation::{MutationError, MutationTarget, Undo, run_mutation};
use crate::net::api::{ApiClient, ApiError, InviteDraft, PostDraft, RatingOutcome};
use crate::net::sync_client::{SyncHandle, spawn_sync_client};
use crate::state::community::merge_community;
use crate::state::events::{find_event, find_event_mut};
use crate::state::members::{
    AuthorityError, ConnectionState, Member, Role, check_leave, check_member_removal,
    check_role_change, find_member, find_member_mut, upsert_member,
};
use crate::state::posts::{
    Post, apply_confirmed_rating, apply_optimistic_rating, find_post, find_post_mut, prepend_post,
};
use crate::state::CommunityView;

const INVITE_DRAFT_FIELD: &str = "invite_draft";

/// One community context: local state, live connection, and mutations.
pub struct CommunitySession {
    config: ClientConfig,
    api: ApiClient,
    view: Rc<RefCell<CommunityView>>,
    inflight: Rc<RefCell<HashSet<MutationTarget>>>,
    generation: Rc<Cell<u64>>,
    drafts: DraftStore,
    sync: Option<SyncHandle>,
}

impl CommunitySession {
    #[must_use]
    pub fn new(config: ClientConfig, drafts: DraftStore) -> Self {
        let api = ApiClient::new(&config);
        Self {
            config,
            api,
            view: Rc::new(RefCell::new(CommunityView::default())),
            inflight: Rc::new(RefCell::new(HashSet::new())),
            generation: Rc::new(Cell::new(0)),
            drafts,
            sync: None,
        }
    }

    /// Borrow the current view.
    ///
    /// # Panics
    ///
    /// Panics if called while a mutation closure holds the view mutably;
    /// callers on the single-threaded session never observe that.
    #[must_use]
    pub fn view(&self) -> Ref<'_, CommunityView> {
        self.view.borrow()
    }

    /// Shared handle to the view, for render layers that poll it.
    #[must_use]
    pub fn view_handle(&self) -> Rc<RefCell<CommunityView>> {
        Rc::clone(&self.view)
    }

    /// Whether live updates are currently flowing.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.view.borrow().link.is_connected()
    }

    /// Open a community context: initial full-list fetch, then the live
    /// connection. A second open while one context is active is a no-op.
    ///
    /// Must run on a current-thread runtime inside a `LocalSet`; the sync
    /// client is a local task.
    ///
    /// # Errors
    ///
    /// Returns the first failed initial fetch; no live connection is
    /// spawned in that case and the view stays usable for a retry.
    pub async fn open(&mut self, slug: &str) -> Result<(), ApiError> {
        if self.sync.is_some() {
            return Ok(());
        }
        self.generation.set(self.generation.get() + 1);
        *self.view.borrow_mut() = CommunityView::new(slug, self.config.user_id);

        let community = self.api.fetch_community(slug).await?;
        let members = self.api.fetch_members(slug).await?;
        let posts = self.api.fetch_posts(slug).await?;
        let events = self.api.fetch_events(slug).await?;
        {
            let mut state = self.view.borrow_mut();
            state.community = community;
            state.members = members;
            state.posts = posts;
            state.events = events;
        }

        self.sync = Some(spawn_sync_client(&self.config, Rc::clone(&self.view)));
        Ok(())
    }

    /// Leave the community context: close the link intentionally, drop
    /// pending timers, discard state and drafts.
    pub async fn close(&mut self) {
        self.generation.set(self.generation.get() + 1);
        self.inflight.borrow_mut().clear();
        if let Some(sync) = self.sync.take() {
            sync.close();
            sync.join().await;
        }
        let slug = self.view.borrow().slug.clone();
        if !slug.is_empty() {
            self.drafts.clear_community(&slug);
        }
        *self.view.borrow_mut() = CommunityView::default();
    }

    /// Refetch all lists to reconcile after a stale-reference failure.
    ///
    /// # Errors
    ///
    /// Returns the first failed fetch; the refresh flag stays set so the
    /// caller can retry.
    pub async fn refresh(&self) -> Result<(), ApiError> {
        let slug = self.view.borrow().slug.clone();
        let started_generation = self.generation.get();

        let community = self.api.fetch_community(&slug).await?;
        let members = self.api.fetch_members(&slug).await?;
        let posts = self.api.fetch_posts(&slug).await?;
        let events = self.api.fetch_events(&slug).await?;

        if self.generation.get() != started_generation {
            return Ok(());
        }
        let mut state = self.view.borrow_mut();
        state.community = community;
        state.members = members;
        state.posts = posts;
        state.events = events;
        state.needs_refresh = false;
        Ok(())
    }

    /// Join the community as the viewing user.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError`] per the three-phase contract.
    pub async fn join(&mut self) -> Result<Member, MutationError> {
        let slug = self.view.borrow().slug.clone();
        let viewer_id = self.config.user_id;
        let username = self.config.username.clone();
        run_mutation(
            &self.view,
            &self.inflight,
            &self.generation,
            MutationTarget::Member(viewer_id),
            move |state| {
                if find_member(&state.members, viewer_id).is_some() {
                    return Err(MutationError::AlreadyMember);
                }
                Ok(())
            },
            move |state| {
                state.members.push(placeholder_member(viewer_id, &username));
                state.community.member_count = state.community.member_count.saturating_add(1);
                Box::new(move |state: &mut CommunityView| {
                    state.members.retain(|member| member.id != viewer_id);
                    state.community.member_count = state.community.member_count.saturating_sub(1);
                })
            },
            self.api.join_community(&slug),
            move |state, confirmed: &Member| {
                upsert_member(&mut state.members, confirmed.clone());
            },
        )
        .await
    }

    /// Leave the community. The sole remaining admin is rejected locally
    /// and must transfer admin rights first.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError`] per the three-phase contract.
    pub async fn leave(&mut self) -> Result<(), MutationError> {
        let slug = self.view.borrow().slug.clone();
        let viewer_id = self.config.user_id;
        run_mutation(
            &self.view,
            &self.inflight,
            &self.generation,
            MutationTarget::Member(viewer_id),
            move |state| Ok(check_leave(&state.members, viewer_id)?),
            move |state| remove_member_optimistic(state, viewer_id),
            self.api.leave_community(&slug),
            |_, ()| {},
        )
        .await
    }

    /// Change another member's role. Admin-only; self-changes and demoting
    /// the last admin are rejected locally.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError`] per the three-phase contract.
    pub async fn change_role(&mut self, target_id: u64, role: Role) -> Result<(), MutationError> {
        let slug = self.view.borrow().slug.clone();
        let viewer_id = self.config.user_id;
        run_mutation(
            &self.view,
            &self.inflight,
            &self.generation,
            MutationTarget::Member(target_id),
            move |state| Ok(check_role_change(&state.members, viewer_id, target_id)?),
            move |state| {
                let previous = find_member(&state.members, target_id).map(|member| member.role);
                if let Some(member) = find_member_mut(&mut state.members, target_id) {
                    member.role = role;
                }
                Box::new(move |state: &mut CommunityView| {
                    if let (Some(member), Some(previous)) =
                        (find_member_mut(&mut state.members, target_id), previous)
                    {
                        member.role = previous;
                    }
                })
            },
            self.api.update_member_role(&slug, target_id, role),
            |_, ()| {},
        )
        .await
    }

    /// Transfer admin rights: promote the target, then step down to an
    /// ordinary member. The sanctioned path for a sole admin to leave.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError`] per the three-phase contract.
    pub async fn transfer_admin(&mut self, target_id: u64) -> Result<(), MutationError> {
        let slug = self.view.borrow().slug.clone();
        let viewer_id = self.config.user_id;
        let api = self.api.clone();
        let request = async move {
            api.update_member_role(&slug, target_id, Role::Admin).await?;
            api.update_member_role(&slug, viewer_id, Role::Member).await?;
            Ok::<(), ApiError>(())
        };
        run_mutation(
            &self.view,
            &self.inflight,
            &self.generation,
            MutationTarget::Member(target_id),
            move |state| {
                if target_id == viewer_id {
                    return Err(AuthorityError::ActingOnSelf.into());
                }
                let actor = find_member(&state.members, viewer_id)
                    .ok_or(AuthorityError::NotAdmin)?;
                if actor.role != Role::Admin {
                    return Err(AuthorityError::NotAdmin.into());
                }
                find_member(&state.members, target_id)
                    .ok_or(AuthorityError::UnknownMember(target_id))?;
                Ok(())
            },
            move |state| {
                let previous_target =
                    find_member(&state.members, target_id).map(|member| member.role);
                if let Some(member) = find_member_mut(&mut state.members, target_id) {
                    member.role = Role::Admin;
                }
                if let Some(member) = find_member_mut(&mut state.members, viewer_id) {
                    member.role = Role::Member;
                }
                Box::new(move |state: &mut CommunityView| {
                    if let (Some(member), Some(previous)) =
                        (find_member_mut(&mut state.members, target_id), previous_target)
                    {
                        member.role = previous;
                    }
                    if let Some(member) = find_member_mut(&mut state.members, viewer_id) {
                        member.role = Role::Admin;
                    }
                })
            },
            request,
            |_, ()| {},
        )
        .await
    }

    /// Remove a member. Admin-only; removing yourself is [`Self::leave`].
    ///
    /// # Errors
    ///
    /// Returns [`MutationError`] per the three-phase contract.
    pub async fn remove_member(&mut self, target_id: u64) -> Result<(), MutationError> {
        let slug = self.view.borrow().slug.clone();
        let viewer_id = self.config.user_id;
        run_mutation(
            &self.view,
            &self.inflight,
            &self.generation,
            MutationTarget::Member(target_id),
            move |state| Ok(check_member_removal(&state.members, viewer_id, target_id)?),
            move |state| remove_member_optimistic(state, target_id),
            self.api.remove_member(&slug, target_id),
            |_, ()| {},
        )
        .await
    }

    /// Add a member directly (admin flow).
    ///
    /// # Errors
    ///
    /// Returns [`MutationError`] per the three-phase contract.
    pub async fn add_member(&mut self, username: &str) -> Result<Member, MutationError> {
        let slug = self.view.borrow().slug.clone();
        let viewer_id = self.config.user_id;
        run_mutation(
            &self.view,
            &self.inflight,
            &self.generation,
            MutationTarget::Community,
            move |state| {
                let actor = find_member(&state.members, viewer_id)
                    .ok_or(AuthorityError::NotAdmin)?;
                if actor.role != Role::Admin {
                    return Err(AuthorityError::NotAdmin.into());
                }
                Ok(())
            },
            |_| noop_undo(),
            self.api.add_member(&slug, username),
            move |state, confirmed: &Member| {
                upsert_member(&mut state.members, confirmed.clone());
                state.community.member_count = state.community.member_count.saturating_add(1);
            },
        )
        .await
    }

    /// Send a connection request toward a member.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError`] per the three-phase contract.
    pub async fn send_connection_request(&mut self, member_id: u64) -> Result<String, MutationError> {
        let viewer_id = self.config.user_id;
        run_mutation(
            &self.view,
            &self.inflight,
            &self.generation,
            MutationTarget::Member(member_id),
            move |state| {
                if member_id == viewer_id {
                    return Err(MutationError::InvalidInput("cannot connect to yourself"));
                }
                let member = find_member(&state.members, member_id)
                    .ok_or(AuthorityError::UnknownMember(member_id))?;
                match member.connection {
                    ConnectionState::Connect => Ok(()),
                    ConnectionState::Pending => {
                        Err(MutationError::InvalidInput("connection request already outstanding"))
                    }
                    ConnectionState::Connected => {
                        Err(MutationError::InvalidInput("already connected to this member"))
                    }
                }
            },
            move |state| {
                if let Some(member) = find_member_mut(&mut state.members, member_id) {
                    member.connection = ConnectionState::Pending;
                }
                Box::new(move |state: &mut CommunityView| {
                    if let Some(member) = find_member_mut(&mut state.members, member_id) {
                        member.connection = ConnectionState::Connect;
                        member.request_id = None;
                    }
                })
            },
            self.api.create_connection_request(member_id),
            move |state, request_id: &String| {
                if let Some(member) = find_member_mut(&mut state.members, member_id) {
                    member.request_id = Some(request_id.clone());
                }
            },
        )
        .await
    }

    /// Cancel the outstanding connection request toward a member.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError`] per the three-phase contract.
    pub async fn cancel_connection_request(&mut self, member_id: u64) -> Result<(), MutationError> {
        let request_id = {
            let state = self.view.borrow();
            find_member(&state.members, member_id).and_then(|member| member.request_id.clone())
        };
        let Some(request_id) = request_id else {
            return Err(MutationError::InvalidInput("no outstanding connection request"));
        };
        let undo_request_id = request_id.clone();
        run_mutation(
            &self.view,
            &self.inflight,
            &self.generation,
            MutationTarget::Request(request_id.clone()),
            move |state| {
                let member = find_member(&state.members, member_id)
                    .ok_or(AuthorityError::UnknownMember(member_id))?;
                if member.connection != ConnectionState::Pending {
                    return Err(MutationError::InvalidInput("no outstanding connection request"));
                }
                Ok(())
            },
            move |state| {
                if let Some(member) = find_member_mut(&mut state.members, member_id) {
                    member.connection = ConnectionState::Connect;
                    member.request_id = None;
                }
                Box::new(move |state: &mut CommunityView| {
                    if let Some(member) = find_member_mut(&mut state.members, member_id) {
                        member.connection = ConnectionState::Pending;
                        member.request_id = Some(undo_request_id);
                    }
                })
            },
            self.api.cancel_connection_request(&request_id),
            |_, ()| {},
        )
        .await
    }

    /// Submit the viewer's rating for a post.
    ///
    /// The mean shifts immediately; server-confirmed values replace the
    /// optimistic ones on success.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError`] per the three-phase contract.
    pub async fn rate_post(
        &mut self,
        post_id: u64,
        rating: u8,
    ) -> Result<RatingOutcome, MutationError> {
        let slug = self.view.borrow().slug.clone();
        run_mutation(
            &self.view,
            &self.inflight,
            &self.generation,
            MutationTarget::Post(post_id),
            move |state| {
                if !(1..=5).contains(&rating) {
                    return Err(MutationError::InvalidRating);
                }
                find_post(&state.posts, post_id).ok_or(MutationError::UnknownPost(post_id))?;
                Ok(())
            },
            move |state| {
                let snapshot = find_post(&state.posts, post_id)
                    .map(|post| (post.rating, post.total_ratings, post.user_rating));
                if let Some(post) = find_post_mut(&mut state.posts, post_id) {
                    apply_optimistic_rating(post, rating);
                }
                Box::new(move |state: &mut CommunityView| {
                    if let Some(post) = find_post_mut(&mut state.posts, post_id)
                        && let Some((mean, total, user)) = snapshot
                    {
                        post.rating = mean;
                        post.total_ratings = total;
                        post.user_rating = user;
                    }
                })
            },
            self.api.rate_post(&slug, post_id, rating),
            move |state, confirmed: &RatingOutcome| {
                if let Some(post) = find_post_mut(&mut state.posts, post_id) {
                    apply_confirmed_rating(post, confirmed.rating, confirmed.total_ratings, rating);
                }
            },
        )
        .await
    }

    /// Create a post; the confirmed post is prepended to the feed.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError`] per the three-phase contract.
    pub async fn create_post(&mut self, draft: PostDraft) -> Result<(), MutationError> {
        let slug = self.view.borrow().slug.clone();
        let title = draft.title.clone();
        run_mutation(
            &self.view,
            &self.inflight,
            &self.generation,
            MutationTarget::Community,
            move |_| {
                if title.trim().is_empty() {
                    return Err(MutationError::InvalidInput("post title is required"));
                }
                Ok(())
            },
            |_| noop_undo(),
            self.api.create_post(&slug, &draft),
            |state, confirmed: &Post| {
                prepend_post(&mut state.posts, confirmed.clone());
            },
        )
        .await
        .map(|_| ())
    }

    /// Join a community event.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError`] per the three-phase contract.
    pub async fn join_event(&mut self, event_id: u64) -> Result<(), MutationError> {
        self.set_event_participation(event_id, true).await
    }

    /// Leave a community event.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError`] per the three-phase contract.
    pub async fn leave_event(&mut self, event_id: u64) -> Result<(), MutationError> {
        self.set_event_participation(event_id, false).await
    }

    async fn set_event_participation(
        &mut self,
        event_id: u64,
        joining: bool,
    ) -> Result<(), MutationError> {
        let slug = self.view.borrow().slug.clone();
        let api = self.api.clone();
        let request_slug = slug.clone();
        let request = async move {
            if joining {
                api.join_event(&request_slug, event_id).await
            } else {
                api.leave_event(&request_slug, event_id).await
            }
        };
        run_mutation(
            &self.view,
            &self.inflight,
            &self.generation,
            MutationTarget::Event(event_id),
            move |state| {
                if find_event(&state.events, event_id).is_none() {
                    return Err(MutationError::UnknownEvent(event_id));
                }
                Ok(())
            },
            move |state| {
                let snapshot = state
                    .events
                    .iter()
                    .find(|event| event.id == event_id)
                    .map(|event| event.participants);
                if let Some(event) = find_event_mut(&mut state.events, event_id) {
                    event.participants = if joining {
                        event.participants.saturating_add(1)
                    } else {
                        event.participants.saturating_sub(1)
                    };
                }
                Box::new(move |state: &mut CommunityView| {
                    if let Some(event) = find_event_mut(&mut state.events, event_id)
                        && let Some(participants) = snapshot
                    {
                        event.participants = participants;
                    }
                })
            },
            request,
            move |state, confirmed: &u32| {
                if let Some(event) = find_event_mut(&mut state.events, event_id) {
                    event.participants = *confirmed;
                }
            },
        )
        .await
        .map(|_| ())
    }

    /// Update community settings; confirmed fields merge into the view.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError`] per the three-phase contract.
    pub async fn update_settings(&mut self, patch: Value) -> Result<(), MutationError> {
        let slug = self.view.borrow().slug.clone();
        let viewer_id = self.config.user_id;
        let optimistic_patch = patch.clone();
        run_mutation(
            &self.view,
            &self.inflight,
            &self.generation,
            MutationTarget::Community,
            move |state| {
                let actor = find_member(&state.members, viewer_id)
                    .ok_or(AuthorityError::NotAdmin)?;
                if actor.role != Role::Admin {
                    return Err(AuthorityError::NotAdmin.into());
                }
                Ok(())
            },
            move |state| {
                let snapshot = state.community.clone();
                merge_community(&mut state.community, &optimistic_patch);
                Box::new(move |state: &mut CommunityView| {
                    state.community = snapshot;
                })
            },
            self.api.update_settings(&slug, &patch),
            |state, confirmed: &Value| {
                merge_community(&mut state.community, confirmed);
            },
        )
        .await
        .map(|_| ())
    }

    /// Send the saved (or given) invites; the persisted draft is cleared
    /// on success.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError`] per the three-phase contract.
    pub async fn send_invites(&mut self, invite: InviteDraft) -> Result<u32, MutationError> {
        let slug = self.view.borrow().slug.clone();
        let recipient_count = invite.recipients.len();
        let sent = run_mutation(
            &self.view,
            &self.inflight,
            &self.generation,
            MutationTarget::Community,
            move |_| {
                if recipient_count == 0 {
                    return Err(MutationError::InvalidInput("invite needs at least one recipient"));
                }
                Ok(())
            },
            |_| noop_undo(),
            self.api.send_invites(&slug, &invite),
            |_, _| {},
        )
        .await?;
        self.drafts.remove(&draft_key(&slug, INVITE_DRAFT_FIELD));
        Ok(sent)
    }

    /// Persist the invite draft for this community.
    pub fn save_invite_draft(&mut self, draft: &InviteDraft) {
        let slug = self.view.borrow().slug.clone();
        self.drafts.set(&draft_key(&slug, INVITE_DRAFT_FIELD), draft);
    }

    /// Restore the invite draft for this community, if one was saved.
    #[must_use]
    pub fn load_invite_draft(&self) -> Option<InviteDraft> {
        let slug = self.view.borrow().slug.clone();
        self.drafts.get(&draft_key(&slug, INVITE_DRAFT_FIELD))
    }
}

fn placeholder_member(viewer_id: u64, username: &str) -> Member {
    Member {
        id: viewer_id,
        username: username.to_owned(),
        display_name: username.to_owned(),
        role: Role::Member,
        online: true,
        contributions: 0,
        badges: Vec::new(),
        connection: ConnectionState::Connect,
        request_id: None,
    }
}

fn remove_member_optimistic(state: &mut CommunityView, member_id: u64) -> Undo {
    let removed = state
        .members
        .iter()
        .position(|member| member.id == member_id)
        .map(|index| (index, state.members[index].clone()));
    if let Some((index, _)) = &removed {
        state.members.remove(*index);
        state.community.member_count = state.community.member_count.saturating_sub(1);
    }
    Box::new(move |state: &mut CommunityView| {
        if let Some((index, member)) = removed {
            let index = index.min(state.members.len());
            state.members.insert(index, member);
            state.community.member_count = state.community.member_count.saturating_add(1);
        }
    })
}

fn noop_undo() -> Undo {
    Box::new(|_: &mut CommunityView| {})
}
