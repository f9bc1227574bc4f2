//! Write-through relationship mutations.
//!
//! Every action makes exactly one remote call. Nothing is written to the
//! cache up front; only a confirmed success marks the affected queries
//! stale. Duplicate calls on the same pair are not merged or blocked here;
//! surfaces disable their control while `is_pending` reports true.
//!
//! Only the acting viewer's queries are invalidated. Another viewer sharing
//! the cache picks the change up on its next activation.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};
use courtside_common::non_api_structs::DirectoryEntry;
use courtside_common::{Action, RelationshipRecord, UserId};

use crate::cache::{QueryCache, ViewerKey};
use crate::error::Result;
use crate::remote::RemoteGraph;
use crate::viewer::ViewerContext;

type InFlight = HashMap<(Action, UserId), usize>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MutationOutcome {
    Requested(RelationshipRecord),
    Accepted(RelationshipRecord),
    Rejected(Option<RelationshipRecord>),
    Deleted,
}

pub struct Mutations<R: RemoteGraph> {
    remote: Arc<R>,
    cache: Arc<QueryCache>,
    in_flight: Arc<Mutex<InFlight>>,
}

impl<R: RemoteGraph> Clone for Mutations<R> {
    fn clone(&self) -> Self {
        Self { remote: self.remote.clone(), cache: self.cache.clone(), in_flight: self.in_flight.clone() }
    }
}

/// Counts one running action until dropped, including when the caller's
/// future is dropped half way.
struct Busy {
    in_flight: Arc<Mutex<InFlight>>,
    key: (Action, UserId),
}

impl Drop for Busy {
    fn drop(&mut self) {
        let mut in_flight = lock(&self.in_flight);
        if let Some(count) = in_flight.get_mut(&self.key) {
            *count -= 1;
            if *count == 0 {
                in_flight.remove(&self.key);
            }
        }
    }
}

fn lock(in_flight: &Mutex<InFlight>) -> MutexGuard<'_, InFlight> {
    in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<R: RemoteGraph> Mutations<R> {
    pub fn new(remote: Arc<R>, cache: Arc<QueryCache>) -> Self {
        Self { remote, cache, in_flight: Default::default() }
    }

    pub async fn connect(&self, viewer: &ViewerContext, target: UserId) -> Result<RelationshipRecord> {
        self.run(Action::Connect, viewer, target, self.remote.connect(viewer, target)).await
    }

    pub async fn accept(&self, viewer: &ViewerContext, other: UserId) -> Result<RelationshipRecord> {
        self.run(Action::Accept, viewer, other, self.remote.accept(viewer, other)).await
    }

    pub async fn reject(&self, viewer: &ViewerContext, other: UserId) -> Result<Option<RelationshipRecord>> {
        self.run(Action::Reject, viewer, other, self.remote.reject(viewer, other)).await
    }

    /// Withdraws an outgoing request.
    pub async fn cancel(&self, viewer: &ViewerContext, target: UserId) -> Result<()> {
        self.run(Action::Cancel, viewer, target, self.remote.cancel_or_remove(viewer, target)).await
    }

    /// Ends an accepted connection.
    pub async fn remove(&self, viewer: &ViewerContext, target: UserId) -> Result<()> {
        self.run(Action::Remove, viewer, target, self.remote.cancel_or_remove(viewer, target)).await
    }

    /// Runs `action` against the user of a directory row, refusing it without
    /// a network call when the row's relationship does not offer it.
    pub async fn perform(&self, viewer: &ViewerContext, entry: &DirectoryEntry, action: Action) -> Result<MutationOutcome> {
        entry.relationship.apply(action)?;
        let user = entry.user.id;
        Ok(match action {
            Action::Connect => MutationOutcome::Requested(self.connect(viewer, user).await?),
            Action::Accept => MutationOutcome::Accepted(self.accept(viewer, user).await?),
            Action::Reject => MutationOutcome::Rejected(self.reject(viewer, user).await?),
            Action::Cancel => {
                self.cancel(viewer, user).await?;
                MutationOutcome::Deleted
            }
            Action::Remove => {
                self.remove(viewer, user).await?;
                MutationOutcome::Deleted
            }
        })
    }

    /// Whether any `action` is running, i.e. whether its button is disabled.
    pub fn is_pending(&self, action: Action) -> bool {
        lock(&self.in_flight).keys().any(|(a, _)| *a == action)
    }

    pub fn is_pending_for(&self, action: Action, user: UserId) -> bool {
        lock(&self.in_flight).contains_key(&(action, user))
    }

    async fn run<T>(&self, action: Action, viewer: &ViewerContext, user: UserId, call: impl Future<Output = Result<T>>) -> Result<T> {
        let _busy = self.mark_busy(action, user);
        debug!(viewer = %viewer.user_id, %user, %action, "mutation started");
        match call.await {
            Ok(value) => {
                for key in action.invalidates() {
                    self.cache.invalidate(ViewerKey::new(viewer.user_id, *key));
                }
                info!(viewer = %viewer.user_id, %user, %action, "mutation succeeded");
                Ok(value)
            }
            Err(err) => {
                warn!(viewer = %viewer.user_id, %user, %action, error = %err, "mutation failed");
                Err(err)
            }
        }
    }

    fn mark_busy(&self, action: Action, user: UserId) -> Busy {
        *lock(&self.in_flight).entry((action, user)).or_insert(0) += 1;
        Busy { in_flight: self.in_flight.clone(), key: (action, user) }
    }
}
