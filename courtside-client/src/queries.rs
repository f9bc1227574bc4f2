//! Directory and pending-request queries.
//!
//! A query only runs while somebody holds a subscription to it. Dropping the
//! last subscription deactivates the key; the next subscription always
//! refetches.
//!
//! Every subscription belongs to one viewer. Two viewers asking for the same
//! query get separate cache entries.

use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use courtside_common::non_api_structs::{ConnectionSummary, DirectoryEntry, QueryKey};
use courtside_common::{Direction, PendingRequest};

use crate::cache::{self, Fetch, QueryCache, QueryData, ViewerKey};
use crate::error::{ConnectionError, Result};
use crate::remote::RemoteGraph;
use crate::viewer::ViewerContext;

pub struct Queries<R: RemoteGraph> {
    remote: Arc<R>,
    cache: Arc<QueryCache>,
}

impl<R: RemoteGraph> Clone for Queries<R> {
    fn clone(&self) -> Self {
        Self { remote: self.remote.clone(), cache: self.cache.clone() }
    }
}

impl<R: RemoteGraph> Queries<R> {
    pub fn new(remote: Arc<R>, cache: Arc<QueryCache>) -> Self {
        Self { remote, cache }
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub fn directory(&self, viewer: &ViewerContext) -> DirectoryQuery<R> {
        DirectoryQuery(self.subscribe(viewer, QueryKey::NetworkUsers))
    }

    pub fn pending(&self, viewer: &ViewerContext, direction: Direction) -> PendingQuery<R> {
        PendingQuery(self.subscribe(viewer, QueryKey::PendingRequests(direction)))
    }

    fn subscribe(&self, viewer: &ViewerContext, key: QueryKey) -> Subscription<R> {
        let key = ViewerKey::new(viewer.user_id, key);
        let notices = self.cache.notices();
        self.cache.activate(key);
        Subscription { key, viewer: viewer.clone(), notices, remote: self.remote.clone(), cache: self.cache.clone() }
    }
}

/// Keeps one query key active for as long as it lives.
pub struct Subscription<R: RemoteGraph> {
    key: ViewerKey,
    viewer: ViewerContext,
    notices: broadcast::Receiver<ViewerKey>,
    remote: Arc<R>,
    cache: Arc<QueryCache>,
}

impl<R: RemoteGraph> Subscription<R> {
    pub fn key(&self) -> QueryKey {
        self.key.key
    }

    pub fn is_stale(&self) -> bool {
        self.cache.is_stale(self.key)
    }

    pub fn is_fetching(&self) -> bool {
        self.cache.is_fetching(self.key)
    }

    async fn read(&self) -> Result<QueryData> {
        self.cache
            .fetch_with(self.key, || fetcher(self.remote.clone(), self.viewer.clone(), self.key))
            .await?
            .ok_or(ConnectionError::Deactivated(self.key.key))
    }

    /// Waits until this query is invalidated while observed. A lagging
    /// receiver counts as invalidated.
    pub async fn invalidated(&mut self) -> Result<()> {
        loop {
            match self.notices.recv().await {
                Ok(key) if key == self.key => return Ok(()),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => return Ok(()),
                Err(broadcast::error::RecvError::Closed) => return Err(ConnectionError::Deactivated(self.key.key)),
            }
        }
    }

    /// Starts a refetch that outlives this handle. If every subscription is
    /// gone by the time the response lands, the response is thrown away and
    /// the task yields `Ok(false)`.
    pub fn refetch_in_background(&self) -> JoinHandle<Result<bool>> {
        let (cache, remote, viewer, key) = (self.cache.clone(), self.remote.clone(), self.viewer.clone(), self.key);
        tokio::spawn(async move {
            let stored = cache.fetch_with(key, || fetcher(remote, viewer, key)).await?;
            Ok(stored.is_some())
        })
    }
}

impl<R: RemoteGraph> Drop for Subscription<R> {
    fn drop(&mut self) {
        self.cache.deactivate(self.key);
    }
}

fn fetcher<R: RemoteGraph>(remote: Arc<R>, viewer: ViewerContext, key: ViewerKey) -> Fetch {
    async move {
        match key.key {
            QueryKey::NetworkUsers => {
                let rows = remote.directory(&viewer).await?;
                let entries = rows.into_iter().map(DirectoryEntry::try_from).collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(QueryData::Directory(Arc::new(entries)))
            }
            QueryKey::PendingRequests(direction) => {
                Ok(QueryData::Pending(Arc::new(remote.pending(&viewer, direction).await?)))
            }
        }
    }
    .boxed()
}

/// Every user the viewer can see, with the relationship to each.
pub struct DirectoryQuery<R: RemoteGraph>(Subscription<R>);

impl<R: RemoteGraph> DirectoryQuery<R> {
    pub async fn fetch(&self) -> Result<Arc<Vec<DirectoryEntry>>> {
        self.0.read().await?.into_directory().ok_or_else(|| cache::mismatch(self.0.key()))
    }

    /// Waits for the next invalidation and returns the refetched rows.
    pub async fn next_update(&mut self) -> Result<Arc<Vec<DirectoryEntry>>> {
        self.0.invalidated().await?;
        self.fetch().await
    }

    pub async fn summary(&self) -> Result<ConnectionSummary> {
        Ok(ConnectionSummary::from_entries(&self.fetch().await?))
    }

    pub fn subscription(&self) -> &Subscription<R> {
        &self.0
    }
}

/// Requests waiting on one side, in the order the server returns them.
pub struct PendingQuery<R: RemoteGraph>(Subscription<R>);

impl<R: RemoteGraph> PendingQuery<R> {
    pub async fn fetch(&self) -> Result<Arc<Vec<PendingRequest>>> {
        self.0.read().await?.into_pending().ok_or_else(|| cache::mismatch(self.0.key()))
    }

    pub async fn next_update(&mut self) -> Result<Arc<Vec<PendingRequest>>> {
        self.0.invalidated().await?;
        self.fetch().await
    }

    /// Size of the list, as shown on a badge.
    pub async fn count(&self) -> Result<usize> {
        Ok(self.fetch().await?.len())
    }

    pub fn subscription(&self) -> &Subscription<R> {
        &self.0
    }
}
