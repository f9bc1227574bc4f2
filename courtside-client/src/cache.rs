//! Read cache for the directory and pending-request queries.
//!
//! The cache only ever holds projections of server state. Mutations never
//! write into it; they mark keys stale and the next read refetches.
//!
//! Entries are keyed by viewer as well as by query, so two viewers sharing a
//! cache never see each other's rows.
//!
//! Each key carries an activation epoch. When the last observer of a key goes
//! away the epoch advances, so a fetch started under the old epoch is dropped
//! on arrival instead of being stored.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::broadcast;
use tracing::trace;
use courtside_common::non_api_structs::{DirectoryEntry, QueryKey};
use courtside_common::{PendingRequest, UserId};

use crate::error::{ConnectionError, Result};

const NOTICE_CAPACITY: usize = 64;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryData {
    Directory(Arc<Vec<DirectoryEntry>>),
    Pending(Arc<Vec<PendingRequest>>),
}

/// A query key scoped to the viewer it is fetched for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ViewerKey {
    pub viewer: UserId,
    pub key: QueryKey,
}

impl ViewerKey {
    pub const fn new(viewer: UserId, key: QueryKey) -> Self {
        Self { viewer, key }
    }
}

impl std::fmt::Display for ViewerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.viewer, self.key)
    }
}

pub(crate) type Fetch = BoxFuture<'static, Result<QueryData>>;
type SharedFetch = Shared<Fetch>;

#[derive(Default)]
struct Entry {
    data: Option<QueryData>,
    stale: bool,
    observers: usize,
    epoch: u64,
    in_flight: Option<(u64, SharedFetch)>,
    invalidated_in_flight: bool,
}

impl Entry {
    fn fresh(&self) -> Option<&QueryData> {
        self.data.as_ref().filter(|_| !self.stale)
    }
}

pub struct QueryCache {
    entries: Mutex<HashMap<ViewerKey, Entry>>,
    notices: broadcast::Sender<ViewerKey>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryCache {
    pub fn new() -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self { entries: Mutex::new(HashMap::new()), notices }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ViewerKey, Entry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Receives a key each time an observed query turns stale and wants a
    /// refetch. Repeated invalidations of a key that is already stale are not
    /// announced again.
    pub fn notices(&self) -> broadcast::Receiver<ViewerKey> {
        self.notices.subscribe()
    }

    /// Marks `key` stale. Returns whether a refetch notice went out.
    pub fn invalidate(&self, key: ViewerKey) -> bool {
        let mut entries = self.lock();
        let entry = entries.entry(key).or_default();
        if entry.in_flight.is_some() {
            entry.invalidated_in_flight = true;
        }
        let was_fresh = entry.fresh().is_some();
        entry.stale = true;
        trace!(%key, was_fresh, observers = entry.observers, "invalidated");
        if was_fresh && entry.observers > 0 {
            let _ = self.notices.send(key);
            return true;
        }
        false
    }

    /// Cached value and whether it is stale.
    pub fn peek(&self, key: ViewerKey) -> Option<(QueryData, bool)> {
        let entries = self.lock();
        let entry = entries.get(&key)?;
        entry.data.clone().map(|data| (data, entry.stale))
    }

    pub fn is_stale(&self, key: ViewerKey) -> bool {
        self.lock().get(&key).map_or(true, |e| e.fresh().is_none())
    }

    pub fn is_fetching(&self, key: ViewerKey) -> bool {
        self.lock().get(&key).map_or(false, |e| e.in_flight.is_some())
    }

    pub(crate) fn activate(&self, key: ViewerKey) {
        let mut entries = self.lock();
        let entry = entries.entry(key).or_default();
        entry.observers += 1;
        if entry.observers == 1 {
            // whatever is cached predates this activation
            entry.stale = true;
        }
        trace!(%key, observers = entry.observers, "activated");
    }

    pub(crate) fn deactivate(&self, key: ViewerKey) {
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(&key) else { return };
        entry.observers = entry.observers.saturating_sub(1);
        if entry.observers == 0 {
            entry.epoch += 1;
            entry.stale = true;
            entry.in_flight = None;
            entry.invalidated_in_flight = false;
        }
        trace!(%key, observers = entry.observers, epoch = entry.epoch, "deactivated");
    }

    /// Returns the fresh value for `key`, joining an in-flight fetch or
    /// starting one from `fetcher`. `Ok(None)` means the result arrived after
    /// the key was deactivated and was discarded.
    pub(crate) async fn fetch_with(&self, key: ViewerKey, fetcher: impl FnOnce() -> Fetch) -> Result<Option<QueryData>> {
        let (epoch, fetch) = {
            let mut entries = self.lock();
            let entry = entries.entry(key).or_default();
            if let Some(data) = entry.fresh() {
                return Ok(Some(data.clone()));
            }
            match &entry.in_flight {
                Some((epoch, fetch)) if *epoch == entry.epoch => (*epoch, fetch.clone()),
                _ => {
                    trace!(%key, epoch = entry.epoch, "fetching");
                    let fetch = fetcher().shared();
                    entry.in_flight = Some((entry.epoch, fetch.clone()));
                    entry.invalidated_in_flight = false;
                    (entry.epoch, fetch)
                }
            }
        };

        let result = fetch.clone().await;

        let mut entries = self.lock();
        let entry = entries.entry(key).or_default();
        let ours = matches!(&entry.in_flight, Some((_, f)) if f.ptr_eq(&fetch));
        if entry.epoch != epoch {
            trace!(%key, epoch, current = entry.epoch, "discarding result of deactivated query");
            return result.map(|_| None);
        }
        if !ours {
            // another reader already stored this result
            return result.map(Some);
        }
        entry.in_flight = None;
        let data = result?;
        let invalidated = std::mem::take(&mut entry.invalidated_in_flight);
        entry.data = Some(data.clone());
        entry.stale = invalidated;
        if invalidated && entry.observers > 0 {
            let _ = self.notices.send(key);
        }
        Ok(Some(data))
    }
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.lock();
        let mut map = f.debug_map();
        for (key, entry) in entries.iter() {
            map.entry(&key.to_string(), &(entry.stale, entry.observers, entry.epoch));
        }
        map.finish()
    }
}

impl QueryData {
    pub fn into_directory(self) -> Option<Arc<Vec<DirectoryEntry>>> {
        match self {
            QueryData::Directory(entries) => Some(entries),
            QueryData::Pending(_) => None,
        }
    }

    pub fn into_pending(self) -> Option<Arc<Vec<PendingRequest>>> {
        match self {
            QueryData::Pending(requests) => Some(requests),
            QueryData::Directory(_) => None,
        }
    }
}

pub(crate) fn mismatch(key: QueryKey) -> ConnectionError {
    ConnectionError::Decode(Arc::new(serde::de::Error::custom(format!("cache entry for {key} holds the wrong shape"))))
}
