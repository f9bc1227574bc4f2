//! In-memory connection graph used by the unit tests of this crate.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::oneshot;
use courtside_common::{
    ConnectionId, Direction, NetworkUser, PendingRequest, RecordStatus, RelationshipRecord, RelationshipView, User, UserId,
};

use crate::error::{ConnectionError, Result};
use crate::remote::RemoteGraph;
use crate::viewer::ViewerContext;

#[derive(Default)]
struct Graph {
    users: Vec<User>,
    records: Vec<RelationshipRecord>,
    next_id: u64,
    calls: Vec<(&'static str, UserId)>,
    gates: VecDeque<oneshot::Receiver<()>>,
    fail_next: Option<ConnectionError>,
}

#[derive(Default)]
pub(crate) struct FakeGraph {
    graph: Mutex<Graph>,
}

impl FakeGraph {
    pub(crate) fn with_users(ids: &[u64]) -> Self {
        let fake = Self::default();
        fake.lock().users = ids
            .iter()
            .map(|&id| User { id: UserId(id), name: format!("user {id}"), role: "Athlete".into(), ..Default::default() })
            .collect();
        fake
    }

    fn lock(&self) -> MutexGuard<'_, Graph> {
        self.graph.lock().unwrap()
    }

    /// Seeds a record without going through the API.
    pub(crate) fn seed(&self, from: u64, to: u64, status: RecordStatus) {
        let mut graph = self.lock();
        graph.next_id += 1;
        let id = ConnectionId(graph.next_id);
        graph.records.push(RelationshipRecord { id, requester_id: UserId(from), addressee_id: UserId(to), status });
    }

    /// The next ungated remote call waits until the returned sender fires.
    /// Gates are handed to calls in the order they were created.
    pub(crate) fn hold_next(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.lock().gates.push_back(rx);
        tx
    }

    pub(crate) fn fail_next(&self, err: ConnectionError) {
        self.lock().fail_next = Some(err);
    }

    pub(crate) fn calls(&self, op: &str) -> usize {
        self.lock().calls.iter().filter(|(name, _)| *name == op).count()
    }

    async fn enter(&self, op: &'static str, user: UserId) -> Result<()> {
        let gate = {
            let mut graph = self.lock();
            graph.calls.push((op, user));
            if let Some(err) = graph.fail_next.take() {
                return Err(err);
            }
            graph.gates.pop_front()
        };
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        Ok(())
    }

    fn view(graph: &Graph, viewer: UserId, other: UserId) -> RelationshipView {
        graph
            .records
            .iter()
            .find(|r| r.involves(viewer, other))
            .and_then(|r| r.view_for(viewer))
            .unwrap_or_default()
    }
}

#[async_trait]
impl RemoteGraph for FakeGraph {
    async fn connect(&self, viewer: &ViewerContext, target: UserId) -> Result<RelationshipRecord> {
        self.enter("connect", target).await?;
        let mut graph = self.lock();
        if graph.records.iter().any(|r| r.involves(viewer.user_id, target)) {
            return Err(ConnectionError::Conflict(format!("already related to {target}")));
        }
        graph.next_id += 1;
        let record = RelationshipRecord {
            id: ConnectionId(graph.next_id),
            requester_id: viewer.user_id,
            addressee_id: target,
            status: RecordStatus::Pending,
        };
        graph.records.push(record.clone());
        Ok(record)
    }

    async fn accept(&self, viewer: &ViewerContext, other: UserId) -> Result<RelationshipRecord> {
        self.enter("accept", other).await?;
        let mut graph = self.lock();
        let record = graph
            .records
            .iter_mut()
            .find(|r| r.requester_id == other && r.addressee_id == viewer.user_id && r.status == RecordStatus::Pending)
            .ok_or_else(|| ConnectionError::NotFound(format!("no request from {other}")))?;
        record.status = RecordStatus::Accepted;
        Ok(record.clone())
    }

    async fn reject(&self, viewer: &ViewerContext, other: UserId) -> Result<Option<RelationshipRecord>> {
        self.enter("reject", other).await?;
        let mut graph = self.lock();
        let index = graph
            .records
            .iter()
            .position(|r| r.requester_id == other && r.addressee_id == viewer.user_id && r.status == RecordStatus::Pending)
            .ok_or_else(|| ConnectionError::NotFound(format!("no request from {other}")))?;
        Ok(Some(graph.records.remove(index)))
    }

    async fn cancel_or_remove(&self, viewer: &ViewerContext, target: UserId) -> Result<()> {
        self.enter("cancel_or_remove", target).await?;
        let mut graph = self.lock();
        let index = graph
            .records
            .iter()
            .position(|r| {
                r.involves(viewer.user_id, target)
                    && (r.status == RecordStatus::Accepted || r.requester_id == viewer.user_id)
            })
            .ok_or_else(|| ConnectionError::NotFound(format!("nothing to delete with {target}")))?;
        graph.records.remove(index);
        Ok(())
    }

    async fn pending(&self, viewer: &ViewerContext, direction: Direction) -> Result<Vec<PendingRequest>> {
        self.enter("pending", viewer.user_id).await?;
        let graph = self.lock();
        Ok(graph
            .records
            .iter()
            .rev()
            .filter(|r| r.status == RecordStatus::Pending)
            .filter(|r| match direction {
                Direction::Incoming => r.addressee_id == viewer.user_id,
                Direction::Outgoing => r.requester_id == viewer.user_id,
            })
            .map(|r| {
                let other = if direction == Direction::Incoming { r.requester_id } else { r.addressee_id };
                PendingRequest { connection_id: r.id, requester_id: other, name: format!("user {other}"), ..Default::default() }
            })
            .collect())
    }

    async fn directory(&self, viewer: &ViewerContext) -> Result<Vec<NetworkUser>> {
        self.enter("directory", viewer.user_id).await?;
        let graph = self.lock();
        Ok(graph
            .users
            .iter()
            .filter(|u| u.id != viewer.user_id)
            .map(|u| NetworkUser::from_view(u.clone(), Self::view(&graph, viewer.user_id, u.id)))
            .collect())
    }
}
