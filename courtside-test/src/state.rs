use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sled::{Db, Tree};
use courtside_common::{ConnectionId, RecordStatus, RelationshipRecord, RelationshipView, User, UserId};

/// A relationship record plus what the pending list needs to show it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredConnection {
    pub record: RelationshipRecord,
    pub seq: u64,
    pub requested_at: u64,
}

#[derive(Clone)]
pub struct State {
    db: Db,
    users: Tree,
    connections: Tree,
}

impl State {
    pub fn temporary() -> anyhow::Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self {
            users: db.open_tree("users")?,
            connections: db.open_tree("connections")?,
            db,
        })
    }

    pub fn add_user(&self, user: &User) -> anyhow::Result<()> {
        self.users.insert(user.id.0.to_be_bytes(), serde_json::to_vec(user)?)?;
        Ok(())
    }

    pub fn user(&self, id: UserId) -> anyhow::Result<Option<User>> {
        match self.users.get(id.0.to_be_bytes())? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn users(&self) -> anyhow::Result<Vec<User>> {
        self.users
            .iter()
            .values()
            .map(|raw| Ok(serde_json::from_slice(&raw?)?))
            .collect()
    }

    pub fn connection(&self, a: UserId, b: UserId) -> anyhow::Result<Option<StoredConnection>> {
        match self.connections.get(pair_key(a, b))? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn connections(&self) -> anyhow::Result<Vec<StoredConnection>> {
        self.connections
            .iter()
            .values()
            .map(|raw| Ok(serde_json::from_slice(&raw?)?))
            .collect()
    }

    /// Creates a pending record unless the pair already has one. Returns
    /// `None` when it does.
    pub fn create_request(&self, from: UserId, to: UserId) -> anyhow::Result<Option<RelationshipRecord>> {
        let seq = self.db.generate_id()?;
        let stored = StoredConnection {
            record: RelationshipRecord { id: ConnectionId(seq), requester_id: from, addressee_id: to, status: RecordStatus::Pending },
            seq,
            requested_at: now_secs(),
        };
        let swapped = self
            .connections
            .compare_and_swap(pair_key(from, to), None as Option<&[u8]>, Some(serde_json::to_vec(&stored)?))?;
        Ok(swapped.ok().map(|_| stored.record))
    }

    /// Accepts the pending request `requester` sent to `addressee`. Returns
    /// `None` when no such request exists.
    pub fn accept_request(&self, addressee: UserId, requester: UserId) -> anyhow::Result<Option<RelationshipRecord>> {
        let written = self.swap_if(addressee, requester, |c| {
            is_request_from(c, requester).then(|| {
                let mut accepted = c.clone();
                accepted.record.status = RecordStatus::Accepted;
                Some(accepted)
            })
        })?;
        Ok(written.flatten().map(|c| c.record))
    }

    /// Deletes the pair's record if `approve` accepts it. Returns
    /// whether a record was deleted.
    pub fn delete_if(&self, a: UserId, b: UserId, approve: impl Fn(&StoredConnection) -> bool) -> anyhow::Result<bool> {
        Ok(self.swap_if(a, b, |c| approve(c).then_some(None))?.is_some())
    }

    /// Replaces the pair's record with what `func` returns for it, retrying
    /// if another writer got there first. `func` returns `None` to leave the
    /// record alone and `Some(None)` to delete it. Returns what was written.
    fn swap_if(
        &self,
        a: UserId,
        b: UserId,
        func: impl Fn(&StoredConnection) -> Option<Option<StoredConnection>>,
    ) -> anyhow::Result<Option<Option<StoredConnection>>> {
        let key = pair_key(a, b);
        loop {
            let Some(raw) = self.connections.get(key)? else { return Ok(None) };
            let current: StoredConnection = serde_json::from_slice(&raw)?;
            let Some(next) = func(&current) else { return Ok(None) };
            let bytes = next.as_ref().map(serde_json::to_vec).transpose()?;
            if self.connections.compare_and_swap(key, Some(&raw), bytes)?.is_ok() {
                return Ok(Some(next));
            }
        }
    }

    pub fn view(&self, viewer: UserId, other: UserId) -> anyhow::Result<RelationshipView> {
        Ok(self
            .connection(viewer, other)?
            .and_then(|c| c.record.view_for(viewer))
            .unwrap_or_default())
    }

    pub fn connected_to(&self, user: UserId) -> anyhow::Result<Vec<UserId>> {
        Ok(self
            .connections()?
            .into_iter()
            .map(|c| c.record)
            .filter(|r| r.status == RecordStatus::Accepted)
            .filter_map(|r| match (r.requester_id == user, r.addressee_id == user) {
                (true, _) => Some(r.addressee_id),
                (_, true) => Some(r.requester_id),
                _ => None,
            })
            .collect())
    }
}

pub fn is_request_from(c: &StoredConnection, requester: UserId) -> bool {
    c.record.status == RecordStatus::Pending && c.record.requester_id == requester
}

/// One key per unordered pair, so a pair can never hold two records.
fn pair_key(a: UserId, b: UserId) -> [u8; 16] {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&lo.0.to_be_bytes());
    key[8..].copy_from_slice(&hi.0.to_be_bytes());
    key
}

fn now_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

pub fn request_date(requested_at: u64) -> String {
    let elapsed = now_secs().saturating_sub(requested_at);
    match elapsed {
        0..=59 => "just now".to_string(),
        60..=3599 => format!("{} minutes ago", elapsed / 60),
        3600..=86399 => format!("{} hours ago", elapsed / 3600),
        _ => format!("{} days ago", elapsed / 86400),
    }
}
